//! Assembly of the ACTION/GOTO parse table from the LR(1) automaton.

use crate::dfa::{NodeID, DFA};
use crate::grammar::{Grammar, RuleID, SymbolID};
use crate::types::Map;
use crate::util::FmtWith;
use std::fmt;

/// One entry of the table. `Shift`/`Reduce`/`Accept` live in the ACTION
/// columns, `Goto` in the GOTO columns, `Empty` denotes a syntax error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Shift(NodeID),
    Reduce(RuleID),
    Goto(NodeID),
    Accept,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConflictKind {
    ShiftReduce,
    ReduceReduce,
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ShiftReduce => f.write_str("shift/reduce"),
            Self::ReduceReduce => f.write_str("reduce/reduce"),
        }
    }
}

/// Two actions competing for the same `(state, symbol)` cell.
#[derive(Debug, PartialEq, Eq)]
pub struct Conflict {
    pub state: NodeID,
    pub symbol: String,
    pub kind: ConflictKind,
    pub actions: [String; 2],
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} conflict in state {} on {}: `{}` vs `{}`",
            self.kind, self.state, self.symbol, self.actions[0], self.actions[1]
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ParseTableError {
    #[error("{}", format_conflicts(.0))]
    Conflicts(Vec<Conflict>),

    #[error("no transition recorded for state {state} on {symbol}")]
    MissingTransition { state: NodeID, symbol: String },
}

fn format_conflicts(conflicts: &[Conflict]) -> String {
    let mut message = format!("detected {} conflict(s):", conflicts.len());
    for conflict in conflicts {
        message.push_str("\n  ");
        message.push_str(&conflict.to_string());
    }
    message
}

/// The rectangular ACTION/GOTO table. Rows follow the state indices of the
/// canonical collection; terminal columns come first, then the nonterminal
/// columns without `S'` (it never occurs on a right-hand side).
#[derive(Debug)]
pub struct ParseTable {
    columns: Vec<SymbolID>,
    col_of: Map<SymbolID, usize>,
    action_columns: usize,
    rows: Vec<Vec<Cell>>,
}

impl ParseTable {
    pub fn generate(grammar: &Grammar, dfa: &DFA) -> Result<Self, ParseTableError> {
        let mut columns: Vec<SymbolID> = grammar.terminals().collect();
        let action_columns = columns.len();
        columns.extend(grammar.nonterminals().filter(|&id| id != SymbolID::START));
        let col_of: Map<SymbolID, usize> = columns
            .iter()
            .enumerate()
            .map(|(col, &id)| (id, col))
            .collect();

        let mut filler = Filler {
            grammar,
            col_of: &col_of,
            conflicts: Vec::new(),
        };

        let mut rows = Vec::with_capacity(dfa.state_count());
        for (id, node) in dfa.nodes() {
            let mut row = vec![Cell::Empty; columns.len()];
            for item in node.items() {
                match item.next_symbol(grammar) {
                    // [S' -> S @, $]
                    None if item.is_augmented() => {
                        filler.set(&mut row, id, SymbolID::EOI, Cell::Accept);
                    }
                    // [A -> alpha @, a]
                    None => {
                        filler.set(&mut row, id, item.lookahead, Cell::Reduce(item.rule_id));
                    }
                    // [A -> alpha @ X beta, a]
                    Some(symbol) => {
                        let target = node.edge(symbol).ok_or_else(|| {
                            ParseTableError::MissingTransition {
                                state: id,
                                symbol: grammar.symbol_text(symbol).to_string(),
                            }
                        })?;
                        let cell = if grammar.symbol(symbol).is_terminal() {
                            Cell::Shift(target)
                        } else {
                            Cell::Goto(target)
                        };
                        filler.set(&mut row, id, symbol, cell);
                    }
                }
            }
            rows.push(row);
        }

        if !filler.conflicts.is_empty() {
            return Err(ParseTableError::Conflicts(filler.conflicts));
        }

        Ok(Self {
            columns,
            col_of,
            action_columns,
            rows,
        })
    }

    /// Column layout, terminals first. This is the emitted header order.
    pub fn columns(&self) -> &[SymbolID] {
        &self.columns[..]
    }

    /// Number of leading columns that form the ACTION region.
    pub fn action_columns(&self) -> usize {
        self.action_columns
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> + '_ {
        self.rows.iter().map(|row| &row[..])
    }

    pub fn cell(&self, state: NodeID, symbol: SymbolID) -> Cell {
        self.rows[state.index()][self.col_of[&symbol]]
    }

    /// Render the table in its line-oriented text format: a comma-separated
    /// header, then one `", "`-separated line of cells per state.
    pub fn display<'g>(&'g self, grammar: &'g Grammar) -> impl fmt::Display + 'g {
        FmtWith(move |f: &mut std::fmt::Formatter<'_>| {
            for (i, &id) in self.columns.iter().enumerate() {
                if i > 0 {
                    f.write_str(",")?;
                }
                write!(f, "{}", grammar.symbol_text(id))?;
            }
            writeln!(f)?;

            for row in &self.rows {
                for (i, &cell) in row.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", cell.display(grammar))?;
                }
                writeln!(f)?;
            }
            Ok(())
        })
    }
}

impl Cell {
    /// The textual cell encoding: `s<j>`, `r<production text>`, a bare goto
    /// index, `accept`, or nothing.
    pub fn display<'g>(&self, grammar: &'g Grammar) -> impl fmt::Display + 'g {
        let cell = *self;
        FmtWith(move |f: &mut std::fmt::Formatter<'_>| match cell {
            Cell::Empty => Ok(()),
            Cell::Shift(target) => write!(f, "s{}", target),
            Cell::Reduce(rule) => write!(f, "r{}", grammar.rule(rule).text()),
            Cell::Goto(target) => write!(f, "{}", target),
            Cell::Accept => f.write_str("accept"),
        })
    }
}

struct Filler<'g> {
    grammar: &'g Grammar,
    col_of: &'g Map<SymbolID, usize>,
    conflicts: Vec<Conflict>,
}

impl Filler<'_> {
    /// Write `cell`, keeping the first value and recording a conflict when a
    /// different one is already present. Re-writing an equal value is a no-op.
    fn set(&mut self, row: &mut [Cell], state: NodeID, symbol: SymbolID, cell: Cell) {
        let col = self.col_of[&symbol];
        let existing = row[col];

        if existing == Cell::Empty {
            row[col] = cell;
            return;
        }
        if existing == cell {
            return;
        }

        let kind = match (existing, cell) {
            (Cell::Reduce(_) | Cell::Accept, Cell::Reduce(_) | Cell::Accept) => {
                ConflictKind::ReduceReduce
            }
            _ => ConflictKind::ShiftReduce,
        };
        let conflict = Conflict {
            state,
            symbol: self.grammar.symbol_text(symbol).to_string(),
            kind,
            actions: [
                existing.display(self.grammar).to_string(),
                cell.display(self.grammar).to_string(),
            ],
        };
        // Several items of one state can attempt the same overwrite; one
        // record per distinct pair of actions is enough.
        if !self.conflicts.contains(&conflict) {
            self.conflicts.push(conflict);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dfa::LRItem;

    fn symbol(grammar: &Grammar, name: &str) -> SymbolID {
        grammar
            .symbols()
            .find(|(_, sym)| sym.name() == name)
            .map(|(id, _)| id)
            .unwrap_or_else(|| panic!("unknown symbol {name}"))
    }

    #[test]
    fn single_rule_table_format() {
        let grammar = Grammar::parse(["S -> 'a'"]).unwrap();
        let dfa = DFA::generate(&grammar).unwrap();
        let table = ParseTable::generate(&grammar, &dfa).unwrap();

        assert_eq!(
            table.display(&grammar).to_string(),
            "'a',$,S\n\
             s2, , 1\n\
             , accept, \n\
             , rS -> 'a', \n"
        );
    }

    #[test]
    fn accept_cell_is_unique_and_reached_by_the_start_goto() {
        let grammar = Grammar::parse(["S -> F", "S -> '(' S '+' F ')'", "F -> 'a'"]).unwrap();
        let dfa = DFA::generate(&grammar).unwrap();
        let table = ParseTable::generate(&grammar, &dfa).unwrap();

        let accepts: Vec<usize> = table
            .rows()
            .enumerate()
            .filter(|(_, row)| row.contains(&Cell::Accept))
            .map(|(state, _)| state)
            .collect();
        assert_eq!(accepts.len(), 1);

        // The accepting state is the goto target on the start symbol and its
        // sole completed item is [S' -> S @, $].
        let target = dfa
            .start_node()
            .edge(grammar.start_symbol())
            .expect("no goto on the start symbol");
        assert_eq!(accepts, [target.index()]);
        assert_eq!(table.cell(target, SymbolID::EOI), Cell::Accept);
        assert!(dfa.node(target).items().any(|item| {
            *item
                == LRItem {
                    rule_id: RuleID::ACCEPT,
                    marker: 1,
                    lookahead: SymbolID::EOI,
                }
        }));
    }

    #[test]
    fn dangling_else_is_a_shift_reduce_conflict() {
        let grammar = Grammar::parse([
            "S -> 'if' E 'then' S",
            "S -> 'if' E 'then' S 'else' S",
            "S -> 'a'",
            "E -> 'b'",
        ])
        .unwrap();
        let dfa = DFA::generate(&grammar).unwrap();

        let err = ParseTable::generate(&grammar, &dfa).unwrap_err();
        let conflicts = match err {
            ParseTableError::Conflicts(conflicts) => conflicts,
            err => panic!("unexpected error: {err}"),
        };
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].kind, ConflictKind::ShiftReduce);
        assert_eq!(conflicts[0].symbol, "'else'");
    }

    #[test]
    fn goto_region_excludes_the_augmented_start() {
        let grammar = Grammar::parse(["S -> 'a'"]).unwrap();
        let dfa = DFA::generate(&grammar).unwrap();
        let table = ParseTable::generate(&grammar, &dfa).unwrap();

        assert_eq!(table.action_columns(), 2);
        assert!(!table.columns().contains(&SymbolID::START));
        assert_eq!(table.columns().last(), Some(&symbol(&grammar, "S")));
    }
}
