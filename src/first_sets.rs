//! Calculation of first set function.

use crate::grammar::{Grammar, SymbolID, EPSILON};
use crate::types::{Map, Set};
use crate::util::FmtWith;
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum FirstSetsError {
    #[error("undefined nonterminal `{symbol}` referenced in `{production}`")]
    UndefinedNonterminal { symbol: String, production: String },
}

/// FIRST of a symbol string: the terminals that can begin a derivation of
/// it, with epsilon-membership tracked as `nullable`.
#[derive(Debug)]
pub struct SequenceFirst {
    pub terminals: Set<SymbolID>,
    pub nullable: bool,
}

#[derive(Debug)]
pub struct FirstSets {
    nullable: Set<SymbolID>,
    map: Map<SymbolID, Set<SymbolID>>,
}

impl FirstSets {
    pub fn new(grammar: &Grammar) -> Result<Self, FirstSetsError> {
        check_defined(grammar)?;
        let nullable = nullable_set(grammar);
        let map = first_map(grammar, &nullable);
        Ok(Self { nullable, map })
    }

    /// The terminals of `First(X)`. Epsilon-membership is reported by
    /// [`is_nullable`](Self::is_nullable) instead of an in-set marker.
    pub fn first(&self, symbol: SymbolID) -> &Set<SymbolID> {
        &self.map[&symbol]
    }

    /// `epsilon \in First(X)`
    pub fn is_nullable(&self, symbol: SymbolID) -> bool {
        self.nullable.contains(&symbol)
    }

    /// `First(X1 X2 ... Xn)` over an arbitrary symbol string. The empty
    /// string is nullable.
    pub fn first_of_sequence(&self, symbols: &[SymbolID]) -> SequenceFirst {
        let mut terminals = Set::default();
        let mut nullable = true;
        for symbol in symbols {
            terminals.extend(self.map[symbol].iter().copied());
            if !self.nullable.contains(symbol) {
                nullable = false;
                break;
            }
        }
        SequenceFirst {
            terminals,
            nullable,
        }
    }

    /// `First(prefix a)` for a terminal lookahead `a`, the lookahead source
    /// of the closure computation.
    pub fn get(&self, prefix: &[SymbolID], lookahead: SymbolID) -> Set<SymbolID> {
        let mut first = self.first_of_sequence(prefix);
        if first.nullable {
            first.terminals.insert(lookahead);
        }
        first.terminals
    }

    /// Dump every first set as `X : [a, b, ...]`, symbols and members in
    /// lexicographic order, nullability rendered as the epsilon marker.
    pub fn display<'g>(&'g self, grammar: &'g Grammar) -> impl fmt::Display + 'g {
        FmtWith(move |f: &mut std::fmt::Formatter<'_>| {
            let mut entries: Vec<(&str, SymbolID)> = self
                .map
                .keys()
                .map(|&id| (grammar.symbol_name(id), id))
                .collect();
            entries.sort_unstable();

            for (name, id) in entries {
                let mut members: Vec<&str> = self.map[&id]
                    .iter()
                    .map(|&t| grammar.symbol_name(t))
                    .collect();
                if self.nullable.contains(&id) {
                    members.push(EPSILON);
                }
                members.sort_unstable();
                writeln!(f, "{} : [{}]", name, members.join(", "))?;
            }
            Ok(())
        })
    }
}

/// Every nonterminal referenced on a right-hand side must have at least one
/// production of its own.
fn check_defined(grammar: &Grammar) -> Result<(), FirstSetsError> {
    let defined: Set<SymbolID> = grammar.rules().map(|(_, rule)| rule.left()).collect();

    for (_, rule) in grammar.rules() {
        for &symbol in rule.right() {
            if !grammar.symbol(symbol).is_terminal() && !defined.contains(&symbol) {
                return Err(FirstSetsError::UndefinedNonterminal {
                    symbol: grammar.symbol_name(symbol).to_owned(),
                    production: rule.text().to_owned(),
                });
            }
        }
    }

    Ok(())
}

/// The symbols that can derive the empty string. A left-hand side becomes
/// nullable once one of its rules has an all-nullable right-hand side (an
/// empty one trivially qualifies); passes over the rules repeat until a
/// full pass adds nothing.
fn nullable_set(grammar: &Grammar) -> Set<SymbolID> {
    let mut nullable: Set<SymbolID> = Set::default();
    loop {
        let before = nullable.len();
        for (_, rule) in grammar.rules() {
            if rule.right().iter().all(|symbol| nullable.contains(symbol)) {
                nullable.insert(rule.left());
            }
        }
        if nullable.len() == before {
            return nullable;
        }
    }
}

/// Terminal-only first sets for every grammar symbol, driven to a fixed
/// point directly over the rules.
fn first_map(grammar: &Grammar, nullable: &Set<SymbolID>) -> Map<SymbolID, Set<SymbolID>> {
    let mut map: Map<SymbolID, Set<SymbolID>> = Map::default();
    for id in grammar.terminals() {
        // First(t) = {t}
        map.insert(id, [id].into_iter().collect());
    }
    for id in grammar.nonterminals() {
        map.insert(id, Set::default());
    }

    // In A -> Y1 Y2 ... Yn, a derivation of A can begin with anything that
    // begins the nullable prefix Y1..Y(k-1) or the first non-nullable Yk.
    // Each pass folds First(Yi) of those symbols into First(A); rescanning
    // stops once a whole pass grows no set, which also bounds grammars
    // that are left-recursive through nullable chains.
    let mut grown = true;
    while grown {
        grown = false;
        for (_, rule) in grammar.rules() {
            for &symbol in rule.right() {
                if symbol != rule.left() {
                    let firsts: Vec<SymbolID> = map[&symbol].iter().copied().collect();
                    let of_left = &mut map[&rule.left()];
                    for terminal in firsts {
                        grown |= of_left.insert(terminal);
                    }
                }
                if !nullable.contains(&symbol) {
                    break;
                }
            }
        }
    }

    map
}
