//! Grammar types.

use crate::types::{Map, Set};
use crate::util::FmtWith;
use std::fmt;

/// Separator between the left- and right-hand side of a production.
pub const RULE_SEP: &str = "->";

/// Marker denoting the empty right-hand side.
pub const EPSILON: &str = "~";

/// Name of the end-of-input terminal.
pub const EOI: &str = "$";

/// Name of the fresh start symbol introduced by augmentation.
pub const AUGMENTED_START: &str = "S'";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct SymbolID {
    raw: usize,
}

impl SymbolID {
    /// Reserved terminal symbol that means the end of input.
    pub const EOI: Self = Self::new(usize::MAX);
    /// Reserved nonterminal symbol `S'` inserted by augmentation.
    pub const START: Self = Self::new(usize::MAX - 1);

    const fn new(raw: usize) -> Self {
        Self { raw }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct RuleID {
    raw: usize,
}

impl RuleID {
    /// Reserved ID of the augmented rule `S' -> S`.
    pub const ACCEPT: Self = Self::new(0);

    const fn new(raw: usize) -> Self {
        Self { raw }
    }
}

impl fmt::Display for RuleID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SymbolKind {
    Terminal,
    Nonterminal,
}

#[derive(Debug)]
pub struct Symbol {
    name: String,
    kind: SymbolKind,
}

impl Symbol {
    /// The bare lexeme of this symbol, without the quotes of a terminal.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, SymbolKind::Terminal)
    }
}

/// A production rule in the grammar.
#[derive(Debug)]
pub struct Rule {
    left: SymbolID,
    right: Vec<SymbolID>,
    text: String,
}

impl Rule {
    /// The left-hand side of this production.
    pub fn left(&self) -> SymbolID {
        self.left
    }

    /// The right-hand side of this production. Empty for an epsilon rule.
    pub fn right(&self) -> &[SymbolID] {
        &self.right[..]
    }

    /// The verbatim production string this rule was parsed from.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn display<'g>(&'g self, grammar: &'g Grammar) -> impl fmt::Display + 'g {
        FmtWith(move |f: &mut std::fmt::Formatter<'_>| {
            write!(f, "{} {} ", grammar.symbol_name(self.left), RULE_SEP)?;
            if self.right.is_empty() {
                return f.write_str(EPSILON);
            }
            for (i, symbol) in self.right.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{}", grammar.symbol_text(*symbol))?;
            }
            Ok(())
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GrammarError {
    #[error("missing `->` separator in `{production}`")]
    MissingSeparator { production: String },

    #[error("left-hand side of `{production}` must be a single nonterminal")]
    MalformedLhs { production: String },

    #[error("reserved symbol `{symbol}` used in `{production}`")]
    ReservedSymbol { production: String, symbol: String },

    #[error("symbol `{name}` is used both quoted and unquoted")]
    SymbolKindConflict { name: String },

    #[error("malformed terminal `{token}` in `{production}`")]
    MalformedTerminal { production: String, token: String },

    #[error("`~` must be the entire right-hand side in `{production}`")]
    MisplacedEpsilon { production: String },

    #[error("grammar contains no productions")]
    Empty,
}

/// The grammar definition used to derive the parse table.
#[derive(Debug)]
pub struct Grammar {
    symbols: Map<SymbolID, Symbol>,
    rules: Map<RuleID, Rule>,
    terminals: Set<SymbolID>,
    nonterminals: Set<SymbolID>,
    start: SymbolID,
}

impl Grammar {
    /// Parse a grammar from a sequence of production strings of the shape
    /// `LHS -> RHS`, where RHS is a whitespace-separated list of symbols,
    /// terminals are single-quoted and a sole `~` denotes the empty RHS.
    ///
    /// The first production defines the start symbol. The returned grammar
    /// is already augmented.
    pub fn parse<I>(productions: I) -> Result<Self, GrammarError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut parser = Parser::default();
        for production in productions {
            parser.production(production.as_ref())?;
        }
        let mut grammar = parser.finish()?;
        grammar.augment();
        Ok(grammar)
    }

    /// Insert the augmented rule `S' -> S` at index 0 and register `$` as a
    /// terminal. A no-op when the grammar is already augmented.
    pub fn augment(&mut self) {
        if self.symbols.contains_key(&SymbolID::START) {
            return;
        }

        self.symbols.insert(
            SymbolID::START,
            Symbol {
                name: AUGMENTED_START.to_owned(),
                kind: SymbolKind::Nonterminal,
            },
        );
        self.nonterminals.insert(SymbolID::START);

        self.symbols.insert(
            SymbolID::EOI,
            Symbol {
                name: EOI.to_owned(),
                kind: SymbolKind::Terminal,
            },
        );
        self.terminals.insert(SymbolID::EOI);

        let accept = Rule {
            left: SymbolID::START,
            right: vec![self.start],
            text: format!(
                "{} {} {}",
                AUGMENTED_START,
                RULE_SEP,
                self.symbol_name(self.start)
            ),
        };
        let mut rules = Map::default();
        rules.insert(RuleID::ACCEPT, accept);
        rules.extend(self.rules.drain(..));
        self.rules = rules;
    }

    pub fn symbol(&self, id: SymbolID) -> &Symbol {
        &self.symbols[&id]
    }

    pub fn symbol_name(&self, id: SymbolID) -> &str {
        self.symbol(id).name()
    }

    /// The symbol as it appears in grammar text and in the emitted table
    /// header: terminals carry their quotes, `$` stays bare.
    pub fn symbol_text(&self, id: SymbolID) -> impl fmt::Display + '_ {
        FmtWith(move |f: &mut std::fmt::Formatter<'_>| {
            let symbol = self.symbol(id);
            if symbol.is_terminal() && id != SymbolID::EOI {
                write!(f, "'{}'", symbol.name())
            } else {
                f.write_str(symbol.name())
            }
        })
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolID, &Symbol)> + '_ {
        self.symbols.iter().map(|(id, symbol)| (*id, symbol))
    }

    pub fn terminals(&self) -> impl Iterator<Item = SymbolID> + '_ {
        self.terminals.iter().copied()
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = SymbolID> + '_ {
        self.nonterminals.iter().copied()
    }

    pub fn rules(&self) -> impl Iterator<Item = (RuleID, &Rule)> + '_ {
        self.rules.iter().map(|(id, rule)| (*id, rule))
    }

    pub fn rule(&self, id: RuleID) -> &Rule {
        &self.rules[&id]
    }

    /// All rules whose left-hand side is `left`.
    pub fn rules_for(&self, left: SymbolID) -> impl Iterator<Item = (RuleID, &Rule)> + '_ {
        self.rules().filter(move |(_, rule)| rule.left == left)
    }

    pub fn start_symbol(&self) -> SymbolID {
        self.start
    }
}

impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "terminals: ")?;
        for (i, id) in self.terminals().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.symbol_text(id))?;
        }
        write!(f, "\nnonterminals: ")?;
        for (i, id) in self.nonterminals().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.symbol_name(id))?;
        }
        writeln!(f, "\nstart: {}", self.symbol_name(self.start))?;
        writeln!(f, "rules:")?;
        for (id, rule) in self.rules() {
            writeln!(f, "  [{:02}] {}", id, rule.display(self))?;
        }
        Ok(())
    }
}

/// A classified RHS token.
enum Token<'a> {
    Terminal(&'a str),
    Nonterminal(&'a str),
    Epsilon,
}

/// Tokenize a production fragment on whitespace; empty fragments vanish.
fn symbols_of(fragment: &str) -> impl Iterator<Item = &str> {
    fragment.split_whitespace()
}

/// A token is a terminal iff it is quoted; `~` is neither kind.
fn classify<'a>(token: &'a str, production: &str) -> Result<Token<'a>, GrammarError> {
    if token == EPSILON {
        return Ok(Token::Epsilon);
    }
    if token == EOI || token == AUGMENTED_START {
        return Err(GrammarError::ReservedSymbol {
            production: production.to_owned(),
            symbol: token.to_owned(),
        });
    }
    if token.starts_with('\'') || token.ends_with('\'') {
        if token.len() >= 3 && token.starts_with('\'') && token.ends_with('\'') {
            let name = &token[1..token.len() - 1];
            ensure_not_reserved(name, production)?;
            return Ok(Token::Terminal(name));
        }
        return Err(GrammarError::MalformedTerminal {
            production: production.to_owned(),
            token: token.to_owned(),
        });
    }
    Ok(Token::Nonterminal(token))
}

fn ensure_not_reserved(name: &str, production: &str) -> Result<(), GrammarError> {
    if matches!(name, EPSILON | EOI | AUGMENTED_START) {
        return Err(GrammarError::ReservedSymbol {
            production: production.to_owned(),
            symbol: name.to_owned(),
        });
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Parser {
    symbols: Map<SymbolID, Symbol>,
    rules: Map<RuleID, Rule>,
    terminals: Set<SymbolID>,
    nonterminals: Set<SymbolID>,
    start: Option<SymbolID>,
}

impl Parser {
    fn add_symbol(&mut self, name: &str, kind: SymbolKind) -> Result<SymbolID, GrammarError> {
        match self.symbols.iter().find(|(_, sym)| sym.name == name) {
            Some((id, sym)) => {
                if sym.kind != kind {
                    return Err(GrammarError::SymbolKindConflict {
                        name: name.to_owned(),
                    });
                }
                Ok(*id)
            }
            None => {
                let id = SymbolID::new(self.symbols.len());
                self.symbols.insert(
                    id,
                    Symbol {
                        name: name.to_owned(),
                        kind,
                    },
                );
                match kind {
                    SymbolKind::Terminal => self.terminals.insert(id),
                    SymbolKind::Nonterminal => self.nonterminals.insert(id),
                };
                Ok(id)
            }
        }
    }

    fn production(&mut self, production: &str) -> Result<(), GrammarError> {
        let text = production.trim().to_owned();
        let (lhs, rhs) =
            text.split_once(RULE_SEP)
                .ok_or_else(|| GrammarError::MissingSeparator {
                    production: text.clone(),
                })?;

        let lhs_tokens: Vec<&str> = symbols_of(lhs).collect();
        let left = match lhs_tokens[..] {
            [token] => match classify(token, &text)? {
                Token::Nonterminal(name) => self.add_symbol(name, SymbolKind::Nonterminal)?,
                _ => {
                    return Err(GrammarError::MalformedLhs {
                        production: text.clone(),
                    })
                }
            },
            _ => {
                return Err(GrammarError::MalformedLhs {
                    production: text.clone(),
                })
            }
        };

        let rhs_tokens: Vec<&str> = symbols_of(rhs).collect();
        let right = if rhs_tokens.len() == 1 && rhs_tokens[0] == EPSILON {
            vec![]
        } else {
            let mut right = Vec::with_capacity(rhs_tokens.len());
            for token in &rhs_tokens {
                let id = match classify(token, &text)? {
                    Token::Terminal(name) => self.add_symbol(name, SymbolKind::Terminal)?,
                    Token::Nonterminal(name) => self.add_symbol(name, SymbolKind::Nonterminal)?,
                    Token::Epsilon => {
                        return Err(GrammarError::MisplacedEpsilon {
                            production: text.clone(),
                        })
                    }
                };
                right.push(id);
            }
            right
        };

        self.start.get_or_insert(left);

        // User rules are numbered from 1; augmentation fills index 0.
        let id = RuleID::new(self.rules.len() + 1);
        self.rules.insert(id, Rule { left, right, text });

        Ok(())
    }

    fn finish(self) -> Result<Grammar, GrammarError> {
        let start = self.start.ok_or(GrammarError::Empty)?;
        Ok(Grammar {
            symbols: self.symbols,
            rules: self.rules,
            terminals: self.terminals,
            nonterminals: self.nonterminals,
            start,
        })
    }
}
