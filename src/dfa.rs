//! LR(1) DFA generation.

use crate::first_sets::{FirstSets, FirstSetsError};
use crate::grammar::{Grammar, RuleID, SymbolID, RULE_SEP};
use crate::types::{Map, Queue};
use crate::util::FmtWith;
use std::{
    collections::{BTreeSet, VecDeque},
    fmt,
};

#[derive(Debug, thiserror::Error)]
pub enum DFAError {
    #[error("error during first-set calculation")]
    FirstSets(
        #[from]
        #[source]
        FirstSetsError,
    ),
}

// LR(1) item
// X -> Y1 Y2 ... Yn という構文規則があったとき、それに
//  * マーカ位置
//  * 先読み記号
// を付与したもの
// example:
//   [ X -> @ Y1   Y2 ... Yn ]
//   [ X ->   Y1 @ Y2 ... Yn ]
//   [ X ->   Y1   Y2 ... Yn @ ]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LRItem {
    // grammer内におけるruleの識別子
    pub rule_id: RuleID,
    // marker位置
    pub marker: usize,
    // 先読み記号
    pub lookahead: SymbolID,
}

impl LRItem {
    /// The symbol immediately after the marker, if any.
    pub fn next_symbol(&self, grammar: &Grammar) -> Option<SymbolID> {
        grammar.rule(self.rule_id).right().get(self.marker).copied()
    }

    pub fn is_next_nonterminal(&self, grammar: &Grammar) -> bool {
        self.next_symbol(grammar)
            .map_or(false, |id| !grammar.symbol(id).is_terminal())
    }

    /// The symbols strictly after the next symbol, i.e. the `beta` of an
    /// item `[A -> alpha @ B beta, a]`.
    pub fn beta<'g>(&self, grammar: &'g Grammar) -> &'g [SymbolID] {
        let right = grammar.rule(self.rule_id).right();
        &right[(self.marker + 1).min(right.len())..]
    }

    /// The same item with the marker moved one symbol to the right.
    pub fn advanced(&self) -> Self {
        Self {
            marker: self.marker + 1,
            ..*self
        }
    }

    /// The marker has passed the end of the production.
    pub fn is_reducing(&self, grammar: &Grammar) -> bool {
        self.marker >= grammar.rule(self.rule_id).right().len()
    }

    /// This item belongs to the augmented rule `S' -> S`.
    pub fn is_augmented(&self) -> bool {
        self.rule_id == RuleID::ACCEPT
    }

    pub fn display<'g>(&self, grammar: &'g Grammar) -> impl fmt::Display + 'g {
        let item = *self;
        FmtWith(move |f: &mut std::fmt::Formatter<'_>| {
            let rule = grammar.rule(item.rule_id);
            write!(
                f,
                "[{} {}",
                grammar.symbol_name(rule.left()),
                RULE_SEP
            )?;
            for (i, symbol) in rule.right().iter().enumerate() {
                if i == item.marker {
                    f.write_str(" @")?;
                }
                write!(f, " {}", grammar.symbol_text(*symbol))?;
            }
            if item.marker == rule.right().len() {
                f.write_str(" @")?;
            }
            write!(
                f,
                "] {{ {} }}",
                grammar.symbol_text(item.lookahead)
            )
        })
    }
}

// 各状態のitem setは、挿入順に依存しない正準な列として保持する
type LRItemSet = BTreeSet<LRItem>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NodeID {
    raw: usize,
}

impl NodeID {
    /// The state seeded with the closure of `[S' -> @ S, $]`.
    pub const START: Self = Self::new(0);

    const fn new(raw: usize) -> Self {
        Self { raw }
    }

    /// The position of this state in the canonical collection.
    pub const fn index(self) -> usize {
        self.raw
    }
}

impl fmt::Display for NodeID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.raw, f)
    }
}

#[derive(Debug)]
pub struct DFANode {
    // 各DFA nodeに所属するLR item set
    item_set: LRItemSet,
    // 各DFAノード起点のedge
    edges: Map<SymbolID, NodeID>,
}

impl DFANode {
    pub fn items(&self) -> impl Iterator<Item = &LRItem> + '_ {
        self.item_set.iter()
    }

    pub fn edges(&self) -> impl Iterator<Item = (SymbolID, NodeID)> + '_ {
        self.edges.iter().map(|(symbol, target)| (*symbol, *target))
    }

    /// The recorded transition on `symbol`, if any.
    pub fn edge(&self, symbol: SymbolID) -> Option<NodeID> {
        self.edges.get(&symbol).copied()
    }
}

#[derive(Debug)]
pub struct DFA {
    nodes: Map<NodeID, DFANode>,
}

impl DFA {
    pub fn generate(grammar: &Grammar) -> Result<Self, DFAError> {
        let first_sets = FirstSets::new(grammar)?;
        Ok(DFAGenerator {
            grammar,
            first_sets,
        }
        .generate())
    }

    /// States in the order of their first discovery.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeID, &DFANode)> + '_ {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    pub fn node(&self, id: NodeID) -> &DFANode {
        &self.nodes[&id]
    }

    pub fn start_node(&self) -> &DFANode {
        self.node(NodeID::START)
    }

    pub fn state_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn display<'g>(&'g self, grammar: &'g Grammar) -> impl fmt::Display + 'g {
        FmtWith(move |f: &mut std::fmt::Formatter<'_>| {
            for (id, node) in self.nodes() {
                writeln!(f, "- {:02}:", id)?;
                writeln!(f, "  item_set:")?;
                for item in node.items() {
                    writeln!(f, "  - {}", item.display(grammar))?;
                }
                if !node.edges.is_empty() {
                    writeln!(f, "  edges:")?;
                    for (symbol, target) in node.edges() {
                        writeln!(f, "  - {} -> {:02}", grammar.symbol_text(symbol), target)?;
                    }
                }
            }
            Ok(())
        })
    }
}

#[derive(Debug)]
struct DFAGenerator<'g> {
    grammar: &'g Grammar,
    first_sets: FirstSets,
}

impl<'g> DFAGenerator<'g> {
    fn generate(&self) -> DFA {
        let mut nodes: Map<NodeID, DFANode> = Map::default();

        // 展開済みitem setから状態番号への索引。内容が一致する集合は
        // 最初に発見された状態を再利用する
        let mut known: Map<LRItemSet, NodeID> = Map::default();

        // 遷移先の抽出が未完了なノード
        let mut pending: VecDeque<(NodeID, LRItemSet)> = VecDeque::new();
        pending.push_back({
            // 初期ノードの構築: closure({ [S' -> @ S, $] })
            let mut item_set = LRItemSet::new();
            item_set.insert(LRItem {
                rule_id: RuleID::ACCEPT,
                marker: 0,
                lookahead: SymbolID::EOI,
            });
            self.expand_closures(&mut item_set);
            known.insert(item_set.clone(), NodeID::START);
            (NodeID::START, item_set)
        });

        // 新規にノードが生成されなくなるまで繰り返す
        while let Some((id, item_set)) = pending.pop_front() {
            let mut edges = Map::default();

            // 遷移先のitems setを生成する
            for (symbol, mut new_item_set) in self.extract_transitions(&item_set) {
                self.expand_closures(&mut new_item_set);

                let target = match known.get(&new_item_set) {
                    Some(&target) => target,
                    None => {
                        let target = NodeID::new(known.len());
                        known.insert(new_item_set.clone(), target);
                        pending.push_back((target, new_item_set));
                        target
                    }
                };
                edges.insert(symbol, target);
            }

            nodes.insert(id, DFANode { item_set, edges });
        }

        DFA { nodes }
    }

    /// クロージャ展開
    fn expand_closures(&self, items: &mut LRItemSet) {
        let mut queue: Queue<LRItem> = items.iter().copied().collect();
        while let Some(item) = queue.pop() {
            // [X -> ... @ Y beta]
            //  Y: one nonterminal symbol
            let y_symbol = match item.next_symbol(self.grammar) {
                Some(id) if !self.grammar.symbol(id).is_terminal() => id,
                _ => continue,
            };
            let beta = item.beta(self.grammar);

            // b \in First(beta a)
            let lookaheads = self.first_sets.get(beta, item.lookahead);

            // Y: ... という形式の構文規則から [Y -> @ gamma, b] を追加する
            for (rule_id, _rule) in self.grammar.rules_for(y_symbol) {
                for &b in &lookaheads {
                    let added = LRItem {
                        rule_id,
                        marker: 0,
                        lookahead: b,
                    };
                    if items.insert(added) {
                        queue.push(added);
                    }
                }
            }
        }
    }

    /// 指定したLRアイテム集合から遷移先のLRアイテム集合（未展開）とラベルを抽出する
    fn extract_transitions(&self, items: &LRItemSet) -> Map<SymbolID, LRItemSet> {
        let mut item_sets: Map<SymbolID, LRItemSet> = Map::default();
        for item in items {
            // markerが終わりまで到達していれば無視する
            let label = match item.next_symbol(self.grammar) {
                Some(label) => label,
                None => continue,
            };
            item_sets.entry(label).or_default().insert(item.advanced());
        }
        item_sets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn symbol(grammar: &Grammar, name: &str) -> SymbolID {
        grammar
            .symbols()
            .find(|(_, sym)| sym.name() == name)
            .map(|(id, _)| id)
            .unwrap_or_else(|| panic!("unknown symbol {name}"))
    }

    fn generator(grammar: &Grammar) -> DFAGenerator<'_> {
        DFAGenerator {
            grammar,
            first_sets: FirstSets::new(grammar).unwrap(),
        }
    }

    #[test]
    fn closure_is_a_fixpoint() {
        let grammar = Grammar::parse(["S -> F", "S -> '(' S '+' F ')'", "F -> 'a'"]).unwrap();
        let gen = generator(&grammar);

        let mut items = LRItemSet::new();
        items.insert(LRItem {
            rule_id: RuleID::ACCEPT,
            marker: 0,
            lookahead: SymbolID::EOI,
        });
        let seed = items.clone();
        assert!(seed.first().unwrap().is_next_nonterminal(&grammar));
        gen.expand_closures(&mut items);

        assert!(items.is_superset(&seed));

        let mut again = items.clone();
        gen.expand_closures(&mut again);
        assert_eq!(again, items);
    }

    #[test]
    fn goto_reuses_existing_states() {
        let grammar = Grammar::parse([
            "E -> T X",
            "X -> '+' T X",
            "X -> ~",
            "T -> F Y",
            "Y -> '*' F Y",
            "Y -> ~",
            "F -> 'a'",
            "F -> '(' E ')'",
        ])
        .unwrap();
        let dfa = DFA::generate(&grammar).unwrap();

        // No two states hold the same item set.
        let sets: HashSet<_> = dfa.nodes().map(|(_, node)| node.item_set.clone()).collect();
        assert_eq!(sets.len(), dfa.state_count());

        // Every recorded transition points at a state of the collection.
        for (_, node) in dfa.nodes() {
            for (symbol, target) in node.edges() {
                assert!(target.index() < dfa.state_count());
                assert!(!grammar.symbol_name(symbol).is_empty());
            }
        }
    }

    #[test]
    fn dragon_book_collection_has_ten_states() {
        let grammar = Grammar::parse(["S -> C C", "C -> 'c' C", "C -> 'd'"]).unwrap();
        let dfa = DFA::generate(&grammar).unwrap();
        assert_eq!(dfa.state_count(), 10);
    }

    #[test]
    fn lookahead_contexts_are_not_merged() {
        // LR(1) but not LALR(1): the two reduction contexts of A and B must
        // stay separate states.
        let grammar = Grammar::parse([
            "S -> A 'a' A 'b'",
            "S -> B 'b' B 'a'",
            "A -> ~",
            "B -> ~",
        ])
        .unwrap();
        let dfa = DFA::generate(&grammar).unwrap();

        let a = symbol(&grammar, "A");
        let b = symbol(&grammar, "B");

        // (lhs, lookahead) -> states reducing by the empty rule
        let mut reductions: Vec<(SymbolID, SymbolID, NodeID)> = Vec::new();
        for (id, node) in dfa.nodes() {
            for item in node.items() {
                let left = grammar.rule(item.rule_id).left();
                if item.is_reducing(&grammar) && (left == a || left == b) {
                    reductions.push((left, item.lookahead, id));
                }
            }
        }

        assert!(reductions.len() >= 4);
        for (left, lookahead) in [
            (a, symbol(&grammar, "a")),
            (a, symbol(&grammar, "b")),
            (b, symbol(&grammar, "a")),
            (b, symbol(&grammar, "b")),
        ] {
            assert!(
                reductions.iter().any(|&(l, la, _)| l == left && la == lookahead),
                "missing reduction of {} on {}",
                grammar.symbol_name(left),
                grammar.symbol_name(lookahead),
            );
        }

        // The two lookahead contexts of each empty rule live in different states.
        for left in [a, b] {
            let states: HashSet<_> = reductions
                .iter()
                .filter(|&&(l, _, _)| l == left)
                .map(|&(_, _, id)| id)
                .collect();
            assert!(states.len() >= 2);
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let grammar = Grammar::parse([
            "S -> S ';' A",
            "S -> A",
            "A -> E",
            "A -> 'i' '=' E",
            "E -> E '+' 'i'",
            "E -> 'i'",
        ])
        .unwrap();

        let first = DFA::generate(&grammar).unwrap();
        let second = DFA::generate(&grammar).unwrap();
        assert_eq!(
            first.display(&grammar).to_string(),
            second.display(&grammar).to_string()
        );
    }
}
