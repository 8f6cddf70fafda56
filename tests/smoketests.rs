use lr1gen::dfa::DFA;
use lr1gen::grammar::{Grammar, SymbolID};
use lr1gen::parse_table::{Cell, ConflictKind, ParseTable, ParseTableError};

const PAREN_SUM: &[&str] = &[
    "S -> F", //
    "S -> '(' S '+' F ')'",
    "F -> 'a'",
];

const EXPR_SUFFIX: &[&str] = &[
    "E -> T X",
    "X -> '+' T X",
    "X -> ~",
    "T -> F Y",
    "Y -> '*' F Y",
    "Y -> ~",
    "F -> 'a'",
    "F -> '(' E ')'",
];

const DRAGON_CC: &[&str] = &[
    "S -> C C", //
    "C -> 'c' C",
    "C -> 'd'",
];

const ASSIGNMENTS: &[&str] = &[
    "S -> S ';' A",
    "S -> A",
    "A -> E",
    "A -> 'i' '=' E",
    "E -> E '+' 'i'",
    "E -> 'i'",
];

const NOT_LALR: &[&str] = &[
    "S -> A 'a' A 'b'",
    "S -> B 'b' B 'a'",
    "A -> ~",
    "B -> ~",
];

const DANGLING_ELSE: &[&str] = &[
    "S -> 'if' E 'then' S",
    "S -> 'if' E 'then' S 'else' S",
    "S -> 'a'",
    "E -> 'b'",
];

fn generate(productions: &[&str]) -> (Grammar, DFA, Result<ParseTable, ParseTableError>) {
    let grammar = Grammar::parse(productions.iter().copied()).unwrap();
    let dfa = DFA::generate(&grammar).unwrap();
    let table = ParseTable::generate(&grammar, &dfa);
    (grammar, dfa, table)
}

fn accept_states(table: &ParseTable) -> Vec<usize> {
    table
        .rows()
        .enumerate()
        .filter(|(_, row)| row.contains(&Cell::Accept))
        .map(|(state, _)| state)
        .collect()
}

#[test]
fn paren_sum_grammar() {
    let (grammar, dfa, table) = generate(PAREN_SUM);
    let table = table.unwrap();

    // A single accepting state, entered by the goto on the start symbol.
    let target = dfa.start_node().edge(grammar.start_symbol()).unwrap();
    assert_eq!(accept_states(&table), [target.index()]);
    assert_eq!(table.cell(target, SymbolID::EOI), Cell::Accept);
}

#[test]
fn expr_suffix_grammar_is_conflict_free() {
    let (grammar, _dfa, table) = generate(EXPR_SUFFIX);
    let table = table.unwrap();

    assert_eq!(accept_states(&table).len(), 1);
    // ACTION region: the five quoted terminals plus `$`; GOTO region: every
    // nonterminal except `S'`.
    assert_eq!(table.action_columns(), 6);
    assert_eq!(table.action_columns(), grammar.terminals().count());
    assert_eq!(
        table.columns().len(),
        grammar.terminals().count() + grammar.nonterminals().count() - 1
    );
}

#[test]
fn dragon_cc_grammar_matches_the_book() {
    let (_grammar, dfa, table) = generate(DRAGON_CC);
    assert_eq!(dfa.state_count(), 10);
    table.unwrap();
}

#[test]
fn left_recursive_grammar_terminates_without_conflicts() {
    let (_grammar, _dfa, table) = generate(ASSIGNMENTS);
    table.unwrap();
}

#[test]
fn lr1_but_not_lalr1_grammar_is_conflict_free() {
    let (grammar, dfa, table) = generate(NOT_LALR);
    table.unwrap();

    // The empty-rule reductions of A and B appear under both lookaheads,
    // spread over distinct states.
    let mut reducing_states = std::collections::HashSet::new();
    for (id, node) in dfa.nodes() {
        for item in node.items() {
            let left = grammar.rule(item.rule_id).left();
            if item.is_reducing(&grammar) && grammar.rule(item.rule_id).right().is_empty() {
                reducing_states.insert((id, left, item.lookahead));
            }
        }
    }
    assert!(reducing_states.len() >= 4);
}

#[test]
fn dangling_else_reports_exactly_one_conflict() {
    let (_grammar, _dfa, table) = generate(DANGLING_ELSE);

    let conflicts = match table.unwrap_err() {
        ParseTableError::Conflicts(conflicts) => conflicts,
        err => panic!("unexpected error: {err}"),
    };
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].kind, ConflictKind::ShiftReduce);
    assert_eq!(conflicts[0].symbol, "'else'");

    // The report names both competing actions.
    let rendered = conflicts[0].to_string();
    assert!(rendered.contains("s"), "{rendered}");
    assert!(rendered.contains("rS -> 'if' E 'then' S"), "{rendered}");
}

#[test]
fn output_is_bit_identical_across_runs() {
    let render = || {
        let (grammar, dfa, table) = generate(EXPR_SUFFIX);
        format!(
            "{}\n{}",
            dfa.display(&grammar),
            table.unwrap().display(&grammar)
        )
    };
    assert_eq!(render(), render());
}
