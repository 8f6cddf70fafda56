use anyhow::Context as _;
use clap::{Parser, ValueEnum};
use lr1gen::{dfa::DFA, first_sets::FirstSets, grammar::Grammar, parse_table::ParseTable};
use std::{fs, path::PathBuf, time::Instant};
use tracing_subscriber::EnvFilter;

// Grammar 1
const G1: &[&str] = &[
    "S -> F", //
    "S -> '(' S '+' F ')'",
    "F -> 'a'",
];

// Grammar 2
const G2: &[&str] = &[
    "E -> T X",
    "X -> '+' T X",
    "X -> ~",
    "T -> F Y",
    "Y -> '*' F Y",
    "Y -> ~",
    "F -> 'a'",
    "F -> '(' E ')'",
];

// Grammar 6
const G6: &[&str] = &[
    "E -> T R",
    "R -> ~",
    "R -> '+' E",
    "T -> F S",
    "S -> ~",
    "S -> '*' T",
    "F -> 'n'",
    "F -> '(' E ')'",
];

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The built-in grammar to generate the parse table for.
    #[arg(long, value_enum, default_value_t = DemoGrammar::G2)]
    grammar: DemoGrammar,

    /// The path of the emitted parse table file.
    output: PathBuf,
}

#[derive(Debug, Copy, Clone, PartialEq, ValueEnum)]
enum DemoGrammar {
    G1,
    G2,
    G6,
}

impl DemoGrammar {
    fn productions(self) -> &'static [&'static str] {
        match self {
            Self::G1 => G1,
            Self::G2 => G2,
            Self::G6 => G6,
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    tracing::debug!("parsed CLI args = {:?}", args);

    process(&args)
        .with_context(|| anyhow::anyhow!("errored during generating {}", args.output.display()))?;

    Ok(())
}

fn process(args: &Args) -> anyhow::Result<()> {
    let grammar =
        Grammar::parse(args.grammar.productions().iter().copied()).context("loading grammar")?;
    tracing::debug!("grammar:\n{}", grammar);

    let s = Instant::now();
    let first_sets = FirstSets::new(&grammar)?;
    tracing::debug!("first sets:\n{}", first_sets.display(&grammar));

    let dfa = DFA::generate(&grammar)?;
    tracing::info!(
        "generated the canonical collection: {} states, {:?} elapsed",
        dfa.state_count(),
        s.elapsed()
    );

    let table = ParseTable::generate(&grammar, &dfa)?;

    fs::write(&args.output, table.display(&grammar).to_string())
        .with_context(|| format!("writing parse table to {}", args.output.display()))?;

    Ok(())
}
