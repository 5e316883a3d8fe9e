//! Turn command - answer one host request
//!
//! Reads a `TurnInput` snapshot from stdin, rebuilds the game by replaying
//! it, searches, and writes one `TurnOutput` JSON line to stdout.

use std::io::Read;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;

use tankwar_core::protocol::Session;
use tankwar_core::{RuleSet, TurnInput, TurnOutput};

use crate::StrategyKind;

#[derive(Args)]
pub struct TurnArgs {
    /// Search strategy
    #[arg(long, value_enum, default_value = "minimax")]
    pub strategy: StrategyKind,

    /// Time budget for the whole turn in milliseconds
    #[arg(long, default_value = "900")]
    pub budget_ms: u64,

    /// Minimax search depth
    #[arg(long, default_value = "4")]
    pub depth: u32,

    /// MCTS rollout seed (random when absent)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Ruleset JSON file (standard rules when absent)
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,
}

pub fn run(args: TurnArgs) -> Result<()> {
    let start = Instant::now();
    let deadline = start + Duration::from_millis(args.budget_ms);

    let rules = load_rules(args.rules.as_deref())?;
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("Failed to read turn snapshot from stdin")?;
    let Session { mut state, side } = TurnInput::parse(&input)
        .and_then(|turn| turn.replay(&rules))
        .context("Failed to rebuild game from snapshot")?;

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut strategy = args.strategy.build(args.depth, seed);
    let decision = strategy
        .decide(&mut state, side, deadline)
        .with_context(|| format!("{} search failed", strategy.name()))?;

    tracing::info!(
        turn = state.turn(),
        ?side,
        strategy = strategy.name(),
        actions = ?decision.actions,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "turn answered"
    );

    let output = TurnOutput::from(decision);
    println!("{}", serde_json::to_string(&output)?);
    Ok(())
}

/// Ruleset from file, or the standard one
pub fn load_rules(path: Option<&std::path::Path>) -> Result<RuleSet> {
    match path {
        Some(path) => RuleSet::load(path).with_context(|| format!("Failed to load ruleset: {}", path.display())),
        None => Ok(RuleSet::default()),
    }
}
