//! Tankwar CLI - Command-line interface
//!
//! Commands:
//! - turn: Answer one host turn read from stdin
//! - match: Play minimax against MCTS locally

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod match_cmd;
mod turn_cmd;

use tankwar_core::{MinimaxAI, MinimaxConfig, Strategy};
use tankwar_mcts::{MctsConfig, MctsPlayer};

#[derive(Parser)]
#[command(name = "tankwar")]
#[command(about = "Search agent for the two-side tank game")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read one turn snapshot from stdin and print the answer
    Turn(turn_cmd::TurnArgs),
    /// Play a match between minimax and MCTS
    Match(match_cmd::MatchArgs),
}

/// Search strategy selectable on the command line
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    Minimax,
    Mcts,
}

impl StrategyKind {
    pub fn build(self, depth: u32, seed: u64) -> Box<dyn Strategy> {
        match self {
            StrategyKind::Minimax => Box::new(MinimaxAI::new(
                MinimaxConfig {
                    max_depth: depth,
                    ..MinimaxConfig::default()
                },
                Default::default(),
            )),
            StrategyKind::Mcts => Box::new(MctsPlayer::new(MctsConfig {
                seed,
                ..MctsConfig::default()
            })),
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the host protocol
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Turn(args) => turn_cmd::run(args),
        Commands::Match(args) => match_cmd::run(args),
    }
}
