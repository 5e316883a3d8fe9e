//! Match command - play minimax against MCTS
//!
//! ## Architecture (4-layer granularity)
//!
//! - Level 1: run() - orchestration
//! - Level 2: load_setup(), play_match(), report_results()
//! - Level 3: play_single_game(), compute_match_statistics()
//! - Level 4: formatting utilities

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Args;

use tankwar_core::{GameResult, GameState, Layout, Round, RuleSet, Side, Strategy};

use crate::turn_cmd::load_rules;
use crate::StrategyKind;

// ============================================================================
// COMMAND ARGUMENTS (Level 4 - Configuration)
// ============================================================================

#[derive(Args)]
pub struct MatchArgs {
    /// Number of games to play (will alternate colors)
    #[arg(long, default_value = "10")]
    pub games: usize,

    /// Terrain layout JSON file (open field when absent)
    #[arg(long, value_name = "FILE")]
    pub layout: Option<PathBuf>,

    /// Ruleset JSON file (standard rules when absent)
    #[arg(long, value_name = "FILE")]
    pub rules: Option<PathBuf>,

    /// Time budget per side per turn in milliseconds
    #[arg(long, default_value = "200")]
    pub budget_ms: u64,

    /// Minimax search depth
    #[arg(long, default_value = "4")]
    pub depth: u32,

    /// MCTS seed; each game uses seed + game number
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

/// Result of a single game
#[derive(Clone, Debug)]
struct GameRecord {
    game_number: usize,
    result: GameResult,
    rounds: u32,
    minimax_side: Side,
}

impl GameRecord {
    fn winner(&self) -> Option<StrategyKind> {
        self.result.winner().map(|side| {
            if side == self.minimax_side {
                StrategyKind::Minimax
            } else {
                StrategyKind::Mcts
            }
        })
    }
}

/// Aggregated match results
#[derive(Clone, Debug)]
struct MatchResults {
    games: Vec<GameRecord>,
    minimax_wins: usize,
    mcts_wins: usize,
    draws: usize,
    avg_rounds: f32,
}

// ============================================================================
// LEVEL 1 - ORCHESTRATION
// ============================================================================

/// Run match command
///
/// 1. Load ruleset and terrain
/// 2. Play the match (multiple games)
/// 3. Report results
pub fn run(args: MatchArgs) -> Result<()> {
    let (rules, layout) = load_setup(&args)?;

    tracing::info!(
        "Starting match: minimax vs mcts on {} ({} games, depth={}, budget={}ms)",
        rules.name,
        args.games,
        args.depth,
        args.budget_ms
    );

    let results = play_match(&rules, &layout, &args)?;

    report_results(&results, &args)
}

// ============================================================================
// LEVEL 2 - PHASES
// ============================================================================

/// Load the ruleset and terrain layout
fn load_setup(args: &MatchArgs) -> Result<(RuleSet, Layout)> {
    let rules = load_rules(args.rules.as_deref())?;
    let layout = match &args.layout {
        Some(path) => Layout::load(path).with_context(|| format!("Failed to load layout: {}", path.display()))?,
        None => Layout::default(),
    };
    Ok((rules, layout))
}

/// Play all games in the match
fn play_match(rules: &RuleSet, layout: &Layout, args: &MatchArgs) -> Result<MatchResults> {
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut games = Vec::with_capacity(args.games);

    for game_num in 0..args.games {
        // Alternate colors for fairness
        let minimax_side = if game_num % 2 == 0 { Side::Blue } else { Side::Red };

        let record = play_single_game(
            rules,
            layout,
            game_num + 1,
            minimax_side,
            seed.wrapping_add(game_num as u64),
            args,
        )?;

        tracing::info!(
            "Game {}: {:?} ({} rounds, minimax as {:?})",
            record.game_number,
            record.result,
            record.rounds,
            record.minimax_side
        );

        games.push(record);
    }

    Ok(compute_match_statistics(games))
}

/// Report match results
fn report_results(results: &MatchResults, args: &MatchArgs) -> Result<()> {
    if args.json {
        print_json_results(results)
    } else {
        print_text_results(results);
        Ok(())
    }
}

// ============================================================================
// LEVEL 3 - STEPS
// ============================================================================

/// Play one game to completion, both sides searching every round
fn play_single_game(
    rules: &RuleSet,
    layout: &Layout,
    game_number: usize,
    minimax_side: Side,
    seed: u64,
    args: &MatchArgs,
) -> Result<GameRecord> {
    let mut state = GameState::new(rules.clone(), layout).context("Failed to set up game")?;
    let minimax = StrategyKind::Minimax.build(args.depth, seed);
    let mcts = StrategyKind::Mcts.build(args.depth, seed);
    let mut players: [Box<dyn Strategy>; 2] = if minimax_side == Side::Blue {
        [minimax, mcts]
    } else {
        [mcts, minimax]
    };
    let budget = Duration::from_millis(args.budget_ms);

    while !state.result().is_over() {
        let mut round = Round::hold();
        for side in Side::BOTH {
            let player = &mut players[side.index()];
            let decision = player
                .decide(&mut state, side, Instant::now() + budget)
                .with_context(|| format!("{} failed on turn {}", player.name(), state.turn()))?;
            round = round.with_pair(side, decision.actions);
        }
        state
            .apply_round(&round)
            .with_context(|| format!("Game {} rejected a chosen round", game_number))?;
    }

    Ok(GameRecord {
        game_number,
        result: state.result(),
        rounds: u32::from(state.turn()) - 1,
        minimax_side,
    })
}

/// Compute aggregate statistics from game records
fn compute_match_statistics(games: Vec<GameRecord>) -> MatchResults {
    let count = |kind: Option<StrategyKind>| games.iter().filter(|g| g.winner() == kind).count();
    let minimax_wins = count(Some(StrategyKind::Minimax));
    let mcts_wins = count(Some(StrategyKind::Mcts));
    let draws = count(None);

    let total_rounds: u32 = games.iter().map(|g| g.rounds).sum();
    let avg_rounds = if games.is_empty() {
        0.0
    } else {
        total_rounds as f32 / games.len() as f32
    };

    MatchResults {
        games,
        minimax_wins,
        mcts_wins,
        draws,
        avg_rounds,
    }
}

// ============================================================================
// LEVEL 4 - UTILITIES
// ============================================================================

/// Print results as JSON
fn print_json_results(results: &MatchResults) -> Result<()> {
    println!("{}", render_json_results(results)?);
    Ok(())
}

/// Pretty JSON report of a finished match
fn render_json_results(results: &MatchResults) -> Result<String> {
    #[derive(serde::Serialize)]
    struct JsonGame {
        game_number: usize,
        result: String,
        rounds: u32,
        minimax_side: String,
    }

    #[derive(serde::Serialize)]
    struct JsonOutput {
        total_games: usize,
        minimax_wins: usize,
        mcts_wins: usize,
        draws: usize,
        avg_rounds: f32,
        games: Vec<JsonGame>,
    }

    let output = JsonOutput {
        total_games: results.games.len(),
        minimax_wins: results.minimax_wins,
        mcts_wins: results.mcts_wins,
        draws: results.draws,
        avg_rounds: results.avg_rounds,
        games: results
            .games
            .iter()
            .map(|g| JsonGame {
                game_number: g.game_number,
                result: format!("{:?}", g.result),
                rounds: g.rounds,
                minimax_side: format!("{:?}", g.minimax_side),
            })
            .collect(),
    };

    serde_json::to_string_pretty(&output).context("Failed to serialize match results")
}

/// Print results as text
fn print_text_results(results: &MatchResults) {
    let total = results.games.len();
    let pct = |n: usize| if total > 0 { 100.0 * n as f32 / total as f32 } else { 0.0 };

    println!("\n=== Match Results ===");
    println!("Total games:  {}", total);
    println!("Minimax wins: {} ({:.1}%)", results.minimax_wins, pct(results.minimax_wins));
    println!("MCTS wins:    {} ({:.1}%)", results.mcts_wins, pct(results.mcts_wins));
    println!("Draws:        {} ({:.1}%)", results.draws, pct(results.draws));
    println!("Avg rounds:   {:.1}", results.avg_rounds);
}
