//! Propsim CLI - replay a prop prediction model against realized outcomes

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use propsim::backtesting::{align, BacktestConfig, BacktestEngine, BacktestRun, CalibrationPlan};
use propsim::calibration::{
    self, brier_score, expected_calibration_error, reliability_table, CalibrationMethod,
};
use propsim::data::{load_actuals, load_predictions};
use propsim::error::CalibrationError;
use propsim::models::MatchedBet;
use propsim::report;

#[derive(Parser)]
#[command(name = "propsim")]
#[command(author, version, about = "Prop bet backtest CLI", long_about = None)]
struct Cli {
    /// Predictions CSV (game_date, player, over_probability, ...)
    #[arg(long)]
    predictions: PathBuf,

    /// Actuals CSV (game_date, player, outcome)
    #[arg(long)]
    actuals: PathBuf,

    /// Output directory for run artifacts
    #[arg(long, default_value = "reports")]
    out_dir: PathBuf,

    /// Starting bankroll
    #[arg(long, default_value = "1000.0")]
    initial_bankroll: f64,

    /// Minimum of max(p, 1-p) required to stake a bet
    #[arg(long, default_value = "0.0")]
    min_confidence: f64,

    /// Decimal odds applied when the input has no odds columns
    #[arg(long, default_value = "2.0")]
    decimal_odds: f64,

    /// Cap on the bankroll fraction staked per bet
    #[arg(long, default_value = "0.02")]
    max_fraction_per_bet: f64,

    /// Recalibrate raw probabilities before the replay
    #[arg(long, value_enum)]
    calibrate: Option<CalibrateArg>,

    /// Which rows the calibration fit may see
    #[arg(long, value_enum, default_value = "train")]
    calibration_split: SplitArg,

    /// Fraction of matched bets (chronologically earliest) in the train split
    #[arg(long, default_value = "0.5")]
    train_fraction: f64,

    /// Use k-fold isotonic calibration (overrides --calibrate)
    #[arg(long)]
    kfold_isotonic: bool,

    /// Number of folds for --kfold-isotonic
    #[arg(long, default_value = "5")]
    kfold_folds: usize,

    /// Number of equal-width bins in the reliability table
    #[arg(long, default_value = "10")]
    calibration_bins: usize,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CalibrateArg {
    Platt,
    Isotonic,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SplitArg {
    /// Fit on the earliest train_fraction of matched bets
    Train,
    /// Fit on every matched bet (diagnostic, leaks labels into the replay)
    All,
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    let cli = Cli::parse();

    println!("{}", "Propsim v0.2.0".cyan().bold());
    println!();

    let pb = spinner("Loading input data...");
    let predictions = load_predictions(&cli.predictions, cli.decimal_odds)
        .with_context(|| format!("failed to load predictions from {:?}", cli.predictions))?;
    let actuals = load_actuals(&cli.actuals)
        .with_context(|| format!("failed to load actuals from {:?}", cli.actuals))?;
    pb.finish_and_clear();

    println!(
        "Loaded {} predictions, {} actuals",
        predictions.len(),
        actuals.len()
    );

    let alignment = align(&predictions, &actuals);
    println!(
        "Matched {} bets ({} predictions, {} actuals without a partner)",
        alignment.bets.len(),
        alignment.unmatched_predictions,
        alignment.unmatched_actuals
    );
    println!();

    let method = resolve_method(&cli);
    let (calibrated, label) = fit_calibration(
        &alignment.bets,
        method,
        cli.calibration_split,
        cli.train_fraction,
    )?;

    let config = BacktestConfig {
        initial_bankroll: cli.initial_bankroll,
        min_confidence: cli.min_confidence,
        max_fraction_per_bet: cli.max_fraction_per_bet,
    };

    let pb = spinner("Replaying bets...");
    let mut engine = BacktestEngine::new(config);
    let plan = match &calibrated {
        Some(values) => CalibrationPlan::PerRow(values),
        None => CalibrationPlan::Raw,
    };
    let run = engine
        .run(&alignment, plan, &label)
        .context("backtest replay failed")?;
    pb.finish_and_clear();

    let replayed_probs: Vec<f64> = run.ledger.iter().map(|d| d.calibrated_probability).collect();
    let replayed_outcomes: Vec<bool> = run.ledger.iter().map(|d| d.outcome).collect();
    let table = reliability_table(&replayed_outcomes, &replayed_probs, cli.calibration_bins);
    let brier = brier_score(&replayed_outcomes, &replayed_probs);
    let ece = expected_calibration_error(&replayed_outcomes, &replayed_probs, cli.calibration_bins);

    print_summary(&run, &label, brier, ece);

    report::write_run(&cli.out_dir, &run, &table)
        .with_context(|| format!("failed to write artifacts to {:?}", cli.out_dir))?;
    println!("{}: {:?}", "Saved artifacts".green(), cli.out_dir);

    Ok(())
}

fn resolve_method(cli: &Cli) -> CalibrationMethod {
    if cli.kfold_isotonic {
        CalibrationMethod::IsotonicKFold(cli.kfold_folds)
    } else {
        match cli.calibrate {
            Some(CalibrateArg::Platt) => CalibrationMethod::Platt,
            Some(CalibrateArg::Isotonic) => CalibrationMethod::Isotonic,
            None => CalibrationMethod::Identity,
        }
    }
}

/// Fit the requested calibration on the configured split.
///
/// Returns per-row calibrated probabilities aligned to the sorted matched
/// bets (`None` = replay raw values) plus the label actually applied: a
/// single-class train split falls back to identity rather than aborting.
fn fit_calibration(
    bets: &[MatchedBet],
    method: CalibrationMethod,
    split: SplitArg,
    train_fraction: f64,
) -> Result<(Option<Vec<f64>>, String)> {
    if matches!(method, CalibrationMethod::Identity) || bets.is_empty() {
        return Ok((None, CalibrationMethod::Identity.label()));
    }

    let train_len = match split {
        SplitArg::All => bets.len(),
        SplitArg::Train => {
            ((bets.len() as f64 * train_fraction).round() as usize).clamp(1, bets.len())
        }
    };

    let train_probs: Vec<f64> = bets[..train_len].iter().map(|b| b.raw_probability).collect();
    let train_outcomes: Vec<bool> = bets[..train_len].iter().map(|b| b.outcome).collect();

    match calibration::fit(&train_probs, &train_outcomes, method) {
        Ok(fitted) => {
            let mut values = fitted.train_calibrated;
            values.reserve(bets.len() - train_len);
            for bet in &bets[train_len..] {
                values.push(fitted.model.transform(bet.raw_probability));
            }
            Ok((Some(values), method.label()))
        }
        Err(CalibrationError::SingleClass) => {
            warn!("train split has a single outcome class, falling back to identity calibration");
            Ok((None, CalibrationMethod::Identity.label()))
        }
        Err(e) => Err(e).context("failed to fit calibration"),
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb
}

fn print_summary(run: &BacktestRun, calibration: &str, brier: f64, ece: f64) {
    let s = &run.summary;

    println!("\n{}", "=".repeat(60));
    println!("BACKTEST RESULTS");
    println!("{}", "=".repeat(60));
    println!("Calibration: {}", calibration);
    println!("Matched bets: {}", run.metadata.matched_bets);
    println!(
        "Unmatched: {} predictions, {} actuals",
        run.metadata.unmatched_predictions, run.metadata.unmatched_actuals
    );
    println!("{}", "-".repeat(60));
    println!("Staked bets: {}", s.total_bets);
    println!("Win rate: {:.1}%", s.win_rate * 100.0);
    println!("Initial bankroll: {:.2}", s.initial_bankroll);
    println!("Final bankroll: {:.2}", s.final_bankroll);

    let roi_str = format!("{:.2}%", s.roi * 100.0);
    println!(
        "ROI: {}",
        if s.roi >= 0.0 {
            roi_str.green()
        } else {
            roi_str.red()
        }
    );
    println!("{}", "-".repeat(60));
    println!("Sharpe: {:.3}", s.sharpe);
    println!("Max drawdown: {:.1}%", s.max_drawdown * 100.0);
    println!("CAGR: {:.2}%", s.cagr * 100.0);
    println!("Brier score: {:.4}", brier);
    println!("ECE: {:.4}", ece);
    println!("{}", "=".repeat(60));
}
