//! Summary metrics over a completed replay
//!
//! Degenerate-input conventions are fixed here and tested: Sharpe is 0.0
//! with fewer than two staked bets or zero return variance, CAGR is 0.0 for
//! a run with no dated bets and -1.0 once the bankroll ends at or below
//! zero.

use serde::{Deserialize, Serialize};

use crate::models::BetDecision;

/// Financial summary of one backtest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub initial_bankroll: f64,
    pub final_bankroll: f64,
    pub roi: f64,
    /// Wins over staked bets; NO_BET rows are out of the denominator
    pub win_rate: f64,
    pub total_bets: usize,
    pub sharpe: f64,
    /// Peak-relative drawdown, in [0, 1]
    pub max_drawdown: f64,
    pub cagr: f64,
}

/// Reduce the ledger and bankroll trajectory into summary statistics.
///
/// `elapsed_days` is the span between the first and last matched bet,
/// already floored to 1; `None` for a run with no matched bets.
pub fn summarize(
    ledger: &[BetDecision],
    bankroll_series: &[f64],
    initial_bankroll: f64,
    elapsed_days: Option<i64>,
) -> SummaryMetrics {
    let final_bankroll = bankroll_series.last().copied().unwrap_or(initial_bankroll);

    let staked: Vec<&BetDecision> = ledger
        .iter()
        .filter(|d| d.side.is_staked() && d.stake_amount != 0.0)
        .collect();
    let total_bets = staked.len();
    let wins = staked.iter().filter(|d| d.profit > 0.0).count();

    let win_rate = if total_bets > 0 {
        wins as f64 / total_bets as f64
    } else {
        0.0
    };

    let roi = if initial_bankroll != 0.0 {
        (final_bankroll - initial_bankroll) / initial_bankroll
    } else {
        0.0
    };

    SummaryMetrics {
        initial_bankroll,
        final_bankroll,
        roi,
        win_rate,
        total_bets,
        sharpe: sharpe_ratio(&staked),
        max_drawdown: max_drawdown(bankroll_series),
        cagr: cagr(initial_bankroll, final_bankroll, elapsed_days),
    }
}

/// Mean over population standard deviation of per-bet returns
/// (profit / stake). 0.0 when undefined.
fn sharpe_ratio(staked: &[&BetDecision]) -> f64 {
    if staked.len() < 2 {
        return 0.0;
    }

    let returns: Vec<f64> = staked
        .iter()
        .map(|d| d.profit / d.stake_amount)
        .collect();

    let mean: f64 = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance: f64 = returns
        .iter()
        .map(|r| (r - mean).powi(2))
        .sum::<f64>()
        / returns.len() as f64;
    let std = variance.sqrt();

    if std == 0.0 {
        return 0.0;
    }
    mean / std
}

/// Largest peak-relative decline of the bankroll trajectory.
///
/// A bankroll that falls below zero counts as a full drawdown, keeping the
/// value inside [0, 1].
fn max_drawdown(bankroll_series: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0f64;

    for &value in bankroll_series {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let dd = ((peak - value) / peak).min(1.0);
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}

fn cagr(initial: f64, final_bankroll: f64, elapsed_days: Option<i64>) -> f64 {
    let days = match elapsed_days {
        Some(d) => d.max(1),
        None => return 0.0,
    };
    if final_bankroll <= 0.0 {
        return -1.0;
    }
    if initial <= 0.0 {
        return 0.0;
    }
    (final_bankroll / initial).powf(365.0 / days as f64) - 1.0
}
