//! Chronological bet replay
//!
//! Joins predictions to realized outcomes, sorts them by game time, and
//! replays a capped-Kelly staking rule against a running bankroll. Order is
//! load-bearing: every stake is a fraction of whatever bankroll the previous
//! bets left behind, so the sort is stable and the loop is strictly
//! sequential.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backtesting::metrics::{summarize, SummaryMetrics};
use crate::calibration::CalibrationModel;
use crate::core::kelly::{BettingPolicy, DEFAULT_MAX_FRACTION_PER_BET};
use crate::data::timestamp::utc_day;
use crate::error::EngineError;
use crate::models::{
    ActualRecord, BetDecision, BetSide, MatchedBet, PredictionRecord, RunMetadata, SkipReason,
};

/// Replay parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_bankroll: f64,
    pub min_confidence: f64,
    pub max_fraction_per_bet: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_bankroll: 1000.0,
            min_confidence: 0.0,
            max_fraction_per_bet: DEFAULT_MAX_FRACTION_PER_BET,
        }
    }
}

/// Engine lifecycle; a finished engine refuses another run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Init,
    Running,
    Done,
}

/// Predictions joined to outcomes, sorted and ready to replay
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Matched bets in chronological order; ties keep input file order
    pub bets: Vec<MatchedBet>,
    pub unmatched_predictions: usize,
    pub unmatched_actuals: usize,
}

/// Where the replay gets its calibrated probabilities from
#[derive(Debug, Clone, Copy)]
pub enum CalibrationPlan<'a> {
    /// Use raw probabilities unchanged
    Raw,
    /// Apply one fitted model to every matched bet
    Model(&'a CalibrationModel),
    /// Explicit per-row probabilities aligned to `Alignment::bets`, e.g.
    /// out-of-fold values for rows that were in the calibration fit set
    PerRow(&'a [f64]),
}

/// Read-only result of one completed replay
#[derive(Debug, Clone)]
pub struct BacktestRun {
    pub ledger: Vec<BetDecision>,
    /// Bankroll after each ledger row, with the initial value at index 0
    pub bankroll_series: Vec<f64>,
    pub summary: SummaryMetrics,
    pub metadata: RunMetadata,
}

/// Join predictions to actuals on (player, UTC calendar date) and sort the
/// matches chronologically.
///
/// Unmatched rows on either side are excluded and counted, never silently
/// dropped.
pub fn align(predictions: &[PredictionRecord], actuals: &[ActualRecord]) -> Alignment {
    let mut outcomes: HashMap<(String, NaiveDate), bool> = HashMap::new();
    let mut duplicates = 0usize;

    for actual in actuals {
        let key = (actual.player.clone(), utc_day(&actual.game_date));
        if outcomes.contains_key(&key) {
            duplicates += 1;
        } else {
            outcomes.insert(key, actual.outcome);
        }
    }
    if duplicates > 0 {
        warn!(duplicates, "duplicate actual rows for the same (player, date), keeping first");
    }

    let mut bets = Vec::with_capacity(predictions.len());
    let mut consumed: HashSet<(String, NaiveDate)> = HashSet::new();
    let mut unmatched_predictions = 0usize;

    for pred in predictions {
        let key = (pred.player.clone(), utc_day(&pred.game_date));
        match outcomes.get(&key) {
            Some(&outcome) => {
                consumed.insert(key);
                bets.push(MatchedBet {
                    player: pred.player.clone(),
                    game_date: pred.game_date,
                    raw_probability: pred.raw_probability,
                    confidence: pred.confidence,
                    decimal_odds_over: pred.decimal_odds_over,
                    decimal_odds_under: pred.decimal_odds_under,
                    outcome,
                });
            }
            None => unmatched_predictions += 1,
        }
    }

    let unmatched_actuals = outcomes.len() - consumed.len();
    if unmatched_predictions > 0 || unmatched_actuals > 0 {
        warn!(
            unmatched_predictions,
            unmatched_actuals, "excluded rows without a join partner"
        );
    }

    // Stable sort: same-timestamp events stay in file order
    bets.sort_by(|a, b| a.game_date.cmp(&b.game_date));

    Alignment {
        bets,
        unmatched_predictions,
        unmatched_actuals,
    }
}

/// Sequential bankroll replay over an alignment.
///
/// One instance handles exactly one run; the bankroll is its only mutable
/// state and nothing else may touch it mid-replay.
pub struct BacktestEngine {
    config: BacktestConfig,
    state: EngineState,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            config,
            state: EngineState::Init,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Replay every matched bet in order against the running bankroll.
    ///
    /// NO_BET rows (no edge, confidence veto, unpayable odds) still append a
    /// zero-stake ledger row. Zero matched bets is a valid run with an
    /// all-zero summary.
    pub fn run(
        &mut self,
        alignment: &Alignment,
        plan: CalibrationPlan<'_>,
        calibration_label: &str,
    ) -> Result<BacktestRun, EngineError> {
        if self.state != EngineState::Init {
            return Err(EngineError::AlreadyRun);
        }
        if let CalibrationPlan::PerRow(values) = plan {
            if values.len() != alignment.bets.len() {
                return Err(EngineError::CalibrationLengthMismatch {
                    expected: alignment.bets.len(),
                    got: values.len(),
                });
            }
        }
        self.state = EngineState::Running;

        let started_at = Utc::now();
        let policy = BettingPolicy::new(self.config.min_confidence, self.config.max_fraction_per_bet);

        let mut bankroll = self.config.initial_bankroll;
        let mut ledger: Vec<BetDecision> = Vec::with_capacity(alignment.bets.len());
        let mut bankroll_series = Vec::with_capacity(alignment.bets.len() + 1);
        bankroll_series.push(bankroll);
        let mut warned_negative = false;

        for (i, bet) in alignment.bets.iter().enumerate() {
            let p = match plan {
                CalibrationPlan::Raw => bet.raw_probability,
                CalibrationPlan::Model(model) => model.transform(bet.raw_probability),
                CalibrationPlan::PerRow(values) => values[i],
            };

            let decision = if bet.decimal_odds_over <= 1.0 || bet.decimal_odds_under <= 1.0 {
                warn!(
                    player = %bet.player,
                    odds_over = bet.decimal_odds_over,
                    odds_under = bet.decimal_odds_under,
                    "decimal odds at or below 1.0, forcing no-bet"
                );
                self.no_bet_row(bet, p, SkipReason::InvalidOdds)
            } else {
                let stake = policy.evaluate(p, bet.decimal_odds_over, bet.decimal_odds_under);
                match stake.side {
                    BetSide::NoBet => self.no_bet_row(
                        bet,
                        p,
                        stake.skip_reason.unwrap_or(SkipReason::NoEdge),
                    ),
                    side => {
                        let stake_amount = stake.stake_fraction * bankroll;
                        let won = match side {
                            BetSide::Over => bet.outcome,
                            BetSide::Under => !bet.outcome,
                            BetSide::NoBet => false,
                        };
                        let profit = if won {
                            stake_amount * (stake.odds - 1.0)
                        } else {
                            -stake_amount
                        };
                        bankroll += profit;

                        if bankroll <= 0.0 && !warned_negative {
                            warn!(bankroll, "bankroll at or below zero, continuing replay");
                            warned_negative = true;
                        }

                        BetDecision {
                            player: bet.player.clone(),
                            game_date: bet.game_date,
                            calibrated_probability: p,
                            side,
                            stake_fraction: stake.stake_fraction,
                            stake_amount,
                            odds_used: stake.odds,
                            outcome: bet.outcome,
                            profit,
                            skip_reason: None,
                        }
                    }
                }
            };

            bankroll_series.push(bankroll);
            ledger.push(decision);
        }

        let elapsed_days = match (alignment.bets.first(), alignment.bets.last()) {
            (Some(first), Some(last)) => {
                Some((last.game_date - first.game_date).num_days().max(1))
            }
            _ => None,
        };

        let summary = summarize(
            &ledger,
            &bankroll_series,
            self.config.initial_bankroll,
            elapsed_days,
        );

        let finished_at = Utc::now();
        let metadata = RunMetadata {
            initial_bankroll: self.config.initial_bankroll,
            min_confidence: self.config.min_confidence,
            max_fraction_per_bet: self.config.max_fraction_per_bet,
            calibration: calibration_label.to_string(),
            matched_bets: alignment.bets.len(),
            unmatched_predictions: alignment.unmatched_predictions,
            unmatched_actuals: alignment.unmatched_actuals,
            started_at,
            finished_at,
        };

        self.state = EngineState::Done;
        info!(
            matched = alignment.bets.len(),
            staked = summary.total_bets,
            final_bankroll = summary.final_bankroll,
            "replay finished"
        );

        Ok(BacktestRun {
            ledger,
            bankroll_series,
            summary,
            metadata,
        })
    }

    fn no_bet_row(&self, bet: &MatchedBet, p: f64, reason: SkipReason) -> BetDecision {
        BetDecision {
            player: bet.player.clone(),
            game_date: bet.game_date,
            calibrated_probability: p,
            side: BetSide::NoBet,
            stake_fraction: 0.0,
            stake_amount: 0.0,
            odds_used: 0.0,
            outcome: bet.outcome,
            profit: 0.0,
            skip_reason: Some(reason),
        }
    }
}
