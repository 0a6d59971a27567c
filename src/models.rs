use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One model prediction for a player prop line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Game timestamp, normalized to UTC at ingestion
    pub game_date: DateTime<Utc>,
    pub player: String,
    /// Model-produced P(OVER), in [0, 1]
    pub raw_probability: f64,
    /// Optional model confidence signal, carried through to the ledger output
    pub confidence: Option<f64>,
    pub decimal_odds_over: f64,
    pub decimal_odds_under: f64,
}

/// Realized outcome for a player prop line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActualRecord {
    pub game_date: DateTime<Utc>,
    pub player: String,
    /// true when the OVER occurred
    pub outcome: bool,
}

/// A prediction joined to its realized outcome on (player, UTC date)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchedBet {
    pub player: String,
    pub game_date: DateTime<Utc>,
    pub raw_probability: f64,
    pub confidence: Option<f64>,
    pub decimal_odds_over: f64,
    pub decimal_odds_under: f64,
    pub outcome: bool,
}

/// Which side of the line a decision takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetSide {
    Over,
    Under,
    NoBet,
}

impl BetSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetSide::Over => "OVER",
            BetSide::Under => "UNDER",
            BetSide::NoBet => "NO_BET",
        }
    }

    pub fn is_staked(&self) -> bool {
        !matches!(self, BetSide::NoBet)
    }
}

/// Why a matched bet produced no stake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Neither side has positive expected value
    NoEdge,
    /// max(p, 1-p) fell below the configured confidence floor
    BelowConfidence,
    /// Decimal odds at or below 1.0 cannot pay out
    InvalidOdds,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoEdge => "no_edge",
            SkipReason::BelowConfidence => "below_confidence",
            SkipReason::InvalidOdds => "invalid_odds",
        }
    }
}

/// One ledger row, created once per matched bet during replay.
///
/// NO_BET rows are kept with a zero stake so the ledger is a complete record
/// of every matched event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BetDecision {
    pub player: String,
    pub game_date: DateTime<Utc>,
    pub calibrated_probability: f64,
    pub side: BetSide,
    pub stake_fraction: f64,
    pub stake_amount: f64,
    /// Decimal odds of the chosen side; 0.0 for NO_BET rows
    pub odds_used: f64,
    pub outcome: bool,
    pub profit: f64,
    pub skip_reason: Option<SkipReason>,
}

/// Run parameters and counters exposed for reproducibility.
///
/// The report layer serializes this as-is; nothing here is formatted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub initial_bankroll: f64,
    pub min_confidence: f64,
    pub max_fraction_per_bet: f64,
    pub calibration: String,
    pub matched_bets: usize,
    pub unmatched_predictions: usize,
    pub unmatched_actuals: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
