//! Propsim - backtest and calibration engine for player prop models
//!
//! This library provides:
//! - Probability recalibration (Platt scaling, isotonic, k-fold isotonic)
//! - Calibration diagnostics (Brier score, ECE, reliability table)
//! - Capped-Kelly bet sizing
//! - Chronological bankroll replay with a full bet ledger
//! - Summary metrics (ROI, win rate, Sharpe, max drawdown, CAGR)
//!
//! # Example
//!
//! ```
//! use propsim::core::kelly::BettingPolicy;
//!
//! let policy = BettingPolicy::new(0.6, 0.02);
//! let decision = policy.evaluate(0.7, 2.0, 2.0);
//! assert!(decision.stake_fraction > 0.0);
//! ```

pub mod backtesting;
pub mod calibration;
pub mod core;
pub mod data;
pub mod error;
pub mod models;
pub mod report;

// Re-export commonly used types
pub use backtesting::{
    align, Alignment, BacktestConfig, BacktestEngine, BacktestRun, CalibrationPlan, SummaryMetrics,
};
pub use calibration::{CalibrationMethod, CalibrationModel, FittedCalibration};
pub use data::{load_actuals, load_predictions};
pub use error::{CalibrationError, DataError, EngineError};
pub use models::{
    ActualRecord, BetDecision, BetSide, MatchedBet, PredictionRecord, RunMetadata, SkipReason,
};
