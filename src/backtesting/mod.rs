//! Backtesting engine for validating prediction models

pub mod engine;
pub mod metrics;

pub use engine::{
    align, Alignment, BacktestConfig, BacktestEngine, BacktestRun, CalibrationPlan, EngineState,
};
pub use metrics::{summarize, SummaryMetrics};
