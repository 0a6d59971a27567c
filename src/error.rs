//! Error taxonomy
//!
//! Row-level data defects (unmatched join keys, unpayable odds) never surface
//! here: they degrade to counted skips inside the loader and engine. These
//! types cover the structurally fatal conditions and the calibration failures
//! callers are expected to handle.

use thiserror::Error;

/// Input loading errors
#[derive(Debug, Error)]
pub enum DataError {
    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("failed to read CSV: {0}")]
    Csv(#[from] polars::prelude::PolarsError),

    #[error("unrecognized timestamp '{0}'")]
    BadTimestamp(String),
}

/// Calibration fitting errors
#[derive(Debug, Error)]
pub enum CalibrationError {
    /// Training rows all share one outcome class. Callers fall back to
    /// identity calibration; this is not fatal to a run.
    #[error("training data contains fewer than two outcome classes")]
    SingleClass,

    #[error("training data is empty")]
    EmptyTrainingSet,

    #[error("fold count must be at least 2, got {0}")]
    BadFoldCount(usize),
}

/// Replay engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// An engine instance runs exactly once; build a new one per run.
    #[error("engine has already completed a run")]
    AlreadyRun,

    #[error("calibrated probabilities cover {got} rows but {expected} bets are matched")]
    CalibrationLengthMismatch { expected: usize, got: usize },
}
