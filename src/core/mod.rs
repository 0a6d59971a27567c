//! Core betting math

pub mod kelly;

pub use kelly::{kelly_fraction, BettingPolicy, StakeDecision, DEFAULT_MAX_FRACTION_PER_BET};
