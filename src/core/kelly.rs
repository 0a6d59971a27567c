//! Bet selection and capped-Kelly stake sizing
//!
//! The Kelly criterion formula:
//!     f* = (b*q - (1-q)) / b = (q*odds - 1) / (odds - 1)
//!
//! Where:
//!     f* = fraction of bankroll to bet
//!     b = odds - 1 (net odds)
//!     q = win probability of the chosen side
//!     odds = decimal odds (profit on a winning unit stake = odds - 1)
//!
//! The fraction is clamped into [0, max_fraction_per_bet]; the cap, not the
//! raw Kelly value, is what actually sizes most positive-EV bets.

use serde::{Deserialize, Serialize};

use crate::models::{BetSide, SkipReason};

/// Default cap on the bankroll fraction staked on one bet
pub const DEFAULT_MAX_FRACTION_PER_BET: f64 = 0.02;

/// Floor for the Kelly denominator when decimal odds collapse to 1.0
const MIN_NET_ODDS: f64 = 1e-9;

/// Stake-sizing thresholds for one replay
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BettingPolicy {
    /// Minimum of max(p, 1-p) required before staking anything
    pub min_confidence: f64,
    /// Hard cap on the per-bet bankroll fraction
    pub max_fraction_per_bet: f64,
}

impl Default for BettingPolicy {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
            max_fraction_per_bet: DEFAULT_MAX_FRACTION_PER_BET,
        }
    }
}

/// Outcome of evaluating one calibrated probability against an odds pair
#[derive(Debug, Clone, Copy)]
pub struct StakeDecision {
    pub side: BetSide,
    /// Bankroll fraction to stake; 0.0 for NO_BET
    pub stake_fraction: f64,
    /// Decimal odds of the chosen side; 0.0 for NO_BET
    pub odds: f64,
    pub skip_reason: Option<SkipReason>,
}

impl StakeDecision {
    fn no_bet(reason: SkipReason) -> Self {
        Self {
            side: BetSide::NoBet,
            stake_fraction: 0.0,
            odds: 0.0,
            skip_reason: Some(reason),
        }
    }
}

/// Raw Kelly fraction for a single side.
///
/// Negative when the side has negative expected value; callers clamp.
pub fn kelly_fraction(win_probability: f64, decimal_odds: f64) -> f64 {
    let net_odds = (decimal_odds - 1.0).max(MIN_NET_ODDS);
    (win_probability * decimal_odds - 1.0) / net_odds
}

impl BettingPolicy {
    pub fn new(min_confidence: f64, max_fraction_per_bet: f64) -> Self {
        Self {
            min_confidence,
            max_fraction_per_bet,
        }
    }

    /// Pick a side and size the stake for one event.
    ///
    /// `p` is the calibrated P(OVER). EVs per unit stake are
    /// `p*odds_over - 1` and `(1-p)*odds_under - 1`; the better side is taken
    /// only when its EV is strictly positive, and the confidence gate can
    /// veto any bet regardless of edge.
    pub fn evaluate(&self, p: f64, odds_over: f64, odds_under: f64) -> StakeDecision {
        if p.max(1.0 - p) < self.min_confidence {
            return StakeDecision::no_bet(SkipReason::BelowConfidence);
        }

        let ev_over = p * odds_over - 1.0;
        let ev_under = (1.0 - p) * odds_under - 1.0;

        let (side, win_prob, odds) = if ev_over > ev_under && ev_over > 0.0 {
            (BetSide::Over, p, odds_over)
        } else if ev_under > ev_over && ev_under > 0.0 {
            (BetSide::Under, 1.0 - p, odds_under)
        } else {
            return StakeDecision::no_bet(SkipReason::NoEdge);
        };

        let stake_fraction =
            kelly_fraction(win_prob, odds).clamp(0.0, self.max_fraction_per_bet);

        StakeDecision {
            side,
            stake_fraction,
            odds,
            skip_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kelly_fraction_positive_edge() {
        // q=0.7 at evens: f* = (1.4 - 1) / 1 = 0.4
        let f = kelly_fraction(0.7, 2.0);
        assert!((f - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_kelly_fraction_negative_edge() {
        assert!(kelly_fraction(0.4, 2.0) < 0.0);
    }

    #[test]
    fn test_kelly_fraction_unit_odds_guard() {
        // odds == 1.0 floors the denominator instead of dividing by zero
        let f = kelly_fraction(0.9, 1.0);
        assert!(f.is_finite());
        assert!(f < 0.0);
    }

    #[test]
    fn test_ev_strictly_increasing_in_probability() {
        for odds in [1.5, 2.0, 3.5, 10.0] {
            let mut prev = f64::NEG_INFINITY;
            for i in 1..100 {
                let p = i as f64 / 100.0;
                let ev = p * odds - 1.0;
                assert!(ev > prev);
                prev = ev;
            }
        }
    }

    #[test]
    fn test_stake_fraction_always_within_cap() {
        let policy = BettingPolicy::new(0.0, 0.02);
        for pi in 0..=100 {
            for odds in [1.01, 1.5, 2.0, 5.0, 50.0] {
                let p = pi as f64 / 100.0;
                let d = policy.evaluate(p, odds, odds);
                assert!(d.stake_fraction >= 0.0);
                assert!(d.stake_fraction <= 0.02 + 1e-15);
            }
        }
    }

    #[test]
    fn test_over_side_selected_on_positive_edge() {
        let policy = BettingPolicy::default();
        let d = policy.evaluate(0.7, 2.0, 2.0);
        assert_eq!(d.side, BetSide::Over);
        assert!((d.stake_fraction - DEFAULT_MAX_FRACTION_PER_BET).abs() < 1e-12);
        assert!((d.odds - 2.0).abs() < 1e-12);
        assert!(d.skip_reason.is_none());
    }

    #[test]
    fn test_under_side_selected_on_positive_edge() {
        let policy = BettingPolicy::default();
        let d = policy.evaluate(0.3, 2.0, 2.0);
        assert_eq!(d.side, BetSide::Under);
        assert!((d.odds - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_coin_flip_is_no_bet() {
        // p = 0.5 at evens: both EVs are exactly zero
        let policy = BettingPolicy::default();
        let d = policy.evaluate(0.5, 2.0, 2.0);
        assert_eq!(d.side, BetSide::NoBet);
        assert_eq!(d.skip_reason, Some(SkipReason::NoEdge));
        assert_eq!(d.stake_fraction, 0.0);
    }

    #[test]
    fn test_confidence_gate_vetoes_positive_ev() {
        // Positive EV on the over, but max(p, 1-p) = 0.55 < 0.6
        let policy = BettingPolicy::new(0.6, 0.02);
        let d = policy.evaluate(0.55, 2.5, 2.5);
        assert_eq!(d.side, BetSide::NoBet);
        assert_eq!(d.skip_reason, Some(SkipReason::BelowConfidence));
    }

    #[test]
    fn test_confidence_gate_passes_at_threshold() {
        let policy = BettingPolicy::new(0.6, 0.02);
        let d = policy.evaluate(0.6, 2.0, 2.0);
        assert_eq!(d.side, BetSide::Over);
    }

    #[test]
    fn test_small_edge_stays_below_cap() {
        // q=0.52 at evens: f* = 0.04 / 1 = 0.04, capped at 0.02.
        // q=0.505 gives f* = 0.01, under the cap and used as-is.
        let policy = BettingPolicy::new(0.0, 0.02);
        let d = policy.evaluate(0.505, 2.0, 2.0);
        assert_eq!(d.side, BetSide::Over);
        assert!((d.stake_fraction - 0.01).abs() < 1e-12);
    }
}
