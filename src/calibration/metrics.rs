//! Calibration quality metrics
//!
//! Brier score, expected calibration error, and the reliability table the
//! report layer writes out.

use serde::{Deserialize, Serialize};

/// One equal-width probability bin of the reliability table.
///
/// Empty bins keep their place in the table with `NaN` means; downstream
/// diagnostics rely on that shape, so it is deliberate, not an accident of
/// division by zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityBin {
    pub lo: f64,
    pub hi: f64,
    pub mean_pred: f64,
    pub mean_observed: f64,
    pub count: usize,
}

/// Mean squared error between predicted probability and realized outcome.
///
/// `NaN` for empty input.
pub fn brier_score(y_true: &[bool], y_prob: &[f64]) -> f64 {
    let n = y_true.len().min(y_prob.len());
    if n == 0 {
        return f64::NAN;
    }
    let sum: f64 = y_true
        .iter()
        .zip(y_prob)
        .map(|(&t, &p)| {
            let target = if t { 1.0 } else { 0.0 };
            (p - target).powi(2)
        })
        .sum();
    sum / n as f64
}

/// Build the reliability table over `n_bins` equal-width probability bins.
///
/// A probability of exactly 1.0 falls into the last bin.
pub fn reliability_table(y_true: &[bool], y_prob: &[f64], n_bins: usize) -> Vec<ReliabilityBin> {
    let n_bins = n_bins.max(1);
    let mut pred_sum = vec![0.0f64; n_bins];
    let mut hit_sum = vec![0.0f64; n_bins];
    let mut counts = vec![0usize; n_bins];

    for (&t, &p) in y_true.iter().zip(y_prob) {
        let idx = ((p * n_bins as f64).floor() as usize).min(n_bins - 1);
        pred_sum[idx] += p;
        if t {
            hit_sum[idx] += 1.0;
        }
        counts[idx] += 1;
    }

    (0..n_bins)
        .map(|i| {
            let (mean_pred, mean_observed) = if counts[i] > 0 {
                (pred_sum[i] / counts[i] as f64, hit_sum[i] / counts[i] as f64)
            } else {
                (f64::NAN, f64::NAN)
            };
            ReliabilityBin {
                lo: i as f64 / n_bins as f64,
                hi: (i + 1) as f64 / n_bins as f64,
                mean_pred,
                mean_observed,
                count: counts[i],
            }
        })
        .collect()
}

/// Expected calibration error: per-bin |mean_pred - mean_observed| weighted
/// by bin occupancy. Empty bins contribute zero.
pub fn expected_calibration_error(y_true: &[bool], y_prob: &[f64], n_bins: usize) -> f64 {
    let total = y_true.len().min(y_prob.len());
    if total == 0 {
        return 0.0;
    }
    reliability_table(y_true, y_prob, n_bins)
        .iter()
        .filter(|bin| bin.count > 0)
        .map(|bin| {
            let weight = bin.count as f64 / total as f64;
            weight * (bin.mean_pred - bin.mean_observed).abs()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brier_perfect_predictions() {
        let score = brier_score(&[true, false], &[1.0, 0.0]);
        assert!(score.abs() < 1e-12);
    }

    #[test]
    fn test_brier_uninformative_predictions() {
        let score = brier_score(&[true, false, true, false], &[0.5; 4]);
        assert!((score - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_brier_empty_is_nan() {
        assert!(brier_score(&[], &[]).is_nan());
    }

    #[test]
    fn test_reliability_table_shape() {
        let y_true = [true, false, true, true];
        let y_prob = [0.05, 0.55, 0.55, 0.95];
        let table = reliability_table(&y_true, &y_prob, 10);

        assert_eq!(table.len(), 10);
        assert_eq!(table[0].count, 1);
        assert_eq!(table[5].count, 2);
        assert_eq!(table[9].count, 1);

        // Occupied bins carry real means
        assert!((table[5].mean_pred - 0.55).abs() < 1e-12);
        assert!((table[5].mean_observed - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_reliability_table_empty_bins_report_nan() {
        let table = reliability_table(&[true], &[0.95], 10);
        assert!(table[0].mean_pred.is_nan());
        assert!(table[0].mean_observed.is_nan());
        assert_eq!(table[0].count, 0);
        assert!(!table[9].mean_pred.is_nan());
    }

    #[test]
    fn test_probability_one_lands_in_last_bin() {
        let table = reliability_table(&[true], &[1.0], 10);
        assert_eq!(table[9].count, 1);
    }

    #[test]
    fn test_ece_perfectly_calibrated() {
        // Each bin's mean prediction equals its observed frequency.
        let y_true = [true, false, true, false];
        let y_prob = [0.5, 0.5, 0.5, 0.5];
        let ece = expected_calibration_error(&y_true, &y_prob, 10);
        assert!(ece.abs() < 1e-12);
    }

    #[test]
    fn test_ece_overconfident() {
        // 90% predictions with a 50% hit rate: ECE = 0.4.
        let y_true = [true, false, true, false];
        let y_prob = [0.9, 0.9, 0.9, 0.9];
        let ece = expected_calibration_error(&y_true, &y_prob, 10);
        assert!((ece - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_ece_empty_bins_do_not_poison_aggregate() {
        let y_true = [true, false];
        let y_prob = [0.95, 0.05];
        let ece = expected_calibration_error(&y_true, &y_prob, 10);
        assert!(ece.is_finite());
    }

    #[test]
    fn test_ece_empty_input() {
        assert_eq!(expected_calibration_error(&[], &[], 10), 0.0);
    }
}
