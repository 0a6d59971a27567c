//! Probability recalibration fitters
//!
//! Maps raw model probabilities onto observed outcome frequencies:
//! - Platt scaling: logistic regression on the logit of the raw probability
//! - Isotonic regression: pool-adjacent-violators, monotone non-decreasing
//! - K-fold isotonic: out-of-fold calibrated values for the training rows
//!   themselves, plus a final model for genuinely held-out rows
//!
//! Fitting happens on a designated train split only; the fitted model is a
//! plain value the caller owns and passes wherever probabilities need
//! transforming.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;

/// Fitted values are kept away from exactly 0 and 1
pub const PROB_CLIP: f64 = 1e-3;

/// Clamp applied before taking a logit
const LOGIT_CLIP: f64 = 1e-6;

const PLATT_ITERATIONS: usize = 500;
const PLATT_LEARNING_RATE: f64 = 0.1;

/// Recalibration method selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CalibrationMethod {
    /// Pass raw probabilities through unchanged
    Identity,
    /// Logistic regression on the logit of the raw probability
    Platt,
    /// Monotone non-decreasing step regression
    Isotonic,
    /// Isotonic with k-fold out-of-fold values for the fit rows
    IsotonicKFold(usize),
}

impl CalibrationMethod {
    pub fn label(&self) -> String {
        match self {
            CalibrationMethod::Identity => "identity".to_string(),
            CalibrationMethod::Platt => "platt".to_string(),
            CalibrationMethod::Isotonic => "isotonic".to_string(),
            CalibrationMethod::IsotonicKFold(k) => format!("isotonic_kfold({})", k),
        }
    }
}

/// A fitted raw-to-calibrated probability mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CalibrationModel {
    Identity,
    /// sigmoid(a * logit(p) + b)
    Platt { a: f64, b: f64 },
    /// Step function: `thresholds[i]` is the upper raw-probability bound of
    /// block i, `values[i]` its fitted mean. Both sorted ascending.
    Isotonic {
        thresholds: Vec<f64>,
        values: Vec<f64>,
    },
}

impl CalibrationModel {
    /// Apply the mapping to one raw probability.
    pub fn transform(&self, p: f64) -> f64 {
        match self {
            CalibrationModel::Identity => p,
            CalibrationModel::Platt { a, b } => sigmoid(a * logit(p) + b),
            CalibrationModel::Isotonic { thresholds, values } => {
                if values.is_empty() {
                    return p;
                }
                let idx = thresholds.partition_point(|t| *t < p);
                values[idx.min(values.len() - 1)]
            }
        }
    }

    pub fn transform_all(&self, probs: &[f64]) -> Vec<f64> {
        probs.iter().map(|&p| self.transform(p)).collect()
    }
}

/// Result of fitting on a train split.
#[derive(Debug, Clone)]
pub struct FittedCalibration {
    /// Model for rows outside the fit set
    pub model: CalibrationModel,
    /// Calibrated probabilities for the fit rows themselves. For the k-fold
    /// method these are out-of-fold predictions, free of label leakage.
    pub train_calibrated: Vec<f64>,
}

/// Fit a calibration mapping on training rows.
///
/// Requires both outcome classes to be present (identity excepted); callers
/// treat `SingleClass` as a cue to fall back to identity.
pub fn fit(
    train_probs: &[f64],
    train_outcomes: &[bool],
    method: CalibrationMethod,
) -> Result<FittedCalibration, CalibrationError> {
    debug_assert_eq!(train_probs.len(), train_outcomes.len());

    if let CalibrationMethod::Identity = method {
        return Ok(FittedCalibration {
            model: CalibrationModel::Identity,
            train_calibrated: train_probs.to_vec(),
        });
    }

    if train_probs.is_empty() {
        return Err(CalibrationError::EmptyTrainingSet);
    }
    let positives = train_outcomes.iter().filter(|&&o| o).count();
    if positives == 0 || positives == train_outcomes.len() {
        return Err(CalibrationError::SingleClass);
    }

    match method {
        CalibrationMethod::Identity => unreachable!("handled above"),
        CalibrationMethod::Platt => {
            let model = fit_platt(train_probs, train_outcomes);
            let train_calibrated = model.transform_all(train_probs);
            Ok(FittedCalibration {
                model,
                train_calibrated,
            })
        }
        CalibrationMethod::Isotonic => {
            let model = fit_isotonic(train_probs, train_outcomes);
            let train_calibrated = model.transform_all(train_probs);
            Ok(FittedCalibration {
                model,
                train_calibrated,
            })
        }
        CalibrationMethod::IsotonicKFold(k) => fit_isotonic_kfold(train_probs, train_outcomes, k),
    }
}

/// Batch gradient descent on sigmoid(a * logit(p) + b) against log loss.
///
/// Initialized at the identity mapping (a=1, b=0); fixed iteration count
/// keeps the fit deterministic.
fn fit_platt(probs: &[f64], outcomes: &[bool]) -> CalibrationModel {
    let xs: Vec<f64> = probs.iter().map(|&p| logit(p)).collect();
    let n = xs.len() as f64;
    let mut a = 1.0;
    let mut b = 0.0;

    for _ in 0..PLATT_ITERATIONS {
        let mut grad_a = 0.0;
        let mut grad_b = 0.0;
        for (x, &y) in xs.iter().zip(outcomes) {
            let pred = sigmoid(a * x + b);
            let err = pred - if y { 1.0 } else { 0.0 };
            grad_a += err * x;
            grad_b += err;
        }
        a -= PLATT_LEARNING_RATE * grad_a / n;
        b -= PLATT_LEARNING_RATE * grad_b / n;
    }

    CalibrationModel::Platt { a, b }
}

/// Pool-adjacent-violators over (raw probability, outcome) pairs.
///
/// An all-same-class block collapses to a constant clipped into
/// (PROB_CLIP, 1 - PROB_CLIP) rather than an exact 0 or 1.
fn fit_isotonic(probs: &[f64], outcomes: &[bool]) -> CalibrationModel {
    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&i, &j| {
        probs[i]
            .partial_cmp(&probs[j])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Blocks of (sum of outcomes, row count, upper raw-probability bound)
    let mut sums: Vec<f64> = Vec::with_capacity(order.len());
    let mut weights: Vec<f64> = Vec::with_capacity(order.len());
    let mut uppers: Vec<f64> = Vec::with_capacity(order.len());

    for &i in &order {
        sums.push(if outcomes[i] { 1.0 } else { 0.0 });
        weights.push(1.0);
        uppers.push(probs[i]);

        // Merge backwards while the monotonicity constraint is violated
        while sums.len() >= 2 {
            let n = sums.len();
            if sums[n - 2] / weights[n - 2] > sums[n - 1] / weights[n - 1] {
                sums[n - 2] += sums[n - 1];
                weights[n - 2] += weights[n - 1];
                uppers[n - 2] = uppers[n - 1];
                sums.pop();
                weights.pop();
                uppers.pop();
            } else {
                break;
            }
        }
    }

    let values: Vec<f64> = sums
        .iter()
        .zip(&weights)
        .map(|(s, w)| (s / w).clamp(PROB_CLIP, 1.0 - PROB_CLIP))
        .collect();

    CalibrationModel::Isotonic {
        thresholds: uppers,
        values,
    }
}

/// K-fold isotonic: each contiguous fold is predicted by a model fit on the
/// other folds, then one final model is fit on everything.
///
/// Folds share no mutable state and fit in parallel; the final model is only
/// produced after every fold has reported back.
fn fit_isotonic_kfold(
    probs: &[f64],
    outcomes: &[bool],
    k: usize,
) -> Result<FittedCalibration, CalibrationError> {
    if k < 2 {
        return Err(CalibrationError::BadFoldCount(k));
    }
    let n = probs.len();
    let k = k.min(n);

    let fold_predictions: Vec<(usize, usize, Vec<f64>)> = (0..k)
        .into_par_iter()
        .map(|fold| {
            let start = fold * n / k;
            let end = (fold + 1) * n / k;

            let mut rest_probs = Vec::with_capacity(n - (end - start));
            let mut rest_outcomes = Vec::with_capacity(n - (end - start));
            for i in (0..start).chain(end..n) {
                rest_probs.push(probs[i]);
                rest_outcomes.push(outcomes[i]);
            }

            let fold_model = fit_isotonic(&rest_probs, &rest_outcomes);
            let preds: Vec<f64> = probs[start..end]
                .iter()
                .map(|&p| fold_model.transform(p))
                .collect();
            (start, end, preds)
        })
        .collect();

    let mut train_calibrated = vec![0.0; n];
    for (start, end, preds) in fold_predictions {
        train_calibrated[start..end].copy_from_slice(&preds);
    }

    let model = fit_isotonic(probs, outcomes);
    Ok(FittedCalibration {
        model,
        train_calibrated,
    })
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn logit(p: f64) -> f64 {
    let p = p.clamp(LOGIT_CLIP, 1.0 - LOGIT_CLIP);
    (p / (1.0 - p)).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Alternating outcomes around a miscalibrated band of predictions.
    fn overconfident_data() -> (Vec<f64>, Vec<bool>) {
        let probs = vec![0.8; 40];
        let outcomes = (0..40).map(|i| i % 2 == 0).collect();
        (probs, outcomes)
    }

    #[test]
    fn test_identity_passthrough() {
        let fitted = fit(&[0.2, 0.9], &[false, true], CalibrationMethod::Identity).unwrap();
        assert!(matches!(fitted.model, CalibrationModel::Identity));
        assert_eq!(fitted.train_calibrated, vec![0.2, 0.9]);
        assert_eq!(fitted.model.transform(0.42), 0.42);
    }

    #[test]
    fn test_identity_skips_class_check() {
        // Identity never inspects outcomes, so single-class data is fine.
        let fitted = fit(&[0.5, 0.6], &[true, true], CalibrationMethod::Identity).unwrap();
        assert_eq!(fitted.train_calibrated.len(), 2);
    }

    #[test]
    fn test_single_class_rejected() {
        let err = fit(&[0.5, 0.6], &[true, true], CalibrationMethod::Platt).unwrap_err();
        assert!(matches!(err, CalibrationError::SingleClass));

        let err = fit(&[0.5, 0.6], &[false, false], CalibrationMethod::Isotonic).unwrap_err();
        assert!(matches!(err, CalibrationError::SingleClass));
    }

    #[test]
    fn test_empty_training_set_rejected() {
        let err = fit(&[], &[], CalibrationMethod::Isotonic).unwrap_err();
        assert!(matches!(err, CalibrationError::EmptyTrainingSet));
    }

    #[test]
    fn test_platt_pulls_overconfident_down() {
        let (probs, outcomes) = overconfident_data();
        let fitted = fit(&probs, &outcomes, CalibrationMethod::Platt).unwrap();

        // 80% predictions hitting 50% of the time must calibrate well below 0.8.
        let calibrated = fitted.model.transform(0.8);
        assert!(calibrated < 0.65, "got {}", calibrated);
        assert!(calibrated > 0.35, "got {}", calibrated);
    }

    #[test]
    fn test_platt_output_is_a_probability() {
        let (probs, outcomes) = overconfident_data();
        let fitted = fit(&probs, &outcomes, CalibrationMethod::Platt).unwrap();
        for p in [0.0, 0.01, 0.5, 0.99, 1.0] {
            let c = fitted.model.transform(p);
            assert!(c > 0.0 && c < 1.0, "transform({}) = {}", p, c);
        }
    }

    #[test]
    fn test_isotonic_fits_step_means() {
        let probs = vec![0.1, 0.2, 0.3, 0.4, 0.6, 0.7, 0.8, 0.9];
        let outcomes = vec![false, false, true, false, true, true, false, true];
        let fitted = fit(&probs, &outcomes, CalibrationMethod::Isotonic).unwrap();

        // The 0.6-0.8 violator pool averages to 2/3.
        let mid = fitted.model.transform(0.65);
        assert!((mid - 2.0 / 3.0).abs() < 1e-9, "got {}", mid);
    }

    #[test]
    fn test_isotonic_preserves_rank_order() {
        let probs = vec![0.05, 0.15, 0.3, 0.45, 0.55, 0.7, 0.85, 0.95];
        let outcomes = vec![false, false, false, true, false, true, true, true];
        let fitted = fit(&probs, &outcomes, CalibrationMethod::Isotonic).unwrap();

        let mut prev = f64::NEG_INFINITY;
        for p in (0..=100).map(|i| i as f64 / 100.0) {
            let c = fitted.model.transform(p);
            assert!(c >= prev, "order broken at p={}", p);
            prev = c;
        }
    }

    #[test]
    fn test_isotonic_changes_miscalibrated_values() {
        let (probs, outcomes) = overconfident_data();
        let fitted = fit(&probs, &outcomes, CalibrationMethod::Isotonic).unwrap();
        let c = fitted.model.transform(0.8);
        assert!((c - 0.5).abs() < 1e-9, "got {}", c);
    }

    #[test]
    fn test_isotonic_clips_constant_blocks() {
        // Extreme blocks are all-same-class; fitted values must stay inside (0, 1).
        let probs = vec![0.1, 0.2, 0.8, 0.9];
        let outcomes = vec![false, false, true, true];
        let fitted = fit(&probs, &outcomes, CalibrationMethod::Isotonic).unwrap();

        let low = fitted.model.transform(0.0);
        let high = fitted.model.transform(1.0);
        assert!((low - PROB_CLIP).abs() < 1e-12);
        assert!((high - (1.0 - PROB_CLIP)).abs() < 1e-12);
    }

    #[test]
    fn test_kfold_requires_two_folds() {
        let err = fit(
            &[0.2, 0.8],
            &[false, true],
            CalibrationMethod::IsotonicKFold(1),
        )
        .unwrap_err();
        assert!(matches!(err, CalibrationError::BadFoldCount(1)));
    }

    #[test]
    fn test_kfold_covers_every_training_row() {
        let probs: Vec<f64> = (0..20).map(|i| 0.05 + i as f64 * 0.045).collect();
        let outcomes: Vec<bool> = (0..20).map(|i| i >= 8).collect();
        let fitted = fit(&probs, &outcomes, CalibrationMethod::IsotonicKFold(5)).unwrap();

        assert_eq!(fitted.train_calibrated.len(), probs.len());
        for &c in &fitted.train_calibrated {
            assert!((0.0..=1.0).contains(&c));
        }
    }

    #[test]
    fn test_kfold_final_model_preserves_rank_order() {
        let probs: Vec<f64> = (0..30).map(|i| 0.05 + i as f64 * 0.03).collect();
        let outcomes: Vec<bool> = (0..30).map(|i| i % 3 != 0 && i > 5).collect();
        let fitted = fit(&probs, &outcomes, CalibrationMethod::IsotonicKFold(5)).unwrap();

        let mut prev = f64::NEG_INFINITY;
        for p in (0..=20).map(|i| i as f64 / 20.0) {
            let c = fitted.model.transform(p);
            assert!(c >= prev);
            prev = c;
        }
    }

    #[test]
    fn test_method_labels() {
        assert_eq!(CalibrationMethod::Identity.label(), "identity");
        assert_eq!(CalibrationMethod::Platt.label(), "platt");
        assert_eq!(
            CalibrationMethod::IsotonicKFold(5).label(),
            "isotonic_kfold(5)"
        );
    }
}
