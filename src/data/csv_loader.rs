//! CSV loading for model predictions and realized outcomes
//!
//! Malformed rows (bad timestamps, out-of-range probabilities, unreadable
//! outcome tokens) are skipped and counted, never fatal. Only a missing
//! required column aborts the load.

use polars::prelude::*;
use std::path::Path;
use tracing::warn;

use crate::data::timestamp::parse_utc;
use crate::error::DataError;
use crate::models::{ActualRecord, PredictionRecord};

/// Odds applied when the input carries no odds columns
pub const DEFAULT_DECIMAL_ODDS: f64 = 2.0;

fn read_csv<P: AsRef<Path>>(csv_path: P) -> Result<DataFrame, DataError> {
    let df = CsvReadOptions::default()
        .try_into_reader_with_file_path(Some(csv_path.as_ref().to_path_buf()))?
        .finish()?;
    Ok(df)
}

fn required<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series, DataError> {
    df.column(name)
        .map_err(|_| DataError::MissingColumn(name.to_string()))
}

/// Column cast to string regardless of what polars inferred
fn string_column(df: &DataFrame, name: &str) -> Result<StringChunked, DataError> {
    let series = required(df, name)?.cast(&DataType::String)?;
    Ok(series.str()?.clone())
}

fn f64_column(df: &DataFrame, name: &str) -> Result<Float64Chunked, DataError> {
    let series = required(df, name)?.cast(&DataType::Float64)?;
    Ok(series.f64()?.clone())
}

/// Optional float column; `None` when the column is absent entirely
fn optional_f64_column(df: &DataFrame, name: &str) -> Result<Option<Float64Chunked>, DataError> {
    if df.column(name).is_ok() {
        Ok(Some(f64_column(df, name)?))
    } else {
        Ok(None)
    }
}

/// Load prediction rows.
///
/// Odds columns are optional: `decimal_odds_over`/`decimal_odds_under` win,
/// a single `decimal_odds` column applies to both sides, and `default_odds`
/// fills whatever remains.
pub fn load_predictions<P: AsRef<Path>>(
    csv_path: P,
    default_odds: f64,
) -> Result<Vec<PredictionRecord>, DataError> {
    let df = read_csv(csv_path)?;

    let date_col = string_column(&df, "game_date")?;
    let player_col = string_column(&df, "player")?;
    let prob_col = f64_column(&df, "over_probability")?;
    let confidence_col = optional_f64_column(&df, "confidence")?;
    let odds_over_col = optional_f64_column(&df, "decimal_odds_over")?;
    let odds_under_col = optional_f64_column(&df, "decimal_odds_under")?;
    let odds_single_col = optional_f64_column(&df, "decimal_odds")?;

    let mut records = Vec::with_capacity(df.height());
    let mut skipped = 0usize;

    for i in 0..df.height() {
        let (raw_date, player, prob) =
            match (date_col.get(i), player_col.get(i), prob_col.get(i)) {
                (Some(d), Some(p), Some(pr)) if !p.is_empty() => (d, p, pr),
                _ => {
                    skipped += 1;
                    continue;
                }
            };

        let game_date = match parse_utc(raw_date) {
            Ok(ts) => ts,
            Err(_) => {
                warn!(row = i, value = raw_date, "unparseable game_date, skipping row");
                skipped += 1;
                continue;
            }
        };

        if !(0.0..=1.0).contains(&prob) {
            warn!(row = i, probability = prob, "probability outside [0, 1], skipping row");
            skipped += 1;
            continue;
        }

        let single = odds_single_col.as_ref().and_then(|c| c.get(i));
        let odds_over = odds_over_col
            .as_ref()
            .and_then(|c| c.get(i))
            .or(single)
            .unwrap_or(default_odds);
        let odds_under = odds_under_col
            .as_ref()
            .and_then(|c| c.get(i))
            .or(single)
            .unwrap_or(default_odds);

        records.push(PredictionRecord {
            game_date,
            player: player.to_string(),
            raw_probability: prob,
            confidence: confidence_col.as_ref().and_then(|c| c.get(i)),
            decimal_odds_over: odds_over,
            decimal_odds_under: odds_under,
        });
    }

    if skipped > 0 {
        warn!(skipped, "skipped malformed prediction rows");
    }

    Ok(records)
}

/// Load realized outcomes.
pub fn load_actuals<P: AsRef<Path>>(csv_path: P) -> Result<Vec<ActualRecord>, DataError> {
    let df = read_csv(csv_path)?;

    let date_col = string_column(&df, "game_date")?;
    let player_col = string_column(&df, "player")?;
    let outcome_col = string_column(&df, "outcome")?;

    let mut records = Vec::with_capacity(df.height());
    let mut skipped = 0usize;

    for i in 0..df.height() {
        let (raw_date, player, raw_outcome) =
            match (date_col.get(i), player_col.get(i), outcome_col.get(i)) {
                (Some(d), Some(p), Some(o)) if !p.is_empty() => (d, p, o),
                _ => {
                    skipped += 1;
                    continue;
                }
            };

        let game_date = match parse_utc(raw_date) {
            Ok(ts) => ts,
            Err(_) => {
                warn!(row = i, value = raw_date, "unparseable game_date, skipping row");
                skipped += 1;
                continue;
            }
        };

        let outcome = match parse_outcome(raw_outcome) {
            Some(o) => o,
            None => {
                warn!(row = i, value = raw_outcome, "unreadable outcome token, skipping row");
                skipped += 1;
                continue;
            }
        };

        records.push(ActualRecord {
            game_date,
            player: player.to_string(),
            outcome,
        });
    }

    if skipped > 0 {
        warn!(skipped, "skipped malformed actual rows");
    }

    Ok(records)
}

/// Parse a boolean-like outcome token: `1/0`, `true/false`, `over/under`,
/// `yes/no`, case-insensitive.
pub fn parse_outcome(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "1.0" | "true" | "over" | "yes" => Some(true),
        "0" | "0.0" | "false" | "under" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_parse_outcome_tokens() {
        assert_eq!(parse_outcome("1"), Some(true));
        assert_eq!(parse_outcome("OVER"), Some(true));
        assert_eq!(parse_outcome("True"), Some(true));
        assert_eq!(parse_outcome("0"), Some(false));
        assert_eq!(parse_outcome("under"), Some(false));
        assert_eq!(parse_outcome(" false "), Some(false));
        assert_eq!(parse_outcome("push"), None);
    }

    #[test]
    fn test_load_predictions_default_odds() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "preds.csv",
            "game_date,player,over_probability\n2025-01-01,A,0.7\n2025-01-02,B,0.4\n",
        );

        let records = load_predictions(&path, DEFAULT_DECIMAL_ODDS).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].player, "A");
        assert!((records[0].decimal_odds_over - 2.0).abs() < 1e-12);
        assert!((records[0].decimal_odds_under - 2.0).abs() < 1e-12);
        assert!(records[0].confidence.is_none());
    }

    #[test]
    fn test_load_predictions_single_odds_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "preds.csv",
            "game_date,player,over_probability,decimal_odds\n2025-01-01,A,0.7,1.91\n",
        );

        let records = load_predictions(&path, 2.0).unwrap();
        assert_eq!(records.len(), 1);
        assert!((records[0].decimal_odds_over - 1.91).abs() < 1e-12);
        assert!((records[0].decimal_odds_under - 1.91).abs() < 1e-12);
    }

    #[test]
    fn test_load_predictions_skips_bad_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "preds.csv",
            "game_date,player,over_probability\n2025-01-01,A,0.7\nnot-a-date,B,0.5\n2025-01-03,C,1.5\n",
        );

        let records = load_predictions(&path, 2.0).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].player, "A");
    }

    #[test]
    fn test_load_predictions_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "preds.csv", "game_date,player\n2025-01-01,A\n");

        let err = load_predictions(&path, 2.0).unwrap_err();
        assert!(matches!(err, DataError::MissingColumn(ref c) if c == "over_probability"));
    }

    #[test]
    fn test_load_actuals_mixed_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "actuals.csv",
            "game_date,player,outcome\n2025-01-01,A,OVER\n2025-01-02,B,false\n2025-01-03,C,maybe\n",
        );

        let records = load_actuals(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].outcome);
        assert!(!records[1].outcome);
    }

    #[test]
    fn test_load_actuals_numeric_outcome_column() {
        // polars infers a 1/0 column as integers; the loader must still read it.
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "actuals.csv",
            "game_date,player,outcome\n2025-01-01,A,1\n2025-01-02,B,0\n",
        );

        let records = load_actuals(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].outcome);
        assert!(!records[1].outcome);
    }
}
