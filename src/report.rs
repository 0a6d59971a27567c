//! Run artifact writing
//!
//! Four artifacts per run: `bets.csv` (full ledger, NO_BET rows included),
//! `summary.csv`, `calibration.csv` (reliability table), and
//! `metadata.json`. Each file is written to a temp path in the target
//! directory and renamed into place, so a crash mid-write never leaves a
//! half-written artifact behind.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::backtesting::BacktestRun;
use crate::calibration::ReliabilityBin;

/// Write all artifacts for a completed run into `dir`.
pub fn write_run(
    dir: &Path,
    run: &BacktestRun,
    reliability: &[ReliabilityBin],
) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    write_atomic(dir, "bets.csv", &render_bets(run))?;
    write_atomic(dir, "summary.csv", &render_summary(run))?;
    write_atomic(dir, "calibration.csv", &render_reliability(reliability))?;

    let metadata = serde_json::to_string_pretty(&run.metadata)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    write_atomic(dir, "metadata.json", &metadata)?;

    Ok(())
}

/// Write `contents` to `dir/name` via a temp file and an atomic rename.
fn write_atomic(dir: &Path, name: &str, contents: &str) -> io::Result<()> {
    let tmp_path = dir.join(format!(".{}.tmp", name));
    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, dir.join(name))
}

/// Escape a CSV field: wrap in quotes when it contains a comma or quote
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn render_bets(run: &BacktestRun) -> String {
    let mut out = String::from(
        "player,game_date,calibrated_probability,side,stake_fraction,stake_amount,odds_used,outcome,profit,skip_reason\n",
    );
    for d in &run.ledger {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            csv_escape(&d.player),
            d.game_date.to_rfc3339(),
            d.calibrated_probability,
            d.side.as_str(),
            d.stake_fraction,
            d.stake_amount,
            d.odds_used,
            d.outcome,
            d.profit,
            d.skip_reason.map(|r| r.as_str()).unwrap_or(""),
        ));
    }
    out
}

fn render_summary(run: &BacktestRun) -> String {
    let s = &run.summary;
    format!(
        "initial_bankroll,final_bankroll,roi,win_rate,total_bets,sharpe,max_drawdown,cagr\n{},{},{},{},{},{},{},{}\n",
        s.initial_bankroll,
        s.final_bankroll,
        s.roi,
        s.win_rate,
        s.total_bets,
        s.sharpe,
        s.max_drawdown,
        s.cagr,
    )
}

fn render_reliability(bins: &[ReliabilityBin]) -> String {
    let mut out = String::from("bin_lo,bin_hi,mean_pred,mean_observed,count\n");
    for bin in bins {
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            bin.lo, bin.hi, bin.mean_pred, bin.mean_observed, bin.count
        ));
    }
    out
}
