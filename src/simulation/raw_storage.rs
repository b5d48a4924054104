//! File I/O for simulation output.
//!
//! Long-form records are written as CSV (one row per subject × error level ×
//! score type) so they can be re-aggregated or plotted elsewhere; summaries
//! are written as pretty JSON.

use std::fs;
use std::io::Write;
use std::path::Path;

use crate::error::{AnalysisError, Result};
use crate::types::{ConditionSummary, ErrorLabel, LongRecord, Panel, ScoreType, TrueVariability};

use super::statistics::SimulationStatistics;

pub const LONG_CSV_HEADER: &str =
    "subject_id,score_type,true_mean,true_sd,true_variability,error_sd,error_label,panel,score";

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write long-form records to `path` as CSV.
pub fn save_long_records(records: &[LongRecord], path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let mut f = std::io::BufWriter::new(fs::File::create(path)?);
    writeln!(f, "{LONG_CSV_HEADER}")?;
    for r in records {
        writeln!(
            f,
            "{},{},{},{},{},{},{},{},{}",
            r.subject_id,
            r.score_type.as_str(),
            r.true_mean,
            r.true_sd,
            r.true_variability.as_str(),
            r.error_sd,
            r.error_label.as_str(),
            r.panel.as_str(),
            r.score,
        )?;
    }
    f.flush()?;
    Ok(())
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>, line: usize, name: &str) -> Result<T> {
    let raw = field.ok_or_else(|| AnalysisError::MalformedRow {
        line,
        reason: format!("missing column '{name}'"),
    })?;
    raw.trim().parse().map_err(|_| AnalysisError::MalformedRow {
        line,
        reason: format!("cannot parse '{name}' from '{raw}'"),
    })
}

fn parse_label<T>(
    field: Option<&str>,
    line: usize,
    name: &str,
    lookup: impl Fn(&str) -> Option<T>,
) -> Result<T> {
    let raw = field.unwrap_or("");
    lookup(raw.trim()).ok_or_else(|| AnalysisError::MalformedRow {
        line,
        reason: format!("unknown {name} '{raw}'"),
    })
}

/// Read records written by [`save_long_records`].
pub fn load_long_records(path: &Path) -> Result<Vec<LongRecord>> {
    let text = fs::read_to_string(path)?;
    let mut lines = text.lines().enumerate();
    match lines.next() {
        Some((_, header)) if header.trim() == LONG_CSV_HEADER => {}
        _ => {
            return Err(AnalysisError::MalformedRow {
                line: 1,
                reason: "unexpected header".to_string(),
            })
        }
    }

    let mut records = Vec::new();
    for (idx, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let line_no = idx + 1;
        let mut cols = line.split(',');
        records.push(LongRecord {
            subject_id: parse_field(cols.next(), line_no, "subject_id")?,
            score_type: parse_label(cols.next(), line_no, "score_type", |s| match s {
                "true" => Some(ScoreType::True),
                "observed" => Some(ScoreType::Observed),
                _ => None,
            })?,
            true_mean: parse_field(cols.next(), line_no, "true_mean")?,
            true_sd: parse_field(cols.next(), line_no, "true_sd")?,
            true_variability: parse_label(cols.next(), line_no, "true_variability", |s| {
                match s {
                    "low" => Some(TrueVariability::Low),
                    "high" => Some(TrueVariability::High),
                    _ => None,
                }
            })?,
            error_sd: parse_field(cols.next(), line_no, "error_sd")?,
            error_label: parse_label(cols.next(), line_no, "error_label", |s| match s {
                "small" => Some(ErrorLabel::Small),
                "large" => Some(ErrorLabel::Large),
                _ => None,
            })?,
            panel: parse_label(cols.next(), line_no, "panel", |s| {
                Panel::ALL.into_iter().find(|p| p.as_str() == s)
            })?,
            score: parse_field(cols.next(), line_no, "score")?,
        });
    }
    Ok(records)
}

/// Write summaries plus run metadata as pretty JSON.
pub fn save_statistics(
    summaries: &[ConditionSummary],
    seed: u64,
    size: usize,
    path: &Path,
) -> Result<()> {
    ensure_parent(path)?;
    let stats = SimulationStatistics {
        seed,
        size,
        summaries,
    };
    let json = serde_json::to_string_pretty(&stats)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::engine::{simulate, to_long, SimulationConfig};
    use crate::simulation::statistics::aggregate_summaries;

    #[test]
    fn long_csv_reloads_identically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/long.csv");
        let data = simulate(&SimulationConfig {
            size: 6,
            ..SimulationConfig::default()
        })
        .unwrap();
        let long = to_long(&data);
        save_long_records(&long, &path).unwrap();
        let loaded = load_long_records(&path).unwrap();
        assert_eq!(loaded, long);
    }

    #[test]
    fn statistics_json_has_all_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summaries.json");
        let data = simulate(&SimulationConfig::default()).unwrap();
        let summaries = aggregate_summaries(&to_long(&data)).unwrap();
        save_statistics(&summaries, 1234, 50, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["seed"], 1234);
        assert_eq!(parsed["size"], 50);
        assert_eq!(parsed["summaries"].as_array().unwrap().len(), 16);
        assert_eq!(parsed["summaries"][0]["panel"], "A");
    }

    #[test]
    fn bad_header_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(&path, "a,b,c\n1,2,3\n").unwrap();
        assert!(matches!(
            load_long_records(&path),
            Err(AnalysisError::MalformedRow { line: 1, .. })
        ));
    }
}
