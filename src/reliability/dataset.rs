//! Trial-level looking-time data: CSV parsing, filtering, fetch + cache.
//!
//! The file is read by header name, so column order does not matter and
//! extra columns are ignored. Only the columns below are required.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::error::{AnalysisError, Result};

use super::matrix::ItemScore;

pub const REQUIRED_COLUMNS: [&str; 7] = [
    "lab",
    "subid",
    "diff",
    "stimulus_num",
    "trial_num",
    "method",
    "age_group",
];

/// One parsed trial row.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialRow {
    pub lab: String,
    pub subid: String,
    /// Looking-time difference; `None` when the cell is empty or `NA`.
    pub diff: Option<f64>,
    pub stimulus_num: String,
    pub trial_num: String,
    pub method: String,
    pub age_group: String,
}

impl TrialRow {
    /// Subjects are only unique within a lab.
    pub fn subject_id(&self) -> String {
        format!("{}{}", self.lab, self.subid)
    }
}

/// Optional row filters; `None` keeps everything.
#[derive(Debug, Clone, Default)]
pub struct TrialFilter {
    pub method: Option<String>,
    pub age_group: Option<String>,
}

impl TrialFilter {
    pub fn accepts(&self, row: &TrialRow) -> bool {
        self.method.as_deref().map_or(true, |m| row.method == m)
            && self.age_group.as_deref().map_or(true, |a| row.age_group == a)
    }
}

/// Split one CSV line. Handles double-quoted fields with `""` escapes.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    cur.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if cur.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    fields.push(cur);
    fields
}

fn is_missing(raw: &str) -> bool {
    matches!(raw, "" | "NA" | "NaN" | "na")
}

fn field(fields: &[String], col: usize, line: usize) -> Result<&str> {
    fields
        .get(col)
        .map(|s| s.trim())
        .ok_or_else(|| AnalysisError::MalformedRow {
            line,
            reason: format!("expected at least {} fields, found {}", col + 1, fields.len()),
        })
}

/// Parse CSV text into trial rows. Line numbers in errors are 1-based.
pub fn parse_trials(text: &str) -> Result<Vec<TrialRow>> {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());
    let header = match lines.next() {
        Some((_, h)) => split_csv_line(h.trim_end_matches('\r')),
        None => {
            return Err(AnalysisError::MalformedRow {
                line: 1,
                reason: "empty file".to_string(),
            })
        }
    };

    let mut idx = [0usize; 7];
    for (slot, name) in idx.iter_mut().zip(REQUIRED_COLUMNS) {
        *slot = header
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| AnalysisError::MalformedRow {
                line: 1,
                reason: format!("missing column '{name}'"),
            })?;
    }
    let [lab, subid, diff, stimulus, trial, method, age] = idx;

    let mut rows = Vec::new();
    for (i, line) in lines {
        let line_no = i + 1;
        let fields = split_csv_line(line.trim_end_matches('\r'));
        let get = |col: usize| field(&fields, col, line_no);
        let raw_diff = get(diff)?;
        let diff_value = if is_missing(raw_diff) {
            None
        } else {
            Some(raw_diff.parse::<f64>().map_err(|_| AnalysisError::MalformedRow {
                line: line_no,
                reason: format!("cannot parse 'diff' from '{raw_diff}'"),
            })?)
        };
        rows.push(TrialRow {
            lab: get(lab)?.to_string(),
            subid: get(subid)?.to_string(),
            diff: diff_value,
            stimulus_num: get(stimulus)?.to_string(),
            trial_num: get(trial)?.to_string(),
            method: get(method)?.to_string(),
            age_group: get(age)?.to_string(),
        });
    }
    Ok(rows)
}

pub fn load_trials(path: &Path) -> Result<Vec<TrialRow>> {
    parse_trials(&fs::read_to_string(path)?)
}

/// Download `url` into `cache_path`, overwriting any previous copy.
pub fn fetch_dataset(url: &str, cache_path: &Path) -> Result<()> {
    info!(url, "downloading dataset");
    let body = reqwest::blocking::get(url)?.error_for_status()?.text()?;
    if let Some(parent) = cache_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(cache_path, body)?;
    info!(path = %cache_path.display(), "dataset cached");
    Ok(())
}

/// Parse the cached file, downloading it first on a cache miss.
pub fn load_or_fetch(cache_path: &Path, url: &str) -> Result<Vec<TrialRow>> {
    if !cache_path.exists() {
        fetch_dataset(url, cache_path)?;
    }
    load_trials(cache_path)
}

/// Long-form item scores (subject, stimulus, diff) after filtering.
///
/// Rows without a `diff` value are dropped here, before reshaping.
pub fn item_scores(rows: &[TrialRow], filter: &TrialFilter) -> Vec<ItemScore> {
    let mut missing = 0usize;
    let scores: Vec<ItemScore> = rows
        .iter()
        .filter(|r| filter.accepts(r))
        .filter_map(|r| match r.diff {
            Some(value) => Some(ItemScore {
                subject: r.subject_id(),
                item: r.stimulus_num.clone(),
                value,
            }),
            None => {
                missing += 1;
                None
            }
        })
        .collect();
    if missing > 0 {
        warn!(missing, "dropped rows without a diff value");
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
lab,subid,trial_num,stimulus_num,diff,method,age_group,notes
babylab,s1,1,1,0.5,hpp,6-9 mo,
babylab,s1,2,2,NA,hpp,6-9 mo,\"fussy, cried\"
babylab,s2,1,1,-1.25,eyetracking,3-6 mo,
infantlab,s1,1,1,,hpp,6-9 mo,
";

    #[test]
    fn quoted_fields_keep_commas() {
        let f = split_csv_line(r#"a,"b, c","say ""hi""",d"#);
        assert_eq!(f, vec!["a", "b, c", "say \"hi\"", "d"]);
    }

    #[test]
    fn parses_by_header_and_marks_missing() {
        let rows = parse_trials(SAMPLE).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].subject_id(), "babylabs1");
        assert_eq!(rows[0].diff, Some(0.5));
        assert_eq!(rows[1].diff, None);
        assert_eq!(rows[3].diff, None);
        assert_eq!(rows[2].method, "eyetracking");
    }

    #[test]
    fn missing_column_is_malformed() {
        let err = parse_trials("lab,subid,diff\na,b,1\n").unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedRow { line: 1, .. }));
    }

    #[test]
    fn bad_number_reports_line() {
        let text = "lab,subid,trial_num,stimulus_num,diff,method,age_group\nl,s,1,1,oops,hpp,a\n";
        let err = parse_trials(text).unwrap_err();
        assert!(matches!(err, AnalysisError::MalformedRow { line: 2, .. }));
    }

    #[test]
    fn filters_and_drops_missing() {
        let rows = parse_trials(SAMPLE).unwrap();
        let all = item_scores(&rows, &TrialFilter::default());
        assert_eq!(all.len(), 2);

        let hpp = item_scores(
            &rows,
            &TrialFilter {
                method: Some("hpp".into()),
                age_group: None,
            },
        );
        assert_eq!(hpp.len(), 1);
        assert_eq!(hpp[0].subject, "babylabs1");
    }

    #[test]
    fn cache_hit_skips_network() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trials.csv");
        fs::write(&path, SAMPLE).unwrap();
        // Unroutable URL: only reached on a cache miss.
        let rows = load_or_fetch(&path, "http://127.0.0.1:9/unused.csv").unwrap();
        assert_eq!(rows.len(), 4);
    }
}
