//! Reliability of the per-trial difference score on real multi-lab data.
//!
//! - [`dataset`]: CSV parsing, filters, fetch + cache
//! - [`matrix`]: long → subjects × items reshape with listwise deletion
//! - [`icc`]: two-way ANOVA, six ICC forms, Cronbach's alpha, write-up

pub mod dataset;
pub mod icc;
pub mod matrix;

pub use dataset::{item_scores, load_or_fetch, load_trials, parse_trials, TrialFilter, TrialRow};
pub use icc::{format_icc_table, icc, save_report, write_up, IccEstimate, IccKind, IccReport};
pub use matrix::{CompleteMatrix, ItemScore, ScoreMatrix};

use tracing::info;

use crate::error::Result;

/// Filter, reshape and estimate in one step.
pub fn estimate_reliability(
    rows: &[TrialRow],
    filter: &TrialFilter,
    confidence: f64,
) -> Result<IccReport> {
    let scores = item_scores(rows, filter);
    let wide = ScoreMatrix::from_long(&scores)?;
    let complete = wide.complete_rows();
    info!(
        subjects = wide.subjects.len(),
        complete = complete.n_subjects(),
        items = complete.n_items(),
        "reshaped trial data"
    );
    icc(&complete, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;

    #[test]
    fn end_to_end_on_small_csv() {
        let mut text = String::from("lab,subid,trial_num,stimulus_num,diff,method,age_group\n");
        let data = [
            [1.0, 2.0, 1.5],
            [3.0, 3.5, 2.5],
            [0.0, 0.5, -0.5],
            [2.0, 2.5, 2.0],
        ];
        for (s, row) in data.iter().enumerate() {
            for (item, v) in row.iter().enumerate() {
                text.push_str(&format!("lab{s},kid,{item},{item},{v},hpp,6-9 mo\n"));
            }
        }
        // Incomplete subject, dropped by listwise deletion.
        text.push_str("lab9,kid,0,0,1.0,hpp,6-9 mo\n");
        text.push_str("lab9,kid,1,1,NA,hpp,6-9 mo\n");

        let rows = parse_trials(&text).unwrap();
        let report = estimate_reliability(&rows, &TrialFilter::default(), 0.95).unwrap();
        assert_eq!(report.n_subjects, 4);
        assert_eq!(report.n_items, 3);
        assert_eq!(report.excluded_subjects, 1);
        assert!(report.get(IccKind::Icc2k).unwrap().value > 0.8);
    }

    #[test]
    fn filter_can_empty_the_matrix() {
        let text = "lab,subid,trial_num,stimulus_num,diff,method,age_group\nl,s,1,1,1.0,hpp,a\n";
        let rows = parse_trials(text).unwrap();
        let filter = TrialFilter {
            method: Some("eyetracking".into()),
            age_group: None,
        };
        assert!(matches!(
            estimate_reliability(&rows, &filter, 0.95),
            Err(AnalysisError::InsufficientData(_))
        ));
    }
}
