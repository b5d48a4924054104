//! Aggregation of long-form records into condition summaries.
//!
//! Records are grouped by the composite [`GroupKey`] and each group is folded
//! into one [`ConditionSummary`]: empirical mean, Bessel-corrected sd, and the
//! theoretical quantities that depend only on the condition parameters.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::error::{AnalysisError, Result};
use crate::types::{ConditionSummary, GroupKey, LongRecord, ScoreType};

// ── Descriptives ────────────────────────────────────────────────────

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample variance with n−1 denominator. `None` when n < 2.
pub fn sample_variance(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let m = mean(xs);
    let ss: f64 = xs.iter().map(|&x| (x - m).powi(2)).sum();
    Some(ss / (xs.len() - 1) as f64)
}

pub fn sample_sd(xs: &[f64]) -> Option<f64> {
    sample_variance(xs).map(f64::sqrt)
}

// ── Derived quantities ──────────────────────────────────────────────

/// Condition-level quantities implied by (true_mean, true_sd, error_sd).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Attenuation {
    pub total_var: f64,
    pub total_sd: f64,
    /// true_mean / total_sd
    pub d: f64,
    /// true_sd² / total_var
    pub r: f64,
}

pub fn attenuation(true_mean: f64, true_sd: f64, error_sd: f64) -> Attenuation {
    let true_var = true_sd * true_sd;
    let total_var = error_sd * error_sd + true_var;
    let total_sd = total_var.sqrt();
    Attenuation {
        total_var,
        total_sd,
        d: true_mean / total_sd,
        r: true_var / total_var,
    }
}

// ── Aggregation ─────────────────────────────────────────────────────

/// Fold one group into a summary. Fails for groups smaller than 2.
pub fn summarize_group(key: &GroupKey, scores: &[f64]) -> Result<ConditionSummary> {
    let obs_sd = sample_sd(scores).ok_or_else(|| AnalysisError::DegenerateGroup {
        group: key.to_string(),
        count: scores.len(),
    })?;
    let obs_mean = mean(scores);
    let a = attenuation(key.true_mean, key.true_sd, key.error_sd);
    Ok(ConditionSummary {
        score_type: key.score_type,
        true_variability: key.true_variability,
        error_sd: key.error_sd,
        true_sd: key.true_sd,
        true_mean: key.true_mean,
        panel: key.panel,
        error_label: key.error_label,
        n: scores.len(),
        obs_mean,
        obs_sd,
        sample_d: obs_mean / obs_sd,
        total_var: a.total_var,
        total_sd: a.total_sd,
        d: a.d,
        r: a.r,
    })
}

/// One summary per distinct key, in key order. Input order does not matter.
pub fn aggregate_summaries(records: &[LongRecord]) -> Result<Vec<ConditionSummary>> {
    let mut groups: BTreeMap<GroupKey, Vec<f64>> = BTreeMap::new();
    for rec in records {
        groups.entry(rec.key()).or_default().push(rec.score);
    }
    debug!(records = records.len(), groups = groups.len(), "aggregating");
    groups
        .iter()
        .map(|(key, scores)| summarize_group(key, scores))
        .collect()
}

/// Summaries of one score type only.
pub fn summaries_of(
    summaries: &[ConditionSummary],
    score_type: ScoreType,
) -> impl Iterator<Item = &ConditionSummary> {
    summaries.iter().filter(move |s| s.score_type == score_type)
}

/// Serialized form of a run's summaries.
#[derive(Serialize)]
pub struct SimulationStatistics<'a> {
    pub seed: u64,
    pub size: usize,
    pub summaries: &'a [ConditionSummary],
}

/// Console table of the observed-score summaries.
pub fn format_summary_table(summaries: &[ConditionSummary]) -> String {
    let mut out = String::new();
    out.push_str("Panel  Type      Mean  TrueSD  ErrSD   ObsMean  ObsSD  SampleD  TrueD      d     r\n");
    for s in summaries {
        out.push_str(&format!(
            "{:<5}  {:<8}  {:>4.1}  {:>6.1}  {:>5.1}  {:>8.3}  {:>5.3}  {:>7.3}  {:>5.2}  {:>5.3}  {:>4.2}\n",
            s.panel.as_str(),
            s.score_type.as_str(),
            s.true_mean,
            s.true_sd,
            s.error_sd,
            s.obs_mean,
            s.obs_sd,
            s.sample_d,
            s.true_d(),
            s.d,
            s.r,
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorLabel, Panel, TrueVariability};

    fn rec(score_type: ScoreType, score: f64) -> LongRecord {
        LongRecord {
            subject_id: 0,
            score_type,
            true_mean: 1.0,
            true_sd: 1.0,
            true_variability: TrueVariability::High,
            error_sd: 1.0,
            error_label: ErrorLabel::Large,
            panel: Panel::C,
            score,
        }
    }

    #[test]
    fn attenuation_unit_case() {
        let a = attenuation(1.0, 1.0, 1.0);
        assert!((a.total_var - 2.0).abs() < 1e-12);
        assert!((a.total_sd - 2f64.sqrt()).abs() < 1e-12);
        assert!((a.d - 0.7071).abs() < 1e-4);
        assert!((a.r - 0.5).abs() < 1e-12);
    }

    #[test]
    fn attenuation_low_variability_case() {
        let a = attenuation(1.0, 0.5, 1.0);
        assert!((a.total_var - 1.25).abs() < 1e-12);
        assert!((a.d - 0.8944).abs() < 1e-4);
        assert!((a.r - 0.2).abs() < 1e-12);
    }

    #[test]
    fn variance_uses_bessel() {
        let v = sample_variance(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!((v - 5.0 / 3.0).abs() < 1e-12);
        assert!(sample_variance(&[1.0]).is_none());
    }

    #[test]
    fn one_summary_per_group() {
        let records = vec![
            rec(ScoreType::True, 1.0),
            rec(ScoreType::Observed, 0.0),
            rec(ScoreType::True, 3.0),
            rec(ScoreType::Observed, 4.0),
        ];
        let summaries = aggregate_summaries(&records).unwrap();
        assert_eq!(summaries.len(), 2);
        let t = summaries_of(&summaries, ScoreType::True).next().unwrap();
        assert_eq!(t.n, 2);
        assert!((t.obs_mean - 2.0).abs() < 1e-12);
        assert!((t.obs_sd - 2f64.sqrt()).abs() < 1e-12);
        assert!((t.sample_d - 2.0 / 2f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn aggregation_ignores_order() {
        let mut records = vec![
            rec(ScoreType::True, 1.0),
            rec(ScoreType::Observed, 0.5),
            rec(ScoreType::True, 2.5),
            rec(ScoreType::Observed, -1.0),
            rec(ScoreType::True, 0.25),
            rec(ScoreType::Observed, 3.0),
        ];
        let a = aggregate_summaries(&records).unwrap();
        records.reverse();
        let b = aggregate_summaries(&records).unwrap();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.score_type, y.score_type);
            assert!((x.obs_mean - y.obs_mean).abs() < 1e-12);
            assert!((x.obs_sd - y.obs_sd).abs() < 1e-12);
        }
    }

    #[test]
    fn singleton_group_is_an_error() {
        let records = vec![rec(ScoreType::True, 1.0), rec(ScoreType::True, 2.0), rec(ScoreType::Observed, 0.0)];
        let err = aggregate_summaries(&records).unwrap_err();
        assert!(matches!(err, AnalysisError::DegenerateGroup { count: 1, .. }));
    }

    #[test]
    fn table_has_row_per_summary() {
        let records = vec![
            rec(ScoreType::True, 1.0),
            rec(ScoreType::True, 2.0),
            rec(ScoreType::Observed, 0.0),
            rec(ScoreType::Observed, 2.0),
        ];
        let summaries = aggregate_summaries(&records).unwrap();
        let table = format_summary_table(&summaries);
        assert_eq!(table.lines().count(), 3);
    }
}
