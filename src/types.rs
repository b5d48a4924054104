//! Core record types for the simulation pipeline.
//!
//! Categorical fields are enums rather than strings so that grouping keys are
//! total and typo-proof. Real-valued key fields compare with
//! [`f64::total_cmp`].

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::constants::LOW_SD;
use crate::error::{AnalysisError, Result};

// ── Categorical labels ──────────────────────────────────────────────

/// True-score variability, derived from the true sd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrueVariability {
    Low,
    High,
}

impl TrueVariability {
    pub fn from_sd(sd: f64) -> Self {
        if sd <= LOW_SD {
            Self::Low
        } else {
            Self::High
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::High => "high",
        }
    }
}

/// Measurement-error size, derived from the error sd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLabel {
    Small,
    Large,
}

impl ErrorLabel {
    pub fn from_sd(sd: f64) -> Self {
        if sd <= LOW_SD {
            Self::Small
        } else {
            Self::Large
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Large => "large",
        }
    }
}

/// Figure facet. Ordered by decreasing reliability for the default grid:
///
/// | Panel | error | true variability | r |
/// |-------|-------|------------------|-----|
/// | A | small | high | 0.8 |
/// | B | small | low | 0.5 |
/// | C | large | high | 0.5 |
/// | D | large | low | 0.2 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Panel {
    A,
    B,
    C,
    D,
}

impl Panel {
    pub const ALL: [Panel; 4] = [Panel::A, Panel::B, Panel::C, Panel::D];

    pub fn from_labels(error: ErrorLabel, variability: TrueVariability) -> Self {
        match (error, variability) {
            (ErrorLabel::Small, TrueVariability::High) => Self::A,
            (ErrorLabel::Small, TrueVariability::Low) => Self::B,
            (ErrorLabel::Large, TrueVariability::High) => Self::C,
            (ErrorLabel::Large, TrueVariability::Low) => Self::D,
        }
    }

    pub fn from_sds(error_sd: f64, true_sd: f64) -> Self {
        Self::from_labels(
            ErrorLabel::from_sd(error_sd),
            TrueVariability::from_sd(true_sd),
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }

    /// Grid position (row, col) in the 2×2 facet layout.
    pub fn grid_position(self) -> (usize, usize) {
        match self {
            Self::A => (0, 0),
            Self::B => (0, 1),
            Self::C => (1, 0),
            Self::D => (1, 1),
        }
    }
}

impl fmt::Display for Panel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which score a long-form row carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreType {
    True,
    Observed,
}

impl ScoreType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::True => "true",
            Self::Observed => "observed",
        }
    }
}

// ── Conditions ──────────────────────────────────────────────────────

/// A true-score distribution (mean, sd).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrueScoreCondition {
    pub mean: f64,
    pub sd: f64,
}

impl TrueScoreCondition {
    pub fn new(mean: f64, sd: f64) -> Result<Self> {
        if !mean.is_finite() {
            return Err(AnalysisError::invalid("true_mean", mean, "must be finite"));
        }
        if !(sd.is_finite() && sd > 0.0) {
            return Err(AnalysisError::invalid("true_sd", sd, "must be > 0"));
        }
        Ok(Self { mean, sd })
    }

    pub fn variability(&self) -> TrueVariability {
        TrueVariability::from_sd(self.sd)
    }
}

// ── Records ─────────────────────────────────────────────────────────

/// One synthetic subject's latent score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrueScoreSample {
    /// Unique within the true-score condition (0-based).
    pub id: usize,
    pub condition: TrueScoreCondition,
    pub score_true: f64,
}

impl TrueScoreSample {
    pub fn true_variability(&self) -> TrueVariability {
        self.condition.variability()
    }
}

/// One noise value from N(0, error_sd²).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementErrorDraw {
    pub error_sd: f64,
    pub value: f64,
}

impl MeasurementErrorDraw {
    pub fn label(&self) -> ErrorLabel {
        ErrorLabel::from_sd(self.error_sd)
    }
}

/// A true score plus the error draw recycled onto it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedRecord {
    pub sample: TrueScoreSample,
    pub error: MeasurementErrorDraw,
    pub score_observed: f64,
    pub panel: Panel,
}

impl ObservedRecord {
    pub fn new(sample: TrueScoreSample, error: MeasurementErrorDraw) -> Self {
        Self {
            sample,
            error,
            score_observed: sample.score_true + error.value,
            panel: Panel::from_sds(error.error_sd, sample.condition.sd),
        }
    }
}

/// Long-form row: one per subject × error level × score type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LongRecord {
    pub subject_id: usize,
    pub score_type: ScoreType,
    pub true_mean: f64,
    pub true_sd: f64,
    pub true_variability: TrueVariability,
    pub error_sd: f64,
    pub error_label: ErrorLabel,
    pub panel: Panel,
    pub score: f64,
}

impl LongRecord {
    pub fn key(&self) -> GroupKey {
        GroupKey {
            score_type: self.score_type,
            true_variability: self.true_variability,
            error_sd: self.error_sd,
            true_sd: self.true_sd,
            true_mean: self.true_mean,
            panel: self.panel,
            error_label: self.error_label,
        }
    }
}

/// Composite grouping key for the aggregator.
#[derive(Debug, Clone, Copy)]
pub struct GroupKey {
    pub score_type: ScoreType,
    pub true_variability: TrueVariability,
    pub error_sd: f64,
    pub true_sd: f64,
    pub true_mean: f64,
    pub panel: Panel,
    pub error_label: ErrorLabel,
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.panel
            .cmp(&other.panel)
            .then(self.true_mean.total_cmp(&other.true_mean))
            .then(self.score_type.cmp(&other.score_type))
            .then(self.true_variability.cmp(&other.true_variability))
            .then(self.error_sd.total_cmp(&other.error_sd))
            .then(self.true_sd.total_cmp(&other.true_sd))
            .then(self.error_label.cmp(&other.error_label))
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for GroupKey {}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} mean={} true_sd={} error_sd={}",
            self.panel,
            self.score_type.as_str(),
            self.true_mean,
            self.true_sd,
            self.error_sd
        )
    }
}

/// One aggregated row per [`GroupKey`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConditionSummary {
    pub score_type: ScoreType,
    pub true_variability: TrueVariability,
    pub error_sd: f64,
    pub true_sd: f64,
    pub true_mean: f64,
    pub panel: Panel,
    pub error_label: ErrorLabel,
    pub n: usize,
    pub obs_mean: f64,
    pub obs_sd: f64,
    /// obs_mean / obs_sd
    pub sample_d: f64,
    pub total_var: f64,
    pub total_sd: f64,
    /// Attenuated effect size true_mean / total_sd.
    pub d: f64,
    /// Reliability ratio true_var / total_var.
    pub r: f64,
}

impl ConditionSummary {
    pub fn true_d(&self) -> f64 {
        self.true_mean / self.true_sd
    }
}
