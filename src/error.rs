//! Error type shared by every stage of the analysis.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A numeric argument is outside its domain.
    #[error("Invalid value for '{name}': {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// A summary group has too few members for a sample standard deviation.
    #[error("Group '{group}' has {count} observation(s); sample sd needs at least 2")]
    DegenerateGroup { group: String, count: usize },

    /// The recycled error sequence does not line up with a true-score condition.
    #[error(
        "Cannot recycle {errors} error draws (sd {error_sd}) over a condition of {subjects} subjects"
    )]
    RecycleLengthMismatch {
        error_sd: f64,
        errors: usize,
        subjects: usize,
    },

    /// No root inside the search bracket.
    #[error("No sample size in [{lo}, {hi}] reaches the target for '{what}'")]
    NoRoot { what: String, lo: f64, hi: f64 },

    /// A CSV row could not be interpreted.
    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    /// Two different values were recorded for the same (subject, item) cell.
    #[error("Conflicting values for subject '{subject}', item '{item}': {first} vs {second}")]
    ConflictingCell {
        subject: String,
        item: String,
        first: f64,
        second: f64,
    },

    /// Too little complete data to estimate reliability.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Plot error: {0}")]
    Plot(String),
}

impl AnalysisError {
    pub(crate) fn invalid(name: &'static str, value: f64, reason: &'static str) -> Self {
        Self::InvalidParameter {
            name,
            value,
            reason,
        }
    }
}
