//! Fixed analysis parameters.
//!
//! Every run of the binaries starts from these values. A few of them can be
//! overridden from the command line (seed, size, output directory, dataset
//! path), but nothing here is read from a config file.

/// Subjects per (true-score condition, error condition) group.
pub const SIMULATION_SIZE: usize = 50;

/// Seed for the single RNG that drives one simulation run.
pub const SIMULATION_SEED: u64 = 1234;

/// True-score (mean, sd) conditions. Crossing both means with both sds gives
/// true effect sizes of 1, 2, 0.5 and 1.
pub const TRUE_SCORE_CONDITIONS: [(f64, f64); 4] = [(0.5, 0.5), (1.0, 0.5), (0.5, 1.0), (1.0, 1.0)];

/// Measurement-error standard deviations ("small", "large").
pub const ERROR_SDS: [f64; 2] = [0.5, 1.0];

/// The sd value that marks low true variability / a small error.
pub const LOW_SD: f64 = 0.5;

/// Absolute tolerance for the moment-pinned sample mean and sd.
pub const PINNED_MOMENT_TOLERANCE: f64 = 1e-9;

// ── Power analysis ──────────────────────────────────────────────────

/// Cohen's d grid for the t-test sample-size table.
pub const EFFECT_SIZE_GRID: [f64; 5] = [0.2, 0.4, 0.6, 0.8, 1.0];

/// Reliability grid (rxx = ryy) for the attenuated-correlation table.
pub const RELIABILITY_GRID: [f64; 5] = [1.0, 0.8, 0.6, 0.4, 0.2];

/// Correlation between the two true scores before attenuation.
pub const TRUE_CORRELATION: f64 = 0.7;

pub const SIG_LEVEL: f64 = 0.05;
pub const TARGET_POWER: f64 = 0.8;

/// Search brackets for the continuous sample-size root.
pub const T_TEST_N_BRACKET: (f64, f64) = (2.0 + 1e-10, 1e7);
pub const R_TEST_N_BRACKET: (f64, f64) = (4.0 + 1e-10, 1e9);

// ── Reliability dataset ─────────────────────────────────────────────

/// ManyBabies 1 trial-level data (public analysis repository).
pub const DATASET_URL: &str =
    "https://raw.githubusercontent.com/manybabies/mb1-analysis-public/master/processed_data/03_data_trial_main.csv";

/// Local snapshot of [`DATASET_URL`].
pub const DATASET_CACHE_PATH: &str = "data/mb1_trial_main.csv";

/// Confidence level for ICC intervals.
pub const ICC_CONFIDENCE: f64 = 0.95;

// ── Outputs ─────────────────────────────────────────────────────────

pub const DEFAULT_OUTPUT_DIR: &str = "outputs";
pub const FIGURE_FILE_NAME: &str = "attenuation_figure.png";
pub const LONG_RECORDS_FILE_NAME: &str = "simulation_long.csv";
pub const SUMMARIES_FILE_NAME: &str = "condition_summaries.json";
pub const POWER_TABLES_FILE_NAME: &str = "power_tables.json";
pub const RELIABILITY_FILE_NAME: &str = "reliability.json";

/// Figure size in inches (width, height) and resolution.
pub const FIGURE_INCHES: (f64, f64) = (8.5, 5.0);
pub const FIGURE_DPI: u32 = 300;

/// Figure size in pixels: 8.5 × 5 in at 300 dpi = 2550 × 1500.
pub fn figure_pixels() -> (u32, u32) {
    (
        (FIGURE_INCHES.0 * FIGURE_DPI as f64).round() as u32,
        (FIGURE_INCHES.1 * FIGURE_DPI as f64).round() as u32,
    )
}
