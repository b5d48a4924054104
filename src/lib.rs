//! # Attenuation — measurement error in infant looking-time studies
//!
//! Simulates how measurement error and true-score variability jointly shrink
//! observed effect sizes, tabulates the sample sizes needed to keep 80% power
//! as effects and reliabilities shrink, and estimates the reliability of a
//! real multi-lab difference score with intraclass correlations.
//!
//! ## Pipeline overview
//!
//! | Stage | Rust module | Description |
//! |-------|-------------|-------------|
//! | Generate | [`sampling`], [`simulation::engine`] | Moment-pinned true scores per condition, one shuffled error sequence per error sd recycled across conditions |
//! | Aggregate | [`simulation::statistics`] | Group by (score type, variability, error sd, true sd, true mean, panel, error label); mean, sd, Cohen's d, reliability ratio |
//! | Present | [`figure`] | 2×2 facet of kernel densities with `d`/`r` annotations |
//! | Power | [`power`], [`distributions`] | Required N for one/two-sample t tests and for correlation tests under Spearman–Brown attenuation |
//! | Reliability | [`reliability`] | Long → wide reshape, listwise deletion, six Shrout–Fleiss ICCs, Cronbach's alpha |
//!
//! ## Derived quantities
//!
//! For a condition with true mean μ, true sd σₜ and error sd σₑ:
//!
//! - total variance = σₜ² + σₑ²
//! - d = μ / √(σₜ² + σₑ²)
//! - r = σₜ² / (σₜ² + σₑ²)
//!
//! Runs are reproducible for a fixed seed within this crate; nothing
//! promises agreement with other random number generators.

pub mod constants;
pub mod distributions;
pub mod env_config;
pub mod error;
pub mod figure;
pub mod power;
pub mod reliability;
pub mod sampling;
pub mod simulation;
pub mod types;

pub use error::{AnalysisError, Result};
