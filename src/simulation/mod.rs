//! Attenuation simulation and aggregation.
//!
//! - [`engine`]: draw true scores, recycle error sequences, reshape to long form
//! - [`statistics`]: group-by/summarize into [`ConditionSummary`](crate::types::ConditionSummary) rows
//! - [`raw_storage`]: CSV/JSON output of records and summaries

pub mod engine;
pub mod raw_storage;
pub mod statistics;

pub use engine::{
    generate_true_scores, inject_errors, simulate, to_long, SimulationConfig, SimulationData,
};
pub use raw_storage::{load_long_records, save_long_records, save_statistics};
pub use statistics::{
    aggregate_summaries, attenuation, format_summary_table, mean, sample_sd, summaries_of,
    Attenuation,
};
