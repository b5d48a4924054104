//! Simulation engine: draws true scores, injects measurement error and
//! reshapes the result to long form.
//!
//! ## Error recycling
//!
//! One shuffled error sequence is drawn per error level and reused for every
//! true-score condition: subject `i` of each condition receives the same
//! noise value. Differences between conditions at a fixed error level are
//! therefore due to true-score variability alone. The sequence length must
//! equal each condition's size; [`inject_errors`] checks this rather than
//! relying on draw order.

use tracing::{debug, info};

use crate::constants::{ERROR_SDS, SIMULATION_SEED, SIMULATION_SIZE, TRUE_SCORE_CONDITIONS};
use crate::error::{AnalysisError, Result};
use crate::sampling::{draw_error_sequence, draw_pinned, seeded_rng};
use crate::types::{
    LongRecord, MeasurementErrorDraw, ObservedRecord, ScoreType, TrueScoreCondition,
    TrueScoreSample,
};

/// Parameters of one simulation run.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub size: usize,
    pub seed: u64,
    pub true_conditions: Vec<(f64, f64)>,
    pub error_sds: Vec<f64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            size: SIMULATION_SIZE,
            seed: SIMULATION_SEED,
            true_conditions: TRUE_SCORE_CONDITIONS.to_vec(),
            error_sds: ERROR_SDS.to_vec(),
        }
    }
}

/// Everything one run produces before aggregation.
pub struct SimulationData {
    pub config: SimulationConfig,
    /// One vector per true-score condition, `size` samples each.
    pub true_samples: Vec<Vec<TrueScoreSample>>,
    /// One vector per error level, in `config.error_sds` order.
    pub error_draws: Vec<Vec<MeasurementErrorDraw>>,
    /// Error level major, then condition, then subject.
    pub observed: Vec<ObservedRecord>,
}

/// Draw `size` pinned true scores for each condition.
pub fn generate_true_scores(
    rng: &mut rand::rngs::SmallRng,
    size: usize,
    conditions: &[TrueScoreCondition],
) -> Result<Vec<Vec<TrueScoreSample>>> {
    conditions
        .iter()
        .map(|&condition| {
            let scores = draw_pinned(rng, size, condition.mean, condition.sd)?;
            Ok(scores
                .into_iter()
                .enumerate()
                .map(|(id, score_true)| TrueScoreSample {
                    id,
                    condition,
                    score_true,
                })
                .collect())
        })
        .collect()
}

/// Pair every condition's samples with the same error sequence, index by index.
pub fn inject_errors(
    true_samples: &[Vec<TrueScoreSample>],
    errors: &[MeasurementErrorDraw],
) -> Result<Vec<ObservedRecord>> {
    let error_sd = errors.first().map_or(f64::NAN, |e| e.error_sd);
    let mut observed = Vec::with_capacity(true_samples.len() * errors.len());
    for samples in true_samples {
        if samples.len() != errors.len() {
            return Err(AnalysisError::RecycleLengthMismatch {
                error_sd,
                errors: errors.len(),
                subjects: samples.len(),
            });
        }
        observed.extend(
            samples
                .iter()
                .zip(errors)
                .map(|(&sample, &error)| ObservedRecord::new(sample, error)),
        );
    }
    Ok(observed)
}

/// Run the generator for `config`. Same config, same output.
pub fn simulate(config: &SimulationConfig) -> Result<SimulationData> {
    let conditions = config
        .true_conditions
        .iter()
        .map(|&(mean, sd)| TrueScoreCondition::new(mean, sd))
        .collect::<Result<Vec<_>>>()?;
    for (i, c) in conditions.iter().enumerate() {
        if conditions[..i].contains(c) {
            return Err(AnalysisError::invalid(
                "true_conditions",
                c.mean,
                "duplicate (mean, sd) pair",
            ));
        }
    }
    for (i, &error_sd) in config.error_sds.iter().enumerate() {
        if config.error_sds[..i].contains(&error_sd) {
            return Err(AnalysisError::invalid("error_sds", error_sd, "duplicate error sd"));
        }
    }

    info!(
        size = config.size,
        seed = config.seed,
        conditions = conditions.len(),
        error_levels = config.error_sds.len(),
        "simulating"
    );

    let mut rng = seeded_rng(config.seed);
    let true_samples = generate_true_scores(&mut rng, config.size, &conditions)?;

    let mut error_draws = Vec::with_capacity(config.error_sds.len());
    let mut observed = Vec::new();
    for &error_sd in &config.error_sds {
        let errors = draw_error_sequence(&mut rng, config.size, error_sd)?;
        let records = inject_errors(&true_samples, &errors)?;
        debug!(error_sd, records = records.len(), "errors injected");
        observed.extend(records);
        error_draws.push(errors);
    }

    Ok(SimulationData {
        config: config.clone(),
        true_samples,
        error_draws,
        observed,
    })
}

/// Reshape to long form: a `true` row and an `observed` row per record,
/// sharing all descriptive columns and a subject id that is unique across
/// conditions (`condition_index * size + id`).
pub fn to_long(data: &SimulationData) -> Vec<LongRecord> {
    let size = data.config.size;
    let n_conditions = data.true_samples.len();
    let mut long = Vec::with_capacity(data.observed.len() * 2);
    if size == 0 || n_conditions == 0 {
        return long;
    }
    // `observed` is laid out in blocks of `size`, cycling through conditions.
    for (block, records) in data.observed.chunks(size).enumerate() {
        let condition_index = block % n_conditions;
        for rec in records {
            let base = LongRecord {
                subject_id: condition_index * size + rec.sample.id,
                score_type: ScoreType::True,
                true_mean: rec.sample.condition.mean,
                true_sd: rec.sample.condition.sd,
                true_variability: rec.sample.true_variability(),
                error_sd: rec.error.error_sd,
                error_label: rec.error.label(),
                panel: rec.panel,
                score: rec.sample.score_true,
            };
            long.push(base);
            long.push(LongRecord {
                score_type: ScoreType::Observed,
                score: rec.score_observed,
                ..base
            });
        }
    }
    long
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::statistics::{mean, sample_sd};
    use crate::types::Panel;

    #[test]
    fn default_run_has_eight_groups_of_size() {
        let data = simulate(&SimulationConfig::default()).unwrap();
        assert_eq!(data.true_samples.len(), 4);
        assert_eq!(data.error_draws.len(), 2);
        assert_eq!(data.observed.len(), 8 * SIMULATION_SIZE);
        assert_eq!(to_long(&data).len(), 16 * SIMULATION_SIZE);
    }

    #[test]
    fn errors_recycled_identically_across_conditions() {
        let data = simulate(&SimulationConfig::default()).unwrap();
        let size = data.config.size;
        // first error level block: 4 conditions × size
        for cond in 1..4 {
            for i in 0..size {
                let a = data.observed[i].error.value;
                let b = data.observed[cond * size + i].error.value;
                assert_eq!(a, b, "condition {cond}, subject {i}");
            }
        }
    }

    #[test]
    fn true_scores_pinned_per_condition() {
        let data = simulate(&SimulationConfig::default()).unwrap();
        for samples in &data.true_samples {
            let c = samples[0].condition;
            let xs: Vec<f64> = samples.iter().map(|s| s.score_true).collect();
            assert!((mean(&xs) - c.mean).abs() < 1e-9);
            assert!((sample_sd(&xs).unwrap() - c.sd).abs() < 1e-9);
        }
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let mut rng = seeded_rng(3);
        let cond = [TrueScoreCondition::new(1.0, 1.0).unwrap()];
        let samples = generate_true_scores(&mut rng, 10, &cond).unwrap();
        let errors = draw_error_sequence(&mut rng, 8, 0.5).unwrap();
        let err = inject_errors(&samples, &errors).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::RecycleLengthMismatch {
                errors: 8,
                subjects: 10,
                ..
            }
        ));
    }

    #[test]
    fn long_rows_share_subject_ids() {
        let data = simulate(&SimulationConfig {
            size: 5,
            ..SimulationConfig::default()
        })
        .unwrap();
        let long = to_long(&data);
        for pair in long.chunks(2) {
            assert_eq!(pair[0].subject_id, pair[1].subject_id);
            assert_eq!(pair[0].score_type, ScoreType::True);
            assert_eq!(pair[1].score_type, ScoreType::Observed);
            assert_eq!(pair[0].panel, pair[1].panel);
        }
        let mut ids: Vec<usize> = long
            .iter()
            .filter(|r| r.score_type == ScoreType::True && r.error_sd == 0.5)
            .map(|r| r.subject_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 4 * 5);
    }

    #[test]
    fn duplicate_conditions_are_rejected() {
        let config = SimulationConfig {
            size: 5,
            true_conditions: vec![(1.0, 1.0), (1.0, 1.0)],
            error_sds: vec![0.5],
            ..SimulationConfig::default()
        };
        let err = simulate(&config).err().unwrap();
        assert!(matches!(
            err,
            AnalysisError::InvalidParameter {
                name: "true_conditions",
                ..
            }
        ));
    }

    #[test]
    fn duplicate_error_sds_are_rejected() {
        let config = SimulationConfig {
            size: 5,
            error_sds: vec![0.5, 2.0, 0.5],
            ..SimulationConfig::default()
        };
        let err = simulate(&config).err().unwrap();
        assert!(matches!(
            err,
            AnalysisError::InvalidParameter {
                name: "error_sds",
                ..
            }
        ));
    }

    #[test]
    fn conditions_sharing_a_mean_get_distinct_ids() {
        // Same mean, different sd: each condition keeps its own block of ids.
        let data = simulate(&SimulationConfig {
            size: 5,
            true_conditions: vec![(1.0, 1.0), (1.0, 0.5)],
            error_sds: vec![0.5, 2.0],
            ..SimulationConfig::default()
        })
        .unwrap();
        let long = to_long(&data);
        for error_sd in [0.5, 2.0] {
            let mut ids: Vec<usize> = long
                .iter()
                .filter(|r| r.score_type == ScoreType::True && r.error_sd == error_sd)
                .map(|r| r.subject_id)
                .collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids, (0..10).collect::<Vec<_>>());
        }
        let summaries = crate::simulation::aggregate_summaries(&long).unwrap();
        assert_eq!(summaries.len(), 2 * 2 * 2);
        assert!(summaries.iter().all(|s| s.n == 5));
    }

    #[test]
    fn every_panel_populated() {
        let data = simulate(&SimulationConfig::default()).unwrap();
        for panel in Panel::ALL {
            assert!(data.observed.iter().any(|r| r.panel == panel));
        }
    }
}
