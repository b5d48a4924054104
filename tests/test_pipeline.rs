//! End-to-end runs of the simulation and reliability pipelines.

use attenuation::constants::{SIMULATION_SEED, SIMULATION_SIZE};
use attenuation::reliability::{
    estimate_reliability, load_or_fetch, write_up, IccKind, TrialFilter,
};
use attenuation::simulation::{
    aggregate_summaries, load_long_records, save_long_records, simulate, summaries_of, to_long,
    SimulationConfig,
};
use attenuation::types::{Panel, ScoreType};

#[test]
fn default_run_yields_sixteen_summaries() {
    let data = simulate(&SimulationConfig::default()).unwrap();
    let summaries = aggregate_summaries(&to_long(&data)).unwrap();
    assert_eq!(summaries.len(), 16);
    for s in &summaries {
        assert_eq!(s.n, SIMULATION_SIZE);
    }
    for panel in Panel::ALL {
        assert_eq!(summaries.iter().filter(|s| s.panel == panel).count(), 4);
    }
}

#[test]
fn default_run_attenuates_every_condition() {
    let data = simulate(&SimulationConfig::default()).unwrap();
    let summaries = aggregate_summaries(&to_long(&data)).unwrap();
    for s in &summaries {
        assert!(s.error_sd > 0.0);
        assert!(s.d.abs() < s.true_d().abs(), "{s:?}");
        assert!(0.0 < s.r && s.r <= 1.0, "{s:?}");
    }
}

#[test]
fn small_error_low_variability_observed_scores() {
    let config = SimulationConfig {
        size: 50,
        seed: SIMULATION_SEED,
        true_conditions: vec![(1.0, 0.5)],
        error_sds: vec![0.5],
    };
    let data = simulate(&config).unwrap();
    let summaries = aggregate_summaries(&to_long(&data)).unwrap();
    let observed: Vec<_> = summaries_of(&summaries, ScoreType::Observed).collect();
    assert_eq!(observed.len(), 1);
    let s = observed[0];
    assert_eq!(s.panel, Panel::B);
    assert!((s.d - 1.414).abs() < 1e-3, "d = {}", s.d);
    assert!((s.r - 0.5).abs() < 1e-12);
    assert!((s.total_sd - 0.5f64.sqrt()).abs() < 1e-12);
}

#[test]
fn true_scores_are_pinned_in_every_group() {
    let data = simulate(&SimulationConfig::default()).unwrap();
    let summaries = aggregate_summaries(&to_long(&data)).unwrap();
    for s in summaries_of(&summaries, ScoreType::True) {
        assert!((s.obs_mean - s.true_mean).abs() < 1e-9);
        assert!((s.obs_sd - s.true_sd).abs() < 1e-9);
    }
}

#[test]
fn same_seed_reproduces_outputs() {
    let a = to_long(&simulate(&SimulationConfig::default()).unwrap());
    let b = to_long(&simulate(&SimulationConfig::default()).unwrap());
    assert_eq!(a, b);

    let other = SimulationConfig {
        seed: SIMULATION_SEED + 1,
        ..SimulationConfig::default()
    };
    let c = to_long(&simulate(&other).unwrap());
    assert_ne!(a, c);
}

#[test]
fn outputs_written_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let data = simulate(&SimulationConfig {
        size: 20,
        ..SimulationConfig::default()
    })
    .unwrap();
    let long = to_long(&data);
    let summaries = aggregate_summaries(&long).unwrap();

    let csv = dir.path().join("nested/long.csv");
    save_long_records(&long, &csv).unwrap();
    let reloaded = load_long_records(&csv).unwrap();
    assert_eq!(reloaded, long);
    assert_eq!(aggregate_summaries(&reloaded).unwrap().len(), summaries.len());
}

#[test]
fn reliability_from_cached_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trials.csv");
    let mut text = String::from("lab,subid,trial_num,stimulus_num,diff,method,age_group\n");
    // Subject effect, small item effect, alternating ±0.2 residual.
    for s in 0..12 {
        for item in 1..=4 {
            let residual = if (s + item) % 2 == 0 { 0.2 } else { -0.2 };
            let v = s as f64 * 0.5 + item as f64 * 0.1 + residual;
            text.push_str(&format!("lab{},{},{},{},{},hpp,6-9 mo\n", s % 3, s, item, item, v));
        }
    }
    std::fs::write(&path, text).unwrap();

    let rows = load_or_fetch(&path, "http://127.0.0.1:9/never-fetched.csv").unwrap();
    let report = estimate_reliability(&rows, &TrialFilter::default(), 0.95).unwrap();
    assert_eq!(report.n_subjects, 12);
    assert_eq!(report.n_items, 4);
    let headline = report.get(IccKind::Icc2k).unwrap();
    assert!(headline.lower < headline.value && headline.value < headline.upper);
    assert!(write_up(&report).starts_with("Across 4 items and 12 infants"));
}
