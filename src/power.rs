//! Power and sample-size lookup.
//!
//! Two routines, both solving power(n) = target for a continuous n and
//! reporting the ceiling:
//!
//! | Test | Power function | n bracket |
//! |------|----------------|-----------|
//! | t test (one- or two-sample, two-sided) | noncentral t, ncp = d·√(n/k), df = (n−1)·k | [`T_TEST_N_BRACKET`] |
//! | correlation (two-sided) | Fisher z with r/(2(n−1)) bias term | [`R_TEST_N_BRACKET`] |
//!
//! where k = 1 for one-sample and 2 for two-sample (n per group).
//! Observed correlations are attenuated with [`spearman_brown`] before lookup.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::constants::{
    EFFECT_SIZE_GRID, RELIABILITY_GRID, R_TEST_N_BRACKET, SIG_LEVEL, TARGET_POWER,
    TRUE_CORRELATION, T_TEST_N_BRACKET,
};
use crate::distributions::{bisect, nct_cdf, normal_cdf, t_quantile};
use crate::error::{AnalysisError, Result};

const ROOT_TOL: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TestFamily {
    OneSample,
    TwoSample,
}

impl TestFamily {
    fn samples(self) -> f64 {
        match self {
            Self::OneSample => 1.0,
            Self::TwoSample => 2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneSample => "one-sample",
            Self::TwoSample => "two-sample",
        }
    }
}

/// Continuous root and the integer sample size to report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleSize {
    pub exact: f64,
    pub required: u64,
}

impl SampleSize {
    fn from_root(exact: f64) -> Self {
        Self {
            exact,
            required: exact.ceil() as u64,
        }
    }
}

fn check_open_unit(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(AnalysisError::invalid(name, value, "must lie in (0, 1)"))
    }
}

// ── Attenuation ─────────────────────────────────────────────────────

/// Observed correlation implied by a true correlation and two reliabilities:
/// `r_true · √(rxx · ryy)`.
pub fn spearman_brown(r_true: f64, rxx: f64, ryy: f64) -> Result<f64> {
    if !(r_true.is_finite() && (-1.0..=1.0).contains(&r_true)) {
        return Err(AnalysisError::invalid("r_true", r_true, "must lie in [-1, 1]"));
    }
    for (name, rel) in [("rxx", rxx), ("ryy", ryy)] {
        if !(rel.is_finite() && rel > 0.0 && rel <= 1.0) {
            return Err(AnalysisError::invalid(name, rel, "must lie in (0, 1]"));
        }
    }
    Ok(r_true * (rxx * ryy).sqrt())
}

// ── t test ──────────────────────────────────────────────────────────

/// Two-sided power of a one- or two-sample t test with `n` subjects (per group).
pub fn t_test_power(n: f64, d: f64, family: TestFamily, sig_level: f64) -> Result<f64> {
    check_open_unit("sig_level", sig_level)?;
    if !(n.is_finite() && n > 1.0) {
        return Err(AnalysisError::invalid("n", n, "must be > 1"));
    }
    if !d.is_finite() {
        return Err(AnalysisError::invalid("d", d, "must be finite"));
    }
    let k = family.samples();
    let df = (n - 1.0) * k;
    let crit = t_quantile(1.0 - sig_level / 2.0, df);
    let ncp = (n / k).sqrt() * d;
    Ok((1.0 - nct_cdf(crit, df, ncp)) + nct_cdf(-crit, df, ncp))
}

/// Smallest n (per group) reaching `power` for effect size `d`.
pub fn t_test_sample_size(
    d: f64,
    family: TestFamily,
    sig_level: f64,
    power: f64,
) -> Result<SampleSize> {
    check_open_unit("sig_level", sig_level)?;
    check_open_unit("power", power)?;
    if !(d.is_finite() && d != 0.0) {
        return Err(AnalysisError::invalid("d", d, "must be finite and non-zero"));
    }
    let (lo, hi) = T_TEST_N_BRACKET;
    let root = bisect(
        |n| t_test_power(n, d, family, sig_level).unwrap_or(f64::NAN) - power,
        lo,
        hi,
        ROOT_TOL,
    )
    .ok_or_else(|| AnalysisError::NoRoot {
        what: format!("{} t test, d = {d}", family.as_str()),
        lo,
        hi,
    })?;
    debug!(d, family = family.as_str(), n = root, "t test sample size");
    Ok(SampleSize::from_root(root))
}

// ── Correlation test ────────────────────────────────────────────────

/// Two-sided power to detect correlation `r` with `n` subjects.
pub fn r_test_power(n: f64, r: f64, sig_level: f64) -> Result<f64> {
    check_open_unit("sig_level", sig_level)?;
    if !(r.is_finite() && r.abs() < 1.0) {
        return Err(AnalysisError::invalid("r", r, "must lie in (-1, 1)"));
    }
    if !(n.is_finite() && n > 3.0) {
        return Err(AnalysisError::invalid("n", n, "must be > 3"));
    }
    let crit_t = t_quantile(1.0 - sig_level / 2.0, n - 2.0);
    let r_crit = (crit_t * crit_t / (crit_t * crit_t + n - 2.0)).sqrt();
    let z_r = r.atanh() + r / (2.0 * (n - 1.0));
    let z_crit = r_crit.atanh();
    let scale = (n - 3.0).sqrt();
    Ok(normal_cdf((z_r - z_crit) * scale) + normal_cdf((-z_r - z_crit) * scale))
}

/// Smallest n reaching `power` for correlation `r`.
pub fn r_test_sample_size(r: f64, sig_level: f64, power: f64) -> Result<SampleSize> {
    check_open_unit("sig_level", sig_level)?;
    check_open_unit("power", power)?;
    if !(r.is_finite() && r.abs() < 1.0 && r != 0.0) {
        return Err(AnalysisError::invalid("r", r, "must lie in (-1, 1) and be non-zero"));
    }
    let (lo, hi) = R_TEST_N_BRACKET;
    let root = bisect(
        |n| r_test_power(n, r, sig_level).unwrap_or(f64::NAN) - power,
        lo,
        hi,
        ROOT_TOL,
    )
    .ok_or_else(|| AnalysisError::NoRoot {
        what: format!("correlation test, r = {r}"),
        lo,
        hi,
    })?;
    debug!(r, n = root, "correlation sample size");
    Ok(SampleSize::from_root(root))
}

// ── Tables ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct EffectSizeRow {
    pub d: f64,
    pub one_sample: SampleSize,
    /// Per group.
    pub two_sample: SampleSize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationRow {
    /// rxx = ryy
    pub reliability: f64,
    pub r_true: f64,
    pub r_observed: f64,
    pub n: SampleSize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PowerTables {
    pub sig_level: f64,
    pub power: f64,
    pub effect_sizes: Vec<EffectSizeRow>,
    pub correlations: Vec<CorrelationRow>,
}

pub fn effect_size_table(grid: &[f64], sig_level: f64, power: f64) -> Result<Vec<EffectSizeRow>> {
    grid.iter()
        .map(|&d| {
            Ok(EffectSizeRow {
                d,
                one_sample: t_test_sample_size(d, TestFamily::OneSample, sig_level, power)?,
                two_sample: t_test_sample_size(d, TestFamily::TwoSample, sig_level, power)?,
            })
        })
        .collect()
}

pub fn correlation_table(
    r_true: f64,
    reliabilities: &[f64],
    sig_level: f64,
    power: f64,
) -> Result<Vec<CorrelationRow>> {
    reliabilities
        .iter()
        .map(|&rel| {
            let r_observed = spearman_brown(r_true, rel, rel)?;
            Ok(CorrelationRow {
                reliability: rel,
                r_true,
                r_observed,
                n: r_test_sample_size(r_observed, sig_level, power)?,
            })
        })
        .collect()
}

/// Both tables on the default grids.
pub fn power_tables() -> Result<PowerTables> {
    info!(
        sig_level = SIG_LEVEL,
        power = TARGET_POWER,
        "computing sample-size tables"
    );
    Ok(PowerTables {
        sig_level: SIG_LEVEL,
        power: TARGET_POWER,
        effect_sizes: effect_size_table(&EFFECT_SIZE_GRID, SIG_LEVEL, TARGET_POWER)?,
        correlations: correlation_table(
            TRUE_CORRELATION,
            &RELIABILITY_GRID,
            SIG_LEVEL,
            TARGET_POWER,
        )?,
    })
}

pub fn format_effect_size_table(rows: &[EffectSizeRow]) -> String {
    let mut out = String::from("    d  one-sample N  two-sample N (per group)\n");
    for row in rows {
        out.push_str(&format!(
            "{:>5.1}  {:>12}  {:>24}\n",
            row.d, row.one_sample.required, row.two_sample.required
        ));
    }
    out
}

pub fn format_correlation_table(rows: &[CorrelationRow]) -> String {
    let mut out = String::from("reliability  r_true  r_observed      N\n");
    for row in rows {
        out.push_str(&format!(
            "{:>11.1}  {:>6.2}  {:>10.2}  {:>5}\n",
            row.reliability, row.r_true, row.r_observed, row.n.required
        ));
    }
    out
}

pub fn save_power_tables(tables: &PowerTables, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(tables)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round2(x: f64) -> f64 {
        (x * 100.0).round() / 100.0
    }

    #[test]
    fn spearman_brown_reference_values() {
        assert_eq!(round2(spearman_brown(0.7, 1.0, 1.0).unwrap()), 0.70);
        assert_eq!(round2(spearman_brown(0.7, 0.6, 0.6).unwrap()), 0.42);
        assert_eq!(round2(spearman_brown(0.7, 0.2, 0.2).unwrap()), 0.14);
    }

    #[test]
    fn spearman_brown_rejects_bad_reliability() {
        assert!(spearman_brown(0.7, 0.0, 1.0).is_err());
        assert!(spearman_brown(0.7, 1.2, 1.0).is_err());
        assert!(spearman_brown(1.5, 1.0, 1.0).is_err());
    }

    #[test]
    fn t_test_sample_sizes_match_reference() {
        let n = |d, fam| {
            t_test_sample_size(d, fam, 0.05, 0.8)
                .unwrap()
                .required
        };
        assert_eq!(n(0.2, TestFamily::OneSample), 199);
        assert_eq!(n(0.2, TestFamily::TwoSample), 394);
        assert_eq!(n(0.5, TestFamily::TwoSample), 64);
        assert_eq!(n(0.8, TestFamily::TwoSample), 26);
        assert_eq!(n(1.0, TestFamily::OneSample), 10);
    }

    #[test]
    fn t_test_root_is_precise() {
        let s = t_test_sample_size(0.2, TestFamily::OneSample, 0.05, 0.8).unwrap();
        assert!((s.exact - 198.15).abs() < 0.01, "exact={}", s.exact);
    }

    #[test]
    fn r_test_sample_sizes_match_reference() {
        assert_eq!(r_test_sample_size(0.3, 0.05, 0.8).unwrap().required, 85);
        assert_eq!(r_test_sample_size(0.5, 0.05, 0.8).unwrap().required, 29);
    }

    #[test]
    fn power_increases_with_n() {
        let p10 = t_test_power(10.0, 0.5, TestFamily::TwoSample, 0.05).unwrap();
        let p50 = t_test_power(50.0, 0.5, TestFamily::TwoSample, 0.05).unwrap();
        assert!(p10 < p50);
        let r10 = r_test_power(10.0, 0.5, 0.05).unwrap();
        let r50 = r_test_power(50.0, 0.5, 0.05).unwrap();
        assert!(r10 < r50);
    }

    #[test]
    fn invalid_parameters_fail_fast() {
        assert!(matches!(
            t_test_sample_size(0.5, TestFamily::OneSample, 0.05, 1.0),
            Err(AnalysisError::InvalidParameter { name: "power", .. })
        ));
        assert!(matches!(
            r_test_sample_size(1.0, 0.05, 0.8),
            Err(AnalysisError::InvalidParameter { name: "r", .. })
        ));
        assert!(matches!(
            r_test_sample_size(0.3, 0.0, 0.8),
            Err(AnalysisError::InvalidParameter { name: "sig_level", .. })
        ));
    }

    #[test]
    fn correlation_table_grows_as_reliability_drops() {
        let rows = correlation_table(0.7, &[1.0, 0.6, 0.2], 0.05, 0.8).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].n.required, 13);
        assert!(rows[0].n.required < rows[1].n.required);
        assert!(rows[1].n.required < rows[2].n.required);
        assert_eq!(rows[2].n.required, 398);
    }
}
