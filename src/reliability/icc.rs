//! Shrout–Fleiss intraclass correlations.
//!
//! All six forms come from one two-way ANOVA on a complete subjects × items
//! matrix. Subjects play the role of targets and items the role of judges.
//!
//! | Form  | Model                       | Unit    |
//! |-------|-----------------------------|---------|
//! | ICC1  | one-way random              | single  |
//! | ICC2  | two-way random, absolute    | single  |
//! | ICC3  | two-way mixed, consistency  | single  |
//! | ICC1k | one-way random              | average |
//! | ICC2k | two-way random, absolute    | average |
//! | ICC3k | two-way mixed, consistency  | average |
//!
//! ICC3k equals Cronbach's alpha on the same matrix.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::distributions::{f_quantile, f_sf};
use crate::error::{AnalysisError, Result};
use crate::simulation::statistics::sample_variance;

use super::matrix::CompleteMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IccKind {
    #[serde(rename = "ICC1")]
    Icc1,
    #[serde(rename = "ICC2")]
    Icc2,
    #[serde(rename = "ICC3")]
    Icc3,
    #[serde(rename = "ICC1k")]
    Icc1k,
    #[serde(rename = "ICC2k")]
    Icc2k,
    #[serde(rename = "ICC3k")]
    Icc3k,
}

impl IccKind {
    pub const ALL: [IccKind; 6] = [
        IccKind::Icc1,
        IccKind::Icc2,
        IccKind::Icc3,
        IccKind::Icc1k,
        IccKind::Icc2k,
        IccKind::Icc3k,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            IccKind::Icc1 => "ICC1",
            IccKind::Icc2 => "ICC2",
            IccKind::Icc3 => "ICC3",
            IccKind::Icc1k => "ICC1k",
            IccKind::Icc2k => "ICC2k",
            IccKind::Icc3k => "ICC3k",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            IccKind::Icc1 => "Single raters, absolute",
            IccKind::Icc2 => "Single random raters",
            IccKind::Icc3 => "Single fixed raters",
            IccKind::Icc1k => "Average raters, absolute",
            IccKind::Icc2k => "Average random raters",
            IccKind::Icc3k => "Average fixed raters",
        }
    }
}

/// Mean squares of the two-way (subjects × items) layout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnovaTable {
    pub n_subjects: usize,
    pub n_items: usize,
    /// Between subjects.
    pub ms_rows: f64,
    /// Between items.
    pub ms_cols: f64,
    /// Residual.
    pub ms_error: f64,
    /// Within subjects (items + residual).
    pub ms_within: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IccEstimate {
    pub kind: IccKind,
    pub value: f64,
    pub f: f64,
    pub df1: f64,
    pub df2: f64,
    pub p_value: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IccReport {
    pub n_subjects: usize,
    pub n_items: usize,
    pub excluded_subjects: usize,
    pub confidence: f64,
    pub anova: AnovaTable,
    pub estimates: Vec<IccEstimate>,
    pub cronbach_alpha: f64,
}

impl IccReport {
    pub fn get(&self, kind: IccKind) -> Option<&IccEstimate> {
        self.estimates.iter().find(|e| e.kind == kind)
    }
}

fn check_shape(m: &CompleteMatrix) -> Result<()> {
    if m.n_subjects() < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "{} complete subject(s); need at least 2",
            m.n_subjects()
        )));
    }
    if m.n_items() < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "{} item(s); need at least 2",
            m.n_items()
        )));
    }
    Ok(())
}

pub fn two_way_anova(m: &CompleteMatrix) -> Result<AnovaTable> {
    check_shape(m)?;
    let n = m.n_subjects();
    let k = m.n_items();
    let (nf, kf) = (n as f64, k as f64);

    let grand = m.rows.iter().flatten().sum::<f64>() / (nf * kf);
    let row_means = m.rows.iter().map(|r| r.iter().sum::<f64>() / kf);
    let col_means = (0..k).map(|j| m.rows.iter().map(|r| r[j]).sum::<f64>() / nf);

    let ss_rows = kf * row_means.map(|x| (x - grand).powi(2)).sum::<f64>();
    let ss_cols = nf * col_means.map(|x| (x - grand).powi(2)).sum::<f64>();
    let ss_total: f64 = m.rows.iter().flatten().map(|x| (x - grand).powi(2)).sum();
    let ss_error = ss_total - ss_rows - ss_cols;
    let ss_within = ss_total - ss_rows;

    Ok(AnovaTable {
        n_subjects: n,
        n_items: k,
        ms_rows: ss_rows / (nf - 1.0),
        ms_cols: ss_cols / (kf - 1.0),
        ms_error: ss_error / ((nf - 1.0) * (kf - 1.0)),
        ms_within: ss_within / (nf * (kf - 1.0)),
    })
}

/// Cronbach's alpha from item variances and the variance of subject totals.
pub fn cronbach_alpha(m: &CompleteMatrix) -> Result<f64> {
    check_shape(m)?;
    let kf = m.n_items() as f64;
    let mut item_var_sum = 0.0;
    for j in 0..m.n_items() {
        let col: Vec<f64> = m.rows.iter().map(|r| r[j]).collect();
        item_var_sum += sample_variance(&col).unwrap_or(0.0);
    }
    let totals: Vec<f64> = m.rows.iter().map(|r| r.iter().sum()).collect();
    let total_var = sample_variance(&totals).unwrap_or(0.0);
    if total_var <= 0.0 {
        return Err(AnalysisError::InsufficientData(
            "subject totals have zero variance".to_string(),
        ));
    }
    Ok(kf / (kf - 1.0) * (1.0 - item_var_sum / total_var))
}

/// Residual mean squares at or below this fraction of the within-subject
/// mean square count as zero.
const RESIDUAL_TOLERANCE: f64 = 1e-12;

/// Bounds for a single-rater form from the F-based interval `[fl, fu]`.
fn single_bounds(fl: f64, fu: f64, k: f64) -> (f64, f64) {
    ((fl - 1.0) / (fl + k - 1.0), (fu - 1.0) / (fu + k - 1.0))
}

fn average_bounds(fl: f64, fu: f64) -> (f64, f64) {
    (1.0 - 1.0 / fl, 1.0 - 1.0 / fu)
}

/// Step a single-rater bound up to the average of `k` raters.
fn spearman_brown_step(x: f64, k: f64) -> f64 {
    x * k / (1.0 + x * (k - 1.0))
}

/// All six ICC forms with F tests and two-sided `confidence` intervals.
pub fn icc(m: &CompleteMatrix, confidence: f64) -> Result<IccReport> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(AnalysisError::invalid("confidence", confidence, "must lie in (0, 1)"));
    }
    let a = two_way_anova(m)?;
    if a.ms_within <= 0.0 {
        return Err(AnalysisError::InsufficientData(
            "no within-subject variation".to_string(),
        ));
    }
    // Items that differ only by a constant offset leave no residual: the
    // consistency forms are exactly 1.
    let no_residual = a.ms_error <= RESIDUAL_TOLERANCE * a.ms_within;
    if no_residual && a.ms_rows <= 0.0 {
        return Err(AnalysisError::InsufficientData(
            "no between-subject or residual variation".to_string(),
        ));
    }
    let n = a.n_subjects as f64;
    let k = a.n_items as f64;
    let mse = if no_residual { 0.0 } else { a.ms_error };
    let (msb, msj, msw) = (a.ms_rows, a.ms_cols, a.ms_within);
    let q = 1.0 - (1.0 - confidence) / 2.0;

    let icc1 = (msb - msw) / (msb + (k - 1.0) * msw);
    let icc2 = (msb - mse) / (msb + (k - 1.0) * mse + k * (msj - mse) / n);
    let icc3 = (msb - mse) / (msb + (k - 1.0) * mse);
    let icc1k = (msb - msw) / msb;
    let icc2k = (msb - mse) / (msb + (msj - mse) / n);
    let icc3k = (msb - mse) / msb;

    // One-way F test.
    let f1 = msb / msw;
    let (df1_1, df2_1) = (n - 1.0, n * (k - 1.0));
    let p1 = f_sf(f1, df1_1, df2_1);
    let f1_lo = f1 / f_quantile(q, df1_1, df2_1);
    let f1_hi = f1 * f_quantile(q, df2_1, df1_1);

    // Two-way F test, shared by ICC2 and ICC3. Infinite without residual.
    let f3 = if no_residual { f64::INFINITY } else { msb / mse };
    let (df1_3, df2_3) = (n - 1.0, (n - 1.0) * (k - 1.0));
    let p3 = f_sf(f3, df1_3, df2_3);
    let f3_lo = f3 / f_quantile(q, df1_3, df2_3);
    let f3_hi = f3 * f_quantile(q, df2_3, df1_3);

    // ICC2 uses Satterthwaite-style degrees of freedom for the item effect.
    // As mse -> 0 they tend to k - 1.
    let v = if no_residual {
        k - 1.0
    } else {
        let fj = msj / mse;
        let base = n * (1.0 + (k - 1.0) * icc2) - k * icc2;
        let vn = (k - 1.0) * (n - 1.0) * (k * icc2 * fj + base).powi(2);
        let vd = (n - 1.0) * k * k * icc2 * icc2 * fj * fj + base * base;
        vn / vd
    };
    let fu = f_quantile(q, n - 1.0, v);
    let fl = f_quantile(q, v, n - 1.0);
    let denom = k * msj + (k * n - k - n) * mse;
    let l2 = n * (msb - fu * mse) / (fu * denom + n * msb);
    let u2 = n * (fl * msb - mse) / (denom + n * fl * msb);

    let (l1, u1) = single_bounds(f1_lo, f1_hi, k);
    let (l1k, u1k) = average_bounds(f1_lo, f1_hi);
    let ((l3, u3), (l3k, u3k)) = if no_residual {
        ((1.0, 1.0), (1.0, 1.0))
    } else {
        (
            single_bounds(f3_lo, f3_hi, k),
            average_bounds(f3_lo, f3_hi),
        )
    };

    let est = |kind, value, f, df1, df2, p_value, lower, upper| IccEstimate {
        kind,
        value,
        f,
        df1,
        df2,
        p_value,
        lower,
        upper,
    };
    let estimates = vec![
        est(IccKind::Icc1, icc1, f1, df1_1, df2_1, p1, l1, u1),
        est(IccKind::Icc2, icc2, f3, df1_3, df2_3, p3, l2, u2),
        est(IccKind::Icc3, icc3, f3, df1_3, df2_3, p3, l3, u3),
        est(IccKind::Icc1k, icc1k, f1, df1_1, df2_1, p1, l1k, u1k),
        est(
            IccKind::Icc2k,
            icc2k,
            f3,
            df1_3,
            df2_3,
            p3,
            spearman_brown_step(l2, k),
            spearman_brown_step(u2, k),
        ),
        est(IccKind::Icc3k, icc3k, f3, df1_3, df2_3, p3, l3k, u3k),
    ];

    let report = IccReport {
        n_subjects: a.n_subjects,
        n_items: a.n_items,
        excluded_subjects: m.excluded,
        confidence,
        anova: a,
        estimates,
        cronbach_alpha: cronbach_alpha(m)?,
    };
    info!(
        subjects = report.n_subjects,
        items = report.n_items,
        icc2k = icc2k,
        "reliability estimated"
    );
    Ok(report)
}

/// Form quoted in the write-up: average of k random items.
pub const HEADLINE_KIND: IccKind = IccKind::Icc2k;

/// One manuscript-style sentence summarizing the headline estimate.
pub fn write_up(report: &IccReport) -> String {
    let pct = (report.confidence * 100.0).round();
    match report.get(HEADLINE_KIND) {
        Some(e) => format!(
            "Across {} items and {} infants, reliability was {} = {:.2}, {pct}% CI [{:.2}, {:.2}] (Cronbach's alpha = {:.2}).",
            report.n_items,
            report.n_subjects,
            e.kind.as_str(),
            e.value,
            e.lower,
            e.upper,
            report.cronbach_alpha,
        ),
        None => format!(
            "Across {} items and {} infants, Cronbach's alpha was {:.2}.",
            report.n_items, report.n_subjects, report.cronbach_alpha
        ),
    }
}

pub fn format_icc_table(report: &IccReport) -> String {
    let mut out = String::from(
        "type   description                 ICC       F  df1    df2        p  lower  upper\n",
    );
    for e in &report.estimates {
        out.push_str(&format!(
            "{:<5}  {:<26}  {:>5.2}  {:>6.2}  {:>3}  {:>5}  {:>7.4}  {:>5.2}  {:>5.2}\n",
            e.kind.as_str(),
            e.kind.description(),
            e.value,
            e.f,
            e.df1,
            e.df2.round(),
            e.p_value,
            e.lower,
            e.upper,
        ));
    }
    out.push_str(&format!(
        "subjects = {}  items = {}  excluded = {}  alpha = {:.3}\n",
        report.n_subjects, report.n_items, report.excluded_subjects, report.cronbach_alpha
    ));
    out
}

pub fn save_report(report: &IccReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}
