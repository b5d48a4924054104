//! The 2×2 attenuation figure.
//!
//! One facet per panel (A–D). Each facet overlays kernel density curves of
//! the true and observed scores for both true means, with a zero reference
//! line and the condition's theoretical `d` and `r` printed beside the
//! observed curve.

use std::error::Error;
use std::path::Path;

use plotters::prelude::*;
use tracing::info;

use crate::constants::figure_pixels;
use crate::distributions::normal_pdf;
use crate::error::{AnalysisError, Result};
use crate::simulation::statistics::sample_sd;
use crate::types::{ConditionSummary, LongRecord, Panel, ScoreType};

const GRID_POINTS: usize = 256;

// ── Kernel density ──────────────────────────────────────────────────

/// Type-7 sample quantile of sorted data.
fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = (lo + 1).min(sorted.len() - 1);
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

/// Silverman's rule of thumb, 0.9 · min(sd, IQR/1.34) · n^(-1/5).
///
/// Falls back to the sd, then |x₀|, then 1 when the spread is zero.
pub fn silverman_bandwidth(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 1.0;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);
    let sd = sample_sd(xs).unwrap_or(0.0);
    let iqr = quantile_sorted(&sorted, 0.75) - quantile_sorted(&sorted, 0.25);
    let mut lo = sd.min(iqr / 1.34);
    if lo <= 0.0 {
        lo = if sd > 0.0 {
            sd
        } else if xs[0] != 0.0 {
            xs[0].abs()
        } else {
            1.0
        };
    }
    0.9 * lo * (xs.len() as f64).powf(-0.2)
}

/// Gaussian KDE of `xs` evaluated at each grid point.
pub fn gaussian_kde(xs: &[f64], bandwidth: f64, grid: &[f64]) -> Vec<(f64, f64)> {
    let scale = 1.0 / (xs.len() as f64 * bandwidth);
    grid.iter()
        .map(|&g| {
            let dens: f64 = xs.iter().map(|&x| normal_pdf((g - x) / bandwidth)).sum();
            (g, dens * scale)
        })
        .collect()
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    let step = (hi - lo) / (n - 1) as f64;
    (0..n).map(|i| lo + step * i as f64).collect()
}

// ── Layout ──────────────────────────────────────────────────────────

/// One density curve of one facet.
#[derive(Debug, Clone)]
pub struct DensityCurve {
    pub panel: Panel,
    pub score_type: ScoreType,
    pub true_mean: f64,
    pub points: Vec<(f64, f64)>,
}

/// Density curves for every (panel, score type, true mean) present in `records`.
pub fn density_curves(records: &[LongRecord]) -> Vec<DensityCurve> {
    let (x_lo, x_hi) = x_range(records);
    let grid = linspace(x_lo, x_hi, GRID_POINTS);
    let mut curves = Vec::new();
    for panel in Panel::ALL {
        for score_type in [ScoreType::True, ScoreType::Observed] {
            let mut means: Vec<f64> = records
                .iter()
                .filter(|r| r.panel == panel)
                .map(|r| r.true_mean)
                .collect();
            means.sort_by(f64::total_cmp);
            means.dedup();
            for true_mean in means {
                let xs: Vec<f64> = records
                    .iter()
                    .filter(|r| {
                        r.panel == panel && r.score_type == score_type && r.true_mean == true_mean
                    })
                    .map(|r| r.score)
                    .collect();
                if xs.len() < 2 {
                    continue;
                }
                let bw = silverman_bandwidth(&xs);
                curves.push(DensityCurve {
                    panel,
                    score_type,
                    true_mean,
                    points: gaussian_kde(&xs, bw, &grid),
                });
            }
        }
    }
    curves
}

fn x_range(records: &[LongRecord]) -> (f64, f64) {
    let (lo, hi) = records
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
            (lo.min(r.score), hi.max(r.score))
        });
    if lo.is_finite() && hi.is_finite() && hi > lo {
        let pad = 0.15 * (hi - lo);
        (lo - pad, hi + pad)
    } else {
        (-3.0, 3.0)
    }
}

/// "d = x.xx, r = x.xx"
pub fn annotation(summary: &ConditionSummary) -> String {
    format!("d = {:.2}, r = {:.2}", summary.d, summary.r)
}

fn facet_caption(panel: Panel, summaries: &[ConditionSummary]) -> String {
    match summaries.iter().find(|s| s.panel == panel) {
        Some(s) => format!(
            "{}: {} true variability, {} error",
            panel,
            s.true_variability.as_str(),
            s.error_label.as_str()
        ),
        None => panel.to_string(),
    }
}

fn mean_color(true_mean: f64, means: &[f64]) -> RGBColor {
    const PALETTE: [RGBColor; 4] = [
        RGBColor(0, 114, 178),
        RGBColor(213, 94, 0),
        RGBColor(0, 158, 115),
        RGBColor(204, 121, 167),
    ];
    let idx = means.iter().position(|&m| m == true_mean).unwrap_or(0);
    PALETTE[idx % PALETTE.len()]
}

// ── Rendering ───────────────────────────────────────────────────────

fn draw(
    records: &[LongRecord],
    summaries: &[ConditionSummary],
    path: &Path,
) -> std::result::Result<(), Box<dyn Error>> {
    let curves = density_curves(records);
    let (x_lo, x_hi) = x_range(records);
    let y_hi = curves
        .iter()
        .flat_map(|c| c.points.iter().map(|&(_, y)| y))
        .fold(0.0f64, f64::max)
        .max(1e-6)
        * 1.15;
    let mut means: Vec<f64> = curves.iter().map(|c| c.true_mean).collect();
    means.sort_by(f64::total_cmp);
    means.dedup();

    let root = BitMapBackend::new(path, figure_pixels()).into_drawing_area();
    root.fill(&WHITE)?;
    let facets = root.split_evenly((2, 2));

    for panel in Panel::ALL {
        let (row, col) = panel.grid_position();
        let area = &facets[row * 2 + col];
        let mut chart = ChartBuilder::on(area)
            .caption(facet_caption(panel, summaries), ("sans-serif", 40))
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(x_lo..x_hi, 0.0..y_hi)?;

        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("score")
            .y_desc("density")
            .label_style(("sans-serif", 24))
            .axis_desc_style(("sans-serif", 28))
            .draw()?;

        chart.draw_series(std::iter::once(PathElement::new(
            vec![(0.0, 0.0), (0.0, y_hi)],
            BLACK.mix(0.4).stroke_width(2),
        )))?;

        for c in curves.iter().filter(|c| c.panel == panel) {
            let color = mean_color(c.true_mean, &means);
            let style = match c.score_type {
                ScoreType::True => color.mix(0.35).stroke_width(3),
                ScoreType::Observed => color.stroke_width(4),
            };
            let label = format!("mean {} ({})", c.true_mean, c.score_type.as_str());
            chart
                .draw_series(LineSeries::new(c.points.iter().copied(), style))?
                .label(label)
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 30, y)], style));
        }

        // One annotation line per observed condition, top left.
        let observed = summaries
            .iter()
            .filter(|s| s.panel == panel && s.score_type == ScoreType::Observed);
        for (i, s) in observed.enumerate() {
            let color = mean_color(s.true_mean, &means);
            let y = y_hi * (0.92 - 0.08 * i as f64);
            let x = x_lo + 0.03 * (x_hi - x_lo);
            chart.draw_series(std::iter::once(Text::new(
                annotation(s),
                (x, y),
                ("sans-serif", 28).into_font().color(&color),
            )))?;
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .label_font(("sans-serif", 22))
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK.mix(0.3))
            .draw()?;
    }

    root.present()?;
    Ok(())
}

/// Render the figure to a PNG at `path`.
pub fn render_figure(
    records: &[LongRecord],
    summaries: &[ConditionSummary],
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    draw(records, summaries, path).map_err(|e| AnalysisError::Plot(e.to_string()))?;
    info!(path = %path.display(), "figure written");
    Ok(())
}
