//! Special functions and distribution functions used by the power and ICC
//! routines.
//!
//! - [`ln_gamma`]: Lanczos approximation (g = 7, 9 terms)
//! - [`beta_reg`]: regularized incomplete beta, Lentz continued fraction
//! - [`normal_cdf`] / [`normal_quantile`]: via the incomplete gamma function;
//!   quantile is Acklam's rational approximation plus one Halley step
//! - [`t_cdf`] / [`t_quantile`]: central Student t
//! - [`nct_cdf`]: noncentral t, Lenth's AS 243 twin series
//! - [`f_cdf`] / [`f_sf`] / [`f_quantile`]: Fisher F
//! - [`bisect`]: root of a continuous function on a sign-changing bracket
//!
//! Accuracy is ~1e-12 or better over the parameter ranges used here.

use std::f64::consts::{PI, SQRT_2};

const LANCZOS_G: f64 = 7.0;
const LANCZOS_COEF: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

const CF_MAX_ITER: usize = 20_000;
const CF_EPS: f64 = 1e-15;
const FPMIN: f64 = 1e-300;

/// ln Γ(x) for x > 0.
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        // reflection
        return (PI / (PI * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut a = LANCZOS_COEF[0];
    let t = x + LANCZOS_G + 0.5;
    for (i, &c) in LANCZOS_COEF.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

// ── Incomplete gamma (for erf) ──────────────────────────────────────

fn gamma_p_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut sum = 1.0 / a;
    let mut del = sum;
    for _ in 0..CF_MAX_ITER {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * CF_EPS {
            break;
        }
    }
    sum * (-x + a * x.ln() - ln_gamma(a)).exp()
}

fn gamma_q_cont_frac(a: f64, x: f64) -> f64 {
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..CF_MAX_ITER {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = b + an / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < CF_EPS {
            break;
        }
    }
    (-x + a * x.ln() - ln_gamma(a)).exp() * h
}

/// Regularized lower incomplete gamma P(a, x).
pub fn gamma_p(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        0.0
    } else if x < a + 1.0 {
        gamma_p_series(a, x)
    } else {
        1.0 - gamma_q_cont_frac(a, x)
    }
}

/// Regularized upper incomplete gamma Q(a, x).
pub fn gamma_q(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        1.0
    } else if x < a + 1.0 {
        1.0 - gamma_p_series(a, x)
    } else {
        gamma_q_cont_frac(a, x)
    }
}

/// Complementary error function.
pub fn erfc(x: f64) -> f64 {
    if x >= 0.0 {
        gamma_q(0.5, x * x)
    } else {
        1.0 + gamma_p(0.5, x * x)
    }
}

// ── Normal ──────────────────────────────────────────────────────────

pub fn normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

pub fn normal_pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() / (2.0 * PI).sqrt()
}

/// Inverse standard normal CDF.
pub fn normal_quantile(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];

    let p_low = 0.02425;
    let p_high = 1.0 - p_low;

    let x = if p < p_low {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= p_high {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    };

    // Halley refinement
    let e = normal_cdf(x) - p;
    let u = e * (2.0 * PI).sqrt() * (x * x / 2.0).exp();
    x - u / (1.0 + x * u / 2.0)
}

// ── Incomplete beta ─────────────────────────────────────────────────

fn beta_cont_frac(a: f64, b: f64, x: f64) -> f64 {
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;
    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < FPMIN {
        d = FPMIN;
    }
    d = 1.0 / d;
    let mut h = d;
    for m in 1..CF_MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;
        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        h *= d * c;
        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = 1.0 + aa / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < CF_EPS {
            break;
        }
    }
    h
}

/// Regularized incomplete beta I_x(a, b).
pub fn beta_reg(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    if x < (a + 1.0) / (a + b + 2.0) {
        ln_front.exp() * beta_cont_frac(a, b, x) / a
    } else {
        1.0 - ln_front.exp() * beta_cont_frac(b, a, 1.0 - x) / b
    }
}

// ── Student t ───────────────────────────────────────────────────────

/// P(T ≤ t) for a central t with `df` degrees of freedom (df may be fractional).
pub fn t_cdf(t: f64, df: f64) -> f64 {
    if t.is_infinite() {
        return if t > 0.0 { 1.0 } else { 0.0 };
    }
    let x = df / (df + t * t);
    let tail = 0.5 * beta_reg(0.5 * df, 0.5, x);
    if t > 0.0 {
        1.0 - tail
    } else {
        tail
    }
}

/// Inverse of [`t_cdf`].
pub fn t_quantile(p: f64, df: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if p < 0.5 {
        return -t_quantile(1.0 - p, df);
    }
    if p == 0.5 {
        return 0.0;
    }
    let hi = expand_upper(|t| t_cdf(t, df), p, 1.0);
    if hi.is_infinite() {
        return hi;
    }
    bisect(|t| t_cdf(t, df) - p, 0.0, hi, 1e-13).unwrap_or(hi)
}

/// P(T ≤ t) for a noncentral t with `df` degrees of freedom and
/// noncentrality `ncp` (AS 243; normal approximation for df > 4e5).
pub fn nct_cdf(t: f64, df: f64, ncp: f64) -> f64 {
    const ITR_MAX: usize = 1000;
    const ERR_MAX: f64 = 1e-12;

    if t.is_infinite() {
        return if t > 0.0 { 1.0 } else { 0.0 };
    }

    let (tt, del, negdel) = if t >= 0.0 {
        (t, ncp, false)
    } else {
        if ncp > 40.0 {
            return 0.0;
        }
        (-t, -ncp, true)
    };

    if df > 4e5 || del * del > 2.0 * std::f64::consts::LN_2 * 1021.0 {
        // Abramowitz & Stegun 26.7.10
        let s = 1.0 / (4.0 * df);
        let z = (tt * (1.0 - s) - del) / (1.0 + tt * tt * 2.0 * s).sqrt();
        let lower = normal_cdf(z);
        return if negdel { 1.0 - lower } else { lower };
    }

    let x = 1.0 / (1.0 + df / (tt * tt));
    let mut tnc = 0.0;
    if x > 0.0 {
        let lambda = del * del;
        let mut p = 0.5 * (-0.5 * lambda).exp();
        if p == 0.0 {
            return if negdel { 1.0 } else { 0.0 };
        }
        let mut q = (2.0 / PI).sqrt() * p * del;
        let mut s = 0.5 - p;
        if s < 1e-7 {
            s = -0.5 * (-0.5 * lambda).exp_m1();
        }
        let mut a = 0.5;
        let b = 0.5 * df;
        let rxb = (1.0 - x).powf(b);
        let albeta = 0.5 * PI.ln() + ln_gamma(b) - ln_gamma(0.5 + b);
        let mut xodd = beta_reg(a, b, x);
        let mut godd = 2.0 * rxb * (a * x.ln() - albeta).exp();
        let bx = b * x;
        let mut xeven = if bx < f64::EPSILON { bx } else { 1.0 - rxb };
        let mut geven = bx * rxb;
        tnc = p * xodd + q * xeven;

        for it in 1..=ITR_MAX {
            a += 1.0;
            xodd -= godd;
            xeven -= geven;
            godd *= x * (a + b - 1.0) / a;
            geven *= x * (a + b - 0.5) / (a + 0.5);
            p *= lambda / (2 * it) as f64;
            q *= lambda / (2 * it + 1) as f64;
            tnc += p * xodd + q * xeven;
            s -= p;
            if s < -1e-10 {
                tracing::warn!(t, df, ncp, "noncentral t series lost precision");
                break;
            }
            if s <= 0.0 && it > 1 {
                break;
            }
            let errbd = 2.0 * s * (xodd - godd);
            if errbd.abs() < ERR_MAX {
                break;
            }
        }
    }

    tnc += normal_cdf(-del);
    let tnc = tnc.min(1.0);
    if negdel {
        1.0 - tnc
    } else {
        tnc
    }
}

// ── Fisher F ────────────────────────────────────────────────────────

/// P(F ≤ x) with (d1, d2) degrees of freedom.
pub fn f_cdf(x: f64, d1: f64, d2: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x.is_infinite() {
        return 1.0;
    }
    beta_reg(0.5 * d1, 0.5 * d2, d1 * x / (d1 * x + d2))
}

/// Upper tail P(F > x), computed without cancellation.
pub fn f_sf(x: f64, d1: f64, d2: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if x.is_infinite() {
        return 0.0;
    }
    beta_reg(0.5 * d2, 0.5 * d1, d2 / (d2 + d1 * x))
}

/// Inverse of [`f_cdf`].
pub fn f_quantile(p: f64, d1: f64, d2: f64) -> f64 {
    if p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    let hi = expand_upper(|x| f_cdf(x, d1, d2), p, 1.0);
    if hi.is_infinite() {
        return hi;
    }
    bisect(|x| f_cdf(x, d1, d2) - p, 0.0, hi, 1e-13).unwrap_or(hi)
}

// ── Root finding ────────────────────────────────────────────────────

/// Double `start` until the monotone increasing `cdf` reaches `p`.
fn expand_upper(cdf: impl Fn(f64) -> f64, p: f64, start: f64) -> f64 {
    let mut hi = start;
    for _ in 0..1100 {
        if cdf(hi) >= p {
            break;
        }
        hi *= 2.0;
    }
    hi
}

/// Root of `f` on `[lo, hi]` by bisection. `None` unless `f(lo)` and `f(hi)`
/// differ in sign (a zero at either end is returned directly).
pub fn bisect(f: impl Fn(f64) -> f64, lo: f64, hi: f64, tol: f64) -> Option<f64> {
    let (mut lo, mut hi) = (lo, hi);
    let mut f_lo = f(lo);
    let f_hi = f(hi);
    if f_lo == 0.0 {
        return Some(lo);
    }
    if f_hi == 0.0 {
        return Some(hi);
    }
    if !(f_lo.is_finite() && f_hi.is_finite()) || f_lo.signum() == f_hi.signum() {
        return None;
    }
    for _ in 0..400 {
        let mid = 0.5 * (lo + hi);
        let f_mid = f(mid);
        if f_mid == 0.0 {
            return Some(mid);
        }
        if f_mid.signum() == f_lo.signum() {
            lo = mid;
            f_lo = f_mid;
        } else {
            hi = mid;
        }
        if (hi - lo).abs() <= tol * (1.0 + mid.abs()) {
            break;
        }
    }
    Some(0.5 * (lo + hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn ln_gamma_known_values() {
        assert!(close(ln_gamma(1.0), 0.0, 1e-13));
        assert!(close(ln_gamma(5.0), 24f64.ln(), 1e-12));
        assert!(close(ln_gamma(0.5), PI.sqrt().ln(), 1e-12));
    }

    #[test]
    fn normal_reference_points() {
        assert!(close(normal_cdf(0.0), 0.5, 1e-15));
        assert!(close(normal_cdf(1.959963984540054), 0.975, 1e-12));
        assert!(close(normal_cdf(-1.0), 0.15865525393145707, 1e-12));
        assert!(close(normal_quantile(0.975), 1.959963984540054, 1e-10));
        assert!(close(normal_quantile(0.01), -2.3263478740408408, 1e-10));
    }

    #[test]
    fn beta_reg_symmetry() {
        for &(a, b, x) in &[(2.0, 3.0, 0.4), (0.5, 7.5, 0.9), (10.0, 1.5, 0.2)] {
            let lhs = beta_reg(a, b, x);
            let rhs = 1.0 - beta_reg(b, a, 1.0 - x);
            assert!(close(lhs, rhs, 1e-12), "a={a} b={b} x={x}");
        }
        // I_x(1, 1) = x
        assert!(close(beta_reg(1.0, 1.0, 0.3), 0.3, 1e-14));
    }

    #[test]
    fn t_reference_points() {
        // qt(0.975, 10) = 2.228139
        assert!(close(t_quantile(0.975, 10.0), 2.2281388519649385, 1e-9));
        assert!(close(t_cdf(2.2281388519649385, 10.0), 0.975, 1e-12));
        // df = 1 is Cauchy
        assert!(close(t_cdf(1.0, 1.0), 0.75, 1e-12));
        assert!(close(t_quantile(0.025, 30.0), -2.0422724563012373, 1e-9));
    }

    #[test]
    fn nct_reduces_to_central_at_zero_ncp() {
        for &t in &[-2.5, -0.3, 0.0, 0.7, 3.1] {
            assert!(close(nct_cdf(t, 12.0, 0.0), t_cdf(t, 12.0), 1e-10), "t={t}");
        }
    }

    #[test]
    fn nct_reference_point() {
        // pt(2, 10, ncp = 1)
        let p = nct_cdf(2.0, 10.0, 1.0);
        assert!(close(p, 0.807_611_56, 1e-7), "p={p}");
        // left tail takes the reflected branch
        assert!(close(nct_cdf(-1.0, 7.0, 0.5), 0.078_102_20, 1e-7));
        // monotone in ncp
        assert!(nct_cdf(2.0, 10.0, 2.0) < p);
    }

    #[test]
    fn f_reference_points() {
        // qf(0.95, 3, 20) = 3.098391
        let q = f_quantile(0.95, 3.0, 20.0);
        assert!(close(q, 3.098391, 1e-5), "q={q}");
        assert!(close(f_cdf(q, 3.0, 20.0) + f_sf(q, 3.0, 20.0), 1.0, 1e-12));
    }

    #[test]
    fn bisect_requires_sign_change() {
        assert!(bisect(|x| x * x + 1.0, -1.0, 1.0, 1e-12).is_none());
        let root = bisect(|x| x * x - 2.0, 0.0, 2.0, 1e-14).unwrap();
        assert!(close(root, 2f64.sqrt(), 1e-12));
    }
}
