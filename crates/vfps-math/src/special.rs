//! Airy functions Ai, Bi and derivatives for non-negative argument.
//!
//! Needed by the shielded (parallel-plates) CSR impedance, whose mode
//! sum evaluates Airy products at u² ≥ 0. Small arguments use the
//! Maclaurin series; large arguments the asymptotic expansions, kept
//! in exponentially scaled form so products like Ai·Bi stay finite
//! when the separate factors would over- or underflow.

/// Ai(0) = 3^(−2/3)/Γ(2/3)
const AIRY_C1: f64 = 0.355028053887817239;
/// −Ai'(0) = 3^(−1/3)/Γ(1/3)
const AIRY_C2: f64 = 0.258819403792806799;

const SQRT_3: f64 = 1.732050807568877294;
const SERIES_CUTOFF: f64 = 5.0;

/// Airy values with the exponential behavior split off:
/// `Ai(x) = ai·e^(−ζ)`, `Bi(x) = bi·e^(ζ)` (same for the
/// derivatives), with `ζ = (2/3)·x^(3/2)`.
#[derive(Debug, Clone, Copy)]
pub struct AiryScaled {
    pub ai: f64,
    pub aip: f64,
    pub bi: f64,
    pub bip: f64,
    pub zeta: f64,
}

impl AiryScaled {
    /// Unscaled Ai(x). Underflows gracefully for large x.
    pub fn ai_value(&self) -> f64 {
        self.ai * (-self.zeta).exp()
    }

    /// Unscaled Bi(x). Overflows for large x; prefer products of
    /// scaled values there.
    pub fn bi_value(&self) -> f64 {
        self.bi * self.zeta.exp()
    }

    pub fn aip_value(&self) -> f64 {
        self.aip * (-self.zeta).exp()
    }

    pub fn bip_value(&self) -> f64 {
        self.bip * self.zeta.exp()
    }
}

/// Evaluate Ai, Bi, Ai', Bi' at `x ≥ 0` in scaled form.
pub fn airy_scaled(x: f64) -> AiryScaled {
    debug_assert!(x >= 0.0, "airy_scaled domain is x >= 0");
    let zeta = 2.0 / 3.0 * x * x.sqrt();
    if x < SERIES_CUTOFF {
        let (ai, aip, bi, bip) = airy_series(x);
        // e^(±ζ) is at most e^(7.5) here, safe to rescale.
        AiryScaled {
            ai: ai * zeta.exp(),
            aip: aip * zeta.exp(),
            bi: bi * (-zeta).exp(),
            bip: bip * (-zeta).exp(),
            zeta,
        }
    } else {
        airy_asymptotic(x, zeta)
    }
}

/// Maclaurin series, accurate for moderate |x|.
fn airy_series(x: f64) -> (f64, f64, f64, f64) {
    if x == 0.0 {
        return (AIRY_C1, -AIRY_C2, SQRT_3 * AIRY_C1, SQRT_3 * AIRY_C2);
    }
    let x3 = x * x * x;

    // f = Σ 3^k (1/3)_k x^(3k) / (3k)!   g = Σ 3^k (2/3)_k x^(3k+1) / (3k+1)!
    let mut term_f = 1.0;
    let mut term_g = x;
    let mut f = term_f;
    let mut g = term_g;
    let mut fp = 0.0;
    let mut gp = 1.0;

    for k in 1..=60u32 {
        let k3 = 3.0 * k as f64;
        term_f *= x3 / (k3 * (k3 - 1.0));
        term_g *= x3 / ((k3 + 1.0) * k3);
        f += term_f;
        g += term_g;
        fp += term_f * k3 / x;
        gp += term_g * (k3 + 1.0) / x;
        if term_f.abs() < 1e-18 * f.abs() && term_g.abs() < 1e-18 * g.abs() {
            break;
        }
    }

    let ai = AIRY_C1 * f - AIRY_C2 * g;
    let aip = AIRY_C1 * fp - AIRY_C2 * gp;
    let bi = SQRT_3 * (AIRY_C1 * f + AIRY_C2 * g);
    let bip = SQRT_3 * (AIRY_C1 * fp + AIRY_C2 * gp);
    (ai, aip, bi, bip)
}

/// Large-argument asymptotic expansions in scaled form.
fn airy_asymptotic(x: f64, zeta: f64) -> AiryScaled {
    let sqrt_pi = std::f64::consts::PI.sqrt();
    let x4 = x.sqrt().sqrt();
    let z1 = 1.0 / zeta;
    let z2 = z1 * z1;
    let z3 = z2 * z1;

    // u-coefficients for Ai/Bi, v-coefficients for the derivatives.
    let u1 = 5.0 / 72.0;
    let u2 = 385.0 / 10368.0;
    let u3 = 85085.0 / 2239488.0;
    let v1 = -7.0 / 72.0;
    let v2 = -455.0 / 10368.0;
    let v3 = -95095.0 / 2239488.0;

    let ai = (1.0 - u1 * z1 + u2 * z2 - u3 * z3) / (2.0 * sqrt_pi * x4);
    let bi = (1.0 + u1 * z1 + u2 * z2 + u3 * z3) / (sqrt_pi * x4);
    let aip = -(1.0 - v1 * z1 + v2 * z2 - v3 * z3) * x4 / (2.0 * sqrt_pi);
    let bip = (1.0 + v1 * z1 + v2 * z2 + v3 * z3) * x4 / sqrt_pi;

    AiryScaled {
        ai,
        aip,
        bi,
        bip,
        zeta,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_values_at_zero() {
        let a = airy_scaled(0.0);
        assert!((a.ai_value() - 0.355028053887817).abs() < 1e-12);
        assert!((a.aip_value() - (-0.258819403792807)).abs() < 1e-12);
        assert!((a.bi_value() - 0.614926627446001).abs() < 1e-12);
        assert!((a.bip_value() - 0.448288357353826).abs() < 1e-12);
    }

    #[test]
    fn test_values_at_one() {
        let a = airy_scaled(1.0);
        assert!((a.ai_value() - 0.135292416312881).abs() < 1e-10);
        assert!((a.bi_value() - 1.207423594952871).abs() < 1e-9);
        assert!((a.aip_value() - (-0.159147441212530)).abs() < 1e-10);
        assert!((a.bip_value() - 0.932435933392776).abs() < 1e-9);
    }

    #[test]
    fn test_branches_agree_at_cutoff() {
        // Series and asymptotic expansion must match where they meet.
        let below = {
            let (ai, aip, bi, bip) = airy_series(4.999);
            (ai, aip, bi, bip)
        };
        let above = airy_asymptotic(5.001, 2.0 / 3.0 * 5.001f64 * 5.001f64.sqrt());
        let rel = |a: f64, b: f64| (a - b).abs() / b.abs();
        assert!(rel(below.0, above.ai_value()) < 5e-3, "Ai mismatch");
        assert!(rel(below.1, above.aip_value()) < 5e-3, "Ai' mismatch");
        assert!(rel(below.2, above.bi_value()) < 5e-3, "Bi mismatch");
        assert!(rel(below.3, above.bip_value()) < 5e-3, "Bi' mismatch");
    }

    #[test]
    fn test_wronskian() {
        // Ai(x)·Bi'(x) − Ai'(x)·Bi(x) = 1/π across both branches.
        let expected = 1.0 / std::f64::consts::PI;
        for &x in &[0.0, 0.5, 2.0, 4.9, 5.1, 9.0, 25.0] {
            let a = airy_scaled(x);
            // scaled: the exponential factors cancel in the product
            let w = a.ai * a.bip - a.aip * a.bi;
            assert!(
                (w - expected).abs() < 2e-4 * expected,
                "Wronskian at {x}: {w}"
            );
        }
    }

    #[test]
    fn test_no_overflow_for_huge_argument() {
        let a = airy_scaled(1e4);
        assert!(a.ai.is_finite() && a.bi.is_finite());
        assert!(a.ai_value() == 0.0 || a.ai_value().is_finite());
        let prod = a.ai * a.bi;
        assert!(prod.is_finite() && prod > 0.0);
    }
}
