//! 1D FFT plan wrappers around rustfft.
//!
//! Convention matches numpy:
//! - Forward FFT: unnormalized
//! - Inverse FFT: normalized by 1/n

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// A matched forward/inverse plan pair of fixed length.
///
/// Plans are created once and reused; the pair is not re-entrant
/// (callers own it exclusively).
pub struct FftPair {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    len: usize,
}

impl FftPair {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        FftPair {
            forward,
            inverse,
            len,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Forward-transform `input`, zero-padded to the plan length,
    /// into `spectrum`.
    pub fn forward_padded(&self, input: &[f64], spectrum: &mut Vec<Complex64>) {
        spectrum.clear();
        spectrum.resize(self.len, Complex64::new(0.0, 0.0));
        for (s, &v) in spectrum.iter_mut().zip(input.iter()) {
            *s = Complex64::new(v, 0.0);
        }
        self.forward.process(spectrum);
    }

    /// Inverse-transform `spectrum` in place, with 1/n normalization.
    pub fn inverse(&self, spectrum: &mut [Complex64]) {
        self.inverse.process(spectrum);
        let norm = 1.0 / self.len as f64;
        for s in spectrum.iter_mut() {
            *s *= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let n = 64;
        let pair = FftPair::new(n);
        let input: Vec<f64> = (0..n).map(|i| ((i * 7) as f64 * 0.13).sin()).collect();
        let mut spectrum = Vec::new();
        pair.forward_padded(&input, &mut spectrum);
        pair.inverse(&mut spectrum);
        for (i, (&x, s)) in input.iter().zip(spectrum.iter()).enumerate() {
            assert!(
                (s.re - x).abs() < 1e-12 && s.im.abs() < 1e-12,
                "roundtrip failed at {i}: {s} vs {x}"
            );
        }
    }

    #[test]
    fn test_dc_component() {
        let n = 32;
        let pair = FftPair::new(n);
        let input = vec![2.5; n];
        let mut spectrum = Vec::new();
        pair.forward_padded(&input, &mut spectrum);
        assert!((spectrum[0].re - 2.5 * n as f64).abs() < 1e-10);
        assert!(spectrum[0].im.abs() < 1e-10);
        for s in &spectrum[1..] {
            assert!(s.norm() < 1e-10, "non-DC bin should vanish: {s}");
        }
    }

    #[test]
    fn test_zero_padding() {
        let pair = FftPair::new(16);
        let input = vec![1.0; 4];
        let mut spectrum = Vec::new();
        pair.forward_padded(&input, &mut spectrum);
        assert_eq!(spectrum.len(), 16);
        // DC bin equals the sum of the short input
        assert!((spectrum[0].re - 4.0).abs() < 1e-12);
    }
}
