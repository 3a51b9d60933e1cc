//! Rigid rotation in normalized phase space.
//!
//! One full turn (θ = 2π) is one synchrotron period. Cell coordinates
//! are normalized to [−1, 1] on both axes; cells whose source falls
//! outside the grid read the exterior as zero.

use crate::backend::Backend;
use crate::sourcemap::{check_geometry, MapWeight, SourceMap, WeightTable};
use rayon::prelude::*;
use vfps_math::interp::{lagrange_stencil, InterpolationOrder, MAX_STENCIL};
use vfps_types::error::{VfpsError, VfpsResult};
use vfps_types::phasespace::{PhaseSpace, Position};

pub struct RotationMap {
    n: usize,
    angle: f64,
    cos: f64,
    sin: f64,
    order: InterpolationOrder,
    clamp: bool,
    /// Precomputed stencil table; `None` recomputes per call.
    table: Option<WeightTable>,
}

impl RotationMap {
    /// Build a rotation map, rejecting per-step offsets of one cell or
    /// more (`|tan θ|·N/2 ≥ 1`).
    pub fn new(
        n: usize,
        angle: f64,
        order: InterpolationOrder,
        clamp: bool,
        precompute: bool,
    ) -> VfpsResult<Self> {
        Self::build(n, angle, order, clamp, precompute, true)
    }

    /// Build a rotation map without the per-step offset bound.
    /// Accuracy degrades with large angles; callers opt in explicitly.
    pub fn new_forced(
        n: usize,
        angle: f64,
        order: InterpolationOrder,
        clamp: bool,
        precompute: bool,
    ) -> VfpsResult<Self> {
        Self::build(n, angle, order, clamp, precompute, false)
    }

    fn build(
        n: usize,
        angle: f64,
        order: InterpolationOrder,
        clamp: bool,
        precompute: bool,
        check_offset: bool,
    ) -> VfpsResult<Self> {
        if n < 2 {
            return Err(VfpsError::InvalidGeometry(format!(
                "rotation mesh too small: {n}"
            )));
        }
        let offset = angle.tan().abs() * n as f64 / 2.0;
        if check_offset && offset >= 1.0 {
            return Err(VfpsError::UnstableParameters(format!(
                "rotation offset {offset:.3} per step exceeds one cell; \
                 increase the steps per synchrotron period"
            )));
        }
        let mut map = RotationMap {
            n,
            angle,
            cos: angle.cos(),
            sin: angle.sin(),
            order,
            clamp,
            table: None,
        };
        if precompute {
            map.table = Some(map.build_table());
        }
        Ok(map)
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn is_precomputed(&self) -> bool {
        self.table.is_some()
    }

    #[inline]
    fn norm_coord(&self, i: usize) -> f64 {
        2.0 * i as f64 / (self.n as f64 - 1.0) - 1.0
    }

    /// Fractional source indices for output cell (i, j), or `None`
    /// when the source lies outside the grid.
    #[inline]
    fn source_indices(&self, i: usize, j: usize) -> Option<(f64, f64)> {
        let q = self.norm_coord(i);
        let p = self.norm_coord(j);
        let sq = q * self.cos + p * self.sin;
        let sp = -q * self.sin + p * self.cos;
        let half = (self.n as f64 - 1.0) / 2.0;
        let xs = (sq + 1.0) * half;
        let ys = (sp + 1.0) * half;
        let top = self.n as f64 - 1.0;
        if !(0.0..=top).contains(&xs) || !(0.0..=top).contains(&ys) {
            return None;
        }
        Some((xs, ys))
    }

    fn build_table(&self) -> WeightTable {
        let n = self.n;
        let w1 = self.order.points();
        let mut table = WeightTable::new(n * n, w1 * w1, self.clamp);
        for i in 0..n {
            for j in 0..n {
                let Some((xs, ys)) = self.source_indices(i, j) else {
                    continue;
                };
                let sx = lagrange_stencil(xs, self.order);
                let sy = lagrange_stencil(ys, self.order);
                let stencil = table.stencil_mut(i * n + j);
                let mut s = 0;
                for a in 0..sx.len {
                    let ia = (sx.anchor + a as isize).clamp(0, n as isize - 1) as usize;
                    for b in 0..sy.len {
                        let jb = (sy.anchor + b as isize).clamp(0, n as isize - 1) as usize;
                        stencil[s] = MapWeight {
                            src: (ia * n + jb) as u32,
                            weight: sx.weights[a] * sy.weights[b],
                        };
                        s += 1;
                    }
                }
            }
        }
        table
    }

    /// On-the-fly application: recompute the stencil per cell.
    fn apply_direct(&self, input: &[f64], output: &mut [f64]) {
        let n = self.n;
        output
            .par_chunks_mut(n)
            .enumerate()
            .for_each(|(i, row)| {
                for (j, out) in row.iter_mut().enumerate() {
                    let Some((xs, ys)) = self.source_indices(i, j) else {
                        *out = 0.0;
                        continue;
                    };
                    let sx = lagrange_stencil(xs, self.order);
                    let sy = lagrange_stencil(ys, self.order);
                    let mut acc = 0.0;
                    let mut hi = f64::MIN;
                    debug_assert!(sx.len <= MAX_STENCIL);
                    for a in 0..sx.len {
                        let ia = (sx.anchor + a as isize).clamp(0, n as isize - 1) as usize;
                        for b in 0..sy.len {
                            let jb =
                                (sy.anchor + b as isize).clamp(0, n as isize - 1) as usize;
                            let v = input[ia * n + jb];
                            acc += sx.weights[a] * sy.weights[b] * v;
                            if v > hi {
                                hi = v;
                            }
                        }
                    }
                    *out = if self.clamp { acc.max(0.0).min(hi) } else { acc };
                }
            });
    }
}

impl SourceMap for RotationMap {
    fn apply(
        &self,
        input: &PhaseSpace,
        output: &mut PhaseSpace,
        backend: &mut dyn Backend,
    ) -> VfpsResult<()> {
        check_geometry(input, output)?;
        match &self.table {
            Some(table) => {
                let (src, dst) = (input.as_slice(), output.as_slice_mut());
                backend.apply_table(table, src, dst)
            }
            None => {
                self.apply_direct(input.as_slice(), output.as_slice_mut());
                Ok(())
            }
        }
    }

    fn apply_to(&self, tracers: &mut [Position]) {
        // Forward transport: the inverse of the gather map.
        let half = (self.n as f64 - 1.0) / 2.0;
        for t in tracers.iter_mut() {
            let q = t.x / half - 1.0;
            let p = t.y / half - 1.0;
            let q2 = q * self.cos - p * self.sin;
            let p2 = q * self.sin + p * self.cos;
            t.x = (q2 + 1.0) * half;
            t.y = (p2 + 1.0) * half;
        }
    }
}
