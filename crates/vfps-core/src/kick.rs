//! Per-line displacement along one axis.
//!
//! A kick map shifts every cell of a mesh line (a q-column or a
//! p-row) by the same fractional number of cells; the shift may vary
//! from line to line. RF kicks, wake kicks and the drift map are all
//! expressed through this one mechanism.

use crate::backend::Backend;
use crate::sourcemap::{check_geometry, MapWeight, SourceMap, WeightTable};
use vfps_math::interp::{lagrange_stencil, InterpolationOrder};
use vfps_types::error::{VfpsError, VfpsResult};
use vfps_types::phasespace::{PhaseSpace, Position};

/// Axis the displacement acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KickAxis {
    /// Shift along q, offset indexed by the p row (drift).
    AlongQ,
    /// Shift along p, offset indexed by the q column (kicks).
    AlongP,
}

pub struct KickMap {
    n: usize,
    axis: KickAxis,
    order: InterpolationOrder,
    /// Displacement per perpendicular line, in mesh cells.
    offset: Vec<f64>,
    table: WeightTable,
}

impl KickMap {
    pub fn new(n: usize, axis: KickAxis, order: InterpolationOrder, clamp: bool) -> Self {
        let mut map = KickMap {
            n,
            axis,
            order,
            offset: vec![0.0; n],
            table: WeightTable::new(n * n, order.points(), clamp),
        };
        map.rebuild();
        map
    }

    /// The current displacement table, in mesh cells.
    pub fn offsets(&self) -> &[f64] {
        &self.offset
    }

    /// Replace the displacement table and rebuild the stencils.
    pub fn set_offsets(&mut self, offsets: &[f64]) -> VfpsResult<()> {
        if offsets.len() != self.n {
            return Err(VfpsError::InvalidGeometry(format!(
                "offset table has {} entries for a {} cell axis",
                offsets.len(),
                self.n
            )));
        }
        self.offset.copy_from_slice(offsets);
        self.rebuild();
        Ok(())
    }

    fn rebuild(&mut self) {
        let n = self.n;
        let top = n as f64 - 1.0;
        for line in 0..n {
            let shift = self.offset[line];
            for along in 0..n {
                let cell = match self.axis {
                    KickAxis::AlongP => line * n + along,
                    KickAxis::AlongQ => along * n + line,
                };
                let stencil = self.table.stencil_mut(cell);
                stencil.fill(MapWeight::default());
                let src_pos = along as f64 - shift;
                if !(0.0..=top).contains(&src_pos) {
                    continue;
                }
                let s = lagrange_stencil(src_pos, self.order);
                for k in 0..s.len {
                    let idx = (s.anchor + k as isize).clamp(0, n as isize - 1) as usize;
                    let src = match self.axis {
                        KickAxis::AlongP => line * n + idx,
                        KickAxis::AlongQ => idx * n + line,
                    };
                    stencil[k] = MapWeight {
                        src: src as u32,
                        weight: s.weights[k],
                    };
                }
            }
        }
    }

    /// Displacement at a fractional line position (linear interpolation,
    /// clamped to the table range).
    pub fn offset_at(&self, pos: f64) -> f64 {
        let top = self.n as f64 - 1.0;
        let x = pos.clamp(0.0, top);
        let i0 = (x.floor() as usize).min(self.n - 2);
        let frac = x - i0 as f64;
        self.offset[i0] * (1.0 - frac) + self.offset[i0 + 1] * frac
    }

    pub(crate) fn table(&self) -> &WeightTable {
        &self.table
    }
}

impl SourceMap for KickMap {
    fn apply(
        &self,
        input: &PhaseSpace,
        output: &mut PhaseSpace,
        backend: &mut dyn Backend,
    ) -> VfpsResult<()> {
        check_geometry(input, output)?;
        let (src, dst) = (input.as_slice(), output.as_slice_mut());
        backend.apply_table(&self.table, src, dst)
    }

    fn apply_to(&self, tracers: &mut [Position]) {
        for t in tracers.iter_mut() {
            match self.axis {
                KickAxis::AlongP => t.y += self.offset_at(t.x),
                KickAxis::AlongQ => t.x += self.offset_at(t.y),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;

    fn mesh(n: usize) -> PhaseSpace {
        let mut ps = PhaseSpace::new(n, -6.0, 6.0, -6.0, 6.0, 1e-9, 1e-3, 1e-3, 600.0).unwrap();
        ps.seed_gaussian(1.0).unwrap();
        ps
    }

    #[test]
    fn test_integer_shift_moves_exactly() {
        let n = 16;
        let mut input = mesh(n);
        input.data_mut().fill(0.0);
        input.data_mut()[[8, 8]] = 1.0;
        let mut output = mesh(n);
        let mut kick = KickMap::new(n, KickAxis::AlongP, InterpolationOrder::Cubic, false);
        kick.set_offsets(&vec![2.0; n]).unwrap();
        let mut backend = CpuBackend;
        kick.apply(&input, &mut output, &mut backend).unwrap();
        assert!((output.data()[[8, 10]] - 1.0).abs() < 1e-12);
        assert!(output.data()[[8, 8]].abs() < 1e-12);
    }

    #[test]
    fn test_zero_offset_is_identity() {
        let n = 24;
        let input = mesh(n);
        let mut output = mesh(n);
        output.data_mut().fill(0.0);
        let kick = KickMap::new(n, KickAxis::AlongQ, InterpolationOrder::Quintic, false);
        let mut backend = CpuBackend;
        kick.apply(&input, &mut output, &mut backend).unwrap();
        for (a, b) in input.data().iter().zip(output.data().iter()) {
            assert!((a - b).abs() < 1e-14);
        }
    }

    #[test]
    fn test_mass_conserved_for_interior_shift() {
        let n = 64;
        let mut input = mesh(n);
        let mut output = mesh(n);
        let mut kick = KickMap::new(n, KickAxis::AlongP, InterpolationOrder::Cubic, false);
        kick.set_offsets(&vec![0.37; n]).unwrap();
        let mut backend = CpuBackend;
        let before = {
            input.update_x_projection();
            input.integral().unwrap()
        };
        kick.apply(&input, &mut output, &mut backend).unwrap();
        output.update_x_projection();
        let after = output.integral().unwrap();
        assert!((after - before).abs() < 1e-9, "{before} -> {after}");
    }

    #[test]
    fn test_clamped_kick_keeps_density_non_negative() {
        let n = 32;
        let mut input = mesh(n);
        // sharp feature to provoke cubic overshoot
        input.data_mut().fill(0.0);
        input.data_mut()[[16, 16]] = 1.0;
        input.data_mut()[[16, 17]] = 0.9;
        let mut output = mesh(n);
        let mut kick = KickMap::new(n, KickAxis::AlongP, InterpolationOrder::Cubic, true);
        kick.set_offsets(&vec![0.5; n]).unwrap();
        let mut backend = CpuBackend;
        kick.apply(&input, &mut output, &mut backend).unwrap();
        for &v in output.data().iter() {
            assert!(v >= 0.0, "negative density {v}");
        }
    }

    #[test]
    fn test_tracer_follows_offset() {
        let n = 32;
        let mut kick = KickMap::new(n, KickAxis::AlongP, InterpolationOrder::Linear, false);
        let offsets: Vec<f64> = (0..n).map(|i| i as f64 * 0.1).collect();
        kick.set_offsets(&offsets).unwrap();
        let mut tracers = vec![Position { x: 10.0, y: 5.0 }, Position { x: 10.5, y: 0.0 }];
        kick.apply_to(&mut tracers);
        assert!((tracers[0].y - 6.0).abs() < 1e-12);
        assert!((tracers[1].y - 1.05).abs() < 1e-12);
    }

    #[test]
    fn test_offset_length_checked() {
        let mut kick = KickMap::new(16, KickAxis::AlongP, InterpolationOrder::Linear, false);
        assert!(matches!(
            kick.set_offsets(&[0.0; 8]),
            Err(VfpsError::InvalidGeometry(_))
        ));
    }
}
