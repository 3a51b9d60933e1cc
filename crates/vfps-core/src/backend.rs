//! Compute backends for weight-table application.
//!
//! The per-output-cell gather is data-parallel: every cell writes its
//! own output sample and only reads the input buffer. A backend may
//! spread the loop over worker threads or an accelerator, but must
//! complete all work before returning (fork-join, no suspension
//! points).

use crate::sourcemap::WeightTable;
use rayon::prelude::*;
use vfps_types::error::{VfpsError, VfpsResult};

pub trait Backend: Send {
    fn name(&self) -> &'static str;

    /// Compute `output[k] = Σ_s w_{k,s}·input[src_{k,s}]` for every
    /// output cell of the table.
    fn apply_table(
        &mut self,
        table: &WeightTable,
        input: &[f64],
        output: &mut [f64],
    ) -> VfpsResult<()>;
}

/// Thread-pool backend; always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuBackend;

impl Backend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn apply_table(
        &mut self,
        table: &WeightTable,
        input: &[f64],
        output: &mut [f64],
    ) -> VfpsResult<()> {
        if input.len() != table.cells() || output.len() != table.cells() {
            return Err(VfpsError::InvalidGeometry(format!(
                "weight table covers {} cells, buffers are {}/{}",
                table.cells(),
                input.len(),
                output.len()
            )));
        }
        output
            .par_iter_mut()
            .enumerate()
            .for_each(|(k, out)| *out = table.gather(k, input));
        Ok(())
    }
}
