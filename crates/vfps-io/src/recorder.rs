//! Snapshot persistence: one npz archive per run plus a JSON sidecar
//! with the full configuration and derived parameters.

use ndarray::{Array1, Array2};
use ndarray_npy::NpzWriter;
use std::fs::File;
use std::path::PathBuf;
use tracing::info;
use vfps_core::params::DerivedParams;
use vfps_core::simulation::{Observer, Snapshot};
use vfps_types::config::SimulationConfig;
use vfps_types::error::{VfpsError, VfpsResult};

use crate::input::phase_space_name;

/// Collects snapshots in memory and writes the archive on `finish`.
pub struct NpzRecorder {
    path: PathBuf,
    sidecar: String,
    save_phase_space: bool,
    times: Vec<f64>,
    integrals: Vec<f64>,
    mean_q: Vec<f64>,
    mean_p: Vec<f64>,
    sigma_q: Vec<f64>,
    sigma_p: Vec<f64>,
    csr_power: Vec<f64>,
    profiles: Vec<Array1<f64>>,
    energy_profiles: Vec<Array1<f64>>,
    wakes: Vec<Array1<f64>>,
    tracers: Vec<Array2<f64>>,
    phase_spaces: Vec<Array2<f64>>,
}

impl NpzRecorder {
    /// `path` is the archive file; the sidecar lands next to it with a
    /// `.cfg.json` suffix.
    pub fn new(
        path: PathBuf,
        config: &SimulationConfig,
        params: &DerivedParams,
        save_phase_space: bool,
    ) -> VfpsResult<Self> {
        let sidecar = serde_json::to_string_pretty(&serde_json::json!({
            "config": config,
            "derived": params,
        }))?;
        Ok(NpzRecorder {
            path,
            sidecar,
            save_phase_space,
            times: Vec::new(),
            integrals: Vec::new(),
            mean_q: Vec::new(),
            mean_p: Vec::new(),
            sigma_q: Vec::new(),
            sigma_p: Vec::new(),
            csr_power: Vec::new(),
            profiles: Vec::new(),
            energy_profiles: Vec::new(),
            wakes: Vec::new(),
            tracers: Vec::new(),
            phase_spaces: Vec::new(),
        })
    }

    pub fn snapshots(&self) -> usize {
        self.times.len()
    }

    /// Write the archive and the sidecar. Consumes the recorder.
    pub fn finish(self) -> VfpsResult<PathBuf> {
        let sidecar_path = self.path.with_extension("cfg.json");
        std::fs::write(&sidecar_path, &self.sidecar)?;

        let file = File::create(&self.path)?;
        let mut npz = NpzWriter::new(file);
        let write =
            |npz: &mut NpzWriter<File>, name: &str, data: &Array1<f64>| -> VfpsResult<()> {
                npz.add_array(name, data)
                    .map_err(|e| VfpsError::Format(format!("npz write '{name}': {e}")))
            };

        write(&mut npz, "time", &Array1::from(self.times.clone()))?;
        write(&mut npz, "integral", &Array1::from(self.integrals.clone()))?;
        write(&mut npz, "mean_q", &Array1::from(self.mean_q.clone()))?;
        write(&mut npz, "mean_p", &Array1::from(self.mean_p.clone()))?;
        write(&mut npz, "sigma_q", &Array1::from(self.sigma_q.clone()))?;
        write(&mut npz, "sigma_p", &Array1::from(self.sigma_p.clone()))?;
        write(&mut npz, "csr_power", &Array1::from(self.csr_power.clone()))?;

        let stack = |rows: &[Array1<f64>]| -> Option<Array2<f64>> {
            let n = rows.first()?.len();
            let mut out = Array2::zeros((rows.len(), n));
            for (k, row) in rows.iter().enumerate() {
                out.row_mut(k).assign(row);
            }
            Some(out)
        };
        if let Some(profiles) = stack(&self.profiles) {
            npz.add_array("bunch_profile", &profiles)
                .map_err(|e| VfpsError::Format(format!("npz write 'bunch_profile': {e}")))?;
        }
        if let Some(profiles) = stack(&self.energy_profiles) {
            npz.add_array("energy_profile", &profiles)
                .map_err(|e| VfpsError::Format(format!("npz write 'energy_profile': {e}")))?;
        }
        if let Some(wakes) = stack(&self.wakes) {
            npz.add_array("wake", &wakes)
                .map_err(|e| VfpsError::Format(format!("npz write 'wake': {e}")))?;
        }
        for (k, tracers) in self.tracers.iter().enumerate() {
            let name = format!("tracers_{k:06}");
            npz.add_array(&name, tracers)
                .map_err(|e| VfpsError::Format(format!("npz write '{name}': {e}")))?;
        }
        for (k, ps) in self.phase_spaces.iter().enumerate() {
            let name = phase_space_name(k);
            npz.add_array(&name, ps)
                .map_err(|e| VfpsError::Format(format!("npz write '{name}': {e}")))?;
        }
        npz.finish()
            .map_err(|e| VfpsError::Format(format!("npz finish: {e}")))?;

        info!(
            archive = %self.path.display(),
            sidecar = %sidecar_path.display(),
            snapshots = self.times.len(),
            "wrote result archive"
        );
        Ok(self.path)
    }
}

impl Observer for NpzRecorder {
    fn record(&mut self, snapshot: &Snapshot<'_>) -> VfpsResult<()> {
        self.times.push(snapshot.time);
        self.integrals.push(snapshot.mesh.cached_integral());
        self.mean_q.push(snapshot.mesh.mean(0));
        self.mean_p.push(snapshot.mesh.mean(1));
        self.sigma_q.push(snapshot.mesh.sigma(0));
        self.sigma_p.push(snapshot.mesh.sigma(1));
        self.csr_power.push(snapshot.csr_power);
        self.profiles.push(snapshot.mesh.x_projection().clone());
        self.energy_profiles
            .push(snapshot.mesh.y_projection().clone());
        if let Some(wake) = snapshot.wake {
            self.wakes.push(Array1::from(wake.to_vec()));
        }
        if !snapshot.tracers.is_empty() {
            let mut t = Array2::zeros((snapshot.tracers.len(), 2));
            for (k, pos) in snapshot.tracers.iter().enumerate() {
                t[[k, 0]] = pos.x;
                t[[k, 1]] = pos.y;
            }
            self.tracers.push(t);
        }
        if self.save_phase_space {
            self.phase_spaces.push(snapshot.mesh.data().clone());
        }
        Ok(())
    }
}
