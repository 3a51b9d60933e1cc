// ─────────────────────────────────────────────────────────────────────
// VFPS — Longitudinal Phase-Space Solver — Evolution Loop
// License: GNU GPL v3
// ─────────────────────────────────────────────────────────────────────
//! The operator-splitting driver.
//!
//! Per step: refresh the wake from the charge profile, renormalize or
//! integrate, emit a snapshot when due, then apply wake kick →
//! rotation (or kick+drift split) → Fokker–Planck, advancing tracers
//! through every map. Snapshot failures are logged and non-fatal; a
//! non-finite integral aborts the run.

use crate::backend::{Backend, CpuBackend};
use crate::drift::{DriftMap, RFKickMap};
use crate::field::ElectricField;
use crate::fokker_planck::{FPType, FokkerPlanckMap};
use crate::haissinski::{self, HaissinskiResult};
use crate::impedance::Impedance;
use crate::params::DerivedParams;
use crate::rotation::RotationMap;
use crate::sourcemap::{IdentityMap, SourceMap};
use crate::wake::{WakeFunctionMap, WakeKick, WakePotentialMap, WakeScaling};
use ndarray::Array2;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use vfps_math::interp::InterpolationOrder;
use vfps_types::config::{RotationStrategy, SimulationConfig};
use vfps_types::error::{VfpsError, VfpsResult};
use vfps_types::phasespace::{PhaseSpace, Position};

/// One emitted state of the run.
pub struct Snapshot<'a> {
    pub step: u64,
    /// Simulation time in unscaled synchrotron periods.
    pub time: f64,
    pub mesh: &'a PhaseSpace,
    /// Wake kick per q column in p cells, when a wake map is active.
    pub wake: Option<&'a [f64]>,
    pub csr_power: f64,
    pub tracers: &'a [Position],
}

/// Snapshot consumer. Implementations live outside the core
/// (archives, live views); errors are reported but do not stop the
/// run.
pub trait Observer {
    fn record(&mut self, snapshot: &Snapshot<'_>) -> VfpsResult<()>;
}

/// Discards every snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {
    fn record(&mut self, _snapshot: &Snapshot<'_>) -> VfpsResult<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub steps_done: u64,
    pub snapshots: u32,
    pub final_integral: f64,
    pub cancelled: bool,
    pub elapsed_ms: f64,
}

enum RotationStage {
    Single(RotationMap),
    Split { rf: RFKickMap, drift: DriftMap },
}

pub struct Simulation {
    config: SimulationConfig,
    params: DerivedParams,
    backend: Box<dyn Backend>,
    mesh: PhaseSpace,
    buf1: PhaseSpace,
    buf2: PhaseSpace,
    rotation: RotationStage,
    fp: Option<FokkerPlanckMap>,
    wake: Option<WakeKick>,
    field: ElectricField,
    tracers: Vec<Position>,
}

impl Simulation {
    /// Build the engine on the CPU backend.
    pub fn new(config: SimulationConfig) -> VfpsResult<Self> {
        Self::with_backend(config, Box::new(CpuBackend))
    }

    /// Build the engine on an explicit backend.
    pub fn with_backend(config: SimulationConfig, backend: Box<dyn Backend>) -> VfpsResult<Self> {
        let params = DerivedParams::from_config(&config)?;
        let order = InterpolationOrder::from_u8(config.numerics.interpolation).ok_or_else(
            || {
                VfpsError::Parse(format!(
                    "interpolation order must be 1, 3 or 5, got {}",
                    config.numerics.interpolation
                ))
            },
        )?;
        let n = config.grid.size;

        if config.io.verbose {
            info!(
                sync_freq = params.fs_unscaled,
                bunch_length = params.bunch_length,
                steps_per_revolution = 1.0 / params.revolution_part,
                rotation_offset = params.rotation_offset(n),
                "derived machine parameters"
            );
            if config.collective.gap != 0.0 {
                info!(
                    shielding = params.shielding,
                    csr_strength = params.csr_strength,
                    threshold_current = params.threshold_current,
                    "derived collective parameters"
                );
            }
        }

        let mut mesh = PhaseSpace::new(
            n,
            params.qmin,
            params.qmax,
            params.pmin,
            params.pmax,
            params.charge,
            config.physics.bunch_current,
            params.bunch_length,
            params.energy_spread,
        )?;
        mesh.seed_gaussian(config.numerics.zoom)?;
        mesh.update_x_projection();
        let buf1 = mesh.clone();
        let buf2 = mesh.clone();

        let impedance = Arc::new(Self::build_impedance(&config, &params, n)?);
        let field = ElectricField::new(
            &mesh,
            impedance,
            params.current,
            config.numerics.padding,
        )?;

        let scaling = WakeScaling {
            revolution_part: params.revolution_part,
            energy_spread: params.energy_spread,
            p_delta: mesh.axis(1).delta(),
        };
        let wake = if let Some(path) = &config.collective.wake_file {
            info!(file = %path.display(), "loading tabulated wake function");
            Some(WakeKick::Function(WakeFunctionMap::from_file(
                path,
                &mesh,
                order,
                config.numerics.clamp,
                scaling,
            )?))
        } else if config.collective.gap != 0.0 {
            Some(WakeKick::Potential(WakePotentialMap::new(
                n,
                order,
                config.numerics.clamp,
                scaling,
            )))
        } else {
            None
        };

        let rotation = match config.numerics.rotation {
            RotationStrategy::OnTheFly => RotationStage::Single(RotationMap::new(
                n,
                params.angle,
                order,
                config.numerics.clamp,
                false,
            )?),
            RotationStrategy::Precomputed => RotationStage::Single(RotationMap::new(
                n,
                params.angle,
                order,
                config.numerics.clamp,
                true,
            )?),
            RotationStrategy::Split => {
                let alpha0 = params.alpha0;
                let coeffs = [
                    params.angle,
                    params.angle * config.physics.alpha1 / alpha0,
                    params.angle * config.physics.alpha2 / alpha0,
                ];
                RotationStage::Split {
                    rf: RFKickMap::new(
                        n,
                        params.angle,
                        mesh.axis(0),
                        mesh.axis(1).delta(),
                        order,
                        config.numerics.clamp,
                    )?,
                    drift: DriftMap::new(
                        n,
                        coeffs,
                        mesh.axis(1),
                        mesh.axis(0).delta(),
                        order,
                        config.numerics.clamp,
                    )?,
                }
            }
        };

        let fp = if params.e1 > 0.0 {
            Some(FokkerPlanckMap::new(
                n,
                FPType::Full,
                params.e1,
                config.numerics.derivation,
                mesh.axis(1),
            )?)
        } else {
            None
        };

        Ok(Simulation {
            config,
            params,
            backend,
            mesh,
            buf1,
            buf2,
            rotation,
            fp,
            wake,
            field,
            tracers: Vec::new(),
        })
    }

    fn build_impedance(
        config: &SimulationConfig,
        params: &DerivedParams,
        n: usize,
    ) -> VfpsResult<Impedance> {
        let bins = n * config.numerics.padding.max(1);
        let f_max = params.f_max;
        if let Some(path) = &config.collective.impedance_file {
            info!(file = %path.display(), "loading tabulated impedance");
            return Impedance::from_file(path, bins, f_max);
        }
        let coll = &config.collective;
        if coll.gap > 0.0 {
            info!("using parallel plates CSR impedance");
            let mut z = Impedance::parallel_plates_csr(bins, params.f0, f_max, coll.gap)?;
            if coll.wall_conductivity > 0.0 && coll.wall_susceptibility >= -1.0 {
                info!("adding resistive wall impedance");
                z += &Impedance::resistive_wall(
                    bins,
                    params.f0,
                    f_max,
                    coll.wall_conductivity,
                    coll.wall_susceptibility,
                    coll.gap / 2.0,
                )?;
            }
            if coll.collimator_radius > 0.0 {
                info!("adding collimator impedance");
                z += &Impedance::collimator(bins, f_max, coll.gap / 2.0, coll.collimator_radius)?;
            }
            Ok(z)
        } else {
            info!("using free space CSR impedance");
            if coll.wall_conductivity > 0.0 && coll.wall_susceptibility >= -1.0 {
                warn!("resistive wall impedance is ignored in free space");
            }
            Impedance::free_space_csr(bins, params.f0, f_max)
        }
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn params(&self) -> &DerivedParams {
        &self.params
    }

    pub fn mesh(&self) -> &PhaseSpace {
        &self.mesh
    }

    pub fn field(&self) -> &ElectricField {
        &self.field
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn tracers(&self) -> &[Position] {
        &self.tracers
    }

    pub fn set_tracers(&mut self, tracers: Vec<Position>) {
        self.tracers = tracers;
    }

    /// Replace the seed distribution (external input files).
    pub fn set_density(&mut self, data: Array2<f64>) -> VfpsResult<()> {
        self.mesh.set_data(data)?;
        self.mesh.update_x_projection();
        self.mesh.normalize()?;
        Ok(())
    }

    /// Run the configured Haissinski iterations, if any.
    pub fn seed_haissinski(&mut self) -> VfpsResult<Option<HaissinskiResult>> {
        let iterations = self.config.numerics.haissinski;
        let Some(wake) = self.wake.as_mut() else {
            return Ok(None);
        };
        if iterations == 0 {
            return Ok(None);
        }
        let result = haissinski::solve(
            &mut self.mesh,
            wake,
            &mut self.field,
            iterations,
            haissinski::DEFAULT_TOLERANCE,
        )?;
        info!(
            iterations = result.iterations,
            residual = result.residual,
            converged = result.converged,
            "Haissinski seeding finished"
        );
        Ok(Some(result))
    }

    /// Execute the evolution loop.
    pub fn run(
        &mut self,
        observer: &mut dyn Observer,
        cancel: &AtomicBool,
    ) -> VfpsResult<RunSummary> {
        let start = Instant::now();
        let outstep = self.config.time.outstep as u64;
        let renormalize = self.config.time.renormalize as u64;
        let steps_per_period = self.config.time.steps.max(1) as f64;
        let total = self.params.total_steps;

        self.mesh.update_x_projection();
        self.mesh.integral()?;
        self.mesh.update_y_projection();
        self.mesh.update_moments(1);
        info!(
            backend = self.backend.name(),
            steps = total,
            rotation_offset = self.params.rotation_offset(self.mesh.n()),
            "starting the simulation"
        );

        let mut snapshots = 0u32;
        let mut cancelled = false;
        let mut steps_done = 0u64;

        for i in 0..total {
            if cancel.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }
            if let Some(wake) = self.wake.as_mut() {
                wake.update(&self.mesh, &mut self.field)?;
            }
            if renormalize > 0 && i % renormalize == 0 {
                self.mesh.normalize()?;
            } else {
                self.mesh.integral()?;
            }
            if outstep > 0 && i % outstep == 0 {
                self.emit_snapshot(i, i as f64 / steps_per_period, observer);
                snapshots += 1;
            }
            self.step()?;
            self.mesh.update_x_projection();
            steps_done += 1;
        }

        // terminal snapshot, prepared the same way as in-loop ones
        if let Some(wake) = self.wake.as_mut() {
            wake.update(&self.mesh, &mut self.field)?;
        }
        if renormalize > 0 {
            self.mesh.normalize()?;
        } else {
            self.mesh.integral()?;
        }
        self.emit_snapshot(steps_done, steps_done as f64 / steps_per_period, observer);
        snapshots += 1;

        let final_integral = self.mesh.cached_integral();
        info!(
            steps_done,
            cancelled, final_integral, "simulation finished"
        );
        Ok(RunSummary {
            steps_done,
            snapshots,
            final_integral,
            cancelled,
            elapsed_ms: start.elapsed().as_secs_f64() * 1e3,
        })
    }

    /// One operator-splitting step. The buffer chain guarantees every
    /// map reads and writes distinct meshes.
    fn step(&mut self) -> VfpsResult<()> {
        match &self.wake {
            Some(wake) => {
                wake.apply(&self.mesh, &mut self.buf1, self.backend.as_mut())?;
                wake.apply_to(&mut self.tracers);
            }
            None => {
                IdentityMap.apply(&self.mesh, &mut self.buf1, self.backend.as_mut())?;
            }
        }

        match &self.rotation {
            RotationStage::Single(rotation) => {
                rotation.apply(&self.buf1, &mut self.buf2, self.backend.as_mut())?;
                rotation.apply_to(&mut self.tracers);
                match &self.fp {
                    Some(fp) => {
                        fp.apply(&self.buf2, &mut self.mesh, self.backend.as_mut())?;
                        fp.apply_to(&mut self.tracers);
                    }
                    None => {
                        IdentityMap.apply(&self.buf2, &mut self.mesh, self.backend.as_mut())?;
                    }
                }
            }
            RotationStage::Split { rf, drift } => {
                rf.apply(&self.buf1, &mut self.buf2, self.backend.as_mut())?;
                rf.apply_to(&mut self.tracers);
                drift.apply(&self.buf2, &mut self.buf1, self.backend.as_mut())?;
                drift.apply_to(&mut self.tracers);
                match &self.fp {
                    Some(fp) => {
                        fp.apply(&self.buf1, &mut self.mesh, self.backend.as_mut())?;
                        fp.apply_to(&mut self.tracers);
                    }
                    None => {
                        IdentityMap.apply(&self.buf1, &mut self.mesh, self.backend.as_mut())?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Prepare moments and field diagnostics, then hand the snapshot
    /// to the observer. Observer failures are logged, never fatal.
    fn emit_snapshot(&mut self, step: u64, time: f64, observer: &mut dyn Observer) {
        self.mesh.update_moments(0);
        self.mesh.update_y_projection();
        self.mesh.update_moments(1);
        if self.wake.is_none() {
            self.field.update(&self.mesh);
        }
        let csr_power = self.field.update_csr(self.config.collective.cutoff_freq);

        info!(
            step,
            periods = time,
            integral = self.mesh.cached_integral(),
            sigma_p = self.mesh.sigma(1),
            csr_power,
            "snapshot"
        );

        let snapshot = Snapshot {
            step,
            time,
            mesh: &self.mesh,
            wake: self.wake.as_ref().map(|w| w.force()),
            csr_power,
            tracers: &self.tracers,
        };
        if let Err(e) = observer.record(&snapshot) {
            warn!(error = %e, step, "snapshot emission failed, continuing");
        }
    }
}
