//! Seed distributions and tracer coordinates from files.

use ndarray::Array2;
use ndarray_npy::NpzReader;
use std::fs::File;
use std::path::Path;
use vfps_types::error::{VfpsError, VfpsResult};
use vfps_types::phasespace::{PhaseSpace, Position};

/// Bin whitespace-separated (q, p) particle pairs into the mesh and
/// normalize. Coordinates are in axis units; particles outside the
/// window are dropped.
pub fn seed_from_txt<P: AsRef<Path>>(mesh: &mut PhaseSpace, path: P) -> VfpsResult<()> {
    let contents = std::fs::read_to_string(path)?;
    let n = mesh.n();
    let mut binned = Array2::<f64>::zeros((n, n));
    let mut total = 0usize;
    let mut kept = 0usize;

    let mut values = contents.split_whitespace();
    loop {
        let Some(qs) = values.next() else { break };
        let ps = values.next().ok_or_else(|| {
            VfpsError::Format("particle file has an odd number of values".to_string())
        })?;
        let q: f64 = qs
            .parse()
            .map_err(|e| VfpsError::Format(format!("particle file: {e}")))?;
        let p: f64 = ps
            .parse()
            .map_err(|e| VfpsError::Format(format!("particle file: {e}")))?;
        total += 1;
        let qi = mesh.axis(0).position(q).round();
        let pj = mesh.axis(1).position(p).round();
        if qi < 0.0 || pj < 0.0 || qi > (n - 1) as f64 || pj > (n - 1) as f64 {
            continue;
        }
        binned[[qi as usize, pj as usize]] += 1.0;
        kept += 1;
    }
    if kept == 0 {
        return Err(VfpsError::Format(format!(
            "no particles inside the mesh window ({total} read)"
        )));
    }
    tracing::info!(total, kept, "binned particle seed");
    mesh.set_data(binned)?;
    mesh.update_x_projection();
    mesh.normalize()?;
    Ok(())
}

/// Load the phase-space array of one snapshot from an npz archive
/// written by the recorder. The array size must match the mesh.
pub fn seed_from_npz<P: AsRef<Path>>(
    mesh: &mut PhaseSpace,
    path: P,
    step: usize,
) -> VfpsResult<()> {
    let file = File::open(path)?;
    let mut npz =
        NpzReader::new(file).map_err(|e| VfpsError::Format(format!("npz open: {e}")))?;
    let name = phase_space_name(step);
    let data: Array2<f64> = npz
        .by_name(&name)
        .map_err(|e| VfpsError::Format(format!("npz array '{name}': {e}")))?;
    if data.dim() != (mesh.n(), mesh.n()) {
        return Err(VfpsError::InvalidGeometry(format!(
            "start distribution is {:?}, configured mesh is {}x{}",
            data.dim(),
            mesh.n(),
            mesh.n()
        )));
    }
    mesh.set_data(data)?;
    mesh.update_x_projection();
    mesh.normalize()?;
    Ok(())
}

/// Archive entry name of the full density at a snapshot index.
pub fn phase_space_name(step: usize) -> String {
    format!("phase_space_{step:06}")
}

/// Tracer start coordinates: whitespace-separated (x, y) pairs in
/// fractional grid units.
pub fn load_tracers<P: AsRef<Path>>(path: P) -> VfpsResult<Vec<Position>> {
    let contents = std::fs::read_to_string(path)?;
    let mut tracers = Vec::new();
    let mut values = contents.split_whitespace();
    loop {
        let Some(xs) = values.next() else { break };
        let ys = values.next().ok_or_else(|| {
            VfpsError::Format("tracer file has an odd number of values".to_string())
        })?;
        let x: f64 = xs
            .parse()
            .map_err(|e| VfpsError::Format(format!("tracer file: {e}")))?;
        let y: f64 = ys
            .parse()
            .map_err(|e| VfpsError::Format(format!("tracer file: {e}")))?;
        tracers.push(Position { x, y });
    }
    Ok(tracers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(n: usize) -> PhaseSpace {
        PhaseSpace::new(n, -6.0, 6.0, -6.0, 6.0, 1e-9, 1e-3, 1e-3, 600.0).unwrap()
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join("vfps-io-test");
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn test_seed_from_txt_bins_and_normalizes() {
        let path = temp_path("particles.txt");
        std::fs::write(&path, "0.0 0.0\n0.0 0.0\n1.0 -1.0\n99.0 0.0\n").unwrap();
        let mut ps = mesh(13);
        seed_from_txt(&mut ps, &path).unwrap();
        // center cell got two of the three in-window particles
        let center = ps.data()[[6, 6]];
        let side = ps.data()[[7, 5]];
        assert!((center / side - 2.0).abs() < 1e-12);
        assert!((ps.cached_integral() - 1.0).abs() < 1e-12);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_seed_from_txt_rejects_odd_count() {
        let path = temp_path("odd.txt");
        std::fs::write(&path, "0.0 0.0 1.0\n").unwrap();
        let mut ps = mesh(8);
        assert!(matches!(
            seed_from_txt(&mut ps, &path),
            Err(VfpsError::Format(_))
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_tracers() {
        let path = temp_path("tracers.txt");
        std::fs::write(&path, "10.0 12.5\n3.25 4.0\n").unwrap();
        let tracers = load_tracers(&path).unwrap();
        assert_eq!(tracers.len(), 2);
        assert_eq!(tracers[0], Position { x: 10.0, y: 12.5 });
        assert_eq!(tracers[1], Position { x: 3.25, y: 4.0 });
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut ps = mesh(8);
        assert!(matches!(
            seed_from_txt(&mut ps, "/nonexistent/vfps/seed.txt"),
            Err(VfpsError::Io(_))
        ));
    }
}
