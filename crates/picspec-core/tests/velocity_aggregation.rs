//! Multi-file velocity histogram aggregation over synthetic rank files.

use std::path::Path;

use picspec_compute::{ComputeBackend, CpuBackend, SerialBackend};
use picspec_core::binning::{
    aggregate_velocity_histograms, velocity_histograms, BinningError, ParticleSource, RankBlock,
};
use picspec_core::types::{Corners, SimulationDescriptor};
use picspec_io::formats::particle::{ParticleFile, ParticleRecord, V0Header};
use picspec_io::DecodeError;

const STEP: u64 = 200;

fn descriptor() -> SimulationDescriptor {
    SimulationDescriptor {
        nx: 8,
        ny: 1,
        nz: 4,
        topology_x: 2,
        topology_y: 1,
        topology_z: 2,
        lx_di: 8.0,
        ly_di: 1.0,
        lz_di: 4.0,
        dx_di: 1.0,
        dy_di: 1.0,
        dz_di: 1.0,
        mime: 1.0,
        vthe: 0.1,
        vthi: 0.1,
        nppc: 4,
        ntp: 1,
        dt_particles: 1.0,
        particle_interval: STEP,
    }
}

/// Local domain of `(ix, iz)`: 4 × 1 × 2 cells.
fn v0(d: &SimulationDescriptor, ix: usize, iz: usize) -> V0Header {
    V0Header {
        nt: STEP as i32,
        nx: 4,
        ny: 1,
        nz: 2,
        dx: 1.0,
        dy: 1.0,
        dz: 1.0,
        x0: 4.0 * ix as f32,
        y0: -0.5,
        z0: -2.0 + 2.0 * iz as f32,
        rank: d.rank_id(ix, 0, iz) as i32,
        ..Default::default()
    }
}

/// Particles spread over the interior cells with rank-dependent velocities.
fn particles(rank: usize) -> Vec<ParticleRecord> {
    let (nx, ny) = (4 + 2, 1 + 2);
    let mut out = Vec::new();
    for k in 0..24 {
        let ix = 1 + (k % 4) as i32;
        let iy = 1;
        let iz = 1 + (k / 4 % 2) as i32;
        let s = (k as f32 + rank as f32 * 0.37) * 0.41;
        out.push(ParticleRecord {
            dxyz: [0.0, 0.0, 0.0],
            icell: iz * nx * ny + iy * nx + ix,
            u: [0.9 * s.sin(), 0.9 * s.cos(), 0.5 * (2.0 * s).sin()],
            q: 1.0,
        });
    }
    out
}

fn write_rank_files(base: &Path, d: &SimulationDescriptor) {
    let source = ParticleSource::new(base, "e", STEP);
    for ix in 0..d.topology_x {
        for iz in 0..d.topology_z {
            let rank = d.rank_id(ix, 0, iz);
            let file = ParticleFile::new(v0(d, ix, iz), particles(rank));
            let path = source.path(rank);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, file.encode()).unwrap();
        }
    }
}

fn all_ranks() -> RankBlock {
    RankBlock {
        x: [0, 1],
        y: [0, 0],
        z: [0, 1],
    }
}

#[test]
fn test_sum_matches_per_file_histograms() {
    let dir = tempfile::tempdir().unwrap();
    let d = descriptor();
    write_rank_files(dir.path(), &d);
    let source = ParticleSource::new(dir.path(), "e", STEP);

    let total = aggregate_velocity_histograms(
        &source,
        &all_ranks(),
        &d,
        &Corners::unbounded(),
        16,
        &SerialBackend,
    )
    .unwrap();

    let mut expected_xy = ndarray::Array2::<f64>::zeros((16, 16));
    for ix in 0..2 {
        for iz in 0..2 {
            let rank = d.rank_id(ix, 0, iz);
            let h = velocity_histograms(
                &ParticleFile::new(v0(&d, ix, iz), Vec::new()).header,
                &particles(rank),
                &d,
                &Corners::unbounded(),
                16,
            )
            .unwrap();
            expected_xy += &h.xy;
        }
    }
    assert_eq!(total.xy, expected_xy);
    assert_eq!(total.total(), 4.0 * 24.0);
}

#[test]
fn test_order_and_backend_independent() {
    let dir = tempfile::tempdir().unwrap();
    let d = descriptor();
    write_rank_files(dir.path(), &d);
    let source = ParticleSource::new(dir.path(), "e", STEP);
    let corners = Corners::unbounded();

    let serial =
        aggregate_velocity_histograms(&source, &all_ranks(), &d, &corners, 32, &SerialBackend)
            .unwrap();
    let cpu = CpuBackend::with_threads(3).unwrap();
    let parallel =
        aggregate_velocity_histograms(&source, &all_ranks(), &d, &corners, 32, &cpu).unwrap();

    // Counts are small integers, so any summation order is exact.
    assert_eq!(serial, parallel);

    // Reversed visiting order: sum the single-rank blocks back to front.
    let mut reversed = ndarray::Array2::<f64>::zeros((32, 32));
    for ix in (0..2).rev() {
        for iz in (0..2).rev() {
            let block = RankBlock {
                x: [ix, ix],
                y: [0, 0],
                z: [iz, iz],
            };
            let h = aggregate_velocity_histograms(&source, &block, &d, &corners, 32, &SerialBackend)
                .unwrap();
            reversed += &h.yz;
        }
    }
    assert_eq!(serial.yz, reversed);
}

#[test]
fn test_rank_outside_region_contributes_zero() {
    let dir = tempfile::tempdir().unwrap();
    let d = descriptor();
    write_rank_files(dir.path(), &d);
    let source = ParticleSource::new(dir.path(), "e", STEP);

    // Only the x < 4 half of the domain (ix = 0 ranks), all of y and z.
    let left = Corners::new([[0.0, 3.9], [-1.0, 1.0], [-2.0, 2.0]]);
    let hist = aggregate_velocity_histograms(&source, &all_ranks(), &d, &left, 16, &SerialBackend)
        .unwrap();
    assert_eq!(hist.total(), 2.0 * 24.0);
}

#[test]
fn test_missing_rank_aborts_query() {
    let dir = tempfile::tempdir().unwrap();
    let d = descriptor();
    write_rank_files(dir.path(), &d);
    let source = ParticleSource::new(dir.path(), "e", STEP);
    std::fs::remove_file(source.path(d.rank_id(1, 0, 1))).unwrap();

    for backend in [&SerialBackend as &dyn ComputeBackend, &CpuBackend::new()] {
        let err = aggregate_velocity_histograms(
            &source,
            &all_ranks(),
            &d,
            &Corners::unbounded(),
            16,
            backend,
        )
        .unwrap_err();
        assert!(
            matches!(err, BinningError::Decode(DecodeError::FileNotFound { .. })),
            "{:?}",
            err
        );
    }
}

#[test]
fn test_truncated_rank_aborts_query() {
    let dir = tempfile::tempdir().unwrap();
    let d = descriptor();
    write_rank_files(dir.path(), &d);
    let source = ParticleSource::new(dir.path(), "e", STEP);
    let path = source.path(d.rank_id(0, 0, 1));
    let bytes = std::fs::read(&path).unwrap();
    std::fs::write(&path, &bytes[..bytes.len() - 5]).unwrap();

    let err = aggregate_velocity_histograms(
        &source,
        &all_ranks(),
        &d,
        &Corners::unbounded(),
        16,
        &SerialBackend,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        BinningError::Decode(DecodeError::TruncatedRecord { .. })
    ));
}
