//! Encode particle dumps to disk and decode them back.

use picspec_io::formats::particle::{
    particle_file_path, read_particle_file, ParticleFile, ParticleRecord, V0Header,
};
use picspec_io::formats::schema::PARTICLE_RECORDS_OFFSET;

fn v0(rank: i32) -> V0Header {
    V0Header {
        version: 0,
        dump_type: 3,
        nt: 4800,
        nx: 32,
        ny: 1,
        nz: 16,
        dt: 0.0125,
        dx: 0.3125,
        dy: 1.0,
        dz: 0.3125,
        x0: 10.0 * rank as f32,
        y0: -0.5,
        z0: -2.5,
        cvac: 1.0,
        eps0: 1.0,
        damp: 0.0,
        rank,
        ndom: 8,
        species_id: 1,
        species_qm: 1.0 / 25.0,
    }
}

fn records(n: usize) -> Vec<ParticleRecord> {
    (0..n)
        .map(|i| {
            let t = i as f32;
            ParticleRecord {
                dxyz: [-1.0 + 0.01 * t, 0.5, 1.0 - 0.02 * t],
                icell: (i * 37 + 35) as i32,
                u: [0.1 * t.sin(), -0.2 * t.cos(), 1e-7 * t],
                q: 0.125,
            }
        })
        .collect()
}

#[test]
fn test_roundtrip_is_bit_exact() {
    let dir = tempfile::tempdir().unwrap();
    let mut particles = records(200);
    // Awkward float payloads survive unchanged.
    particles[3].u = [-0.0, f32::MIN_POSITIVE, f32::MAX];
    particles[4].q = f32::from_bits(0x7fc0_1234);

    let original = ParticleFile::new(v0(5), particles);
    let path = particle_file_path(dir.path(), "e", 4800, 5);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, original.encode()).unwrap();

    let decoded = read_particle_file(&path).unwrap();
    assert!(decoded.boilerplate.is_recognised());
    assert_eq!(decoded.header.v0.nt, 4800);
    assert_eq!(decoded.header.v0.rank, 5);
    assert_eq!(decoded.header.particles.dim, 200);
    assert_eq!(
        decoded.header.v0.species_qm.to_bits(),
        original.header.v0.species_qm.to_bits()
    );
    assert_eq!(decoded.particles.len(), original.particles.len());
    for (a, b) in decoded.particles.iter().zip(&original.particles) {
        assert_eq!(a.icell, b.icell);
        for k in 0..3 {
            assert_eq!(a.dxyz[k].to_bits(), b.dxyz[k].to_bits());
            assert_eq!(a.u[k].to_bits(), b.u[k].to_bits());
        }
        assert_eq!(a.q.to_bits(), b.q.to_bits());
    }
}

#[test]
fn test_encoded_size() {
    let file = ParticleFile::new(v0(0), records(7));
    assert_eq!(file.encode().len() as u64, PARTICLE_RECORDS_OFFSET + 7 * 32);
}

#[test]
fn test_empty_dump() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eparticle.0.0");
    std::fs::write(&path, ParticleFile::new(v0(0), Vec::new()).encode()).unwrap();
    let decoded = read_particle_file(&path).unwrap();
    assert!(decoded.particles.is_empty());
}
