//! Decoder for per-rank particle dump files.
//!
//! A dump is laid out as:
//! ```text
//! boilerplate          23 bytes   size markers + 0xCAFE / 0xDEADBEEF sentinels
//! v0 header            80 bytes   step, grid, domain and species metadata
//! array sub-header     12 bytes   element size, dimensionality, element count
//! particle records     N × 32     dxyz[3] f32, icell i32, u[3] f32, q f32
//! ```
//! Everything is in native byte order. Records are read from the computed
//! offset for exactly the declared count; trailing bytes are ignored.
//!
//! Decoding is fail-fast: a file that ends before the last declared record
//! yields [`DecodeError::TruncatedRecord`] rather than a shortened particle
//! set.

use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::schema::{
    BOILERPLATE, BOILERPLATE_SIZE, PARTICLE_ARRAY, PARTICLE_ARRAY_OFFSET, PARTICLE_ARRAY_SIZE,
    PARTICLE_RECORD, PARTICLE_RECORDS_OFFSET, PARTICLE_RECORD_SIZE, PARTICLE_V0,
    PARTICLE_V0_OFFSET, PARTICLE_V0_SIZE,
};
use super::{open, truncated, DecodeError};

const CAFE: i16 = 0xCAFE_u16 as i16;
const DEADBEEF: i32 = 0xDEAD_BEEF_u32 as i32;

/// Format sentinels at the start of every dump.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boilerplate {
    /// Sizes of char, short, int, float and double on the writing machine.
    pub size_markers: [i8; 5],
    pub cafe: i16,
    pub deadbeef: i32,
    pub float_one: f32,
    pub double_one: f64,
}

impl Default for Boilerplate {
    /// The boilerplate a conforming writer on this platform produces.
    fn default() -> Self {
        Self {
            size_markers: [1, 2, 4, 4, 8],
            cafe: CAFE,
            deadbeef: DEADBEEF,
            float_one: 1.0,
            double_one: 1.0,
        }
    }
}

impl Boilerplate {
    /// Whether the sentinels match what a same-endian writer would emit.
    pub fn is_recognised(&self) -> bool {
        self.cafe == CAFE
            && self.deadbeef == DEADBEEF
            && self.float_one == 1.0
            && self.double_one == 1.0
    }

    fn decode(bytes: &[u8]) -> Self {
        let rec = BOILERPLATE.record(bytes);
        let mut size_markers = [0i8; 5];
        for (i, m) in size_markers.iter_mut().enumerate() {
            *m = rec.i8_at("size_markers", i);
        }
        Self {
            size_markers,
            cafe: rec.i16("cafe"),
            deadbeef: rec.i32("deadbeef"),
            float_one: rec.f32("float_one"),
            double_one: rec.f64("double_one"),
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut b = BOILERPLATE.builder();
        for (i, m) in self.size_markers.iter().enumerate() {
            b.set_i8_at("size_markers", i, *m);
        }
        b.set_i16("cafe", self.cafe)
            .set_i32("deadbeef", self.deadbeef)
            .set_f32("float_one", self.float_one)
            .set_f64("double_one", self.double_one);
        b.finish()
    }
}

/// Version-0 header describing the step, the local grid and the species.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct V0Header {
    pub version: i32,
    pub dump_type: i32,
    /// Time step at which the dump was written.
    pub nt: i32,
    /// Local grid size (without ghost cells).
    pub nx: i32,
    pub ny: i32,
    pub nz: i32,
    pub dt: f32,
    /// Cell spacing.
    pub dx: f32,
    pub dy: f32,
    pub dz: f32,
    /// Local domain origin.
    pub x0: f32,
    pub y0: f32,
    pub z0: f32,
    pub cvac: f32,
    pub eps0: f32,
    pub damp: f32,
    /// Rank that wrote this file.
    pub rank: i32,
    /// Total number of ranks.
    pub ndom: i32,
    pub species_id: i32,
    /// Species charge-to-mass ratio.
    pub species_qm: f32,
}

/// Sub-header describing the particle array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArrayHeader {
    /// Size of one element in bytes.
    pub size: i32,
    pub ndim: i32,
    /// Number of elements.
    pub dim: i32,
}

/// Complete header of a particle dump.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ParticleFileHeader {
    pub v0: V0Header,
    pub particles: ArrayHeader,
}

impl ParticleFileHeader {
    fn decode(v0_bytes: &[u8], array_bytes: &[u8]) -> Self {
        let v0 = PARTICLE_V0.record(v0_bytes);
        let arr = PARTICLE_ARRAY.record(array_bytes);
        Self {
            v0: V0Header {
                version: v0.i32("version"),
                dump_type: v0.i32("type"),
                nt: v0.i32("nt"),
                nx: v0.i32("nx"),
                ny: v0.i32("ny"),
                nz: v0.i32("nz"),
                dt: v0.f32("dt"),
                dx: v0.f32("dx"),
                dy: v0.f32("dy"),
                dz: v0.f32("dz"),
                x0: v0.f32("x0"),
                y0: v0.f32("y0"),
                z0: v0.f32("z0"),
                cvac: v0.f32("cvac"),
                eps0: v0.f32("eps0"),
                damp: v0.f32("damp"),
                rank: v0.i32("rank"),
                ndom: v0.i32("ndom"),
                species_id: v0.i32("spid"),
                species_qm: v0.f32("spqm"),
            },
            particles: ArrayHeader {
                size: arr.i32("size"),
                ndim: arr.i32("ndim"),
                dim: arr.i32("dim"),
            },
        }
    }

    fn encode(&self) -> Vec<u8> {
        let h = &self.v0;
        let mut v0 = PARTICLE_V0.builder();
        v0.set_i32("version", h.version)
            .set_i32("type", h.dump_type)
            .set_i32("nt", h.nt)
            .set_i32("nx", h.nx)
            .set_i32("ny", h.ny)
            .set_i32("nz", h.nz)
            .set_f32("dt", h.dt)
            .set_f32("dx", h.dx)
            .set_f32("dy", h.dy)
            .set_f32("dz", h.dz)
            .set_f32("x0", h.x0)
            .set_f32("y0", h.y0)
            .set_f32("z0", h.z0)
            .set_f32("cvac", h.cvac)
            .set_f32("eps0", h.eps0)
            .set_f32("damp", h.damp)
            .set_i32("rank", h.rank)
            .set_i32("ndom", h.ndom)
            .set_i32("spid", h.species_id)
            .set_f32("spqm", h.species_qm);
        let mut arr = PARTICLE_ARRAY.builder();
        arr.set_i32("size", self.particles.size)
            .set_i32("ndim", self.particles.ndim)
            .set_i32("dim", self.particles.dim);

        let mut bytes = v0.finish();
        bytes.extend_from_slice(&arr.finish());
        bytes
    }
}

/// One macro-particle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ParticleRecord {
    /// Position relative to the cell centre, each component in [-1, 1].
    pub dxyz: [f32; 3],
    /// Flattened index into the ghost-padded local grid.
    pub icell: i32,
    /// Normalised momentum.
    pub u: [f32; 3],
    /// Charge (weight).
    pub q: f32,
}

impl ParticleRecord {
    fn decode(bytes: &[u8]) -> Self {
        let rec = PARTICLE_RECORD.record(bytes);
        Self {
            dxyz: [rec.f32_at("dxyz", 0), rec.f32_at("dxyz", 1), rec.f32_at("dxyz", 2)],
            icell: rec.i32("icell"),
            u: [rec.f32_at("u", 0), rec.f32_at("u", 1), rec.f32_at("u", 2)],
            q: rec.f32("q"),
        }
    }

    fn encode_into(&self, out: &mut Vec<u8>) {
        let mut b = PARTICLE_RECORD.builder();
        for i in 0..3 {
            b.set_f32_at("dxyz", i, self.dxyz[i]);
            b.set_f32_at("u", i, self.u[i]);
        }
        b.set_i32("icell", self.icell).set_f32("q", self.q);
        out.extend_from_slice(&b.finish());
    }
}

/// A fully decoded particle dump.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleFile {
    pub boilerplate: Boilerplate,
    pub header: ParticleFileHeader,
    pub particles: Vec<ParticleRecord>,
}

impl ParticleFile {
    /// A dump of `particles` with the platform boilerplate and a matching
    /// array sub-header.
    pub fn new(v0: V0Header, particles: Vec<ParticleRecord>) -> Self {
        Self {
            boilerplate: Boilerplate::default(),
            header: ParticleFileHeader {
                v0,
                particles: ArrayHeader {
                    size: PARTICLE_RECORD_SIZE as i32,
                    ndim: 1,
                    dim: particles.len() as i32,
                },
            },
            particles,
        }
    }

    /// Serialise to the on-disk layout. The array sub-header is written as
    /// given, so callers keep `header.particles.dim` consistent with the
    /// record count.
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = self.boilerplate.encode();
        bytes.extend_from_slice(&self.header.encode());
        bytes.reserve(self.particles.len() * PARTICLE_RECORD_SIZE);
        for p in &self.particles {
            p.encode_into(&mut bytes);
        }
        bytes
    }
}

/// Path of the dump written by `rank` at `step`:
/// `<base>/particle/T.<step>/<prefix>particle.<step>.<rank>`.
pub fn particle_file_path(base: &Path, prefix: &str, step: u64, rank: usize) -> PathBuf {
    base.join("particle")
        .join(format!("T.{}", step))
        .join(format!("{}particle.{}.{}", prefix, step, rank))
}

/// Decode the 23-byte boilerplate. Unrecognised sentinels are logged, not
/// rejected.
pub fn read_boilerplate<R: Read>(reader: &mut R) -> std::io::Result<Boilerplate> {
    let mut bytes = [0u8; BOILERPLATE_SIZE];
    reader.read_exact(&mut bytes)?;
    let boilerplate = Boilerplate::decode(&bytes);
    if !boilerplate.is_recognised() {
        log::warn!(
            "Unrecognised boilerplate (cafe={:#06x}, deadbeef={:#010x}); file may use a different byte order",
            boilerplate.cafe as u16,
            boilerplate.deadbeef as u32
        );
    }
    Ok(boilerplate)
}

/// Decode the v0 header and particle sub-header, which directly follow the
/// boilerplate.
pub fn read_particle_header<R: Read>(reader: &mut R) -> std::io::Result<ParticleFileHeader> {
    let mut v0 = [0u8; PARTICLE_V0_SIZE];
    reader.read_exact(&mut v0)?;
    let mut arr = [0u8; PARTICLE_ARRAY_SIZE];
    reader.read_exact(&mut arr)?;
    Ok(ParticleFileHeader::decode(&v0, &arr))
}

/// Read a particle dump from disk.
pub fn read_particle_file(path: &Path) -> Result<ParticleFile, DecodeError> {
    let file = open(path)?;
    let available = file.metadata()?.len();
    let mut reader = BufReader::new(file);

    let boilerplate = read_boilerplate(&mut reader)
        .map_err(|e| truncated(e, path, "boilerplate", PARTICLE_V0_OFFSET, available))?;
    let header = read_particle_header(&mut reader).map_err(|e| {
        truncated(e, path, "particle header", PARTICLE_RECORDS_OFFSET, available)
    })?;

    let record_size = PARTICLE_RECORD_SIZE as i32;
    if header.particles.size != record_size {
        return Err(DecodeError::LayoutMismatch {
            path: path.to_path_buf(),
            message: format!(
                "particle element size is {} bytes, expected {}",
                header.particles.size, record_size
            ),
        });
    }
    let v0 = &header.v0;
    if v0.nx < 1 || v0.ny < 1 || v0.nz < 1 {
        return Err(DecodeError::LayoutMismatch {
            path: path.to_path_buf(),
            message: format!("non-positive local grid {}x{}x{}", v0.nx, v0.ny, v0.nz),
        });
    }
    let count = usize::try_from(header.particles.dim).map_err(|_| DecodeError::LayoutMismatch {
        path: path.to_path_buf(),
        message: format!("negative particle count {}", header.particles.dim),
    })?;

    let required = PARTICLE_RECORDS_OFFSET + (count * PARTICLE_RECORD_SIZE) as u64;
    if available < required {
        return Err(DecodeError::TruncatedRecord {
            path: path.to_path_buf(),
            section: "particle records",
            required,
            available,
        });
    }

    debug_assert_eq!(PARTICLE_ARRAY_OFFSET + PARTICLE_ARRAY_SIZE as u64, PARTICLE_RECORDS_OFFSET);
    reader.seek(SeekFrom::Start(PARTICLE_RECORDS_OFFSET))?;

    let mut particles = Vec::with_capacity(count);
    let mut buf = [0u8; PARTICLE_RECORD_SIZE];
    for _ in 0..count {
        reader
            .read_exact(&mut buf)
            .map_err(|e| truncated(e, path, "particle records", required, available))?;
        particles.push(ParticleRecord::decode(&buf));
    }

    log::debug!(
        "Read {} particles from {} (rank {}, step {})",
        particles.len(),
        path.display(),
        header.v0.rank,
        header.v0.nt
    );

    Ok(ParticleFile {
        boilerplate,
        header,
        particles,
    })
}
