//! Byte-layout tables for every binary block the decoders read.
//!
//! Each fixed-size block is described once, as a [`Schema`] listing
//! `name → offset → kind → count`. Decoders and encoders only ever address
//! bytes through these tables, so an offset error shows up as a failed
//! [`Schema::validate`] instead of a silently shifted field.
//!
//! All multi-byte values use the platform's native byte order, matching the
//! writer (the simulation dumps raw memory).

use byteorder::{ByteOrder, NativeEndian};
use thiserror::Error;

/// Primitive element type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    I8,
    I16,
    I32,
    F32,
    F64,
}

impl FieldKind {
    /// Width of a single element in bytes.
    pub const fn width(self) -> usize {
        match self {
            FieldKind::I8 => 1,
            FieldKind::I16 => 2,
            FieldKind::I32 | FieldKind::F32 => 4,
            FieldKind::F64 => 8,
        }
    }
}

/// One named field inside a fixed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Byte offset relative to the start of the block.
    pub offset: usize,
    pub kind: FieldKind,
    /// Number of consecutive elements.
    pub count: usize,
}

impl FieldSpec {
    const fn new(name: &'static str, offset: usize, kind: FieldKind, count: usize) -> Self {
        Self {
            name,
            offset,
            kind,
            count,
        }
    }

    /// Total byte length of the field.
    pub const fn len(&self) -> usize {
        self.kind.width() * self.count
    }

    /// Offset one past the last byte of the field.
    pub const fn end(&self) -> usize {
        self.offset + self.len()
    }
}

/// Inconsistencies detected in a layout table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{schema}: field '{field}' starts at {offset}, expected {expected}")]
    Gap {
        schema: &'static str,
        field: &'static str,
        offset: usize,
        expected: usize,
    },

    #[error("{schema}: fields cover {covered} bytes but block size is {size}")]
    SizeMismatch {
        schema: &'static str,
        covered: usize,
        size: usize,
    },

    #[error("{schema}: duplicate field '{field}'")]
    DuplicateField {
        schema: &'static str,
        field: &'static str,
    },
}

/// A fixed-size binary block.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub name: &'static str,
    pub size: usize,
    pub fields: &'static [FieldSpec],
}

impl Schema {
    /// Check that fields are contiguous from byte 0, uniquely named, and
    /// exactly cover `size` bytes.
    pub fn validate(&self) -> Result<(), SchemaError> {
        let mut expected = 0;
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(SchemaError::DuplicateField {
                    schema: self.name,
                    field: field.name,
                });
            }
            if field.offset != expected {
                return Err(SchemaError::Gap {
                    schema: self.name,
                    field: field.name,
                    offset: field.offset,
                    expected,
                });
            }
            expected = field.end();
        }
        if expected != self.size {
            return Err(SchemaError::SizeMismatch {
                schema: self.name,
                covered: expected,
                size: self.size,
            });
        }
        Ok(())
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Byte range of element `index` of field `name`, checked against `kind`.
    ///
    /// # Panics
    /// Panics if the field does not exist, has a different kind, or `index`
    /// is out of range. These are programming errors in the static tables.
    fn element(&self, name: &str, kind: FieldKind, index: usize) -> std::ops::Range<usize> {
        let field = match self.field(name) {
            Some(f) => f,
            None => panic!("{}: no field named '{}'", self.name, name),
        };
        assert_eq!(field.kind, kind, "{}: field '{}' has kind {:?}", self.name, name, field.kind);
        assert!(index < field.count, "{}: index {} out of range for '{}'", self.name, index, name);
        let start = field.offset + index * kind.width();
        start..start + kind.width()
    }

    /// View `bytes` (exactly `size` long) through this schema.
    pub fn record<'a>(&'a self, bytes: &'a [u8]) -> Record<'a> {
        assert_eq!(bytes.len(), self.size, "{}: record must be {} bytes", self.name, self.size);
        Record { schema: self, bytes }
    }

    /// Start a zero-filled buffer for encoding a block.
    pub fn builder(&self) -> RecordBuilder<'_> {
        RecordBuilder {
            schema: self,
            bytes: vec![0; self.size],
        }
    }
}

/// Read-only typed view over one block.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    schema: &'a Schema,
    bytes: &'a [u8],
}

impl Record<'_> {
    pub fn i8_at(&self, name: &str, index: usize) -> i8 {
        self.bytes[self.schema.element(name, FieldKind::I8, index).start] as i8
    }

    pub fn i16(&self, name: &str) -> i16 {
        NativeEndian::read_i16(&self.bytes[self.schema.element(name, FieldKind::I16, 0)])
    }

    pub fn i32(&self, name: &str) -> i32 {
        NativeEndian::read_i32(&self.bytes[self.schema.element(name, FieldKind::I32, 0)])
    }

    pub fn f32_at(&self, name: &str, index: usize) -> f32 {
        NativeEndian::read_f32(&self.bytes[self.schema.element(name, FieldKind::F32, index)])
    }

    pub fn f32(&self, name: &str) -> f32 {
        self.f32_at(name, 0)
    }

    pub fn f64(&self, name: &str) -> f64 {
        NativeEndian::read_f64(&self.bytes[self.schema.element(name, FieldKind::F64, 0)])
    }
}

/// Write-side counterpart of [`Record`].
#[derive(Debug, Clone)]
pub struct RecordBuilder<'s> {
    schema: &'s Schema,
    bytes: Vec<u8>,
}

impl RecordBuilder<'_> {
    pub fn set_i8_at(&mut self, name: &str, index: usize, value: i8) -> &mut Self {
        let range = self.schema.element(name, FieldKind::I8, index);
        self.bytes[range.start] = value as u8;
        self
    }

    pub fn set_i16(&mut self, name: &str, value: i16) -> &mut Self {
        let range = self.schema.element(name, FieldKind::I16, 0);
        NativeEndian::write_i16(&mut self.bytes[range], value);
        self
    }

    pub fn set_i32(&mut self, name: &str, value: i32) -> &mut Self {
        let range = self.schema.element(name, FieldKind::I32, 0);
        NativeEndian::write_i32(&mut self.bytes[range], value);
        self
    }

    pub fn set_f32_at(&mut self, name: &str, index: usize, value: f32) -> &mut Self {
        let range = self.schema.element(name, FieldKind::F32, index);
        NativeEndian::write_f32(&mut self.bytes[range], value);
        self
    }

    pub fn set_f32(&mut self, name: &str, value: f32) -> &mut Self {
        self.set_f32_at(name, 0, value)
    }

    pub fn set_f64(&mut self, name: &str, value: f64) -> &mut Self {
        let range = self.schema.element(name, FieldKind::F64, 0);
        NativeEndian::write_f64(&mut self.bytes[range], value);
        self
    }

    pub fn finish(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

use FieldKind::{F32, F64, I16, I32, I8};

pub const BOILERPLATE_SIZE: usize = 23;
pub const PARTICLE_V0_SIZE: usize = 80;
pub const PARTICLE_ARRAY_SIZE: usize = 12;
pub const PARTICLE_RECORD_SIZE: usize = 32;
pub const VDIST_HEADER_SIZE: usize = 36;

/// File boilerplate: size markers and endianness/float sentinels.
pub static BOILERPLATE: Schema = Schema {
    name: "boilerplate",
    size: BOILERPLATE_SIZE,
    fields: &[
        FieldSpec::new("size_markers", 0, I8, 5),
        FieldSpec::new("cafe", 5, I16, 1),
        FieldSpec::new("deadbeef", 7, I32, 1),
        FieldSpec::new("float_one", 11, F32, 1),
        FieldSpec::new("double_one", 15, F64, 1),
    ],
};

/// Version-0 dump header: step, grid and species metadata.
pub static PARTICLE_V0: Schema = Schema {
    name: "v0 header",
    size: PARTICLE_V0_SIZE,
    fields: &[
        FieldSpec::new("version", 0, I32, 1),
        FieldSpec::new("type", 4, I32, 1),
        FieldSpec::new("nt", 8, I32, 1),
        FieldSpec::new("nx", 12, I32, 1),
        FieldSpec::new("ny", 16, I32, 1),
        FieldSpec::new("nz", 20, I32, 1),
        FieldSpec::new("dt", 24, F32, 1),
        FieldSpec::new("dx", 28, F32, 1),
        FieldSpec::new("dy", 32, F32, 1),
        FieldSpec::new("dz", 36, F32, 1),
        FieldSpec::new("x0", 40, F32, 1),
        FieldSpec::new("y0", 44, F32, 1),
        FieldSpec::new("z0", 48, F32, 1),
        FieldSpec::new("cvac", 52, F32, 1),
        FieldSpec::new("eps0", 56, F32, 1),
        FieldSpec::new("damp", 60, F32, 1),
        FieldSpec::new("rank", 64, I32, 1),
        FieldSpec::new("ndom", 68, I32, 1),
        FieldSpec::new("spid", 72, I32, 1),
        FieldSpec::new("spqm", 76, F32, 1),
    ],
};

/// Array sub-header that precedes the particle records.
pub static PARTICLE_ARRAY: Schema = Schema {
    name: "particle array header",
    size: PARTICLE_ARRAY_SIZE,
    fields: &[
        FieldSpec::new("size", 0, I32, 1),
        FieldSpec::new("ndim", 4, I32, 1),
        FieldSpec::new("dim", 8, I32, 1),
    ],
};

/// One particle.
pub static PARTICLE_RECORD: Schema = Schema {
    name: "particle record",
    size: PARTICLE_RECORD_SIZE,
    fields: &[
        FieldSpec::new("dxyz", 0, F32, 3),
        FieldSpec::new("icell", 12, I32, 1),
        FieldSpec::new("u", 16, F32, 3),
        FieldSpec::new("q", 28, F32, 1),
    ],
};

/// Header shared by both velocity-distribution files.
pub static VDIST_HEADER: Schema = Schema {
    name: "vdist header",
    size: VDIST_HEADER_SIZE,
    fields: &[
        FieldSpec::new("center", 0, F32, 3),
        FieldSpec::new("sizes", 12, F32, 3),
        FieldSpec::new("vmin", 24, F32, 1),
        FieldSpec::new("vmax", 28, F32, 1),
        FieldSpec::new("nbins", 32, I32, 1),
    ],
};

/// Absolute offset of the v0 header in a particle file.
pub const PARTICLE_V0_OFFSET: u64 = BOILERPLATE_SIZE as u64;
/// Absolute offset of the array sub-header in a particle file.
pub const PARTICLE_ARRAY_OFFSET: u64 = PARTICLE_V0_OFFSET + PARTICLE_V0_SIZE as u64;
/// Absolute offset of the first particle record.
pub const PARTICLE_RECORDS_OFFSET: u64 = PARTICLE_ARRAY_OFFSET + PARTICLE_ARRAY_SIZE as u64;

/// Every static table, for consistency checks.
pub fn all_schemas() -> [&'static Schema; 5] {
    [&BOILERPLATE, &PARTICLE_V0, &PARTICLE_ARRAY, &PARTICLE_RECORD, &VDIST_HEADER]
}

/// A run of `f64` values inside a velocity-distribution file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArraySection {
    pub name: &'static str,
    /// Absolute byte offset in the file.
    pub offset: u64,
    /// Row-major shape; 1D sections use `(1, len)`.
    pub shape: (usize, usize),
}

impl ArraySection {
    /// Section at `offset`, or `None` when its extent does not fit in `u64`.
    pub fn checked(name: &'static str, offset: u64, shape: (usize, usize)) -> Option<Self> {
        let byte_len = shape
            .0
            .checked_mul(shape.1)?
            .checked_mul(F64.width())
            .and_then(|b| u64::try_from(b).ok())?;
        offset.checked_add(byte_len)?;
        Some(Self {
            name,
            offset,
            shape,
        })
    }

    pub fn len(&self) -> usize {
        self.shape.0 * self.shape.1
    }

    pub fn byte_len(&self) -> u64 {
        (self.len() * F64.width()) as u64
    }

    pub fn end(&self) -> u64 {
        self.offset + self.byte_len()
    }
}

/// Variable layout of a velocity-distribution file pair, derived from `nbins`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VdistLayout {
    pub nbins: usize,
    /// Sections of the 2D file, in file order.
    pub grid: Vec<ArraySection>,
    /// Sections of the 1D file that are decoded, in file order.
    pub profile: Vec<ArraySection>,
}

impl VdistLayout {
    /// Layout for `nbins` bins, or `None` when the file sizes it implies
    /// overflow.
    pub fn for_bins(nbins: usize) -> Option<Self> {
        let n = nbins;
        let n2 = n.checked_mul(2)?;
        let mut grid = Vec::with_capacity(6);
        let mut offset = VDIST_HEADER_SIZE as u64;
        for (name, shape) in [
            ("vbins_short", (1, n)),
            ("vbins_long", (1, n2)),
            ("para_perp", (n, n2)),
            ("xy", (n2, n2)),
            ("xz", (n2, n2)),
            ("yz", (n2, n2)),
        ] {
            let section = ArraySection::checked(name, offset, shape)?;
            offset = section.end();
            grid.push(section);
        }

        // The 1D file repeats the header and both velocity-bin arrays.
        let mut profile = Vec::with_capacity(2);
        let mut offset = ArraySection::checked("bins", VDIST_HEADER_SIZE as u64, (3, n))?.end();
        for (name, shape) in [("para", (1, n2)), ("perp", (1, n))] {
            let section = ArraySection::checked(name, offset, shape)?;
            offset = section.end();
            profile.push(section);
        }

        Some(Self {
            nbins,
            grid,
            profile,
        })
    }

    /// Minimum byte length of the 2D file.
    pub fn grid_len(&self) -> u64 {
        self.grid.last().map_or(VDIST_HEADER_SIZE as u64, |s| s.end())
    }

    /// Minimum byte length of the 1D file.
    pub fn profile_len(&self) -> u64 {
        self.profile.last().map_or(VDIST_HEADER_SIZE as u64, |s| s.end())
    }

    pub fn grid_section(&self, name: &str) -> Option<&ArraySection> {
        self.grid.iter().find(|s| s.name == name)
    }

    pub fn profile_section(&self, name: &str) -> Option<&ArraySection> {
        self.profile.iter().find(|s| s.name == name)
    }
}
