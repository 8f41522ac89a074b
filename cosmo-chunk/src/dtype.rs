//! Element types and typed result arrays.
//!
//! Every field in a chunk stores records of one [`DType`] with a fixed
//! per-record shape. Reads materialize into a [`FieldArray`]: one contiguous
//! typed vector plus that shape. The set of dtypes is closed; an unknown
//! on-disk code is a hard error, never coerced.

use crate::errors::{ChunkError, Result};
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// Element type of a field, as encoded on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DType {
    I32 = 1,
    I64 = 2,
    U32 = 3,
    U64 = 4,
    F32 = 5,
    F64 = 6,
}

impl DType {
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            1 => Ok(Self::I32),
            2 => Ok(Self::I64),
            3 => Ok(Self::U32),
            4 => Ok(Self::U64),
            5 => Ok(Self::F32),
            6 => Ok(Self::F64),
            _ => Err(ChunkError::UnknownDType(code)),
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Size of one element in bytes.
    pub fn size(self) -> usize {
        match self {
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        write!(f, "{}", name)
    }
}

/// Typed backing storage of a [`FieldArray`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldData {
    I32(Vec<i32>),
    I64(Vec<i64>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl FieldData {
    pub fn dtype(&self) -> DType {
        match self {
            Self::I32(_) => DType::I32,
            Self::I64(_) => DType::I64,
            Self::U32(_) => DType::U32,
            Self::U64(_) => DType::U64,
            Self::F32(_) => DType::F32,
            Self::F64(_) => DType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::I32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::U64(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn zeroed(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::I32 => Self::I32(vec![0; len]),
            DType::I64 => Self::I64(vec![0; len]),
            DType::U32 => Self::U32(vec![0; len]),
            DType::U64 => Self::U64(vec![0; len]),
            DType::F32 => Self::F32(vec![0.0; len]),
            DType::F64 => Self::F64(vec![0.0; len]),
        }
    }

    fn with_capacity(dtype: DType, len: usize) -> Self {
        match dtype {
            DType::I32 => Self::I32(Vec::with_capacity(len)),
            DType::I64 => Self::I64(Vec::with_capacity(len)),
            DType::U32 => Self::U32(Vec::with_capacity(len)),
            DType::U64 => Self::U64(Vec::with_capacity(len)),
            DType::F32 => Self::F32(Vec::with_capacity(len)),
            DType::F64 => Self::F64(Vec::with_capacity(len)),
        }
    }
}

/// A contiguous, entity-major array of records for one field.
///
/// `shape` is the per-record shape: empty for scalar records, `[3]` for a
/// 3-vector per record, and so on. The element count of `data` is always
/// `records × record_elems`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldArray {
    shape: Vec<u32>,
    data: FieldData,
}

impl FieldArray {
    /// Wrap typed data with a per-record shape.
    ///
    /// Fails if the element count is not a whole number of records.
    pub fn new(shape: Vec<u32>, data: FieldData) -> Result<Self> {
        let elems = record_elems(&shape)?;
        if data.len() % elems != 0 {
            return Err(ChunkError::InvalidFormat(format!(
                "{} elements do not divide into records of shape {:?}",
                data.len(),
                shape
            )));
        }
        Ok(Self { shape, data })
    }

    /// An empty array of the given dtype and shape.
    pub fn empty(dtype: DType, shape: &[u32]) -> Self {
        Self {
            shape: shape.to_vec(),
            data: FieldData::with_capacity(dtype, 0),
        }
    }

    /// A zero-filled array holding `records` records.
    pub fn zeroed(dtype: DType, shape: &[u32], records: usize) -> Self {
        let elems = record_elems(shape).unwrap_or(1);
        Self {
            shape: shape.to_vec(),
            data: FieldData::zeroed(dtype, records * elems),
        }
    }

    /// An empty array with capacity reserved for `records` records.
    pub fn with_capacity(dtype: DType, shape: &[u32], records: usize) -> Self {
        let elems = record_elems(shape).unwrap_or(1);
        Self {
            shape: shape.to_vec(),
            data: FieldData::with_capacity(dtype, records * elems),
        }
    }

    /// Decode a little-endian byte slice into a typed array.
    pub fn from_le_bytes(dtype: DType, shape: &[u32], bytes: &[u8]) -> Result<Self> {
        let size = dtype.size();
        if bytes.len() % size != 0 {
            return Err(ChunkError::InvalidFormat(format!(
                "payload of {} bytes is not a multiple of element size {}",
                bytes.len(),
                size
            )));
        }
        let n = bytes.len() / size;
        let data = match dtype {
            DType::I32 => {
                let mut v = vec![0i32; n];
                LittleEndian::read_i32_into(bytes, &mut v);
                FieldData::I32(v)
            }
            DType::I64 => {
                let mut v = vec![0i64; n];
                LittleEndian::read_i64_into(bytes, &mut v);
                FieldData::I64(v)
            }
            DType::U32 => {
                let mut v = vec![0u32; n];
                LittleEndian::read_u32_into(bytes, &mut v);
                FieldData::U32(v)
            }
            DType::U64 => {
                let mut v = vec![0u64; n];
                LittleEndian::read_u64_into(bytes, &mut v);
                FieldData::U64(v)
            }
            DType::F32 => {
                let mut v = vec![0.0f32; n];
                LittleEndian::read_f32_into(bytes, &mut v);
                FieldData::F32(v)
            }
            DType::F64 => {
                let mut v = vec![0.0f64; n];
                LittleEndian::read_f64_into(bytes, &mut v);
                FieldData::F64(v)
            }
        };
        Self::new(shape.to_vec(), data)
    }

    /// Encode the array as little-endian bytes, the on-disk payload layout.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.data.len() * self.dtype().size()];
        match &self.data {
            FieldData::I32(v) => LittleEndian::write_i32_into(v, &mut buf),
            FieldData::I64(v) => LittleEndian::write_i64_into(v, &mut buf),
            FieldData::U32(v) => LittleEndian::write_u32_into(v, &mut buf),
            FieldData::U64(v) => LittleEndian::write_u64_into(v, &mut buf),
            FieldData::F32(v) => LittleEndian::write_f32_into(v, &mut buf),
            FieldData::F64(v) => LittleEndian::write_f64_into(v, &mut buf),
        }
        buf
    }

    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Per-record shape. Empty for scalar records.
    pub fn shape(&self) -> &[u32] {
        &self.shape
    }

    /// Elements per record (product of the shape dims, 1 for scalars).
    pub fn record_elems(&self) -> usize {
        record_elems(&self.shape).unwrap_or(1)
    }

    /// Number of records.
    pub fn records(&self) -> usize {
        self.data.len() / self.record_elems()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &FieldData {
        &self.data
    }

    /// Append all records from `other`.
    ///
    /// # Panics
    /// Panics if the dtypes differ; callers must have validated the schema.
    pub fn append(&mut self, other: &FieldArray) {
        match (&mut self.data, &other.data) {
            (FieldData::I32(a), FieldData::I32(b)) => a.extend_from_slice(b),
            (FieldData::I64(a), FieldData::I64(b)) => a.extend_from_slice(b),
            (FieldData::U32(a), FieldData::U32(b)) => a.extend_from_slice(b),
            (FieldData::U64(a), FieldData::U64(b)) => a.extend_from_slice(b),
            (FieldData::F32(a), FieldData::F32(b)) => a.extend_from_slice(b),
            (FieldData::F64(a), FieldData::F64(b)) => a.extend_from_slice(b),
            _ => panic!("dtype mismatch in FieldArray::append"),
        }
    }

    /// Copy record `src_rec` of `src` into record `dst_rec` of `self`.
    ///
    /// # Panics
    /// Panics if the dtypes differ or either record index is out of bounds;
    /// callers must have validated the schema and lengths.
    pub fn set_record(&mut self, dst_rec: usize, src: &FieldArray, src_rec: usize) {
        let elems = self.record_elems();
        let d = dst_rec * elems;
        let s = src_rec * elems;
        match (&mut self.data, &src.data) {
            (FieldData::I32(a), FieldData::I32(b)) => {
                a[d..d + elems].copy_from_slice(&b[s..s + elems])
            }
            (FieldData::I64(a), FieldData::I64(b)) => {
                a[d..d + elems].copy_from_slice(&b[s..s + elems])
            }
            (FieldData::U32(a), FieldData::U32(b)) => {
                a[d..d + elems].copy_from_slice(&b[s..s + elems])
            }
            (FieldData::U64(a), FieldData::U64(b)) => {
                a[d..d + elems].copy_from_slice(&b[s..s + elems])
            }
            (FieldData::F32(a), FieldData::F32(b)) => {
                a[d..d + elems].copy_from_slice(&b[s..s + elems])
            }
            (FieldData::F64(a), FieldData::F64(b)) => {
                a[d..d + elems].copy_from_slice(&b[s..s + elems])
            }
            _ => panic!("dtype mismatch in FieldArray::set_record"),
        }
    }

    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.data {
            FieldData::I32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&[i64]> {
        match &self.data {
            FieldData::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<&[u32]> {
        match &self.data {
            FieldData::U32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<&[u64]> {
        match &self.data {
            FieldData::U64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<&[f32]> {
        match &self.data {
            FieldData::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.data {
            FieldData::F64(v) => Some(v),
            _ => None,
        }
    }
}

/// Elements per record for a per-record shape. Zero dims are invalid, as is
/// a dim product too large to count.
pub fn record_elems(shape: &[u32]) -> Result<usize> {
    let mut elems = 1usize;
    for &dim in shape {
        if dim == 0 {
            return Err(ChunkError::InvalidFormat(
                "zero dimension in field shape".into(),
            ));
        }
        elems = elems.checked_mul(dim as usize).ok_or_else(|| {
            ChunkError::InvalidFormat(format!(
                "field shape {:?} element count overflows",
                shape
            ))
        })?;
    }
    Ok(elems)
}
