//! Memory-mapped chunk file reader.
//!
//! A chunk file has three contiguous sections:
//!
//! 1. **Header** (32 bytes) — magic, version, chunk index, dataset chunk count
//! 2. **Directory** — per category: name, local and dataset-level record
//!    counts, and per field: name, dtype, per-record shape, payload extent
//! 3. **Payload** — raw little-endian field arrays
//!
//! Open a chunk with [`ChunkFile::open`]; the directory is parsed and
//! validated immediately, payload bytes are decoded only when a row range is
//! requested through [`ChunkFile::read_rows`]. [`ChunkFile::read_meta`]
//! parses the directory alone, for metadata-only passes over a dataset.

use crate::dtype::{record_elems, DType, FieldArray};
use crate::errors::{ChunkError, Result};
use crate::{CHUNK_MAGIC, CHUNK_VERSION, HEADER_SIZE};
use byteorder::{ByteOrder, LittleEndian};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Directory names longer than this indicate a corrupt file, not a real name.
const MAX_NAME_LEN: usize = 4096;

/// Metadata parsed from the fixed 32-byte header.
#[derive(Debug, Clone, Copy)]
pub struct ChunkHeader {
    /// This file's position within the dataset's chunk sequence.
    pub chunk_index: u32,
    /// Dataset-level attribute: total number of chunks in the dataset.
    pub chunk_count: u32,
    /// Number of categories listed in the directory.
    pub category_count: u32,
}

/// One field in the directory: name, element type, per-record shape, and the
/// absolute byte extent of its payload.
#[derive(Debug, Clone)]
pub struct FieldEntry {
    pub name: String,
    pub dtype: DType,
    pub shape: Vec<u32>,
    pub data_offset: u64,
    pub data_len: u64,
}

impl FieldEntry {
    /// Bytes occupied by one record of this field.
    ///
    /// Declared shapes come from untrusted directory bytes, so the product
    /// is checked rather than trusted to fit.
    pub fn record_bytes(&self) -> Result<u64> {
        let elems = record_elems(&self.shape)? as u64;
        elems
            .checked_mul(self.dtype.size() as u64)
            .ok_or_else(|| {
                ChunkError::InvalidFormat(format!(
                    "record size of field {:?} overflows u64",
                    self.name
                ))
            })
    }
}

/// One category in the directory: local and dataset-level record counts plus
/// its field list.
#[derive(Debug, Clone)]
pub struct CategoryEntry {
    pub name: String,
    /// Records of this category stored in this chunk.
    pub local_count: u64,
    /// Dataset-level attribute: records of this category across all chunks.
    pub total_count: u64,
    pub fields: Vec<FieldEntry>,
}

impl CategoryEntry {
    pub fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// Parsed header and directory of one chunk file.
#[derive(Debug, Clone)]
pub struct ChunkMeta {
    pub path: PathBuf,
    pub header: ChunkHeader,
    pub categories: Vec<CategoryEntry>,
}

impl ChunkMeta {
    pub fn category(&self, name: &str) -> Option<&CategoryEntry> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Records of `category` in this chunk; 0 when the category is absent.
    pub fn count(&self, category: &str) -> u64 {
        self.category(category).map_or(0, |c| c.local_count)
    }
}

/// Memory-mapped handle to one chunk file.
///
/// The underlying file stays mapped for the lifetime of this value. Row
/// reads decode only the intersecting byte range of the requested field.
pub struct ChunkFile {
    mmap: Mmap,
    meta: ChunkMeta,
}

impl ChunkFile {
    /// Open and memory-map a chunk file, parsing and validating its
    /// header and directory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file) }?;

        let header = parse_header(&mmap)?;
        let categories = parse_directory(&mmap, header.category_count)?;
        validate_extents(&mmap, &categories)?;

        Ok(Self {
            mmap,
            meta: ChunkMeta {
                path: path.to_path_buf(),
                header,
                categories,
            },
        })
    }

    /// Parse only the header and directory of a chunk file, releasing the
    /// map immediately. Used for the metadata pass when a dataset is opened.
    pub fn read_meta(path: impl AsRef<Path>) -> Result<ChunkMeta> {
        Ok(Self::open(path)?.into_meta())
    }

    pub fn meta(&self) -> &ChunkMeta {
        &self.meta
    }

    pub fn into_meta(self) -> ChunkMeta {
        self.meta
    }

    /// Total size of the memory-mapped file in bytes.
    pub fn file_size(&self) -> usize {
        self.mmap.len()
    }

    /// Decode rows `[start_row, start_row + rows)` of one field.
    ///
    /// Reads exactly the intersecting byte range of the payload; the rest of
    /// the file is never touched.
    pub fn read_rows(
        &self,
        category: &str,
        field: &str,
        start_row: u64,
        rows: u64,
    ) -> Result<FieldArray> {
        let cat = self.meta.category(category).ok_or_else(|| {
            ChunkError::InvalidFormat(format!(
                "category {:?} not present in chunk {:?}",
                category, self.meta.path
            ))
        })?;
        let entry = cat.field(field).ok_or_else(|| {
            ChunkError::InvalidFormat(format!(
                "field {:?} not present in category {:?} of chunk {:?}",
                field, category, self.meta.path
            ))
        })?;

        let overflow = || {
            ChunkError::InvalidFormat(format!(
                "row range {}+{} of {:?}/{:?} overflows u64",
                start_row, rows, category, field
            ))
        };
        let end_row = start_row.checked_add(rows).ok_or_else(overflow)?;
        if end_row > cat.local_count {
            return Err(ChunkError::InvalidFormat(format!(
                "rows {}..{} out of bounds for {} local records of {:?}/{:?}",
                start_row, end_row, cat.local_count, category, field
            )));
        }

        let record_bytes = entry.record_bytes()?;
        let offset = start_row
            .checked_mul(record_bytes)
            .and_then(|skip| entry.data_offset.checked_add(skip))
            .ok_or_else(overflow)?;
        let len = rows.checked_mul(record_bytes).ok_or_else(overflow)?;
        let end = offset.checked_add(len).ok_or_else(overflow)?;
        if end > self.mmap.len() as u64 {
            return Err(ChunkError::ShortRead {
                offset,
                len,
                file_size: self.mmap.len() as u64,
            });
        }

        FieldArray::from_le_bytes(
            entry.dtype,
            &entry.shape,
            &self.mmap[offset as usize..end as usize],
        )
    }
}

fn parse_header(mmap: &[u8]) -> Result<ChunkHeader> {
    if mmap.len() < HEADER_SIZE {
        return Err(ChunkError::Truncated {
            offset: 0,
            needed: HEADER_SIZE,
            actual: mmap.len(),
        });
    }

    let magic: [u8; 4] = mmap[0..4].try_into().unwrap();
    if &magic != CHUNK_MAGIC {
        return Err(ChunkError::BadMagic { found: magic });
    }

    let version = LittleEndian::read_u32(&mmap[4..8]);
    if version != CHUNK_VERSION {
        return Err(ChunkError::UnsupportedVersion {
            expected: CHUNK_VERSION,
            found: version,
        });
    }

    Ok(ChunkHeader {
        chunk_index: LittleEndian::read_u32(&mmap[8..12]),
        chunk_count: LittleEndian::read_u32(&mmap[12..16]),
        category_count: LittleEndian::read_u32(&mmap[16..20]),
    })
}

fn parse_directory(mmap: &[u8], category_count: u32) -> Result<Vec<CategoryEntry>> {
    let mut cur = Cursor {
        buf: mmap,
        pos: HEADER_SIZE,
    };
    let mut categories = Vec::with_capacity(category_count as usize);

    for _ in 0..category_count {
        let name = cur.name()?;
        if categories.iter().any(|c: &CategoryEntry| c.name == name) {
            return Err(ChunkError::InvalidFormat(format!(
                "duplicate category {:?} in directory",
                name
            )));
        }
        let local_count = cur.u64()?;
        let total_count = cur.u64()?;
        let field_count = cur.u32()?;

        let mut fields: Vec<FieldEntry> = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let fname = cur.name()?;
            if fields.iter().any(|f| f.name == fname) {
                return Err(ChunkError::InvalidFormat(format!(
                    "duplicate field {:?} in category {:?}",
                    fname, name
                )));
            }
            let dtype = DType::from_code(cur.u8()?)?;
            let rank = cur.u8()?;
            let mut shape = Vec::with_capacity(rank as usize);
            for _ in 0..rank {
                shape.push(cur.u32()?);
            }
            record_elems(&shape)?;
            fields.push(FieldEntry {
                name: fname,
                dtype,
                shape,
                data_offset: cur.u64()?,
                data_len: cur.u64()?,
            });
        }

        categories.push(CategoryEntry {
            name,
            local_count,
            total_count,
            fields,
        });
    }

    Ok(categories)
}

/// Check that every declared payload extent lies within the file and matches
/// the declared record count exactly.
fn validate_extents(mmap: &[u8], categories: &[CategoryEntry]) -> Result<()> {
    for cat in categories {
        for field in &cat.fields {
            let record_bytes = field.record_bytes()?;
            let expected = cat.local_count.checked_mul(record_bytes).ok_or_else(|| {
                ChunkError::InvalidFormat(format!(
                    "field {:?}/{:?}: {} records of {} bytes overflow u64",
                    cat.name, field.name, cat.local_count, record_bytes
                ))
            })?;
            if field.data_len != expected {
                return Err(ChunkError::InvalidFormat(format!(
                    "field {:?}/{:?} declares {} payload bytes, {} records of {}[{}] need {}",
                    cat.name,
                    field.name,
                    field.data_len,
                    cat.local_count,
                    field.dtype,
                    field
                        .shape
                        .iter()
                        .map(|d| d.to_string())
                        .collect::<Vec<_>>()
                        .join(","),
                    expected
                )));
            }
            let end = field
                .data_offset
                .checked_add(field.data_len)
                .ok_or_else(|| {
                    ChunkError::InvalidFormat(format!(
                        "payload extent of field {:?}/{:?} overflows u64",
                        cat.name, field.name
                    ))
                })?;
            if end > mmap.len() as u64 {
                return Err(ChunkError::ShortRead {
                    offset: field.data_offset,
                    len: field.data_len,
                    file_size: mmap.len() as u64,
                });
            }
        }
    }
    Ok(())
}

/// Bounds-checked little-endian reads over the mapped directory bytes.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(ChunkError::Truncated {
                offset: self.pos,
                needed: n,
                actual: self.buf.len(),
            });
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(8)?))
    }

    fn name(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        if len == 0 || len > MAX_NAME_LEN {
            return Err(ChunkError::InvalidFormat(format!(
                "directory name length {} out of range",
                len
            )));
        }
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| ChunkError::InvalidFormat("directory name is not UTF-8".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::FieldData;
    use crate::writer::ChunkWriter;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn f32s(shape: Vec<u32>, values: Vec<f32>) -> FieldArray {
        FieldArray::new(shape, FieldData::F32(values)).unwrap()
    }

    fn i64s(values: Vec<i64>) -> FieldArray {
        FieldArray::new(vec![], FieldData::I64(values)).unwrap()
    }

    fn write_test_chunk() -> NamedTempFile {
        let file = NamedTempFile::new().unwrap();
        ChunkWriter::new(0, 1)
            .category("parttype0", 4, 4)
            .field("Coordinates", f32s(vec![3], (0..12).map(|v| v as f32).collect()))
            .field("ParticleIDs", i64s(vec![10, 11, 12, 13]))
            .category("parttype1", 0, 0)
            .write(file.path())
            .unwrap();
        file
    }

    #[test]
    fn test_open_parses_header_and_directory() {
        let file = write_test_chunk();
        let chunk = ChunkFile::open(file.path()).unwrap();
        let meta = chunk.meta();

        assert_eq!(meta.header.chunk_index, 0);
        assert_eq!(meta.header.chunk_count, 1);
        assert_eq!(meta.header.category_count, 2);
        assert_eq!(meta.count("parttype0"), 4);
        assert_eq!(meta.count("parttype1"), 0);
        assert_eq!(meta.count("nonexistent"), 0);

        let cat = meta.category("parttype0").unwrap();
        assert_eq!(cat.total_count, 4);
        let coords = cat.field("Coordinates").unwrap();
        assert_eq!(coords.dtype, DType::F32);
        assert_eq!(coords.shape, vec![3]);
        assert_eq!(coords.data_len, 48);
    }

    #[test]
    fn test_read_rows_full_field() {
        let file = write_test_chunk();
        let chunk = ChunkFile::open(file.path()).unwrap();

        let ids = chunk.read_rows("parttype0", "ParticleIDs", 0, 4).unwrap();
        assert_eq!(ids.as_i64().unwrap(), &[10, 11, 12, 13]);
    }

    #[test]
    fn test_read_rows_sub_range() {
        let file = write_test_chunk();
        let chunk = ChunkFile::open(file.path()).unwrap();

        let coords = chunk.read_rows("parttype0", "Coordinates", 1, 2).unwrap();
        assert_eq!(coords.records(), 2);
        assert_eq!(coords.as_f32().unwrap(), &[3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_read_rows_empty_range() {
        let file = write_test_chunk();
        let chunk = ChunkFile::open(file.path()).unwrap();

        let coords = chunk.read_rows("parttype0", "Coordinates", 2, 0).unwrap();
        assert_eq!(coords.records(), 0);
        assert_eq!(coords.dtype(), DType::F32);
        assert_eq!(coords.shape(), &[3]);
    }

    #[test]
    fn test_read_rows_out_of_bounds() {
        let file = write_test_chunk();
        let chunk = ChunkFile::open(file.path()).unwrap();

        let result = chunk.read_rows("parttype0", "ParticleIDs", 3, 2);
        assert!(matches!(result, Err(ChunkError::InvalidFormat(_))));
    }

    #[test]
    fn test_read_rows_unknown_field() {
        let file = write_test_chunk();
        let chunk = ChunkFile::open(file.path()).unwrap();

        assert!(chunk.read_rows("parttype0", "Velocities", 0, 1).is_err());
        assert!(chunk.read_rows("parttype9", "Coordinates", 0, 1).is_err());
    }

    #[test]
    fn test_open_truncated_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 16]).unwrap();
        file.flush().unwrap();

        let result = ChunkFile::open(file.path());
        assert!(matches!(result, Err(ChunkError::Truncated { .. })));
    }

    #[test]
    fn test_open_bad_magic() {
        let mut file = NamedTempFile::new().unwrap();
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(b"XXXX");
        file.write_all(&buf).unwrap();
        file.flush().unwrap();

        let result = ChunkFile::open(file.path());
        assert!(matches!(result, Err(ChunkError::BadMagic { .. })));
    }

    #[test]
    fn test_open_bad_version() {
        let mut file = NamedTempFile::new().unwrap();
        let mut buf = vec![0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(CHUNK_MAGIC);
        buf[4..8].copy_from_slice(&99u32.to_le_bytes());
        file.write_all(&buf).unwrap();
        file.flush().unwrap();

        let result = ChunkFile::open(file.path());
        assert!(matches!(
            result,
            Err(ChunkError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn test_open_rejects_overflowing_record_count() {
        use byteorder::WriteBytesExt;

        // Handcrafted directory claiming 2^61 records of an 8-byte field;
        // the extent product overflows u64 and must be a structured error,
        // not a panic.
        let mut buf = Vec::new();
        buf.extend_from_slice(CHUNK_MAGIC);
        buf.write_u32::<LittleEndian>(CHUNK_VERSION).unwrap();
        buf.write_u32::<LittleEndian>(0).unwrap(); // chunk_index
        buf.write_u32::<LittleEndian>(1).unwrap(); // chunk_count
        buf.write_u32::<LittleEndian>(1).unwrap(); // category_count
        buf.extend_from_slice(&[0u8; 12]);

        buf.write_u16::<LittleEndian>(1).unwrap();
        buf.extend_from_slice(b"A");
        buf.write_u64::<LittleEndian>(1u64 << 61).unwrap(); // local_count
        buf.write_u64::<LittleEndian>(1u64 << 61).unwrap(); // total_count
        buf.write_u32::<LittleEndian>(1).unwrap(); // field_count
        buf.write_u16::<LittleEndian>(1).unwrap();
        buf.extend_from_slice(b"x");
        buf.write_u8(DType::F64.code()).unwrap();
        buf.write_u8(0).unwrap(); // rank: scalar records
        buf.write_u64::<LittleEndian>(HEADER_SIZE as u64).unwrap(); // data_offset
        buf.write_u64::<LittleEndian>(0).unwrap(); // data_len

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&buf).unwrap();
        file.flush().unwrap();

        let result = ChunkFile::open(file.path());
        assert!(matches!(result, Err(ChunkError::InvalidFormat(_))));
    }

    #[test]
    fn test_read_rows_rejects_overflowing_row_range() {
        let file = write_test_chunk();
        let chunk = ChunkFile::open(file.path()).unwrap();

        let result = chunk.read_rows("parttype0", "ParticleIDs", u64::MAX, 2);
        assert!(matches!(result, Err(ChunkError::InvalidFormat(_))));
    }

    #[test]
    fn test_open_truncated_payload() {
        let file = write_test_chunk();
        let full = std::fs::read(file.path()).unwrap();

        let mut short = NamedTempFile::new().unwrap();
        short.write_all(&full[..full.len() - 8]).unwrap();
        short.flush().unwrap();

        let result = ChunkFile::open(short.path());
        assert!(matches!(result, Err(ChunkError::ShortRead { .. })));
    }

    #[test]
    fn test_read_meta_matches_open() {
        let file = write_test_chunk();
        let meta = ChunkFile::read_meta(file.path()).unwrap();
        assert_eq!(meta.header.category_count, 2);
        assert_eq!(meta.count("parttype0"), 4);
    }
}
