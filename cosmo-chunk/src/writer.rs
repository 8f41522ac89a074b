//! Chunk file writer.
//!
//! [`ChunkWriter`] is a builder: declare categories with their local and
//! dataset-level record counts, attach field arrays, then [`write`] the file
//! in one pass. Payload offsets are laid out after the directory is sized,
//! so the file is written front to back with no seeking.
//!
//! The reader side never writes; this exists for catalog production tools
//! and test fixtures.
//!
//! [`write`]: ChunkWriter::write

use crate::dtype::FieldArray;
use crate::errors::{ChunkError, Result};
use crate::{CHUNK_MAGIC, CHUNK_VERSION, HEADER_SIZE};
use byteorder::{LittleEndian, WriteBytesExt};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

struct CategoryDraft {
    name: String,
    local_count: u64,
    total_count: u64,
    fields: Vec<(String, FieldArray)>,
}

/// Builder for one chunk file.
pub struct ChunkWriter {
    chunk_index: u32,
    chunk_count: u32,
    categories: Vec<CategoryDraft>,
}

impl ChunkWriter {
    /// Start a chunk at position `chunk_index` of a dataset with
    /// `chunk_count` chunks in total.
    pub fn new(chunk_index: u32, chunk_count: u32) -> Self {
        Self {
            chunk_index,
            chunk_count,
            categories: Vec::new(),
        }
    }

    /// Declare a category. `local_count` is the record count in this chunk,
    /// `total_count` the dataset-level total stored as an attribute.
    pub fn category(mut self, name: &str, local_count: u64, total_count: u64) -> Self {
        self.categories.push(CategoryDraft {
            name: name.to_string(),
            local_count,
            total_count,
            fields: Vec::new(),
        });
        self
    }

    /// Attach a field to the most recently declared category.
    ///
    /// # Panics
    /// Panics if no category has been declared yet; declare categories
    /// before their fields.
    pub fn field(mut self, name: &str, array: FieldArray) -> Self {
        let cat = self
            .categories
            .last_mut()
            .expect("ChunkWriter::field called before ChunkWriter::category");
        cat.fields.push((name.to_string(), array));
        self
    }

    /// Validate the draft and write the chunk file.
    pub fn write(self, path: impl AsRef<Path>) -> Result<()> {
        for cat in &self.categories {
            for (name, array) in &cat.fields {
                if array.records() as u64 != cat.local_count {
                    return Err(ChunkError::InvalidFormat(format!(
                        "field {:?}/{:?} holds {} records, category declares {}",
                        cat.name,
                        name,
                        array.records(),
                        cat.local_count
                    )));
                }
            }
        }

        let mut out = BufWriter::new(File::create(path)?);

        // Header
        out.write_all(CHUNK_MAGIC)?;
        out.write_u32::<LittleEndian>(CHUNK_VERSION)?;
        out.write_u32::<LittleEndian>(self.chunk_index)?;
        out.write_u32::<LittleEndian>(self.chunk_count)?;
        out.write_u32::<LittleEndian>(self.categories.len() as u32)?;
        out.write_all(&[0u8; 12])?;

        // Payloads start right after the directory, in directory order.
        let mut offset = (HEADER_SIZE + self.directory_size()) as u64;

        for cat in &self.categories {
            write_name(&mut out, &cat.name)?;
            out.write_u64::<LittleEndian>(cat.local_count)?;
            out.write_u64::<LittleEndian>(cat.total_count)?;
            out.write_u32::<LittleEndian>(cat.fields.len() as u32)?;

            for (name, array) in &cat.fields {
                write_name(&mut out, name)?;
                out.write_u8(array.dtype().code())?;
                out.write_u8(array.shape().len() as u8)?;
                for &dim in array.shape() {
                    out.write_u32::<LittleEndian>(dim)?;
                }
                let data_len = (array.data().len() * array.dtype().size()) as u64;
                out.write_u64::<LittleEndian>(offset)?;
                out.write_u64::<LittleEndian>(data_len)?;
                offset += data_len;
            }
        }

        for cat in &self.categories {
            for (_, array) in &cat.fields {
                out.write_all(&array.to_le_bytes())?;
            }
        }

        out.flush()?;
        Ok(())
    }

    fn directory_size(&self) -> usize {
        let mut size = 0;
        for cat in &self.categories {
            size += 2 + cat.name.len() + 8 + 8 + 4;
            for (name, array) in &cat.fields {
                size += 2 + name.len() + 1 + 1 + 4 * array.shape().len() + 8 + 8;
            }
        }
        size
    }
}

fn write_name(out: &mut impl Write, name: &str) -> Result<()> {
    out.write_u16::<LittleEndian>(name.len() as u16)?;
    out.write_all(name.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::{DType, FieldData};
    use crate::reader::ChunkFile;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_then_read_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let masses = FieldArray::new(vec![], FieldData::F64(vec![0.5, 1.5, 2.5])).unwrap();
        let pos = FieldArray::new(
            vec![3],
            FieldData::F32((0..9).map(|v| v as f32 * 0.1).collect()),
        )
        .unwrap();

        ChunkWriter::new(2, 5)
            .category("Subhalo", 3, 30)
            .field("SubhaloMass", masses.clone())
            .field("SubhaloPos", pos.clone())
            .write(file.path())
            .unwrap();

        let chunk = ChunkFile::open(file.path()).unwrap();
        assert_eq!(chunk.meta().header.chunk_index, 2);
        assert_eq!(chunk.meta().header.chunk_count, 5);

        let cat = chunk.meta().category("Subhalo").unwrap();
        assert_eq!(cat.local_count, 3);
        assert_eq!(cat.total_count, 30);

        assert_eq!(chunk.read_rows("Subhalo", "SubhaloMass", 0, 3).unwrap(), masses);
        assert_eq!(chunk.read_rows("Subhalo", "SubhaloPos", 0, 3).unwrap(), pos);
    }

    #[test]
    fn test_write_rejects_count_mismatch() {
        let file = NamedTempFile::new().unwrap();
        let short = FieldArray::new(vec![], FieldData::U32(vec![1, 2])).unwrap();

        let result = ChunkWriter::new(0, 1)
            .category("Group", 3, 3)
            .field("GroupNsubs", short)
            .write(file.path());
        assert!(matches!(result, Err(ChunkError::InvalidFormat(_))));
    }

    #[test]
    fn test_empty_category_writes_schema_only() {
        let file = NamedTempFile::new().unwrap();
        let empty = FieldArray::empty(DType::F32, &[3]);

        ChunkWriter::new(0, 1)
            .category("parttype4", 0, 120)
            .field("Coordinates", empty)
            .write(file.path())
            .unwrap();

        let chunk = ChunkFile::open(file.path()).unwrap();
        let cat = chunk.meta().category("parttype4").unwrap();
        assert_eq!(cat.local_count, 0);
        assert_eq!(cat.total_count, 120);
        assert_eq!(cat.field("Coordinates").unwrap().data_len, 0);
    }
}
