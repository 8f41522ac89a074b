//! Open dataset handles.
//!
//! [`Dataset::open`] locates the chunk files of one `(kind, number)` dataset,
//! parses every chunk's header and directory once (metadata only — no field
//! payload is read), and builds the per-category offset tables and schemas.
//! All of that derived state is immutable for the handle's lifetime and safe
//! to share across concurrent queries. Payload reads re-open exactly the
//! chunk files a query touches; no file handles are held between calls.

use crate::errors::{Result, SimError};
use crate::locate::{locate, DatasetKind};
use crate::offsets::OffsetTable;
use crate::schema::CategorySchema;
use crate::subset;
use cosmo_chunk::{ChunkFile, ChunkMeta, FieldArray};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

struct CategoryIndex {
    name: String,
    offsets: OffsetTable,
    schema: CategorySchema,
}

/// An open, read-only dataset: chunk metadata plus the offset tables and
/// field schemas derived from it.
pub struct Dataset {
    base: PathBuf,
    kind: DatasetKind,
    number: u32,
    chunks: Vec<ChunkMeta>,
    categories: Vec<CategoryIndex>,
}

impl Dataset {
    /// Open dataset `(kind, number)` under `base`.
    ///
    /// Validates that the chunk sequence is complete, that every chunk's
    /// self-declared index and chunk count agree with what was found on
    /// disk, and that every category's schema and declared totals are
    /// consistent across chunks.
    pub fn open(base: impl AsRef<Path>, kind: DatasetKind, number: u32) -> Result<Self> {
        let base = base.as_ref();
        let paths = locate(base, kind, number)?;

        let mut chunks = Vec::with_capacity(paths.len());
        for (pos, path) in paths.iter().enumerate() {
            let meta =
                ChunkFile::read_meta(path).map_err(|e| SimError::chunk_io(path, e))?;
            if meta.header.chunk_index != pos as u32 {
                return Err(SimError::InconsistentDataset {
                    path: path.clone(),
                    reason: format!(
                        "file is chunk {} by name but declares index {}",
                        pos, meta.header.chunk_index
                    ),
                });
            }
            if meta.header.chunk_count != paths.len() as u32 {
                return Err(SimError::InconsistentDataset {
                    path: path.clone(),
                    reason: format!(
                        "chunk declares a {}-chunk dataset but {} chunks were found",
                        meta.header.chunk_count,
                        paths.len()
                    ),
                });
            }
            chunks.push(meta);
        }

        // Category names in first-seen chunk order.
        let mut names: Vec<String> = Vec::new();
        for chunk in &chunks {
            for cat in &chunk.categories {
                if !names.contains(&cat.name) {
                    names.push(cat.name.clone());
                }
            }
        }

        let mut categories = Vec::with_capacity(names.len());
        for name in names {
            categories.push(CategoryIndex {
                offsets: OffsetTable::build(&chunks, &name)?,
                schema: CategorySchema::collect(&chunks, &name)?,
                name,
            });
        }

        Ok(Self {
            base: base.to_path_buf(),
            kind,
            number,
            chunks,
            categories,
        })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Category names, in first-seen chunk order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    /// Total record count of a category across all chunks.
    pub fn total_count(&self, category: &str) -> Result<u64> {
        Ok(self.index(category)?.offsets.total())
    }

    pub fn schema(&self, category: &str) -> Result<&CategorySchema> {
        Ok(&self.index(category)?.schema)
    }

    pub fn offsets(&self, category: &str) -> Result<&OffsetTable> {
        Ok(&self.index(category)?.offsets)
    }

    /// Read global index range `[start, end)` of a category.
    ///
    /// `fields = None` selects every field in the category's schema. `end`
    /// may equal the category total (exclusive upper bound).
    pub fn read_range(
        &self,
        category: &str,
        fields: Option<&[&str]>,
        start: u64,
        end: u64,
    ) -> Result<HashMap<String, FieldArray>> {
        let index = self.index(category)?;
        subset::read_range(&self.chunks, &index.offsets, &index.schema, fields, start, end)
    }

    /// Read an explicit list of global indices, in the caller's order.
    pub fn read_by_indices(
        &self,
        category: &str,
        fields: Option<&[&str]>,
        indices: &[u64],
    ) -> Result<HashMap<String, FieldArray>> {
        let index = self.index(category)?;
        subset::read_by_indices(&self.chunks, &index.offsets, &index.schema, fields, indices)
    }

    /// Read a whole category.
    pub fn read_all(
        &self,
        category: &str,
        fields: Option<&[&str]>,
    ) -> Result<HashMap<String, FieldArray>> {
        let total = self.total_count(category)?;
        self.read_range(category, fields, 0, total)
    }

    /// Read a single record.
    pub fn read_one(
        &self,
        category: &str,
        fields: Option<&[&str]>,
        index: u64,
    ) -> Result<HashMap<String, FieldArray>> {
        let index_check = self.index(category)?;
        if index >= index_check.offsets.total() {
            return Err(index_check.offsets.out_of_range(index));
        }
        self.read_range(category, fields, index, index + 1)
    }

    fn index(&self, category: &str) -> Result<&CategoryIndex> {
        self.categories
            .iter()
            .find(|c| c.name == category)
            .ok_or_else(|| SimError::UnknownCategory {
                category: category.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::chunk_filename;
    use cosmo_chunk::{ChunkWriter, FieldArray, FieldData};
    use tempfile::TempDir;

    fn write_snapshot(dir: &TempDir, counts: &[u64]) {
        let total: u64 = counts.iter().sum();
        let mut global = 0u64;
        for (i, &count) in counts.iter().enumerate() {
            let ids: Vec<u64> = (global..global + count).collect();
            global += count;
            let path = dir
                .path()
                .join(chunk_filename(DatasetKind::Snapshot, 42, i as u32));
            ChunkWriter::new(i as u32, counts.len() as u32)
                .category("parttype1", count, total)
                .field(
                    "ParticleIDs",
                    FieldArray::new(vec![], FieldData::U64(ids)).unwrap(),
                )
                .write(&path)
                .unwrap();
        }
    }

    #[test]
    fn test_open_builds_tables_for_all_categories() {
        let dir = TempDir::new().unwrap();
        write_snapshot(&dir, &[10, 20, 5]);

        let ds = Dataset::open(dir.path(), DatasetKind::Snapshot, 42).unwrap();
        assert_eq!(ds.chunk_count(), 3);
        assert_eq!(ds.categories().collect::<Vec<_>>(), vec!["parttype1"]);
        assert_eq!(ds.total_count("parttype1").unwrap(), 35);
        assert_eq!(ds.schema("parttype1").unwrap().len(), 1);
    }

    #[test]
    fn test_open_rejects_header_position_mismatch() {
        let dir = TempDir::new().unwrap();
        // File named chunk 0 but declaring itself chunk 3.
        let path = dir
            .path()
            .join(chunk_filename(DatasetKind::Snapshot, 42, 0));
        ChunkWriter::new(3, 1)
            .category("parttype1", 0, 0)
            .write(&path)
            .unwrap();

        let result = Dataset::open(dir.path(), DatasetKind::Snapshot, 42);
        assert!(matches!(
            result,
            Err(SimError::InconsistentDataset { .. })
        ));
    }

    #[test]
    fn test_open_rejects_chunk_count_mismatch() {
        let dir = TempDir::new().unwrap();
        for i in 0..2u32 {
            let path = dir
                .path()
                .join(chunk_filename(DatasetKind::Snapshot, 42, i));
            // Each chunk claims the dataset has 5 chunks; only 2 exist.
            ChunkWriter::new(i, 5)
                .category("parttype1", 1, 2)
                .field(
                    "ParticleIDs",
                    FieldArray::new(vec![], FieldData::U64(vec![i as u64])).unwrap(),
                )
                .write(&path)
                .unwrap();
        }

        let result = Dataset::open(dir.path(), DatasetKind::Snapshot, 42);
        assert!(matches!(
            result,
            Err(SimError::InconsistentDataset { .. })
        ));
    }

    #[test]
    fn test_read_one_and_range_agree() {
        let dir = TempDir::new().unwrap();
        write_snapshot(&dir, &[10, 20, 5]);
        let ds = Dataset::open(dir.path(), DatasetKind::Snapshot, 42).unwrap();

        let one = ds.read_one("parttype1", None, 12).unwrap();
        assert_eq!(one["ParticleIDs"].as_u64().unwrap(), &[12]);

        let out_of_range = ds.read_one("parttype1", None, 35);
        assert!(matches!(
            out_of_range,
            Err(SimError::IndexOutOfRange { index: 35, .. })
        ));
    }

    #[test]
    fn test_unknown_category() {
        let dir = TempDir::new().unwrap();
        write_snapshot(&dir, &[4]);
        let ds = Dataset::open(dir.path(), DatasetKind::Snapshot, 42).unwrap();

        assert!(matches!(
            ds.read_all("parttype9", None),
            Err(SimError::UnknownCategory { .. })
        ));
    }
}
