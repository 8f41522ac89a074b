//! Cumulative offset tables: global entity index → (chunk, local offset).
//!
//! Records of one category are scattered across chunks with no alignment
//! between file boundaries and entity boundaries. The offset table stores the
//! cumulative record count preceding each chunk, built from per-chunk count
//! metadata alone (no payload is touched). Lookup is a binary search.

use crate::errors::{Result, SimError};
use cosmo_chunk::ChunkMeta;

/// Cumulative per-chunk record counts for one category.
///
/// `cumulative` has one entry per chunk plus a final entry equal to the
/// dataset total, so `cumulative[i+1] - cumulative[i]` is chunk i's local
/// count. Built once when a dataset is opened and immutable thereafter.
#[derive(Debug, Clone)]
pub struct OffsetTable {
    category: String,
    cumulative: Vec<u64>,
}

impl OffsetTable {
    /// Build the table from parsed chunk metadata.
    ///
    /// Cross-checks the dataset-level total stored as an attribute in each
    /// contributing chunk against the cumulative sum; a disagreement means
    /// the chunk set does not belong to one consistent dataset.
    pub fn build(chunks: &[ChunkMeta], category: &str) -> Result<Self> {
        let mut cumulative = Vec::with_capacity(chunks.len() + 1);
        cumulative.push(0u64);
        let mut declared: Option<(u64, usize)> = None;

        for (pos, chunk) in chunks.iter().enumerate() {
            let count = chunk.count(category);
            cumulative.push(cumulative[pos] + count);

            if let Some(entry) = chunk.category(category) {
                match declared {
                    None => declared = Some((entry.total_count, pos)),
                    Some((total, _)) if total == entry.total_count => {}
                    Some((total, _)) => {
                        return Err(SimError::InconsistentDataset {
                            path: chunk.path.clone(),
                            reason: format!(
                                "category {:?} declares total {} here but {} elsewhere",
                                category, entry.total_count, total
                            ),
                        });
                    }
                }
            }
        }

        let sum = *cumulative.last().unwrap();
        if let Some((total, pos)) = declared {
            if total != sum {
                return Err(SimError::InconsistentDataset {
                    path: chunks[pos].path.clone(),
                    reason: format!(
                        "category {:?} declares total {} but chunk counts sum to {}",
                        category, total, sum
                    ),
                });
            }
        }

        Ok(Self {
            category: category.to_string(),
            cumulative,
        })
    }

    /// Total record count of the category across all chunks.
    pub fn total(&self) -> u64 {
        *self.cumulative.last().unwrap()
    }

    /// Number of chunks covered by the table.
    pub fn chunks(&self) -> usize {
        self.cumulative.len() - 1
    }

    /// Records of the category in chunk `pos`.
    pub fn count(&self, pos: usize) -> u64 {
        self.cumulative[pos + 1] - self.cumulative[pos]
    }

    /// Global index of chunk `pos`'s first record.
    pub fn start_of(&self, pos: usize) -> u64 {
        self.cumulative[pos]
    }

    /// Map a global index to `(chunk position, local offset)`.
    ///
    /// `global == total()` is the exclusive-upper-bound sentinel used by
    /// range queries; it resolves to no chunk and is rejected here, as is
    /// anything beyond it.
    pub fn locate(&self, global: u64) -> Result<(usize, u64)> {
        if global >= self.total() {
            return Err(SimError::IndexOutOfRange {
                category: self.category.clone(),
                index: global,
                total: self.total(),
            });
        }
        // Last cumulative entry <= global; zero-count chunks collapse to
        // empty spans and can never win.
        let pos = self.cumulative.partition_point(|&c| c <= global) - 1;
        Ok((pos, global - self.cumulative[pos]))
    }

    pub(crate) fn out_of_range(&self, index: u64) -> SimError {
        SimError::IndexOutOfRange {
            category: self.category.clone(),
            index,
            total: self.total(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmo_chunk::{ChunkFile, ChunkWriter, DType, FieldArray};
    use tempfile::TempDir;

    /// Chunk metadata for the given per-chunk counts of category "A",
    /// declaring the correct dataset total unless `declared` overrides it.
    fn metas(counts: &[u64], declared: Option<u64>) -> Vec<ChunkMeta> {
        let dir = TempDir::new().unwrap();
        let total = declared.unwrap_or_else(|| counts.iter().sum());
        counts
            .iter()
            .enumerate()
            .map(|(i, &count)| {
                let path = dir.path().join(format!("c{}.cchk", i));
                ChunkWriter::new(i as u32, counts.len() as u32)
                    .category("A", count, total)
                    .field(
                        "x",
                        FieldArray::zeroed(DType::F64, &[], count as usize),
                    )
                    .write(&path)
                    .unwrap();
                ChunkFile::read_meta(&path).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_offset_invariant() {
        let chunks = metas(&[40, 0, 60], None);
        let table = OffsetTable::build(&chunks, "A").unwrap();

        assert_eq!(table.total(), 100);
        assert_eq!(table.chunks(), 3);
        for (pos, &count) in [40u64, 0, 60].iter().enumerate() {
            assert_eq!(table.count(pos), count);
        }
    }

    #[test]
    fn test_locate_skips_empty_chunk() {
        let chunks = metas(&[40, 0, 60], None);
        let table = OffsetTable::build(&chunks, "A").unwrap();

        assert_eq!(table.locate(0).unwrap(), (0, 0));
        assert_eq!(table.locate(39).unwrap(), (0, 39));
        assert_eq!(table.locate(40).unwrap(), (2, 0));
        assert_eq!(table.locate(99).unwrap(), (2, 59));
    }

    #[test]
    fn test_locate_rejects_sentinel_and_beyond() {
        let chunks = metas(&[40, 0, 60], None);
        let table = OffsetTable::build(&chunks, "A").unwrap();

        for bad in [100u64, 101, u64::MAX] {
            assert!(matches!(
                table.locate(bad),
                Err(SimError::IndexOutOfRange {
                    index,
                    total: 100,
                    ..
                }) if index == bad
            ));
        }
    }

    #[test]
    fn test_absent_category_is_all_zero() {
        let chunks = metas(&[5, 5], None);
        let table = OffsetTable::build(&chunks, "B").unwrap();
        assert_eq!(table.total(), 0);
        assert!(table.locate(0).is_err());
    }

    #[test]
    fn test_declared_total_mismatch() {
        let chunks = metas(&[40, 0, 60], Some(90));
        let result = OffsetTable::build(&chunks, "A");
        assert!(matches!(
            result,
            Err(SimError::InconsistentDataset { .. })
        ));
    }

    #[test]
    fn test_locate_single_record_chunks() {
        let chunks = metas(&[1, 1, 1], None);
        let table = OffsetTable::build(&chunks, "A").unwrap();
        assert_eq!(table.locate(0).unwrap(), (0, 0));
        assert_eq!(table.locate(1).unwrap(), (1, 0));
        assert_eq!(table.locate(2).unwrap(), (2, 0));
    }
}
