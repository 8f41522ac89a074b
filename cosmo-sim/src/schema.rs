//! Per-category field schemas and selection validation.
//!
//! The schema of a category is taken from the first chunk that holds records
//! of it, then checked for exact (dtype, shape) equality against every other
//! contributing chunk. Divergence across chunks is a hard error naming the
//! offending chunk; a requested field missing from the schema is likewise an
//! error, never an implicit all-null column.

use crate::errors::{Result, SimError};
use cosmo_chunk::{CategoryEntry, ChunkMeta, DType};
use std::fmt;

/// Declared dtype and per-record shape of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    pub dtype: DType,
    pub shape: Vec<u32>,
}

impl fmt::Display for FieldSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dtype)?;
        if !self.shape.is_empty() {
            let dims: Vec<String> = self.shape.iter().map(|d| d.to_string()).collect();
            write!(f, "[{}]", dims.join(","))?;
        }
        Ok(())
    }
}

/// Field schemas of one category, in on-disk directory order.
#[derive(Debug, Clone)]
pub struct CategorySchema {
    category: String,
    fields: Vec<(String, FieldSchema)>,
}

impl CategorySchema {
    /// Derive and validate the category's schema across all chunks.
    ///
    /// # Errors
    /// [`SimError::UnknownCategory`] when no chunk lists the category;
    /// [`SimError::SchemaMismatch`] when a contributing chunk diverges from
    /// the first contributing chunk (different dtype or shape, or a field
    /// present on one side only).
    pub fn collect(chunks: &[ChunkMeta], category: &str) -> Result<Self> {
        fn contributes<'a>(chunk: &'a ChunkMeta, category: &str) -> Option<&'a CategoryEntry> {
            chunk.category(category).filter(|c| c.local_count > 0)
        }

        // Baseline: first chunk with records, else first chunk listing the
        // category at all (an everywhere-empty category still has a schema).
        let baseline_pos = chunks
            .iter()
            .position(|c| contributes(c, category).is_some())
            .or_else(|| chunks.iter().position(|c| c.category(category).is_some()))
            .ok_or_else(|| SimError::UnknownCategory {
                category: category.to_string(),
            })?;
        let baseline = chunks[baseline_pos].category(category).unwrap();

        let fields: Vec<(String, FieldSchema)> = baseline
            .fields
            .iter()
            .map(|f| {
                (
                    f.name.clone(),
                    FieldSchema {
                        dtype: f.dtype,
                        shape: f.shape.clone(),
                    },
                )
            })
            .collect();

        let schema = Self {
            category: category.to_string(),
            fields,
        };

        for (pos, chunk) in chunks.iter().enumerate() {
            if pos == baseline_pos {
                continue;
            }
            let Some(entry) = contributes(chunk, category) else {
                continue;
            };
            schema.check_chunk(chunk, entry)?;
        }

        Ok(schema)
    }

    /// Exact-equality check of one contributing chunk against the schema.
    fn check_chunk(&self, chunk: &ChunkMeta, entry: &CategoryEntry) -> Result<()> {
        let mismatch = |field: &str, expected: String, actual: String| SimError::SchemaMismatch {
            category: self.category.clone(),
            field: field.to_string(),
            path: chunk.path.clone(),
            expected,
            actual,
        };

        for (name, declared) in &self.fields {
            match entry.field(name) {
                None => {
                    return Err(mismatch(name, declared.to_string(), "absent".to_string()));
                }
                Some(found) => {
                    if found.dtype != declared.dtype || found.shape != declared.shape {
                        let actual = FieldSchema {
                            dtype: found.dtype,
                            shape: found.shape.clone(),
                        };
                        return Err(mismatch(name, declared.to_string(), actual.to_string()));
                    }
                }
            }
        }

        for field in &entry.fields {
            if self.field(&field.name).is_none() {
                let actual = FieldSchema {
                    dtype: field.dtype,
                    shape: field.shape.clone(),
                };
                return Err(mismatch(&field.name, "absent".to_string(), actual.to_string()));
            }
        }

        Ok(())
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolve a field selection against the schema. `None` selects every
    /// field, in on-disk order.
    pub fn resolve(&self, requested: Option<&[&str]>) -> Result<Vec<String>> {
        match requested {
            None => Ok(self.field_names().map(str::to_string).collect()),
            Some(names) => names
                .iter()
                .map(|&name| {
                    if self.field(name).is_some() {
                        Ok(name.to_string())
                    } else {
                        Err(SimError::MissingField {
                            category: self.category.clone(),
                            field: name.to_string(),
                        })
                    }
                })
                .collect(),
        }
    }
}
