//! Chunk container format for multi-file simulation outputs.
//!
//! A logical dataset (a snapshot, a group catalog, a merger tree) is split
//! across many chunk files. Each chunk is a little-endian binary container
//! holding named **categories** (particle types, catalog tables, tree node
//! tables), each with named, homogeneously-typed **fields** plus record-count
//! metadata. Chunks are memory-mapped on open; field payloads are decoded
//! only for the row ranges a caller actually asks for.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`dtype`] | [`DType`] element types, [`FieldArray`] typed result arrays |
//! | [`reader`] | [`ChunkFile`] memory-mapped reader, [`ChunkMeta`] parsed directory |
//! | [`writer`] | [`ChunkWriter`] builder for producing chunk files |
//! | [`errors`] | [`ChunkError`] and the crate [`Result`] alias |
//!
//! # Binary Format
//!
//! A chunk file has three sections: a 32-byte header (magic, version, chunk
//! index, dataset chunk count), a variable-length category/field directory
//! (names, dtypes, per-record shapes, payload extents, per-chunk and
//! dataset-level record counts), and the raw field payloads. Everything is
//! little-endian.

pub mod dtype;
pub mod errors;
pub mod reader;
pub mod writer;

pub use dtype::{DType, FieldArray, FieldData};
pub use errors::{ChunkError, Result};
pub use reader::{CategoryEntry, ChunkFile, ChunkHeader, ChunkMeta, FieldEntry};
pub use writer::ChunkWriter;

/// Magic bytes at the start of every chunk file.
pub const CHUNK_MAGIC: &[u8; 4] = b"CCHK";
/// Current format version.
pub const CHUNK_VERSION: u32 = 1;
/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 32;
/// Chunk file extension, without the leading dot.
pub const CHUNK_EXTENSION: &str = "cchk";
