//! Offset-indexed reader for chunked simulation outputs.
//!
//! A simulation output — per-particle snapshot, halo/subhalo group catalog,
//! or merger tree — is one logical dataset physically scattered across
//! dozens to thousands of chunk files, with no file boundary aligned to any
//! entity boundary. This crate reconstructs contiguous, type-correct,
//! field-selectable arrays for any global index range or index list, opening
//! only the chunks that actually intersect the request.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`locate`] | [`DatasetKind`](locate::DatasetKind), chunk filename template, ordered chunk enumeration |
//! | [`offsets`] | [`OffsetTable`](offsets::OffsetTable): global index → (chunk, local offset) |
//! | [`schema`] | [`CategorySchema`](schema::CategorySchema): per-category field schemas, selection validation |
//! | [`subset`] | range and index-list assembly across chunks |
//! | [`dataset`] | [`Dataset`](dataset::Dataset) handle owning the derived index state |
//! | [`tree`] | [`TreeWalker`](tree::TreeWalker): principal-branch, subtree, and descendant walks |
//! | [`api`] | one-shot [`load_subset`](api::load_subset) / [`load_entity`](api::load_entity) / [`load_related`](api::load_related) |
//! | [`errors`] | [`SimError`] taxonomy |
//!
//! # Quick Start
//!
//! ```ignore
//! use cosmo_sim::{Dataset, DatasetKind};
//!
//! let snap = Dataset::open("/data/run_L35n270", DatasetKind::Snapshot, 99)?;
//! let gas = snap.read_range("parttype0", Some(&["Coordinates", "Masses"]), 1000, 1050)?;
//! assert_eq!(gas["Coordinates"].records(), 50);
//! ```
//!
//! Opening a dataset parses chunk metadata only; field payloads are read
//! per query, restricted to the byte ranges the query needs. An open
//! [`Dataset`] is immutable and can serve any number of concurrent queries.
//!
//! # Features
//!
//! - **`cli`** — Enables the `simquery` and `forge` binaries for inspecting
//!   datasets and generating synthetic ones from the command line.

pub mod api;
pub mod dataset;
pub mod errors;
pub mod locate;
pub mod offsets;
pub mod schema;
pub mod subset;
pub mod tree;

pub use api::{load_entity, load_related, load_subset};
pub use dataset::Dataset;
pub use errors::{Result, SimError};
pub use locate::{chunk_filename, DatasetKind};
pub use offsets::OffsetTable;
pub use schema::{CategorySchema, FieldSchema};
pub use tree::{NodeLinks, TreeLinks, TreeWalker};

pub use cosmo_chunk::{DType, FieldArray, FieldData};
