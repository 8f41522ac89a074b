//! Merger-tree traversal over the chunk/offset substrate.
//!
//! Tree nodes are ordinary entities whose pointer fields (descendant,
//! first-progenitor, next-progenitor) hold Global Indices into the same
//! dataset, with `-1` as the "no link" sentinel. The tree is an arena: links
//! are integers, traversal is iterative with an explicit stack and visited
//! set, and a revisited index is reported as [`SimError::CyclicTree`] instead
//! of looping.
//!
//! Two on-disk encodings share one walking algorithm. The [`TreeLinks`]
//! adapter — selected from the dataset kind when the walker is built — only
//! names the node category and its three pointer fields; nothing else in the
//! walker branches on the format.
//!
//! Pointer chasing fetches just the three pointer fields per step through
//! the subset assembler. Payloads for a walked node set are fetched in one
//! batched [`TreeWalker::load_nodes`] call, not one read per node.

use crate::dataset::Dataset;
use crate::errors::{Result, SimError};
use crate::locate::DatasetKind;
use cosmo_chunk::FieldArray;
use std::collections::{HashMap, HashSet};

/// Format adapter: where the link structure of a tree encoding lives.
pub trait TreeLinks: Sync {
    /// Category holding the tree nodes.
    fn category(&self) -> &'static str;
    /// Field of the descendant link.
    fn descendant(&self) -> &'static str;
    /// Field of the first-progenitor link.
    fn first_progenitor(&self) -> &'static str;
    /// Field of the next-progenitor (sibling) link.
    fn next_progenitor(&self) -> &'static str;
}

/// Pointer-table tree encoding: i64 links on category `Node`.
pub struct PointerTableLinks;

impl TreeLinks for PointerTableLinks {
    fn category(&self) -> &'static str {
        "Node"
    }
    fn descendant(&self) -> &'static str {
        "DescendantIndex"
    }
    fn first_progenitor(&self) -> &'static str {
        "FirstProgenitorIndex"
    }
    fn next_progenitor(&self) -> &'static str {
        "NextProgenitorIndex"
    }
}

/// Fixed-schema legacy tree encoding: i32 links on category `Halo`.
pub struct LegacyLinks;

impl TreeLinks for LegacyLinks {
    fn category(&self) -> &'static str {
        "Halo"
    }
    fn descendant(&self) -> &'static str {
        "Descendant"
    }
    fn first_progenitor(&self) -> &'static str {
        "FirstProgenitor"
    }
    fn next_progenitor(&self) -> &'static str {
        "NextProgenitor"
    }
}

/// The adapter for a tree dataset kind, `None` for non-tree kinds.
pub fn links_for(kind: DatasetKind) -> Option<&'static dyn TreeLinks> {
    match kind {
        DatasetKind::MergerTree => Some(&PointerTableLinks),
        DatasetKind::LegacyTree => Some(&LegacyLinks),
        DatasetKind::Snapshot | DatasetKind::GroupCatalog => None,
    }
}

/// Decoded links of one node. `None` is the on-disk `-1` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLinks {
    pub descendant: Option<u64>,
    pub first_progenitor: Option<u64>,
    pub next_progenitor: Option<u64>,
}

/// Traversal handle over one open tree dataset.
pub struct TreeWalker<'a> {
    dataset: &'a Dataset,
    links: &'static dyn TreeLinks,
}

impl<'a> TreeWalker<'a> {
    /// Build a walker for an open tree dataset.
    ///
    /// # Errors
    /// [`SimError::NotATree`] when the dataset kind carries no tree
    /// structure.
    pub fn new(dataset: &'a Dataset) -> Result<Self> {
        let links = links_for(dataset.kind()).ok_or(SimError::NotATree {
            kind: dataset.kind(),
        })?;
        Ok(Self { dataset, links })
    }

    /// Number of nodes in the tree dataset.
    pub fn node_count(&self) -> Result<u64> {
        self.dataset.total_count(self.links.category())
    }

    /// Fetch and decode the three pointer fields of one node.
    pub fn node_links(&self, index: u64) -> Result<NodeLinks> {
        let fields = [
            self.links.descendant(),
            self.links.first_progenitor(),
            self.links.next_progenitor(),
        ];
        let arrays =
            self.dataset
                .read_by_indices(self.links.category(), Some(&fields), &[index])?;
        let total = self.node_count()?;

        let decode = |field: &str| -> Result<Option<u64>> {
            self.decode_link(&arrays[field], total)
        };
        Ok(NodeLinks {
            descendant: decode(fields[0])?,
            first_progenitor: decode(fields[1])?,
            next_progenitor: decode(fields[2])?,
        })
    }

    /// The principal branch: `start`, then its first progenitor, and so on
    /// until the sentinel. Lazy; yields indices or the first error.
    pub fn principal_branch(&self, start: u64) -> LinkChain<'_, 'a> {
        LinkChain::new(self, start, |links| links.first_progenitor)
    }

    /// The descendant chain: `start`, then its descendant, and so on until
    /// the sentinel. Lazy.
    pub fn descendant_chain(&self, start: u64) -> LinkChain<'_, 'a> {
        LinkChain::new(self, start, |links| links.descendant)
    }

    /// The full subtree rooted at `start`, depth-first over
    /// first-progenitor then next-progenitor links. The start node's own
    /// next-progenitor is a sibling, not part of the subtree, and is not
    /// followed. Lazy.
    pub fn full_subtree(&self, start: u64) -> Subtree<'_, 'a> {
        Subtree {
            walker: self,
            start,
            stack: vec![start],
            visited: HashSet::new(),
        }
    }

    /// Batched payload fetch for a walked node set, in the given order.
    /// `fields = None` selects every field of the node category.
    pub fn load_nodes(
        &self,
        indices: &[u64],
        fields: Option<&[&str]>,
    ) -> Result<HashMap<String, FieldArray>> {
        self.dataset
            .read_by_indices(self.links.category(), fields, indices)
    }

    /// Walk the principal branch of `start` and load `fields` for it.
    pub fn load_principal_branch(
        &self,
        start: u64,
        fields: Option<&[&str]>,
    ) -> Result<HashMap<String, FieldArray>> {
        let nodes: Vec<u64> = self.principal_branch(start).collect::<Result<_>>()?;
        self.load_nodes(&nodes, fields)
    }

    /// Walk the full subtree of `start` and load `fields` for it.
    pub fn load_full_subtree(
        &self,
        start: u64,
        fields: Option<&[&str]>,
    ) -> Result<HashMap<String, FieldArray>> {
        let nodes: Vec<u64> = self.full_subtree(start).collect::<Result<_>>()?;
        self.load_nodes(&nodes, fields)
    }

    /// Walk the descendant chain of `start` and load `fields` for it.
    pub fn load_descendant_chain(
        &self,
        start: u64,
        fields: Option<&[&str]>,
    ) -> Result<HashMap<String, FieldArray>> {
        let nodes: Vec<u64> = self.descendant_chain(start).collect::<Result<_>>()?;
        self.load_nodes(&nodes, fields)
    }

    /// Decode one pointer value: negative is the sentinel, anything at or
    /// beyond the node total is corrupt link structure.
    fn decode_link(&self, array: &FieldArray, total: u64) -> Result<Option<u64>> {
        let raw: i64 = if let Some(v) = array.as_i64() {
            v[0]
        } else if let Some(v) = array.as_i32() {
            v[0] as i64
        } else {
            return Err(SimError::InconsistentDataset {
                path: self.dataset.base().to_path_buf(),
                reason: format!(
                    "tree pointer field has non-integer dtype {}",
                    array.dtype()
                ),
            });
        };

        if raw < 0 {
            return Ok(None);
        }
        let index = raw as u64;
        if index >= total {
            return Err(SimError::InconsistentDataset {
                path: self.dataset.base().to_path_buf(),
                reason: format!(
                    "tree pointer {} outside the {}-node dataset",
                    index, total
                ),
            });
        }
        Ok(Some(index))
    }
}

/// Lazy single-link chain walk (principal branch or descendant chain).
pub struct LinkChain<'w, 'a> {
    walker: &'w TreeWalker<'a>,
    next: Option<u64>,
    visited: HashSet<u64>,
    follow: fn(&NodeLinks) -> Option<u64>,
    done: bool,
}

impl<'w, 'a> LinkChain<'w, 'a> {
    fn new(walker: &'w TreeWalker<'a>, start: u64, follow: fn(&NodeLinks) -> Option<u64>) -> Self {
        Self {
            walker,
            next: Some(start),
            visited: HashSet::new(),
            follow,
            done: false,
        }
    }
}

impl Iterator for LinkChain<'_, '_> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(current) = self.next.take() else {
            self.done = true;
            return None;
        };
        if !self.visited.insert(current) {
            self.done = true;
            return Some(Err(SimError::CyclicTree { index: current }));
        }
        match self.walker.node_links(current) {
            Ok(links) => {
                self.next = (self.follow)(&links);
                Some(Ok(current))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Lazy depth-first subtree walk.
pub struct Subtree<'w, 'a> {
    walker: &'w TreeWalker<'a>,
    start: u64,
    stack: Vec<u64>,
    visited: HashSet<u64>,
}

impl Iterator for Subtree<'_, '_> {
    type Item = Result<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        if !self.visited.insert(current) {
            self.stack.clear();
            return Some(Err(SimError::CyclicTree { index: current }));
        }
        match self.walker.node_links(current) {
            Ok(links) => {
                // Sibling first so the progenitor subtree pops before it.
                if current != self.start {
                    if let Some(sibling) = links.next_progenitor {
                        self.stack.push(sibling);
                    }
                }
                if let Some(progenitor) = links.first_progenitor {
                    self.stack.push(progenitor);
                }
                Some(Ok(current))
            }
            Err(e) => {
                self.stack.clear();
                Some(Err(e))
            }
        }
    }
}
