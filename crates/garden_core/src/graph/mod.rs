//! Link & annotation graph deriver.
//!
//! # Responsibility
//! - Extract outlinks, external links and annotations from note content.
//! - Invert outlinks into backlinks over a whole note set.
//! - Rewrite content to add, edit, remove or reclassify embedded elements.
//!
//! # Invariants
//! - Nothing here is persisted; the graph is always recomputed from content,
//!   so it cannot drift from it.
//! - `n ∈ backlinks(m)` iff `m ∈ outlinks(n)`; self-links are excluded.
//! - Extraction is read-only and idempotent.

pub mod link_graph;
pub mod markup;
pub mod rewrite;

pub use link_graph::{
    extract_annotations, extract_external_links, extract_outlinks, Annotation, ExternalLink,
    LinkGraph, LinkRelations,
};
pub use rewrite::{RewriteError, RewriteResult};
