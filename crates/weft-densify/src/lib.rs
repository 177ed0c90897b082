//! weft-densify library.
//!
//! The densification pipeline proposes and creates links around one source
//! node, re-scores pipeline links to prune the weak ones, and reverts either
//! from an append-only log.
//!
//! # Stages
//!
//! 1. **Discover** ([`discover`]): every other live node not yet linked to
//!    the source.
//! 2. **Score** ([`score`]): lexical, tag, graph-proximity and topic signals
//!    combined with the configured weights.
//! 3. **Filter**: minimum score, then a per-run link cap.
//! 4. **Present**: a dry run returns the retained candidates and stops.
//! 5. **Connect** ([`pipeline::connect`]): pipeline edges, status
//!    recomputation and one log entry, on the caller's transaction.
//!
//! [`prune`] and [`undo`] operate on the same log.

#![forbid(unsafe_code)]

pub mod discover;
pub mod pipeline;
pub mod prune;
pub mod score;
pub mod text;
pub mod undo;

pub use pipeline::{ReweaveReport, ReweaveRequest, reweave};
pub use prune::{PruneReport, PruneRequest, prune};
pub use undo::{UndoReport, history, undo};
