//! weft-graph library.
//!
//! Builds an in-memory petgraph snapshot of a weft vault index and runs
//! structural analytics over it.
//!
//! # Conventions
//!
//! - **Errors**: public analytics in [`analytics`] return
//!   [`weft_core::Result`]; snapshot construction returns `anyhow::Result`.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `debug!`).
//! - **Determinism**: node indices follow id order, so every algorithm gives
//!   the same answer for the same index.

#![forbid(unsafe_code)]

pub mod analytics;
pub mod graph;
pub mod metrics;

pub use graph::{GraphStore, VaultGraph};
