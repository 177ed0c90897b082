//! weft-core library.
//!
//! Data model, identity allocation, link extraction, lifecycle state
//! machines, and the SQLite index backing a weft vault.
//!
//! # Conventions
//!
//! - **Errors**: operations return [`error::Result`]; store query helpers
//!   return `anyhow::Result` with context and convert on `?`.
//! - **Logging**: use `tracing` macros (`info!`, `warn!`, `debug!`).
//! - **Transactions**: writers take a caller-supplied `rusqlite::Transaction`
//!   opened with [`db::begin_write`]; events are dispatched after commit.

#![forbid(unsafe_code)]

pub mod capabilities;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod events;
pub mod id;
pub mod links;
pub mod model;
pub mod outcome;
pub mod vault;

pub use error::{ErrorCode, Result, WeftError};
pub use outcome::Outcome;
pub use vault::Vault;
