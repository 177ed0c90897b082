//! Identity allocation for content items.
//!
//! Two disjoint schemes:
//!
//! - **Content-hash ids** (`note-3fa2b1c4`): the first 8 hex characters of
//!   SHA-256 over the normalized title. Identical normalized titles always
//!   map to the same id. A pre-existing id bound to a *different* normalized
//!   title is a collision and must be rejected by the creator.
//! - **Sequential ids** (`TASK-0007`): claimed from the `id_counters` row of
//!   the namespace. The claim runs on a caller-supplied transaction so the
//!   read-then-increment commits or rolls back together with the writes
//!   that consume the id.

use std::sync::LazyLock;

use regex::Regex;
use rusqlite::{OptionalExtension as _, Transaction, params};
use sha2::{Digest, Sha256};
use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Result, WeftError};
use crate::model::{ContentType, IdScheme};

/// Number of hex characters kept from the title digest.
pub const HASH_ID_HEX_LEN: usize = 8;

/// Minimum zero-padded width of sequential ids.
pub const SEQUENTIAL_MIN_WIDTH: usize = 4;

static HASH_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(note|ref)-[0-9a-f]{8}$").unwrap_or_else(|err| panic!("hash id regex: {err}"))
});

static SEQUENTIAL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(TASK|DEC|SES)-[0-9]{4,}$")
        .unwrap_or_else(|err| panic!("sequential id regex: {err}"))
});

/// Normalize a title for content addressing.
///
/// Lowercases, applies Unicode compatibility normalization (NFKC), strips
/// punctuation and symbols, and collapses runs of whitespace to one space.
#[must_use]
pub fn normalize_title(title: &str) -> String {
    let folded: String = title.nfkc().collect::<String>().to_lowercase();
    let kept: String = folded
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Content-hash id for `title` under `prefix`.
#[must_use]
pub fn content_hash_id(prefix: &str, title: &str) -> String {
    let normalized = normalize_title(title);
    let digest = Sha256::digest(normalized.as_bytes());
    let mut hex = String::with_capacity(HASH_ID_HEX_LEN);
    for byte in digest.iter().take(HASH_ID_HEX_LEN / 2) {
        hex.push_str(&format!("{byte:02x}"));
    }
    format!("{prefix}{hex}")
}

/// Format a sequential id: `TASK-0001`, growing past four digits naturally.
#[must_use]
pub fn format_sequential(namespace: &str, value: u64) -> String {
    format!("{namespace}-{value:0width$}", width = SEQUENTIAL_MIN_WIDTH)
}

/// Claim the next value of `namespace` and advance the counter.
///
/// Runs entirely on `tx`; the allocator never opens its own transaction.
/// Callers should open `tx` with `TransactionBehavior::Immediate` so
/// concurrent writers serialize on the claim.
///
/// # Errors
///
/// Returns a storage error if the counter cannot be read or written.
pub fn claim_sequential(tx: &Transaction<'_>, namespace: &str) -> Result<String> {
    let current: Option<i64> = tx
        .query_row(
            "SELECT next_value FROM id_counters WHERE namespace = ?1",
            params![namespace],
            |row| row.get(0),
        )
        .optional()?;

    let value = current.unwrap_or(1);
    tx.execute(
        "INSERT INTO id_counters (namespace, next_value) VALUES (?1, ?2)
         ON CONFLICT(namespace) DO UPDATE SET next_value = excluded.next_value",
        params![namespace, value + 1],
    )?;

    let value = u64::try_from(value)
        .map_err(|_| WeftError::validation(format!("counter {namespace} is negative")))?;
    debug!(namespace, value, "claimed sequential id");
    Ok(format_sequential(namespace, value))
}

/// Explicitly reset a namespace counter so the next claim yields `next_value`.
///
/// # Errors
///
/// Returns a validation error for `next_value == 0`, or a storage error.
pub fn reset_counter(tx: &Transaction<'_>, namespace: &str, next_value: u64) -> Result<()> {
    if next_value == 0 {
        return Err(WeftError::validation("counters start at 1"));
    }
    let next_value = i64::try_from(next_value)
        .map_err(|_| WeftError::validation("counter value out of range"))?;
    tx.execute(
        "INSERT INTO id_counters (namespace, next_value) VALUES (?1, ?2)
         ON CONFLICT(namespace) DO UPDATE SET next_value = excluded.next_value",
        params![namespace, next_value],
    )?;
    Ok(())
}

/// Allocate an id for new content of `content_type` titled `title`.
///
/// Hash ids are computed without touching the store; sequential ids are
/// claimed on `tx`.
///
/// # Errors
///
/// Propagates counter storage failures.
pub fn allocate(tx: &Transaction<'_>, content_type: ContentType, title: &str) -> Result<String> {
    match content_type.id_scheme() {
        IdScheme::ContentHash { prefix } => Ok(content_hash_id(prefix, title)),
        IdScheme::Sequential { namespace } => claim_sequential(tx, namespace),
    }
}

/// Format-only check of an id. Existence is not verified.
#[must_use]
pub fn is_valid_id(id: &str) -> bool {
    HASH_ID.is_match(id) || SEQUENTIAL_ID.is_match(id)
}

/// Validate that `id` is well-formed for `content_type`.
///
/// # Errors
///
/// Returns [`WeftError::Validation`] when the id does not match the pattern
/// of the content type's namespace.
pub fn validate_id_for(content_type: ContentType, id: &str) -> Result<()> {
    let ok = match content_type.id_scheme() {
        IdScheme::ContentHash { prefix } => id.starts_with(prefix) && HASH_ID.is_match(id),
        IdScheme::Sequential { namespace } => {
            id.strip_prefix(namespace)
                .is_some_and(|rest| rest.starts_with('-'))
                && SEQUENTIAL_ID.is_match(id)
        }
    };
    if ok {
        Ok(())
    } else {
        Err(WeftError::validation(format!(
            "'{id}' is not a valid {content_type} id"
        )))
    }
}

/// Validate any id against the known namespaces.
///
/// # Errors
///
/// Returns [`WeftError::Validation`] for malformed ids.
pub fn validate_id(id: &str) -> Result<()> {
    if is_valid_id(id) {
        Ok(())
    } else {
        Err(WeftError::validation(format!("'{id}' is not a valid id")))
    }
}
