//! Optional external indexes.
//!
//! Full-text ranking and vector similarity live outside the vault core. A
//! deployment registers whichever implementations it has; callers that need
//! a missing one get [`WeftError::CapabilityUnavailable`] instead of a
//! degraded guess.

use tracing::debug;

use crate::error::{Result, WeftError};

/// External full-text index returning relevance-ordered node ids.
pub trait TextIndex {
    /// # Errors
    ///
    /// Implementations report their own lookup failures.
    fn search(&self, query: &str, limit: usize) -> anyhow::Result<Vec<String>>;
}

/// External vector index returning nearest neighbours with similarity scores.
pub trait SemanticIndex {
    /// # Errors
    ///
    /// Implementations report their own lookup failures.
    fn neighbours(&self, node_id: &str, limit: usize) -> anyhow::Result<Vec<(String, f64)>>;
}

/// The optional capabilities registered for this process.
#[derive(Default)]
pub struct Capabilities {
    pub text: Option<Box<dyn TextIndex>>,
    pub semantic: Option<Box<dyn SemanticIndex>>,
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities")
            .field("text", &self.text.is_some())
            .field("semantic", &self.semantic.is_some())
            .finish()
    }
}

impl Capabilities {
    /// No optional capabilities.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Semantic neighbours of `node_id`.
    ///
    /// # Errors
    ///
    /// - [`WeftError::CapabilityUnavailable`] without a semantic index.
    /// - [`WeftError::Internal`] when the index lookup fails.
    pub fn similar(&self, node_id: &str, top: usize) -> Result<Vec<(String, f64)>> {
        let index = self
            .semantic
            .as_deref()
            .ok_or(WeftError::CapabilityUnavailable("semantic"))?;
        let mut hits = index.neighbours(node_id, top)?;
        hits.retain(|(id, _)| id != node_id);
        hits.truncate(top);
        debug!(node_id, hits = hits.len(), "semantic lookup");
        Ok(hits)
    }

    /// Full-text search.
    ///
    /// # Errors
    ///
    /// - [`WeftError::CapabilityUnavailable`] without a text index.
    /// - [`WeftError::Internal`] when the index lookup fails.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        if query.trim().is_empty() {
            return Err(WeftError::validation("search query must not be empty"));
        }
        let index = self
            .text
            .as_deref()
            .ok_or(WeftError::CapabilityUnavailable("fulltext"))?;
        Ok(index.search(query, limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    struct Fixed;

    impl SemanticIndex for Fixed {
        fn neighbours(&self, node_id: &str, _limit: usize) -> anyhow::Result<Vec<(String, f64)>> {
            Ok(vec![
                (node_id.to_string(), 1.0),
                ("note-00000002".to_string(), 0.9),
                ("note-00000003".to_string(), 0.4),
            ])
        }
    }

    #[test]
    fn missing_capabilities_are_reported() {
        let caps = Capabilities::none();
        let err = caps.similar("note-00000001", 3).expect_err("no semantic");
        assert_eq!(err.code(), ErrorCode::CapabilityUnavailable);
        let err = caps.search("memory", 3).expect_err("no text");
        assert_eq!(err.code(), ErrorCode::CapabilityUnavailable);
    }

    #[test]
    fn similar_drops_the_query_node() {
        let caps = Capabilities {
            semantic: Some(Box::new(Fixed)),
            ..Capabilities::default()
        };
        let hits = caps.similar("note-00000001", 1).expect("lookup");
        assert_eq!(hits, vec![("note-00000002".to_string(), 0.9)]);
    }
}
