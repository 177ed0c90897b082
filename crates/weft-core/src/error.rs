use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// Machine-readable error codes for agent-friendly decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Validation,
    NotFound,
    InvalidTransition,
    Collision,
    NoHistory,
    CapabilityUnavailable,
    ConfigParseError,
    Storage,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ConfigParseError => "E1002",
            Self::Validation => "E2001",
            Self::NotFound => "E2002",
            Self::InvalidTransition => "E2003",
            Self::Collision => "E3001",
            Self::NoHistory => "E4001",
            Self::Storage => "E5001",
            Self::CapabilityUnavailable => "E6001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Symbolic name carried in the outcome contract.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::NotFound => "NOT_FOUND",
            Self::InvalidTransition => "INVALID_TRANSITION",
            Self::Collision => "COLLISION",
            Self::NoHistory => "NO_HISTORY",
            Self::CapabilityUnavailable => "CAPABILITY_UNAVAILABLE",
            Self::ConfigParseError => "CONFIG",
            Self::Storage => "STORAGE",
            Self::InternalUnexpected => "INTERNAL",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Validation => "Invalid input",
            Self::NotFound => "Not found",
            Self::InvalidTransition => "Invalid status transition",
            Self::Collision => "Content id collision",
            Self::NoHistory => "Densification log is empty",
            Self::CapabilityUnavailable => "Capability unavailable",
            Self::ConfigParseError => "Config file parse error",
            Self::Storage => "Index storage error",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators and agents.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::Validation | Self::NotFound => None,
            Self::InvalidTransition => {
                Some("Check the allowed next statuses; machine statuses cannot be set directly.")
            }
            Self::Collision => Some("Retitle the new content so its normalized title differs."),
            Self::NoHistory => Some("Run `weft reweave` before `undo` or `prune`."),
            Self::CapabilityUnavailable => {
                Some("Register the optional index for this deployment or use a graph query.")
            }
            Self::ConfigParseError => Some("Fix syntax in .weft/config.toml and retry."),
            Self::Storage => Some("Retry once; if persistent, run `weft check`."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Typed error returned by every vault operation.
#[derive(Debug, thiserror::Error)]
pub enum WeftError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{domain} cannot move from '{from}' to '{to}': {reason}")]
    InvalidTransition {
        domain: &'static str,
        from: String,
        to: String,
        reason: &'static str,
    },

    #[error("id {id} already belongs to '{existing_title}', not '{title}'")]
    Collision {
        id: String,
        existing_title: String,
        title: String,
    },

    #[error("no densification history to act on")]
    NoHistory,

    #[error("capability '{0}' is not available in this deployment")]
    CapabilityUnavailable(&'static str),

    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0:#}")]
    Internal(anyhow::Error),
}

impl From<rusqlite::Error> for WeftError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Query helpers wrap SQLite failures in context; any chain with a SQLite
/// cause (busy, snapshot conflicts, constraint failures) is a storage error
/// and keeps the whole chain in its message.
impl From<anyhow::Error> for WeftError {
    fn from(err: anyhow::Error) -> Self {
        if err.chain().any(|cause| cause.is::<rusqlite::Error>()) {
            Self::Storage(format!("{err:#}"))
        } else {
            Self::Internal(err)
        }
    }
}

impl WeftError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::Validation,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            Self::Collision { .. } => ErrorCode::Collision,
            Self::NoHistory => ErrorCode::NoHistory,
            Self::CapabilityUnavailable(_) => ErrorCode::CapabilityUnavailable,
            Self::Config(_) => ErrorCode::ConfigParseError,
            Self::Storage(_) => ErrorCode::Storage,
            Self::Internal(_) => ErrorCode::InternalUnexpected,
        }
    }

    /// Structured detail map for the outcome contract.
    #[must_use]
    pub fn details(&self) -> BTreeMap<String, Value> {
        let mut details = BTreeMap::new();
        match self {
            Self::NotFound { kind, id } => {
                details.insert("kind".to_string(), Value::from(*kind));
                details.insert("id".to_string(), Value::from(id.as_str()));
            }
            Self::InvalidTransition {
                domain, from, to, ..
            } => {
                details.insert("domain".to_string(), Value::from(*domain));
                details.insert("from".to_string(), Value::from(from.as_str()));
                details.insert("to".to_string(), Value::from(to.as_str()));
            }
            Self::Collision {
                id,
                existing_title,
                title,
            } => {
                details.insert("id".to_string(), Value::from(id.as_str()));
                details.insert(
                    "existing_title".to_string(),
                    Value::from(existing_title.as_str()),
                );
                details.insert("title".to_string(), Value::from(title.as_str()));
            }
            Self::CapabilityUnavailable(name) => {
                details.insert("capability".to_string(), Value::from(*name));
            }
            Self::Validation(_)
            | Self::NoHistory
            | Self::Config(_)
            | Self::Storage(_)
            | Self::Internal(_) => {}
        }
        details
    }
}

pub type Result<T, E = WeftError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{ErrorCode, WeftError};
    use std::collections::HashSet;

    const ALL: [ErrorCode; 9] = [
        ErrorCode::Validation,
        ErrorCode::NotFound,
        ErrorCode::InvalidTransition,
        ErrorCode::Collision,
        ErrorCode::NoHistory,
        ErrorCode::CapabilityUnavailable,
        ErrorCode::ConfigParseError,
        ErrorCode::Storage,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        let mut names = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
            assert!(names.insert(code.name()), "duplicate name {}", code.name());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::InvalidTransition.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn not_found_carries_details() {
        let err = WeftError::not_found("log entry", "42");
        assert_eq!(err.code(), ErrorCode::NotFound);
        let details = err.details();
        assert_eq!(details["kind"], "log entry");
        assert_eq!(details["id"], "42");
    }

    #[test]
    fn sqlite_errors_map_to_storage() {
        let err: WeftError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.code(), ErrorCode::Storage);
        assert_eq!(err.code().name(), "STORAGE");
    }

    #[test]
    fn sqlite_causes_under_context_map_to_storage_with_chain() {
        let cause = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            Some("database is locked".to_string()),
        );
        let err: WeftError = anyhow::Error::new(cause)
            .context("write rank_score for note-00000001")
            .into();
        assert_eq!(err.code(), ErrorCode::Storage);
        let message = err.to_string();
        assert!(message.contains("write rank_score for note-00000001"), "{message}");
        assert!(message.contains("database is locked"), "{message}");
    }

    #[test]
    fn other_chains_stay_internal() {
        let err: WeftError = anyhow::anyhow!("bad graph").context("build graph").into();
        assert_eq!(err.code(), ErrorCode::InternalUnexpected);
        assert_eq!(err.to_string(), "build graph: bad graph");
    }
}
