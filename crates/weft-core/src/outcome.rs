//! Uniform result envelope returned to every caller.
//!
//! An [`Outcome`] is either a success (payload plus non-fatal warnings) or a
//! single structured error. Renderers serialize it as-is for JSON output.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::error::WeftError;

/// Structured error body of a failed outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutcomeError {
    /// Symbolic code such as `NOT_FOUND`.
    pub code: &'static str,
    /// Stable `E####` identifier.
    pub error_code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

impl From<&WeftError> for OutcomeError {
    fn from(err: &WeftError) -> Self {
        let code = err.code();
        Self {
            code: code.name(),
            error_code: code.code(),
            message: err.to_string(),
            hint: code.hint(),
            details: err.details(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome<T> {
    pub success: bool,
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
}

impl<T> Outcome<T> {
    pub fn ok(operation: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            operation: operation.into(),
            data: Some(data),
            warnings: Vec::new(),
            error: None,
        }
    }

    pub fn failed(operation: impl Into<String>, err: &WeftError) -> Self {
        Self {
            success: false,
            operation: operation.into(),
            data: None,
            warnings: Vec::new(),
            error: Some(OutcomeError::from(err)),
        }
    }

    /// Wrap an operation result, keeping warnings on both paths.
    pub fn from_result(
        operation: impl Into<String>,
        result: Result<T, WeftError>,
        warnings: Vec<String>,
    ) -> Self {
        let mut outcome = match result {
            Ok(data) => Self::ok(operation, data),
            Err(err) => Self::failed(operation, &err),
        };
        outcome.warnings = warnings;
        outcome
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_outcome_serializes_structured_error() {
        let outcome: Outcome<()> = Outcome::failed("undo", &WeftError::NoHistory);
        let json = serde_json::to_value(&outcome).expect("serialize");
        assert_eq!(json["success"], false);
        assert_eq!(json["operation"], "undo");
        assert_eq!(json["error"]["code"], "NO_HISTORY");
        assert!(json.get("data").is_none());
    }

    #[test]
    fn warnings_survive_success() {
        let outcome = Outcome::from_result("rank", Ok(3_u32), vec!["listener failed".into()]);
        assert!(outcome.success);
        assert_eq!(outcome.data, Some(3));
        assert_eq!(outcome.warnings, vec!["listener failed".to_string()]);
    }
}
