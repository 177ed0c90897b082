//! Typed vault records: content nodes, links, and lifecycle statuses.

use std::fmt;

/// Error returned when parsing an enum value from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnumError {
    pub expected: &'static str,
    pub got: String,
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: '{}'", self.expected, self.got)
    }
}

impl std::error::Error for ParseEnumError {}

/// Declare a lowercase string-backed enum with `as_str`, `Display`,
/// `FromStr`, and serde support.
macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $expected:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "lowercase")]
        $vis enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::model::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok(Self::$variant),)+
                    _ => Err($crate::model::ParseEnumError {
                        expected: $expected,
                        got: s.to_string(),
                    }),
                }
            }
        }
    };
}

pub(crate) use string_enum;

pub mod edge;
pub mod log;
pub mod node;
pub mod status;

pub use edge::{Edge, EdgeKey, Provenance};
pub use log::{EdgeAction, LogEntry, LogKind, LoggedEdge};
pub use node::{AnalyticsSnapshot, ContentType, IdScheme, NewContent, Node};
pub use status::{
    DecisionStatus, Lifecycle, Maturity, NoteStatus, SessionStatus, StatusFamily, TaskStatus,
};
