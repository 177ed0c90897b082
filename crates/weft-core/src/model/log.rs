use serde::{Deserialize, Serialize};

use super::edge::{Edge, Provenance};
use super::string_enum;

string_enum! {
    /// What a densification log entry records.
    pub enum LogKind: "log kind" {
        Connect => "connect",
        Prune => "prune",
        Undo => "undo",
    }
}

string_enum! {
    pub enum EdgeAction: "edge action" {
        Added => "added",
        Removed => "removed",
    }
}

/// One edge mutation captured by a log entry, with enough attributes to
/// recreate the edge exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEdge {
    pub action: EdgeAction,
    pub edge: Edge,
}

impl LoggedEdge {
    #[must_use]
    pub const fn added(edge: Edge) -> Self {
        Self {
            action: EdgeAction::Added,
            edge,
        }
    }

    #[must_use]
    pub const fn removed(edge: Edge) -> Self {
        Self {
            action: EdgeAction::Removed,
            edge,
        }
    }

    /// The mutation that reverses this one.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let action = match self.action {
            EdgeAction::Added => EdgeAction::Removed,
            EdgeAction::Removed => EdgeAction::Added,
        };
        Self {
            action,
            edge: self.edge.clone(),
        }
    }
}

/// An append-only densification audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub log_id: i64,
    pub kind: LogKind,
    pub target_id: Option<String>,
    pub reverts_log_id: Option<i64>,
    pub created_at_us: i64,
    pub edges: Vec<LoggedEdge>,
}

impl LogEntry {
    #[must_use]
    pub fn count(&self, action: EdgeAction) -> usize {
        self.edges.iter().filter(|e| e.action == action).count()
    }

    /// Whether every recorded edge is pipeline-authored.
    #[must_use]
    pub fn pipeline_only(&self) -> bool {
        self.edges
            .iter()
            .all(|e| e.edge.provenance == Provenance::Pipeline)
    }
}
