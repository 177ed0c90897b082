//! Status families and their transition tables.
//!
//! Notes and references carry a *machine* status derived from outgoing edge
//! count; it is never set directly. Tasks, decisions, sessions, and advisory
//! maturity are *externally driven* through explicit transition tables.
//!
//! | domain | from | allowed next |
//! |---|---|---|
//! | task | open | active, done, dropped |
//! | task | active | open, blocked, done, dropped |
//! | task | blocked | active, dropped |
//! | task | done | open |
//! | task | dropped | open |
//! | decision | proposed | accepted |
//! | decision | accepted | superseded |
//! | session | open | closed |
//! | maturity | seedling | budding |
//! | maturity | budding | evergreen, seedling |
//! | maturity | evergreen | budding |

use std::fmt::Display;
use std::str::FromStr;

use super::string_enum;
use crate::config::StatusThresholds;
use crate::error::{Result, WeftError};

/// Which status machine governs a content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFamily {
    Machine,
    Task,
    Decision,
    Session,
}

string_enum! {
    /// Machine-computed status of notes and references.
    pub enum NoteStatus: "note status" {
        Draft => "draft",
        Linked => "linked",
        Connected => "connected",
    }
}

impl NoteStatus {
    /// Derive the status from the number of outgoing edges.
    #[must_use]
    pub const fn from_out_degree(out_degree: usize, thresholds: &StatusThresholds) -> Self {
        if out_degree >= thresholds.connected_threshold {
            Self::Connected
        } else if out_degree >= thresholds.linked_threshold {
            Self::Linked
        } else {
            Self::Draft
        }
    }
}

string_enum! {
    pub enum TaskStatus: "task status" {
        Open => "open",
        Active => "active",
        Blocked => "blocked",
        Done => "done",
        Dropped => "dropped",
    }
}

string_enum! {
    /// Architecture decisions only ever move forward.
    pub enum DecisionStatus: "decision status" {
        Proposed => "proposed",
        Accepted => "accepted",
        Superseded => "superseded",
    }
}

string_enum! {
    pub enum SessionStatus: "session status" {
        Open => "open",
        Closed => "closed",
    }
}

string_enum! {
    /// Advisory maturity of a note.
    pub enum Maturity: "maturity" {
        Seedling => "seedling",
        Budding => "budding",
        Evergreen => "evergreen",
    }
}

/// An externally driven status machine backed by a transition table.
pub trait Lifecycle: Copy + Eq + Display + FromStr + 'static {
    const DOMAIN: &'static str;

    /// Status given to freshly created content.
    fn initial() -> Self;

    /// Allowed next statuses from `self`.
    fn allowed_next(self) -> &'static [Self];

    /// Whether reaching this status closes the item.
    fn is_terminal(self) -> bool {
        false
    }

    /// Check a transition against the table.
    ///
    /// # Errors
    ///
    /// Returns [`WeftError::InvalidTransition`] for self-transitions and for
    /// targets outside the allowed set.
    fn can_transition_to(self, target: Self) -> Result<()> {
        if self == target {
            return Err(WeftError::InvalidTransition {
                domain: Self::DOMAIN,
                from: self.to_string(),
                to: target.to_string(),
                reason: "no-op transition is not allowed",
            });
        }
        if self.allowed_next().contains(&target) {
            Ok(())
        } else {
            Err(WeftError::InvalidTransition {
                domain: Self::DOMAIN,
                from: self.to_string(),
                to: target.to_string(),
                reason: "transition not allowed by lifecycle rules",
            })
        }
    }
}

impl Lifecycle for TaskStatus {
    const DOMAIN: &'static str = "task";

    fn initial() -> Self {
        Self::Open
    }

    fn allowed_next(self) -> &'static [Self] {
        match self {
            Self::Open => &[Self::Active, Self::Done, Self::Dropped],
            Self::Active => &[Self::Open, Self::Blocked, Self::Done, Self::Dropped],
            Self::Blocked => &[Self::Active, Self::Dropped],
            Self::Done | Self::Dropped => &[Self::Open],
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Dropped)
    }
}

impl Lifecycle for DecisionStatus {
    const DOMAIN: &'static str = "decision";

    fn initial() -> Self {
        Self::Proposed
    }

    fn allowed_next(self) -> &'static [Self] {
        match self {
            Self::Proposed => &[Self::Accepted],
            Self::Accepted => &[Self::Superseded],
            Self::Superseded => &[],
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Superseded)
    }
}

impl Lifecycle for SessionStatus {
    const DOMAIN: &'static str = "session";

    fn initial() -> Self {
        Self::Open
    }

    fn allowed_next(self) -> &'static [Self] {
        match self {
            Self::Open => &[Self::Closed],
            Self::Closed => &[],
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl Lifecycle for Maturity {
    const DOMAIN: &'static str = "maturity";

    fn initial() -> Self {
        Self::Seedling
    }

    fn allowed_next(self) -> &'static [Self] {
        match self {
            Self::Seedling => &[Self::Budding],
            Self::Budding => &[Self::Evergreen, Self::Seedling],
            Self::Evergreen => &[Self::Budding],
        }
    }
}

/// Result of applying a status change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub from: String,
    pub to: String,
    pub terminal: bool,
}

fn step<L: Lifecycle>(current: &str, target: &str) -> Result<StatusChange> {
    let from = parse_status::<L>(current)?;
    let to = parse_status::<L>(target)?;
    from.can_transition_to(to)?;
    Ok(StatusChange {
        from: from.to_string(),
        to: to.to_string(),
        terminal: to.is_terminal(),
    })
}

fn parse_status<L: Lifecycle>(raw: &str) -> Result<L> {
    raw.parse::<L>()
        .map_err(|_| WeftError::validation(format!("'{raw}' is not a {} status", L::DOMAIN)))
}

/// Initial status string for a family.
#[must_use]
pub fn initial_status(family: StatusFamily) -> &'static str {
    match family {
        StatusFamily::Machine => NoteStatus::Draft.as_str(),
        StatusFamily::Task => TaskStatus::initial().as_str(),
        StatusFamily::Decision => DecisionStatus::initial().as_str(),
        StatusFamily::Session => SessionStatus::initial().as_str(),
    }
}

/// Validate an externally requested status change for `family`.
///
/// # Errors
///
/// - [`WeftError::InvalidTransition`] when the family is machine-computed,
///   or the table forbids the move.
/// - [`WeftError::Validation`] when either status is not part of the family.
pub fn transition(family: StatusFamily, current: &str, target: &str) -> Result<StatusChange> {
    match family {
        StatusFamily::Machine => Err(WeftError::InvalidTransition {
            domain: "note",
            from: current.to_string(),
            to: target.to_string(),
            reason: "machine-computed status cannot be set directly",
        }),
        StatusFamily::Task => step::<TaskStatus>(current, target),
        StatusFamily::Decision => step::<DecisionStatus>(current, target),
        StatusFamily::Session => step::<SessionStatus>(current, target),
    }
}
