//! Lifecycle events and the listener set they are dispatched to.
//!
//! Listeners are registered explicitly and invoked synchronously in
//! registration order. A failing listener never aborts the caller: its error
//! is logged and returned as a warning string for the outcome.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

/// Events emitted by vault operations after their transaction commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum LifecycleEvent {
    ContentCreated {
        id: String,
        content_type: String,
    },
    ContentUpdated {
        id: String,
        fields: Vec<String>,
    },
    ContentClosed {
        id: String,
        status: String,
    },
    DensificationCompleted {
        source_id: Option<String>,
        log_id: i64,
        added: usize,
        removed: usize,
    },
    SessionStarted {
        id: String,
    },
    SessionClosed {
        id: String,
    },
    IntegrityChecked {
        issues: usize,
        repaired: usize,
    },
    VaultInitialized {
        path: String,
    },
}

impl LifecycleEvent {
    /// Kebab-case event name, as listeners see it.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ContentCreated { .. } => "content-created",
            Self::ContentUpdated { .. } => "content-updated",
            Self::ContentClosed { .. } => "content-closed",
            Self::DensificationCompleted { .. } => "densification-completed",
            Self::SessionStarted { .. } => "session-started",
            Self::SessionClosed { .. } => "session-closed",
            Self::IntegrityChecked { .. } => "integrity-checked",
            Self::VaultInitialized { .. } => "vault-initialized",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A statically registered receiver of lifecycle events.
pub trait Listener {
    /// Short name used in warnings.
    fn name(&self) -> &str;

    /// Handle one event.
    ///
    /// # Errors
    ///
    /// Any error is downgraded to a warning by [`ListenerSet::dispatch`].
    fn on_event(&self, event: &LifecycleEvent) -> anyhow::Result<()>;
}

/// Ordered collection of listeners.
#[derive(Default)]
pub struct ListenerSet {
    listeners: Vec<Box<dyn Listener>>,
}

impl fmt::Debug for ListenerSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.listeners.iter().map(|l| l.name()))
            .finish()
    }
}

impl ListenerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Box<dyn Listener>) {
        self.listeners.push(listener);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Deliver `event` to every listener, collecting failures as warnings.
    pub fn dispatch(&self, event: &LifecycleEvent) -> Vec<String> {
        let mut warnings = Vec::new();
        for listener in &self.listeners {
            match listener.on_event(event) {
                Ok(()) => debug!(listener = listener.name(), event = %event, "listener ok"),
                Err(err) => {
                    warn!(listener = listener.name(), event = %event, "listener failed: {err:#}");
                    warnings.push(format!(
                        "listener '{}' failed on {event}: {err:#}",
                        listener.name()
                    ));
                }
            }
        }
        warnings
    }
}

/// Value of a write operation plus the events and warnings it produced.
///
/// Operations running on a caller's transaction return this instead of
/// dispatching directly; events go out only after the caller commits.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied<T> {
    pub value: T,
    pub events: Vec<LifecycleEvent>,
    pub warnings: Vec<String>,
}

impl<T> Applied<T> {
    pub const fn new(value: T) -> Self {
        Self {
            value,
            events: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_event(mut self, event: LifecycleEvent) -> Self {
        self.events.push(event);
        self
    }

    #[must_use]
    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    /// Dispatch pending events and return the value with all warnings.
    pub fn dispatch(self, listeners: &ListenerSet) -> (T, Vec<String>) {
        let mut warnings = self.warnings;
        for event in &self.events {
            warnings.extend(listeners.dispatch(event));
        }
        (self.value, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Recorder {
        label: &'static str,
        seen: Rc<RefCell<Vec<String>>>,
    }

    impl Listener for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        fn on_event(&self, event: &LifecycleEvent) -> anyhow::Result<()> {
            self.seen
                .borrow_mut()
                .push(format!("{}:{}", self.label, event.name()));
            Ok(())
        }
    }

    struct Broken;

    impl Listener for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn on_event(&self, _event: &LifecycleEvent) -> anyhow::Result<()> {
            anyhow::bail!("hook exited 1")
        }
    }

    #[test]
    fn dispatch_runs_in_registration_order_and_survives_failures() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut set = ListenerSet::new();
        set.register(Box::new(Recorder {
            label: "first",
            seen: Rc::clone(&seen),
        }));
        set.register(Box::new(Broken));
        set.register(Box::new(Recorder {
            label: "second",
            seen: Rc::clone(&seen),
        }));

        let warnings = set.dispatch(&LifecycleEvent::SessionStarted {
            id: "SES-0001".into(),
        });

        assert_eq!(
            *seen.borrow(),
            vec!["first:session-started", "second:session-started"]
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("broken"));
        assert!(warnings[0].contains("hook exited 1"));
    }

    #[test]
    fn events_serialize_with_kebab_names() {
        let json = serde_json::to_value(LifecycleEvent::ContentUpdated {
            id: "note-00000001".into(),
            fields: vec!["tags".into()],
        })
        .expect("serialize");
        assert_eq!(json["event"], "content-updated");
        assert_eq!(json["fields"][0], "tags");
    }
}
