use chrono::{DateTime, Utc};
use rulegate_core::Decision;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// EnforcementEvent: one audited enforcement
// ---------------------------------------------------------------------------

/// Record of a single enforcement, emitted by [`crate::enforce::Enforcer`].
///
/// The context itself is not recorded; only the rule label and outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnforcementEvent {
    pub rule_label: String,
    pub decision: Decision,
    pub allowed: bool,
    pub evaluated_at: DateTime<Utc>,
}

impl EnforcementEvent {
    pub fn new(rule_label: impl Into<String>, decision: Decision) -> Self {
        Self {
            rule_label: rule_label.into(),
            decision,
            allowed: decision.is_allowed(),
            evaluated_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// AuditSink trait: enforcement event emission
// ---------------------------------------------------------------------------

/// Destination for enforcement events.
///
/// An event must be recorded before the enforcement result is returned; a
/// sink failure aborts the enforcement instead of granting access.
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: &EnforcementEvent) -> Result<(), String>;
}

/// In-memory audit sink for testing.
#[derive(Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<EnforcementEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<EnforcementEvent> {
        self.events
            .lock()
            .expect("audit sink lock poisoned")
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .expect("audit sink lock poisoned")
            .clear();
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: &EnforcementEvent) -> Result<(), String> {
        self.events
            .lock()
            .map_err(|_| "audit sink lock poisoned".to_string())?
            .push(event.clone());
        Ok(())
    }
}

/// Sink that writes each event to the `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: &EnforcementEvent) -> Result<(), String> {
        tracing::info!(
            rule = event.rule_label.as_str(),
            decision = %event.decision,
            allowed = event.allowed,
            evaluated_at = %event.evaluated_at.to_rfc3339(),
            "enforcement audited"
        );
        Ok(())
    }
}
