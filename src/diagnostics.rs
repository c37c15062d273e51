use std::cell::RefCell;
use std::rc::Rc;

use tracing::warn;

/// Structured event handed to the host's error reporting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub message: String,
    pub fingerprint: &'static str,
}

pub trait Diagnostics {
    fn capture(&self, event: DiagnosticEvent);
}

/// Forwards events to the `diagnostics` tracing target.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn capture(&self, event: DiagnosticEvent) {
        warn!(target: "diagnostics", fingerprint = event.fingerprint, "{}", event.message);
    }
}

/// Keeps every captured event; clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct MemoryDiagnostics {
    events: Rc<RefCell<Vec<DiagnosticEvent>>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events.borrow().clone()
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn capture(&self, event: DiagnosticEvent) {
        self.events.borrow_mut().push(event);
    }
}
