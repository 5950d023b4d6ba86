//! Diagnostics sink for malformed messages
//!
//! Reconstruction never aborts on bad input. Payload problems are reported here
//! and the offending message's derived fields fall back to their defaults.

use crate::error::PayloadError;
use parking_lot::Mutex;
use tracing::warn;

/// One reported problem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message_id: String,
    pub message_type: String,
    pub detail: String,
}

impl From<&PayloadError> for Diagnostic {
    fn from(err: &PayloadError) -> Self {
        Self {
            message_id: err.message_id().to_string(),
            message_type: err.message_type().to_string(),
            detail: err.to_string(),
        }
    }
}

/// Receiver for malformed-message reports
pub trait DiagnosticsSink: Send + Sync {
    fn report(&self, error: &PayloadError);
}

/// Logs every report through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn report(&self, error: &PayloadError) {
        warn!(
            message_id = error.message_id(),
            message_type = error.message_type(),
            "Malformed message: {}",
            error
        );
    }
}

/// Keeps every report in memory
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the collected reports
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl DiagnosticsSink for CollectingDiagnostics {
    fn report(&self, error: &PayloadError) {
        self.entries.lock().push(Diagnostic::from(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_keeps_reports() {
        let sink = CollectingDiagnostics::new();
        assert!(sink.is_empty());
        sink.report(&PayloadError::MissingField {
            message_id: "m2".to_string(),
            message_type: "web-response".to_string(),
            field: "timing",
        });
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message_type, "web-response");
        assert!(entries[0].detail.contains("timing"));
    }
}
