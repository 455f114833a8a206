// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Diagnostics sink consumed by the engine.

use crate::urn::Urn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Destination for user-facing per-resource diagnostics.
pub trait DiagSink: Send + Sync {
    fn diag(&self, severity: Severity, urn: Option<&Urn>, message: &str);

    fn error(&self, urn: Option<&Urn>, message: &str) {
        self.diag(Severity::Error, urn, message);
    }

    fn warning(&self, urn: Option<&Urn>, message: &str) {
        self.diag(Severity::Warning, urn, message);
    }

    fn info(&self, urn: Option<&Urn>, message: &str) {
        self.diag(Severity::Info, urn, message);
    }
}

/// Sink that forwards diagnostics to `tracing` at the matching level.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

impl DiagSink for TracingSink {
    fn diag(&self, severity: Severity, urn: Option<&Urn>, message: &str) {
        let urn = urn.map(|u| u.as_str()).unwrap_or("");
        match severity {
            Severity::Info => tracing::info!(urn, "{message}"),
            Severity::Warning => tracing::warn!(urn, "{message}"),
            Severity::Error => tracing::error!(urn, "{message}"),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use memory::{DiagEntry, MemorySink};

#[cfg(any(test, feature = "test-support"))]
mod memory {
    use super::{DiagSink, Severity};
    use crate::urn::Urn;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    pub struct DiagEntry {
        pub severity: Severity,
        pub urn: Option<Urn>,
        pub message: String,
    }

    /// In-memory sink recording every diagnostic, for assertions in tests.
    #[derive(Debug, Default, Clone)]
    pub struct MemorySink {
        entries: Arc<Mutex<Vec<DiagEntry>>>,
    }

    impl MemorySink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn entries(&self) -> Vec<DiagEntry> {
            self.entries.lock().clone()
        }

        pub fn errors(&self) -> Vec<DiagEntry> {
            self.entries
                .lock()
                .iter()
                .filter(|e| e.severity == Severity::Error)
                .cloned()
                .collect()
        }

        pub fn warnings(&self) -> Vec<DiagEntry> {
            self.entries
                .lock()
                .iter()
                .filter(|e| e.severity == Severity::Warning)
                .cloned()
                .collect()
        }

        pub fn has_error_mentioning(&self, fragment: &str) -> bool {
            self.errors().iter().any(|e| e.message.contains(fragment))
        }
    }

    impl DiagSink for MemorySink {
        fn diag(&self, severity: Severity, urn: Option<&Urn>, message: &str) {
            self.entries.lock().push(DiagEntry {
                severity,
                urn: urn.cloned(),
                message: message.to_string(),
            });
        }
    }
}
