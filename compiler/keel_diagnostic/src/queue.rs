//! Per-unit diagnostic collection.
//!
//! Each lowering unit owns one queue, so workers never contend on a shared
//! sink. The driver merges the queues of all units in unit order.

use keel_ir::Span;

use crate::{Diagnostic, ErrorGuaranteed};

/// Configuration for diagnostic processing.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct DiagnosticConfig {
    /// Maximum number of errors kept (0 = unlimited). Errors past the limit
    /// are counted but not stored.
    pub error_limit: usize,
    /// Drop exact duplicates (same code, message and primary span).
    pub deduplicate: bool,
}

impl Default for DiagnosticConfig {
    fn default() -> Self {
        DiagnosticConfig {
            error_limit: 100,
            deduplicate: true,
        }
    }
}

impl DiagnosticConfig {
    /// No limits, no deduplication. Used by tests that assert exact output.
    pub fn unlimited() -> Self {
        DiagnosticConfig {
            error_limit: 0,
            deduplicate: false,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DiagnosticQueue {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
    config: DiagnosticConfig,
}

impl DiagnosticQueue {
    pub fn new() -> Self {
        Self::with_config(DiagnosticConfig::default())
    }

    pub fn with_config(config: DiagnosticConfig) -> Self {
        DiagnosticQueue {
            diagnostics: Vec::new(),
            error_count: 0,
            config,
        }
    }

    /// Emit an error and return proof of it.
    pub fn emit_error(&mut self, diagnostic: Diagnostic) -> ErrorGuaranteed {
        debug_assert!(diagnostic.is_error(), "emit_error given {diagnostic}");
        self.push(diagnostic);
        ErrorGuaranteed::new()
    }

    /// Add any diagnostic. Returns `false` if it was dropped as a duplicate
    /// or past the error limit.
    pub fn push(&mut self, diagnostic: Diagnostic) -> bool {
        if diagnostic.is_error() {
            self.error_count += 1;
            if self.config.error_limit != 0 && self.error_count > self.config.error_limit {
                return false;
            }
        }
        if self.config.deduplicate && self.is_duplicate(&diagnostic) {
            return false;
        }
        self.diagnostics.push(diagnostic);
        true
    }

    fn is_duplicate(&self, diagnostic: &Diagnostic) -> bool {
        let span = diagnostic.primary_span();
        self.diagnostics.iter().any(|d| {
            d.code == diagnostic.code && d.message == diagnostic.message && d.primary_span() == span
        })
    }

    /// Move all diagnostics of `other` into this queue.
    pub fn extend(&mut self, other: DiagnosticQueue) {
        let stored = other.diagnostics.iter().filter(|d| d.is_error()).count();
        // Errors `other` counted past its own limit still count here.
        self.error_count += other.error_count.saturating_sub(stored);
        for diagnostic in other.diagnostics {
            self.push(diagnostic);
        }
    }

    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Diagnostics in source order; diagnostics without a span keep their
    /// emission order at the front.
    pub fn flush(self) -> Vec<Diagnostic> {
        let mut diagnostics = self.diagnostics;
        diagnostics.sort_by_key(|d| d.primary_span().map_or(0, |s: Span| s.start));
        diagnostics
    }
}
