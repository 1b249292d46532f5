//! Diagnostic queue for collecting and sorting diagnostics.

use std::fmt;

use crate::Diagnostic;

/// Proof that at least one error diagnostic was emitted.
///
/// Only [`DiagnosticQueue::emit_error`] and
/// [`ErrorGuaranteed::from_error_count`] construct one.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct ErrorGuaranteed(());

impl ErrorGuaranteed {
    /// Get a guarantee if `count` errors were reported.
    pub fn from_error_count(count: usize) -> Option<Self> {
        (count > 0).then_some(ErrorGuaranteed(()))
    }
}

impl fmt::Display for ErrorGuaranteed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error(s) emitted")
    }
}

/// Collects diagnostics in emission order.
///
/// Exact duplicates (same code, message and primary span) are dropped: the
/// same dangling reference is often reached from several declarations.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DiagnosticQueue {
    diagnostics: Vec<Diagnostic>,
    error_count: usize,
}

impl DiagnosticQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic. Returns `false` if it duplicated an earlier one.
    pub fn push(&mut self, diag: Diagnostic) -> bool {
        let duplicate = self.diagnostics.iter().any(|d| {
            d.code == diag.code
                && d.message == diag.message
                && d.primary_span() == diag.primary_span()
        });
        if duplicate {
            return false;
        }
        if diag.is_error() {
            self.error_count += 1;
        }
        self.diagnostics.push(diag);
        true
    }

    /// Add an error diagnostic and return proof that an error was emitted.
    pub fn emit_error(&mut self, diag: Diagnostic) -> ErrorGuaranteed {
        debug_assert!(diag.is_error(), "emit_error called with a non-error");
        self.push(diag);
        ErrorGuaranteed(())
    }

    /// Number of errors collected.
    pub fn error_count(&self) -> usize {
        self.error_count
    }

    /// True if any error was collected.
    pub fn has_errors(&self) -> bool {
        self.error_count > 0
    }

    /// Number of diagnostics of any severity.
    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    /// True if nothing was collected.
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Iterate in emission order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Drain the queue sorted by primary span start; diagnostics without a
    /// span keep their relative order and come last.
    pub fn flush(&mut self) -> Vec<Diagnostic> {
        self.error_count = 0;
        let mut diagnostics = std::mem::take(&mut self.diagnostics);
        diagnostics.sort_by_key(|d| d.primary_span().map_or(u32::MAX, |s| s.start));
        diagnostics
    }
}
