//! Invalidatable assumptions.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct AssumptionInner {
    name: String,
    valid: AtomicBool,
}

/// A handle to an externally invalidatable boolean.
///
/// Invalidation is monotonic: once [`invalidate`](Self::invalidate) has
/// run, [`is_valid`](Self::is_valid) returns `false` forever. Clones share
/// the same flag; equality is identity.
#[derive(Clone)]
pub struct Assumption(Arc<AssumptionInner>);

impl Assumption {
    /// Create a new, valid assumption.
    pub fn new(name: impl Into<String>) -> Self {
        Assumption(Arc::new(AssumptionInner {
            name: name.into(),
            valid: AtomicBool::new(true),
        }))
    }

    /// Name given at creation, for diagnostics.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Check the flag.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0.valid.load(Ordering::Acquire)
    }

    /// Invalidate. Returns `true` if this call flipped the flag.
    pub fn invalidate(&self) -> bool {
        let flipped = self.0.valid.swap(false, Ordering::AcqRel);
        if flipped {
            tracing::debug!(assumption = %self.0.name, "assumption invalidated");
        }
        flipped
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Assumption) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Assumption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_valid() { "valid" } else { "invalid" };
        write!(f, "Assumption({}, {state})", self.0.name)
    }
}
