//! Errors surfaced by adaptive execution, and the internal rewrite signals
//! that never reach callers.

use std::fmt;

use tessel_cache::{CacheSignal, LimitError};
use tessel_ir::Name;
use tessel_model::{EvalError, SpecId, Thrown};
use tessel_types::Value;

/// Why no legal behavior exists for a call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnsupportedReason {
    /// No specialization accepts the arguments and there is no fallback.
    NoMatch,
    /// A new instance would exceed the specialization's limit and nothing
    /// generic can take over.
    CacheLimitExceeded { spec: &'static str, limit: u32 },
    /// The chain is full and nothing generic can take over.
    PolymorphicLimitExceeded { limit: usize },
}

impl fmt::Display for UnsupportedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsupportedReason::NoMatch => f.write_str("no specialization matched"),
            UnsupportedReason::CacheLimitExceeded { spec, limit } => {
                write!(f, "instance limit {limit} of `{spec}` exceeded")
            }
            UnsupportedReason::PolymorphicLimitExceeded { limit } => {
                write!(f, "polymorphic limit {limit} exceeded")
            }
        }
    }
}

/// A call for which no specialization applies.
#[derive(Clone, Debug, PartialEq)]
pub struct UnsupportedSpecialization {
    pub node: &'static str,
    pub args: Vec<Value>,
    /// Specializations attempted, in attempt order.
    pub tried: Vec<&'static str>,
    pub reason: UnsupportedReason,
}

impl fmt::Display for UnsupportedSpecialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported specialization of `{}` for (", self.node)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg:?}")?;
        }
        write!(f, "): {}; tried [{}]", self.reason, self.tried.join(", "))
    }
}

impl std::error::Error for UnsupportedSpecialization {}

/// Failure of [`AdaptiveNode::execute`](crate::AdaptiveNode::execute).
#[derive(Clone, Debug, thiserror::Error)]
pub enum ExecError {
    #[error(transparent)]
    Unsupported(Box<UnsupportedSpecialization>),
    /// A body raised an exception its specialization does not rewrite on.
    #[error(transparent)]
    Thrown(#[from] Thrown),
    #[error("guard evaluation failed: {0}")]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Limit(#[from] LimitError),
    #[error("`{node}` takes {expected} argument(s), got {found}")]
    ArityMismatch {
        node: &'static str,
        expected: usize,
        found: usize,
    },
}

impl ExecError {
    pub fn as_unsupported(&self) -> Option<&UnsupportedSpecialization> {
        match self {
            ExecError::Unsupported(u) => Some(u),
            _ => None,
        }
    }
}

impl From<UnsupportedSpecialization> for ExecError {
    fn from(u: UnsupportedSpecialization) -> Self {
        ExecError::Unsupported(Box::new(u))
    }
}

/// Why the fast path handed a call to the rewrite protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum RewriteSignal {
    /// No live instance accepted the arguments.
    Miss,
    /// An instance's assumption was found invalid.
    Invalidated { serial: u64, signal: CacheSignal },
    /// A body raised one of its specialization's rewrite exceptions.
    Exception { spec: SpecId, exception: Name },
}
