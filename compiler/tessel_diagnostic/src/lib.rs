//! Diagnostic system for specialization model construction.
//!
//! Model construction is the only place Tessel reports structured
//! diagnostics: everything that can be decided statically (missing casts,
//! dangling `contains` references, unreachable specializations) is reported
//! here, before any node runs.
//!
//! - Error codes for searchability
//! - Clear messages (what went wrong)
//! - Primary span (which declaration)
//! - Notes (why it is wrong)
//!
//! # Error Guarantees
//!
//! [`ErrorGuaranteed`] can only be obtained by pushing an error into a
//! [`DiagnosticQueue`], so a builder that returns it has provably reported
//! the failure.

mod diagnostic;
mod error_code;
mod queue;

pub use diagnostic::{Diagnostic, Label, Severity};
pub use error_code::ErrorCode;
pub use queue::{DiagnosticQueue, ErrorGuaranteed};
