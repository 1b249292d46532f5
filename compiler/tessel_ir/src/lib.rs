//! Tessel IR - shared identifier and location types.
//!
//! Every other Tessel crate names things through this crate:
//! - [`Name`] for interned identifiers (specializations, parameters,
//!   host functions, exception kinds)
//! - [`StringInterner`] / [`SharedInterner`] to create and resolve names
//! - [`Span`] for the declaration site a front end attaches to a model element
//!
//! # Design Philosophy
//!
//! - **Intern Everything**: identifiers become `Name(u32)` so guard
//!   comparisons and exclusion sets are integer operations.
//! - **Copy handles**: `Name` and `Span` are `Copy` and cheap to pass.

mod interner;
mod name;
mod span;

pub use interner::{InternError, SharedInterner, StringInterner};
pub use name::Name;
pub use span::Span;
