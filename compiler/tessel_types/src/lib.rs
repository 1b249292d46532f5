//! Type system for Tessel.
//!
//! Describes the value domain every specialization model is written
//! against:
//!
//! - [`TypeIdx`]: 32-bit handle into a [`TypeSystem`]; index 0 is always the
//!   generic top type.
//! - [`TypeDescriptor`]: one type of the lattice, with its check/cast
//!   predicate pair and ordered implicit source types.
//! - [`TypeSystem`] / [`SharedTypeSystem`]: built once by
//!   [`TypeSystemBuilder`], then shared immutably by every node.
//! - [`Value`] and [`Assumption`]: the runtime values guards and bodies see.
//!
//! # Casts
//!
//! Implicit casts are value preserving. A widening that would lose
//! information (e.g. a `long` too large for a `double` mantissa) fails
//! instead of truncating; narrowing is only available through the explicit
//! [`narrow`] operation.

mod assumption;
mod descriptor;
mod idx;
mod system;
mod value;

pub use assumption::Assumption;
pub use descriptor::{CastFn, CheckFn, TypeDescriptor, TypeKind};
pub use idx::{standard, TypeIdx};
pub use system::{
    CastPath, Coerced, ImplicitCast, NoCastAvailable, SharedTypeSystem, TypeSystem,
    TypeSystemBuilder, TypeSystemErrors,
};
pub use value::{narrow, NarrowTarget, NarrowingError, Value};
