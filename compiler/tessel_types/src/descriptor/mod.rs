//! Type descriptors.

use smallvec::SmallVec;

use crate::{TypeIdx, Value};

/// Type check predicate: does the value belong to the type?
pub type CheckFn = fn(&Value) -> bool;

/// Type cast: view a value that passed the check as the type's
/// representation. Returns `None` if the value cannot be represented.
pub type CastFn = fn(&Value) -> Option<Value>;

/// Representation class of a type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum TypeKind {
    /// Unboxed machine value (`int`, `double`, ...).
    Primitive,
    /// Heap value (`String`, user object types).
    Boxed,
    /// The generic top type.
    Generic,
}

/// One type of the lattice.
#[derive(Clone, Debug)]
pub struct TypeDescriptor {
    pub idx: TypeIdx,
    pub name: String,
    pub kind: TypeKind,
    /// Types with a declared implicit widening to this one, in declaration
    /// order. The order is the tie-break priority when a value matches
    /// several sources.
    pub implicit_sources: SmallVec<[TypeIdx; 4]>,
    pub check: CheckFn,
    pub cast: CastFn,
}

impl TypeDescriptor {
    /// True for primitive (unboxed) types.
    pub fn is_primitive(&self) -> bool {
        self.kind == TypeKind::Primitive
    }

    /// True if at least one implicit source widens to this type.
    pub fn has_implicit_sources(&self) -> bool {
        !self.implicit_sources.is_empty()
    }
}

/// Default cast: identity for values that pass `check`.
#[allow(clippy::unnecessary_wraps, reason = "must match `CastFn`")]
pub(crate) fn identity_cast(value: &Value) -> Option<Value> {
    Some(value.clone())
}

pub(crate) fn accept_all(_: &Value) -> bool {
    true
}
