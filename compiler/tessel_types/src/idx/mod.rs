//! Type index handle.

use std::fmt;

/// A 32-bit index into a [`TypeSystem`](crate::TypeSystem).
///
/// Types are compared by index equality, never structurally. Index 0 is
/// reserved for the generic top type in every type system.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct TypeIdx(u32);

impl TypeIdx {
    /// The generic top type. Every value is an instance of it.
    pub const GENERIC: Self = Self(0);

    /// Create an index from a raw u32 value.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Get the raw u32 value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Position in the owning type system's descriptor table.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Check if this is the generic top type.
    #[inline]
    pub const fn is_generic(self) -> bool {
        self.0 == Self::GENERIC.0
    }
}

impl fmt::Debug for TypeIdx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_generic() {
            write!(f, "TypeIdx(generic)")
        } else {
            write!(f, "TypeIdx({})", self.0)
        }
    }
}

/// Fixed indices of the types declared by [`TypeSystem::standard`](crate::TypeSystem::standard).
pub mod standard {
    use super::TypeIdx;

    /// `Object`, the generic top type.
    pub const GENERIC: TypeIdx = TypeIdx::GENERIC;
    /// `void`.
    pub const UNIT: TypeIdx = TypeIdx::from_raw(1);
    /// `boolean`.
    pub const BOOLEAN: TypeIdx = TypeIdx::from_raw(2);
    /// `int` (32-bit).
    pub const INT: TypeIdx = TypeIdx::from_raw(3);
    /// `long` (64-bit), implicitly widened from `int`.
    pub const LONG: TypeIdx = TypeIdx::from_raw(4);
    /// `double`, implicitly widened from `int` and (exactly representable) `long`.
    pub const DOUBLE: TypeIdx = TypeIdx::from_raw(5);
    /// `String`.
    pub const STRING: TypeIdx = TypeIdx::from_raw(6);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generic_is_index_zero() {
        assert_eq!(TypeIdx::GENERIC.raw(), 0);
        assert!(TypeIdx::GENERIC.is_generic());
        assert!(!standard::INT.is_generic());
    }

    #[test]
    fn standard_indices_are_dense() {
        let all = [
            standard::GENERIC,
            standard::UNIT,
            standard::BOOLEAN,
            standard::INT,
            standard::LONG,
            standard::DOUBLE,
            standard::STRING,
        ];
        for (i, idx) in all.iter().enumerate() {
            assert_eq!(idx.index(), i);
        }
    }

    #[test]
    fn debug_names_generic() {
        assert_eq!(format!("{:?}", TypeIdx::GENERIC), "TypeIdx(generic)");
        assert_eq!(format!("{:?}", standard::LONG), "TypeIdx(4)");
    }
}
