//! Runtime values observed by adaptive nodes.

use std::fmt;
use std::sync::Arc;

use crate::Assumption;

/// A runtime value.
///
/// Cheap to clone: strings are reference counted, assumptions are shared
/// handles.
#[derive(Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Str(Arc<str>),
    Assumption(Assumption),
}

impl Value {
    /// Create a string value.
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    /// Short name of the value's variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Double(_) => "double",
            Value::Str(_) => "string",
            Value::Assumption(_) => "assumption",
        }
    }

    /// Get the boolean payload.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get an integral payload widened to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(i64::from(*i)),
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    /// Get a numeric payload as `f64`, only if exactly representable.
    pub fn as_f64_exact(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(f64::from(*i)),
            Value::Long(l) => long_to_double_exact(*l),
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Get the assumption handle.
    pub fn as_assumption(&self) -> Option<&Assumption> {
        match self {
            Value::Assumption(a) => Some(a),
            _ => None,
        }
    }
}

/// Widen a `long` to `double` only when the round trip is lossless.
#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    reason = "the round trip below rejects every lossy conversion"
)]
pub(crate) fn long_to_double_exact(l: i64) -> Option<f64> {
    let d = l as f64;
    // i64::MAX rounds up to 2^63, which saturates back to i64::MAX.
    if d >= 9_223_372_036_854_775_808.0 {
        return None;
    }
    (d as i64 == l).then_some(d)
}

impl PartialEq for Value {
    #[allow(clippy::float_cmp, reason = "IEEE equality is the intended semantics")]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Assumption(a), Value::Assumption(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Long(l) => write!(f, "{l}L"),
            Value::Double(d) => write!(f, "{d:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Assumption(a) => write!(f, "{a:?}"),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            other => write!(f, "{other:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i)
    }
}

impl From<i64> for Value {
    fn from(l: i64) -> Self {
        Value::Long(l)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

/// Target of an explicit narrowing conversion.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum NarrowTarget {
    Int,
    Long,
}

/// A narrowing conversion would lose information.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("cannot narrow {value:?} to {target:?} without losing information")]
pub struct NarrowingError {
    pub value: Value,
    pub target: NarrowTarget,
}

/// Explicitly narrow a numeric value.
///
/// Implicit casts never truncate; callers that want `long → int` or
/// `double → long` go through here and get an error for out-of-range or
/// fractional inputs.
pub fn narrow(value: &Value, target: NarrowTarget) -> Result<Value, NarrowingError> {
    let fail = || NarrowingError {
        value: value.clone(),
        target,
    };
    let integral = match value {
        Value::Int(i) => i64::from(*i),
        Value::Long(l) => *l,
        Value::Double(d) => double_to_long_exact(*d).ok_or_else(fail)?,
        _ => return Err(fail()),
    };
    match target {
        NarrowTarget::Long => Ok(Value::Long(integral)),
        NarrowTarget::Int => i32::try_from(integral).map(Value::Int).map_err(|_| fail()),
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "range and fraction are checked before the cast"
)]
fn double_to_long_exact(d: f64) -> Option<i64> {
    const BOUND: f64 = 9_223_372_036_854_775_808.0;
    // -2^63 is representable, 2^63 is not.
    if !d.is_finite() || d.fract() != 0.0 || !(-BOUND..BOUND).contains(&d) {
        return None;
    }
    Some(d as i64)
}

#[cfg(test)]
mod tests;
