//! One guarded alternative of a polymorphic operation.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use smallvec::SmallVec;
use tessel_ir::{Name, Span};
use tessel_types::{TypeIdx, Value};

use crate::{Expr, SpecSet};

/// Index of a specialization in its node model, in declaration order.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct SpecId(u32);

impl SpecId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Declaration index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for SpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpecId({})", self.0)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpecKind {
    Specialized,
    /// Catch-all taken when nothing else matches.
    Fallback,
}

bitflags! {
    /// Declared and computed properties of a specialization.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct SpecializationFlags: u8 {
        /// May serve as the node's generic behavior when there is no fallback.
        const GENERIC = 1 << 0;
        /// Declares at least one cache.
        const CACHED = 1 << 1;
        /// Can be removed after commit: rewrite exceptions, assumptions, or
        /// guard-bound caches.
        const REWRITABLE = 1 << 2;
        /// Has at least one guard hoisted to instance creation.
        const STATIC_GUARDS = 1 << 3;
    }
}

/// How a parameter gets its value.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamKind {
    /// The n-th executed child value.
    Signature(usize),
    /// The n-th per-call binding, computed before guards.
    Local(usize),
    /// The n-th cache, computed once per instance.
    Cached(usize),
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Parameter {
    pub name: Name,
    pub ty: TypeIdx,
    pub kind: ParamKind,
}

/// A per-call derived value, visible to guards and the body.
#[derive(Clone, PartialEq, Debug)]
pub struct LocalBinding {
    pub name: Name,
    pub ty: TypeIdx,
    pub init: Expr,
}

/// A required type for one signature position.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeGuard {
    pub index: usize,
    pub ty: TypeIdx,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GuardKind {
    /// Re-checked on every call.
    Dynamic,
    /// Reads only cached or constant state through pure functions; checked
    /// once when an instance is created.
    Static,
}

/// A boolean precondition.
#[derive(Clone, Debug)]
pub struct GuardExpression {
    /// The expression with any leading `!` stripped into `negated`.
    pub expr: Expr,
    pub negated: bool,
    pub free_vars: SmallVec<[Name; 4]>,
    pub kind: GuardKind,
    /// Indices of the caches this guard reads.
    pub caches: SmallVec<[usize; 2]>,
    pub span: Span,
}

impl GuardExpression {
    /// Normalize leading negations into the `negated` flag.
    ///
    /// `kind` and `caches` are filled in by the model builder.
    pub fn new(expr: Expr, span: Span) -> Self {
        let mut expr = expr;
        let mut negated = false;
        while let Expr::Not(inner) = expr {
            expr = *inner;
            negated = !negated;
        }
        let free_vars = expr.free_vars();
        GuardExpression {
            expr,
            negated,
            free_vars,
            kind: GuardKind::Dynamic,
            caches: SmallVec::new(),
            span,
        }
    }

    pub fn is_static(&self) -> bool {
        self.kind == GuardKind::Static
    }

    pub fn reads_cache(&self) -> bool {
        !self.caches.is_empty()
    }
}

/// A value computed once per instance.
#[derive(Clone, Debug)]
pub struct CacheExpression {
    pub name: Name,
    pub ty: TypeIdx,
    pub init: Expr,
    /// The cached value is a child node owned by the instance.
    pub adopt: bool,
    /// Some guard reads this cache, so it is computed before that guard.
    pub bound_by_guard: bool,
    pub span: Span,
}

/// An assumption handle captured when an instance is created.
#[derive(Clone, Debug)]
pub struct AssumptionExpression {
    pub name: Name,
    pub expr: Expr,
    pub span: Span,
}

/// An exception raised by a specialization body.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("exception {exception:?}: {message}")]
pub struct Thrown {
    pub exception: Name,
    pub message: String,
}

impl Thrown {
    pub fn new(exception: Name, message: impl Into<String>) -> Self {
        Thrown {
            exception,
            message: message.into(),
        }
    }
}

/// Values handed to a body: signature values after casts, locals, caches.
#[derive(Copy, Clone, Debug)]
pub struct BodyArgs<'a> {
    pub args: &'a [Value],
    pub locals: &'a [Value],
    pub cached: &'a [Value],
}

type BodyFn = dyn Fn(&BodyArgs<'_>) -> Result<Value, Thrown> + Send + Sync;

/// Executable implementation of a specialization.
#[derive(Clone)]
pub struct Body(Arc<BodyFn>);

impl Body {
    pub fn new(f: impl Fn(&BodyArgs<'_>) -> Result<Value, Thrown> + Send + Sync + 'static) -> Self {
        Body(Arc::new(f))
    }

    #[inline]
    pub fn call(&self, args: &BodyArgs<'_>) -> Result<Value, Thrown> {
        (self.0)(args)
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Body(..)")
    }
}

/// A validated specialization. Built only by
/// [`NodeModelBuilder`](crate::NodeModelBuilder).
#[derive(Clone, Debug)]
pub struct Specialization {
    pub id: SpecId,
    pub name: Name,
    pub span: Span,
    pub kind: SpecKind,
    pub flags: SpecializationFlags,
    /// All parameters in declaration order.
    pub parameters: Vec<Parameter>,
    /// Declared type per signature position.
    pub signature: SmallVec<[TypeIdx; 4]>,
    pub locals: Vec<LocalBinding>,
    /// Ascending by signature index, at most one per index.
    pub type_guards: SmallVec<[TypeGuard; 4]>,
    pub guards: Vec<GuardExpression>,
    pub caches: Vec<CacheExpression>,
    pub assumptions: Vec<AssumptionExpression>,
    pub rewrite_on: SmallVec<[Name; 2]>,
    /// Transitively closed.
    pub contains: SpecSet,
    pub excluded_by: SpecSet,
    pub limit: Option<Expr>,
    pub reachable: bool,
    pub shadowed_by: Option<SpecId>,
    pub body: Body,
}

impl Specialization {
    pub fn is_fallback(&self) -> bool {
        self.kind == SpecKind::Fallback
    }

    pub fn is_generic(&self) -> bool {
        self.is_fallback() || self.flags.contains(SpecializationFlags::GENERIC)
    }

    pub fn has_caches(&self) -> bool {
        !self.caches.is_empty()
    }

    pub fn is_rewritable(&self) -> bool {
        self.flags.contains(SpecializationFlags::REWRITABLE)
    }

    pub fn rewrites_on(&self, exception: Name) -> bool {
        self.rewrite_on.contains(&exception)
    }

    /// Declared type at a signature position.
    pub fn param_type(&self, index: usize) -> TypeIdx {
        self.signature.get(index).copied().unwrap_or(TypeIdx::GENERIC)
    }

    /// Resolve a bound name.
    pub fn binding(&self, name: Name) -> Option<ParamKind> {
        self.parameters
            .iter()
            .rev()
            .find(|p| p.name == name)
            .map(|p| p.kind)
    }

    /// Guard `i` of `self` and guard `j` of `other` test the same thing with
    /// the same polarity.
    pub fn same_guard(&self, i: usize, other: &Specialization, j: usize) -> bool {
        let (a, b) = (&self.guards[i], &other.guards[j]);
        a.negated == b.negated && self.same_expr(&a.expr, other, &b.expr)
    }

    /// Guard `i` of `self` is the syntactic negation of guard `j` of `other`.
    pub fn negates_guard(&self, i: usize, other: &Specialization, j: usize) -> bool {
        let (a, b) = (&self.guards[i], &other.guards[j]);
        a.negated != b.negated && self.same_expr(&a.expr, other, &b.expr)
    }

    /// Structural equality with names compared by what they are bound to:
    /// signature parameters by position, locals by their initializers, and
    /// caches only within one specialization.
    pub fn same_expr(&self, mine: &Expr, other: &Specialization, theirs: &Expr) -> bool {
        match (mine, theirs) {
            (Expr::Const(x), Expr::Const(y)) => x == y,
            (Expr::Var(x), Expr::Var(y)) => match (self.binding(*x), other.binding(*y)) {
                (Some(ParamKind::Signature(at)), Some(ParamKind::Signature(other_at))) => {
                    at == other_at
                }
                (Some(ParamKind::Local(at)), Some(ParamKind::Local(other_at))) => {
                    let (local, other_local) = (&self.locals[at], &other.locals[other_at]);
                    local.ty == other_local.ty
                        && self.same_expr(&local.init, other, &other_local.init)
                }
                (Some(ParamKind::Cached(at)), Some(ParamKind::Cached(other_at))) => {
                    self.id == other.id && at == other_at
                }
                (None, None) => x == y,
                _ => false,
            },
            (Expr::Not(x), Expr::Not(y)) => self.same_expr(x, other, y),
            (
                Expr::Binary { op, lhs, rhs },
                Expr::Binary {
                    op: op2,
                    lhs: lhs2,
                    rhs: rhs2,
                },
            ) => op == op2 && self.same_expr(lhs, other, lhs2) && self.same_expr(rhs, other, rhs2),
            (Expr::Call { func, args }, Expr::Call { func: f2, args: a2 }) => {
                func == f2
                    && args.len() == a2.len()
                    && args
                        .iter()
                        .zip(a2)
                        .all(|(x, y)| self.same_expr(x, other, y))
            }
            _ => false,
        }
    }

    /// Every guard of `self` also appears in `other`.
    pub fn guards_subset_of(&self, other: &Specialization) -> bool {
        (0..self.guards.len()).all(|i| (0..other.guards.len()).any(|j| self.same_guard(i, other, j)))
    }

    /// Caches some guard reads, in declaration order.
    pub fn guard_bound_caches(&self) -> impl Iterator<Item = (usize, &CacheExpression)> {
        self.caches.iter().enumerate().filter(|(_, c)| c.bound_by_guard)
    }
}
