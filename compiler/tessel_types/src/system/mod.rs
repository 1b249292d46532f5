//! Type system construction and cast resolution.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tessel_diagnostic::{Diagnostic, DiagnosticQueue, ErrorCode};

use crate::descriptor::{accept_all, identity_cast};
use crate::value::long_to_double_exact;
use crate::{standard, CastFn, CheckFn, TypeDescriptor, TypeIdx, TypeKind, Value};

/// A declared implicit widening from one type to another.
#[derive(Clone, Copy)]
pub struct ImplicitCast {
    pub from: TypeIdx,
    pub to: TypeIdx,
    pub convert: CastFn,
}

impl PartialEq for ImplicitCast {
    fn eq(&self, other: &Self) -> bool {
        // At most one cast per (from, to) pair exists in a valid type system.
        self.from == other.from && self.to == other.to
    }
}

impl fmt::Debug for ImplicitCast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ImplicitCast({:?} -> {:?})", self.from, self.to)
    }
}

/// How a value of one type reaches another.
#[derive(Clone, Debug, PartialEq)]
pub enum CastPath {
    /// Same type, or the target is generic.
    Identity,
    /// A declared implicit source of the target.
    Direct(ImplicitCast),
    /// Through one or more intermediate types, applied left to right.
    Chain(SmallVec<[ImplicitCast; 2]>),
}

impl CastPath {
    /// Number of conversion steps.
    pub fn len(&self) -> usize {
        match self {
            CastPath::Identity => 0,
            CastPath::Direct(_) => 1,
            CastPath::Chain(steps) => steps.len(),
        }
    }

    /// True for the identity path.
    pub fn is_empty(&self) -> bool {
        matches!(self, CastPath::Identity)
    }
}

/// No implicit cast connects two types.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("no implicit cast from `{from_name}` to `{to_name}`")]
pub struct NoCastAvailable {
    pub from: TypeIdx,
    pub to: TypeIdx,
    pub from_name: String,
    pub to_name: String,
}

/// A value accepted by a type, possibly after an implicit cast.
#[derive(Clone, Debug, PartialEq)]
pub struct Coerced {
    pub value: Value,
    /// The type the original value matched: the target itself or one of its
    /// implicit sources.
    pub source: TypeIdx,
}

/// Errors found while building a type system.
#[derive(Clone, Debug, thiserror::Error)]
#[error("type system has {} error(s)", .diagnostics.len())]
pub struct TypeSystemErrors {
    pub diagnostics: Vec<Diagnostic>,
}

/// The value lattice shared by every node of a language.
#[derive(Debug)]
pub struct TypeSystem {
    types: Vec<TypeDescriptor>,
    by_name: FxHashMap<String, TypeIdx>,
    casts: Vec<ImplicitCast>,
}

impl TypeSystem {
    /// `Object`, `unit`, `boolean`, `int`, `long`, `double`, `string` with
    /// the widenings `int → long`, `int → double`, `long → double`.
    ///
    /// Indices match the constants in [`standard`].
    pub fn standard() -> TypeSystem {
        let mut b = TypeSystemBuilder::new();
        b.declare("unit", TypeKind::Primitive, |v| matches!(v, Value::Unit));
        b.declare("boolean", TypeKind::Primitive, |v| matches!(v, Value::Bool(_)));
        let int = b.declare("int", TypeKind::Primitive, |v| matches!(v, Value::Int(_)));
        let long = b.declare("long", TypeKind::Primitive, |v| matches!(v, Value::Long(_)));
        let double = b.declare("double", TypeKind::Primitive, |v| {
            matches!(v, Value::Double(_))
        });
        b.declare("string", TypeKind::Boxed, |v| matches!(v, Value::Str(_)));

        b.implicit_cast(int, long, |v| v.as_i64().map(Value::Long));
        b.implicit_cast(int, double, |v| match v {
            Value::Int(i) => Some(Value::Double(f64::from(*i))),
            _ => None,
        });
        b.implicit_cast(long, double, |v| match v {
            Value::Long(l) => long_to_double_exact(*l).map(Value::Double),
            _ => None,
        });

        debug_assert_eq!(long, standard::LONG);
        b.finish()
    }

    /// Get a descriptor.
    pub fn get(&self, idx: TypeIdx) -> Option<&TypeDescriptor> {
        self.types.get(idx.index())
    }

    /// Display name of a type.
    pub fn name(&self, idx: TypeIdx) -> &str {
        self.get(idx).map_or("<unknown type>", |d| d.name.as_str())
    }

    /// Find a type by name.
    pub fn lookup(&self, name: &str) -> Option<TypeIdx> {
        self.by_name.get(name).copied()
    }

    /// Number of declared types, including the generic type.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Always false: the generic type is always declared.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Iterate descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.types.iter()
    }

    /// Declared implicit casts in declaration order.
    pub fn implicit_casts(&self) -> &[ImplicitCast] {
        &self.casts
    }

    /// False iff `from` is `to` or `to` is the generic type.
    pub fn needs_cast(&self, from: TypeIdx, to: TypeIdx) -> bool {
        !(from == to || to.is_generic())
    }

    /// Ordered types with a declared implicit widening to `target`.
    pub fn lookup_implicit_sources(&self, target: TypeIdx) -> &[TypeIdx] {
        self.get(target)
            .map_or(&[][..], |d| d.implicit_sources.as_slice())
    }

    /// Resolve how values of `from` reach `to`.
    ///
    /// Prefers the identity, then a direct implicit cast, then the shortest
    /// chain through intermediate types (ties go to the earlier declared
    /// cast).
    pub fn resolve_cast(&self, from: TypeIdx, to: TypeIdx) -> Result<CastPath, NoCastAvailable> {
        if !self.needs_cast(from, to) {
            return Ok(CastPath::Identity);
        }
        if let Some(cast) = self.casts.iter().find(|c| c.from == from && c.to == to) {
            return Ok(CastPath::Direct(*cast));
        }
        self.shortest_chain(from, to)
            .map(CastPath::Chain)
            .ok_or_else(|| self.no_cast(from, to))
    }

    fn shortest_chain(&self, from: TypeIdx, to: TypeIdx) -> Option<SmallVec<[ImplicitCast; 2]>> {
        let mut reached_by: FxHashMap<TypeIdx, usize> = FxHashMap::default();
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut steps = SmallVec::new();
                let mut at = to;
                while at != from {
                    let cast = self.casts[reached_by[&at]];
                    steps.push(cast);
                    at = cast.from;
                }
                steps.reverse();
                return Some(steps);
            }
            for (i, cast) in self.casts.iter().enumerate() {
                if cast.from == current && cast.to != from && !reached_by.contains_key(&cast.to) {
                    reached_by.insert(cast.to, i);
                    queue.push_back(cast.to);
                }
            }
        }
        None
    }

    fn no_cast(&self, from: TypeIdx, to: TypeIdx) -> NoCastAvailable {
        NoCastAvailable {
            from,
            to,
            from_name: self.name(from).to_owned(),
            to_name: self.name(to).to_owned(),
        }
    }

    /// Apply a resolved path. `None` if a step cannot represent the value.
    pub fn cast_value(&self, path: &CastPath, value: &Value) -> Option<Value> {
        match path {
            CastPath::Identity => Some(value.clone()),
            CastPath::Direct(cast) => (cast.convert)(value),
            CastPath::Chain(steps) => steps
                .iter()
                .try_fold(value.clone(), |v, step| (step.convert)(&v)),
        }
    }

    /// Run a type's check predicate.
    pub fn check(&self, idx: TypeIdx, value: &Value) -> bool {
        self.get(idx).is_some_and(|d| (d.check)(value))
    }

    /// Most specific declared type of a value: the first non-generic type
    /// whose check accepts it, else the generic type.
    pub fn type_of(&self, value: &Value) -> TypeIdx {
        self.types
            .iter()
            .skip(1)
            .find(|d| (d.check)(value))
            .map_or(TypeIdx::GENERIC, |d| d.idx)
    }

    /// Accept `value` as `target`, widening through implicit sources.
    ///
    /// Tries the target's own check, then each implicit source in
    /// declaration order, then a chained cast from the value's own type.
    /// Returns `None` if the value is not an instance of `target` under any
    /// value-preserving conversion.
    pub fn coerce(&self, value: &Value, target: TypeIdx) -> Option<Coerced> {
        let sources = self.lookup_implicit_sources(target);
        self.coerce_via(value, target, sources)
    }

    /// [`coerce`](Self::coerce) with the direct implicit sources tried in
    /// the given order instead of declaration order.
    pub fn coerce_via(&self, value: &Value, target: TypeIdx, sources: &[TypeIdx]) -> Option<Coerced> {
        let desc = self.get(target)?;
        if target.is_generic() || (desc.check)(value) {
            return (desc.cast)(value).map(|value| Coerced {
                value,
                source: target,
            });
        }
        for &source in sources {
            if !self.check(source, value) {
                continue;
            }
            let widened = self
                .casts
                .iter()
                .find(|c| c.from == source && c.to == target)
                .and_then(|c| (c.convert)(value));
            if let Some(value) = widened {
                return Some(Coerced { value, source });
            }
        }
        let own = self.type_of(value);
        if own.is_generic() {
            return None;
        }
        match self.resolve_cast(own, target) {
            Ok(path @ CastPath::Chain(_)) => self
                .cast_value(&path, value)
                .map(|value| Coerced { value, source: own }),
            _ => None,
        }
    }
}

/// Shared, immutable type system handle.
///
/// Built once per language and handed to every node model; cast and check
/// tables are read concurrently without locking.
#[derive(Clone, Debug)]
pub struct SharedTypeSystem(Arc<TypeSystem>);

impl SharedTypeSystem {
    /// Share a built type system.
    pub fn new(types: TypeSystem) -> Self {
        SharedTypeSystem(Arc::new(types))
    }

    /// Shared handle to [`TypeSystem::standard`].
    pub fn standard() -> Self {
        Self::new(TypeSystem::standard())
    }

    /// True if both handles share one type system.
    pub fn ptr_eq(&self, other: &SharedTypeSystem) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl std::ops::Deref for SharedTypeSystem {
    type Target = TypeSystem;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Builder for a [`TypeSystem`].
///
/// The generic top type `Object` is pre-declared at [`TypeIdx::GENERIC`].
pub struct TypeSystemBuilder {
    types: Vec<TypeDescriptor>,
    casts: Vec<ImplicitCast>,
}

impl TypeSystemBuilder {
    /// Create a builder holding only the generic type.
    pub fn new() -> Self {
        TypeSystemBuilder {
            types: vec![TypeDescriptor {
                idx: TypeIdx::GENERIC,
                name: "Object".to_owned(),
                kind: TypeKind::Generic,
                implicit_sources: SmallVec::new(),
                check: accept_all,
                cast: identity_cast,
            }],
            casts: Vec::new(),
        }
    }

    /// Declare a type with the identity cast.
    pub fn declare(&mut self, name: &str, kind: TypeKind, check: CheckFn) -> TypeIdx {
        self.declare_with_cast(name, kind, check, identity_cast)
    }

    /// Declare a type with a custom cast.
    pub fn declare_with_cast(
        &mut self,
        name: &str,
        kind: TypeKind,
        check: CheckFn,
        cast: CastFn,
    ) -> TypeIdx {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "type systems hold a handful of types"
        )]
        let idx = TypeIdx::from_raw(self.types.len() as u32);
        self.types.push(TypeDescriptor {
            idx,
            name: name.to_owned(),
            kind,
            implicit_sources: SmallVec::new(),
            check,
            cast,
        });
        idx
    }

    /// Declare an implicit widening `from → to`.
    pub fn implicit_cast(&mut self, from: TypeIdx, to: TypeIdx, convert: CastFn) -> &mut Self {
        self.casts.push(ImplicitCast { from, to, convert });
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<TypeSystem, TypeSystemErrors> {
        let mut queue = DiagnosticQueue::new();
        self.check_names(&mut queue);
        self.check_casts(&mut queue);
        if queue.has_errors() {
            return Err(TypeSystemErrors {
                diagnostics: queue.flush(),
            });
        }
        Ok(self.finish())
    }

    fn check_names(&self, queue: &mut DiagnosticQueue) {
        let mut seen = FxHashSet::default();
        for desc in &self.types {
            if !seen.insert(desc.name.as_str()) {
                queue.push(
                    Diagnostic::error(ErrorCode::E1001)
                        .with_message(format!("type `{}` is declared twice", desc.name)),
                );
            }
        }
    }

    fn check_casts(&self, queue: &mut DiagnosticQueue) {
        let count = self.types.len();
        let name = |idx: TypeIdx| {
            self.types
                .get(idx.index())
                .map_or_else(|| format!("#{}", idx.raw()), |d| d.name.clone())
        };
        let mut pairs = FxHashSet::default();
        for cast in &self.casts {
            for end in [cast.from, cast.to] {
                if end.index() >= count {
                    queue.push(Diagnostic::error(ErrorCode::E1002).with_message(format!(
                        "implicit cast references undeclared type #{}",
                        end.raw()
                    )));
                }
            }
            if !pairs.insert((cast.from, cast.to)) {
                queue.push(Diagnostic::error(ErrorCode::E1001).with_message(format!(
                    "implicit cast from `{}` to `{}` is declared twice",
                    name(cast.from),
                    name(cast.to)
                )));
            }
            if cast.to.is_generic() || cast.from.is_generic() {
                queue.push(Diagnostic::error(ErrorCode::E1004).with_message(format!(
                    "implicit cast from `{}` to `{}` involves the generic type",
                    name(cast.from),
                    name(cast.to)
                )));
            }
        }
        if let Some(cycle) = self.find_cycle() {
            let path: Vec<String> = cycle.iter().map(|&t| name(t)).collect();
            queue.push(
                Diagnostic::error(ErrorCode::E1004)
                    .with_message(format!("implicit casts form a cycle: {}", path.join(" -> ")))
                    .with_note("implicit widening must be acyclic"),
            );
        }
    }

    /// Depth-first search for a cycle in the cast graph.
    fn find_cycle(&self) -> Option<Vec<TypeIdx>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Active,
            Done,
        }

        fn visit(
            node: TypeIdx,
            casts: &[ImplicitCast],
            marks: &mut FxHashMap<TypeIdx, Mark>,
            stack: &mut Vec<TypeIdx>,
        ) -> Option<Vec<TypeIdx>> {
            marks.insert(node, Mark::Active);
            stack.push(node);
            for cast in casts.iter().filter(|c| c.from == node) {
                match marks.get(&cast.to).copied().unwrap_or(Mark::Unvisited) {
                    Mark::Active => {
                        let start = stack.iter().position(|&t| t == cast.to).unwrap_or(0);
                        let mut cycle = stack[start..].to_vec();
                        cycle.push(cast.to);
                        return Some(cycle);
                    }
                    Mark::Unvisited => {
                        if let Some(cycle) = visit(cast.to, casts, marks, stack) {
                            return Some(cycle);
                        }
                    }
                    Mark::Done => {}
                }
            }
            stack.pop();
            marks.insert(node, Mark::Done);
            None
        }

        let mut marks = FxHashMap::default();
        for cast in &self.casts {
            if marks.get(&cast.from).copied().unwrap_or(Mark::Unvisited) == Mark::Unvisited {
                let mut stack = Vec::new();
                if let Some(cycle) = visit(cast.from, &self.casts, &mut marks, &mut stack) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    /// Assemble without validation.
    fn finish(mut self) -> TypeSystem {
        for cast in &self.casts {
            if let Some(target) = self.types.get_mut(cast.to.index()) {
                if !target.implicit_sources.contains(&cast.from) {
                    target.implicit_sources.push(cast.from);
                }
            }
        }
        let by_name = self
            .types
            .iter()
            .map(|d| (d.name.clone(), d.idx))
            .collect();
        tracing::trace!(
            types = self.types.len(),
            casts = self.casts.len(),
            "type system built"
        );
        TypeSystem {
            types: self.types,
            by_name,
            casts: self.casts,
        }
    }
}

impl Default for TypeSystemBuilder {
    fn default() -> Self {
        Self::new()
    }
}
