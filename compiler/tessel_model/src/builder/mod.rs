//! Model construction and validation.
//!
//! A front end describes each specialization with a [`SpecializationDecl`]
//! and hands the list to a [`NodeModelBuilder`]. `build` resolves names,
//! checks every declaration, closes `contains` transitively, and runs the
//! reachability pass. All problems are collected before failing, so one
//! build reports every error.

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;
use tessel_diagnostic::{Diagnostic, DiagnosticQueue, ErrorCode};
use tessel_ir::{Name, SharedInterner, Span};
use tessel_types::{SharedTypeSystem, TypeIdx};

use crate::expr::FunctionTable;
use crate::model::{ModelErrors, NodeModel};
use crate::specialization::{
    AssumptionExpression, Body, BodyArgs, CacheExpression, GuardExpression, GuardKind,
    LocalBinding, ParamKind, Parameter, SpecId, SpecKind, Specialization, SpecializationFlags,
    Thrown, TypeGuard,
};
use crate::{reachability, Expr, ModelOptions, SpecSet};

#[derive(Clone, Debug)]
enum ParamDecl {
    Signature {
        name: Name,
        ty: TypeIdx,
    },
    Local {
        name: Name,
        ty: TypeIdx,
        init: Expr,
    },
    Cached {
        name: Name,
        ty: TypeIdx,
        init: Expr,
        adopt: bool,
        span: Span,
    },
}

impl ParamDecl {
    fn name(&self) -> Name {
        match self {
            ParamDecl::Signature { name, .. }
            | ParamDecl::Local { name, .. }
            | ParamDecl::Cached { name, .. } => *name,
        }
    }
}

/// Unvalidated description of one specialization, in front-end terms.
#[derive(Clone, Debug)]
pub struct SpecializationDecl {
    name: Name,
    span: Span,
    kind: SpecKind,
    generic: bool,
    params: Vec<ParamDecl>,
    guards: Vec<(Expr, Span)>,
    assumptions: Vec<AssumptionExpression>,
    rewrite_on: SmallVec<[Name; 2]>,
    contains: Vec<(Name, Span)>,
    limit: Option<Expr>,
    body: Body,
}

impl SpecializationDecl {
    pub fn new(
        name: Name,
        body: impl Fn(&BodyArgs<'_>) -> Result<tessel_types::Value, Thrown> + Send + Sync + 'static,
    ) -> Self {
        SpecializationDecl {
            name,
            span: Span::DUMMY,
            kind: SpecKind::Specialized,
            generic: false,
            params: Vec::new(),
            guards: Vec::new(),
            assumptions: Vec::new(),
            rewrite_on: SmallVec::new(),
            contains: Vec::new(),
            limit: None,
            body: Body::new(body),
        }
    }

    /// A catch-all taken when no other specialization matches.
    pub fn fallback(
        name: Name,
        body: impl Fn(&BodyArgs<'_>) -> Result<tessel_types::Value, Thrown> + Send + Sync + 'static,
    ) -> Self {
        let mut decl = Self::new(name, body);
        decl.kind = SpecKind::Fallback;
        decl
    }

    #[must_use]
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Mark as usable for generic dispatch when the node has no fallback.
    #[must_use]
    pub fn generic(mut self) -> Self {
        self.generic = true;
        self
    }

    /// Next signature parameter.
    #[must_use]
    pub fn param(mut self, name: Name, ty: TypeIdx) -> Self {
        self.params.push(ParamDecl::Signature { name, ty });
        self
    }

    /// A per-call binding computed from signature values before guards run.
    #[must_use]
    pub fn bind(mut self, name: Name, ty: TypeIdx, init: Expr) -> Self {
        self.params.push(ParamDecl::Local { name, ty, init });
        self
    }

    #[must_use]
    pub fn guard(mut self, expr: Expr) -> Self {
        self.guards.push((expr, Span::DUMMY));
        self
    }

    #[must_use]
    pub fn guard_at(mut self, expr: Expr, span: Span) -> Self {
        self.guards.push((expr, span));
        self
    }

    /// A value computed once per instance.
    #[must_use]
    pub fn cached(mut self, name: Name, ty: TypeIdx, init: Expr) -> Self {
        self.params.push(ParamDecl::Cached {
            name,
            ty,
            init,
            adopt: false,
            span: Span::DUMMY,
        });
        self
    }

    /// A cached child node the instance adopts.
    #[must_use]
    pub fn adopted(mut self, name: Name, ty: TypeIdx, init: Expr) -> Self {
        self.params.push(ParamDecl::Cached {
            name,
            ty,
            init,
            adopt: true,
            span: Span::DUMMY,
        });
        self
    }

    #[must_use]
    pub fn assumption(mut self, name: Name, expr: Expr) -> Self {
        self.assumptions.push(AssumptionExpression {
            name,
            expr,
            span: Span::DUMMY,
        });
        self
    }

    #[must_use]
    pub fn rewrite_on(mut self, exception: Name) -> Self {
        self.rewrite_on.push(exception);
        self
    }

    /// Committing this specialization excludes `other`.
    #[must_use]
    pub fn contains(mut self, other: Name) -> Self {
        self.contains.push((other, Span::DUMMY));
        self
    }

    /// Instance limit; must be a constant expression.
    #[must_use]
    pub fn limit(mut self, expr: Expr) -> Self {
        self.limit = Some(expr);
        self
    }
}

/// Builds a validated [`NodeModel`].
pub struct NodeModelBuilder {
    name: Name,
    signature: SmallVec<[TypeIdx; 4]>,
    types: SharedTypeSystem,
    interner: SharedInterner,
    functions: FunctionTable,
    options: ModelOptions,
    decls: Vec<SpecializationDecl>,
}

impl NodeModelBuilder {
    /// `signature` holds the type each child produces.
    pub fn new(
        name: Name,
        signature: impl IntoIterator<Item = TypeIdx>,
        types: SharedTypeSystem,
        interner: SharedInterner,
    ) -> Self {
        NodeModelBuilder {
            name,
            signature: signature.into_iter().collect(),
            types,
            interner,
            functions: FunctionTable::new(),
            options: ModelOptions::default(),
            decls: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_functions(mut self, functions: FunctionTable) -> Self {
        self.functions = functions;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.options = options;
        self
    }

    /// Append a specialization; declaration order is priority order.
    pub fn add(&mut self, decl: SpecializationDecl) -> &mut Self {
        self.decls.push(decl);
        self
    }

    /// Validate and assemble.
    pub fn build(self) -> Result<NodeModel, ModelErrors> {
        let mut queue = DiagnosticQueue::new();
        let mut warnings = Vec::new();

        let cx = Cx {
            types: &self.types,
            interner: &self.interner,
            functions: &self.functions,
            signature: &self.signature,
        };

        // 1. SIGNATURE: child types must exist.
        for (i, &ty) in self.signature.iter().enumerate() {
            if self.types.get(ty).is_none() {
                queue.push(
                    Diagnostic::error(ErrorCode::E1002)
                        .with_message(format!("signature position {i} has undeclared type #{}", ty.raw())),
                );
            }
        }

        // 2. NAMES: specialization names are unique.
        let mut ids: FxHashMap<Name, SpecId> = FxHashMap::default();
        for (i, decl) in self.decls.iter().enumerate() {
            #[expect(
                clippy::cast_possible_truncation,
                reason = "a node declares a handful of specializations"
            )]
            let id = SpecId::from_raw(i as u32);
            if ids.insert(decl.name, id).is_some() {
                queue.push(
                    Diagnostic::error(ErrorCode::E2001)
                        .with_message(format!(
                            "specialization `{}` is declared twice",
                            cx.name(decl.name)
                        ))
                        .with_label(decl.span, "second declaration"),
                );
            }
        }

        // 3. LOWER: each declaration on its own.
        let mut specs: Vec<Specialization> = self
            .decls
            .iter()
            .enumerate()
            .map(|(i, decl)| {
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "a node declares a handful of specializations"
                )]
                let id = SpecId::from_raw(i as u32);
                cx.lower(id, decl, &mut queue, &mut warnings)
            })
            .collect();

        // 4. FALLBACK: at most one, and unconditional.
        check_fallback(&cx, &specs, &mut queue);

        // 5. CONTAINS: resolve, order-check, close transitively.
        resolve_contains(&cx, &self.decls, &ids, &mut specs, &mut queue);

        if queue.has_errors() {
            return Err(ModelErrors {
                diagnostics: queue.flush(),
            });
        }

        // 6. REACHABILITY.
        for (dead, by) in reachability::compute(&mut specs, &self.types) {
            let (dead, by) = (&specs[dead.index()], &specs[by.index()]);
            let diag = if self.options.unreachable_is_error {
                Diagnostic::error(ErrorCode::E2014)
            } else {
                Diagnostic::warning(ErrorCode::W2001)
            };
            let diag = diag
                .with_message(format!(
                    "specialization `{}` is unreachable",
                    cx.name(dead.name)
                ))
                .with_label(dead.span, "never selected")
                .with_secondary_label(
                    by.span,
                    format!("`{}` always matches first", cx.name(by.name)),
                );
            if diag.is_error() {
                queue.push(diag);
            } else {
                warnings.push(diag);
            }
        }
        if queue.has_errors() {
            return Err(ModelErrors {
                diagnostics: queue.flush(),
            });
        }

        tracing::debug!(
            node = cx.name(self.name),
            specializations = specs.len(),
            warnings = warnings.len(),
            "node model built"
        );

        Ok(NodeModel::assemble(
            self.name,
            self.signature,
            specs,
            self.types,
            self.interner,
            self.functions,
            self.options,
            warnings,
        ))
    }
}

/// Shared read-only context while lowering declarations.
struct Cx<'a> {
    types: &'a SharedTypeSystem,
    interner: &'a SharedInterner,
    functions: &'a FunctionTable,
    signature: &'a [TypeIdx],
}

impl Cx<'_> {
    fn name(&self, name: Name) -> &'static str {
        self.interner.lookup(name)
    }

    fn lower(
        &self,
        id: SpecId,
        decl: &SpecializationDecl,
        queue: &mut DiagnosticQueue,
        warnings: &mut Vec<Diagnostic>,
    ) -> Specialization {
        let spec_name = self.name(decl.name);
        let mut parameters = Vec::with_capacity(decl.params.len());
        let mut signature = SmallVec::new();
        let mut locals = Vec::new();
        let mut caches = Vec::new();
        let mut seen = FxHashSet::default();

        // Every name that can appear in a guard or assumption.
        let scope: FxHashMap<Name, ParamKind> = {
            let (mut s, mut l, mut c) = (0, 0, 0);
            decl.params
                .iter()
                .map(|p| {
                    let kind = match p {
                        ParamDecl::Signature { .. } => {
                            s += 1;
                            ParamKind::Signature(s - 1)
                        }
                        ParamDecl::Local { .. } => {
                            l += 1;
                            ParamKind::Local(l - 1)
                        }
                        ParamDecl::Cached { .. } => {
                            c += 1;
                            ParamKind::Cached(c - 1)
                        }
                    };
                    (p.name(), kind)
                })
                .collect()
        };

        for param in &decl.params {
            if !seen.insert(param.name()) {
                queue.push(
                    Diagnostic::error(ErrorCode::E2013)
                        .with_message(format!(
                            "`{}` is bound twice in specialization `{spec_name}`",
                            self.name(param.name())
                        ))
                        .with_label(decl.span, "in this specialization"),
                );
            }
            match param {
                ParamDecl::Signature { name, ty } => {
                    let index = signature.len();
                    self.check_type(*ty, decl, queue);
                    self.check_signature_cast(index, *ty, decl, queue);
                    signature.push(*ty);
                    parameters.push(Parameter {
                        name: *name,
                        ty: *ty,
                        kind: ParamKind::Signature(index),
                    });
                }
                ParamDecl::Local { name, ty, init } => {
                    self.check_type(*ty, decl, queue);
                    // Locals see signature values and earlier locals.
                    self.check_names(init, decl, queue, |n| {
                        parameters.iter().any(|p: &Parameter| {
                            p.name == n && !matches!(p.kind, ParamKind::Cached(_))
                        })
                    });
                    parameters.push(Parameter {
                        name: *name,
                        ty: *ty,
                        kind: ParamKind::Local(locals.len()),
                    });
                    locals.push(LocalBinding {
                        name: *name,
                        ty: *ty,
                        init: init.clone(),
                    });
                }
                ParamDecl::Cached {
                    name,
                    ty,
                    init,
                    adopt,
                    span,
                } => {
                    self.check_type(*ty, decl, queue);
                    let index = caches.len();
                    for var in init.free_vars() {
                        match scope.get(&var) {
                            Some(ParamKind::Cached(j)) if *j >= index => {
                                queue.push(
                                    Diagnostic::error(ErrorCode::E2012)
                                        .with_message(format!(
                                            "cache `{}` reads `{}`, which is declared after it",
                                            self.name(*name),
                                            self.name(var)
                                        ))
                                        .with_label(*span, "in this cache"),
                                );
                            }
                            Some(_) => {}
                            None => self.unbound(var, decl, queue),
                        }
                    }
                    self.check_calls(init, decl, queue);
                    parameters.push(Parameter {
                        name: *name,
                        ty: *ty,
                        kind: ParamKind::Cached(index),
                    });
                    caches.push(CacheExpression {
                        name: *name,
                        ty: *ty,
                        init: init.clone(),
                        adopt: *adopt,
                        bound_by_guard: false,
                        span: *span,
                    });
                }
            }
        }

        if signature.len() != self.signature.len() {
            queue.push(
                Diagnostic::error(ErrorCode::E2004)
                    .with_message(format!(
                        "specialization `{spec_name}` declares {} signature parameter(s), the node has {}",
                        signature.len(),
                        self.signature.len()
                    ))
                    .with_label(decl.span, "arity mismatch"),
            );
        }

        // Guards: classify, bind caches, reject adopted reads.
        let mut guards = Vec::with_capacity(decl.guards.len());
        for (expr, span) in &decl.guards {
            let mut guard = GuardExpression::new(expr.clone(), *span);
            let mut only_cached = true;
            for var in &guard.free_vars {
                match scope.get(var) {
                    Some(ParamKind::Cached(i)) => {
                        guard.caches.push(*i);
                        if caches[*i].adopt {
                            queue.push(
                                Diagnostic::error(ErrorCode::E2011)
                                    .with_message(format!(
                                        "guard reads adopted cache `{}`",
                                        self.name(*var)
                                    ))
                                    .with_label(*span, "guard")
                                    .with_note("adopted caches hold child nodes and cannot be compared"),
                            );
                        }
                    }
                    Some(_) => only_cached = false,
                    None => self.unbound(*var, decl, queue),
                }
            }
            self.check_calls(&guard.expr, decl, queue);
            if only_cached && guard.expr.is_pure(self.functions) {
                guard.kind = GuardKind::Static;
            }
            for &i in &guard.caches {
                caches[i].bound_by_guard = true;
            }
            guards.push(guard);
        }

        for assumption in &decl.assumptions {
            for var in assumption.expr.free_vars() {
                if !scope.contains_key(&var) {
                    self.unbound(var, decl, queue);
                }
            }
            self.check_calls(&assumption.expr, decl, queue);
        }

        if let Some(limit) = &decl.limit {
            if !limit.is_constant(self.functions) {
                queue.push(
                    Diagnostic::error(ErrorCode::E2010)
                        .with_message(format!(
                            "limit of `{spec_name}` must be a constant expression"
                        ))
                        .with_label(decl.span, "limit reads bound names or dynamic functions"),
                );
            }
            if caches.is_empty() {
                warnings.push(
                    Diagnostic::warning(ErrorCode::W2002)
                        .with_message(format!(
                            "limit on `{spec_name}` has no effect without caches"
                        ))
                        .with_label(decl.span, "declares no caches"),
                );
            }
        }

        let type_guards = signature
            .iter()
            .enumerate()
            .filter(|(i, ty)| {
                let child = self.signature.get(*i).copied().unwrap_or(TypeIdx::GENERIC);
                self.types.needs_cast(child, **ty)
            })
            .map(|(index, ty)| TypeGuard { index, ty: *ty })
            .collect();

        let mut flags = SpecializationFlags::empty();
        flags.set(SpecializationFlags::GENERIC, decl.generic);
        flags.set(SpecializationFlags::CACHED, !caches.is_empty());
        flags.set(
            SpecializationFlags::REWRITABLE,
            !decl.rewrite_on.is_empty()
                || !decl.assumptions.is_empty()
                || caches.iter().any(|c| c.bound_by_guard),
        );
        flags.set(
            SpecializationFlags::STATIC_GUARDS,
            guards.iter().any(GuardExpression::is_static),
        );

        Specialization {
            id,
            name: decl.name,
            span: decl.span,
            kind: decl.kind,
            flags,
            parameters,
            signature,
            locals,
            type_guards,
            guards,
            caches,
            assumptions: decl.assumptions.clone(),
            rewrite_on: decl.rewrite_on.clone(),
            contains: SpecSet::new(),
            excluded_by: SpecSet::new(),
            limit: decl.limit.clone(),
            reachable: true,
            shadowed_by: None,
            body: decl.body.clone(),
        }
    }

    fn check_type(&self, ty: TypeIdx, decl: &SpecializationDecl, queue: &mut DiagnosticQueue) {
        if self.types.get(ty).is_none() {
            queue.push(
                Diagnostic::error(ErrorCode::E1002)
                    .with_message(format!(
                        "specialization `{}` uses undeclared type #{}",
                        self.name(decl.name),
                        ty.raw()
                    ))
                    .with_label(decl.span, "here"),
            );
        }
    }

    /// The child's values must be able to reach the parameter type.
    fn check_signature_cast(
        &self,
        index: usize,
        ty: TypeIdx,
        decl: &SpecializationDecl,
        queue: &mut DiagnosticQueue,
    ) {
        let Some(&child) = self.signature.get(index) else {
            return;
        };
        if child.is_generic() || self.types.get(ty).is_none() {
            return;
        }
        if let Err(err) = self.types.resolve_cast(child, ty) {
            queue.push(
                Diagnostic::error(ErrorCode::E1003)
                    .with_message(format!(
                        "parameter {index} of `{}`: {err}",
                        self.name(decl.name)
                    ))
                    .with_label(decl.span, "declared here"),
            );
        }
    }

    /// Every free name must satisfy `visible`.
    fn check_names(
        &self,
        expr: &Expr,
        decl: &SpecializationDecl,
        queue: &mut DiagnosticQueue,
        visible: impl Fn(Name) -> bool,
    ) {
        for var in expr.free_vars() {
            if !visible(var) {
                self.unbound(var, decl, queue);
            }
        }
        self.check_calls(expr, decl, queue);
    }

    fn check_calls(&self, expr: &Expr, decl: &SpecializationDecl, queue: &mut DiagnosticQueue) {
        for func in expr.called_functions() {
            if !self.functions.contains(func) {
                queue.push(
                    Diagnostic::error(ErrorCode::E2003)
                        .with_message(format!(
                            "`{}` calls unknown host function `{}`",
                            self.name(decl.name),
                            self.name(func)
                        ))
                        .with_label(decl.span, "here"),
                );
            }
        }
    }

    fn unbound(&self, var: Name, decl: &SpecializationDecl, queue: &mut DiagnosticQueue) {
        queue.push(
            Diagnostic::error(ErrorCode::E2002)
                .with_message(format!(
                    "`{}` is not bound in specialization `{}`",
                    self.name(var),
                    self.name(decl.name)
                ))
                .with_label(decl.span, "here"),
        );
    }
}

fn check_fallback(cx: &Cx<'_>, specs: &[Specialization], queue: &mut DiagnosticQueue) {
    let mut fallbacks = specs.iter().filter(|s| s.is_fallback());
    let Some(first) = fallbacks.next() else {
        return;
    };
    for extra in fallbacks {
        queue.push(
            Diagnostic::error(ErrorCode::E2008)
                .with_message(format!(
                    "`{}` is a second fallback",
                    cx.name(extra.name)
                ))
                .with_label(extra.span, "second fallback")
                .with_secondary_label(first.span, "first fallback"),
        );
    }
    for fallback in specs.iter().filter(|s| s.is_fallback()) {
        let typed = fallback.signature.iter().any(|t| !t.is_generic());
        if typed
            || !fallback.guards.is_empty()
            || !fallback.caches.is_empty()
            || !fallback.assumptions.is_empty()
        {
            queue.push(
                Diagnostic::error(ErrorCode::E2009)
                    .with_message(format!(
                        "fallback `{}` must be unconditional",
                        cx.name(fallback.name)
                    ))
                    .with_label(fallback.span, "fallback")
                    .with_note("a fallback takes generic parameters and declares no guards, caches or assumptions"),
            );
        }
    }
}

fn resolve_contains(
    cx: &Cx<'_>,
    decls: &[SpecializationDecl],
    ids: &FxHashMap<Name, SpecId>,
    specs: &mut [Specialization],
    queue: &mut DiagnosticQueue,
) {
    for (i, decl) in decls.iter().enumerate() {
        for &(target, span) in &decl.contains {
            let span = if span == Span::DUMMY { decl.span } else { span };
            let Some(&other) = ids.get(&target) else {
                queue.push(
                    Diagnostic::error(ErrorCode::E2005)
                        .with_message(format!(
                            "`{}` contains unknown specialization `{}`",
                            cx.name(decl.name),
                            cx.name(target)
                        ))
                        .with_label(span, "here"),
                );
                continue;
            };
            if other.index() == i {
                queue.push(
                    Diagnostic::error(ErrorCode::E2007)
                        .with_message(format!("`{}` contains itself", cx.name(decl.name)))
                        .with_label(span, "here"),
                );
                continue;
            }
            if other.index() > i {
                queue.push(
                    Diagnostic::error(ErrorCode::E2006)
                        .with_message(format!(
                            "`{}` contains `{}`, which is declared after it",
                            cx.name(decl.name),
                            cx.name(target)
                        ))
                        .with_label(span, "here")
                        .with_secondary_label(specs[other.index()].span, "declared here"),
                );
            }
            specs[i].contains.insert(other);
        }
    }

    // Close transitively. Bounded by the number of specializations even if
    // ordering errors left a cycle behind.
    for _ in 0..specs.len() {
        let mut changed = false;
        for i in 0..specs.len() {
            let direct: Vec<SpecId> = specs[i].contains.iter().collect();
            for other in direct {
                let nested = specs[other.index()].contains.clone();
                changed |= specs[i].contains.union_with(&nested);
            }
        }
        if !changed {
            break;
        }
    }

    for i in 0..specs.len() {
        let id = specs[i].id;
        if specs[i].contains.contains(id) {
            queue.push(
                Diagnostic::error(ErrorCode::E2007)
                    .with_message(format!(
                        "`{}` contains itself through other specializations",
                        cx.name(specs[i].name)
                    ))
                    .with_label(specs[i].span, "in this cycle"),
            );
        }
        let contained: Vec<SpecId> = specs[i].contains.iter().collect();
        for other in contained {
            specs[other.index()].excluded_by.insert(id);
        }
    }
}

#[cfg(test)]
mod tests;
