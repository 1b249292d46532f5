//! Committed specialization instances and per-call frames.

use smallvec::SmallVec;
use tessel_cache::{check_assumptions, CacheSignal, Captured};
use tessel_model::{BodyArgs, Env, EvalError, FunctionTable, NodeModel, ParamKind, SpecId, Specialization};
use tessel_types::{Assumption, Value};

/// One specialization committed to a node's chain, with its cached values
/// and captured assumptions.
#[derive(Debug)]
pub struct Instance {
    spec: SpecId,
    serial: u64,
    cached: Vec<Value>,
    assumptions: Captured,
}

impl Instance {
    pub(crate) fn new(spec: SpecId, serial: u64, cached: Vec<Value>, assumptions: Captured) -> Self {
        Instance {
            spec,
            serial,
            cached,
            assumptions,
        }
    }

    pub fn spec(&self) -> SpecId {
        self.spec
    }

    /// Discovery order within the node; older instances have smaller serials.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Cache values in declaration order.
    pub fn cached(&self) -> &[Value] {
        &self.cached
    }

    pub fn assumptions(&self) -> &[Assumption] {
        &self.assumptions
    }

    /// Fast-path check: assumptions, then type guards with implicit casts,
    /// then dynamic guards. Static guards held at creation and are skipped.
    pub(crate) fn probe(&self, model: &NodeModel, args: &[Value]) -> Result<Probe, EvalError> {
        let spec = &model[self.spec];
        if let Err(signal) = check_assumptions(self.spec, &self.assumptions) {
            return Ok(Probe::Invalidated(signal));
        }
        let Some(cast) = cast_args(model, spec, args) else {
            return Ok(Probe::Miss);
        };
        let mut frame = Frame::bind(spec, cast, model.functions())?;
        for (cache, value) in spec.caches.iter().zip(&self.cached) {
            frame.env.bind(cache.name, value.clone());
        }
        for guard in spec.guards.iter().filter(|g| !g.is_static()) {
            if guard.expr.eval_bool(&frame.env, model.functions())? == guard.negated {
                return Ok(Probe::Miss);
            }
        }
        Ok(Probe::Hit(frame))
    }
}

/// Outcome of checking one instance against a call.
#[derive(Debug)]
#[allow(clippy::large_enum_variant, reason = "lives for one call")]
pub(crate) enum Probe {
    Hit(Frame),
    Miss,
    Invalidated(CacheSignal),
}

/// Values a body sees for one call: signature values after casts, locals,
/// and the environment guards were evaluated in.
#[derive(Clone, Debug, Default)]
pub(crate) struct Frame {
    pub args: SmallVec<[Value; 4]>,
    pub locals: SmallVec<[Value; 2]>,
    pub env: Env,
}

impl Frame {
    /// Bind signature parameters to `args` and evaluate locals in order.
    pub fn bind(
        spec: &Specialization,
        args: SmallVec<[Value; 4]>,
        functions: &FunctionTable,
    ) -> Result<Frame, EvalError> {
        let mut env = Env::new();
        for param in &spec.parameters {
            if let ParamKind::Signature(i) = param.kind {
                if let Some(value) = args.get(i) {
                    env.bind(param.name, value.clone());
                }
            }
        }
        let mut locals = SmallVec::new();
        for local in &spec.locals {
            let value = local.init.eval(&env, functions)?;
            env.bind(local.name, value.clone());
            locals.push(value);
        }
        Ok(Frame { args, locals, env })
    }

    pub fn body_args<'a>(&'a self, cached: &'a [Value]) -> BodyArgs<'a> {
        BodyArgs {
            args: &self.args,
            locals: &self.locals,
            cached,
        }
    }
}

/// Coerce each signature value to the specialization's declared type.
///
/// Implicit sources are tried in the order the node's specializations
/// introduced them. `None` if any type guard fails.
pub(crate) fn cast_args(
    model: &NodeModel,
    spec: &Specialization,
    args: &[Value],
) -> Option<SmallVec<[Value; 4]>> {
    let mut cast: SmallVec<[Value; 4]> = args.iter().cloned().collect();
    for guard in &spec.type_guards {
        let sources = model.implicit_sources_in_use(guard.index, guard.ty);
        let coerced = model
            .types()
            .coerce_via(args.get(guard.index)?, guard.ty, sources)?;
        cast[guard.index] = coerced.value;
    }
    Some(cast)
}
