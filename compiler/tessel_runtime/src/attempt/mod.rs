//! One specialization attempt: walking the decision tree against
//! concrete arguments.

use smallvec::SmallVec;
use tessel_cache::{capture_assumptions, compute_caches, Captured};
use tessel_model::{EvalError, SpecId, SpecSet, Specialization, TypeGuard};
use tessel_tree::{GuardEvaluator, GuardRef, Walk};
use tessel_types::Value;

use crate::instance::{cast_args, Frame};
use crate::DecisionModel;

/// A specialization whose checks all held, with everything needed to
/// commit an instance of it.
#[derive(Debug)]
pub(crate) struct Candidate {
    pub spec: SpecId,
    pub frame: Frame,
    pub cached: Vec<Value>,
    pub assumptions: Captured,
}

/// Walk the tree, skipping the specializations in `skip`.
///
/// Returns the first specialization in tree order whose type guards,
/// guards and assumptions all hold, with its caches computed. The
/// fallback is never returned.
pub(crate) fn specialize(
    dm: &DecisionModel,
    args: &[Value],
    skip: &SpecSet,
) -> Result<Option<Candidate>, EvalError> {
    let mut attempt = Attempt {
        dm,
        args,
        skip,
        coerced: SmallVec::new(),
        scratch: (0..dm.model().specializations().len()).map(|_| None).collect(),
        found: None,
    };
    dm.tree().walk(&mut attempt)?;
    Ok(attempt.found)
}

/// The fallback as a candidate: it has no guards, caches or assumptions.
pub(crate) fn fallback(
    dm: &DecisionModel,
    spec: SpecId,
    args: &[Value],
) -> Result<Option<Candidate>, EvalError> {
    let model = dm.model();
    let spec = &model[spec];
    let Some(cast) = cast_args(model, spec, args) else {
        return Ok(None);
    };
    Ok(Some(Candidate {
        spec: spec.id,
        frame: Frame::bind(spec, cast, model.functions())?,
        cached: Vec::new(),
        assumptions: Captured::new(),
    }))
}

/// Bindings of one specialization built up during a walk.
struct Scratch {
    frame: Frame,
    cached: Vec<Option<Value>>,
}

struct Attempt<'a> {
    dm: &'a DecisionModel,
    args: &'a [Value],
    skip: &'a SpecSet,
    /// Type guard results, shared by every specialization that checks the
    /// same position against the same type.
    coerced: SmallVec<[(TypeGuard, Option<Value>); 4]>,
    scratch: Vec<Option<Scratch>>,
    found: Option<Candidate>,
}

impl Attempt<'_> {
    fn coerce(&mut self, guard: TypeGuard) -> Option<Value> {
        if let Some((_, value)) = self.coerced.iter().find(|(g, _)| *g == guard) {
            return value.clone();
        }
        let model = self.dm.model();
        let value = self.args.get(guard.index).and_then(|arg| {
            let sources = model.implicit_sources_in_use(guard.index, guard.ty);
            model.types().coerce_via(arg, guard.ty, sources).map(|c| c.value)
        });
        self.coerced.push((guard, value.clone()));
        value
    }

    /// Take the scratch bindings of `id`, creating them on first use.
    fn take_scratch(&mut self, id: SpecId) -> Result<Scratch, EvalError> {
        if let Some(scratch) = self.scratch[id.index()].take() {
            return Ok(scratch);
        }
        let dm = self.dm;
        let spec = &dm.model()[id];
        let mut args: SmallVec<[Value; 4]> = self.args.iter().cloned().collect();
        for guard in &spec.type_guards {
            if let Some(value) = self.coerce(*guard) {
                args[guard.index] = value;
            }
        }
        Ok(Scratch {
            frame: Frame::bind(spec, args, dm.model().functions())?,
            cached: vec![None; spec.caches.len()],
        })
    }
}

/// Compute the caches guard `index` reads, then evaluate it.
fn eval_guard(
    dm: &DecisionModel,
    spec: &Specialization,
    index: usize,
    scratch: &mut Scratch,
) -> Result<bool, EvalError> {
    let pending: SmallVec<[usize; 2]> = dm
        .plans()
        .get(spec.id)
        .caches_before_guard(index)
        .iter()
        .copied()
        .filter(|&c| scratch.cached[c].is_none())
        .collect();
    let functions = dm.model().functions();
    compute_caches(spec, &pending, &mut scratch.frame.env, &mut scratch.cached, functions)?;
    let guard = &spec.guards[index];
    Ok(guard.expr.eval_bool(&scratch.frame.env, functions)? != guard.negated)
}

impl GuardEvaluator for Attempt<'_> {
    type Error = EvalError;

    fn is_candidate(&mut self, spec: SpecId) -> bool {
        !self.skip.contains(spec)
    }

    fn type_guard(&mut self, guard: TypeGuard) -> Result<bool, EvalError> {
        Ok(self.coerce(guard).is_some())
    }

    fn guard(&mut self, guard: GuardRef) -> Result<bool, EvalError> {
        let dm = self.dm;
        let spec = &dm.model()[guard.spec];
        let mut scratch = self.take_scratch(guard.spec)?;
        let holds = eval_guard(dm, spec, guard.index, &mut scratch);
        self.scratch[guard.spec.index()] = Some(scratch);
        holds
    }

    fn leaf(&mut self, id: SpecId) -> Result<Walk, EvalError> {
        let dm = self.dm;
        let spec = &dm.model()[id];
        let functions = dm.model().functions();
        let mut scratch = self.take_scratch(id)?;

        // Declaration order is a valid dependency order for caches.
        let late: SmallVec<[usize; 4]> = (0..spec.caches.len())
            .filter(|&c| scratch.cached[c].is_none())
            .collect();
        compute_caches(spec, &late, &mut scratch.frame.env, &mut scratch.cached, functions)?;

        let Some(assumptions) = capture_assumptions(spec, &scratch.frame.env, functions)? else {
            tracing::trace!(spec = dm.model().spec_name(id), "assumption invalid, skipping");
            self.scratch[id.index()] = Some(scratch);
            return Ok(Walk::Continue);
        };
        self.found = Some(Candidate {
            spec: id,
            frame: scratch.frame,
            cached: scratch.cached.into_iter().flatten().collect(),
            assumptions,
        });
        Ok(Walk::Stop)
    }
}
