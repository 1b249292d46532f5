//! Cache placement.
//!
//! A cache read by a guard must exist before that guard runs; every other
//! cache waits until all guards have passed so failed attempts do no
//! wasted work.

use smallvec::SmallVec;
use tessel_model::{Env, EvalError, FunctionTable, NodeModel, ParamKind, SpecId, Specialization};
use tessel_types::Value;

/// Cache evaluation order for one specialization.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CachePlan {
    before_guard: Vec<SmallVec<[usize; 2]>>,
    late: SmallVec<[usize; 4]>,
}

impl CachePlan {
    pub fn build(spec: &Specialization) -> CachePlan {
        let mut computed = vec![false; spec.caches.len()];
        let mut before_guard = Vec::with_capacity(spec.guards.len());
        for guard in &spec.guards {
            let mut needed = SmallVec::new();
            for &cache in &guard.caches {
                require(spec, cache, &mut computed, &mut needed);
            }
            before_guard.push(needed);
        }
        let late = (0..spec.caches.len()).filter(|i| !computed[*i]).collect();
        CachePlan { before_guard, late }
    }

    /// Caches to compute immediately before guard `index`, in dependency
    /// order. Empty for guards past the end.
    pub fn caches_before_guard(&self, index: usize) -> &[usize] {
        self.before_guard.get(index).map_or(&[], |c| c.as_slice())
    }

    /// Caches computed once every guard has passed, in declaration order.
    pub fn late_caches(&self) -> &[usize] {
        &self.late
    }
}

/// Mark `cache` and the earlier caches its initializer reads, dependencies
/// first.
fn require(spec: &Specialization, cache: usize, computed: &mut [bool], out: &mut SmallVec<[usize; 2]>) {
    if computed[cache] {
        return;
    }
    for var in spec.caches[cache].init.free_vars() {
        if let Some(ParamKind::Cached(dep)) = spec.binding(var) {
            if dep < cache {
                require(spec, dep, computed, out);
            }
        }
    }
    computed[cache] = true;
    out.push(cache);
}

/// Plans for every specialization of a model, indexed by [`SpecId`].
#[derive(Clone, Debug, Default)]
pub struct CachePlans {
    plans: Vec<CachePlan>,
}

impl CachePlans {
    pub fn build(model: &NodeModel) -> CachePlans {
        CachePlans {
            plans: model.specializations().iter().map(CachePlan::build).collect(),
        }
    }

    pub fn get(&self, spec: SpecId) -> &CachePlan {
        &self.plans[spec.index()]
    }
}

/// Evaluate the listed caches of `spec`, binding each into `env` and
/// storing it in `slots`.
pub fn compute_caches(
    spec: &Specialization,
    caches: &[usize],
    env: &mut Env,
    slots: &mut [Option<Value>],
    functions: &FunctionTable,
) -> Result<(), EvalError> {
    for &i in caches {
        let cache = &spec.caches[i];
        let value = cache.init.eval(env, functions)?;
        tracing::trace!(cache = i, value = ?value, "cache computed");
        env.bind(cache.name, value.clone());
        slots[i] = Some(value);
    }
    Ok(())
}
