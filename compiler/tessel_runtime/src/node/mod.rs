//! Self-specializing nodes.
//!
//! An [`AdaptiveNode`] starts uninitialized, commits the first
//! specialization that accepts a call, grows a chain of instances as new
//! argument shapes arrive, and finally settles on generic dispatch.
//!
//! # Concurrency
//!
//! The chain is an immutable [`ChainSnapshot`] published through an
//! epoch-managed pointer. The fast path pins, reads the snapshot and
//! checks instances without locking. Every change (commit, removal,
//! exclusion, the Generic transition) happens under one mutex per node and
//! publishes a new snapshot with a bumped generation; a thread that missed
//! against an older generation retries the fast path instead of rewriting.
//! Bodies always run outside the lock.

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crossbeam::epoch::{self, Atomic, Owned};
use parking_lot::Mutex;
use tessel_cache::{InstanceCounter, InstanceLimits, LimitError};
use tessel_model::{NodeModel, SpecId, SpecSet, Specialization};
use tessel_types::Value;

use crate::attempt::{self, Candidate};
use crate::error::{RewriteSignal, UnsupportedReason, UnsupportedSpecialization};
use crate::instance::{Frame, Instance, Probe};
use crate::stats::{NodeStats, StatsSnapshot};
use crate::{DecisionModel, ExecError};

/// Where a node is in its specialization lifecycle.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum NodeState {
    /// No live instance: nothing committed yet, or every instance was
    /// removed and no replacement was found.
    Uninitialized,
    /// One committed instance.
    Monomorphic,
    /// Several committed instances, tried in chain order.
    Polymorphic,
    /// Uncached dispatch; never left.
    Generic,
}

impl NodeState {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeState::Uninitialized => "uninitialized",
            NodeState::Monomorphic => "monomorphic",
            NodeState::Polymorphic => "polymorphic",
            NodeState::Generic => "generic",
        }
    }

    fn for_chain(len: usize) -> NodeState {
        if len > 1 {
            NodeState::Polymorphic
        } else {
            NodeState::Monomorphic
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the fast path reads. Replaced wholesale on every rewrite.
#[derive(Clone, Debug)]
struct ChainSnapshot {
    state: NodeState,
    /// Ordered by specialization declaration order, then discovery order.
    instances: Vec<Arc<Instance>>,
    excluded: SpecSet,
    generation: u64,
}

/// Owned by the rewrite lock holder.
#[derive(Debug)]
struct RewriteState {
    /// Evaluated on the first commit that needs them.
    limits: Option<InstanceLimits>,
    counter: InstanceCounter,
    next_serial: u64,
}

impl RewriteState {
    fn limit(&mut self, model: &NodeModel, spec: SpecId) -> Result<Option<u32>, LimitError> {
        if self.limits.is_none() {
            let limits = InstanceLimits::evaluate(model)?;
            tracing::debug!(node = model.display_name(), "instance limits evaluated");
            self.limits = Some(limits);
        }
        Ok(self.limits.as_ref().and_then(|l| l.get(spec)))
    }
}

#[allow(clippy::large_enum_variant, reason = "lives for one call")]
enum FastPath {
    Hit(Arc<Instance>, Frame),
    Generic(SpecSet),
    Rewrite(u64, RewriteSignal),
}

enum Step {
    Done(Value),
    /// The generation the signal was observed against, if it matters.
    Rewrite(Option<u64>, RewriteSignal),
}

#[allow(clippy::large_enum_variant, reason = "lives for one call")]
enum Next {
    Run(Arc<Instance>, Frame),
    Retry,
}

/// One call site of a polymorphic operation.
pub struct AdaptiveNode {
    dm: Arc<DecisionModel>,
    snapshot: Atomic<ChainSnapshot>,
    rewrite: Mutex<RewriteState>,
    stats: NodeStats,
}

impl AdaptiveNode {
    pub fn new(dm: Arc<DecisionModel>) -> Self {
        let specializations = dm.model().specializations().len();
        AdaptiveNode {
            snapshot: Atomic::new(ChainSnapshot {
                state: NodeState::Uninitialized,
                instances: Vec::new(),
                excluded: SpecSet::new(),
                generation: 0,
            }),
            rewrite: Mutex::new(RewriteState {
                limits: None,
                counter: InstanceCounter::new(specializations),
                next_serial: 0,
            }),
            stats: NodeStats::default(),
            dm,
        }
    }

    pub fn decision_model(&self) -> &Arc<DecisionModel> {
        &self.dm
    }

    /// Execute the operation on already-evaluated child values.
    pub fn execute(&self, args: &[Value]) -> Result<Value, ExecError> {
        let model = self.dm.model();
        if args.len() != model.arity() {
            return Err(ExecError::ArityMismatch {
                node: model.display_name(),
                expected: model.arity(),
                found: args.len(),
            });
        }

        let mut pending = None;
        loop {
            let (observed, signal) = match pending.take() {
                Some(rewrite) => rewrite,
                None => match self.fast_path(args)? {
                    Step::Done(value) => return Ok(value),
                    Step::Rewrite(observed, signal) => (observed, signal),
                },
            };
            match self.rewrite(observed, signal, args)? {
                Next::Retry => {}
                Next::Run(instance, frame) => {
                    let spec = &model[instance.spec()];
                    match self.call_body(spec, &frame, instance.cached())? {
                        Step::Done(value) => return Ok(value),
                        Step::Rewrite(observed, signal) => pending = Some((observed, signal)),
                    }
                }
            }
        }
    }

    // ── Fast path ──

    fn fast_path(&self, args: &[Value]) -> Result<Step, ExecError> {
        let model = self.dm.model();
        let path = self.with_snapshot(|snapshot| -> Result<FastPath, ExecError> {
            if snapshot.state == NodeState::Generic {
                return Ok(FastPath::Generic(snapshot.excluded.clone()));
            }
            for instance in &snapshot.instances {
                let probe = if model[instance.spec()].is_fallback() {
                    self.probe_fallback(instance, args, &snapshot.excluded)?
                } else {
                    instance.probe(model, args)?
                };
                match probe {
                    Probe::Hit(frame) => return Ok(FastPath::Hit(Arc::clone(instance), frame)),
                    Probe::Miss => {}
                    Probe::Invalidated(signal) => {
                        let serial = instance.serial();
                        return Ok(FastPath::Rewrite(
                            snapshot.generation,
                            RewriteSignal::Invalidated { serial, signal },
                        ));
                    }
                }
            }
            tracing::trace!(
                node = model.display_name(),
                state = %snapshot.state,
                chain = snapshot.instances.len(),
                "fast path miss"
            );
            Ok(FastPath::Rewrite(snapshot.generation, RewriteSignal::Miss))
        })?;

        match path {
            FastPath::Hit(instance, frame) => {
                let step = self.call_body(&model[instance.spec()], &frame, instance.cached())?;
                if matches!(step, Step::Done(_)) {
                    self.stats.hit();
                }
                Ok(step)
            }
            FastPath::Generic(excluded) => self.dispatch_generic(args, &excluded),
            FastPath::Rewrite(observed, signal) => Ok(Step::Rewrite(Some(observed), signal)),
        }
    }

    /// The fallback applies only when no specialization still in play
    /// accepts the arguments.
    fn probe_fallback(&self, instance: &Instance, args: &[Value], excluded: &SpecSet) -> Result<Probe, ExecError> {
        let dm = &*self.dm;
        if attempt::specialize(dm, args, excluded)?.is_some() {
            return Ok(Probe::Miss);
        }
        Ok(match attempt::fallback(dm, instance.spec(), args)? {
            Some(candidate) => Probe::Hit(candidate.frame),
            None => Probe::Miss,
        })
    }

    /// Run a body; a rewrite exception becomes a signal, anything else
    /// propagates.
    fn call_body(&self, spec: &Specialization, frame: &Frame, cached: &[Value]) -> Result<Step, ExecError> {
        match spec.body.call(&frame.body_args(cached)) {
            Ok(value) => Ok(Step::Done(value)),
            Err(thrown) if !spec.is_fallback() && spec.rewrites_on(thrown.exception) => {
                let model = self.dm.model();
                tracing::debug!(
                    node = model.display_name(),
                    spec = model.spec_name(spec.id),
                    exception = model.interner().lookup(thrown.exception),
                    "rewrite exception raised"
                );
                Ok(Step::Rewrite(
                    None,
                    RewriteSignal::Exception {
                        spec: spec.id,
                        exception: thrown.exception,
                    },
                ))
            }
            Err(thrown) => Err(thrown.into()),
        }
    }

    /// Generic dispatch: an uncached walk over everything not excluded,
    /// then the fallback. Nothing is committed.
    fn dispatch_generic(&self, args: &[Value], excluded: &SpecSet) -> Result<Step, ExecError> {
        self.stats.generic_dispatch();
        let dm = &*self.dm;
        let model = dm.model();
        let mut candidate = attempt::specialize(dm, args, excluded)?;
        if candidate.is_none() {
            if let Some(fallback) = model.fallback() {
                candidate = attempt::fallback(dm, fallback, args)?;
            }
        }
        let Some(candidate) = candidate else {
            return Err(self.unsupported(args, excluded, UnsupportedReason::NoMatch).into());
        };
        tracing::trace!(
            node = model.display_name(),
            spec = model.spec_name(candidate.spec),
            "generic dispatch"
        );
        self.call_body(&model[candidate.spec], &candidate.frame, &candidate.cached)
    }

    // ── Rewrite protocol ──

    fn rewrite(&self, observed: Option<u64>, signal: RewriteSignal, args: &[Value]) -> Result<Next, ExecError> {
        let model = self.dm.model();
        let mut rw = self.rewrite.lock();
        let mut chain = self.with_snapshot(ChainSnapshot::clone);

        match signal {
            RewriteSignal::Miss => {
                if observed != Some(chain.generation) || chain.state == NodeState::Generic {
                    tracing::trace!(node = model.display_name(), "chain changed, retrying");
                    return Ok(Next::Retry);
                }
                self.create_next(&mut rw, chain, args)
            }
            RewriteSignal::Invalidated { serial, signal } => {
                tracing::debug!(node = model.display_name(), %signal, "removing invalidated instance");
                self.remove(&mut rw, chain, |i| i.serial() == serial, args)
            }
            RewriteSignal::Exception { spec, exception } => {
                if chain.excluded.insert(spec) {
                    tracing::debug!(
                        node = model.display_name(),
                        spec = model.spec_name(spec),
                        exception = model.interner().lookup(exception),
                        "specialization excluded"
                    );
                }
                self.remove(&mut rw, chain, |i| i.spec() == spec, args)
            }
        }
    }

    /// Evict matching instances, publish, and look for a replacement at
    /// once if the chain is left empty.
    fn remove(
        &self,
        rw: &mut RewriteState,
        mut chain: ChainSnapshot,
        evict: impl Fn(&Instance) -> bool,
        args: &[Value],
    ) -> Result<Next, ExecError> {
        let model = self.dm.model();
        let before = chain.instances.len();
        chain.instances.retain(|instance| {
            if evict(instance) {
                rw.counter.release(instance.spec());
                false
            } else {
                true
            }
        });
        tracing::debug!(
            node = model.display_name(),
            removed = before - chain.instances.len(),
            remaining = chain.instances.len(),
            "instances removed"
        );
        if chain.state == NodeState::Generic || !chain.instances.is_empty() {
            if chain.state != NodeState::Generic {
                chain.state = NodeState::for_chain(chain.instances.len());
            }
            self.publish(&mut chain);
            return Ok(Next::Retry);
        }

        // Nothing left. The replacement decides what gets published; if
        // there is none, the node is published empty and uninitialized.
        let mut emptied = chain.clone();
        self.create_next(rw, chain, args).inspect_err(|_| {
            emptied.state = NodeState::Uninitialized;
            self.publish(&mut emptied);
        })
    }

    /// Find the next specialization for a call no live instance accepted.
    fn create_next(&self, rw: &mut RewriteState, chain: ChainSnapshot, args: &[Value]) -> Result<Next, ExecError> {
        let dm = &*self.dm;
        let model = dm.model();

        // A cache-free specialization already in the chain would only
        // produce the same instance again.
        let mut skip = chain.excluded.clone();
        for instance in &chain.instances {
            if !model[instance.spec()].has_caches() {
                skip.insert(instance.spec());
            }
        }

        if let Some(candidate) = attempt::specialize(dm, args, &skip)? {
            return self.merge(rw, chain, candidate, args);
        }
        if chain.state == NodeState::Uninitialized {
            let fallback = match model.fallback() {
                Some(fallback) => attempt::fallback(dm, fallback, args)?,
                None => None,
            };
            return match fallback {
                Some(candidate) => self.merge(rw, chain, candidate, args),
                None => Err(self.unsupported(args, &skip, UnsupportedReason::NoMatch).into()),
            };
        }
        self.go_generic(rw, chain, UnsupportedReason::NoMatch, args)
    }

    /// Commit a candidate into the chain.
    fn merge(
        &self,
        rw: &mut RewriteState,
        mut chain: ChainSnapshot,
        candidate: Candidate,
        args: &[Value],
    ) -> Result<Next, ExecError> {
        let model = self.dm.model();
        let spec = &model[candidate.spec];
        let name = model.spec_name(spec.id);

        // 1. SAME: an identical live instance is reused, not committed twice.
        if let Some(existing) = chain
            .instances
            .iter()
            .find(|i| i.spec() == spec.id && i.cached() == candidate.cached.as_slice())
        {
            tracing::debug!(node = model.display_name(), spec = name, "identical instance already live");
            return Ok(Next::Run(Arc::clone(existing), candidate.frame));
        }

        // 2. EXCLUDE: everything the specialization contains is evicted
        // and never attempted again, once the commit is certain.
        let remaining = chain
            .instances
            .iter()
            .filter(|i| !spec.contains.contains(i.spec()))
            .count();

        // 3. POLYMORPHIC LIMIT
        let polymorphic_limit = model.options().effective_polymorphic_limit();
        if remaining >= polymorphic_limit {
            let reason = UnsupportedReason::PolymorphicLimitExceeded {
                limit: polymorphic_limit,
            };
            return self.go_generic(rw, chain, reason, args);
        }

        // 4. INSTANCE LIMIT
        let limit = rw.limit(model, spec.id)?;
        if let Err(signal) = rw.counter.reserve(spec.id, limit) {
            tracing::debug!(node = model.display_name(), %signal, "instance limit reached");
            let reason = UnsupportedReason::CacheLimitExceeded {
                spec: name,
                limit: limit.unwrap_or(0),
            };
            return self.go_generic(rw, chain, reason, args);
        }

        if !spec.contains.is_empty() {
            chain.excluded.union_with(&spec.contains);
            for contained in spec.contains.iter() {
                rw.counter.release_all(contained);
            }
            chain.instances.retain(|i| !spec.contains.contains(i.spec()));
            tracing::debug!(
                node = model.display_name(),
                spec = name,
                excluded = ?spec.contains,
                "contained specializations excluded"
            );
        }

        // 5. INSERT: declaration order, then discovery order.
        let serial = rw.next_serial;
        rw.next_serial += 1;
        let instance = Arc::new(Instance::new(
            spec.id,
            serial,
            candidate.cached,
            candidate.assumptions,
        ));
        let at = chain
            .instances
            .iter()
            .position(|i| i.spec() > spec.id)
            .unwrap_or(chain.instances.len());
        chain.instances.insert(at, Arc::clone(&instance));
        chain.state = NodeState::for_chain(chain.instances.len());
        self.publish(&mut chain);
        tracing::debug!(
            node = model.display_name(),
            spec = name,
            state = %chain.state,
            chain = chain.instances.len(),
            "specialization committed"
        );
        Ok(Next::Run(instance, candidate.frame))
    }

    /// Drop the chain and switch to generic dispatch for good.
    fn go_generic(
        &self,
        rw: &mut RewriteState,
        mut chain: ChainSnapshot,
        reason: UnsupportedReason,
        args: &[Value],
    ) -> Result<Next, ExecError> {
        let model = self.dm.model();
        let Some(generic) = model.generic() else {
            return Err(self.unsupported(args, &chain.excluded, reason).into());
        };
        for instance in chain.instances.drain(..) {
            rw.counter.release(instance.spec());
        }
        chain.excluded.union_with(&model[generic].contains);
        chain.state = NodeState::Generic;
        self.publish(&mut chain);
        tracing::debug!(
            node = model.display_name(),
            generic = model.spec_name(generic),
            %reason,
            "node went generic"
        );
        Ok(Next::Retry)
    }

    fn unsupported(&self, args: &[Value], skip: &SpecSet, reason: UnsupportedReason) -> UnsupportedSpecialization {
        let model = self.dm.model();
        UnsupportedSpecialization {
            node: model.display_name(),
            args: args.to_vec(),
            tried: self
                .dm
                .tree()
                .leaves()
                .into_iter()
                .filter(|spec| !skip.contains(*spec))
                .map(|spec| model.spec_name(spec))
                .collect(),
            reason,
        }
    }

    // ── Snapshot access ──

    #[allow(unsafe_code, reason = "epoch-protected read of the published snapshot")]
    fn with_snapshot<R>(&self, f: impl FnOnce(&ChainSnapshot) -> R) -> R {
        let guard = epoch::pin();
        let shared = self.snapshot.load(Ordering::Acquire, &guard);
        // SAFETY: The pointer is set in `new` and only ever replaced by
        // `publish`, so it is never null. `publish` defers destruction of
        // the old snapshot until every guard pinned before the swap is
        // dropped, and `guard` outlives `f`.
        let snapshot = unsafe { shared.deref() };
        f(snapshot)
    }

    /// Publish `chain` as the new snapshot. Callers hold the rewrite lock.
    #[allow(unsafe_code, reason = "epoch-deferred reclamation of the old snapshot")]
    fn publish(&self, chain: &mut ChainSnapshot) {
        chain.generation += 1;
        self.stats.rewrite();
        let guard = epoch::pin();
        let old = self
            .snapshot
            .swap(Owned::new(chain.clone()), Ordering::AcqRel, &guard);
        // SAFETY: `old` is no longer reachable through `self.snapshot`;
        // readers that loaded it hold guards pinned before the swap.
        unsafe { guard.defer_destroy(old) };
    }

    // ── Introspection ──

    pub fn state(&self) -> NodeState {
        self.with_snapshot(|s| s.state)
    }

    /// Specializations of the committed instances, in chain order.
    pub fn chain(&self) -> Vec<SpecId> {
        self.with_snapshot(|s| s.instances.iter().map(|i| i.spec()).collect())
    }

    /// [`chain`](Self::chain) by name.
    pub fn chain_names(&self) -> Vec<&'static str> {
        let model = self.dm.model();
        self.chain().into_iter().map(|s| model.spec_name(s)).collect()
    }

    pub fn instances(&self) -> Vec<Arc<Instance>> {
        self.with_snapshot(|s| s.instances.clone())
    }

    /// Specializations that will never be attempted again.
    pub fn excluded(&self) -> SpecSet {
        self.with_snapshot(|s| s.excluded.clone())
    }

    /// Bumped by every published rewrite.
    pub fn generation(&self) -> u64 {
        self.with_snapshot(|s| s.generation)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Live instances of `spec` in the chain.
    pub fn live_instances(&self, spec: SpecId) -> u32 {
        self.rewrite.lock().counter.live(spec)
    }

    /// Instances of `spec` ever committed.
    pub fn created_instances(&self, spec: SpecId) -> u32 {
        self.rewrite.lock().counter.created(spec)
    }
}

impl Drop for AdaptiveNode {
    #[allow(unsafe_code, reason = "reclaiming the last snapshot")]
    fn drop(&mut self) {
        // SAFETY: `&mut self` rules out concurrent readers, and every
        // earlier snapshot was handed to the collector by `publish`.
        unsafe {
            let guard = epoch::unprotected();
            let shared = self.snapshot.load(Ordering::Relaxed, guard);
            if !shared.is_null() {
                drop(shared.into_owned());
            }
        }
    }
}

impl fmt::Debug for AdaptiveNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveNode")
            .field("node", &self.dm.model().display_name())
            .field("state", &self.state())
            .field("chain", &self.chain_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests;
