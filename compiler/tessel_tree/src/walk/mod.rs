//! Driving a decision tree against concrete values.

use smallvec::{smallvec, SmallVec};
use tessel_model::{SpecId, TypeGuard};

use crate::{Atom, DecisionTree, GroupKind, GuardRef, SpecializationGroup};

/// What to do after visiting a leaf.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Walk {
    /// Keep looking at later leaves.
    Continue,
    /// Done; the walk returns this leaf.
    Stop,
}

/// Evaluates atoms for one walk.
///
/// The tree knows nothing about values; implementors hold the arguments,
/// apply casts and bind names.
pub trait GuardEvaluator {
    type Error;

    /// False skips the specialization and, when no member of a group is a
    /// candidate, the whole group without evaluating its atoms.
    fn is_candidate(&mut self, spec: SpecId) -> bool;

    /// The value at `guard.index` is (or implicitly widens to) `guard.ty`.
    fn type_guard(&mut self, guard: TypeGuard) -> Result<bool, Self::Error>;

    /// Truth of the guard, with its negation applied.
    fn guard(&mut self, guard: GuardRef) -> Result<bool, Self::Error>;

    /// Every atom on the path to `spec` held.
    fn leaf(&mut self, spec: SpecId) -> Result<Walk, Self::Error>;
}

impl DecisionTree {
    /// Visit leaves in order until the evaluator stops.
    ///
    /// Returns the leaf that stopped the walk, or `None` if the walk ran off
    /// the end of the tree. The fallback is not visited.
    pub fn walk<E: GuardEvaluator>(&self, eval: &mut E) -> Result<Option<SpecId>, E::Error> {
        walk_groups(&self.roots, eval)
    }
}

fn walk_groups<E: GuardEvaluator>(
    groups: &[SpecializationGroup],
    eval: &mut E,
) -> Result<Option<SpecId>, E::Error> {
    // Result of each sibling's leading atom, for else pairs.
    let mut leading: SmallVec<[Option<bool>; 8]> = smallvec![None; groups.len()];

    'groups: for (m, group) in groups.iter().enumerate() {
        if !group.members.iter().any(|spec| eval.is_candidate(spec)) {
            continue;
        }

        let mut start = 0;
        if let Some(prev) = group.else_of.and_then(|p| leading[p]) {
            leading[m] = Some(!prev);
            if prev {
                continue;
            }
            start = 1;
        }

        for (k, atom) in group.atoms.iter().enumerate().skip(start) {
            let holds = match *atom {
                Atom::Type(guard) => eval.type_guard(guard)?,
                Atom::Guard(guard) => eval.guard(guard)?,
            };
            if k == 0 {
                leading[m] = Some(holds);
            }
            if !holds {
                continue 'groups;
            }
        }

        match &group.kind {
            GroupKind::Leaf(spec) => {
                if eval.is_candidate(*spec) && eval.leaf(*spec)? == Walk::Stop {
                    return Ok(Some(*spec));
                }
            }
            GroupKind::Children(children) => {
                if let Some(spec) = walk_groups(children, eval)? {
                    return Ok(Some(spec));
                }
            }
        }
    }
    Ok(None)
}
