//! Decision tree node types.

use smallvec::SmallVec;
use tessel_model::{SpecId, SpecSet, TypeGuard};

/// A guard of one specialization, evaluated with that specialization's
/// bindings.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct GuardRef {
    pub spec: SpecId,
    pub index: usize,
}

/// One check in a specialization's atom list.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Atom {
    Type(TypeGuard),
    Guard(GuardRef),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GroupKind {
    Leaf(SpecId),
    Children(Vec<SpecializationGroup>),
}

/// A tree node: checks shared by everything below it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecializationGroup {
    /// Checks in evaluation order: type guards first, then guards.
    pub atoms: SmallVec<[Atom; 2]>,
    pub kind: GroupKind,
    /// Position of the preceding sibling whose leading guard this group's
    /// leading guard negates.
    pub else_of: Option<usize>,
    /// Every leaf below this node.
    pub members: SpecSet,
}

impl SpecializationGroup {
    pub fn leading_guard(&self) -> Option<GuardRef> {
        match self.atoms.first() {
            Some(Atom::Guard(g)) => Some(*g),
            _ => None,
        }
    }

    /// Leaves in tree order.
    pub fn leaves(&self, out: &mut Vec<SpecId>) {
        match &self.kind {
            GroupKind::Leaf(id) => out.push(*id),
            GroupKind::Children(children) => {
                for child in children {
                    child.leaves(out);
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        match &self.kind {
            GroupKind::Leaf(_) => 1,
            GroupKind::Children(children) => {
                1 + children.iter().map(Self::depth).max().unwrap_or(0)
            }
        }
    }
}

/// The grouped specializations of one node. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecisionTree {
    pub(crate) roots: Vec<SpecializationGroup>,
    pub(crate) fallback: Option<SpecId>,
}

impl DecisionTree {
    /// Top-level groups in order.
    pub fn roots(&self) -> &[SpecializationGroup] {
        &self.roots
    }

    /// The fallback, taken after the tree when nothing matched.
    pub fn fallback(&self) -> Option<SpecId> {
        self.fallback
    }

    /// Leaves in attempt order.
    pub fn leaves(&self) -> Vec<SpecId> {
        let mut out = Vec::new();
        for root in &self.roots {
            root.leaves(&mut out);
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Nodes on the longest root-to-leaf path.
    pub fn depth(&self) -> usize {
        self.roots
            .iter()
            .map(SpecializationGroup::depth)
            .max()
            .unwrap_or(0)
    }
}
