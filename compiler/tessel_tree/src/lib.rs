//! Decision trees over specializations.
//!
//! Groups a node's reachable specializations by shared guard prefixes so a
//! type check or guard common to several alternatives runs once per
//! attempt.
//!
//! # Algorithm
//!
//! 1. **Atoms**: every specialization contributes its type guards (by
//!    ascending signature index), then its guards in declaration order.
//! 2. **Partition**: consecutive specializations whose first remaining atom
//!    is the same form a run.
//! 3. **Factor**: the longest prefix shared by the whole run becomes a
//!    group node; the remainders recurse below it.
//! 4. **Else pairs**: a sibling whose leading guard negates the previous
//!    sibling's leading guard reuses that result instead of re-evaluating.
//!
//! Guards that read caches are never shared, and leaves read left to right
//! are the specializations in declaration order.

mod build;
mod dump;
mod group;
mod walk;

pub use dump::TreeDisplay;
pub use group::{Atom, DecisionTree, GroupKind, GuardRef, SpecializationGroup};
pub use walk::{GuardEvaluator, Walk};
