//! Guard grouping.

use smallvec::SmallVec;
use tessel_model::{NodeModel, SpecId};

use crate::{Atom, DecisionTree, GroupKind, GuardRef, SpecializationGroup};

/// A specialization and the atoms it has not yet placed in the tree.
type Row<'a> = (SpecId, &'a [Atom]);

impl DecisionTree {
    /// Group the model's reachable specializations.
    pub fn build(model: &NodeModel) -> DecisionTree {
        let atoms: Vec<(SpecId, SmallVec<[Atom; 8]>)> = model
            .reachable()
            .map(|spec| {
                let mut atoms: SmallVec<[Atom; 8]> =
                    spec.type_guards.iter().copied().map(Atom::Type).collect();
                atoms.extend((0..spec.guards.len()).map(|index| {
                    Atom::Guard(GuardRef {
                        spec: spec.id,
                        index,
                    })
                }));
                (spec.id, atoms)
            })
            .collect();
        let rows: Vec<Row<'_>> = atoms.iter().map(|(id, a)| (*id, a.as_slice())).collect();

        let tree = DecisionTree {
            roots: group(model, &rows),
            fallback: model.fallback().filter(|f| model[*f].reachable),
        };

        if cfg!(debug_assertions) {
            let expected: Vec<SpecId> = rows.iter().map(|(id, _)| *id).collect();
            let leaves = tree.leaves();
            if leaves != expected {
                tracing::error!(
                    node = model.display_name(),
                    ?leaves,
                    ?expected,
                    "decision tree leaves out of declaration order"
                );
            }
        }

        tracing::debug!(
            node = model.display_name(),
            leaves = rows.len(),
            depth = tree.depth(),
            "decision tree built"
        );
        tree
    }
}

/// Two atoms test the same thing and may be evaluated once for both.
fn same_atom(model: &NodeModel, a: Atom, b: Atom) -> bool {
    match (a, b) {
        (Atom::Type(x), Atom::Type(y)) => x == y,
        (Atom::Guard(x), Atom::Guard(y)) => {
            let (sx, sy) = (&model[x.spec], &model[y.spec]);
            !sx.guards[x.index].reads_cache()
                && !sy.guards[y.index].reads_cache()
                && sx.same_guard(x.index, sy, y.index)
        }
        _ => false,
    }
}

/// `b` is the syntactic negation of `a`.
fn negated_atom(model: &NodeModel, a: GuardRef, b: GuardRef) -> bool {
    let (sa, sb) = (&model[a.spec], &model[b.spec]);
    !sa.guards[a.index].reads_cache()
        && !sb.guards[b.index].reads_cache()
        && sa.negates_guard(a.index, sb, b.index)
}

fn group(model: &NodeModel, rows: &[Row<'_>]) -> Vec<SpecializationGroup> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < rows.len() {
        let (spec, atoms) = rows[i];

        // 1. NO ATOMS LEFT: unconditional leaf.
        let Some(&first) = atoms.first() else {
            out.push(leaf(spec, atoms));
            i += 1;
            continue;
        };

        // 2. RUN: consecutive rows starting with the same atom.
        let mut j = i + 1;
        while j < rows.len() && rows[j].1.first().is_some_and(|a| same_atom(model, first, *a)) {
            j += 1;
        }
        let run = &rows[i..j];

        // 3. FACTOR: single rows become leaves, runs share their prefix.
        if run.len() == 1 {
            out.push(leaf(spec, atoms));
        } else {
            let k = common_prefix(model, run);
            let rest: Vec<Row<'_>> = run.iter().map(|(id, a)| (*id, &a[k..])).collect();
            out.push(SpecializationGroup {
                atoms: atoms[..k].iter().copied().collect(),
                kind: GroupKind::Children(group(model, &rest)),
                else_of: None,
                members: run.iter().map(|(id, _)| *id).collect(),
            });
        }
        i = j;
    }

    // 4. ELSE PAIRS.
    for m in 1..out.len() {
        if let (Some(prev), Some(cur)) = (out[m - 1].leading_guard(), out[m].leading_guard()) {
            if negated_atom(model, prev, cur) {
                out[m].else_of = Some(m - 1);
            }
        }
    }
    out
}

fn leaf(spec: SpecId, atoms: &[Atom]) -> SpecializationGroup {
    SpecializationGroup {
        atoms: atoms.iter().copied().collect(),
        kind: GroupKind::Leaf(spec),
        else_of: None,
        members: tessel_model::SpecSet::single(spec),
    }
}

/// Length of the prefix every row of a run shares. At least 1.
fn common_prefix(model: &NodeModel, run: &[Row<'_>]) -> usize {
    let head = run[0].1;
    let mut k = 1;
    while k < head.len()
        && run[1..]
            .iter()
            .all(|(_, atoms)| atoms.get(k).is_some_and(|a| same_atom(model, head[k], *a)))
    {
        k += 1;
    }
    k
}
