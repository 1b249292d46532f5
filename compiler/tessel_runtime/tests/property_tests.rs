//! Property tests for the rewrite protocol.
//!
//! Random specialization lists over one argument, driven by random call
//! sequences. After every call the chain must stay in declaration order,
//! respect instance limits and never hold an excluded specialization.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::sync::Arc;

use proptest::prelude::*;
use tessel_ir::SharedInterner;
use tessel_model::{BinaryOp, Expr, NodeModelBuilder, SpecId, SpecializationDecl};
use tessel_runtime::{AdaptiveNode, DecisionModel, NodeState};
use tessel_types::{standard, Assumption, SharedTypeSystem, TypeIdx, Value};

const NAMES: [&str; 6] = ["s0", "s1", "s2", "s3", "s4", "s5"];
const TYPES: [TypeIdx; 3] = [standard::INT, standard::DOUBLE, standard::STRING];

#[derive(Clone, Debug)]
struct SpecShape {
    ty: usize,
    guard: Option<usize>,
    /// Instance limit of a `key = x` cache; int specializations only.
    keyed: Option<i32>,
    /// Index of an earlier specialization this one contains.
    contains: Option<usize>,
}

fn shape() -> impl Strategy<Value = SpecShape> {
    (
        0..TYPES.len(),
        prop::option::of(0..2usize),
        prop::option::of(1..4i32),
        prop::option::of(0..NAMES.len()),
    )
        .prop_map(|(ty, guard, keyed, contains)| SpecShape {
            ty,
            guard,
            keyed,
            contains,
        })
}

fn arg() -> impl Strategy<Value = Value> {
    prop_oneof![
        (-2..4i32).prop_map(Value::Int),
        prop::sample::select(vec![-1.5, 0.5, 3.0]).prop_map(Value::Double),
        prop::sample::select(vec!["a", "b"]).prop_map(Value::from),
    ]
}

fn build(shapes: &[SpecShape]) -> Arc<DecisionModel> {
    let interner = SharedInterner::new();
    let (x, key) = (interner.intern("x"), interner.intern("key"));
    let mut b = NodeModelBuilder::new(
        interner.intern("prop"),
        [TypeIdx::GENERIC],
        SharedTypeSystem::standard(),
        interner.clone(),
    );
    for (i, shape) in shapes.iter().enumerate() {
        let name = NAMES[i];
        let ty = TYPES[shape.ty];
        let mut decl = SpecializationDecl::new(interner.intern(name), move |_| Ok(Value::from(name)))
            .param(x, ty);
        if ty != standard::STRING {
            decl = match shape.guard {
                Some(0) => decl.guard(Expr::binary(BinaryOp::Gt, Expr::var(x), Expr::int(0))),
                Some(_) => decl.guard(Expr::binary(BinaryOp::Lt, Expr::var(x), Expr::int(2))),
                None => decl,
            };
        }
        if let (Some(limit), true) = (shape.keyed, ty == standard::INT) {
            decl = decl
                .cached(key, standard::INT, Expr::var(x))
                .guard(Expr::binary(BinaryOp::Eq, Expr::var(x), Expr::var(key)))
                .limit(Expr::int(limit));
        }
        if let Some(c) = shape.contains.filter(|&c| c < i) {
            decl = decl.contains(interner.intern(NAMES[c]));
        }
        b.add(decl);
    }
    b.add(
        SpecializationDecl::fallback(interner.intern("fallback"), |_| Ok(Value::from("fallback")))
            .param(x, TypeIdx::GENERIC),
    );
    DecisionModel::new(b.build().unwrap())
}

fn keyed_limit(shape: &SpecShape) -> Option<u32> {
    (TYPES[shape.ty] == standard::INT)
        .then_some(shape.keyed)
        .flatten()
        .map(|n| u32::try_from(n).unwrap())
}

proptest! {
    #[test]
    fn same_calls_same_chain(
        shapes in prop::collection::vec(shape(), 1..6),
        calls in prop::collection::vec(arg(), 1..16),
    ) {
        let dm = build(&shapes);
        let a = AdaptiveNode::new(Arc::clone(&dm));
        let b = AdaptiveNode::new(dm);
        for call in &calls {
            let left = a.execute(std::slice::from_ref(call)).unwrap();
            let right = b.execute(std::slice::from_ref(call)).unwrap();
            prop_assert_eq!(left, right);
        }
        prop_assert_eq!(a.chain(), b.chain());
        prop_assert_eq!(a.state(), b.state());
    }

    #[test]
    fn chain_invariants_hold_after_every_call(
        shapes in prop::collection::vec(shape(), 1..6),
        calls in prop::collection::vec(arg(), 1..16),
    ) {
        let node = AdaptiveNode::new(build(&shapes));
        let mut previous_len = 0;
        let mut previous_excluded = node.excluded();
        for call in &calls {
            node.execute(std::slice::from_ref(call)).unwrap();
            let chain = node.chain();
            let excluded = node.excluded();

            // The published state agrees with the chain.
            let consistent = match node.state() {
                NodeState::Uninitialized | NodeState::Generic => chain.is_empty(),
                NodeState::Monomorphic => chain.len() == 1,
                NodeState::Polymorphic => chain.len() > 1,
            };
            prop_assert!(consistent, "{:?} with chain {:?}", node.state(), chain);

            // Declaration order.
            prop_assert!(chain.windows(2).all(|w| w[0] <= w[1]), "chain out of order: {:?}", chain);

            // Exclusion is permanent and sound.
            prop_assert!(previous_excluded.is_subset(&excluded));
            prop_assert!(chain.iter().all(|&spec| !excluded.contains(spec)));

            // Instance limits.
            for (i, shape) in shapes.iter().enumerate() {
                let spec = SpecId::from_raw(u32::try_from(i).unwrap());
                if let Some(limit) = keyed_limit(shape) {
                    let in_chain = chain.iter().filter(|&&s| s == spec).count();
                    prop_assert!(u32::try_from(in_chain).unwrap() <= limit);
                    prop_assert!(node.live_instances(spec) <= limit);
                }
            }

            // The chain only shrinks through exclusion or the Generic transition.
            if chain.len() < previous_len {
                prop_assert!(
                    node.state() == NodeState::Generic || excluded.len() > previous_excluded.len(),
                    "chain shrank without a cause"
                );
            }
            previous_len = chain.len();
            previous_excluded = excluded;
        }
    }

    #[test]
    fn invalid_assumption_is_never_recommitted(
        calls in prop::collection::vec(-3..3i32, 1..12),
        invalidate_at in 0..12usize,
    ) {
        let interner = SharedInterner::new();
        let x = interner.intern("x");
        let stable = Assumption::new("stable");
        let mut b = NodeModelBuilder::new(
            interner.intern("assume"),
            [TypeIdx::GENERIC],
            SharedTypeSystem::standard(),
            interner.clone(),
        );
        b.add(
            SpecializationDecl::new(interner.intern("guarded"), |_| Ok(Value::from("guarded")))
                .param(x, standard::INT)
                .assumption(interner.intern("a"), Expr::Const(Value::Assumption(stable.clone()))),
        );
        b.add(
            SpecializationDecl::fallback(interner.intern("fallback"), |_| Ok(Value::from("fallback")))
                .param(x, TypeIdx::GENERIC),
        );
        let node = AdaptiveNode::new(DecisionModel::new(b.build().unwrap()));
        let guarded = SpecId::from_raw(0);

        let mut created_at_invalidation = None;
        for (i, n) in calls.iter().enumerate() {
            if i == invalidate_at {
                stable.invalidate();
                created_at_invalidation = Some(node.created_instances(guarded));
            }
            let result = node.execute(&[Value::Int(*n)]).unwrap();
            if let Some(created) = created_at_invalidation {
                prop_assert_eq!(result, Value::from("fallback"));
                prop_assert_eq!(node.created_instances(guarded), created);
                prop_assert_eq!(node.live_instances(guarded), 0);
            }
        }
    }
}
