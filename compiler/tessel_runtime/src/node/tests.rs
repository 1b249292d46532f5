use pretty_assertions::assert_eq;
use tessel_model::{BinaryOp, Expr, ModelOptions, SpecializationDecl, Thrown};
use tessel_types::{standard, Assumption, TypeIdx};

use super::*;
use crate::test_helpers::{id, keyed, s, typed, Fixture};

fn run(node: &AdaptiveNode, arg: Value) -> Value {
    node.execute(&[arg]).unwrap()
}

fn with_fallback(fx: Fixture) -> Fixture {
    let generic = fx.fallback("generic").param(fx.x(), TypeIdx::GENERIC);
    fx.add(generic)
}

// ── Lifecycle ──

#[test]
fn first_call_goes_monomorphic() {
    let node = typed().node();
    assert_eq!(node.state(), NodeState::Uninitialized);

    assert_eq!(run(&node, Value::Int(1)), s("int"));
    assert_eq!(node.state(), NodeState::Monomorphic);
    assert_eq!(node.chain_names(), vec!["int"]);

    assert_eq!(run(&node, Value::Int(2)), s("int"));
    assert_eq!(
        node.stats(),
        StatsSnapshot {
            hits: 1,
            rewrites: 1,
            generic_dispatches: 0,
        }
    );
    assert_eq!(node.generation(), 1);
}

#[test]
fn committed_instance_accepts_implicit_casts() {
    let node = typed().node();
    assert_eq!(run(&node, Value::Double(2.5)), s("double"));
    assert_eq!(run(&node, Value::Int(1)), s("double"));
    assert_eq!(node.chain_names(), vec!["double"]);
}

#[test]
fn chain_keeps_declaration_order() {
    let fx = Fixture::new("ordered", 1);
    let int = fx.spec("int").param(fx.x(), standard::INT);
    let string = fx.spec("string").param(fx.x(), standard::STRING);
    let node = fx.add(int).add(string).node();

    assert_eq!(run(&node, s("a")), s("string"));
    assert_eq!(run(&node, Value::Int(1)), s("int"));
    assert_eq!(node.state(), NodeState::Polymorphic);
    assert_eq!(node.chain_names(), vec!["int", "string"]);
    assert_eq!(run(&node, s("b")), s("string"));
}

#[test]
fn only_fallback_goes_generic() {
    let node = typed().node();
    run(&node, Value::Int(1));
    run(&node, Value::Double(2.0));
    assert_eq!(node.chain_names(), vec!["int", "double"]);

    assert_eq!(run(&node, s("x")), s("generic"));
    assert_eq!(node.state(), NodeState::Generic);
    assert!(node.chain().is_empty());

    // Generic dispatch still takes the first matching specialization.
    assert_eq!(run(&node, Value::Int(1)), s("int"));
    assert_eq!(node.state(), NodeState::Generic);
    assert_eq!(node.stats().generic_dispatches, 2);
}

#[test]
fn fallback_first_then_specializations() {
    let node = typed().node();
    assert_eq!(run(&node, s("x")), s("generic"));
    assert_eq!(node.state(), NodeState::Monomorphic);
    assert_eq!(node.chain_names(), vec!["generic"]);

    // The fallback only applies while nothing else does.
    assert_eq!(run(&node, Value::Int(1)), s("int"));
    assert_eq!(node.chain_names(), vec!["int", "generic"]);
    assert_eq!(run(&node, s("y")), s("generic"));
    assert_eq!(node.state(), NodeState::Polymorphic);
}

#[test]
fn arity_is_checked() {
    let node = typed().node();
    let err = node.execute(&[]).unwrap_err();
    assert!(matches!(
        err,
        ExecError::ArityMismatch {
            node: "typed",
            expected: 1,
            found: 0,
        }
    ));
}

#[test]
fn no_match_without_fallback_is_unsupported() {
    let fx = Fixture::new("only_int", 1);
    let int = fx.spec("int").param(fx.x(), standard::INT);
    let node = fx.add(int).node();

    let err = node.execute(&[s("x")]).unwrap_err();
    let unsupported = err.as_unsupported().unwrap();
    assert_eq!(
        unsupported,
        &UnsupportedSpecialization {
            node: "only_int",
            args: vec![s("x")],
            tried: vec!["int"],
            reason: UnsupportedReason::NoMatch,
        }
    );
    assert_eq!(
        err.to_string(),
        "unsupported specialization of `only_int` for (\"x\"): no specialization matched; tried [int]"
    );
    assert_eq!(node.state(), NodeState::Uninitialized);
}

// ── Bindings ──

#[test]
fn bodies_see_cast_values_locals_and_caches() {
    let fx = Fixture::new("bindings", 1);
    let (y, c) = (fx.name("y"), fx.name("c"));
    let decl = SpecializationDecl::new(fx.name("show"), |a| {
        Ok(Value::string(format!("{:?}/{:?}/{:?}", a.args, a.locals, a.cached)))
    })
    .param(fx.x(), standard::LONG)
    .bind(y, standard::LONG, Expr::binary(BinaryOp::Add, Expr::var(fx.x()), Expr::int(1)))
    .cached(c, standard::LONG, Expr::binary(BinaryOp::Mul, Expr::var(fx.x()), Expr::int(2)));
    let node = fx.add(decl).node();

    assert_eq!(run(&node, Value::Int(4)), s("[4L]/[5L]/[8L]"));
}

// ── Exclusion and rewrites ──

fn small_and_wide(fx: Fixture, generic: bool) -> Fixture {
    let small = fx
        .spec("small")
        .param(fx.x(), standard::INT)
        .guard(Expr::binary(BinaryOp::Lt, Expr::var(fx.x()), Expr::int(10)));
    let mut wide = fx
        .spec("wide")
        .param(fx.x(), standard::INT)
        .contains(fx.name("small"));
    if generic {
        wide = wide.generic();
    }
    fx.add(small).add(wide)
}

#[test]
fn committing_a_container_evicts_what_it_contains() {
    let node = small_and_wide(Fixture::new("exclusion", 1), false).node();
    assert_eq!(run(&node, Value::Int(5)), s("small"));
    assert_eq!(run(&node, Value::Int(50)), s("wide"));

    assert_eq!(node.chain_names(), vec!["wide"]);
    assert_eq!(node.state(), NodeState::Monomorphic);
    assert!(node.excluded().contains(id(0)));
    assert_eq!(node.live_instances(id(0)), 0);
    assert_eq!(node.created_instances(id(0)), 1);

    assert_eq!(run(&node, Value::Int(5)), s("wide"));
}

#[test]
fn generic_excludes_what_the_generic_specialization_contains() {
    let node = small_and_wide(Fixture::new("exclusion", 1), true).node();
    assert_eq!(run(&node, Value::Int(5)), s("small"));

    let err = node.execute(&[s("x")]).unwrap_err();
    assert_eq!(err.as_unsupported().map(|u| &u.reason), Some(&UnsupportedReason::NoMatch));
    assert_eq!(node.state(), NodeState::Generic);
    assert!(node.excluded().contains(id(0)));

    assert_eq!(run(&node, Value::Int(5)), s("wide"));
}

#[test]
fn rewrite_exception_excludes_and_redispatches() {
    let fx = Fixture::new("rewrite", 1);
    let (overflow, boom) = (fx.name("Overflow"), fx.name("Boom"));
    let fast = SpecializationDecl::new(fx.name("fast"), move |a| match a.args[0] {
        Value::Int(n) if n > 100 => Err(Thrown::new(overflow, "too big")),
        Value::Int(n) if n < 0 => Err(Thrown::new(boom, "negative")),
        _ => Ok(s("fast")),
    })
    .param(fx.x(), standard::INT)
    .rewrite_on(overflow);
    let slow = fx.spec("slow").param(fx.x(), standard::INT);
    let node = fx.add(fast).add(slow).node();

    assert_eq!(run(&node, Value::Int(1)), s("fast"));
    let err = node.execute(&[Value::Int(-1)]).unwrap_err();
    assert!(matches!(err, ExecError::Thrown(ref t) if t.exception == boom));
    assert_eq!(node.chain_names(), vec!["fast"]);

    assert_eq!(run(&node, Value::Int(1000)), s("slow"));
    assert_eq!(node.chain_names(), vec!["slow"]);
    assert!(node.excluded().contains(id(0)));
    assert_eq!(run(&node, Value::Int(1)), s("slow"));
}

#[test]
fn invalidated_assumption_is_replaced() {
    let stable = Assumption::new("stable");
    let fx = Fixture::new("assume", 1);
    let guarded = fx
        .spec("guarded")
        .param(fx.x(), TypeIdx::GENERIC)
        .assumption(fx.name("a"), Expr::Const(Value::Assumption(stable.clone())));
    let plain = fx.spec("plain").param(fx.x(), TypeIdx::GENERIC);
    let dm = fx.add(guarded).add(plain).decision();
    let node = AdaptiveNode::new(Arc::clone(&dm));

    assert_eq!(run(&node, Value::Int(1)), s("guarded"));
    stable.invalidate();
    assert_eq!(run(&node, Value::Int(1)), s("plain"));
    assert_eq!(node.chain_names(), vec!["plain"]);
    assert_eq!(node.created_instances(id(0)), 1);
    assert!(!node.excluded().contains(id(0)));

    // Never committed again, on this node or a fresh one.
    assert_eq!(run(&node, Value::Int(2)), s("plain"));
    let fresh = AdaptiveNode::new(dm);
    assert_eq!(run(&fresh, Value::Int(1)), s("plain"));
}

#[test]
fn invalidated_assumption_without_alternative_goes_generic() {
    let stable = Assumption::new("stable");
    let fx = Fixture::new("assume", 1);
    let guarded = fx
        .spec("guarded")
        .param(fx.x(), TypeIdx::GENERIC)
        .assumption(fx.name("a"), Expr::Const(Value::Assumption(stable.clone())));
    let node = with_fallback(fx.add(guarded)).node();

    assert_eq!(run(&node, Value::Int(1)), s("guarded"));
    stable.invalidate();
    assert_eq!(run(&node, Value::Int(1)), s("generic"));
    assert_eq!(node.state(), NodeState::Generic);
}

#[test]
fn failed_replacement_leaves_the_node_uninitialized() {
    let stable = Assumption::new("stable");
    let fx = Fixture::new("assume", 1);
    let guarded = fx
        .spec("guarded")
        .param(fx.x(), TypeIdx::GENERIC)
        .assumption(fx.name("a"), Expr::Const(Value::Assumption(stable.clone())));
    let node = fx.add(guarded).node();

    assert_eq!(run(&node, Value::Int(1)), s("guarded"));
    stable.invalidate();

    let err = node.execute(&[Value::Int(1)]).unwrap_err();
    assert_eq!(err.as_unsupported().map(|u| &u.reason), Some(&UnsupportedReason::NoMatch));
    assert_eq!(node.state(), NodeState::Uninitialized);
    assert!(node.chain().is_empty());
    assert_eq!(node.live_instances(id(0)), 0);

    assert!(node.execute(&[Value::Int(2)]).is_err());
    assert_eq!(node.state(), NodeState::Uninitialized);
}

// ── Limits ──

#[test]
fn cache_limit_goes_generic() {
    let node = with_fallback(keyed(Some(2))).node();
    for key in [1, 2, 1, 2] {
        assert_eq!(run(&node, Value::Int(key)), s("keyed"));
    }
    assert_eq!(node.chain_names(), vec!["keyed", "keyed"]);
    assert_eq!(node.live_instances(id(0)), 2);

    assert_eq!(run(&node, Value::Int(3)), s("keyed"));
    assert_eq!(node.state(), NodeState::Generic);
    assert_eq!(node.live_instances(id(0)), 0);
    assert_eq!(node.created_instances(id(0)), 2);
}

#[test]
fn cache_limit_without_generic_is_unsupported() {
    let node = keyed(Some(2)).node();
    run(&node, Value::Int(1));
    run(&node, Value::Int(2));

    let err = node.execute(&[Value::Int(3)]).unwrap_err();
    assert_eq!(
        err.as_unsupported().map(|u| &u.reason),
        Some(&UnsupportedReason::CacheLimitExceeded {
            spec: "keyed",
            limit: 2,
        })
    );
    assert_eq!(node.state(), NodeState::Polymorphic);
    assert_eq!(node.chain().len(), 2);
    assert_eq!(run(&node, Value::Int(2)), s("keyed"));
}

#[test]
fn refused_container_keeps_what_it_contains() {
    let fx = Fixture::new("contained", 1);
    let (key, c) = (fx.name("key"), fx.name("c"));
    let a = fx
        .spec("a")
        .param(fx.x(), standard::INT)
        .cached(key, standard::INT, Expr::var(fx.x()))
        .guard(Expr::binary(BinaryOp::Eq, Expr::var(fx.x()), Expr::var(key)))
        .guard(Expr::binary(BinaryOp::Lt, Expr::var(fx.x()), Expr::int(10)))
        .limit(Expr::int(2));
    let b = fx
        .spec("b")
        .param(fx.x(), standard::INT)
        .cached(c, standard::INT, Expr::var(fx.x()))
        .limit(Expr::int(0))
        .contains(fx.name("a"));
    let node = fx.add(a).add(b).node();

    run(&node, Value::Int(1));
    run(&node, Value::Int(2));

    // `b` cannot be committed, so `a` stays live and counted.
    let err = node.execute(&[Value::Int(50)]).unwrap_err();
    assert_eq!(
        err.as_unsupported().map(|u| &u.reason),
        Some(&UnsupportedReason::CacheLimitExceeded { spec: "b", limit: 0 })
    );
    assert_eq!(node.chain_names(), vec!["a", "a"]);
    assert_eq!(node.live_instances(id(0)), 2);
    assert!(!node.excluded().contains(id(0)));

    let err = node.execute(&[Value::Int(3)]).unwrap_err();
    assert_eq!(
        err.as_unsupported().map(|u| &u.reason),
        Some(&UnsupportedReason::CacheLimitExceeded { spec: "a", limit: 2 })
    );
    assert_eq!(node.chain_names(), vec!["a", "a"]);
    assert_eq!(run(&node, Value::Int(2)), s("a"));
}

#[test]
fn generic_flag_stands_in_for_a_fallback() {
    let fx = Fixture::new("keyed", 1);
    let key = fx.name("key");
    let decl = fx
        .spec("keyed")
        .generic()
        .param(fx.x(), standard::INT)
        .cached(key, standard::INT, Expr::var(fx.x()))
        .guard(Expr::binary(BinaryOp::Eq, Expr::var(fx.x()), Expr::var(key)))
        .limit(Expr::int(1));
    let node = fx.add(decl).node();

    run(&node, Value::Int(1));
    assert_eq!(run(&node, Value::Int(2)), s("keyed"));
    assert_eq!(node.state(), NodeState::Generic);
}

#[test]
fn default_cache_limit_applies() {
    let node = with_fallback(keyed(None)).node();
    for key in 1..=3 {
        run(&node, Value::Int(key));
    }
    assert_eq!(node.chain().len(), 3);
    run(&node, Value::Int(4));
    assert_eq!(node.state(), NodeState::Generic);
}

#[test]
fn polymorphic_limit_goes_generic() {
    let fx = with_fallback(keyed(Some(10)))
        .with_options(ModelOptions::default().with_polymorphic_limit(2));
    let node = fx.node();
    run(&node, Value::Int(1));
    run(&node, Value::Int(2));
    assert_eq!(node.state(), NodeState::Polymorphic);
    run(&node, Value::Int(3));
    assert_eq!(node.state(), NodeState::Generic);
}

// ── Introspection ──

#[test]
fn debug_shows_state_and_chain() {
    let node = typed().node();
    run(&node, Value::Int(1));
    assert_eq!(
        format!("{node:?}"),
        "AdaptiveNode { node: \"typed\", state: Monomorphic, chain: [\"int\"], .. }"
    );
    assert_eq!(NodeState::Polymorphic.to_string(), "polymorphic");
}
