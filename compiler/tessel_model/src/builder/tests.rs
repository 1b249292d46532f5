use pretty_assertions::assert_eq;
use tessel_diagnostic::ErrorCode;
use tessel_ir::SharedInterner;
use tessel_types::{standard, SharedTypeSystem, Value};

use super::*;
use crate::{BinaryOp, Purity};

struct Fixture {
    interner: SharedInterner,
    types: SharedTypeSystem,
    functions: FunctionTable,
}

impl Fixture {
    fn new() -> Self {
        let interner = SharedInterner::new();
        let mut functions = FunctionTable::new();
        functions.register(interner.intern("identity"), Purity::Pure, |args| {
            Ok(args.first().cloned().unwrap_or(Value::Unit))
        });
        functions.register(interner.intern("clock"), Purity::Dynamic, |_| Ok(Value::Int(0)));
        Fixture {
            interner,
            types: SharedTypeSystem::standard(),
            functions,
        }
    }

    fn n(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    fn builder(&self, arity: usize) -> NodeModelBuilder {
        NodeModelBuilder::new(
            self.n("node"),
            std::iter::repeat(TypeIdx::GENERIC).take(arity),
            self.types.clone(),
            self.interner.clone(),
        )
        .with_functions(self.functions.clone())
    }

    fn spec(&self, name: &str) -> SpecializationDecl {
        SpecializationDecl::new(self.n(name), |_| Ok(Value::Unit))
    }

    fn fallback(&self, name: &str) -> SpecializationDecl {
        SpecializationDecl::fallback(self.n(name), |_| Ok(Value::Unit))
    }

    fn gt0(&self, var: &str) -> Expr {
        Expr::binary(BinaryOp::Gt, Expr::var(self.n(var)), Expr::int(0))
    }
}

fn codes(errors: &ModelErrors) -> Vec<ErrorCode> {
    errors.diagnostics.iter().map(|d| d.code).collect()
}

#[test]
fn builds_simple_model() {
    let fx = Fixture::new();
    let mut b = fx.builder(1);
    b.add(fx.spec("int").param(fx.n("x"), standard::INT));
    b.add(fx.spec("double").param(fx.n("x"), standard::DOUBLE));
    b.add(fx.fallback("generic").param(fx.n("x"), TypeIdx::GENERIC));
    let model = b.build().unwrap();

    assert_eq!(model.arity(), 1);
    assert_eq!(model.specializations().len(), 3);
    assert_eq!(model.fallback(), Some(SpecId::from_raw(2)));
    assert_eq!(model.generic(), Some(SpecId::from_raw(2)));
    assert_eq!(model.spec_name(SpecId::from_raw(1)), "double");
    assert_eq!(model.reachable().count(), 2);
    assert!(model.warnings().is_empty());

    let int = &model[SpecId::from_raw(0)];
    assert_eq!(
        int.type_guards.as_slice(),
        &[TypeGuard {
            index: 0,
            ty: standard::INT
        }]
    );
    assert_eq!(int.binding(fx.n("x")), Some(ParamKind::Signature(0)));
}

#[test]
fn no_type_guard_when_child_type_matches() {
    let fx = Fixture::new();
    let mut b = NodeModelBuilder::new(
        fx.n("node"),
        [standard::INT],
        fx.types.clone(),
        fx.interner.clone(),
    );
    b.add(fx.spec("int").param(fx.n("x"), standard::INT));
    b.add(fx.spec("long").param(fx.n("x"), standard::LONG));
    let model = b.build().unwrap();
    assert!(model[SpecId::from_raw(0)].type_guards.is_empty());
    assert_eq!(model[SpecId::from_raw(1)].type_guards.len(), 1);
}

#[test]
fn no_cast_available() {
    let fx = Fixture::new();
    let mut b = NodeModelBuilder::new(
        fx.n("node"),
        [standard::DOUBLE],
        fx.types.clone(),
        fx.interner.clone(),
    );
    b.add(fx.spec("int").param(fx.n("x"), standard::INT));
    let errors = b.build().unwrap_err();
    assert_eq!(codes(&errors), vec![ErrorCode::E1003]);
    assert!(errors.diagnostics[0]
        .message
        .contains("no implicit cast from `double` to `int`"));
}

#[test]
fn arity_and_duplicate_names() {
    let fx = Fixture::new();
    let mut b = fx.builder(1);
    b.add(fx.spec("a").param(fx.n("x"), standard::INT));
    b.add(fx.spec("a").param(fx.n("x"), standard::LONG));
    b.add(
        fx.spec("b")
            .param(fx.n("x"), standard::INT)
            .param(fx.n("x"), standard::INT),
    );
    let errors = b.build().unwrap_err();
    let codes = codes(&errors);
    assert!(codes.contains(&ErrorCode::E2001));
    assert!(codes.contains(&ErrorCode::E2004));
    assert!(codes.contains(&ErrorCode::E2013));
}

#[test]
fn unbound_names_and_unknown_functions() {
    let fx = Fixture::new();
    let mut b = fx.builder(1);
    b.add(
        fx.spec("a")
            .param(fx.n("x"), standard::INT)
            .guard(fx.gt0("y"))
            .guard(Expr::call(fx.n("missing"), vec![])),
    );
    let errors = b.build().unwrap_err();
    assert_eq!(codes(&errors), vec![ErrorCode::E2002, ErrorCode::E2003]);
}

#[test]
fn guards_are_classified() {
    let fx = Fixture::new();
    let mut b = fx.builder(1);
    b.add(
        fx.spec("a")
            .param(fx.n("x"), standard::INT)
            .cached(fx.n("c"), standard::INT, Expr::var(fx.n("x")))
            .cached(fx.n("d"), standard::INT, Expr::int(1))
            .guard(Expr::binary(
                BinaryOp::Eq,
                Expr::var(fx.n("x")),
                Expr::var(fx.n("c")),
            ))
            .guard(fx.gt0("d"))
            .guard(Expr::negated(Expr::negated(fx.gt0("x")))),
    );
    let model = b.build().unwrap();
    let spec = &model[SpecId::from_raw(0)];

    assert_eq!(spec.guards[0].kind, GuardKind::Dynamic);
    assert_eq!(spec.guards[0].caches.as_slice(), &[0]);
    assert_eq!(spec.guards[1].kind, GuardKind::Static);
    assert_eq!(spec.guards[2].kind, GuardKind::Dynamic);
    assert!(!spec.guards[2].negated);
    assert!(spec.caches[0].bound_by_guard);
    assert!(spec.caches[1].bound_by_guard);
    assert!(spec.flags.contains(SpecializationFlags::CACHED));
    assert!(spec.flags.contains(SpecializationFlags::REWRITABLE));
    assert!(spec.flags.contains(SpecializationFlags::STATIC_GUARDS));
}

#[test]
fn dynamic_call_keeps_guard_dynamic() {
    let fx = Fixture::new();
    let mut b = fx.builder(0);
    b.add(fx.spec("a").guard(Expr::binary(
        BinaryOp::Eq,
        Expr::call(fx.n("clock"), vec![]),
        Expr::int(0),
    )));
    let model = b.build().unwrap();
    assert_eq!(model[SpecId::from_raw(0)].guards[0].kind, GuardKind::Dynamic);
}

#[test]
fn cache_reads_later_cache() {
    let fx = Fixture::new();
    let mut b = fx.builder(1);
    b.add(
        fx.spec("a")
            .param(fx.n("x"), standard::INT)
            .cached(fx.n("c"), standard::INT, Expr::var(fx.n("d")))
            .cached(fx.n("d"), standard::INT, Expr::var(fx.n("x"))),
    );
    let errors = b.build().unwrap_err();
    assert_eq!(codes(&errors), vec![ErrorCode::E2012]);
}

#[test]
fn guard_reads_adopted_cache() {
    let fx = Fixture::new();
    let mut b = fx.builder(1);
    b.add(
        fx.spec("a")
            .param(fx.n("x"), standard::INT)
            .adopted(fx.n("child"), TypeIdx::GENERIC, Expr::var(fx.n("x")))
            .guard(Expr::binary(
                BinaryOp::Eq,
                Expr::var(fx.n("child")),
                Expr::var(fx.n("x")),
            )),
    );
    let errors = b.build().unwrap_err();
    assert_eq!(codes(&errors), vec![ErrorCode::E2011]);
}

#[test]
fn local_bindings() {
    let fx = Fixture::new();
    let mut b = fx.builder(1);
    b.add(
        fx.spec("a")
            .param(fx.n("x"), standard::INT)
            .bind(
                fx.n("twice"),
                standard::INT,
                Expr::binary(BinaryOp::Add, Expr::var(fx.n("x")), Expr::var(fx.n("x"))),
            )
            .guard(fx.gt0("twice")),
    );
    let model = b.build().unwrap();
    let spec = &model[SpecId::from_raw(0)];
    assert_eq!(spec.locals.len(), 1);
    assert_eq!(spec.binding(fx.n("twice")), Some(ParamKind::Local(0)));
    assert_eq!(spec.guards[0].kind, GuardKind::Dynamic);

    let mut b = fx.builder(1);
    b.add(
        fx.spec("a")
            .param(fx.n("x"), standard::INT)
            .cached(fx.n("c"), standard::INT, Expr::int(1))
            .bind(fx.n("l"), standard::INT, Expr::var(fx.n("c"))),
    );
    assert_eq!(codes(&b.build().unwrap_err()), vec![ErrorCode::E2002]);
}

#[test]
fn limit_rules() {
    let fx = Fixture::new();
    let mut b = fx.builder(1);
    b.add(
        fx.spec("a")
            .param(fx.n("x"), standard::INT)
            .limit(Expr::var(fx.n("x"))),
    );
    let errors = b.build().unwrap_err();
    assert_eq!(codes(&errors), vec![ErrorCode::E2010]);

    let mut b = fx.builder(1);
    b.add(
        fx.spec("a")
            .param(fx.n("x"), standard::INT)
            .limit(Expr::int(2)),
    );
    let model = b.build().unwrap();
    assert_eq!(model.warnings().len(), 1);
    assert_eq!(model.warnings()[0].code, ErrorCode::W2002);
}

#[test]
fn fallback_rules() {
    let fx = Fixture::new();
    let mut b = fx.builder(1);
    b.add(fx.fallback("f1").param(fx.n("x"), TypeIdx::GENERIC));
    b.add(fx.fallback("f2").param(fx.n("x"), TypeIdx::GENERIC));
    assert_eq!(codes(&b.build().unwrap_err()), vec![ErrorCode::E2008]);

    let mut b = fx.builder(1);
    b.add(
        fx.fallback("f")
            .param(fx.n("x"), TypeIdx::GENERIC)
            .guard(fx.gt0("x")),
    );
    assert_eq!(codes(&b.build().unwrap_err()), vec![ErrorCode::E2009]);

    let mut b = fx.builder(1);
    b.add(fx.fallback("f").param(fx.n("x"), standard::INT));
    assert_eq!(codes(&b.build().unwrap_err()), vec![ErrorCode::E2009]);
}

#[test]
fn contains_is_transitive() {
    let fx = Fixture::new();
    let mut b = fx.builder(1);
    b.add(fx.spec("a").param(fx.n("x"), standard::INT).guard(fx.gt0("x")));
    b.add(
        fx.spec("b")
            .param(fx.n("x"), standard::INT)
            .contains(fx.n("a")),
    );
    b.add(
        fx.spec("c")
            .param(fx.n("x"), TypeIdx::GENERIC)
            .contains(fx.n("b")),
    );
    let model = b.build().unwrap();
    let (a, bb, c) = (SpecId::from_raw(0), SpecId::from_raw(1), SpecId::from_raw(2));
    assert_eq!(model[c].contains.iter().collect::<Vec<_>>(), vec![a, bb]);
    assert_eq!(model[a].excluded_by.iter().collect::<Vec<_>>(), vec![bb, c]);
    assert!(model[bb].reachable);
    assert!(model[c].reachable);
}

#[test]
fn contains_errors() {
    let fx = Fixture::new();
    let mut b = fx.builder(0);
    b.add(fx.spec("a").contains(fx.n("b")));
    b.add(fx.spec("b").guard(Expr::bool(true)).contains(fx.n("b")));
    b.add(fx.spec("c").guard(Expr::bool(false)).contains(fx.n("nope")));
    let errors = b.build().unwrap_err();
    let codes = codes(&errors);
    assert!(codes.contains(&ErrorCode::E2006));
    assert!(codes.contains(&ErrorCode::E2007));
    assert!(codes.contains(&ErrorCode::E2005));
}

#[test]
fn unreachable_is_a_warning_by_default() {
    let fx = Fixture::new();
    let mut b = fx.builder(1);
    b.add(fx.spec("any").param(fx.n("x"), TypeIdx::GENERIC));
    b.add(fx.spec("int").param(fx.n("x"), standard::INT));
    let model = b.build().unwrap();
    assert_eq!(model.warnings().len(), 1);
    assert_eq!(model.warnings()[0].code, ErrorCode::W2001);
    assert_eq!(
        model.warnings()[0].message,
        "specialization `int` is unreachable"
    );
    let int = &model[SpecId::from_raw(1)];
    assert!(!int.reachable);
    assert_eq!(int.shadowed_by, Some(SpecId::from_raw(0)));
}

#[test]
fn unreachable_as_error() {
    let fx = Fixture::new();
    let mut b = fx
        .builder(1)
        .with_options(ModelOptions::default().with_unreachable_is_error(true));
    b.add(fx.spec("any").param(fx.n("x"), TypeIdx::GENERIC));
    b.add(fx.spec("int").param(fx.n("x"), standard::INT));
    assert_eq!(codes(&b.build().unwrap_err()), vec![ErrorCode::E2014]);
}

#[test]
fn generic_without_fallback() {
    let fx = Fixture::new();
    let mut b = fx.builder(1);
    b.add(fx.spec("int").param(fx.n("x"), standard::INT));
    b.add(fx.spec("obj").param(fx.n("x"), TypeIdx::GENERIC).generic());
    let model = b.build().unwrap();
    assert_eq!(model.fallback(), None);
    assert_eq!(model.generic(), Some(SpecId::from_raw(1)));

    let mut b = fx.builder(1);
    b.add(fx.spec("int").param(fx.n("x"), standard::INT));
    assert_eq!(b.build().unwrap().generic(), None);
}

#[test]
fn implicit_sources_follow_declaration_order() {
    let fx = Fixture::new();
    let mut b = fx.builder(1);
    b.add(fx.spec("long").param(fx.n("x"), standard::LONG).guard(fx.gt0("x")));
    b.add(fx.spec("double").param(fx.n("x"), standard::DOUBLE));
    let model = b.build().unwrap();
    // `long` is declared first, so it is tried before `int` even though the
    // type system lists `int` first.
    assert_eq!(
        model.implicit_sources_in_use(0, standard::DOUBLE),
        &[standard::LONG, standard::INT]
    );
    assert_eq!(
        model.implicit_sources_in_use(0, standard::LONG),
        &[standard::INT]
    );
}
