//! Model fixtures shared by the unit tests.

use std::sync::Arc;

use tessel_ir::{Name, SharedInterner};
use tessel_model::{
    BinaryOp, Expr, ModelOptions, NodeModel, NodeModelBuilder, SpecId, SpecializationDecl,
};
use tessel_types::{standard, SharedTypeSystem, TypeIdx, Value};

use crate::{AdaptiveNode, DecisionModel};

pub struct Fixture {
    pub interner: SharedInterner,
    pub builder: NodeModelBuilder,
}

impl Fixture {
    pub fn new(node: &str, arity: usize) -> Self {
        let interner = SharedInterner::new();
        let builder = NodeModelBuilder::new(
            interner.intern(node),
            std::iter::repeat(TypeIdx::GENERIC).take(arity),
            SharedTypeSystem::standard(),
            interner.clone(),
        );
        Fixture { interner, builder }
    }

    pub fn with_options(mut self, options: ModelOptions) -> Self {
        self.builder = self.builder.with_options(options);
        self
    }

    pub fn name(&self, s: &str) -> Name {
        self.interner.intern(s)
    }

    pub fn x(&self) -> Name {
        self.name("x")
    }

    /// A specialization whose body returns its own name.
    pub fn spec(&self, name: &'static str) -> SpecializationDecl {
        SpecializationDecl::new(self.name(name), move |_| Ok(Value::from(name)))
    }

    pub fn fallback(&self, name: &'static str) -> SpecializationDecl {
        SpecializationDecl::fallback(self.name(name), move |_| Ok(Value::from(name)))
    }

    pub fn add(mut self, decl: SpecializationDecl) -> Self {
        self.builder.add(decl);
        self
    }

    pub fn model(self) -> NodeModel {
        self.builder.build().unwrap()
    }

    pub fn decision(self) -> Arc<DecisionModel> {
        DecisionModel::new(self.model())
    }

    pub fn node(self) -> AdaptiveNode {
        AdaptiveNode::new(self.decision())
    }
}

pub fn id(i: u32) -> SpecId {
    SpecId::from_raw(i)
}

pub fn s(v: &str) -> Value {
    Value::from(v)
}

/// `int(x: int)`, `double(x: double)`, fallback `generic`.
pub fn typed() -> Fixture {
    let fx = Fixture::new("typed", 1);
    let int = fx.spec("int").param(fx.x(), standard::INT);
    let double = fx.spec("double").param(fx.x(), standard::DOUBLE);
    let generic = fx.fallback("generic").param(fx.x(), TypeIdx::GENERIC);
    fx.add(int).add(double).add(generic)
}

/// `keyed(x: int)` caching `key = x` behind the guard `x == key`.
pub fn keyed(limit: Option<i32>) -> Fixture {
    let fx = Fixture::new("keyed", 1);
    let key = fx.name("key");
    let mut decl = fx
        .spec("keyed")
        .param(fx.x(), standard::INT)
        .cached(key, standard::INT, Expr::var(fx.x()))
        .guard(Expr::binary(BinaryOp::Eq, Expr::var(fx.x()), Expr::var(key)));
    if let Some(limit) = limit {
        decl = decl.limit(Expr::int(limit));
    }
    fx.add(decl)
}
