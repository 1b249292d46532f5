//! Specialization model for Tessel.
//!
//! A node model is the validated description of one polymorphic
//! operation: its child signature and the ordered specializations that
//! implement it.
//!
//! - [`Expr`], [`Env`], [`FunctionTable`]: the expression language guards,
//!   caches, assumptions and limits are written in.
//! - [`SpecializationDecl`] / [`NodeModelBuilder`]: front-end input and
//!   validation, reporting [`tessel_diagnostic::Diagnostic`]s.
//! - [`NodeModel`] / [`Specialization`]: the immutable result, read by the
//!   decision tree builder, the cache manager and the runtime.
//! - [`ModelOptions`]: limits shared by every node built from a model.

mod builder;
mod expr;
mod model;
mod options;
pub mod reachability;
mod spec_set;
mod specialization;

pub use builder::{NodeModelBuilder, SpecializationDecl};
pub use expr::{
    BinaryOp, Env, EvalError, Expr, ExprDisplay, FunctionTable, HostFn, HostFunction, Purity,
};
pub use model::{ModelErrors, NodeModel};
pub use options::ModelOptions;
pub use spec_set::SpecSet;
pub use specialization::{
    AssumptionExpression, Body, BodyArgs, CacheExpression, GuardExpression, GuardKind,
    LocalBinding, ParamKind, Parameter, SpecId, SpecKind, Specialization, SpecializationFlags,
    Thrown, TypeGuard,
};
