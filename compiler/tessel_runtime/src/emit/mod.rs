//! Emitters: consumers of a finished decision model.

use std::fmt::{self, Write as _};

use crate::DecisionModel;

/// Turns a decision model into some output (generated code, a dump, ...).
///
/// Emitters only read the model; the runtime contract they realize is the
/// one [`AdaptiveNode`](crate::AdaptiveNode) implements.
pub trait Emitter {
    type Output;
    type Error;

    fn emit(&mut self, model: &DecisionModel) -> Result<Self::Output, Self::Error>;
}

/// Text rendering of the decision tree followed by per-specialization
/// metadata.
#[derive(Copy, Clone, Debug, Default)]
pub struct TreeDump;

impl Emitter for TreeDump {
    type Output = String;
    type Error = fmt::Error;

    fn emit(&mut self, dm: &DecisionModel) -> Result<String, fmt::Error> {
        let model = dm.model();
        let types = model.types();
        let interner = model.interner();

        let mut out = dm.tree().display(model).to_string();
        writeln!(out, "specializations")?;
        for spec in model.specializations() {
            write!(out, "  {}(", model.spec_name(spec.id))?;
            for (i, ty) in spec.signature.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(types.name(*ty));
            }
            out.push(')');
            if spec.is_fallback() {
                out.push_str(" fallback");
            }
            if !spec.guards.is_empty() {
                write!(out, " guards={}", spec.guards.len())?;
            }
            if spec.has_caches() {
                write!(out, " caches={}", spec.caches.len())?;
            }
            if let Some(limit) = &spec.limit {
                write!(out, " limit={}", limit.display(interner))?;
            }
            if !spec.assumptions.is_empty() {
                write!(out, " assumptions={}", spec.assumptions.len())?;
            }
            if !spec.contains.is_empty() {
                let names: Vec<_> = spec.contains.iter().map(|c| model.spec_name(c)).collect();
                write!(out, " contains=[{}]", names.join(", "))?;
            }
            if !spec.rewrite_on.is_empty() {
                let names: Vec<_> = spec.rewrite_on.iter().map(|e| interner.lookup(*e)).collect();
                write!(out, " rewrite_on=[{}]", names.join(", "))?;
            }
            if !spec.reachable {
                out.push_str(" unreachable");
            }
            out.push('\n');
        }
        Ok(out)
    }
}
