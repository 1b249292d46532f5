//! Dead-alternative elimination.
//!
//! Runs once at model build. A specialization is unreachable when an
//! earlier reachable one always matches first and can never be removed
//! again.

use tessel_types::TypeSystem;

use crate::specialization::{SpecId, Specialization};

/// True if `a`, declared before `b`, makes `b` dead.
///
/// `a` must not be rewritable, `b` must not contain `a`, `a`'s type must
/// accept `b`'s at every signature position, and every guard of `a` must
/// appear in `b`.
pub fn shadows(a: &Specialization, b: &Specialization, types: &TypeSystem) -> bool {
    if a.is_rewritable() || b.contains.contains(a.id) || b.is_fallback() {
        return false;
    }
    let arity = a.signature.len().max(b.signature.len());
    let types_accept = (0..arity).all(|i| {
        let (ta, tb) = (a.param_type(i), b.param_type(i));
        ta.is_generic() || ta == tb || types.lookup_implicit_sources(ta).contains(&tb)
    });
    types_accept && a.guards_subset_of(b)
}

/// True if `a` matches every call and never leaves the chain.
pub fn is_catch_all(a: &Specialization) -> bool {
    !a.is_fallback()
        && a.type_guards.is_empty()
        && a.guards.is_empty()
        && a.caches.is_empty()
        && !a.is_rewritable()
}

/// Mark unreachable specializations; returns `(unreachable, shadowed_by)`
/// pairs in declaration order.
pub(crate) fn compute(specs: &mut [Specialization], types: &TypeSystem) -> Vec<(SpecId, SpecId)> {
    let mut dead = Vec::new();
    for b in 0..specs.len() {
        let shadow = specs[..b].iter().filter(|a| a.reachable).find(|a| {
            if specs[b].is_fallback() {
                is_catch_all(a)
            } else {
                !a.is_fallback() && shadows(a, &specs[b], types)
            }
        });
        if let Some(a) = shadow.map(|a| a.id) {
            tracing::debug!(dead = b, by = a.index(), "unreachable specialization");
            specs[b].reachable = false;
            specs[b].shadowed_by = Some(a);
            dead.push((specs[b].id, a));
        }
    }
    dead
}
