//! Assumption capture and checks.

use smallvec::SmallVec;
use tessel_model::{Env, EvalError, FunctionTable, SpecId, Specialization};
use tessel_types::{Assumption, Value};

use crate::CacheSignal;

/// Assumption handles held by one instance, in declaration order.
pub type Captured = SmallVec<[Assumption; 2]>;

/// Evaluate a specialization's assumption expressions.
///
/// `Ok(None)` if any assumption is already invalid: the specialization
/// does not apply.
pub fn capture_assumptions(
    spec: &Specialization,
    env: &Env,
    functions: &FunctionTable,
) -> Result<Option<Captured>, EvalError> {
    let mut captured = Captured::new();
    for expr in &spec.assumptions {
        let value = expr.expr.eval(env, functions)?;
        let Value::Assumption(assumption) = value else {
            return Err(EvalError::TypeMismatch {
                op: "assumption",
                expected: "assumption",
                found: value.kind_name(),
            });
        };
        if !assumption.is_valid() {
            tracing::trace!(
                assumption = assumption.name(),
                "assumption already invalid at capture"
            );
            return Ok(None);
        }
        captured.push(assumption);
    }
    Ok(Some(captured))
}

/// Re-check captured assumptions; the first invalid one signals.
#[inline]
pub fn check_assumptions(spec: SpecId, captured: &[Assumption]) -> Result<(), CacheSignal> {
    match captured.iter().find(|a| !a.is_valid()) {
        None => Ok(()),
        Some(invalid) => Err(CacheSignal::AssumptionInvalidated {
            spec,
            assumption: invalid.name().to_owned(),
        }),
    }
}
