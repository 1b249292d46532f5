//! Instance limits.

use tessel_model::{Env, EvalError, NodeModel, SpecId};
use tessel_types::Value;

/// A limit expression did not produce a usable bound.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum LimitError {
    #[error("limit of {spec:?} failed to evaluate: {error}")]
    Eval {
        spec: SpecId,
        #[source]
        error: EvalError,
    },
    #[error("limit of {spec:?} must be a non-negative integer, found {value:?}")]
    Invalid { spec: SpecId, value: Value },
}

/// Evaluated instance limit of every specialization of one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstanceLimits {
    limits: Vec<Option<u32>>,
}

impl InstanceLimits {
    /// Evaluate every limit expression once, with nothing bound.
    ///
    /// Specializations without caches are unbounded: at most one instance
    /// of them ever exists. Cached specializations without a limit
    /// expression get the model's default.
    pub fn evaluate(model: &NodeModel) -> Result<InstanceLimits, LimitError> {
        let env = Env::new();
        let default = model.options().default_cache_limit;
        let limits = model
            .specializations()
            .iter()
            .map(|spec| {
                if !spec.has_caches() {
                    return Ok(None);
                }
                let Some(expr) = &spec.limit else {
                    return Ok(Some(default));
                };
                let value = expr
                    .eval(&env, model.functions())
                    .map_err(|error| LimitError::Eval {
                        spec: spec.id,
                        error,
                    })?;
                value
                    .as_i64()
                    .and_then(|n| u32::try_from(n).ok())
                    .map(Some)
                    .ok_or(LimitError::Invalid {
                        spec: spec.id,
                        value,
                    })
            })
            .collect::<Result<_, _>>()?;
        Ok(InstanceLimits { limits })
    }

    /// `None` means unbounded.
    pub fn get(&self, spec: SpecId) -> Option<u32> {
        self.limits.get(spec.index()).copied().flatten()
    }
}
