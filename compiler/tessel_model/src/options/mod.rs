//! Model construction and runtime limits.

use std::str::FromStr;

/// Limits and policies shared by every node built from one model.
///
/// Defaults can be overridden per process through environment variables
/// (see [`ModelOptions::from_env`]).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModelOptions {
    /// Maximum number of instances in one node's chain before it goes
    /// generic. At least one instance is always allowed; 0 reads as 1.
    pub polymorphic_limit: usize,
    /// Instance limit for cached specializations that declare none.
    pub default_cache_limit: u32,
    /// Report unreachable specializations as errors instead of warnings.
    pub unreachable_is_error: bool,
}

impl Default for ModelOptions {
    fn default() -> Self {
        ModelOptions {
            polymorphic_limit: 8,
            default_cache_limit: 3,
            unreachable_is_error: false,
        }
    }
}

impl ModelOptions {
    pub const POLYMORPHIC_LIMIT_VAR: &'static str = "TESSEL_POLYMORPHIC_LIMIT";
    pub const DEFAULT_CACHE_LIMIT_VAR: &'static str = "TESSEL_DEFAULT_CACHE_LIMIT";
    pub const UNREACHABLE_IS_ERROR_VAR: &'static str = "TESSEL_UNREACHABLE_IS_ERROR";

    /// Clamped to at least 1.
    #[must_use]
    pub fn with_polymorphic_limit(mut self, limit: usize) -> Self {
        self.polymorphic_limit = limit.max(1);
        self
    }

    /// The polymorphic limit as enforced: never below 1.
    #[must_use]
    pub fn effective_polymorphic_limit(&self) -> usize {
        self.polymorphic_limit.max(1)
    }

    #[must_use]
    pub fn with_default_cache_limit(mut self, limit: u32) -> Self {
        self.default_cache_limit = limit;
        self
    }

    #[must_use]
    pub fn with_unreachable_is_error(mut self, yes: bool) -> Self {
        self.unreachable_is_error = yes;
        self
    }

    /// Defaults, overridden by `TESSEL_*` environment variables.
    ///
    /// Malformed values are logged and ignored.
    pub fn from_env() -> Self {
        Self::default().overridden_by(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    #[must_use]
    pub fn overridden_by(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        match parse_var::<usize>(&lookup, Self::POLYMORPHIC_LIMIT_VAR) {
            Some(0) => {
                tracing::warn!(var = Self::POLYMORPHIC_LIMIT_VAR, "ignoring polymorphic limit 0");
            }
            Some(v) => self.polymorphic_limit = v,
            None => {}
        }
        if let Some(v) = parse_var(&lookup, Self::DEFAULT_CACHE_LIMIT_VAR) {
            self.default_cache_limit = v;
        }
        if let Some(raw) = lookup(Self::UNREACHABLE_IS_ERROR_VAR) {
            match raw.trim() {
                "1" | "true" | "yes" => self.unreachable_is_error = true,
                "0" | "false" | "no" | "" => self.unreachable_is_error = false,
                other => {
                    tracing::warn!(
                        var = Self::UNREACHABLE_IS_ERROR_VAR,
                        value = other,
                        "ignoring malformed boolean"
                    );
                }
            }
        }
        self
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var = key, value = %raw, "ignoring malformed limit");
            None
        }
    }
}
