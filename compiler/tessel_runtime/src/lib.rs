//! Adaptive execution for Tessel.
//!
//! A [`DecisionModel`] bundles a validated node model with its decision
//! tree and cache plans. Each call site owns an [`AdaptiveNode`] over a
//! shared decision model; the node learns which specializations its
//! arguments need and moves through
//! Uninitialized → Monomorphic → Polymorphic → Generic.
//!
//! # Rewrite Protocol
//!
//! - **specialize**: walk the tree, first match wins.
//! - **merge**: commit an instance, keeping declaration then discovery
//!   order and evicting everything the new specialization contains.
//! - **create next**: on a miss, walk again skipping excluded
//!   specializations and cache-free ones already committed.
//! - **remove**: evict an instance after an assumption failed or a rewrite
//!   exception was raised, then look again.
//!
//! Guard misses and assumption failures are handled internally; callers see
//! only [`ExecError`].

mod attempt;
mod decision;
mod emit;
mod error;
mod instance;
mod node;
mod stats;

#[cfg(test)]
mod test_helpers;

use std::sync::Once;

pub use decision::DecisionModel;
pub use emit::{Emitter, TreeDump};
pub use error::{ExecError, UnsupportedReason, UnsupportedSpecialization};
pub use instance::Instance;
pub use node::{AdaptiveNode, NodeState};
pub use stats::StatsSnapshot;

static TRACING_INIT: Once = Once::new();

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG` for filtering (e.g. `RUST_LOG=tessel_runtime=debug`).
/// Safe to call multiple times; only the first call installs anything, and
/// only when `RUST_LOG` is set.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
