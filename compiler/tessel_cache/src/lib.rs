//! Cache and assumption management.
//!
//! - [`CachePlan`]: which caches a specialization computes before each
//!   guard and which it defers until the specialization is confirmed.
//! - [`InstanceLimits`] / [`InstanceCounter`]: per-specialization instance
//!   bounds, evaluated once per node.
//! - [`capture_assumptions`] / [`check_assumptions`]: creating and
//!   re-checking the assumption handles an instance depends on.

mod assumptions;
mod counter;
mod limit;
mod plan;

pub use assumptions::{capture_assumptions, check_assumptions, Captured};
pub use counter::{CacheSignal, InstanceCounter};
pub use limit::{InstanceLimits, LimitError};
pub use plan::{compute_caches, CachePlan, CachePlans};
