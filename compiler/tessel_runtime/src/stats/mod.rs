//! Per-node execution counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by every call; relaxed, for diagnostics only.
#[derive(Debug, Default)]
pub(crate) struct NodeStats {
    hits: AtomicU64,
    rewrites: AtomicU64,
    generic_dispatches: AtomicU64,
}

impl NodeStats {
    pub fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn rewrite(&self) {
        self.rewrites.fetch_add(1, Ordering::Relaxed);
    }

    pub fn generic_dispatch(&self) {
        self.generic_dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            rewrites: self.rewrites.load(Ordering::Relaxed),
            generic_dispatches: self.generic_dispatches.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of a node's counters.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Calls answered by a committed instance without taking the rewrite
    /// lock.
    pub hits: u64,
    /// Chain changes published: commits, removals, exclusions and the
    /// Generic transition.
    pub rewrites: u64,
    /// Calls answered in the Generic state.
    pub generic_dispatches: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts() {
        let stats = NodeStats::default();
        stats.hit();
        stats.hit();
        stats.rewrite();
        stats.generic_dispatch();
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                hits: 2,
                rewrites: 1,
                generic_dispatches: 1,
            }
        );
    }
}
