//! Live instance accounting.

use tessel_model::SpecId;

/// Why an instance cannot be created or kept.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CacheSignal {
    #[error("instance limit {limit} of {spec:?} exceeded")]
    LimitExceeded { spec: SpecId, limit: u32 },
    #[error("assumption `{assumption}` of {spec:?} invalidated")]
    AssumptionInvalidated { spec: SpecId, assumption: String },
}

/// Live and lifetime instance counts per specialization of one node.
#[derive(Clone, Debug, Default)]
pub struct InstanceCounter {
    live: Vec<u32>,
    created: Vec<u32>,
}

impl InstanceCounter {
    pub fn new(specializations: usize) -> Self {
        InstanceCounter {
            live: vec![0; specializations],
            created: vec![0; specializations],
        }
    }

    /// Account for a new instance, unless `limit` live instances exist.
    pub fn reserve(&mut self, spec: SpecId, limit: Option<u32>) -> Result<(), CacheSignal> {
        let i = spec.index();
        if i >= self.live.len() {
            self.live.resize(i + 1, 0);
            self.created.resize(i + 1, 0);
        }
        if let Some(limit) = limit {
            if self.live[i] >= limit {
                return Err(CacheSignal::LimitExceeded { spec, limit });
            }
        }
        self.live[i] += 1;
        self.created[i] += 1;
        Ok(())
    }

    /// An instance left the chain.
    pub fn release(&mut self, spec: SpecId) {
        if let Some(live) = self.live.get_mut(spec.index()) {
            *live = live.saturating_sub(1);
        }
    }

    /// Drop every live instance of `spec`.
    pub fn release_all(&mut self, spec: SpecId) {
        if let Some(live) = self.live.get_mut(spec.index()) {
            *live = 0;
        }
    }

    pub fn live(&self, spec: SpecId) -> u32 {
        self.live.get(spec.index()).copied().unwrap_or(0)
    }

    /// Instances ever created, including removed ones.
    pub fn created(&self, spec: SpecId) -> u32 {
        self.created.get(spec.index()).copied().unwrap_or(0)
    }

    pub fn total_live(&self) -> u32 {
        self.live.iter().sum()
    }
}
