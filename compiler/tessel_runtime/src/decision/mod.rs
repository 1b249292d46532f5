//! The immutable decision model shared by every node of one operation.

use std::sync::Arc;

use tessel_cache::CachePlans;
use tessel_model::NodeModel;
use tessel_tree::DecisionTree;

/// A validated model together with its decision tree and cache plans.
///
/// Built once per operation and shared by `Arc` across all of its call
/// sites; nothing here changes after construction.
#[derive(Debug)]
pub struct DecisionModel {
    model: NodeModel,
    tree: DecisionTree,
    plans: CachePlans,
}

impl DecisionModel {
    pub fn new(model: NodeModel) -> Arc<Self> {
        let tree = DecisionTree::build(&model);
        let plans = CachePlans::build(&model);
        tracing::debug!(
            node = model.display_name(),
            leaves = tree.leaves().len(),
            depth = tree.depth(),
            "decision model ready"
        );
        Arc::new(DecisionModel { model, tree, plans })
    }

    pub fn model(&self) -> &NodeModel {
        &self.model
    }

    pub fn tree(&self) -> &DecisionTree {
        &self.tree
    }

    pub fn plans(&self) -> &CachePlans {
        &self.plans
    }
}
