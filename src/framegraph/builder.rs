use anyhow::Context;

use crate::framegraph::{FrameGraph, FrameGraphConfig, Node, Resource};

/// Chained construction of a graph whose first schedule is built up front.
pub struct FrameGraphBuilder {
    graph: FrameGraph,
}

impl Default for FrameGraphBuilder {
    fn default() -> Self {
        Self::new(FrameGraphConfig::default())
    }
}

impl FrameGraphBuilder {
    pub fn new(config: FrameGraphConfig) -> Self {
        Self {
            graph: FrameGraph::new(config),
        }
    }

    pub fn add_node<N: Node>(mut self, node: N) -> Self {
        self.graph.construct_and_enable_node(node);
        self
    }

    /// Registers `N` without enabling it, so it can be toggled on later.
    pub fn add_disabled_node<N: Node>(mut self, node: N) -> Self {
        self.graph.construct_node(node);
        self
    }

    pub fn with_resource<R: Resource>(mut self, value: R) -> Self {
        self.graph.set_res(value);
        self
    }

    pub fn build(self) -> anyhow::Result<FrameGraph> {
        let mut graph = self.graph;
        graph
            .rebuild()
            .context("FrameGraphBuilder failed to build schedule")?;
        Ok(graph)
    }
}
