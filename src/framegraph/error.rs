use thiserror::Error;

use crate::framegraph::ImageState;

/// Failures raised by the frame graph.
///
/// All of them are configuration or programming errors. Nothing is retried
/// internally; a failed `rebuild` keeps the previous schedule and leaves the
/// graph dirty.
#[derive(Debug, Error)]
pub enum FrameGraphError {
    #[error("node {node} has not been constructed")]
    NotConstructed { node: &'static str },

    #[error("resource {resource} is not bound")]
    MissingResource { resource: &'static str },

    #[error("cyclic dependency between nodes: {}", nodes.join(", "))]
    CyclicDependency { nodes: Vec<&'static str> },

    #[error(
        "layer {layer} requires incompatible states for {resource}:\n  first:  {first:?}\n  second: {second:?}"
    )]
    IncompatibleLayerState {
        resource: &'static str,
        layer: usize,
        first: ImageState,
        second: ImageState,
    },

    #[error("schedule is stale, rebuild the frame graph before running it")]
    StaleSchedule,

    /// Internal invariant violation in the barrier builder.
    #[error(
        "corrupted barrier data at boundary {boundary}: {barriers} barriers for {resources} resources"
    )]
    CorruptedBarrierData {
        boundary: usize,
        barriers: usize,
        resources: usize,
    },
}
