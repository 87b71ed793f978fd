mod barrier;
mod builder;
mod collect;
mod config;
mod edges;
mod error;
mod graph;
mod node;
mod recorder;
mod resource;
mod schedule;
mod state;

pub use barrier::{BarrierPlan, BoundaryBatch, PlannedBarrier, SplitPhase, Transition};
pub use builder::FrameGraphBuilder;
pub use config::{FrameGraphConfig, SplitPolicy};
pub use edges::Edge;
pub use error::FrameGraphError;
pub use graph::{FrameGraph, Schedule};
pub use node::{Declaration, Node, NodeDesc, NodeId, ResourceUse, RunContext, Usage};
pub use recorder::{
    CommandRecorder, ResourceBarrier, SplitEvents, VkCommandRecorder, buffer_barrier,
    image_barrier,
};
pub use resource::{NativeHandle, Resource, ResourceId, ResourceKind, ResourceRegistry, Resources};
pub use state::{ImageState, log_image_transition};
