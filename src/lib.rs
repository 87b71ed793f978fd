//! Frame-graph compiler and scheduler.
//!
//! Nodes declare the resources they open, write, read and close. A rebuild
//! turns those declarations into execution layers and, when resource states
//! are tracked, into a batched (and possibly split) barrier plan that `run`
//! replays through a [`framegraph::CommandRecorder`].

pub mod framegraph;
pub mod passes;
