use std::{any::Any, fmt};

use smallvec::SmallVec;

use crate::framegraph::{
    CommandRecorder, ImageState,
    resource::{Resource, ResourceId, ResourceRegistry, Resources},
};

/// Registration-order index of a node type.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// The four resource categories that define ordering.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Usage {
    Open,
    Write,
    Read,
    Close,
}

impl Usage {
    pub const ALL: [Usage; 4] = [Usage::Open, Usage::Write, Usage::Read, Usage::Close];

    fn index(self) -> usize {
        match self {
            Usage::Open => 0,
            Usage::Write => 1,
            Usage::Read => 2,
            Usage::Close => 3,
        }
    }
}

/// One declared use of a resource, optionally annotated with the state the
/// resource must be in while the node runs.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ResourceUse {
    pub resource: ResourceId,
    pub state: Option<ImageState>,
}

/// Static registration entry of a node type.
#[derive(Clone, Debug)]
pub struct NodeDesc {
    pub id: NodeId,
    pub name: &'static str,
    /// Opened implicitly by this node so others can order themselves after it.
    pub marker: ResourceId,
    uses: [SmallVec<[ResourceUse; 4]>; 4],
}

impl NodeDesc {
    pub fn uses(&self, usage: Usage) -> &[ResourceUse] {
        &self.uses[usage.index()]
    }
}

/// Collects a node type's resource declarations.
pub struct Declaration<'a> {
    registry: &'a mut ResourceRegistry,
    desc: NodeDesc,
}

impl<'a> Declaration<'a> {
    pub(crate) fn new(
        registry: &'a mut ResourceRegistry,
        id: NodeId,
        name: &'static str,
        marker: ResourceId,
    ) -> Self {
        Self {
            registry,
            desc: NodeDesc {
                id,
                name,
                marker,
                uses: Default::default(),
            },
        }
    }

    pub(crate) fn finish(self) -> NodeDesc {
        self.desc
    }

    pub fn name(&mut self, name: &'static str) -> &mut Self {
        self.desc.name = name;
        self
    }

    pub fn open<R: Resource>(&mut self) -> &mut Self {
        self.declare::<R>(Usage::Open, None)
    }

    pub fn open_in<R: Resource>(&mut self, state: ImageState) -> &mut Self {
        self.declare::<R>(Usage::Open, Some(state))
    }

    pub fn write<R: Resource>(&mut self) -> &mut Self {
        self.declare::<R>(Usage::Write, None)
    }

    pub fn write_in<R: Resource>(&mut self, state: ImageState) -> &mut Self {
        self.declare::<R>(Usage::Write, Some(state))
    }

    pub fn read<R: Resource>(&mut self) -> &mut Self {
        self.declare::<R>(Usage::Read, None)
    }

    pub fn read_in<R: Resource>(&mut self, state: ImageState) -> &mut Self {
        self.declare::<R>(Usage::Read, Some(state))
    }

    pub fn close<R: Resource>(&mut self) -> &mut Self {
        self.declare::<R>(Usage::Close, None)
    }

    pub fn close_in<R: Resource>(&mut self, state: ImageState) -> &mut Self {
        self.declare::<R>(Usage::Close, Some(state))
    }

    /// Orders this node after `N` without sharing any data resource.
    pub fn after<N: Node>(&mut self) -> &mut Self {
        let marker = self.registry.marker_id::<N>();
        self.push(Usage::Read, marker, None)
    }

    fn declare<R: Resource>(&mut self, usage: Usage, state: Option<ImageState>) -> &mut Self {
        let resource = self.registry.resource_id::<R>();
        self.push(usage, resource, state)
    }

    fn push(&mut self, usage: Usage, resource: ResourceId, state: Option<ImageState>) -> &mut Self {
        self.desc.uses[usage.index()].push(ResourceUse { resource, state });
        self
    }
}

/// What a node sees while it runs.
pub struct RunContext<'a> {
    pub resources: &'a mut Resources,
    pub recorder: &'a mut dyn CommandRecorder,
    pub node: NodeId,
    pub layer: usize,
}

impl RunContext<'_> {
    pub fn res<R: Resource>(&self) -> anyhow::Result<&R> {
        self.resources.get::<R>()
    }

    pub fn res_mut<R: Resource>(&mut self) -> anyhow::Result<&mut R> {
        self.resources.get_mut::<R>()
    }

    pub fn try_res<R: Resource>(&self) -> Option<&R> {
        self.resources.try_get::<R>()
    }

    pub fn set_res<R: Resource>(&mut self, value: R) {
        self.resources.set(value);
    }
}

/// A unit of GPU work scheduled by the frame graph.
pub trait Node: Any {
    /// Declares the resources this node type opens, writes, reads and closes.
    /// Called once, when the type is first constructed in a graph.
    fn declare(decl: &mut Declaration<'_>)
    where
        Self: Sized;

    fn run(&mut self, ctx: &mut RunContext<'_>) -> anyhow::Result<()>;
}

pub(crate) trait ErasedNode: Any {
    fn run_erased(&mut self, ctx: &mut RunContext<'_>) -> anyhow::Result<()>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<N: Node> ErasedNode for N {
    fn run_erased(&mut self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        Node::run(self, ctx)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
