use std::{
    any::TypeId,
    collections::{BTreeMap, HashMap},
};

use anyhow::Context;

use crate::framegraph::{
    BarrierPlan, BoundaryBatch, CommandRecorder, FrameGraphConfig, FrameGraphError,
    ResourceBarrier, Resource,
    barrier::build_barrier_plan,
    collect::collect_active,
    edges::{Edge, ResourceUsers, build_edges, user_index},
    node::{Declaration, ErasedNode, Node, NodeDesc, NodeId, RunContext},
    resource::{ResourceId, Resources, short_type_name},
    schedule::layer_nodes,
    state::log_image_transition,
};

pub(crate) struct NodeSlot {
    pub desc: NodeDesc,
    pub node: Option<Box<dyn ErasedNode>>,
    pub enabled: bool,
}

impl NodeSlot {
    pub fn is_active(&self) -> bool {
        self.enabled && self.node.is_some()
    }
}

/// Result of the last successful rebuild.
#[derive(Clone, Debug, Default)]
pub struct Schedule {
    layers: Vec<Vec<NodeId>>,
    edges: Vec<Edge>,
    barriers: BarrierPlan,
}

impl Schedule {
    pub fn layers(&self) -> &[Vec<NodeId>] {
        &self.layers
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn barriers(&self) -> &BarrierPlan {
        &self.barriers
    }

    pub fn layer_of(&self, id: NodeId) -> Option<usize> {
        self.layers.iter().position(|layer| layer.contains(&id))
    }

    pub fn node_count(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }
}

pub struct FrameGraph {
    config: FrameGraphConfig,
    nodes: Vec<NodeSlot>,
    node_ids: HashMap<TypeId, NodeId>,
    resources: Resources,
    schedule: Schedule,
    dirty: bool,
}

impl Default for FrameGraph {
    fn default() -> Self {
        Self::new(FrameGraphConfig::default())
    }
}

impl FrameGraph {
    pub fn new(config: FrameGraphConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            node_ids: HashMap::default(),
            resources: Resources::default(),
            schedule: Schedule::default(),
            dirty: true,
        }
    }

    pub fn config(&self) -> &FrameGraphConfig {
        &self.config
    }

    /// Stores (or replaces) the instance of `N`. The node stays disabled until
    /// [`FrameGraph::enable`] is called.
    pub fn construct_node<N: Node>(&mut self, node: N) -> NodeId {
        let id = self.register::<N>();
        self.nodes[id.index()].node = Some(Box::new(node));
        self.dirty = true;
        id
    }

    pub fn construct_and_enable_node<N: Node>(&mut self, node: N) -> NodeId {
        let id = self.construct_node(node);
        self.nodes[id.index()].enabled = true;
        id
    }

    pub fn enable<N: Node>(&mut self) -> anyhow::Result<()> {
        self.set_enabled::<N>(true)
    }

    pub fn disable<N: Node>(&mut self) -> anyhow::Result<()> {
        self.set_enabled::<N>(false)
    }

    pub fn is_enabled<N: Node>(&self) -> bool {
        self.node_ids
            .get(&TypeId::of::<N>())
            .is_some_and(|id| self.nodes[id.index()].is_active())
    }

    pub fn get_node<N: Node>(&self) -> anyhow::Result<&N> {
        let node = self
            .node_ids
            .get(&TypeId::of::<N>())
            .and_then(|id| self.nodes[id.index()].node.as_ref())
            .and_then(|node| node.as_any().downcast_ref::<N>());

        match node {
            Some(node) => Ok(node),
            None => anyhow::bail!(FrameGraphError::NotConstructed {
                node: short_type_name::<N>()
            }),
        }
    }

    pub fn get_node_mut<N: Node>(&mut self) -> anyhow::Result<&mut N> {
        let node = match self.node_ids.get(&TypeId::of::<N>()) {
            Some(id) => self.nodes[id.index()].node.as_mut(),
            None => None,
        }
        .and_then(|node| node.as_any_mut().downcast_mut::<N>());

        match node {
            Some(node) => Ok(node),
            None => anyhow::bail!(FrameGraphError::NotConstructed {
                node: short_type_name::<N>()
            }),
        }
    }

    pub fn res<R: Resource>(&self) -> anyhow::Result<&R> {
        self.resources.get::<R>()
    }

    pub fn try_res<R: Resource>(&self) -> Option<&R> {
        self.resources.try_get::<R>()
    }

    pub fn set_res<R: Resource>(&mut self, value: R) {
        self.resources.set(value);
    }

    pub fn clear_resources(&mut self) {
        self.resources.clear();
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn resources_mut(&mut self) -> &mut Resources {
        &mut self.resources
    }

    pub fn is_rebuild_needed(&self) -> bool {
        self.dirty
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    pub fn node_id<N: Node>(&self) -> Option<NodeId> {
        self.node_ids.get(&TypeId::of::<N>()).copied()
    }

    pub fn layer_of<N: Node>(&self) -> Option<usize> {
        self.node_id::<N>()
            .and_then(|id| self.schedule.layer_of(id))
    }

    pub fn node_name(&self, id: NodeId) -> &'static str {
        self.nodes
            .get(id.index())
            .map(|slot| slot.desc.name)
            .unwrap_or("<unregistered>")
    }

    pub fn resource_name(&self, id: ResourceId) -> &'static str {
        self.resources.registry().name(id)
    }

    pub(crate) fn slots(&self) -> &[NodeSlot] {
        &self.nodes
    }

    /// Recomputes layers and, when states are tracked, the barrier plan.
    ///
    /// On failure the previous schedule is kept and the graph stays dirty.
    pub fn rebuild(&mut self) -> anyhow::Result<()> {
        let _span = tracing::debug_span!("framegraph.rebuild").entered();

        let active = collect_active(&self.nodes);
        let users = user_index(&active);
        self.warn_multiple_openers(&users);

        let edges = build_edges(&users);

        let layers = match layer_nodes(active.keys().copied(), &edges) {
            Ok(layers) => layers,
            Err(cycle) => anyhow::bail!(FrameGraphError::CyclicDependency {
                nodes: cycle.remaining.iter().map(|id| self.node_name(*id)).collect(),
            }),
        };

        let barriers = if self.config.track_resource_states {
            build_barrier_plan(
                &layers,
                &active,
                self.resources.registry(),
                self.config.split_policy,
            )?
        } else {
            BarrierPlan::default()
        };

        self.schedule = Schedule {
            layers,
            edges: edges.into_iter().collect(),
            barriers,
        };
        self.dirty = false;

        self.log_schedule();

        #[cfg(feature = "tracing")]
        if let Some(client) = tracy_client::Client::running() {
            client.plot(
                tracy_client::plot_name!("framegraph layers"),
                self.schedule.layers.len() as f64,
            );
            client.plot(
                tracy_client::plot_name!("framegraph barriers"),
                self.schedule.barriers.barrier_count() as f64,
            );
        }

        Ok(())
    }

    /// Replays the schedule: the barrier batch of boundary `i - 1` is
    /// submitted before the nodes of layer `i` run.
    pub fn run(&mut self, recorder: &mut dyn CommandRecorder) -> anyhow::Result<()> {
        let _span = tracing::debug_span!("framegraph.run").entered();

        if self.dirty {
            anyhow::bail!(FrameGraphError::StaleSchedule);
        }

        for (index, layer) in self.schedule.layers.iter().enumerate() {
            if index > 0 {
                if let Some(batch) = self.schedule.barriers.boundary(index - 1) {
                    let barriers = patch_barriers(index - 1, batch, &self.resources)?;
                    if !barriers.is_empty() {
                        recorder
                            .resource_barriers(&barriers)
                            .with_context(|| format!("failed to record barriers before layer {index}"))?;
                    }
                }
            }

            for id in layer {
                let slot = &mut self.nodes[id.index()];
                let name = slot.desc.name;
                let Some(node) = slot.node.as_mut() else {
                    anyhow::bail!(FrameGraphError::NotConstructed { node: name });
                };

                log::trace!("layer {}: running {}", index, name);
                recorder.marker(name);

                let mut ctx = RunContext {
                    resources: &mut self.resources,
                    recorder: &mut *recorder,
                    node: *id,
                    layer: index,
                };
                node.run_erased(&mut ctx)
                    .with_context(|| format!("node {name} failed"))?;
            }
        }

        Ok(())
    }

    fn register<N: Node>(&mut self) -> NodeId {
        if let Some(id) = self.node_ids.get(&TypeId::of::<N>()) {
            return *id;
        }

        let id = NodeId(self.nodes.len() as u32);
        let registry = self.resources.registry_mut();
        let marker = registry.marker_id::<N>();

        let mut decl = Declaration::new(registry, id, short_type_name::<N>(), marker);
        N::declare(&mut decl);
        let desc = decl.finish();

        log::debug!("registered node {} as {}", desc.name, id);

        self.nodes.push(NodeSlot {
            desc,
            node: None,
            enabled: false,
        });
        self.node_ids.insert(TypeId::of::<N>(), id);
        id
    }

    fn set_enabled<N: Node>(&mut self, enabled: bool) -> anyhow::Result<()> {
        let slot = self
            .node_ids
            .get(&TypeId::of::<N>())
            .map(|id| &mut self.nodes[id.index()])
            .filter(|slot| slot.node.is_some());

        match slot {
            Some(slot) => {
                slot.enabled = enabled;
                self.dirty = true;
                Ok(())
            }
            None => anyhow::bail!(FrameGraphError::NotConstructed {
                node: short_type_name::<N>()
            }),
        }
    }

    fn warn_multiple_openers(&self, users: &BTreeMap<ResourceId, ResourceUsers>) {
        for (resource, users) in users {
            if users.openers.len() > 1 {
                let names: Vec<&str> = users.openers.iter().map(|id| self.node_name(*id)).collect();
                log::warn!(
                    "resource {} is opened by {} nodes ({}), their relative order is unspecified",
                    self.resource_name(*resource),
                    names.len(),
                    names.join(", ")
                );
            }
        }
    }

    fn log_schedule(&self) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }

        for (index, layer) in self.schedule.layers.iter().enumerate() {
            let names: Vec<&str> = layer.iter().map(|id| self.node_name(*id)).collect();
            log::debug!("layer {}: {}", index, names.join(", "));

            if let Some(batch) = self.schedule.barriers.boundary(index) {
                for (resource, barrier) in batch.iter() {
                    let name = self.resource_name(resource);
                    log::debug!("  barrier after layer {}: {} {:?}", index, name, barrier.phase);
                    log_image_transition(barrier.before, barrier.after, name);
                }
            }
        }
    }
}

/// Resolves the native handles of a boundary's barriers against the current
/// bindings. Bindings may change after the last rebuild, so this happens
/// every run.
fn patch_barriers(
    boundary: usize,
    batch: &BoundaryBatch,
    resources: &Resources,
) -> anyhow::Result<Vec<ResourceBarrier>> {
    if batch.barriers.len() != batch.resources.len() {
        anyhow::bail!(FrameGraphError::CorruptedBarrierData {
            boundary,
            barriers: batch.barriers.len(),
            resources: batch.resources.len(),
        });
    }

    batch
        .iter()
        .map(|(resource, planned)| {
            let handle =
                resources
                    .native_handle(resource)
                    .ok_or(FrameGraphError::MissingResource {
                        resource: resources.registry().name(resource),
                    })?;

            Ok(ResourceBarrier {
                resource,
                handle,
                before: planned.before,
                after: planned.after,
                phase: planned.phase,
            })
        })
        .collect()
}
