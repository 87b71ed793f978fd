use std::collections::BTreeMap;

use crate::framegraph::{
    FrameGraphError, ImageState, SplitPolicy,
    collect::ActiveNode,
    node::NodeId,
    resource::{ResourceId, ResourceRegistry},
};

/// Which half of a (possibly split) transition a barrier carries.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum SplitPhase {
    Atomic,
    Begin,
    End,
}

/// One required state change of a resource between two layers.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Transition {
    pub resource: ResourceId,
    pub before: ImageState,
    pub after: ImageState,
    /// Last layer that uses `before`.
    pub source_layer: usize,
    /// First layer that needs `after`.
    pub target_layer: usize,
}

impl Transition {
    /// Boundary right before the target layer; boundary `b` sits between
    /// layers `b` and `b + 1`.
    pub fn completion_boundary(&self) -> usize {
        self.target_layer - 1
    }

    pub fn is_splittable(&self) -> bool {
        self.target_layer - self.source_layer >= 2
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct PlannedBarrier {
    pub before: ImageState,
    pub after: ImageState,
    pub phase: SplitPhase,
}

/// Barriers submitted at one layer boundary. `resources[i]` is the resource
/// `barriers[i]` is recorded against; native handles are resolved at run time.
#[derive(Clone, Debug, Default)]
pub struct BoundaryBatch {
    pub(crate) barriers: Vec<PlannedBarrier>,
    pub(crate) resources: Vec<ResourceId>,
}

impl BoundaryBatch {
    fn push(&mut self, transition: &Transition, phase: SplitPhase) {
        self.barriers.push(PlannedBarrier {
            before: transition.before,
            after: transition.after,
            phase,
        });
        self.resources.push(transition.resource);
    }

    pub fn len(&self) -> usize {
        self.barriers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.barriers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, &PlannedBarrier)> {
        self.resources.iter().copied().zip(self.barriers.iter())
    }
}

#[derive(Clone, Debug, Default)]
pub struct BarrierPlan {
    transitions: Vec<Transition>,
    boundaries: Vec<BoundaryBatch>,
}

impl BarrierPlan {
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn boundaries(&self) -> &[BoundaryBatch] {
        &self.boundaries
    }

    pub fn boundary(&self, index: usize) -> Option<&BoundaryBatch> {
        self.boundaries.get(index)
    }

    pub fn barrier_count(&self) -> usize {
        self.boundaries.iter().map(BoundaryBatch::len).sum()
    }

    /// Boundaries that carry at least one barrier.
    pub fn issue_points(&self) -> usize {
        self.boundaries.iter().filter(|b| !b.is_empty()).count()
    }
}

/// Builds the barrier plan for a layered schedule.
pub(crate) fn build_barrier_plan(
    layers: &[Vec<NodeId>],
    active: &BTreeMap<NodeId, ActiveNode>,
    registry: &ResourceRegistry,
    policy: SplitPolicy,
) -> anyhow::Result<BarrierPlan> {
    let states = layer_states(layers, active, registry)?;
    let transitions = collect_transitions(&states);
    Ok(plan_barriers(layers.len(), transitions, policy))
}

type LayerStates = BTreeMap<ResourceId, ImageState>;

/// Merges the states every node of a layer requires.
fn layer_states(
    layers: &[Vec<NodeId>],
    active: &BTreeMap<NodeId, ActiveNode>,
    registry: &ResourceRegistry,
) -> anyhow::Result<Vec<LayerStates>> {
    let mut result = Vec::with_capacity(layers.len());

    for (layer_index, layer) in layers.iter().enumerate() {
        let mut states = LayerStates::new();

        for node in layer.iter().filter_map(|id| active.get(id)) {
            for &(resource, state) in &node.states {
                let merged = match states.get(&resource) {
                    None => state,
                    Some(&existing) => match existing.merge(state) {
                        Some(merged) => merged,
                        None => anyhow::bail!(FrameGraphError::IncompatibleLayerState {
                            resource: registry.name(resource),
                            layer: layer_index,
                            first: existing,
                            second: state,
                        }),
                    },
                };
                states.insert(resource, merged);
            }
        }

        result.push(states);
    }

    Ok(result)
}

/// Walks every resource through the layers and emits a transition wherever
/// its required state changes. Repeated states collapse into one run.
fn collect_transitions(layer_states: &[LayerStates]) -> Vec<Transition> {
    let mut current: BTreeMap<ResourceId, (ImageState, usize)> = BTreeMap::new();
    let mut transitions = Vec::new();

    for (layer, states) in layer_states.iter().enumerate() {
        for (&resource, &state) in states {
            match current.get_mut(&resource) {
                Some((previous, last_layer)) if *previous == state => *last_layer = layer,
                Some((previous, last_layer)) => {
                    transitions.push(Transition {
                        resource,
                        before: *previous,
                        after: state,
                        source_layer: *last_layer,
                        target_layer: layer,
                    });
                    *previous = state;
                    *last_layer = layer;
                }
                None => {
                    current.insert(resource, (state, layer));
                }
            }
        }
    }

    transitions.sort_by_key(|t| (t.completion_boundary(), t.resource));
    transitions
}

fn plan_barriers(
    layer_count: usize,
    transitions: Vec<Transition>,
    policy: SplitPolicy,
) -> BarrierPlan {
    let mut boundaries = vec![BoundaryBatch::default(); layer_count.saturating_sub(1)];

    match policy {
        SplitPolicy::Never => {
            for t in &transitions {
                boundaries[t.completion_boundary()].push(t, SplitPhase::Atomic);
            }
        }
        SplitPolicy::Eager => {
            for t in &transitions {
                if t.is_splittable() {
                    boundaries[t.source_layer].push(t, SplitPhase::Begin);
                    boundaries[t.completion_boundary()].push(t, SplitPhase::End);
                } else {
                    boundaries[t.completion_boundary()].push(t, SplitPhase::Atomic);
                }
            }
        }
        SplitPolicy::Batched => batch_greedily(&transitions, &mut boundaries),
    }

    BarrierPlan {
        transitions,
        boundaries,
    }
}

/// Repeatedly takes the earliest completion boundary among pending
/// transitions. Everything due there is finished at that boundary; anything
/// due later whose source layer has already run gets its begin half issued
/// there too, so long transitions overlap with the layers in between without
/// adding new barrier points.
fn batch_greedily(transitions: &[Transition], boundaries: &mut [BoundaryBatch]) {
    let mut pending: Vec<(&Transition, bool)> = transitions.iter().map(|t| (t, false)).collect();

    while let Some(boundary) = pending.iter().map(|(t, _)| t.completion_boundary()).min() {
        let batch = &mut boundaries[boundary];

        pending.retain_mut(|(t, begun)| {
            if t.completion_boundary() == boundary {
                let phase = if *begun {
                    SplitPhase::End
                } else {
                    SplitPhase::Atomic
                };
                batch.push(t, phase);
                return false;
            }

            if !*begun && t.source_layer <= boundary {
                batch.push(t, SplitPhase::Begin);
                *begun = true;
            }
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const A: ImageState = ImageState::COLOR_ATTACHMENT_WRITE;
    const B: ImageState = ImageState::SHADER_READ_FRAGMENT;
    const C: ImageState = ImageState::TRANSFER_SRC;

    fn states_for(resource: ResourceId, sequence: &[Option<ImageState>]) -> Vec<LayerStates> {
        sequence
            .iter()
            .map(|state| {
                let mut layer = LayerStates::new();
                if let Some(state) = state {
                    layer.insert(resource, *state);
                }
                layer
            })
            .collect()
    }

    /// Pairs begin and end halves back into (resource, before, after) triples.
    fn reassemble(plan: &BarrierPlan) -> Vec<(ResourceId, ImageState, ImageState)> {
        let mut open: Vec<(ResourceId, ImageState, ImageState)> = Vec::new();
        let mut complete = Vec::new();

        for batch in plan.boundaries() {
            for (resource, barrier) in batch.iter() {
                let triple = (resource, barrier.before, barrier.after);
                match barrier.phase {
                    SplitPhase::Atomic => complete.push(triple),
                    SplitPhase::Begin => open.push(triple),
                    SplitPhase::End => {
                        let index = open
                            .iter()
                            .position(|begun| *begun == triple)
                            .expect("end without matching begin");
                        complete.push(open.remove(index));
                    }
                }
            }
        }

        assert!(open.is_empty(), "begin without matching end");
        complete
    }

    #[test]
    fn repeated_states_collapse_into_one_transition_per_change() {
        let r = ResourceId(0);
        let states = states_for(r, &[Some(A), Some(A), Some(B), Some(B), Some(C)]);
        let transitions = collect_transitions(&states);

        assert_eq!(
            transitions,
            vec![
                Transition {
                    resource: r,
                    before: A,
                    after: B,
                    source_layer: 1,
                    target_layer: 2,
                },
                Transition {
                    resource: r,
                    before: B,
                    after: C,
                    source_layer: 3,
                    target_layer: 4,
                },
            ]
        );

        let plan = plan_barriers(5, transitions, SplitPolicy::Batched);
        assert_eq!(plan.barrier_count(), 2);
        assert_eq!(plan.boundaries()[1].barriers[0].phase, SplitPhase::Atomic);
        assert_eq!(plan.boundaries()[3].barriers[0].phase, SplitPhase::Atomic);
        assert!(plan.boundaries()[0].is_empty());
        assert!(plan.boundaries()[2].is_empty());
    }

    #[test]
    fn layers_without_the_resource_do_not_break_its_run() {
        let r = ResourceId(0);
        let states = states_for(r, &[Some(A), None, Some(A), None, Some(B)]);
        let transitions = collect_transitions(&states);

        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].source_layer, 2);
        assert_eq!(transitions[0].target_layer, 4);
    }

    #[test]
    fn lone_long_transition_is_not_split_when_batching() {
        let r = ResourceId(0);
        let transitions = collect_transitions(&states_for(r, &[Some(A), None, None, Some(B)]));
        let plan = plan_barriers(4, transitions, SplitPolicy::Batched);

        assert_eq!(plan.issue_points(), 1);
        assert_eq!(plan.boundaries()[2].barriers[0].phase, SplitPhase::Atomic);
    }

    #[test]
    fn long_transition_begins_at_an_existing_earlier_batch() {
        let short = ResourceId(0);
        let long = ResourceId(1);

        let mut states = states_for(short, &[Some(A), Some(B), None, None]);
        states[0].insert(long, A);
        states[3].insert(long, B);

        let plan = plan_barriers(4, collect_transitions(&states), SplitPolicy::Batched);

        let first: Vec<_> = plan.boundaries()[0].iter().collect();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].0, short);
        assert_eq!(first[0].1.phase, SplitPhase::Atomic);
        assert_eq!(first[1].0, long);
        assert_eq!(first[1].1.phase, SplitPhase::Begin);

        assert!(plan.boundaries()[1].is_empty());

        let last: Vec<_> = plan.boundaries()[2].iter().collect();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].0, long);
        assert_eq!(last[0].1.phase, SplitPhase::End);
        assert_eq!(plan.issue_points(), 2);
    }

    #[test]
    fn begin_waits_for_the_source_layer() {
        let early = ResourceId(0);
        let late = ResourceId(1);

        // `early` changes between layers 0 and 1, `late` is used in layer 2
        // and needed in another state in layer 4.
        let mut states = states_for(early, &[Some(A), Some(B), None, None, None]);
        states[2].insert(late, A);
        states[4].insert(late, B);

        let plan = plan_barriers(5, collect_transitions(&states), SplitPolicy::Batched);

        assert_eq!(plan.boundaries()[0].len(), 1);
        assert_eq!(plan.boundaries()[0].resources, vec![early]);
        assert_eq!(plan.boundaries()[3].barriers[0].phase, SplitPhase::Atomic);
    }

    #[test]
    fn eager_policy_splits_every_long_transition() {
        let r = ResourceId(0);
        let transitions = collect_transitions(&states_for(r, &[Some(A), None, None, Some(B)]));
        let plan = plan_barriers(4, transitions, SplitPolicy::Eager);

        assert_eq!(plan.boundaries()[0].barriers[0].phase, SplitPhase::Begin);
        assert!(plan.boundaries()[1].is_empty());
        assert_eq!(plan.boundaries()[2].barriers[0].phase, SplitPhase::End);
    }

    #[test]
    fn never_policy_keeps_every_barrier_atomic() {
        let short = ResourceId(0);
        let long = ResourceId(1);
        let mut states = states_for(short, &[Some(A), Some(B), None, None]);
        states[0].insert(long, A);
        states[3].insert(long, C);

        let plan = plan_barriers(4, collect_transitions(&states), SplitPolicy::Never);
        assert!(
            plan.boundaries()
                .iter()
                .flat_map(|b| b.barriers.iter())
                .all(|b| b.phase == SplitPhase::Atomic)
        );
        assert_eq!(plan.boundaries()[2].resources, vec![long]);
    }

    #[rstest]
    #[case::never(SplitPolicy::Never)]
    #[case::batched(SplitPolicy::Batched)]
    #[case::eager(SplitPolicy::Eager)]
    fn split_halves_reassemble_into_the_same_transitions(#[case] policy: SplitPolicy) {
        let r0 = ResourceId(0);
        let r1 = ResourceId(1);
        let r2 = ResourceId(2);

        let mut states = states_for(r0, &[Some(A), Some(B), Some(B), Some(C), Some(C), Some(A)]);
        states[0].insert(r1, C);
        states[4].insert(r1, A);
        states[1].insert(r2, B);
        states[5].insert(r2, A);

        let transitions = collect_transitions(&states);
        let plan = plan_barriers(states.len(), transitions.clone(), policy);

        let mut expected: Vec<_> = transitions
            .iter()
            .map(|t| (t.resource, t.before, t.after))
            .collect();
        let mut actual = reassemble(&plan);
        expected.sort_by_key(|(r, _, _)| *r);
        actual.sort_by_key(|(r, _, _)| *r);

        assert_eq!(actual.len(), expected.len());
        for triple in &expected {
            assert!(actual.contains(triple));
        }
    }

    #[test]
    fn every_transition_completes_exactly_at_its_boundary() {
        let r0 = ResourceId(0);
        let r1 = ResourceId(1);
        let mut states = states_for(r0, &[Some(A), Some(B), None, Some(C)]);
        states[0].insert(r1, B);
        states[3].insert(r1, A);

        let transitions = collect_transitions(&states);
        let plan = plan_barriers(4, transitions.clone(), SplitPolicy::Batched);

        for t in &transitions {
            let batch = &plan.boundaries()[t.completion_boundary()];
            assert!(batch.iter().any(|(resource, barrier)| {
                resource == t.resource
                    && barrier.after == t.after
                    && barrier.phase != SplitPhase::Begin
            }));
        }
    }
}
