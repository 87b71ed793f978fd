use std::collections::HashMap;

use ash::vk;
use rstest::rstest;

use arbor_framegraph::{
    framegraph::{
        CommandRecorder, FrameGraph, FrameGraphConfig, ImageState, NativeHandle, Node,
        ResourceBarrier, Resource, SplitPhase, SplitPolicy,
    },
    passes::{
        self, AmbientBuffer, ForwardPass, HbaoPass, NormalsBuffer, PssmPass, ShadowPass,
        SkyboxPass, SsaoBlurPass, SsaoBuffer, TonemapPass, UiPass, ZPrepass,
    },
};

const EXTENT: vk::Extent2D = vk::Extent2D {
    width: 1280,
    height: 720,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, PartialEq)]
enum Recorded {
    Pass(String),
    Barrier(ResourceBarrier),
}

/// Keeps everything the graph records, in order.
#[derive(Default)]
struct Recording {
    events: Vec<Recorded>,
    batches: usize,
}

impl CommandRecorder for Recording {
    fn resource_barriers(&mut self, barriers: &[ResourceBarrier]) -> anyhow::Result<()> {
        self.batches += 1;
        self.events
            .extend(barriers.iter().copied().map(Recorded::Barrier));
        Ok(())
    }

    fn marker(&mut self, label: &str) {
        self.events.push(Recorded::Pass(label.to_owned()));
    }
}

impl Recording {
    fn passes(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Recorded::Pass(name) => Some(name.as_str()),
                Recorded::Barrier(_) => None,
            })
            .collect()
    }

    fn barriers(&self) -> impl Iterator<Item = &ResourceBarrier> {
        self.events.iter().filter_map(|e| match e {
            Recorded::Barrier(b) => Some(b),
            Recorded::Pass(_) => None,
        })
    }

    /// Every begin half is followed by exactly one end half on the same
    /// handle, with the same states, before the handle is split again.
    fn assert_splits_balanced(&self) {
        let mut open: HashMap<NativeHandle, (ImageState, ImageState)> = HashMap::new();

        for barrier in self.barriers() {
            match barrier.phase {
                SplitPhase::Begin => {
                    let previous = open.insert(barrier.handle, (barrier.before, barrier.after));
                    assert!(previous.is_none(), "{:?} split twice", barrier.handle);
                }
                SplitPhase::End => {
                    let begun = open.remove(&barrier.handle);
                    assert_eq!(begun, Some((barrier.before, barrier.after)));
                }
                SplitPhase::Atomic => {
                    assert!(!open.contains_key(&barrier.handle));
                }
            }
        }

        assert!(open.is_empty(), "unfinished splits: {open:?}");
    }
}

fn full_graph(config: FrameGraphConfig) -> FrameGraph {
    init_logging();
    let mut graph = passes::scenario(config).build().unwrap();
    passes::bind_placeholder_resources(&mut graph, EXTENT);
    graph
}

fn layer<N: Node>(graph: &FrameGraph) -> usize {
    graph.layer_of::<N>().expect("node should be scheduled")
}

fn resource_id<R: Resource>(graph: &FrameGraph) -> arbor_framegraph::framegraph::ResourceId {
    graph
        .resources()
        .registry()
        .lookup::<R>()
        .expect("resource should be registered")
}

#[test]
fn full_frame_is_layered_with_forward_after_the_prepass() {
    let graph = full_graph(FrameGraphConfig::default());

    assert!(layer::<ForwardPass>(&graph) > layer::<ZPrepass>(&graph));

    assert_eq!(layer::<ZPrepass>(&graph), 0);
    assert_eq!(layer::<ShadowPass>(&graph), 0);
    assert_eq!(layer::<PssmPass>(&graph), 0);
    assert_eq!(layer::<ForwardPass>(&graph), 1);
    assert_eq!(layer::<HbaoPass>(&graph), 2);
    assert_eq!(layer::<SkyboxPass>(&graph), 3);
    assert_eq!(layer::<SsaoBlurPass>(&graph), 3);
    assert_eq!(layer::<TonemapPass>(&graph), 4);
    assert_eq!(layer::<UiPass>(&graph), 5);

    let schedule = graph.schedule();
    assert_eq!(schedule.node_count(), 9);
    for edge in schedule.edges() {
        let from = schedule.layer_of(edge.from).unwrap();
        let to = schedule.layer_of(edge.to).unwrap();
        assert!(
            from < to,
            "{} -> {} is not ordered",
            graph.node_name(edge.from),
            graph.node_name(edge.to)
        );
    }
}

#[test]
fn ambient_buffer_transition_is_split_across_the_middle_layers() {
    let graph = full_graph(FrameGraphConfig::default());
    let ambient = resource_id::<AmbientBuffer>(&graph);
    let plan = graph.schedule().barriers();

    let phases: Vec<(usize, SplitPhase)> = plan
        .boundaries()
        .iter()
        .enumerate()
        .flat_map(|(boundary, batch)| {
            batch
                .iter()
                .filter(|(resource, _)| *resource == ambient)
                .map(move |(_, barrier)| (boundary, barrier.phase))
        })
        .collect();

    assert_eq!(phases, vec![(1, SplitPhase::Begin), (3, SplitPhase::End)]);

    let transition = plan
        .transitions()
        .iter()
        .find(|t| t.resource == ambient)
        .unwrap();
    assert_eq!(transition.before, ImageState::COLOR_ATTACHMENT_WRITE);
    assert_eq!(transition.after, ImageState::SHADER_READ_FRAGMENT);
    assert_eq!((transition.source_layer, transition.target_layer), (1, 4));
}

#[test]
fn batching_only_uses_existing_barrier_points() {
    let graph = full_graph(FrameGraphConfig::default());
    let plan = graph.schedule().barriers();

    assert_eq!(plan.transitions().len(), 10);
    assert_eq!(plan.barrier_count(), 11);
    assert_eq!(plan.issue_points(), 5);
    assert_eq!(
        plan.boundaries().iter().map(|b| b.len()).collect::<Vec<_>>(),
        vec![2, 3, 2, 3, 1]
    );
}

#[test]
fn running_the_full_frame_records_passes_in_layer_order() {
    let mut graph = full_graph(FrameGraphConfig::default());
    let mut recording = Recording::default();
    graph.run(&mut recording).unwrap();

    assert_eq!(
        recording.passes(),
        vec![
            "ZPrepass",
            "ShadowPass",
            "PSSMPass",
            "ForwardPass",
            "HBAOPass",
            "SkyboxPass",
            "SSAOBlurPass",
            "TonemapPass",
            "UIPass",
        ]
    );
    assert_eq!(recording.batches, 5);
    assert_eq!(recording.barriers().count(), 11);
    recording.assert_splits_balanced();

    assert_eq!(graph.get_node::<ForwardPass>().unwrap().draw_count, 1);
    assert!(graph.get_node::<TonemapPass>().unwrap().applied_occlusion);
}

#[test]
fn barriers_precede_the_first_pass_that_needs_them() {
    let mut graph = full_graph(FrameGraphConfig::default());
    let mut recording = Recording::default();
    graph.run(&mut recording).unwrap();

    let normals = resource_id::<NormalsBuffer>(&graph);
    let position = |event: &Recorded| recording.events.iter().position(|e| e == event);

    let normals_barrier = recording
        .barriers()
        .find(|b| b.resource == normals)
        .copied()
        .unwrap();
    let barrier_at = position(&Recorded::Barrier(normals_barrier)).unwrap();
    let forward_at = position(&Recorded::Pass("ForwardPass".into())).unwrap();
    let hbao_at = position(&Recorded::Pass("HBAOPass".into())).unwrap();

    assert!(forward_at < barrier_at && barrier_at < hbao_at);
    assert_eq!(normals_barrier.phase, SplitPhase::Atomic);
    assert_eq!(normals_barrier.after, ImageState::SHADER_READ_COMPUTE);
}

#[test]
fn disabling_prepass_and_blur_still_rebuilds_and_runs() {
    let mut graph = full_graph(FrameGraphConfig::default());
    graph.run(&mut Recording::default()).unwrap();

    graph.disable::<ZPrepass>().unwrap();
    graph.disable::<SsaoBlurPass>().unwrap();
    assert!(graph.resources_mut().unset::<SsaoBuffer>());
    assert!(graph.is_rebuild_needed());

    graph.rebuild().unwrap();
    assert_eq!(graph.layer_of::<ZPrepass>(), None);
    assert_eq!(graph.layer_of::<SsaoBlurPass>(), None);
    assert_eq!(layer::<ShadowPass>(&graph), 0);
    assert_eq!(layer::<ForwardPass>(&graph), 1);
    assert_eq!(layer::<SkyboxPass>(&graph), 2);
    assert_eq!(layer::<TonemapPass>(&graph), 3);
    assert_eq!(layer::<HbaoPass>(&graph), 4);
    assert_eq!(layer::<UiPass>(&graph), 4);

    let mut recording = Recording::default();
    graph.run(&mut recording).unwrap();
    recording.assert_splits_balanced();

    assert_eq!(recording.passes().len(), 7);
    assert!(!graph.get_node::<TonemapPass>().unwrap().applied_occlusion);
}

#[test]
fn re_enabling_restores_the_original_schedule() {
    let mut graph = full_graph(FrameGraphConfig::default());
    let layers = graph.schedule().layers().to_vec();
    let barriers = format!("{:?}", graph.schedule().barriers());

    graph.disable::<ZPrepass>().unwrap();
    graph.disable::<SsaoBlurPass>().unwrap();
    graph.rebuild().unwrap();
    graph.enable::<ZPrepass>().unwrap();
    graph.enable::<SsaoBlurPass>().unwrap();
    graph.rebuild().unwrap();

    assert_eq!(graph.schedule().layers(), layers.as_slice());
    assert_eq!(format!("{:?}", graph.schedule().barriers()), barriers);
}

#[rstest]
#[case::never(SplitPolicy::Never, 0)]
#[case::batched(SplitPolicy::Batched, 1)]
#[case::eager(SplitPolicy::Eager, 1)]
fn every_policy_runs_with_balanced_splits(#[case] policy: SplitPolicy, #[case] splits: usize) {
    let mut graph = full_graph(FrameGraphConfig::default().with_split_policy(policy));
    let mut recording = Recording::default();
    graph.run(&mut recording).unwrap();

    recording.assert_splits_balanced();
    let begun = recording
        .barriers()
        .filter(|b| b.phase == SplitPhase::Begin)
        .count();
    assert_eq!(begun, splits);
    assert_eq!(
        graph.schedule().barriers().transitions().len(),
        10,
        "policy must not change what transitions exist"
    );
}

#[test]
fn untracked_graph_records_no_barriers() {
    let mut graph = full_graph(FrameGraphConfig::default().with_state_tracking(false));
    let mut recording = Recording::default();
    graph.run(&mut recording).unwrap();

    assert_eq!(recording.batches, 0);
    assert_eq!(recording.passes().len(), 9);
}

#[test]
fn unbinding_a_transitioned_resource_fails_the_next_run() {
    let mut graph = full_graph(FrameGraphConfig::default());
    graph.resources_mut().unset::<AmbientBuffer>();

    let err = graph.run(&mut Recording::default()).err().unwrap();
    assert!(format!("{err:#}").contains("AmbientBuffer"), "{err:#}");
}
