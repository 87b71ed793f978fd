use anyhow::Context;
use ash::vk;

use arbor_framegraph::{
    framegraph::{CommandRecorder, FrameGraph, FrameGraphConfig, ResourceBarrier, SplitPhase},
    passes::{self, SsaoBlurPass, SsaoBuffer, TonemapPass, ZPrepass},
};

const FRAMES_PER_CONFIGURATION: u32 = 3;

/// Logs what a device recorder would record.
#[derive(Default)]
struct LogRecorder {
    barriers: usize,
    splits: usize,
}

impl CommandRecorder for LogRecorder {
    fn resource_barriers(&mut self, barriers: &[ResourceBarrier]) -> anyhow::Result<()> {
        for barrier in barriers {
            log::debug!(
                "barrier {:?} {} on {:?}: {} -> {}",
                barrier.phase,
                barrier.resource,
                barrier.handle,
                barrier.before,
                barrier.after
            );
            if barrier.phase == SplitPhase::Begin {
                self.splits += 1;
            }
        }
        self.barriers += barriers.len();
        Ok(())
    }

    fn marker(&mut self, label: &str) {
        log::debug!("pass {}", label);
    }
}

fn run_frames(graph: &mut FrameGraph, frames: u32) -> anyhow::Result<()> {
    for frame in 0..frames {
        let mut recorder = LogRecorder::default();
        graph
            .run(&mut recorder)
            .with_context(|| format!("frame {frame} failed"))?;

        log::info!(
            "frame {}: {} layers, {} barriers ({} split)",
            frame,
            graph.schedule().layers().len(),
            recorder.barriers,
            recorder.splits
        );

        #[cfg(feature = "tracing")]
        tracy_client::frame_mark();
    }
    Ok(())
}

fn run_demo() -> anyhow::Result<()> {
    let extent = vk::Extent2D {
        width: 1920,
        height: 1080,
    };

    let mut graph = passes::scenario(FrameGraphConfig::default())
        .build()
        .context("failed to build the demo frame graph")?;
    passes::bind_placeholder_resources(&mut graph, extent);

    run_frames(&mut graph, FRAMES_PER_CONFIGURATION)?;

    log::info!("disabling ZPrepass and SSAOBlurPass");
    graph.disable::<ZPrepass>()?;
    graph.disable::<SsaoBlurPass>()?;
    graph.resources_mut().unset::<SsaoBuffer>();
    graph.get_node_mut::<TonemapPass>()?.exposure = 1.4;

    if graph.is_rebuild_needed() {
        graph.rebuild().context("failed to rebuild after toggling passes")?;
    }

    run_frames(&mut graph, FRAMES_PER_CONFIGURATION)?;

    let tonemap = graph.get_node::<TonemapPass>()?;
    log::info!(
        "tonemap exposure {}, occlusion applied: {}",
        tonemap.exposure,
        tonemap.applied_occlusion
    );

    Ok(())
}

fn main() -> anyhow::Result<()> {
    log4rs::init_file("log4rs.yml", Default::default())
        .context("failed to load logging config file")?;

    #[cfg(feature = "tracing")]
    let _client = {
        use tracing_subscriber::layer::SubscriberExt;

        let client = tracy_client::Client::start();
        let subscriber =
            tracing_subscriber::registry().with(tracing_tracy::TracyLayer::default());
        tracing::subscriber::set_global_default(subscriber)
            .context("failed to install tracing subscriber")?;
        client
    };

    if let Err(e) = run_demo() {
        log::error!("{:?}", e);
    }

    Ok(())
}
