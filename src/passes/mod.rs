//! Demo render passes: a forward renderer with shadows, ambient occlusion,
//! tonemapping and a UI overlay. They only record through the
//! [`CommandRecorder`](crate::framegraph::CommandRecorder) markers and logs,
//! but their declarations are what a real renderer would use.

mod ambient_occlusion;
mod forward;
mod post;
mod resources;
mod shadow;

pub use ambient_occlusion::{HbaoPass, SsaoBlurPass};
pub use forward::{ForwardPass, SkyboxPass, ZPrepass};
pub use post::{TonemapPass, UiPass};
pub use resources::{
    AmbientBuffer, GpuImage, HbaoBuffer, HdrFramebuffer, NormalsBuffer, PssmShadowMaps,
    SdrFramebuffer, ShadowMaps, Skybox, SsaoBuffer, ZBuffer, bind_placeholder_resources,
};
pub use shadow::{PssmPass, ShadowPass};

use crate::framegraph::{FrameGraphBuilder, FrameGraphConfig};

/// The full nine-pass frame with every pass enabled.
pub fn scenario(config: FrameGraphConfig) -> FrameGraphBuilder {
    FrameGraphBuilder::new(config)
        .add_node(ZPrepass)
        .add_node(ShadowPass::default())
        .add_node(PssmPass::default())
        .add_node(ForwardPass::default())
        .add_node(SkyboxPass)
        .add_node(HbaoPass::default())
        .add_node(SsaoBlurPass)
        .add_node(TonemapPass::default())
        .add_node(UiPass::default())
}
