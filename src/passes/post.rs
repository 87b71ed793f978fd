use crate::{
    framegraph::{Declaration, ImageState, Node, RunContext},
    passes::{AmbientBuffer, HdrFramebuffer, SdrFramebuffer, SsaoBuffer},
};

/// Resolves HDR lighting and ambient terms into the displayable framebuffer.
pub struct TonemapPass {
    pub exposure: f32,
    /// Whether the last run had an occlusion term to apply.
    pub applied_occlusion: bool,
}

impl Default for TonemapPass {
    fn default() -> Self {
        Self {
            exposure: 1.0,
            applied_occlusion: false,
        }
    }
}

impl Node for TonemapPass {
    fn declare(decl: &mut Declaration<'_>) {
        decl.read_in::<HdrFramebuffer>(ImageState::SHADER_READ_FRAGMENT)
            .read_in::<AmbientBuffer>(ImageState::SHADER_READ_FRAGMENT)
            .read_in::<SsaoBuffer>(ImageState::SHADER_READ_FRAGMENT)
            .open_in::<SdrFramebuffer>(ImageState::COLOR_ATTACHMENT_WRITE);
    }

    fn run(&mut self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        let hdr = ctx.res::<HdrFramebuffer>()?.0;
        ctx.res::<AmbientBuffer>()?;
        ctx.res::<SdrFramebuffer>()?;

        // Occlusion is optional: its passes may be disabled.
        let ssao = ctx.try_res::<SsaoBuffer>().map(|ssao| ssao.0.view);
        self.applied_occlusion = ssao.is_some();

        log::trace!(
            "tonemap {:?} at exposure {}, occlusion {:?}",
            hdr.view,
            self.exposure,
            ssao
        );
        Ok(())
    }
}

pub struct UiPass {
    pub widgets: u32,
}

impl Default for UiPass {
    fn default() -> Self {
        Self { widgets: 3 }
    }
}

impl Node for UiPass {
    fn declare(decl: &mut Declaration<'_>) {
        decl.name("UIPass")
            .close_in::<SdrFramebuffer>(ImageState::COLOR_ATTACHMENT_READ_WRITE);
    }

    fn run(&mut self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        let sdr = ctx.res::<SdrFramebuffer>()?.0;
        log::trace!("{} widgets over {:?}", self.widgets, sdr.view);
        Ok(())
    }
}
