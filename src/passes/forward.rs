use crate::{
    framegraph::{Declaration, ImageState, Node, RunContext},
    passes::{
        AmbientBuffer, HdrFramebuffer, NormalsBuffer, PssmShadowMaps, ShadowMaps, Skybox, ZBuffer,
    },
};

/// Lays down depth so the forward pass shades each pixel once.
pub struct ZPrepass;

impl Node for ZPrepass {
    fn declare(decl: &mut Declaration<'_>) {
        decl.write_in::<ZBuffer>(ImageState::DEPTH_ATTACHMENT_WRITE);
    }

    fn run(&mut self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        let depth = ctx.res::<ZBuffer>()?;
        log::trace!(
            "z-prepass into {:?} ({}x{})",
            depth.0.image,
            depth.0.extent.width,
            depth.0.extent.height
        );
        Ok(())
    }
}

pub struct ForwardPass {
    pub draw_count: u32,
    pub clear_color: [f32; 4],
}

impl Default for ForwardPass {
    fn default() -> Self {
        Self {
            draw_count: 0,
            clear_color: [0.0, 0.584, 0.929, 1.0],
        }
    }
}

impl Node for ForwardPass {
    fn declare(decl: &mut Declaration<'_>) {
        decl.write_in::<HdrFramebuffer>(ImageState::COLOR_ATTACHMENT_WRITE)
            .write_in::<AmbientBuffer>(ImageState::COLOR_ATTACHMENT_WRITE)
            .write_in::<NormalsBuffer>(ImageState::COLOR_ATTACHMENT_WRITE)
            .write_in::<ZBuffer>(ImageState::DEPTH_ATTACHMENT_WRITE)
            .read_in::<PssmShadowMaps>(ImageState::DEPTH_SAMPLED)
            .read_in::<ShadowMaps>(ImageState::DEPTH_SAMPLED)
            .after::<ZPrepass>();
    }

    fn run(&mut self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        let hdr = ctx.res::<HdrFramebuffer>()?.0;
        ctx.res::<AmbientBuffer>()?;
        ctx.res::<NormalsBuffer>()?;
        ctx.res::<ShadowMaps>()?;
        ctx.res::<PssmShadowMaps>()?;

        self.draw_count += 1;
        log::trace!(
            "forward draw #{} into {:?}, clear {:?}",
            self.draw_count,
            hdr.view,
            self.clear_color
        );
        Ok(())
    }
}

/// Fills the background behind the depth already written by the forward pass.
pub struct SkyboxPass;

impl Node for SkyboxPass {
    fn declare(decl: &mut Declaration<'_>) {
        decl.write_in::<HdrFramebuffer>(ImageState::COLOR_ATTACHMENT_WRITE)
            .read::<Skybox>()
            .read_in::<ZBuffer>(ImageState::DEPTH_READ_ONLY);
    }

    fn run(&mut self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        let skybox = *ctx.res::<Skybox>()?;
        let hdr = ctx.res::<HdrFramebuffer>()?.0;
        log::trace!(
            "skybox {:?} at intensity {} into {:?}",
            skybox.cubemap,
            skybox.intensity,
            hdr.view
        );
        Ok(())
    }
}
