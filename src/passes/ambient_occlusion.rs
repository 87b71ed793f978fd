use crate::{
    framegraph::{Declaration, ImageState, Node, RunContext},
    passes::{HbaoBuffer, NormalsBuffer, SsaoBuffer, ZBuffer},
};

/// Horizon-based ambient occlusion from depth and normals (compute).
pub struct HbaoPass {
    pub radius: f32,
    pub directions: u32,
}

impl Default for HbaoPass {
    fn default() -> Self {
        Self {
            radius: 0.5,
            directions: 8,
        }
    }
}

impl Node for HbaoPass {
    fn declare(decl: &mut Declaration<'_>) {
        decl.name("HBAOPass")
            .read_in::<ZBuffer>(ImageState::DEPTH_SAMPLED)
            .read_in::<NormalsBuffer>(ImageState::SHADER_READ_COMPUTE)
            .write_in::<HbaoBuffer>(ImageState::STORAGE_WRITE_COMPUTE);
    }

    fn run(&mut self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        let target = ctx.res::<HbaoBuffer>()?.0;
        ctx.res::<ZBuffer>()?;
        ctx.res::<NormalsBuffer>()?;

        let groups = (target.extent.width.div_ceil(8), target.extent.height.div_ceil(8));
        log::trace!(
            "hbao r={} dirs={} dispatch {:?}",
            self.radius,
            self.directions,
            groups
        );
        Ok(())
    }
}

/// Depth-aware blur of the raw occlusion term.
pub struct SsaoBlurPass;

impl Node for SsaoBlurPass {
    fn declare(decl: &mut Declaration<'_>) {
        decl.name("SSAOBlurPass")
            .read_in::<HbaoBuffer>(ImageState::SHADER_READ_COMPUTE)
            .write_in::<SsaoBuffer>(ImageState::STORAGE_WRITE_COMPUTE);
    }

    fn run(&mut self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        let source = ctx.res::<HbaoBuffer>()?.0;
        let target = ctx.res::<SsaoBuffer>()?.0;
        log::trace!("ssao blur {:?} -> {:?}", source.view, target.view);
        Ok(())
    }
}
