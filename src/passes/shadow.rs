use crate::{
    framegraph::{Declaration, ImageState, Node, RunContext},
    passes::{PssmShadowMaps, ShadowMaps},
};

/// Shadow maps for local lights.
pub struct ShadowPass {
    pub max_lights: u32,
}

impl Default for ShadowPass {
    fn default() -> Self {
        Self { max_lights: 4 }
    }
}

impl Node for ShadowPass {
    fn declare(decl: &mut Declaration<'_>) {
        decl.write_in::<ShadowMaps>(ImageState::DEPTH_ATTACHMENT_WRITE);
    }

    fn run(&mut self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        let maps = ctx.res::<ShadowMaps>()?;
        log::trace!("shadow maps for {} lights into {:?}", self.max_lights, maps.0.image);
        Ok(())
    }
}

/// Parallel-split shadow maps for the sun.
pub struct PssmPass {
    pub splits: u32,
    /// Blend between logarithmic (1.0) and uniform (0.0) split distances.
    pub lambda: f32,
}

impl Default for PssmPass {
    fn default() -> Self {
        Self {
            splits: 4,
            lambda: 0.75,
        }
    }
}

impl PssmPass {
    /// Far distance of every split between `near` and `far`.
    pub fn split_distances(&self, near: f32, far: f32) -> Vec<f32> {
        (1..=self.splits)
            .map(|i| {
                let t = i as f32 / self.splits as f32;
                let logarithmic = near * (far / near).powf(t);
                let uniform = near + (far - near) * t;
                self.lambda * logarithmic + (1.0 - self.lambda) * uniform
            })
            .collect()
    }
}

impl Node for PssmPass {
    fn declare(decl: &mut Declaration<'_>) {
        decl.name("PSSMPass")
            .write_in::<PssmShadowMaps>(ImageState::DEPTH_ATTACHMENT_WRITE);
    }

    fn run(&mut self, ctx: &mut RunContext<'_>) -> anyhow::Result<()> {
        let maps = ctx.res::<PssmShadowMaps>()?;
        log::trace!(
            "{} cascades into {:?}, splits {:?}",
            self.splits,
            maps.0.image,
            self.split_distances(0.1, 200.0)
        );
        Ok(())
    }
}
