use std::fmt;

use ash::vk;

/// The GPU state a tracked resource must be in while a node uses it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageState {
    pub layout: vk::ImageLayout,
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
}

/// Layouts in which several read-only usages can be satisfied at once.
const READ_COMBINABLE_LAYOUTS: [vk::ImageLayout; 6] = [
    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
    vk::ImageLayout::DEPTH_READ_ONLY_OPTIMAL,
    vk::ImageLayout::READ_ONLY_OPTIMAL,
    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    vk::ImageLayout::GENERAL,
];

const WRITE_ACCESS: vk::AccessFlags2 = vk::AccessFlags2::from_raw(
    vk::AccessFlags2::SHADER_WRITE.as_raw()
        | vk::AccessFlags2::SHADER_STORAGE_WRITE.as_raw()
        | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw()
        | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw()
        | vk::AccessFlags2::TRANSFER_WRITE.as_raw()
        | vk::AccessFlags2::HOST_WRITE.as_raw()
        | vk::AccessFlags2::MEMORY_WRITE.as_raw(),
);

const FRAGMENT_TESTS: vk::PipelineStageFlags2 = vk::PipelineStageFlags2::from_raw(
    vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS.as_raw()
        | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS.as_raw(),
);

impl ImageState {
    pub const fn new(
        layout: vk::ImageLayout,
        stage: vk::PipelineStageFlags2,
        access: vk::AccessFlags2,
    ) -> Self {
        Self {
            layout,
            stage,
            access,
        }
    }

    pub const UNDEFINED: ImageState = ImageState::new(
        vk::ImageLayout::UNDEFINED,
        vk::PipelineStageFlags2::TOP_OF_PIPE,
        vk::AccessFlags2::NONE,
    );

    pub const COLOR_ATTACHMENT_WRITE: ImageState = ImageState::new(
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
    );

    /// Blending on top of existing contents.
    pub const COLOR_ATTACHMENT_READ_WRITE: ImageState = ImageState::new(
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        vk::AccessFlags2::from_raw(
            vk::AccessFlags2::COLOR_ATTACHMENT_READ.as_raw()
                | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE.as_raw(),
        ),
    );

    pub const DEPTH_ATTACHMENT_WRITE: ImageState = ImageState::new(
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        FRAGMENT_TESTS,
        vk::AccessFlags2::from_raw(
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ.as_raw()
                | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE.as_raw(),
        ),
    );

    /// Depth testing without depth writes.
    pub const DEPTH_READ_ONLY: ImageState = ImageState::new(
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        FRAGMENT_TESTS,
        vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
    );

    /// Depth sampled from fragment or compute shaders.
    pub const DEPTH_SAMPLED: ImageState = ImageState::new(
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        vk::PipelineStageFlags2::from_raw(
            vk::PipelineStageFlags2::FRAGMENT_SHADER.as_raw()
                | vk::PipelineStageFlags2::COMPUTE_SHADER.as_raw(),
        ),
        vk::AccessFlags2::SHADER_READ,
    );

    pub const SHADER_READ_FRAGMENT: ImageState = ImageState::new(
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        vk::PipelineStageFlags2::FRAGMENT_SHADER,
        vk::AccessFlags2::SHADER_READ,
    );

    pub const SHADER_READ_COMPUTE: ImageState = ImageState::new(
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_READ,
    );

    pub const STORAGE_WRITE_COMPUTE: ImageState = ImageState::new(
        vk::ImageLayout::GENERAL,
        vk::PipelineStageFlags2::COMPUTE_SHADER,
        vk::AccessFlags2::SHADER_STORAGE_WRITE,
    );

    pub const TRANSFER_SRC: ImageState = ImageState::new(
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_READ,
    );

    pub const TRANSFER_DST: ImageState = ImageState::new(
        vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        vk::PipelineStageFlags2::TRANSFER,
        vk::AccessFlags2::TRANSFER_WRITE,
    );

    pub const PRESENT: ImageState = ImageState::new(
        vk::ImageLayout::PRESENT_SRC_KHR,
        vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
        vk::AccessFlags2::NONE,
    );

    pub fn is_read_only(&self) -> bool {
        !self.access.intersects(WRITE_ACCESS)
    }

    /// Combines two usages of the same resource within one layer.
    ///
    /// Identical states merge trivially. Different states only merge when both
    /// are read-only in the same read-combinable layout, in which case stages
    /// and accesses are unioned. Returns `None` for contradictory states.
    pub fn merge(self, other: ImageState) -> Option<ImageState> {
        if self == other {
            return Some(self);
        }

        if self.layout != other.layout
            || !READ_COMBINABLE_LAYOUTS.contains(&self.layout)
            || !self.is_read_only()
            || !other.is_read_only()
        {
            return None;
        }

        Some(ImageState {
            layout: self.layout,
            stage: self.stage | other.stage,
            access: self.access | other.access,
        })
    }
}

impl Default for ImageState {
    fn default() -> Self {
        Self::UNDEFINED
    }
}

impl fmt::Display for ImageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ layout: {}, stage: {}, access: {} }}",
            layout_str(self.layout),
            stage_str(self.stage),
            access_str(self.access)
        )
    }
}

fn layout_str(layout: vk::ImageLayout) -> &'static str {
    match layout {
        vk::ImageLayout::UNDEFINED => "UNDEFINED",
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => "COLOR_ATTACHMENT_OPTIMAL",
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL => "DEPTH_STENCIL_ATTACHMENT_OPTIMAL",
        vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL => "DEPTH_STENCIL_READ_ONLY_OPTIMAL",
        vk::ImageLayout::PRESENT_SRC_KHR => "PRESENT_SRC_KHR",
        vk::ImageLayout::GENERAL => "GENERAL",
        vk::ImageLayout::TRANSFER_SRC_OPTIMAL => "TRANSFER_SRC_OPTIMAL",
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => "TRANSFER_DST_OPTIMAL",
        vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => "SHADER_READ_ONLY_OPTIMAL",
        _ => "OTHER",
    }
}

fn stage_str(stage: vk::PipelineStageFlags2) -> String {
    const NAMES: [(vk::PipelineStageFlags2, &str); 9] = [
        (vk::PipelineStageFlags2::TOP_OF_PIPE, "TOP_OF_PIPE"),
        (vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS, "EARLY_FRAGMENT_TESTS"),
        (vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS, "LATE_FRAGMENT_TESTS"),
        (vk::PipelineStageFlags2::FRAGMENT_SHADER, "FRAGMENT_SHADER"),
        (
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            "COLOR_ATTACHMENT_OUTPUT",
        ),
        (vk::PipelineStageFlags2::COMPUTE_SHADER, "COMPUTE_SHADER"),
        (vk::PipelineStageFlags2::TRANSFER, "TRANSFER"),
        (vk::PipelineStageFlags2::BOTTOM_OF_PIPE, "BOTTOM_OF_PIPE"),
        (vk::PipelineStageFlags2::ALL_COMMANDS, "ALL_COMMANDS"),
    ];

    let stages: Vec<&str> = NAMES
        .iter()
        .filter(|(flag, _)| stage.contains(*flag))
        .map(|(_, name)| *name)
        .collect();

    if stages.is_empty() {
        "NONE".to_string()
    } else {
        stages.join(" | ")
    }
}

fn access_str(access: vk::AccessFlags2) -> String {
    const NAMES: [(vk::AccessFlags2, &str); 9] = [
        (vk::AccessFlags2::COLOR_ATTACHMENT_WRITE, "COLOR_ATTACHMENT_WRITE"),
        (vk::AccessFlags2::COLOR_ATTACHMENT_READ, "COLOR_ATTACHMENT_READ"),
        (
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
            "DEPTH_STENCIL_ATTACHMENT_READ",
        ),
        (
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            "DEPTH_STENCIL_ATTACHMENT_WRITE",
        ),
        (vk::AccessFlags2::TRANSFER_READ, "TRANSFER_READ"),
        (vk::AccessFlags2::TRANSFER_WRITE, "TRANSFER_WRITE"),
        (vk::AccessFlags2::SHADER_READ, "SHADER_READ"),
        (vk::AccessFlags2::SHADER_WRITE, "SHADER_WRITE"),
        (vk::AccessFlags2::SHADER_STORAGE_WRITE, "SHADER_STORAGE_WRITE"),
    ];

    let flags: Vec<&str> = NAMES
        .iter()
        .filter(|(flag, _)| access.contains(*flag))
        .map(|(_, name)| *name)
        .collect();

    if flags.is_empty() {
        "NONE".to_string()
    } else {
        flags.join(" | ")
    }
}

pub fn log_image_transition(old: ImageState, new: ImageState, debug_name: &str) {
    log::trace!(
        "{}\n     layout: {} -> {}\n     stage:  {} -> {}\n     access: {} -> {}",
        debug_name,
        layout_str(old.layout),
        layout_str(new.layout),
        stage_str(old.stage),
        stage_str(new.stage),
        access_str(old.access),
        access_str(new.access)
    );
}
