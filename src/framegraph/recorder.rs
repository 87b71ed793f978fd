use std::collections::HashMap;

use anyhow::Context;
use ash::vk;

use crate::framegraph::{
    ImageState, SplitPhase,
    resource::{NativeHandle, ResourceId},
};

/// A scheduled barrier with its native handle resolved.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ResourceBarrier {
    pub resource: ResourceId,
    pub handle: NativeHandle,
    pub before: ImageState,
    pub after: ImageState,
    pub phase: SplitPhase,
}

/// Whatever records GPU commands for the graph.
pub trait CommandRecorder {
    /// Applies a batch of barriers before any subsequently recorded work.
    fn resource_barriers(&mut self, barriers: &[ResourceBarrier]) -> anyhow::Result<()>;

    fn marker(&mut self, _label: &str) {}
}

fn aspect_for_layout(layout: vk::ImageLayout) -> vk::ImageAspectFlags {
    match layout {
        vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL
        | vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
        | vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL
        | vk::ImageLayout::DEPTH_READ_ONLY_OPTIMAL => vk::ImageAspectFlags::DEPTH,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

pub fn image_barrier(
    barrier: &ResourceBarrier,
    image: vk::Image,
) -> vk::ImageMemoryBarrier2<'static> {
    let layout = if barrier.after.layout == vk::ImageLayout::UNDEFINED {
        barrier.before.layout
    } else {
        barrier.after.layout
    };

    vk::ImageMemoryBarrier2::default()
        .image(image)
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(aspect_for_layout(layout))
                .base_mip_level(0)
                .level_count(vk::REMAINING_MIP_LEVELS)
                .base_array_layer(0)
                .layer_count(vk::REMAINING_ARRAY_LAYERS),
        )
        .src_stage_mask(barrier.before.stage)
        .src_access_mask(barrier.before.access)
        .old_layout(barrier.before.layout)
        .dst_stage_mask(barrier.after.stage)
        .dst_access_mask(barrier.after.access)
        .new_layout(barrier.after.layout)
}

pub fn buffer_barrier(
    barrier: &ResourceBarrier,
    buffer: vk::Buffer,
) -> vk::BufferMemoryBarrier2<'static> {
    vk::BufferMemoryBarrier2::default()
        .buffer(buffer)
        .offset(0)
        .size(vk::WHOLE_SIZE)
        .src_stage_mask(barrier.before.stage)
        .src_access_mask(barrier.before.access)
        .dst_stage_mask(barrier.after.stage)
        .dst_access_mask(barrier.after.access)
}

/// Events backing split barriers, keyed by the resource they synchronize.
#[derive(Default)]
pub struct SplitEvents {
    free: Vec<vk::Event>,
    in_flight: HashMap<NativeHandle, vk::Event>,
}

impl SplitEvents {
    fn acquire(&mut self, device: &ash::Device) -> anyhow::Result<vk::Event> {
        if let Some(event) = self.free.pop() {
            return Ok(event);
        }

        unsafe {
            device
                .create_event(&vk::EventCreateInfo::default(), None)
                .context("failed to create split barrier event")
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn destroy(&mut self, device: &ash::Device) {
        log::trace!("Destroying split barrier events");
        for event in self.free.drain(..).chain(self.in_flight.drain().map(|(_, e)| e)) {
            unsafe { device.destroy_event(event, None) };
        }
    }
}

/// Records barrier batches into a Vulkan command buffer. Begin halves set an
/// event, end halves wait on and reset it.
pub struct VkCommandRecorder<'a> {
    device: &'a ash::Device,
    cmd: vk::CommandBuffer,
    events: &'a mut SplitEvents,
}

impl<'a> VkCommandRecorder<'a> {
    pub fn new(device: &'a ash::Device, cmd: vk::CommandBuffer, events: &'a mut SplitEvents) -> Self {
        Self {
            device,
            cmd,
            events,
        }
    }

    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.cmd
    }

    fn begin_split(&mut self, barrier: &ResourceBarrier) -> anyhow::Result<()> {
        let event = self.events.acquire(self.device)?;
        with_dependency(barrier, |dependency| unsafe {
            self.device.cmd_set_event2(self.cmd, event, dependency);
        });
        self.events.in_flight.insert(barrier.handle, event);
        Ok(())
    }

    fn end_split(&mut self, barrier: &ResourceBarrier) -> anyhow::Result<()> {
        let event = self
            .events
            .in_flight
            .remove(&barrier.handle)
            .with_context(|| format!("no split barrier in flight for {:?}", barrier.handle))?;

        with_dependency(barrier, |dependency| unsafe {
            self.device
                .cmd_wait_events2(self.cmd, &[event], std::slice::from_ref(dependency));
            self.device
                .cmd_reset_event2(self.cmd, event, barrier.after.stage);
        });
        self.events.free.push(event);
        Ok(())
    }
}

fn with_dependency(barrier: &ResourceBarrier, record: impl FnOnce(&vk::DependencyInfo)) {
    match barrier.handle {
        NativeHandle::Image(image) => {
            let barriers = [image_barrier(barrier, image)];
            record(&vk::DependencyInfo::default().image_memory_barriers(&barriers));
        }
        NativeHandle::Buffer(buffer) => {
            let barriers = [buffer_barrier(barrier, buffer)];
            record(&vk::DependencyInfo::default().buffer_memory_barriers(&barriers));
        }
    }
}

impl CommandRecorder for VkCommandRecorder<'_> {
    fn resource_barriers(&mut self, barriers: &[ResourceBarrier]) -> anyhow::Result<()> {
        let mut image_barriers = Vec::new();
        let mut buffer_barriers = Vec::new();

        for barrier in barriers {
            match barrier.phase {
                SplitPhase::Atomic => match barrier.handle {
                    NativeHandle::Image(image) => image_barriers.push(image_barrier(barrier, image)),
                    NativeHandle::Buffer(buffer) => {
                        buffer_barriers.push(buffer_barrier(barrier, buffer))
                    }
                },
                SplitPhase::Begin => self.begin_split(barrier)?,
                SplitPhase::End => self.end_split(barrier)?,
            }
        }

        if !image_barriers.is_empty() || !buffer_barriers.is_empty() {
            let dependency_info = vk::DependencyInfo::default()
                .image_memory_barriers(&image_barriers)
                .buffer_memory_barriers(&buffer_barriers);
            unsafe { self.device.cmd_pipeline_barrier2(self.cmd, &dependency_info) }
        }

        Ok(())
    }

    fn marker(&mut self, label: &str) {
        log::trace!("cmd {:?}: {}", self.cmd, label);
    }
}
