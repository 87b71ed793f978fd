use ash::vk::{self, Handle};

use crate::framegraph::{FrameGraph, NativeHandle, Resource};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GpuImage {
    pub image: vk::Image,
    pub view: vk::ImageView,
    pub extent: vk::Extent2D,
}

impl GpuImage {
    /// Stand-in handles for running the graph without a device.
    pub fn placeholder(raw: u64, extent: vk::Extent2D) -> Self {
        Self {
            image: vk::Image::from_raw(raw),
            view: vk::ImageView::from_raw(raw),
            extent,
        }
    }
}

macro_rules! image_resource {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, PartialEq, Eq, Debug)]
            pub struct $name(pub GpuImage);

            impl Resource for $name {
                const NAME: &'static str = stringify!($name);

                fn native_handle(&self) -> Option<NativeHandle> {
                    Some(NativeHandle::Image(self.0.image))
                }
            }
        )+
    };
}

image_resource!(
    ZBuffer,
    ShadowMaps,
    /// Cascaded (parallel-split) shadow maps for the directional light.
    PssmShadowMaps,
    HdrFramebuffer,
    AmbientBuffer,
    NormalsBuffer,
    /// Raw horizon-based ambient occlusion, before blurring.
    HbaoBuffer,
    SsaoBuffer,
    SdrFramebuffer,
);

/// Environment cubemap. Bound once and never transitioned by the graph.
#[derive(Clone, Copy, Debug)]
pub struct Skybox {
    pub cubemap: vk::ImageView,
    pub intensity: f32,
}

impl Resource for Skybox {
    const NAME: &'static str = "Skybox";
}

/// Binds every resource the demo passes use, backed by placeholder handles.
pub fn bind_placeholder_resources(graph: &mut FrameGraph, extent: vk::Extent2D) {
    let shadow_extent = vk::Extent2D {
        width: 2048,
        height: 2048,
    };

    graph.set_res(ZBuffer(GpuImage::placeholder(1, extent)));
    graph.set_res(ShadowMaps(GpuImage::placeholder(2, shadow_extent)));
    graph.set_res(PssmShadowMaps(GpuImage::placeholder(3, shadow_extent)));
    graph.set_res(HdrFramebuffer(GpuImage::placeholder(4, extent)));
    graph.set_res(AmbientBuffer(GpuImage::placeholder(5, extent)));
    graph.set_res(NormalsBuffer(GpuImage::placeholder(6, extent)));
    graph.set_res(HbaoBuffer(GpuImage::placeholder(7, extent)));
    graph.set_res(SsaoBuffer(GpuImage::placeholder(8, extent)));
    graph.set_res(SdrFramebuffer(GpuImage::placeholder(9, extent)));
    graph.set_res(Skybox {
        cubemap: vk::ImageView::from_raw(10),
        intensity: 1.0,
    });
}
