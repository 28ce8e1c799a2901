//! Per-frame command recording
//!
//! One primary command buffer per frame slot, reset and re-recorded every frame
//! against the acquired swapchain image.

use ash::{vk, Device};

use crate::render::backends::vulkan::VulkanResult;
use super::commands::{CommandPool, CommandRecorder};

/// Opaque black
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Clear values in attachment order; the resolve target needs none
pub fn clear_values(has_depth: bool) -> Vec<vk::ClearValue> {
    let mut values = vec![vk::ClearValue {
        color: vk::ClearColorValue { float32: CLEAR_COLOR },
    }];
    if has_depth {
        values.push(vk::ClearValue {
            depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
        });
    }
    values
}

/// Viewport covering the whole extent with depth range 0..1
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Scissor covering the whole extent
pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

/// Everything one frame's draw references
#[derive(Debug, Clone, Copy)]
pub struct FrameDraw {
    /// Pass the pipeline was built for
    pub render_pass: vk::RenderPass,
    /// Framebuffer of the acquired image
    pub framebuffer: vk::Framebuffer,
    /// Current swapchain extent
    pub extent: vk::Extent2D,
    /// Whether the pass clears a depth attachment
    pub has_depth: bool,
    /// Graphics pipeline
    pub pipeline: vk::Pipeline,
    /// Its layout, for descriptor binding
    pub pipeline_layout: vk::PipelineLayout,
    /// Vertex buffer bound at binding 0
    pub vertex_buffer: vk::Buffer,
    /// `u32` index buffer
    pub index_buffer: vk::Buffer,
    /// Indices drawn
    pub index_count: u32,
    /// This slot's descriptor set, if the pipeline has resource bindings
    pub descriptor_set: Option<vk::DescriptorSet>,
}

/// Records the single indexed draw into per-slot command buffers
pub struct FrameRecorder {
    device: Device,
    command_buffers: Vec<vk::CommandBuffer>,
    command_pool: CommandPool,
}

impl FrameRecorder {
    /// Allocate one command buffer per frame slot on the graphics family
    pub fn new(device: Device, graphics_family: u32, frames_in_flight: usize) -> VulkanResult<Self> {
        log::debug!("Creating FrameRecorder with {} command buffers", frames_in_flight);

        let command_pool = CommandPool::new(device.clone(), graphics_family)?;
        let command_buffers = command_pool.allocate_command_buffers(frames_in_flight as u32)?;

        Ok(Self {
            device,
            command_buffers,
            command_pool,
        })
    }

    /// Command buffer of slot `frame`
    pub fn command_buffer(&self, frame: usize) -> vk::CommandBuffer {
        self.command_buffers[frame % self.command_buffers.len()]
    }

    /// Reset slot `frame`'s buffer and record `draw` into it
    ///
    /// The buffer is reused every frame, so it is begun without the
    /// one-time-submit flag.
    pub fn record(&self, frame: usize, draw: &FrameDraw) -> VulkanResult<vk::CommandBuffer> {
        let mut recorder = CommandRecorder::new(self.command_buffer(frame), self.device.clone());
        recorder.reset()?;
        recorder.begin(vk::CommandBufferUsageFlags::empty())?;

        {
            let clears = clear_values(draw.has_depth);
            let mut pass = recorder.begin_render_pass(
                draw.render_pass,
                draw.framebuffer,
                full_scissor(draw.extent),
                &clears,
            )?;

            pass.bind_pipeline(draw.pipeline);
            pass.set_viewport(&full_viewport(draw.extent));
            pass.set_scissor(&full_scissor(draw.extent));
            pass.bind_vertex_buffers(&[draw.vertex_buffer], &[0]);
            pass.bind_index_buffer(draw.index_buffer, vk::IndexType::UINT32);
            if let Some(set) = draw.descriptor_set {
                pass.bind_descriptor_sets(draw.pipeline_layout, &[set]);
            }
            pass.draw_indexed(draw.index_count);
        }

        recorder.end()
    }
}

impl Drop for FrameRecorder {
    fn drop(&mut self) {
        self.command_pool.free_command_buffers(&self.command_buffers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clear_values_follow_depth() {
        let color_only = clear_values(false);
        assert_eq!(color_only.len(), 1);
        let color = unsafe { color_only[0].color.float32 };
        assert_eq!(color, [0.0, 0.0, 0.0, 1.0]);

        let with_depth = clear_values(true);
        assert_eq!(with_depth.len(), 2);
        let depth = unsafe { with_depth[1].depth_stencil };
        assert_relative_eq!(depth.depth, 1.0);
        assert_eq!(depth.stencil, 0);
    }

    #[test]
    fn test_viewport_and_scissor_cover_extent() {
        let extent = vk::Extent2D { width: 1280, height: 720 };

        let viewport = full_viewport(extent);
        assert_relative_eq!(viewport.x, 0.0);
        assert_relative_eq!(viewport.y, 0.0);
        assert_relative_eq!(viewport.width, 1280.0);
        assert_relative_eq!(viewport.height, 720.0);
        assert_relative_eq!(viewport.min_depth, 0.0);
        assert_relative_eq!(viewport.max_depth, 1.0);

        let scissor = full_scissor(extent);
        assert_eq!((scissor.offset.x, scissor.offset.y), (0, 0));
        assert_eq!((scissor.extent.width, scissor.extent.height), (1280, 720));
    }
}
