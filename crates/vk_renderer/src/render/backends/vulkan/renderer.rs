//! Vulkan renderer
//!
//! Owns every component of the backend and drives the per-frame loop:
//! wait on the slot fence, acquire, record, update uniforms, submit, present.
//! A stale swapchain at acquire or present is rebuilt in place and the loop
//! carries on with the next frame.

use ash::vk;

use crate::assets::load_shader;
use crate::core::config::ApplicationConfig;
use crate::render::{RenderFeatures, UniformBufferObject};
use super::initialization::{VulkanContext, VulkanError, VulkanResult, Window};
use super::rendering::command_recorder::{FrameDraw, FrameRecorder};
use super::rendering::render_pass::RenderPass;
use super::rendering::shader::{GraphicsPipeline, PipelineSettings};
use super::resources::image::{find_depth_format, max_usable_sample_count};
use super::resources::resource_manager::{load_mesh, load_texture_data, ResourceManager};
use super::state::frame_state::{
    classify_acquire, classify_present, AcquireOutcome, FrameCounter, FramePhase, InFlightTracker, PresentOutcome,
};
use super::state::swapchain_manager::SwapchainManager;
use super::state::sync_manager::SyncManager;

/// What happened to the frame passed to [`VulkanRenderer::draw_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The frame reached the presentation engine
    Presented,
    /// The swapchain was rebuilt; the frame may or may not have been shown
    SwapchainRecreated,
}

/// Sample count for the color and depth attachments
pub fn sample_count_for(features: RenderFeatures, limits: &vk::PhysicalDeviceLimits) -> vk::SampleCountFlags {
    if features.contains(RenderFeatures::MSAA) {
        max_usable_sample_count(limits)
    } else {
        vk::SampleCountFlags::TYPE_1
    }
}

/// Vulkan renderer
///
/// Fields drop in declaration order: everything that records or references
/// device objects goes before the context that owns the device.
pub struct VulkanRenderer {
    sync: SyncManager,
    recorder: FrameRecorder,
    resources: ResourceManager,
    pipeline: GraphicsPipeline,
    swapchain_manager: SwapchainManager,
    render_pass: RenderPass,
    counter: FrameCounter,
    tracker: InFlightTracker,
    resize_requested: bool,
    fence_timeout: Option<u64>,
    features: RenderFeatures,
    context: VulkanContext,
}

impl VulkanRenderer {
    /// Set up the device, swapchain, pipeline and resources for `window`
    pub fn new(window: &mut Window, config: &ApplicationConfig) -> VulkanResult<Self> {
        let renderer_config = &config.renderer;
        let features = renderer_config.features.to_render_features();
        let frames_in_flight = renderer_config.max_frames_in_flight.max(1);
        log::info!("Creating Vulkan renderer (features: {:?}, {} frames in flight)", features, frames_in_flight);

        let context = VulkanContext::new(window, renderer_config, features)?;

        let mesh = load_mesh(&config.assets)?;
        let texture_data = if features.contains(RenderFeatures::TEXTURE) {
            Some(load_texture_data(&config.assets)?)
        } else {
            None
        };
        let resources = ResourceManager::new(&context, &mesh, texture_data.as_ref(), features, frames_in_flight)?;

        let depth_format = if features.contains(RenderFeatures::DEPTH) {
            Some(find_depth_format(|format| context.format_properties(format))?)
        } else {
            None
        };
        let samples = sample_count_for(features, context.limits());
        log::info!("Depth format {:?}, {:?} samples", depth_format, samples);

        let mut swapchain_manager =
            SwapchainManager::new(&context, window, resources.upload_context(), depth_format, samples)?;
        let render_pass = RenderPass::new(context.raw_device(), swapchain_manager.render_target_layout())?;
        swapchain_manager.create_framebuffers(&context, &render_pass)?;

        let vertex_spirv = load_shader(&renderer_config.shaders.vertex_shader_path)?;
        let fragment_spirv = load_shader(&renderer_config.shaders.fragment_shader_path)?;
        let pipeline = GraphicsPipeline::new(
            &context.raw_device(),
            render_pass.handle(),
            &vertex_spirv,
            &fragment_spirv,
            &PipelineSettings::from_features(features, samples),
            &[resources.descriptor_set_layout()],
        )?;

        let recorder = FrameRecorder::new(context.raw_device(), context.device().graphics_family, frames_in_flight)?;
        let sync = SyncManager::new(
            context.raw_device(),
            frames_in_flight,
            swapchain_manager.swapchain().image_count(),
        )?;

        log::info!("Vulkan renderer ready");

        Ok(Self {
            sync,
            recorder,
            resources,
            pipeline,
            swapchain_manager,
            render_pass,
            counter: FrameCounter::new(frames_in_flight),
            tracker: InFlightTracker::new(frames_in_flight),
            resize_requested: false,
            fence_timeout: renderer_config.fence_timeout_ns,
            features,
            context,
        })
    }

    /// Render and present one frame
    ///
    /// `elapsed` drives the uniform animation. A stale swapchain is not an
    /// error: it is rebuilt and [`FrameOutcome::SwapchainRecreated`] returned.
    pub fn draw_frame(&mut self, window: &mut Window, elapsed: f32) -> VulkanResult<FrameOutcome> {
        let slot = self.counter.slot();
        log::trace!("Frame {} slot {}: {}", self.counter.count(), slot, FramePhase::Acquiring);

        let frame_sync = self.sync.frame(slot);
        frame_sync.in_flight.wait(self.fence_timeout)?;
        self.tracker.complete(slot);

        let acquired = unsafe {
            self.context.swapchain_loader().acquire_next_image(
                self.swapchain_manager.swapchain().handle(),
                u64::MAX,
                frame_sync.image_available.handle(),
                vk::Fence::null(),
            )
        };
        let image_index = match classify_acquire(acquired)? {
            AcquireOutcome::Ready { image_index, suboptimal } => {
                if suboptimal {
                    log::debug!("Acquired image {} from a suboptimal swapchain", image_index);
                }
                image_index
            }
            AcquireOutcome::Stale => {
                log::debug!("Frame {}: {} at acquire", self.counter.count(), FramePhase::SwapchainStale);
                self.recreate_swapchain(window)?;
                return Ok(FrameOutcome::SwapchainRecreated);
            }
        };

        frame_sync.in_flight.reset()?;

        log::trace!("Frame {} image {}: {}", self.counter.count(), image_index, FramePhase::Recording);
        let draw = FrameDraw {
            render_pass: self.render_pass.handle(),
            framebuffer: self.swapchain_manager.framebuffer(image_index as usize),
            extent: self.swapchain_manager.extent(),
            has_depth: self.swapchain_manager.has_depth(),
            pipeline: self.pipeline.handle(),
            pipeline_layout: self.pipeline.layout(),
            vertex_buffer: self.resources.vertex_buffer(),
            index_buffer: self.resources.index_buffer(),
            index_count: self.resources.index_count(),
            descriptor_set: Some(self.resources.descriptor_set(slot)),
        };
        let command_buffer = self.recorder.record(slot, &draw)?;

        let extent = self.swapchain_manager.extent();
        let ubo = UniformBufferObject::animated(elapsed, (extent.width, extent.height));
        self.resources.update_uniform_buffer(slot, &ubo)?;

        let frame_sync = self.sync.frame(slot);
        let wait_semaphores = [frame_sync.image_available.handle()];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [command_buffer];
        let signal_semaphores = [self.sync.render_finished(image_index as usize).handle()];
        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.context
                .device()
                .device
                .queue_submit(self.context.graphics_queue(), &[submit_info.build()], frame_sync.in_flight.handle())
                .map_err(VulkanError::device_lost_or(VulkanError::Submit))?;
        }
        self.tracker.submit(slot)?;
        log::trace!("Frame {}: {} ({} in flight)", self.counter.count(), FramePhase::Submitted, self.tracker.in_flight());

        let swapchains = [self.swapchain_manager.swapchain().handle()];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&signal_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        log::trace!("Frame {}: {}", self.counter.count(), FramePhase::Presenting);
        let presented = unsafe {
            self.context
                .swapchain_loader()
                .queue_present(self.context.present_queue(), &present_info)
        };
        let outcome = match classify_present(presented, self.resize_requested)? {
            PresentOutcome::Presented => FrameOutcome::Presented,
            PresentOutcome::Stale => {
                log::debug!("Frame {}: {} at present", self.counter.count(), FramePhase::SwapchainStale);
                self.recreate_swapchain(window)?;
                FrameOutcome::SwapchainRecreated
            }
        };

        self.counter.advance();
        log::trace!("Frame {}: {}", self.counter.count(), FramePhase::Idle);
        Ok(outcome)
    }

    /// Rebuild the swapchain and everything sized by it
    pub fn recreate_swapchain(&mut self, window: &mut Window) -> VulkanResult<()> {
        let image_count = self.swapchain_manager.recreate(
            &self.context,
            window,
            self.resources.upload_context(),
            &self.render_pass,
        )?;
        self.sync.recreate_image_semaphores(image_count)?;
        self.resize_requested = false;
        Ok(())
    }

    /// Flag the swapchain for recreation after the next present
    pub fn notify_resized(&mut self) {
        self.resize_requested = true;
    }

    /// Get swapchain extent
    pub fn swapchain_extent(&self) -> (u32, u32) {
        let extent = self.swapchain_manager.extent();
        (extent.width, extent.height)
    }

    /// Frames submitted so far
    pub fn frame_count(&self) -> u64 {
        self.counter.count()
    }

    /// Features the pipeline was built with
    pub fn features(&self) -> RenderFeatures {
        self.features
    }

    /// Wait for device idle
    pub fn wait_idle(&self) -> VulkanResult<()> {
        self.context.wait_idle()
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        log::debug!("Destroying Vulkan renderer after {} frames", self.counter.count());
        if let Err(e) = self.context.wait_idle() {
            log::error!("Failed to wait for device idle during shutdown: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_count_follows_msaa_flag() {
        let limits = vk::PhysicalDeviceLimits {
            framebuffer_color_sample_counts: vk::SampleCountFlags::TYPE_1
                | vk::SampleCountFlags::TYPE_2
                | vk::SampleCountFlags::TYPE_4
                | vk::SampleCountFlags::TYPE_8,
            framebuffer_depth_sample_counts: vk::SampleCountFlags::TYPE_1
                | vk::SampleCountFlags::TYPE_2
                | vk::SampleCountFlags::TYPE_4,
            ..Default::default()
        };

        assert_eq!(sample_count_for(RenderFeatures::DEPTH, &limits), vk::SampleCountFlags::TYPE_1);
        assert_eq!(
            sample_count_for(RenderFeatures::DEPTH | RenderFeatures::MSAA, &limits),
            vk::SampleCountFlags::TYPE_4
        );
    }

    #[test]
    fn test_frame_outcome_equality() {
        assert_ne!(FrameOutcome::Presented, FrameOutcome::SwapchainRecreated);
    }
}
