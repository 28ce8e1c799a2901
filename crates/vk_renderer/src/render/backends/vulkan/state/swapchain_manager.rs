//! Swapchain and framebuffer management for the Vulkan renderer
//!
//! Owns the swapchain and everything sized by it: the depth buffer, the
//! optional multisampled color target and one framebuffer per image.

use ash::vk;

use crate::render::backends::vulkan::rendering::render_pass::{RenderPass, RenderTargetLayout};
use crate::render::backends::vulkan::resources::upload::UploadContext;
use crate::render::backends::vulkan::{VulkanContext, VulkanResult};
use super::framebuffer::{ColorTarget, DepthBuffer, Framebuffer};
use super::swapchain::{resolve_extent, SurfaceExtentSource, Swapchain};

/// Manages the swapchain and its dependent attachments
///
/// Fields drop in declaration order, so framebuffers go before the
/// attachments they reference and the swapchain goes last.
pub struct SwapchainManager {
    framebuffers: Vec<Framebuffer>,
    color_target: Option<ColorTarget>,
    depth_buffer: Option<DepthBuffer>,
    swapchain: Swapchain,
    depth_format: Option<vk::Format>,
    samples: vk::SampleCountFlags,
}

impl SwapchainManager {
    /// Create the swapchain at the window's current size
    ///
    /// Framebuffers need the render pass, which in turn needs the swapchain
    /// format; call [`Self::create_framebuffers`] once the pass exists.
    pub fn new<S>(
        context: &VulkanContext,
        window: &mut S,
        upload: &UploadContext,
        depth_format: Option<vk::Format>,
        samples: vk::SampleCountFlags,
    ) -> VulkanResult<Self>
    where
        S: SurfaceExtentSource + ?Sized,
    {
        log::debug!("Creating SwapchainManager...");

        let physical_device = context.physical_device().device;
        let (extent, capabilities) = resolve_extent(window, || context.surface().capabilities(physical_device))?;
        let swapchain = Swapchain::new(context, extent, &capabilities, vk::SwapchainKHR::null())?;

        let mut manager = Self {
            framebuffers: Vec::new(),
            color_target: None,
            depth_buffer: None,
            swapchain,
            depth_format,
            samples,
        };
        manager.create_attachments(context, upload)?;
        Ok(manager)
    }

    fn create_attachments(&mut self, context: &VulkanContext, upload: &UploadContext) -> VulkanResult<()> {
        let extent = self.swapchain.extent();

        if self.samples != vk::SampleCountFlags::TYPE_1 {
            self.color_target = Some(ColorTarget::new(
                context.raw_device(),
                context.memory_properties(),
                self.swapchain.format().format,
                extent,
                self.samples,
            )?);
        }

        if let Some(format) = self.depth_format {
            self.depth_buffer = Some(DepthBuffer::new(upload, format, extent, self.samples)?);
        }

        Ok(())
    }

    /// Attachment plan matching the current swapchain
    pub fn render_target_layout(&self) -> RenderTargetLayout {
        RenderTargetLayout::new(self.swapchain.format().format, self.depth_format, self.samples)
    }

    /// Build one framebuffer per swapchain image for `render_pass`
    pub fn create_framebuffers(&mut self, context: &VulkanContext, render_pass: &RenderPass) -> VulkanResult<()> {
        let color_view = self.color_target.as_ref().map(ColorTarget::image_view);
        let depth_view = self.depth_buffer.as_ref().map(DepthBuffer::image_view);
        let extent = self.swapchain.extent();

        self.framebuffers = self
            .swapchain
            .image_views()
            .iter()
            .map(|&view| {
                let attachments = render_pass.layout().framebuffer_attachments(view, color_view, depth_view)?;
                Framebuffer::new(context.raw_device(), render_pass.handle(), &attachments, extent)
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        log::debug!("Created {} framebuffers", self.framebuffers.len());
        Ok(())
    }

    /// Rebuild everything for the window's new size
    ///
    /// Blocks while the window is minimized, then waits for the device to go
    /// idle before anything is destroyed. Returns the new image count.
    pub fn recreate<S>(
        &mut self,
        context: &VulkanContext,
        window: &mut S,
        upload: &UploadContext,
        render_pass: &RenderPass,
    ) -> VulkanResult<usize>
    where
        S: SurfaceExtentSource + ?Sized,
    {
        let physical_device = context.physical_device().device;
        let (extent, capabilities) = resolve_extent(window, || context.surface().capabilities(physical_device))?;

        context.wait_idle()?;

        self.framebuffers.clear();
        self.color_target = None;
        self.depth_buffer = None;

        // The old swapchain is retired by the new one and dropped on assignment
        self.swapchain = Swapchain::new(context, extent, &capabilities, self.swapchain.handle())?;

        self.create_attachments(context, upload)?;
        self.create_framebuffers(context, render_pass)?;

        log::info!(
            "Recreated swapchain at {}x{} with {} images",
            extent.width,
            extent.height,
            self.swapchain.image_count()
        );
        Ok(self.swapchain.image_count())
    }

    /// Current swapchain
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Framebuffer for a specific swapchain image
    pub fn framebuffer(&self, image_index: usize) -> vk::Framebuffer {
        self.framebuffers[image_index].handle()
    }

    /// Current swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Whether a depth buffer is attached
    pub fn has_depth(&self) -> bool {
        self.depth_buffer.is_some()
    }
}
