//! Framebuffers and the swapchain-sized attachments behind them
//!
//! Everything here is rebuilt whenever the swapchain is.

use ash::{vk, Device};

use crate::render::backends::vulkan::resources::image::{depth_aspect, Image, ImageDesc};
use crate::render::backends::vulkan::resources::upload::UploadContext;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Device,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a new framebuffer
    pub fn new(
        device: Device,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let framebuffer_create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        let framebuffer = unsafe {
            device.create_framebuffer(&framebuffer_create_info, None)
                .map_err(VulkanError::Api)?
        };

        Ok(Self {
            device,
            framebuffer,
        })
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
        }
    }
}

/// Depth attachment shared by every framebuffer
pub struct DepthBuffer {
    device: Device,
    image_view: vk::ImageView,
    image: Image,
}

impl DepthBuffer {
    /// Create the depth image and move it to its attachment layout
    pub fn new(
        upload: &UploadContext,
        format: vk::Format,
        extent: vk::Extent2D,
        samples: vk::SampleCountFlags,
    ) -> VulkanResult<Self> {
        log::debug!("Creating depth buffer {}x{} ({:?}, {:?})", extent.width, extent.height, format, samples);

        let image = Image::new(
            upload.device().clone(),
            upload.memory_properties(),
            ImageDesc {
                extent,
                mip_levels: 1,
                samples,
                format,
                usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            },
        )?;
        let image_view = image.create_view(depth_aspect(format))?;

        let device = upload.device().clone();
        let depth_buffer = Self { device, image_view, image };
        upload.transition_layout(
            &depth_buffer.image,
            vk::ImageLayout::UNDEFINED,
            vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        )?;

        Ok(depth_buffer)
    }

    /// Get the image view handle
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.image_view, None);
        }
    }
}

/// Transient multisampled color target resolved into the swapchain image
pub struct ColorTarget {
    device: Device,
    image_view: vk::ImageView,
    _image: Image,
}

impl ColorTarget {
    /// Create a multisampled image in the swapchain format
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        format: vk::Format,
        extent: vk::Extent2D,
        samples: vk::SampleCountFlags,
    ) -> VulkanResult<Self> {
        log::debug!("Creating {:?} color target {}x{}", samples, extent.width, extent.height);

        let image = Image::new(
            device.clone(),
            memory_properties,
            ImageDesc {
                extent,
                mip_levels: 1,
                samples,
                format,
                usage: vk::ImageUsageFlags::TRANSIENT_ATTACHMENT | vk::ImageUsageFlags::COLOR_ATTACHMENT,
            },
        )?;
        let image_view = image.create_view(vk::ImageAspectFlags::COLOR)?;

        Ok(Self { device, image_view, _image: image })
    }

    /// Get the image view handle
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }
}

impl Drop for ColorTarget {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.image_view, None);
        }
    }
}
