//! Staging uploads through one-off command buffers on the graphics queue

use ash::{vk, Device};

use crate::render::backends::vulkan::rendering::commands::CommandPool;
use crate::render::backends::vulkan::VulkanResult;
use super::buffer::Buffer;
use super::image::Image;
use super::layout_transition::record_layout_transition;
use super::memory::MemoryLocation;

/// Everything needed to create resources and fill them from the CPU
pub struct UploadContext {
    device: Device,
    command_pool: CommandPool,
    queue: vk::Queue,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl UploadContext {
    /// Create a transient command pool on the graphics family
    pub fn new(
        device: Device,
        graphics_family: u32,
        queue: vk::Queue,
        memory_properties: vk::PhysicalDeviceMemoryProperties,
    ) -> VulkanResult<Self> {
        let command_pool = CommandPool::new(device.clone(), graphics_family)?;
        Ok(Self {
            device,
            command_pool,
            queue,
            memory_properties,
        })
    }

    /// Device handle
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Memory type table
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    /// Record, submit and wait for one-off commands
    pub fn submit_single_time<F>(&self, record: F) -> VulkanResult<()>
    where
        F: FnOnce(&Device, vk::CommandBuffer) -> VulkanResult<()>,
    {
        self.command_pool.submit_single_time(self.queue, record)
    }

    /// Host-visible staging buffer holding `bytes`
    pub fn staging_buffer(&self, bytes: &[u8]) -> VulkanResult<Buffer> {
        Buffer::with_data(
            self.device.clone(),
            &self.memory_properties,
            bytes,
            vk::BufferUsageFlags::TRANSFER_SRC,
        )
    }

    /// Device-local buffer filled through a staging copy
    ///
    /// The staging buffer is released once the copy has completed.
    pub fn upload_buffer(&self, bytes: &[u8], usage: vk::BufferUsageFlags) -> VulkanResult<Buffer> {
        let staging = self.staging_buffer(bytes)?;
        let buffer = Buffer::new(
            self.device.clone(),
            &self.memory_properties,
            staging.size(),
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            MemoryLocation::DeviceLocal,
        )?;

        self.submit_single_time(|device, command_buffer| {
            let region = vk::BufferCopy {
                src_offset: 0,
                dst_offset: 0,
                size: staging.size(),
            };
            unsafe {
                device.cmd_copy_buffer(command_buffer, staging.handle(), buffer.handle(), &[region]);
            }
            Ok(())
        })?;

        Ok(buffer)
    }

    /// Copy pixels into mip level 0 of `image`
    ///
    /// Every level is moved to `TRANSFER_DST_OPTIMAL` first and left there, so
    /// the caller decides how the image reaches its sampling layout.
    pub fn upload_image(&self, image: &Image, pixels: &[u8]) -> VulkanResult<()> {
        let staging = self.staging_buffer(pixels)?;
        let desc = *image.desc();

        self.submit_single_time(|device, command_buffer| {
            record_layout_transition(
                device,
                command_buffer,
                image.handle(),
                desc.format,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                desc.mip_levels,
            )?;

            let region = vk::BufferImageCopy::builder()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D {
                    width: desc.extent.width,
                    height: desc.extent.height,
                    depth: 1,
                });

            unsafe {
                device.cmd_copy_buffer_to_image(
                    command_buffer,
                    staging.handle(),
                    image.handle(),
                    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                    &[region.build()],
                );
            }
            Ok(())
        })
    }

    /// Record a layout transition of every mip level in its own submission
    pub fn transition_layout(
        &self,
        image: &Image,
        old: vk::ImageLayout,
        new: vk::ImageLayout,
    ) -> VulkanResult<()> {
        let desc = *image.desc();
        self.submit_single_time(|device, command_buffer| {
            record_layout_transition(device, command_buffer, image.handle(), desc.format, old, new, desc.mip_levels)
        })
    }
}
