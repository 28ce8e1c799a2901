//! Persistently mapped uniform buffers

use std::marker::PhantomData;

use ash::{vk, Device};
use bytemuck::Pod;

use crate::render::backends::vulkan::VulkanResult;
use super::buffer::Buffer;
use super::memory::MemoryLocation;

/// Host-visible uniform buffer holding exactly one `T`
///
/// The memory stays mapped for the buffer's lifetime, so updates are a plain
/// copy. Coherent memory makes the write visible at the next submit.
pub struct UniformBuffer<T: Pod> {
    mapped: *mut u8,
    buffer: Buffer,
    _marker: PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    /// Create and map the buffer
    pub fn new(device: Device, memory_properties: &vk::PhysicalDeviceMemoryProperties) -> VulkanResult<Self> {
        let buffer = Buffer::new(
            device,
            memory_properties,
            Self::size(),
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            MemoryLocation::HostVisible,
        )?;
        let mapped = buffer.map_memory()?;

        Ok(Self {
            mapped,
            buffer,
            _marker: PhantomData,
        })
    }

    /// Byte size of one `T`
    pub fn size() -> vk::DeviceSize {
        std::mem::size_of::<T>() as vk::DeviceSize
    }

    /// Overwrite the contents
    pub fn update(&mut self, value: &T) {
        let bytes = bytemuck::bytes_of(value);
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped, bytes.len());
        }
    }

    /// Get the buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }
}

impl<T: Pod> Drop for UniformBuffer<T> {
    fn drop(&mut self) {
        self.buffer.unmap_memory();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::UniformBufferObject;

    #[test]
    fn test_size_matches_shader_block() {
        assert_eq!(UniformBuffer::<UniformBufferObject>::size(), 192);
    }
}
