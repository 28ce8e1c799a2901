//! Device memory type resolution
//!
//! Every buffer and image gets its own dedicated allocation; this module picks
//! the memory type for it.

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Where a resource lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLocation {
    /// GPU-only memory, filled through a staging copy
    DeviceLocal,
    /// CPU-writable memory without explicit flushes
    HostVisible,
}

impl MemoryLocation {
    /// Property flags a memory type must have
    pub fn required_flags(self) -> vk::MemoryPropertyFlags {
        match self {
            Self::DeviceLocal => vk::MemoryPropertyFlags::DEVICE_LOCAL,
            Self::HostVisible => vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        }
    }
}

/// First memory type allowed by `type_filter` that has all `required` flags
pub fn find_memory_type(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    required: vk::MemoryPropertyFlags,
) -> VulkanResult<u32> {
    let count = memory_properties.memory_type_count.min(vk::MAX_MEMORY_TYPES as u32);
    (0..count)
        .find(|&i| {
            type_filter & (1 << i) != 0
                && memory_properties.memory_types[i as usize]
                    .property_flags
                    .contains(required)
        })
        .ok_or(VulkanError::NoSuitableMemoryType)
}

/// Allocate one block sized for `requirements`
pub fn allocate_memory(
    device: &Device,
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    requirements: vk::MemoryRequirements,
    location: MemoryLocation,
) -> VulkanResult<vk::DeviceMemory> {
    let memory_type_index = find_memory_type(
        memory_properties,
        requirements.memory_type_bits,
        location.required_flags(),
    )?;

    let alloc_info = vk::MemoryAllocateInfo::builder()
        .allocation_size(requirements.size)
        .memory_type_index(memory_type_index);

    unsafe {
        device.allocate_memory(&alloc_info, None)
            .map_err(VulkanError::Api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties {
            memory_type_count: types.len() as u32,
            ..Default::default()
        };
        for (slot, flags) in props.memory_types.iter_mut().zip(types) {
            slot.property_flags = *flags;
        }
        props
    }

    #[test]
    fn test_first_matching_type_wins() {
        let props = properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
            vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT
                | vk::MemoryPropertyFlags::HOST_CACHED,
        ]);
        let flags = MemoryLocation::HostVisible.required_flags();
        assert_eq!(find_memory_type(&props, 0b111, flags).unwrap(), 1);
        assert_eq!(find_memory_type(&props, 0b100, flags).unwrap(), 2);
    }

    #[test]
    fn test_filter_excludes_types() {
        let props = properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL, vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let flags = MemoryLocation::DeviceLocal.required_flags();
        assert_eq!(find_memory_type(&props, 0b10, flags).unwrap(), 1);
    }

    #[test]
    fn test_no_match_is_an_error() {
        let props = properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        let result = find_memory_type(&props, 0b1, MemoryLocation::HostVisible.required_flags());
        assert!(matches!(result, Err(VulkanError::NoSuitableMemoryType)));

        let result = find_memory_type(&props, 0, MemoryLocation::DeviceLocal.required_flags());
        assert!(matches!(result, Err(VulkanError::NoSuitableMemoryType)));
    }

    #[test]
    fn test_types_past_count_ignored() {
        let mut props = properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        props.memory_types[1].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let result = find_memory_type(&props, 0b11, MemoryLocation::HostVisible.required_flags());
        assert!(result.is_err());
    }
}
