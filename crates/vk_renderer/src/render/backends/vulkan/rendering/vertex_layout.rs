//! Vulkan-specific vertex layout definitions
//!
//! Keeps the vertex input description next to the pipeline so the mesh types
//! stay backend-agnostic.

use ash::vk;

use crate::render::Vertex;

/// Field layout of a vertex record, one entry per shader input location
pub trait VertexAttributes {
    /// `(format, byte offset)` for locations `0..n`
    const ATTRIBUTES: &'static [(vk::Format, u32)];
}

impl VertexAttributes for Vertex {
    const ATTRIBUTES: &'static [(vk::Format, u32)] = &[
        (vk::Format::R32G32B32_SFLOAT, std::mem::offset_of!(Vertex, position) as u32),
        (vk::Format::R32G32B32_SFLOAT, std::mem::offset_of!(Vertex, color) as u32),
        (vk::Format::R32G32_SFLOAT, std::mem::offset_of!(Vertex, tex_coord) as u32),
    ];
}

/// Vulkan vertex layout for a vertex record
pub struct VulkanVertexLayout;

impl VulkanVertexLayout {
    /// Binding 0, advancing per vertex with stride `size_of::<V>()`
    pub fn binding_description<V>() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<V>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// One attribute per field of `V`
    pub fn attribute_descriptions<V: VertexAttributes>() -> Vec<vk::VertexInputAttributeDescription> {
        V::ATTRIBUTES
            .iter()
            .enumerate()
            .map(|(location, &(format, offset))| vk::VertexInputAttributeDescription {
                binding: 0,
                location: location as u32,
                format,
                offset,
            })
            .collect()
    }

    /// Binding and attributes together, as the pipeline consumes them
    pub fn for_vertex<V: VertexAttributes>() -> (vk::VertexInputBindingDescription, Vec<vk::VertexInputAttributeDescription>) {
        (Self::binding_description::<V>(), Self::attribute_descriptions::<V>())
    }
}
