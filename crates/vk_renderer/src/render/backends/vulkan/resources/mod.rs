//! Vulkan resource management
//!
//! Contains types for managing GPU resources: memory, buffers, images,
//! textures, uniform buffers and descriptors.

/// Memory type resolution and allocation
pub mod memory;

/// Buffers with dedicated memory
pub mod buffer;

/// Images, views and format negotiation
pub mod image;

/// Image layout transition barriers
pub mod layout_transition;

/// Blit-based mip chain generation
pub mod mipmap;

/// Staging uploads through one-off command buffers
pub mod upload;

/// Sampled textures
pub mod texture;

/// Uniform buffer objects (UBOs) for shader data
pub mod uniform_buffer;

/// Descriptor set management
pub mod descriptor_set;

/// High-level resource manager
pub mod resource_manager;

pub use buffer::Buffer;
pub use image::{Image, ImageDesc};
pub use memory::MemoryLocation;
pub use texture::Texture;
pub use uniform_buffer::UniformBuffer;
pub use descriptor_set::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter};
pub use resource_manager::ResourceManager;
pub use upload::UploadContext;
