//! # Rendering System
//!
//! Backend-agnostic data (vertices, meshes, the feature set) plus the Vulkan
//! backend that draws it.
//!
//! ## Architecture
//!
//! - **Mesh**: deduplicated vertex/index data built once from a loaded model
//! - **Uniforms**: the per-frame transform payload
//! - **Vulkan Backend**: device, swapchain, pipeline, resources and the frame loop

pub mod mesh;
pub mod uniforms;

/// Graphics backend implementations
pub mod backends;

pub use backends::vulkan::initialization::window;
pub use mesh::{MeshData, Vertex};
pub use uniforms::UniformBufferObject;

bitflags::bitflags! {
    /// Optional pipeline stages layered on top of the base color pass
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RenderFeatures: u32 {
        /// Depth attachment, depth test and depth writes
        const DEPTH = 1 << 0;
        /// Sampled texture bound at binding 1
        const TEXTURE = 1 << 1;
        /// Blit-generated mip chain for the texture
        const MIPMAPS = 1 << 2;
        /// Multisampled color target resolved into the swapchain image
        const MSAA = 1 << 3;
    }
}
