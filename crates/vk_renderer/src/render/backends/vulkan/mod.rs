//! Vulkan backend implementation
//!
//! Organized into initialization, resources, rendering and state modules,
//! tied together by [`VulkanRenderer`].

/// Vulkan initialization types (context, surface, window)
pub mod initialization;

/// Vulkan resource management (buffers, textures, descriptors)
pub mod resources;

/// Vulkan rendering operations (shaders, pipelines, render passes, commands)
pub mod rendering;

/// Vulkan state management (swapchain, synchronization, frame loop)
pub mod state;

/// Main Vulkan renderer implementation
pub mod renderer;

// Re-export main renderer
pub use renderer::{FrameOutcome, VulkanRenderer};

// Re-export core initialization types
pub use initialization::context::{VulkanContext, VulkanError, VulkanResult, PhysicalDeviceInfo};
pub use initialization::surface::Surface;
pub use initialization::window::Window;

// Re-export resource types
pub use resources::buffer::Buffer;
pub use resources::texture::Texture;
pub use resources::uniform_buffer::UniformBuffer;
pub use resources::descriptor_set::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder};
pub use resources::resource_manager::ResourceManager;

// Re-export rendering types
pub use rendering::shader::{GraphicsPipeline, PipelineSettings, ShaderModule};
pub use rendering::render_pass::{RenderPass, RenderTargetLayout};
pub use rendering::commands::{ActiveRenderPass, CommandPool, CommandRecorder};
pub use rendering::command_recorder::{FrameDraw, FrameRecorder};
pub use rendering::vertex_layout::VulkanVertexLayout;

// Re-export state types
pub use state::framebuffer::Framebuffer;
pub use state::swapchain::Swapchain;
pub use state::sync::{Fence, Semaphore, FrameSync};
pub use state::swapchain_manager::SwapchainManager;
pub use state::sync_manager::SyncManager;
pub use state::frame_state::{FrameCounter, FramePhase, InFlightTracker};
