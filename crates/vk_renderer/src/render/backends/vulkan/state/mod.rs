// Vulkan state management

pub mod framebuffer;
pub mod swapchain;
pub mod sync;
pub mod swapchain_manager;
pub mod sync_manager;
pub mod frame_state;

pub use framebuffer::*;
pub use swapchain::*;
pub use sync::*;
pub use swapchain_manager::*;
pub use sync_manager::*;
pub use frame_state::*;
