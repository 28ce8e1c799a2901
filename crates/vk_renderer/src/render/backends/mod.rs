//! Graphics backend implementations

/// Vulkan backend
pub mod vulkan;
