//! Vulkan initialization: window, instance, surface and device selection

pub mod context;
pub mod device_selection;
pub mod surface;
pub mod window;

pub use context::*;
pub use device_selection::{DeviceCandidate, DeviceRequirements, QueueFamilyIndices};
pub use surface::*;
pub use window::*;
