//! Synchronization management for the Vulkan renderer
//!
//! Image-available semaphores and in-flight fences belong to frame slots.
//! Render-finished semaphores belong to swapchain images: presentation of
//! image `n` may still be waiting on its semaphore when the slot comes round
//! again, so they cannot be keyed by slot.

use ash::Device;

use crate::render::backends::vulkan::VulkanResult;
use super::sync::{FrameSync, Semaphore};

/// Owns every semaphore and fence used by the frame loop
pub struct SyncManager {
    device: Device,
    frames: Vec<FrameSync>,
    render_finished: Vec<Semaphore>,
}

impl SyncManager {
    /// Create `frames_in_flight` slots and one render-finished semaphore per image
    pub fn new(device: Device, frames_in_flight: usize, image_count: usize) -> VulkanResult<Self> {
        log::debug!(
            "Creating SyncManager ({} frame slots, {} swapchain images)",
            frames_in_flight,
            image_count
        );

        let frames = (0..frames_in_flight)
            .map(|_| FrameSync::new(device.clone()))
            .collect::<VulkanResult<Vec<_>>>()?;
        let render_finished = Self::create_semaphores(&device, image_count)?;

        Ok(Self {
            device,
            frames,
            render_finished,
        })
    }

    fn create_semaphores(device: &Device, count: usize) -> VulkanResult<Vec<Semaphore>> {
        (0..count).map(|_| Semaphore::new(device.clone())).collect()
    }

    /// Synchronization of frame slot `slot`
    pub fn frame(&self, slot: usize) -> &FrameSync {
        &self.frames[slot % self.frames.len()]
    }

    /// Semaphore signaled when rendering into image `image_index` is done
    pub fn render_finished(&self, image_index: usize) -> &Semaphore {
        &self.render_finished[image_index]
    }

    /// Resize the per-image semaphores after swapchain recreation
    ///
    /// The device must be idle.
    pub fn recreate_image_semaphores(&mut self, image_count: usize) -> VulkanResult<()> {
        self.render_finished.clear();
        self.render_finished = Self::create_semaphores(&self.device, image_count)?;
        Ok(())
    }
}
