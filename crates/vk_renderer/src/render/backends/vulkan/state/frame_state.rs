//! Frame loop bookkeeping
//!
//! Frame slot rotation, the in-flight bound and the split between recoverable
//! and fatal results of acquire and present.

use std::fmt;

use ash::vk;

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Where the frame loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    /// Between frames
    Idle,
    /// Waiting for the slot fence and the next image
    Acquiring,
    /// Recording the slot's command buffer
    Recording,
    /// Draw submitted to the graphics queue
    Submitted,
    /// Image handed to the presentation engine
    Presenting,
    /// Swapchain no longer matches the surface
    SwapchainStale,
}

impl fmt::Display for FramePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Recording => "recording",
            Self::Submitted => "submitted",
            Self::Presenting => "presenting",
            Self::SwapchainStale => "swapchain stale",
        };
        f.write_str(name)
    }
}

/// Result of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// Render into `image_index`; a suboptimal swapchain is still usable
    Ready {
        /// Acquired image
        image_index: u32,
        /// Driver reported the swapchain as suboptimal
        suboptimal: bool,
    },
    /// Recreate the swapchain and abandon this frame
    Stale,
}

/// Sort `vkAcquireNextImageKHR` results into usable, stale and fatal
pub fn classify_acquire(result: Result<(u32, bool), vk::Result>) -> VulkanResult<AcquireOutcome> {
    match result {
        Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Ready { image_index, suboptimal }),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::Stale),
        Err(vk::Result::ERROR_DEVICE_LOST) => Err(VulkanError::DeviceLost),
        Err(e) => Err(VulkanError::SwapchainAcquire(e)),
    }
}

/// Result of presenting an image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented and the swapchain still matches the surface
    Presented,
    /// Presented or not, the swapchain must be recreated
    Stale,
}

/// Sort `vkQueuePresentKHR` results; a pending resize also forces recreation
pub fn classify_present(result: Result<bool, vk::Result>, resize_requested: bool) -> VulkanResult<PresentOutcome> {
    match result {
        Ok(suboptimal) if suboptimal || resize_requested => Ok(PresentOutcome::Stale),
        Ok(_) => Ok(PresentOutcome::Presented),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Stale),
        Err(vk::Result::ERROR_DEVICE_LOST) => Err(VulkanError::DeviceLost),
        Err(e) => Err(VulkanError::Present(e)),
    }
}

/// Monotonic frame counter mapped onto `frames_in_flight` slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCounter {
    frames_in_flight: usize,
    count: u64,
}

impl FrameCounter {
    /// Counter starting at slot 0
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            frames_in_flight: frames_in_flight.max(1),
            count: 0,
        }
    }

    /// Slot of the current frame: `count mod frames_in_flight`
    pub fn slot(&self) -> usize {
        (self.count % self.frames_in_flight as u64) as usize
    }

    /// Frames presented or abandoned after submission so far
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Move to the next frame
    pub fn advance(&mut self) {
        self.count += 1;
    }
}

/// Tracks which slot fences are unsignaled from the CPU's point of view
///
/// A slot becomes pending at submit and clears once its fence wait returns.
/// Submitting to a slot that is still pending, or exceeding the slot count, is
/// a loop bug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlightTracker {
    pending: Vec<bool>,
}

impl InFlightTracker {
    /// No frame in flight
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            pending: vec![false; frames_in_flight.max(1)],
        }
    }

    /// Slot `slot`'s fence wait returned
    pub fn complete(&mut self, slot: usize) {
        if let Some(pending) = self.pending.get_mut(slot) {
            *pending = false;
        }
    }

    /// Slot `slot` was submitted; its fence is now unsignaled
    pub fn submit(&mut self, slot: usize) -> VulkanResult<()> {
        let limit = self.limit();
        let pending = self.pending.get_mut(slot).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("Frame slot {} out of range ({} slots)", slot, limit),
        })?;
        if *pending {
            return Err(VulkanError::InvalidOperation {
                reason: format!("Frame slot {} submitted before its fence was waited on", slot),
            });
        }
        *pending = true;
        Ok(())
    }

    /// Frames currently in flight
    pub fn in_flight(&self) -> usize {
        self.pending.iter().filter(|&&pending| pending).count()
    }

    /// Upper bound on [`Self::in_flight`]
    pub fn limit(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_classification() {
        assert_eq!(
            classify_acquire(Ok((2, false))).unwrap(),
            AcquireOutcome::Ready { image_index: 2, suboptimal: false }
        );
        assert_eq!(
            classify_acquire(Ok((0, true))).unwrap(),
            AcquireOutcome::Ready { image_index: 0, suboptimal: true }
        );
        assert_eq!(classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(), AcquireOutcome::Stale);
        assert!(matches!(
            classify_acquire(Err(vk::Result::ERROR_SURFACE_LOST_KHR)),
            Err(VulkanError::SwapchainAcquire(vk::Result::ERROR_SURFACE_LOST_KHR))
        ));
        assert!(matches!(
            classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)),
            Err(VulkanError::DeviceLost)
        ));
    }

    #[test]
    fn test_present_classification() {
        assert_eq!(classify_present(Ok(false), false).unwrap(), PresentOutcome::Presented);
        assert_eq!(classify_present(Ok(true), false).unwrap(), PresentOutcome::Stale);
        assert_eq!(classify_present(Ok(false), true).unwrap(), PresentOutcome::Stale);
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR), false).unwrap(),
            PresentOutcome::Stale
        );
        assert!(matches!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY), true),
            Err(VulkanError::Present(vk::Result::ERROR_OUT_OF_HOST_MEMORY))
        ));
        assert!(matches!(
            classify_present(Err(vk::Result::ERROR_DEVICE_LOST), false),
            Err(VulkanError::DeviceLost)
        ));
    }

    #[test]
    fn test_slots_rotate() {
        let mut counter = FrameCounter::new(2);
        let slots: Vec<usize> = (0..5)
            .map(|_| {
                let slot = counter.slot();
                counter.advance();
                slot
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 0, 1, 0]);
        assert_eq!(counter.count(), 5);
    }

    #[test]
    fn test_in_flight_never_exceeds_slot_count() {
        const FRAMES: usize = 2;
        let mut counter = FrameCounter::new(FRAMES);
        let mut tracker = InFlightTracker::new(FRAMES);

        for _ in 0..100 {
            let slot = counter.slot();
            tracker.complete(slot);
            tracker.submit(slot).unwrap();
            assert!(tracker.in_flight() <= tracker.limit());
            counter.advance();
        }
        assert_eq!(tracker.limit(), FRAMES);
        assert_eq!(tracker.in_flight(), FRAMES);
    }

    #[test]
    fn test_resubmitting_pending_slot_is_rejected() {
        let mut tracker = InFlightTracker::new(2);
        assert_eq!(InFlightTracker::new(0).limit(), 1);
        tracker.submit(0).unwrap();
        assert!(tracker.submit(0).is_err());
        assert!(tracker.submit(5).is_err());
        tracker.complete(0);
        assert!(tracker.submit(0).is_ok());
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(FramePhase::SwapchainStale.to_string(), "swapchain stale");
        assert_eq!(FramePhase::Idle.to_string(), "idle");
    }
}
