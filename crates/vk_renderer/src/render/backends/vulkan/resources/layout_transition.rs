//! Image layout transitions
//!
//! Only the three transitions the renderer performs are known; anything else
//! is rejected before a barrier is recorded.

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use super::image::depth_aspect;

/// Access masks and stages of one layout transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionBarrier {
    /// Writes that must be made available
    pub src_access: vk::AccessFlags,
    /// Accesses that must wait
    pub dst_access: vk::AccessFlags,
    /// Stage that produced the data
    pub src_stage: vk::PipelineStageFlags,
    /// Stage that consumes it
    pub dst_stage: vk::PipelineStageFlags,
}

/// Look up the barrier for `old -> new`
pub fn transition_barrier(old: vk::ImageLayout, new: vk::ImageLayout) -> VulkanResult<TransitionBarrier> {
    use vk::ImageLayout as L;

    let barrier = match (old, new) {
        (L::UNDEFINED, L::TRANSFER_DST_OPTIMAL) => TransitionBarrier {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::TRANSFER_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::TRANSFER,
        },
        (L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL) => TransitionBarrier {
            src_access: vk::AccessFlags::TRANSFER_WRITE,
            dst_access: vk::AccessFlags::SHADER_READ,
            src_stage: vk::PipelineStageFlags::TRANSFER,
            dst_stage: vk::PipelineStageFlags::FRAGMENT_SHADER,
        },
        (L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL) => TransitionBarrier {
            src_access: vk::AccessFlags::empty(),
            dst_access: vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
            src_stage: vk::PipelineStageFlags::TOP_OF_PIPE,
            dst_stage: vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS,
        },
        _ => return Err(VulkanError::UnsupportedLayoutTransition { old, new }),
    };

    Ok(barrier)
}

/// Aspect mask a transition into `new` applies to
pub fn transition_aspect(format: vk::Format, new: vk::ImageLayout) -> vk::ImageAspectFlags {
    if new == vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL {
        depth_aspect(format)
    } else {
        vk::ImageAspectFlags::COLOR
    }
}

/// Record the barrier moving every mip level of `image` from `old` to `new`
pub fn record_layout_transition(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    format: vk::Format,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
    mip_levels: u32,
) -> VulkanResult<()> {
    let transition = transition_barrier(old, new)?;

    let barrier = vk::ImageMemoryBarrier::builder()
        .old_layout(old)
        .new_layout(new)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: transition_aspect(format, new),
            base_mip_level: 0,
            level_count: mip_levels,
            base_array_layer: 0,
            layer_count: 1,
        })
        .src_access_mask(transition.src_access)
        .dst_access_mask(transition.dst_access);

    unsafe {
        device.cmd_pipeline_barrier(
            command_buffer,
            transition.src_stage,
            transition.dst_stage,
            vk::DependencyFlags::empty(),
            &[],
            &[],
            &[barrier.build()],
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vk::ImageLayout as L;

    #[test]
    fn test_upload_transition() {
        let barrier = transition_barrier(L::UNDEFINED, L::TRANSFER_DST_OPTIMAL).unwrap();
        assert_eq!(barrier.src_access, vk::AccessFlags::empty());
        assert_eq!(barrier.dst_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(barrier.src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(barrier.dst_stage, vk::PipelineStageFlags::TRANSFER);
    }

    #[test]
    fn test_sampling_transition() {
        let barrier = transition_barrier(L::TRANSFER_DST_OPTIMAL, L::SHADER_READ_ONLY_OPTIMAL).unwrap();
        assert_eq!(barrier.src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(barrier.dst_access, vk::AccessFlags::SHADER_READ);
        assert_eq!(barrier.src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(barrier.dst_stage, vk::PipelineStageFlags::FRAGMENT_SHADER);
    }

    #[test]
    fn test_depth_transition() {
        let barrier = transition_barrier(L::UNDEFINED, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL).unwrap();
        assert!(barrier.dst_access.contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ));
        assert!(barrier.dst_access.contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
        assert_eq!(barrier.dst_stage, vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS);
    }

    #[test]
    fn test_unlisted_pairs_rejected() {
        for (old, new) in [
            (L::SHADER_READ_ONLY_OPTIMAL, L::TRANSFER_DST_OPTIMAL),
            (L::UNDEFINED, L::SHADER_READ_ONLY_OPTIMAL),
            (L::TRANSFER_DST_OPTIMAL, L::TRANSFER_DST_OPTIMAL),
            (L::UNDEFINED, L::PRESENT_SRC_KHR),
        ] {
            let result = transition_barrier(old, new);
            assert!(matches!(
                result,
                Err(VulkanError::UnsupportedLayoutTransition { old: o, new: n }) if o == old && n == new
            ));
        }
    }

    #[test]
    fn test_depth_aspect_includes_stencil_when_present() {
        assert_eq!(
            transition_aspect(vk::Format::D32_SFLOAT, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            vk::ImageAspectFlags::DEPTH
        );
        assert_eq!(
            transition_aspect(vk::Format::D24_UNORM_S8_UINT, L::DEPTH_STENCIL_ATTACHMENT_OPTIMAL),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(
            transition_aspect(vk::Format::R8G8B8A8_SRGB, L::TRANSFER_DST_OPTIMAL),
            vk::ImageAspectFlags::COLOR
        );
    }
}
