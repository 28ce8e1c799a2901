//! Mip chain generation by successive linear blits

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// `floor(log2(max(width, height))) + 1`
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    let largest = width.max(height).max(1);
    u32::BITS - largest.leading_zeros()
}

/// One downsampling step: level `dst_level - 1` into `dst_level`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MipBlit {
    /// Level written by the blit
    pub dst_level: u32,
    /// Size of the source level
    pub src_extent: (i32, i32),
    /// Size of the destination level
    pub dst_extent: (i32, i32),
}

/// Blits needed to fill levels `1..mip_levels` from level 0
pub fn mip_blit_plan(width: u32, height: u32, mip_levels: u32) -> Vec<MipBlit> {
    let mut src = (width as i32, height as i32);
    (1..mip_levels)
        .map(|dst_level| {
            let dst = ((src.0 / 2).max(1), (src.1 / 2).max(1));
            let blit = MipBlit { dst_level, src_extent: src, dst_extent: dst };
            src = dst;
            blit
        })
        .collect()
}

/// Fail unless `format` can be blitted with linear filtering
pub fn check_linear_blit(format: vk::Format, properties: &vk::FormatProperties) -> VulkanResult<()> {
    if properties
        .optimal_tiling_features
        .contains(vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR)
    {
        Ok(())
    } else {
        Err(VulkanError::UnsupportedBlitFormat(format))
    }
}

fn level_barrier(
    image: vk::Image,
    level: u32,
    old: vk::ImageLayout,
    new: vk::ImageLayout,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
) -> vk::ImageMemoryBarrier {
    vk::ImageMemoryBarrier::builder()
        .old_layout(old)
        .new_layout(new)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: level,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        })
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .build()
}

fn color_layer(mip_level: u32) -> vk::ImageSubresourceLayers {
    vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Record the whole chain
///
/// Expects every level in `TRANSFER_DST_OPTIMAL` with level 0 filled; leaves
/// every level in `SHADER_READ_ONLY_OPTIMAL`.
pub fn record_mip_chain(
    device: &Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    extent: vk::Extent2D,
    mip_levels: u32,
) {
    let emit = |src_stage: vk::PipelineStageFlags, dst_stage: vk::PipelineStageFlags, barrier: vk::ImageMemoryBarrier| unsafe {
        device.cmd_pipeline_barrier(command_buffer, src_stage, dst_stage, vk::DependencyFlags::empty(), &[], &[], &[barrier]);
    };

    for step in mip_blit_plan(extent.width, extent.height, mip_levels) {
        let src_level = step.dst_level - 1;

        emit(
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::TRANSFER,
            level_barrier(
                image,
                src_level,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::AccessFlags::TRANSFER_WRITE,
                vk::AccessFlags::TRANSFER_READ,
            ),
        );

        let blit = vk::ImageBlit::builder()
            .src_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D { x: step.src_extent.0, y: step.src_extent.1, z: 1 },
            ])
            .src_subresource(color_layer(src_level))
            .dst_offsets([
                vk::Offset3D { x: 0, y: 0, z: 0 },
                vk::Offset3D { x: step.dst_extent.0, y: step.dst_extent.1, z: 1 },
            ])
            .dst_subresource(color_layer(step.dst_level));

        unsafe {
            device.cmd_blit_image(
                command_buffer,
                image,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &[blit.build()],
                vk::Filter::LINEAR,
            );
        }

        emit(
            vk::PipelineStageFlags::TRANSFER,
            vk::PipelineStageFlags::FRAGMENT_SHADER,
            level_barrier(
                image,
                src_level,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                vk::AccessFlags::TRANSFER_READ,
                vk::AccessFlags::SHADER_READ,
            ),
        );
    }

    // The last level was only ever written
    emit(
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::FRAGMENT_SHADER,
        level_barrier(
            image,
            mip_levels.saturating_sub(1),
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            vk::AccessFlags::TRANSFER_WRITE,
            vk::AccessFlags::SHADER_READ,
        ),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_count() {
        assert_eq!(mip_level_count(1024, 1024), 11);
        assert_eq!(mip_level_count(1024, 512), 11);
        assert_eq!(mip_level_count(1000, 300), 10);
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(0, 0), 1);
    }

    #[test]
    fn test_plan_halves_and_clamps() {
        let plan = mip_blit_plan(8, 2, mip_level_count(8, 2));
        assert_eq!(plan.len(), 3);
        assert_eq!(plan[0], MipBlit { dst_level: 1, src_extent: (8, 2), dst_extent: (4, 1) });
        assert_eq!(plan[1], MipBlit { dst_level: 2, src_extent: (4, 1), dst_extent: (2, 1) });
        assert_eq!(plan[2], MipBlit { dst_level: 3, src_extent: (2, 1), dst_extent: (1, 1) });
    }

    #[test]
    fn test_odd_sizes_round_down() {
        let plan = mip_blit_plan(5, 3, mip_level_count(5, 3));
        assert_eq!(plan.iter().map(|b| b.dst_extent).collect::<Vec<_>>(), vec![(2, 1), (1, 1)]);
    }

    #[test]
    fn test_single_level_needs_no_blits() {
        assert!(mip_blit_plan(64, 64, 1).is_empty());
    }

    #[test]
    fn test_linear_filter_support_required() {
        let supported = vk::FormatProperties {
            optimal_tiling_features: vk::FormatFeatureFlags::SAMPLED_IMAGE_FILTER_LINEAR,
            ..Default::default()
        };
        assert!(check_linear_blit(vk::Format::R8G8B8A8_SRGB, &supported).is_ok());

        let unsupported = vk::FormatProperties::default();
        assert!(matches!(
            check_linear_blit(vk::Format::R8G8B8A8_SRGB, &unsupported),
            Err(VulkanError::UnsupportedBlitFormat(vk::Format::R8G8B8A8_SRGB))
        ));
    }
}
