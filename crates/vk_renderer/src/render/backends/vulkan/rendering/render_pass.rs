//! Render pass management
//!
//! [`RenderTargetLayout`] decides which attachments exist and in which order;
//! [`RenderPass`] and the framebuffers are built from it so the two can never
//! disagree.

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};

/// Attachment plan of the single-subpass forward pass
///
/// Single sample: `[color, depth?]`, where color is the swapchain image.
/// Multisampled: `[msaa color, depth?, resolve]`, where resolve is the
/// swapchain image.
#[derive(Debug, Clone)]
pub struct RenderTargetLayout {
    /// Attachment descriptions in framebuffer order
    pub attachments: Vec<vk::AttachmentDescription>,
    /// Index of the attachment the subpass renders color into
    pub color_index: u32,
    /// Index of the depth attachment, if any
    pub depth_index: Option<u32>,
    /// Index of the single-sample resolve target, if multisampled
    pub resolve_index: Option<u32>,
    /// Samples per pixel of the color and depth attachments
    pub samples: vk::SampleCountFlags,
}

impl RenderTargetLayout {
    /// Plan attachments for the swapchain format, an optional depth format and
    /// a sample count
    pub fn new(color_format: vk::Format, depth_format: Option<vk::Format>, samples: vk::SampleCountFlags) -> Self {
        let multisampled = samples != vk::SampleCountFlags::TYPE_1;

        let color = vk::AttachmentDescription::builder()
            .format(color_format)
            .samples(samples)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(if multisampled {
                vk::AttachmentStoreOp::DONT_CARE
            } else {
                vk::AttachmentStoreOp::STORE
            })
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(if multisampled {
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
            } else {
                vk::ImageLayout::PRESENT_SRC_KHR
            })
            .build();

        let mut attachments = vec![color];

        let depth_index = depth_format.map(|format| {
            attachments.push(
                vk::AttachmentDescription::builder()
                    .format(format)
                    .samples(samples)
                    .load_op(vk::AttachmentLoadOp::CLEAR)
                    .store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
                    .build(),
            );
            attachments.len() as u32 - 1
        });

        let resolve_index = multisampled.then(|| {
            attachments.push(
                vk::AttachmentDescription::builder()
                    .format(color_format)
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                    .build(),
            );
            attachments.len() as u32 - 1
        });

        Self {
            attachments,
            color_index: 0,
            depth_index,
            resolve_index,
            samples,
        }
    }

    /// Whether a depth attachment is part of the pass
    pub fn has_depth(&self) -> bool {
        self.depth_index.is_some()
    }

    /// Whether color is rendered into a transient multisampled target
    pub fn is_multisampled(&self) -> bool {
        self.resolve_index.is_some()
    }

    /// External-to-subpass dependency guarding the attachments
    pub fn dependency(&self) -> vk::SubpassDependency {
        let mut dst_access = vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
        if self.has_depth() {
            dst_access |= vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE;
        }
        let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;

        vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(stages)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(stages)
            .dst_access_mask(dst_access)
            .build()
    }

    /// Order image views the way the attachments were declared
    ///
    /// `color_target` is the multisampled view and is required exactly when
    /// the layout is multisampled; `depth` likewise follows [`Self::has_depth`].
    pub fn framebuffer_attachments(
        &self,
        swapchain_view: vk::ImageView,
        color_target: Option<vk::ImageView>,
        depth: Option<vk::ImageView>,
    ) -> VulkanResult<Vec<vk::ImageView>> {
        if color_target.is_some() != self.is_multisampled() || depth.is_some() != self.has_depth() {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "Framebuffer views do not match render pass (multisampled: {}, depth: {})",
                    self.is_multisampled(),
                    self.has_depth()
                ),
            });
        }

        let mut views = Vec::with_capacity(self.attachments.len());
        views.push(color_target.unwrap_or(swapchain_view));
        views.extend(depth);
        if self.is_multisampled() {
            views.push(swapchain_view);
        }
        Ok(views)
    }
}

/// Render pass wrapper with RAII cleanup
pub struct RenderPass {
    device: Device,
    render_pass: vk::RenderPass,
    layout: RenderTargetLayout,
}

impl RenderPass {
    /// Create the pass described by `layout`
    pub fn new(device: Device, layout: RenderTargetLayout) -> VulkanResult<Self> {
        log::debug!(
            "Creating render pass with {} attachments ({:?})",
            layout.attachments.len(),
            layout.samples
        );

        let color_refs = [vk::AttachmentReference {
            attachment: layout.color_index,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let depth_ref = layout.depth_index.map(|attachment| vk::AttachmentReference {
            attachment,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        });
        let resolve_refs: Vec<vk::AttachmentReference> = layout
            .resolve_index
            .map(|attachment| vk::AttachmentReference {
                attachment,
                layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            })
            .into_iter()
            .collect();

        let mut subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs);
        if let Some(depth_ref) = depth_ref.as_ref() {
            subpass = subpass.depth_stencil_attachment(depth_ref);
        }
        if !resolve_refs.is_empty() {
            subpass = subpass.resolve_attachments(&resolve_refs);
        }

        let subpasses = [subpass.build()];
        let dependencies = [layout.dependency()];

        let render_pass_create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&layout.attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        let render_pass = unsafe { device.create_render_pass(&render_pass_create_info, None) }
            .map_err(|e| VulkanError::PipelineCreation(format!("Render pass: {:?}", e)))?;

        Ok(Self {
            device,
            render_pass,
            layout,
        })
    }

    /// Get the render pass handle
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Attachment plan this pass was built from
    pub fn layout(&self) -> &RenderTargetLayout {
        &self.layout
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SWAPCHAIN_FORMAT: vk::Format = vk::Format::B8G8R8A8_SRGB;

    fn view(raw: u64) -> vk::ImageView {
        use ash::vk::Handle;
        vk::ImageView::from_raw(raw)
    }

    #[test]
    fn test_color_only_pass() {
        let layout = RenderTargetLayout::new(SWAPCHAIN_FORMAT, None, vk::SampleCountFlags::TYPE_1);
        assert_eq!(layout.attachments.len(), 1);
        let color = layout.attachments[0];
        assert_eq!(color.format, SWAPCHAIN_FORMAT);
        assert_eq!(color.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(color.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(color.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(color.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert!(!layout.has_depth());
        assert!(!layout.is_multisampled());
        assert_eq!(layout.dependency().dst_access_mask, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
    }

    #[test]
    fn test_depth_attachment() {
        let layout = RenderTargetLayout::new(SWAPCHAIN_FORMAT, Some(vk::Format::D32_SFLOAT), vk::SampleCountFlags::TYPE_1);
        assert_eq!(layout.depth_index, Some(1));
        let depth = layout.attachments[1];
        assert_eq!(depth.format, vk::Format::D32_SFLOAT);
        assert_eq!(depth.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(depth.store_op, vk::AttachmentStoreOp::DONT_CARE);
        assert_eq!(depth.final_layout, vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL);

        let dependency = layout.dependency();
        assert_eq!(dependency.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(dependency.src_access_mask, vk::AccessFlags::empty());
        assert!(dependency.src_stage_mask.contains(vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS));
        assert!(dependency.dst_access_mask.contains(vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE));
    }

    #[test]
    fn test_multisampled_pass_resolves_into_swapchain_image() {
        let layout = RenderTargetLayout::new(SWAPCHAIN_FORMAT, Some(vk::Format::D32_SFLOAT), vk::SampleCountFlags::TYPE_4);
        assert_eq!(layout.attachments.len(), 3);
        assert_eq!(layout.attachments[0].samples, vk::SampleCountFlags::TYPE_4);
        assert_eq!(layout.attachments[0].final_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(layout.attachments[1].samples, vk::SampleCountFlags::TYPE_4);
        assert_eq!(layout.resolve_index, Some(2));
        assert_eq!(layout.attachments[2].samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(layout.attachments[2].final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn test_framebuffer_view_order() {
        let (swapchain, msaa, depth) = (view(1), view(2), view(3));

        let plain = RenderTargetLayout::new(SWAPCHAIN_FORMAT, Some(vk::Format::D32_SFLOAT), vk::SampleCountFlags::TYPE_1);
        assert_eq!(plain.framebuffer_attachments(swapchain, None, Some(depth)).unwrap(), vec![swapchain, depth]);

        let msaa_layout = RenderTargetLayout::new(SWAPCHAIN_FORMAT, Some(vk::Format::D32_SFLOAT), vk::SampleCountFlags::TYPE_2);
        assert_eq!(
            msaa_layout.framebuffer_attachments(swapchain, Some(msaa), Some(depth)).unwrap(),
            vec![msaa, depth, swapchain]
        );

        assert!(plain.framebuffer_attachments(swapchain, Some(msaa), Some(depth)).is_err());
        assert!(plain.framebuffer_attachments(swapchain, None, None).is_err());
    }
}
