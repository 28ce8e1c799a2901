//! Shader modules and graphics pipeline creation
//!
//! SPIR-V blobs are wrapped into short-lived modules, baked into one graphics
//! pipeline and released. Viewport and scissor stay dynamic so a resize never
//! needs a new pipeline.

use std::ffi::CStr;
use std::io::Cursor;

use ash::{vk, Device};

use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use crate::render::{RenderFeatures, Vertex};
use super::vertex_layout::VulkanVertexLayout;

const ENTRY_POINT: &[u8] = b"main\0";

/// SPIR-V shader module wrapper with automatic resource management
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create shader module from SPIR-V bytecode
    ///
    /// The blob is not validated beyond word alignment; the driver decides
    /// whether it is acceptable.
    pub fn from_bytes(device: &Device, bytes: &[u8]) -> VulkanResult<Self> {
        log::debug!("[SHADER] Creating shader module from {} bytes", bytes.len());

        let code = ash::util::read_spv(&mut Cursor::new(bytes))
            .map_err(|e| VulkanError::PipelineCreation(format!("Invalid SPIR-V: {}", e)))?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);
        let module = unsafe { device.create_shader_module(&create_info, None) }
            .map_err(|e| VulkanError::PipelineCreation(format!("vkCreateShaderModule failed: {:?}", e)))?;

        Ok(Self {
            device: device.clone(),
            module,
        })
    }

    /// Get shader module handle
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Create shader stage create info
    pub fn create_stage_info(&self, stage: vk::ShaderStageFlags, entry_point: &CStr) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(entry_point)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Fixed-function state of the renderer's one pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Samples per pixel in the color target
    pub samples: vk::SampleCountFlags,
    /// Depth test with LESS and depth writes
    pub depth_test: bool,
    /// Triangle winding treated as front facing
    pub front_face: vk::FrontFace,
    /// Faces discarded before rasterization
    pub cull_mode: vk::CullModeFlags,
    /// Standard src-alpha / one-minus-src-alpha blending
    pub alpha_blend: bool,
}

impl PipelineSettings {
    /// Settings for the enabled stages
    pub fn from_features(features: RenderFeatures, samples: vk::SampleCountFlags) -> Self {
        Self {
            samples,
            depth_test: features.contains(RenderFeatures::DEPTH),
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            cull_mode: vk::CullModeFlags::BACK,
            alpha_blend: true,
        }
    }

    /// Blend state of the single color attachment
    pub fn color_blend_attachment(&self) -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::RGBA)
            .blend_enable(self.alpha_blend)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD)
            .build()
    }

    /// Depth state; disabled entirely without a depth attachment
    pub fn depth_stencil_state(&self) -> vk::PipelineDepthStencilStateCreateInfo {
        vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(self.depth_test)
            .depth_write_enable(self.depth_test)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false)
            .build()
    }
}

/// Graphics pipeline wrapper with RAII cleanup
pub struct GraphicsPipeline {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// Build the pipeline for `render_pass` from two SPIR-V blobs
    ///
    /// The shader modules only live for the duration of this call.
    pub fn new(
        device: &Device,
        render_pass: vk::RenderPass,
        vertex_spirv: &[u8],
        fragment_spirv: &[u8],
        settings: &PipelineSettings,
        descriptor_set_layouts: &[vk::DescriptorSetLayout],
    ) -> VulkanResult<Self> {
        log::debug!("Creating graphics pipeline ({:?})", settings);

        let vertex_shader = ShaderModule::from_bytes(device, vertex_spirv)?;
        let fragment_shader = ShaderModule::from_bytes(device, fragment_spirv)?;

        let entry = CStr::from_bytes_with_nul(ENTRY_POINT)
            .map_err(|e| VulkanError::PipelineCreation(e.to_string()))?;
        let shader_stages = [
            vertex_shader.create_stage_info(vk::ShaderStageFlags::VERTEX, entry),
            fragment_shader.create_stage_info(vk::ShaderStageFlags::FRAGMENT, entry),
        ];

        let (binding, attributes) = VulkanVertexLayout::for_vertex::<Vertex>();
        let bindings = [binding];
        let vertex_input_info = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
            .primitive_restart_enable(false);

        // Counts only; the rectangles are set per frame
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder()
            .dynamic_states(&dynamic_states);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(settings.cull_mode)
            .front_face(settings.front_face)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(settings.samples);

        let depth_stencil = settings.depth_stencil_state();

        let color_blend_attachments = [settings.color_blend_attachment()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(descriptor_set_layouts);
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(|e| VulkanError::PipelineCreation(format!("Pipeline layout: {:?}", e)))?;

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input_info)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(layout)
            .render_pass(render_pass)
            .subpass(0);

        let created = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
        };

        let pipeline = match created {
            Ok(pipelines) => pipelines[0],
            Err((_, e)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(VulkanError::PipelineCreation(format!("vkCreateGraphicsPipelines failed: {:?}", e)));
            }
        };

        Ok(Self {
            device: device.clone(),
            pipeline,
            layout,
        })
    }

    /// Get pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_features_single_sample_with_depth() {
        let features = RenderFeatures::DEPTH | RenderFeatures::TEXTURE | RenderFeatures::MIPMAPS;
        let settings = PipelineSettings::from_features(features, vk::SampleCountFlags::TYPE_1);
        assert_eq!(settings.samples, vk::SampleCountFlags::TYPE_1);
        assert!(settings.depth_test);
        assert_eq!(settings.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
        assert_eq!(settings.cull_mode, vk::CullModeFlags::BACK);

        let depth = settings.depth_stencil_state();
        assert_eq!(depth.depth_test_enable, vk::TRUE);
        assert_eq!(depth.depth_write_enable, vk::TRUE);
        assert_eq!(depth.depth_compare_op, vk::CompareOp::LESS);
    }

    #[test]
    fn test_without_depth_stage() {
        let settings = PipelineSettings::from_features(RenderFeatures::empty(), vk::SampleCountFlags::TYPE_1);
        let depth = settings.depth_stencil_state();
        assert_eq!(depth.depth_test_enable, vk::FALSE);
        assert_eq!(depth.depth_write_enable, vk::FALSE);
    }

    #[test]
    fn test_samples_follow_negotiated_count() {
        let settings = PipelineSettings::from_features(RenderFeatures::MSAA, vk::SampleCountFlags::TYPE_8);
        assert_eq!(settings.samples, vk::SampleCountFlags::TYPE_8);
    }

    #[test]
    fn test_alpha_blending() {
        let settings = PipelineSettings::from_features(RenderFeatures::empty(), vk::SampleCountFlags::TYPE_1);
        let blend = settings.color_blend_attachment();
        assert_eq!(blend.blend_enable, vk::TRUE);
        assert_eq!(blend.src_color_blend_factor, vk::BlendFactor::SRC_ALPHA);
        assert_eq!(blend.dst_color_blend_factor, vk::BlendFactor::ONE_MINUS_SRC_ALPHA);
        assert_eq!(blend.color_write_mask, vk::ColorComponentFlags::RGBA);
    }
}
