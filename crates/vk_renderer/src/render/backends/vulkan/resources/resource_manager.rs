//! Resource management for the Vulkan renderer
//!
//! Owns everything the draw call reads: the geometry buffers, the optional
//! texture, one uniform buffer per frame slot and the descriptor sets that
//! point at them.

use ash::vk;

use crate::assets::{AssetError, ImageData, ObjLoader};
use crate::core::config::AssetConfig;
use crate::render::backends::vulkan::{VulkanContext, VulkanError, VulkanResult};
use crate::render::{MeshData, RenderFeatures, UniformBufferObject};
use super::buffer::Buffer;
use super::descriptor_set::{
    DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder, DescriptorSetWriter, SAMPLER_BINDING,
    UBO_BINDING,
};
use super::texture::{Texture, TEXTURE_FORMAT};
use super::uniform_buffer::UniformBuffer;
use super::upload::UploadContext;

/// Texel sampled when no texture file is configured
pub const FALLBACK_TEXEL: [u8; 4] = [255, 255, 255, 255];

/// Load the configured model, or the built-in quads when none is set
pub fn load_mesh(assets: &AssetConfig) -> VulkanResult<MeshData> {
    match &assets.model_path {
        Some(path) => {
            let raw = ObjLoader::load_obj(path).map_err(AssetError::from)?;
            let mesh = MeshData::from_raw(&raw);
            log::info!(
                "Loaded {}: {} triangles, {} unique vertices",
                path,
                raw.triangle_count(),
                mesh.vertices.len()
            );
            Ok(mesh)
        }
        None => Ok(MeshData::demo_quads()),
    }
}

/// Decode the configured texture, or a single white texel when none is set
pub fn load_texture_data(assets: &AssetConfig) -> VulkanResult<ImageData> {
    match &assets.texture_path {
        Some(path) => {
            let image = ImageData::from_file(path)?;
            log::info!("Loaded texture {} ({}x{})", path, image.width, image.height);
            Ok(image)
        }
        None => Ok(ImageData::solid_color(1, 1, FALLBACK_TEXEL)),
    }
}

/// Manages GPU resources referenced by the frame's draw call
pub struct ResourceManager {
    descriptor_sets: Vec<vk::DescriptorSet>,
    _descriptor_pool: DescriptorPool,
    descriptor_set_layout: DescriptorSetLayout,
    uniform_buffers: Vec<UniformBuffer<UniformBufferObject>>,
    _texture: Option<Texture>,
    index_count: u32,
    index_buffer: Buffer,
    vertex_buffer: Buffer,
    upload: UploadContext,
}

impl ResourceManager {
    /// Upload the mesh and texture and build the per-frame bindings
    ///
    /// `texture` is only used when [`RenderFeatures::TEXTURE`] is set.
    pub fn new(
        context: &VulkanContext,
        mesh: &MeshData,
        texture: Option<&ImageData>,
        features: RenderFeatures,
        frames_in_flight: usize,
    ) -> VulkanResult<Self> {
        log::debug!("Creating ResourceManager...");

        if mesh.indices.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "Mesh has no indices".to_string(),
            });
        }

        let device = context.raw_device();
        let families = context.device();
        let upload = UploadContext::new(
            device.clone(),
            families.graphics_family,
            context.graphics_queue(),
            *context.memory_properties(),
        )?;

        let vertex_buffer = upload.upload_buffer(mesh.vertex_bytes(), vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let index_buffer = upload.upload_buffer(mesh.index_bytes(), vk::BufferUsageFlags::INDEX_BUFFER)?;
        log::debug!(
            "Uploaded {} vertices and {} indices",
            mesh.vertices.len(),
            mesh.indices.len()
        );

        let textured = features.contains(RenderFeatures::TEXTURE);
        let texture = match (textured, texture) {
            (true, Some(image_data)) => Some(Self::create_texture(context, &upload, image_data, features)?),
            (true, None) => {
                let white = ImageData::solid_color(1, 1, FALLBACK_TEXEL);
                Some(Self::create_texture(context, &upload, &white, features)?)
            }
            (false, _) => None,
        };

        let uniform_buffers = (0..frames_in_flight)
            .map(|_| UniformBuffer::new(device.clone(), context.memory_properties()))
            .collect::<VulkanResult<Vec<_>>>()?;

        let descriptor_set_layout = DescriptorSetLayoutBuilder::for_frame(textured).build(&device)?;
        let descriptor_pool = DescriptorPool::for_frames(device.clone(), frames_in_flight as u32, textured)?;
        let layouts = vec![descriptor_set_layout.handle(); frames_in_flight];
        let descriptor_sets = descriptor_pool.allocate_descriptor_sets(&layouts)?;

        let mut writer = DescriptorSetWriter::new();
        for (set, uniform_buffer) in descriptor_sets.iter().zip(&uniform_buffers) {
            writer = writer.write_buffer(
                *set,
                UBO_BINDING,
                uniform_buffer.handle(),
                UniformBuffer::<UniformBufferObject>::size(),
            );
            if let Some(texture) = &texture {
                writer = writer.write_image(*set, SAMPLER_BINDING, texture.image_view(), texture.sampler());
            }
        }
        writer.update(&device);

        Ok(Self {
            descriptor_sets,
            _descriptor_pool: descriptor_pool,
            descriptor_set_layout,
            uniform_buffers,
            _texture: texture,
            index_count: mesh.index_count(),
            index_buffer,
            vertex_buffer,
            upload,
        })
    }

    fn create_texture(
        context: &VulkanContext,
        upload: &UploadContext,
        image_data: &ImageData,
        features: RenderFeatures,
    ) -> VulkanResult<Texture> {
        let max_anisotropy = (context.physical_device().features.sampler_anisotropy == vk::TRUE)
            .then(|| context.limits().max_sampler_anisotropy);

        Texture::from_image_data(
            upload,
            image_data,
            features.contains(RenderFeatures::MIPMAPS),
            &context.format_properties(TEXTURE_FORMAT),
            max_anisotropy,
        )
    }

    /// Write this frame's transforms into slot `frame`'s uniform buffer
    pub fn update_uniform_buffer(&mut self, frame: usize, ubo: &UniformBufferObject) -> VulkanResult<()> {
        let count = self.uniform_buffers.len();
        let buffer = self.uniform_buffers.get_mut(frame).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("Frame slot {} out of range ({} slots)", frame, count),
        })?;
        buffer.update(ubo);
        Ok(())
    }

    /// Descriptor set bound for slot `frame`
    pub fn descriptor_set(&self, frame: usize) -> vk::DescriptorSet {
        self.descriptor_sets[frame % self.descriptor_sets.len()]
    }

    /// Layout shared by every frame's set
    pub fn descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        self.descriptor_set_layout.handle()
    }

    /// Vertex buffer handle
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    /// Index buffer handle (`u32` indices)
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    /// Number of indices to draw
    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Staging context, reused for swapchain-sized images
    pub fn upload_context(&self) -> &UploadContext {
        &self.upload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_assets() {
        let assets = AssetConfig::builtin();
        let mesh = load_mesh(&assets).unwrap();
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.index_count(), 12);

        let texel = load_texture_data(&assets).unwrap();
        assert_eq!((texel.width, texel.height), (1, 1));
        assert_eq!(texel.data, FALLBACK_TEXEL.to_vec());
    }

    #[test]
    fn test_missing_model_is_an_asset_error() {
        let assets = AssetConfig::builtin().with_model("definitely/not/here.obj");
        assert!(matches!(load_mesh(&assets), Err(VulkanError::Asset(_))));
    }

    #[test]
    fn test_missing_texture_is_an_asset_error() {
        let assets = AssetConfig::builtin().with_texture("definitely/not/here.png");
        assert!(matches!(load_texture_data(&assets), Err(VulkanError::Asset(_))));
    }
}
