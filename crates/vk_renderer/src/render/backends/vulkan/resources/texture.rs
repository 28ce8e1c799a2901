//! Vulkan texture management
//!
//! A sampled RGBA texture: image, view and sampler, with an optional mip chain
//! generated on the GPU.

use ash::{vk, Device};

use crate::assets::ImageData;
use crate::render::backends::vulkan::{VulkanError, VulkanResult};
use super::image::{Image, ImageDesc};
use super::mipmap::{check_linear_blit, mip_level_count, record_mip_chain};
use super::upload::UploadContext;

/// Format of every texture the renderer samples
pub const TEXTURE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;

/// Sampler parameters derived from the texture and the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerSettings {
    /// Anisotropy level; `None` disables anisotropic filtering
    pub max_anisotropy: Option<f32>,
    /// Highest level of detail that may be selected
    pub max_lod: f32,
}

impl SamplerSettings {
    /// Settings for a texture with `mip_levels` levels
    pub fn new(mip_levels: u32, max_anisotropy: Option<f32>) -> Self {
        Self {
            max_anisotropy,
            max_lod: mip_levels as f32,
        }
    }

    /// Linear filtering, repeat addressing, opaque black border
    pub fn create_info(&self) -> vk::SamplerCreateInfo {
        vk::SamplerCreateInfo::builder()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(self.max_anisotropy.is_some())
            .max_anisotropy(self.max_anisotropy.unwrap_or(1.0))
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .min_lod(0.0)
            .max_lod(self.max_lod)
            .mip_lod_bias(0.0)
            .build()
    }
}

/// Sampled texture with image, image view, and sampler
pub struct Texture {
    device: Device,
    image_view: vk::ImageView,
    sampler: vk::Sampler,
    image: Image,
}

impl Texture {
    /// Upload decoded pixels and prepare them for sampling
    ///
    /// `format_properties` describes [`TEXTURE_FORMAT`] on the device; it is
    /// only consulted when a mip chain is requested.
    pub fn from_image_data(
        upload: &UploadContext,
        image_data: &ImageData,
        generate_mipmaps: bool,
        format_properties: &vk::FormatProperties,
        max_anisotropy: Option<f32>,
    ) -> VulkanResult<Self> {
        let expected = image_data.width as usize * image_data.height as usize * 4;
        if image_data.channels != 4 || image_data.data.len() != expected {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "Texture data is {} bytes, expected {} for {}x{} RGBA",
                    image_data.data.len(),
                    expected,
                    image_data.width,
                    image_data.height
                ),
            });
        }

        if generate_mipmaps {
            check_linear_blit(TEXTURE_FORMAT, format_properties)?;
        }

        let extent = vk::Extent2D {
            width: image_data.width,
            height: image_data.height,
        };
        let mip_levels = if generate_mipmaps {
            mip_level_count(extent.width, extent.height)
        } else {
            1
        };
        log::debug!("Creating texture {}x{} with {} mip levels", extent.width, extent.height, mip_levels);

        let image = Image::new(
            upload.device().clone(),
            upload.memory_properties(),
            ImageDesc {
                extent,
                mip_levels,
                samples: vk::SampleCountFlags::TYPE_1,
                format: TEXTURE_FORMAT,
                usage: vk::ImageUsageFlags::TRANSFER_SRC
                    | vk::ImageUsageFlags::TRANSFER_DST
                    | vk::ImageUsageFlags::SAMPLED,
            },
        )?;

        upload.upload_image(&image, &image_data.data)?;

        if generate_mipmaps {
            upload.submit_single_time(|device, command_buffer| {
                record_mip_chain(device, command_buffer, image.handle(), extent, mip_levels);
                Ok(())
            })?;
        } else {
            upload.transition_layout(
                &image,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )?;
        }

        let device = upload.device().clone();
        let image_view = image.create_view(vk::ImageAspectFlags::COLOR)?;

        let sampler_info = SamplerSettings::new(mip_levels, max_anisotropy).create_info();
        let sampler = match unsafe { device.create_sampler(&sampler_info, None) } {
            Ok(sampler) => sampler,
            Err(e) => {
                unsafe { device.destroy_image_view(image_view, None) };
                return Err(VulkanError::Api(e));
            }
        };

        Ok(Self {
            device,
            image_view,
            sampler,
            image,
        })
    }

    /// Get the image view
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }

    /// Get the sampler
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler
    }

    /// Number of mip levels
    pub fn mip_levels(&self) -> u32 {
        self.image.desc().mip_levels
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.sampler, None);
            self.device.destroy_image_view(self.image_view, None);
        }
    }
}
