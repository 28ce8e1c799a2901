//! Vulkan swapchain management
//!
//! The selection policy lives in free functions over plain driver data so it
//! can be checked without a GPU; [`Swapchain`] only applies it.

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::{vk, Device};

use crate::render::backends::vulkan::resources::image::create_image_view;
use crate::render::backends::vulkan::{VulkanContext, VulkanError, VulkanResult};

/// Where the window's pixel size comes from
///
/// `wait_events` blocks until the window system has something to report; it
/// is only called while the window is minimized.
pub trait SurfaceExtentSource {
    /// Framebuffer size in pixels
    fn framebuffer_size(&self) -> (u32, u32);

    /// Block until the next window event
    fn wait_events(&mut self);
}

/// Preferred format: 8-bit BGRA sRGB with nonlinear sRGB color space
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// The preferred format if offered, else the first one reported
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| f.format == PREFERRED_SURFACE_FORMAT.format && f.color_space == PREFERRED_SURFACE_FORMAT.color_space)
        .or_else(|| formats.first().copied())
        .ok_or(VulkanError::NoSupportedFormat)
}

/// Mailbox if offered, else FIFO, which every driver supports
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// The surface's fixed extent, or the framebuffer size clamped per dimension
///
/// A current width of `u32::MAX` means the surface lets the swapchain decide.
pub fn choose_extent(capabilities: &vk::SurfaceCapabilitiesKHR, framebuffer_size: (u32, u32)) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    let (width, height) = framebuffer_size;
    vk::Extent2D {
        width: width.clamp(capabilities.min_image_extent.width, capabilities.max_image_extent.width),
        height: height.clamp(capabilities.min_image_extent.height, capabilities.max_image_extent.height),
    }
}

/// One more than the minimum, capped by a nonzero maximum
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// How swapchain images are shared between the graphics and present families
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharingPlan {
    /// Exclusive or concurrent
    pub mode: vk::SharingMode,
    /// Families declared for concurrent access; empty when exclusive
    pub queue_families: Vec<u32>,
}

impl SharingPlan {
    /// Concurrent across both families when they differ, else exclusive
    pub fn for_families(graphics_family: u32, present_family: u32) -> Self {
        if graphics_family == present_family {
            Self {
                mode: vk::SharingMode::EXCLUSIVE,
                queue_families: Vec::new(),
            }
        } else {
            Self {
                mode: vk::SharingMode::CONCURRENT,
                queue_families: vec![graphics_family, present_family],
            }
        }
    }
}

/// Wait out a minimized window, then pick the extent
///
/// Capabilities are re-queried on every attempt because the surface's current
/// extent changes with the window.
pub fn resolve_extent<S, Q>(source: &mut S, mut query_capabilities: Q) -> VulkanResult<(vk::Extent2D, vk::SurfaceCapabilitiesKHR)>
where
    S: SurfaceExtentSource + ?Sized,
    Q: FnMut() -> VulkanResult<vk::SurfaceCapabilitiesKHR>,
{
    loop {
        let size = source.framebuffer_size();
        if size.0 > 0 && size.1 > 0 {
            let capabilities = query_capabilities()?;
            let extent = choose_extent(&capabilities, size);
            if extent.width > 0 && extent.height > 0 {
                return Ok((extent, capabilities));
            }
        }

        log::debug!("Window has zero size, waiting for events");
        source.wait_events();
    }
}

/// Swapchain and one view per image, destroyed together
pub struct Swapchain {
    device: Device,
    swapchain_loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Create a swapchain of `extent` for the context's surface
    ///
    /// `old_swapchain` is the one being replaced, or null. It is retired by
    /// this call and must be destroyed by the caller afterwards.
    pub fn new(
        context: &VulkanContext,
        extent: vk::Extent2D,
        capabilities: &vk::SurfaceCapabilitiesKHR,
        old_swapchain: vk::SwapchainKHR,
    ) -> VulkanResult<Self> {
        let physical_device = context.physical_device().device;
        let surface = context.surface();

        let format = choose_surface_format(&surface.formats(physical_device)?)?;
        let present_mode = choose_present_mode(&surface.present_modes(physical_device)?);
        let image_count = choose_image_count(capabilities);
        let families = context.device();
        let sharing = SharingPlan::for_families(families.graphics_family, families.present_family);

        log::info!(
            "Creating swapchain {}x{} ({:?}, {:?}, {} images, {:?})",
            extent.width,
            extent.height,
            format.format,
            present_mode,
            image_count,
            sharing.mode
        );

        let swapchain_create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing.mode)
            .queue_family_indices(&sharing.queue_families)
            .pre_transform(capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(old_swapchain);

        let swapchain_loader = context.swapchain_loader().clone();
        let swapchain = unsafe { swapchain_loader.create_swapchain(&swapchain_create_info, None) }
            .map_err(VulkanError::Api)?;

        let device = context.raw_device();
        let mut created = Self {
            device,
            swapchain_loader,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            format,
            extent,
        };

        created.images = unsafe { created.swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(VulkanError::Api)?;
        for &image in &created.images {
            let view = create_image_view(&created.device, image, format.format, vk::ImageAspectFlags::COLOR, 1)?;
            created.image_views.push(view);
        }

        Ok(created)
    }

    /// Get the swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// One view per swapchain image
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Number of images the driver actually created
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Chosen surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Image size
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        unsafe {
            for &view in &self.image_views {
                self.device.destroy_image_view(view, None);
            }
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn free_extent_caps() -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 2048, height: 2048 },
            ..Default::default()
        }
    }

    struct FakeWindow {
        sizes: Vec<(u32, u32)>,
        waits: usize,
    }

    impl SurfaceExtentSource for FakeWindow {
        fn framebuffer_size(&self) -> (u32, u32) {
            self.sizes[self.waits.min(self.sizes.len() - 1)]
        }

        fn wait_events(&mut self) {
            self.waits += 1;
        }
    }

    #[test]
    fn test_preferred_surface_format() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), formats[1]);
    }

    #[test]
    fn test_surface_format_falls_back_to_first() {
        let formats = [
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
        ];
        assert_eq!(choose_surface_format(&formats).unwrap(), formats[0]);
        assert!(matches!(choose_surface_format(&[]), Err(VulkanError::NoSupportedFormat)));
    }

    #[test]
    fn test_present_mode_preference() {
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX]),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(choose_present_mode(&[vk::PresentModeKHR::FIFO]), vk::PresentModeKHR::FIFO);
        assert_eq!(choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE]), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_fixed_extent_ignores_window() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: 1920, height: 1080 },
            ..free_extent_caps()
        };
        let extent = choose_extent(&caps, (800, 600));
        assert_eq!((extent.width, extent.height), (1920, 1080));
    }

    #[test]
    fn test_free_extent_clamps_each_dimension() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_extent: vk::Extent2D { width: 100, height: 100 },
            max_image_extent: vk::Extent2D { width: 2000, height: 2000 },
            ..free_extent_caps()
        };
        let extent = choose_extent(&caps, (3000, 10));
        assert_eq!((extent.width, extent.height), (2000, 100));
    }

    #[test]
    fn test_image_count() {
        let unbounded = free_extent_caps();
        assert_eq!(choose_image_count(&unbounded), 3);

        let capped = vk::SurfaceCapabilitiesKHR { min_image_count: 3, max_image_count: 3, ..free_extent_caps() };
        assert_eq!(choose_image_count(&capped), 3);

        let roomy = vk::SurfaceCapabilitiesKHR { min_image_count: 2, max_image_count: 8, ..free_extent_caps() };
        assert_eq!(choose_image_count(&roomy), 3);
    }

    #[test]
    fn test_sharing_plan() {
        let same = SharingPlan::for_families(0, 0);
        assert_eq!(same.mode, vk::SharingMode::EXCLUSIVE);
        assert!(same.queue_families.is_empty());

        let split = SharingPlan::for_families(0, 2);
        assert_eq!(split.mode, vk::SharingMode::CONCURRENT);
        assert_eq!(split.queue_families, vec![0, 2]);
    }

    #[test]
    fn test_resolve_extent_waits_while_minimized() {
        let mut window = FakeWindow {
            sizes: vec![(0, 0), (0, 0), (1024, 768)],
            waits: 0,
        };
        let mut queries = 0;
        let (extent, _) = resolve_extent(&mut window, || {
            queries += 1;
            Ok(free_extent_caps())
        })
        .unwrap();

        assert_eq!(window.waits, 2);
        assert_eq!(queries, 1);
        assert_eq!((extent.width, extent.height), (1024, 768));
    }

    #[test]
    fn test_resolve_extent_waits_on_zero_surface_extent() {
        let mut window = FakeWindow { sizes: vec![(640, 480)], waits: 0 };
        let mut queries = 0;
        let (extent, _) = resolve_extent(&mut window, || {
            queries += 1;
            let current = if queries == 1 { 0 } else { 640 };
            Ok(vk::SurfaceCapabilitiesKHR {
                current_extent: vk::Extent2D { width: current, height: current },
                ..free_extent_caps()
            })
        })
        .unwrap();

        assert_eq!(window.waits, 1);
        assert_eq!(extent.width, 640);
    }

    #[test]
    fn test_resolve_extent_propagates_query_errors() {
        let mut window = FakeWindow { sizes: vec![(640, 480)], waits: 0 };
        let result = resolve_extent(&mut window, || Err(VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR)));
        assert!(matches!(result, Err(VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR))));
    }
}
