//! Physical device scoring
//!
//! Everything here works on plain data gathered from the driver, so the
//! selection policy can be exercised without a GPU.

use ash::vk;
use std::ffi::{CStr, CString};

use crate::render::backends::vulkan::VulkanResult;

/// Score added for discrete GPUs
pub const DISCRETE_GPU_BONUS: i32 = 1000;
/// Score of a device that cannot run the renderer
pub const DISQUALIFIED: i32 = -1;

/// Queue families a device offers for the two roles the renderer needs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// First family supporting graphics
    pub graphics_family: Option<u32>,
    /// First family able to present to the surface
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Scan the families once, keeping the first match for each role
    ///
    /// `supports_present` is asked with the real family index of the device
    /// under evaluation.
    pub fn find<F>(families: &[vk::QueueFamilyProperties], mut supports_present: F) -> VulkanResult<Self>
    where
        F: FnMut(u32) -> VulkanResult<bool>,
    {
        let mut indices = Self::default();

        for (index, family) in families.iter().enumerate() {
            let index = index as u32;

            if indices.graphics_family.is_none()
                && family.queue_count > 0
                && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
            {
                indices.graphics_family = Some(index);
            }

            if indices.present_family.is_none() && supports_present(index)? {
                indices.present_family = Some(index);
            }

            if indices.is_complete() {
                break;
            }
        }

        Ok(indices)
    }

    /// Both roles are covered
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Both family indices, if complete
    pub fn complete(&self) -> Option<(u32, u32)> {
        self.graphics_family.zip(self.present_family)
    }

    /// Distinct family indices, graphics first
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);
        for family in [self.graphics_family, self.present_family].into_iter().flatten() {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }
}

/// What a device must offer
#[derive(Debug, Clone)]
pub struct DeviceRequirements {
    /// Device extensions that must all be present
    pub extensions: Vec<CString>,
    /// Anisotropic filtering is needed by the sampler
    pub sampler_anisotropy: bool,
}

impl DeviceRequirements {
    /// Swapchain support, plus anisotropy when the texture stage is on
    pub fn for_presentation(sampler_anisotropy: bool) -> Self {
        Self {
            extensions: vec![ash::extensions::khr::Swapchain::name().to_owned()],
            sampler_anisotropy,
        }
    }

    /// Extension names as pointers for `vk::DeviceCreateInfo`
    pub fn extension_ptrs(&self) -> Vec<*const std::os::raw::c_char> {
        self.extensions.iter().map(|name| name.as_ptr()).collect()
    }
}

/// Facts about one physical device relevant to scoring
#[derive(Debug, Clone)]
pub struct DeviceCandidate {
    /// Reported device name
    pub name: String,
    /// Discrete, integrated, virtual, ...
    pub device_type: vk::PhysicalDeviceType,
    /// Queue family discovery result
    pub queue_families: QueueFamilyIndices,
    /// Device extensions the driver reports
    pub available_extensions: Vec<CString>,
    /// Number of surface formats for the target surface
    pub surface_format_count: usize,
    /// Number of present modes for the target surface
    pub present_mode_count: usize,
    /// `samplerAnisotropy` feature bit
    pub supports_sampler_anisotropy: bool,
}

impl DeviceCandidate {
    /// Required extensions this device lacks
    pub fn missing_extensions<'a>(&self, required: &'a [CString]) -> Vec<&'a CStr> {
        required
            .iter()
            .filter(|name| !self.available_extensions.contains(name))
            .map(CString::as_c_str)
            .collect()
    }
}

/// Score a device; negative means unusable
pub fn score_device(candidate: &DeviceCandidate, requirements: &DeviceRequirements) -> i32 {
    if !candidate.queue_families.is_complete() {
        return DISQUALIFIED;
    }
    if !candidate.missing_extensions(&requirements.extensions).is_empty() {
        return DISQUALIFIED;
    }
    if candidate.surface_format_count == 0 || candidate.present_mode_count == 0 {
        return DISQUALIFIED;
    }
    if requirements.sampler_anisotropy && !candidate.supports_sampler_anisotropy {
        return DISQUALIFIED;
    }

    if candidate.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        DISCRETE_GPU_BONUS
    } else {
        0
    }
}

/// Score every adapter that could be described
///
/// An adapter whose capability queries failed is skipped with a warning
/// rather than aborting the whole selection.
pub fn score_devices<T, I>(described: I, requirements: &DeviceRequirements) -> Vec<((T, DeviceCandidate), i32)>
where
    I: IntoIterator<Item = (T, VulkanResult<DeviceCandidate>)>,
{
    described
        .into_iter()
        .filter_map(|(device, candidate)| match candidate {
            Ok(candidate) => {
                let score = score_device(&candidate, requirements);
                log::debug!("GPU '{}' ({:?}) scored {}", candidate.name, candidate.device_type, score);
                Some(((device, candidate), score))
            }
            Err(e) => {
                log::warn!("Skipping GPU whose capabilities could not be queried: {}", e);
                None
            }
        })
        .collect()
}

/// Highest non-negative score; the earliest device wins ties
pub fn pick_best_device<T, I>(scored: I) -> Option<T>
where
    I: IntoIterator<Item = (T, i32)>,
{
    let mut best: Option<(T, i32)> = None;
    for (device, score) in scored {
        if score < 0 {
            continue;
        }
        match &best {
            Some((_, best_score)) if score <= *best_score => {}
            _ => best = Some((device, score)),
        }
    }
    best.map(|(device, _)| device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::vulkan::VulkanError;

    fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: 1,
            ..Default::default()
        }
    }

    fn capable(device_type: vk::PhysicalDeviceType) -> DeviceCandidate {
        DeviceCandidate {
            name: "test".to_string(),
            device_type,
            queue_families: QueueFamilyIndices { graphics_family: Some(0), present_family: Some(0) },
            available_extensions: vec![ash::extensions::khr::Swapchain::name().to_owned()],
            surface_format_count: 2,
            present_mode_count: 1,
            supports_sampler_anisotropy: true,
        }
    }

    #[test]
    fn test_first_family_per_role() {
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE),
        ];
        let indices = QueueFamilyIndices::find(&families, |index| Ok(index >= 2)).unwrap();
        assert_eq!(indices.graphics_family, Some(1));
        assert_eq!(indices.present_family, Some(2));
        assert_eq!(indices.unique_families(), vec![1, 2]);
    }

    #[test]
    fn test_shared_family_deduplicated() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let indices = QueueFamilyIndices::find(&families, |_| Ok(true)).unwrap();
        assert_eq!(indices.complete(), Some((0, 0)));
        assert_eq!(indices.unique_families(), vec![0]);
    }

    #[test]
    fn test_present_query_uses_real_indices() {
        let families = [family(vk::QueueFlags::COMPUTE), family(vk::QueueFlags::GRAPHICS)];
        let mut queried = Vec::new();
        QueueFamilyIndices::find(&families, |index| {
            queried.push(index);
            Ok(false)
        })
        .unwrap();
        assert_eq!(queried, vec![0, 1]);
    }

    #[test]
    fn test_present_query_error_propagates() {
        let families = [family(vk::QueueFlags::GRAPHICS)];
        let result = QueueFamilyIndices::find(&families, |_| {
            Err(VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_no_graphics_family_always_disqualified() {
        let requirements = DeviceRequirements::for_presentation(true);
        let mut candidate = capable(vk::PhysicalDeviceType::DISCRETE_GPU);
        candidate.queue_families.graphics_family = None;
        assert_eq!(score_device(&candidate, &requirements), DISQUALIFIED);
    }

    #[test]
    fn test_discrete_outscores_integrated_by_bonus() {
        let requirements = DeviceRequirements::for_presentation(true);
        let discrete = score_device(&capable(vk::PhysicalDeviceType::DISCRETE_GPU), &requirements);
        let integrated = score_device(&capable(vk::PhysicalDeviceType::INTEGRATED_GPU), &requirements);
        assert_eq!(discrete - integrated, DISCRETE_GPU_BONUS);
        assert_eq!(integrated, 0);
    }

    #[test]
    fn test_missing_capabilities_disqualify() {
        let requirements = DeviceRequirements::for_presentation(true);

        let mut no_swapchain = capable(vk::PhysicalDeviceType::INTEGRATED_GPU);
        no_swapchain.available_extensions.clear();
        assert_eq!(score_device(&no_swapchain, &requirements), DISQUALIFIED);

        let mut no_formats = capable(vk::PhysicalDeviceType::INTEGRATED_GPU);
        no_formats.surface_format_count = 0;
        assert_eq!(score_device(&no_formats, &requirements), DISQUALIFIED);

        let mut no_modes = capable(vk::PhysicalDeviceType::INTEGRATED_GPU);
        no_modes.present_mode_count = 0;
        assert_eq!(score_device(&no_modes, &requirements), DISQUALIFIED);

        let mut no_anisotropy = capable(vk::PhysicalDeviceType::INTEGRATED_GPU);
        no_anisotropy.supports_sampler_anisotropy = false;
        assert_eq!(score_device(&no_anisotropy, &requirements), DISQUALIFIED);
        assert_eq!(score_device(&no_anisotropy, &DeviceRequirements::for_presentation(false)), 0);
    }

    #[test]
    fn test_failed_query_skips_only_that_adapter() {
        let requirements = DeviceRequirements::for_presentation(true);
        let described = vec![
            ("lost", Err(VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR))),
            ("integrated", Ok(capable(vk::PhysicalDeviceType::INTEGRATED_GPU))),
        ];

        let scored = score_devices(described, &requirements);
        assert_eq!(scored.len(), 1);
        let (device, candidate) = pick_best_device(scored).unwrap();
        assert_eq!(device, "integrated");
        assert_eq!(candidate.device_type, vk::PhysicalDeviceType::INTEGRATED_GPU);
    }

    #[test]
    fn test_all_queries_failing_leaves_nothing_to_pick() {
        let requirements = DeviceRequirements::for_presentation(false);
        let described = vec![((), Err(VulkanError::Api(vk::Result::ERROR_INITIALIZATION_FAILED)))];
        assert!(pick_best_device(score_devices(described, &requirements)).is_none());
    }

    #[test]
    fn test_pick_best_prefers_highest_then_first() {
        assert_eq!(pick_best_device([("a", 0), ("b", 1000), ("c", 1000)]), Some("b"));
        assert_eq!(pick_best_device([("a", 0), ("b", 0)]), Some("a"));
        assert_eq!(pick_best_device([("a", -1), ("b", 0)]), Some("b"));
        assert_eq!(pick_best_device([("a", -1)]), None);
        assert_eq!(pick_best_device(Vec::<(&str, i32)>::new()), None);
    }
}
