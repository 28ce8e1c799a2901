//! Vulkan context management
//!
//! Instance, surface, physical device selection and logical device creation.
//! [`VulkanContext`] owns all of them and tears them down in dependency order.

use ash::extensions::ext::DebugUtils;
use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;
use ash::{Device, Entry, Instance};
use std::ffi::{CStr, CString};
use thiserror::Error;

use crate::assets::AssetError;
use crate::core::config::VulkanRendererConfig;
use crate::render::RenderFeatures;
use super::device_selection::{pick_best_device, score_devices, DeviceCandidate, DeviceRequirements, QueueFamilyIndices};
use super::surface::Surface;
use super::window::Window;

/// Khronos validation layer
pub const VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No adapter scored at or above zero
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// Logical device creation was rejected by the driver
    #[error("Logical device creation failed: {0:?}")]
    DeviceCreation(vk::Result),

    /// Shader module, layout or pipeline creation failed
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// None of the candidate formats supports the requested features
    #[error("No supported format among candidates")]
    NoSupportedFormat,

    /// Layout pair outside the fixed transition table
    #[error("Unsupported layout transition {old:?} -> {new:?}")]
    UnsupportedLayoutTransition {
        /// Current layout
        old: vk::ImageLayout,
        /// Requested layout
        new: vk::ImageLayout,
    },

    /// Format cannot be blitted with linear filtering
    #[error("Texture format {0:?} does not support linear blitting")]
    UnsupportedBlitFormat(vk::Format),

    /// Image acquisition failed with a non-recoverable result
    #[error("Failed to acquire swapchain image: {0:?}")]
    SwapchainAcquire(vk::Result),

    /// Queue submission failed
    #[error("Failed to submit draw command buffer: {0:?}")]
    Submit(vk::Result),

    /// Presentation failed with a non-recoverable result
    #[error("Failed to present swapchain image: {0:?}")]
    Present(vk::Result),

    /// Command buffer begin or end failed
    #[error("Failed to record command buffer: {0:?}")]
    CommandRecord(vk::Result),

    /// The device was lost or a bounded fence wait expired
    #[error("Device lost")]
    DeviceLost,

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Asset loading failed during setup
    #[error(transparent)]
    Asset(#[from] AssetError),
}

impl VulkanError {
    /// Error mapper that reports `ERROR_DEVICE_LOST` as [`VulkanError::DeviceLost`]
    pub fn device_lost_or(wrap: fn(vk::Result) -> Self) -> impl Fn(vk::Result) -> Self {
        move |result| {
            if result == vk::Result::ERROR_DEVICE_LOST {
                Self::DeviceLost
            } else {
                wrap(result)
            }
        }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

fn c_string(value: &str) -> VulkanResult<CString> {
    CString::new(value)
        .map_err(|e| VulkanError::InitializationFailed(format!("Invalid string {:?}: {}", value, e)))
}

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug_messenger: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create a new Vulkan instance, optionally with validation layers
    pub fn new(
        window_extensions: &[String],
        app_name: &str,
        app_version: (u32, u32, u32),
        enable_validation: bool,
    ) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to load Vulkan: {:?}", e)))?;

        if enable_validation && !Self::layer_available(&entry, VALIDATION_LAYER)? {
            return Err(VulkanError::InitializationFailed(format!(
                "Validation layer {} requested, but not available",
                VALIDATION_LAYER
            )));
        }

        let app_name_cstr = c_string(app_name)?;
        let engine_name_cstr = c_string("No Engine")?;
        let (major, minor, patch) = app_version;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name_cstr)
            .application_version(vk::make_api_version(0, major, minor, patch))
            .engine_name(&engine_name_cstr)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let cstr_extensions = window_extensions
            .iter()
            .map(|ext| c_string(ext))
            .collect::<VulkanResult<Vec<_>>>()?;
        let mut extensions: Vec<*const std::os::raw::c_char> =
            cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let layer_names = if enable_validation {
            extensions.push(DebugUtils::name().as_ptr());
            vec![c_string(VALIDATION_LAYER)?]
        } else {
            Vec::new()
        };
        let layer_name_ptrs: Vec<*const std::os::raw::c_char> =
            layer_names.iter().map(|name| name.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layer_name_ptrs);

        let instance = unsafe {
            entry.create_instance(&create_info, None)
                .map_err(VulkanError::Api)?
        };

        let debug_messenger = if enable_validation {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(e);
                }
            }
        } else {
            None
        };

        log::debug!(
            "Created Vulkan instance for '{}' (validation {})",
            app_name,
            if enable_validation { "on" } else { "off" }
        );

        Ok(Self { entry, instance, debug_messenger })
    }

    fn layer_available(entry: &Entry, layer: &str) -> VulkanResult<bool> {
        let layers = entry
            .enumerate_instance_layer_properties()
            .map_err(VulkanError::Api)?;

        Ok(layers.iter().any(|properties| {
            let name = unsafe { CStr::from_ptr(properties.layer_name.as_ptr()) };
            name.to_str().map_or(false, |name| name == layer)
        }))
    }

    fn setup_debug_messenger(debug_utils: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe {
            debug_utils.create_debug_utils_messenger(&create_info, None)
                .map_err(VulkanError::Api)
        }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_messenger.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
        log::debug!("Destroyed Vulkan instance");
    }
}

/// Routes validation layer messages into `log` by severity
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!("[Vulkan] {:?} - {}", message_type, message);
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::INFO {
        log::debug!("[Vulkan] {:?} - {}", message_type, message);
    } else {
        log::trace!("[Vulkan] {:?} - {}", message_type, message);
    }

    vk::FALSE
}

/// Physical device selection and capabilities
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Reported device name
    pub name: String,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features
    pub features: vk::PhysicalDeviceFeatures,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
}

impl PhysicalDeviceInfo {
    /// Score every adapter and keep the best one
    pub fn select(instance: &Instance, surface: &Surface, requirements: &DeviceRequirements) -> VulkanResult<Self> {
        let devices = unsafe {
            instance.enumerate_physical_devices()
                .map_err(VulkanError::Api)?
        };

        let described = devices
            .into_iter()
            .map(|device| (device, Self::describe(instance, device, surface)));
        let scored = score_devices(described, requirements);

        let (device, candidate) = pick_best_device(scored).ok_or(VulkanError::NoSuitableDevice)?;
        let (graphics_family, present_family) = candidate
            .queue_families
            .complete()
            .ok_or(VulkanError::NoSuitableDevice)?;

        log::info!("Selected GPU: {}", candidate.name);

        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };

        Ok(Self {
            device,
            name: candidate.name,
            properties,
            features,
            graphics_family,
            present_family,
        })
    }

    fn describe(instance: &Instance, device: vk::PhysicalDevice, surface: &Surface) -> VulkanResult<DeviceCandidate> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let features = unsafe { instance.get_physical_device_features(device) };
        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };

        let queue_families = QueueFamilyIndices::find(&families, |index| surface.supports_present(device, index))?;

        let available_extensions = unsafe {
            instance.enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        }
        .iter()
        .map(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) }.to_owned())
        .collect();

        let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        Ok(DeviceCandidate {
            name,
            device_type: properties.device_type,
            queue_families,
            available_extensions,
            surface_format_count: surface.formats(device)?.len(),
            present_mode_count: surface.present_modes(device)?.len(),
            supports_sampler_anisotropy: features.sampler_anisotropy == vk::TRUE,
        })
    }

    /// Both queue families
    pub fn queue_families(&self) -> QueueFamilyIndices {
        QueueFamilyIndices {
            graphics_family: Some(self.graphics_family),
            present_family: Some(self.present_family),
        }
    }
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics operations queue
    pub graphics_queue: vk::Queue,
    /// Surface presentation queue
    pub present_queue: vk::Queue,
    /// Index of the graphics queue family
    pub graphics_family: u32,
    /// Index of the presentation queue family
    pub present_family: u32,
    /// Swapchain extension loader
    pub swapchain_loader: SwapchainLoader,
    /// Memory heaps and types of the physical device
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl LogicalDevice {
    /// Create a logical device with one queue per distinct family
    pub fn new(
        instance: &Instance,
        physical_device_info: &PhysicalDeviceInfo,
        requirements: &DeviceRequirements,
    ) -> VulkanResult<Self> {
        let priorities = [1.0f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = physical_device_info
            .queue_families()
            .unique_families()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extensions = requirements.extension_ptrs();
        let device_features = vk::PhysicalDeviceFeatures::builder()
            .sampler_anisotropy(requirements.sampler_anisotropy)
            .build();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&device_features);

        let device = unsafe {
            instance.create_device(physical_device_info.device, &create_info, None)
                .map_err(VulkanError::DeviceCreation)?
        };

        let graphics_queue = unsafe { device.get_device_queue(physical_device_info.graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(physical_device_info.present_family, 0) };
        let swapchain_loader = SwapchainLoader::new(instance, &device);
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device_info.device) };

        log::debug!(
            "Created logical device with {} queue(s) (graphics family {}, present family {})",
            queue_infos.len(),
            physical_device_info.graphics_family,
            physical_device_info.present_family
        );

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            graphics_family: physical_device_info.graphics_family,
            present_family: physical_device_info.present_family,
            swapchain_loader,
            memory_properties,
        })
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                log::error!("Failed to wait for device idle before destroying it: {:?}", e);
            }
            self.device.destroy_device(None);
        }
        log::debug!("Destroyed logical device");
    }
}

/// Owns the core Vulkan objects
///
/// Fields drop in declaration order: device, then surface, then instance.
pub struct VulkanContext {
    device: LogicalDevice,
    surface: Surface,
    physical_device: PhysicalDeviceInfo,
    instance: VulkanInstance,
}

impl VulkanContext {
    /// Create instance, surface and device for the window
    pub fn new(window: &mut Window, config: &VulkanRendererConfig, features: RenderFeatures) -> VulkanResult<Self> {
        let window_extensions = window
            .get_required_instance_extensions()
            .map_err(|e| VulkanError::InitializationFailed(format!("Failed to get required extensions: {}", e)))?;

        let instance = VulkanInstance::new(
            &window_extensions,
            &config.application_name,
            config.application_version,
            config.validation_enabled(),
        )?;

        let surface = Surface::new(&instance.entry, &instance.instance, window)?;

        let requirements = DeviceRequirements::for_presentation(features.contains(RenderFeatures::TEXTURE));
        let physical_device = PhysicalDeviceInfo::select(&instance.instance, &surface, &requirements)?;
        let device = LogicalDevice::new(&instance.instance, &physical_device, &requirements)?;

        Ok(Self {
            device,
            surface,
            physical_device,
            instance,
        })
    }

    /// Get the window surface
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Get the physical device info
    pub fn physical_device(&self) -> &PhysicalDeviceInfo {
        &self.physical_device
    }

    /// Get the logical device
    pub fn device(&self) -> &LogicalDevice {
        &self.device
    }

    /// Get the raw Device handle
    pub fn raw_device(&self) -> Device {
        self.device.device.clone()
    }

    /// Get the swapchain loader
    pub fn swapchain_loader(&self) -> &SwapchainLoader {
        &self.device.swapchain_loader
    }

    /// Get the graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue
    }

    /// Get the present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue
    }

    /// Graphics and present family indices
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.physical_device.queue_families()
    }

    /// Memory type table of the selected device
    pub fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.device.memory_properties
    }

    /// Device limits
    pub fn limits(&self) -> &vk::PhysicalDeviceLimits {
        &self.physical_device.properties.limits
    }

    /// Format features of `format` on the selected device
    pub fn format_properties(&self, format: vk::Format) -> vk::FormatProperties {
        unsafe {
            self.instance
                .instance
                .get_physical_device_format_properties(self.physical_device.device, format)
        }
    }

    /// Block until the device has finished all work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe {
            self.device
                .device
                .device_wait_idle()
                .map_err(VulkanError::device_lost_or(VulkanError::Api))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_lost_is_reported_as_such() {
        let map = VulkanError::device_lost_or(VulkanError::Submit);
        assert!(matches!(map(vk::Result::ERROR_DEVICE_LOST), VulkanError::DeviceLost));
        assert!(matches!(
            map(vk::Result::ERROR_OUT_OF_HOST_MEMORY),
            VulkanError::Submit(vk::Result::ERROR_OUT_OF_HOST_MEMORY)
        ));
    }

    #[test]
    fn test_interior_nul_rejected() {
        assert!(matches!(c_string("bad\0name"), Err(VulkanError::InitializationFailed(_))));
        assert!(c_string("Vulkan Tutorial").is_ok());
    }

    #[test]
    fn test_asset_errors_convert() {
        let err: VulkanError = AssetError::NotFound("viking_room.obj".to_string()).into();
        assert!(err.to_string().contains("viking_room.obj"));
    }
}
