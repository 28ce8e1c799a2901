//! # Unified Configuration System
//!
//! All configuration structures for the renderer and the application driving it.
//! Every structure is serializable (TOML or RON through [`Config`]), has sensible
//! defaults and a `validate` method.
//!
//! ## Configuration Categories
//!
//! - **Window Config**: initial size and title
//! - **Render Config**: application metadata, shaders, frames in flight, optional stages
//! - **Asset Config**: model and texture paths

use serde::{Serialize, Deserialize};
use std::path::Path;

use crate::render::RenderFeatures;

pub use crate::config::{Config, ConfigError};

/// Sample model location, used by the viewer when the file is present
pub const DEFAULT_MODEL_PATH: &str = "assets/models/viking_room/viking_room.obj";
/// Texture paired with [`DEFAULT_MODEL_PATH`]
pub const DEFAULT_TEXTURE_PATH: &str = "assets/models/viking_room/viking_room.png";

/// # Shader Configuration
///
/// Paths of the two pre-compiled SPIR-V blobs the pipeline is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Path to the vertex shader SPIR-V file
    pub vertex_shader_path: String,
    /// Path to the fragment shader SPIR-V file
    pub fragment_shader_path: String,
}

impl ShaderConfig {
    /// Create a new shader configuration
    pub fn new(vertex_path: impl Into<String>, fragment_path: impl Into<String>) -> Self {
        Self {
            vertex_shader_path: vertex_path.into(),
            fragment_shader_path: fragment_path.into(),
        }
    }

    /// Create shader config with automatic path resolution
    ///
    /// Tries the common output locations so the viewer can be started from the
    /// workspace root or from its own crate directory.
    pub fn with_path_resolution(base_vertex: &str, base_fragment: &str) -> Self {
        let shader_dirs = [
            "target/shaders/",
            "../target/shaders/",
            "shaders/",
            "resources/shaders/",
            "./",
        ];

        let mut vertex_path = None;
        let mut fragment_path = None;

        for dir in &shader_dirs {
            let vertex_test = format!("{}{}", dir, base_vertex);
            let fragment_test = format!("{}{}", dir, base_fragment);

            if vertex_path.is_none() && Path::new(&vertex_test).exists() {
                vertex_path = Some(vertex_test);
            }
            if fragment_path.is_none() && Path::new(&fragment_test).exists() {
                fragment_path = Some(fragment_test);
            }

            if vertex_path.is_some() && fragment_path.is_some() {
                break;
            }
        }

        Self {
            vertex_shader_path: vertex_path.unwrap_or_else(|| format!("target/shaders/{}", base_vertex)),
            fragment_shader_path: fragment_path.unwrap_or_else(|| format!("target/shaders/{}", base_fragment)),
        }
    }

    /// Default shaders for a feature set: textured output, or plain vertex color
    pub fn for_features(features: &FeatureConfig) -> Self {
        if features.texture {
            Self::with_path_resolution("textured.vert.spv", "textured.frag.spv")
        } else {
            Self::with_path_resolution("textured.vert.spv", "vertex_color.frag.spv")
        }
    }

    /// Validate that shader files exist
    pub fn validate(&self) -> Result<(), String> {
        if !Path::new(&self.vertex_shader_path).exists() {
            return Err(format!("Vertex shader not found: {}", self.vertex_shader_path));
        }
        if !Path::new(&self.fragment_shader_path).exists() {
            return Err(format!("Fragment shader not found: {}", self.fragment_shader_path));
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::for_features(&FeatureConfig::default())
    }
}

/// # Optional Pipeline Stages
///
/// One renderer design, with the depth, texture, mipmap and multisampling
/// stages switched on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Depth buffer with depth test and writes
    pub depth: bool,
    /// Combined image sampler at binding 1
    pub texture: bool,
    /// Generate a full mip chain for the texture
    pub mipmaps: bool,
    /// Render to a multisampled target resolved into the swapchain image
    pub msaa: bool,
}

impl FeatureConfig {
    /// Every optional stage enabled
    pub fn all() -> Self {
        Self { depth: true, texture: true, mipmaps: true, msaa: true }
    }

    /// No optional stage: color-only, untextured
    pub fn minimal() -> Self {
        Self { depth: false, texture: false, mipmaps: false, msaa: false }
    }

    /// Convert to the flag set consumed by the backend
    pub fn to_render_features(self) -> RenderFeatures {
        let mut features = RenderFeatures::empty();
        features.set(RenderFeatures::DEPTH, self.depth);
        features.set(RenderFeatures::TEXTURE, self.texture);
        features.set(RenderFeatures::MIPMAPS, self.mipmaps);
        features.set(RenderFeatures::MSAA, self.msaa);
        features
    }

    /// Validate the combination of stages
    pub fn validate(&self) -> Result<(), String> {
        if self.mipmaps && !self.texture {
            return Err("Mipmaps require the texture stage".to_string());
        }
        Ok(())
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { depth: true, texture: true, mipmaps: true, msaa: false }
    }
}

/// # Vulkan Renderer Configuration
///
/// Configuration specific to the Vulkan backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VulkanRendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Application version (major, minor, patch)
    pub application_version: (u32, u32, u32),
    /// Shader configuration
    pub shaders: ShaderConfig,
    /// Maximum frames in flight
    pub max_frames_in_flight: usize,
    /// Whether to enable Vulkan validation layers (`None` follows the build type)
    pub enable_validation: Option<bool>,
    /// Optional pipeline stages
    pub features: FeatureConfig,
    /// Bound on fence waits in nanoseconds; `None` waits forever
    pub fence_timeout_ns: Option<u64>,
}

impl VulkanRendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            application_version: (0, 1, 0),
            shaders: ShaderConfig::default(),
            max_frames_in_flight: 2,
            enable_validation: None,
            features: FeatureConfig::default(),
            fence_timeout_ns: None,
        }
    }

    /// Set application version
    pub fn with_version(mut self, major: u32, minor: u32, patch: u32) -> Self {
        self.application_version = (major, minor, patch);
        self
    }

    /// Set custom shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Set maximum frames in flight
    pub fn with_max_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Select optional stages; shaders follow the texture stage
    pub fn with_features(mut self, features: FeatureConfig) -> Self {
        self.features = features;
        self.shaders = ShaderConfig::for_features(&features);
        self
    }

    /// Bound fence waits; a timeout is then reported as a lost device
    pub fn with_fence_timeout(mut self, timeout_ns: u64) -> Self {
        self.fence_timeout_ns = Some(timeout_ns);
        self
    }

    /// Whether validation layers should be requested
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.application_name.is_empty() {
            return Err("Application name cannot be empty".to_string());
        }

        if self.max_frames_in_flight == 0 {
            return Err("Max frames in flight must be at least 1".to_string());
        }

        if self.max_frames_in_flight > 8 {
            return Err("Max frames in flight should not exceed 8".to_string());
        }

        if self.fence_timeout_ns == Some(0) {
            return Err("Fence timeout must be nonzero".to_string());
        }

        self.features.validate()
    }
}

impl Default for VulkanRendererConfig {
    fn default() -> Self {
        Self::new("Vulkan Tutorial")
    }
}

/// # Window Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
    /// Window title
    pub title: String,
}

impl WindowConfig {
    /// Validate the window settings
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err(format!("Window size must be nonzero, got {}x{}", self.width, self.height));
        }
        Ok(())
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Vulkan Tutorial".to_string(),
        }
    }
}

/// # Asset Configuration
///
/// Where the mesh and texture come from. Without a model the built-in quads
/// are drawn; without a texture a white 1x1 image is sampled. The default is
/// the built-in geometry, so a file that leaves a path out means "none".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Wavefront OBJ file
    pub model_path: Option<String>,
    /// Texture image file
    pub texture_path: Option<String>,
}

impl AssetConfig {
    /// Set the model path
    pub fn with_model(mut self, path: impl Into<String>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    /// Set the texture path
    pub fn with_texture(mut self, path: impl Into<String>) -> Self {
        self.texture_path = Some(path.into());
        self
    }

    /// Use the built-in geometry and a plain white texture
    pub fn builtin() -> Self {
        Self::default()
    }

    /// The sample room model and its texture
    pub fn sample_room() -> Self {
        Self::builtin().with_model(DEFAULT_MODEL_PATH).with_texture(DEFAULT_TEXTURE_PATH)
    }

    /// Whether the built-in quads are drawn instead of a model
    pub fn uses_builtin_mesh(&self) -> bool {
        self.model_path.is_none()
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration; this is what the viewer loads from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Window settings
    pub window: WindowConfig,
    /// Rendering system configuration
    pub renderer: VulkanRendererConfig,
    /// Asset locations
    pub assets: AssetConfig,
    /// Default `env_logger` filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl ApplicationConfig {
    /// Create a new application configuration with defaults
    pub fn new(app_name: impl Into<String>) -> Self {
        let app_name = app_name.into();
        Self {
            window: WindowConfig { title: app_name.clone(), ..WindowConfig::default() },
            renderer: VulkanRendererConfig::new(app_name),
            assets: AssetConfig::default(),
            log_filter: "info".to_string(),
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), String> {
        self.window.validate()?;
        self.renderer.validate()?;
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self::new("Vulkan Tutorial")
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_viewer_constants() {
        let config = ApplicationConfig::default();
        assert_eq!((config.window.width, config.window.height), (800, 600));
        assert_eq!(config.renderer.max_frames_in_flight, 2);
        assert_eq!(config.renderer.fence_timeout_ns, None);
        assert!(config.renderer.features.depth);
        assert!(config.renderer.features.texture);
        assert!(config.renderer.features.mipmaps);
        assert!(!config.renderer.features.msaa);
        assert!(config.assets.uses_builtin_mesh());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frames_in_flight_bounds() {
        let zero = VulkanRendererConfig::default().with_max_frames_in_flight(0);
        assert!(zero.validate().is_err());

        let many = VulkanRendererConfig::default().with_max_frames_in_flight(9);
        assert!(many.validate().is_err());

        let three = VulkanRendererConfig::default().with_max_frames_in_flight(3);
        assert!(three.validate().is_ok());
    }

    #[test]
    fn test_mipmaps_without_texture_rejected() {
        let features = FeatureConfig { texture: false, ..FeatureConfig::default() };
        assert!(features.validate().is_err());
        assert!(FeatureConfig::minimal().validate().is_ok());
    }

    #[test]
    fn test_zero_fence_timeout_rejected() {
        let config = VulkanRendererConfig::default().with_fence_timeout(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_window_rejected() {
        let window = WindowConfig { width: 0, ..WindowConfig::default() };
        assert!(window.validate().is_err());
    }

    #[test]
    fn test_feature_flags_conversion() {
        let flags = FeatureConfig::all().to_render_features();
        assert!(flags.contains(RenderFeatures::DEPTH | RenderFeatures::TEXTURE));
        assert!(flags.contains(RenderFeatures::MIPMAPS | RenderFeatures::MSAA));
        assert!(FeatureConfig::minimal().to_render_features().is_empty());
    }

    #[test]
    fn test_with_features_switches_fragment_shader() {
        let config = VulkanRendererConfig::default().with_features(FeatureConfig::minimal());
        assert!(config.shaders.fragment_shader_path.ends_with("vertex_color.frag.spv"));

        let textured = VulkanRendererConfig::default().with_features(FeatureConfig::default());
        assert!(textured.shaders.fragment_shader_path.ends_with("textured.frag.spv"));
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ApplicationConfig::default();
        let text = config.render("viewer.toml").unwrap();
        let parsed = ApplicationConfig::parse("viewer.toml", &text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_builtin_assets_survive_round_trip() {
        let config = ApplicationConfig { assets: AssetConfig::builtin(), ..ApplicationConfig::default() };
        for path in ["viewer.toml", "viewer.ron"] {
            let text = config.render(path).unwrap();
            let parsed = ApplicationConfig::parse(path, &text).unwrap();
            assert_eq!(parsed.assets, AssetConfig::builtin(), "{}", path);
        }
    }

    #[test]
    fn test_model_paths_survive_round_trip() {
        let config = ApplicationConfig { assets: AssetConfig::sample_room(), ..ApplicationConfig::default() };
        let text = config.render("viewer.toml").unwrap();
        let parsed = ApplicationConfig::parse("viewer.toml", &text).unwrap();
        assert_eq!(parsed.assets.model_path.as_deref(), Some(DEFAULT_MODEL_PATH));
        assert_eq!(parsed.assets.texture_path.as_deref(), Some(DEFAULT_TEXTURE_PATH));
        assert!(!parsed.assets.uses_builtin_mesh());
    }

    #[test]
    fn test_missing_asset_section_means_builtin() {
        let parsed = ApplicationConfig::parse("viewer.toml", "log_filter = \"debug\"").unwrap();
        assert_eq!(parsed.assets, AssetConfig::builtin());
        assert_eq!(parsed.log_filter, "debug");
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let text = "(window: (width: 1024, height: 768, title: \"room\"), assets: (model_path: None, texture_path: None))";
        let parsed = ApplicationConfig::parse("viewer.ron", text).unwrap();
        assert_eq!(parsed.window.width, 1024);
        assert_eq!(parsed.assets, AssetConfig::builtin());
        assert_eq!(parsed.renderer.max_frames_in_flight, 2);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = ApplicationConfig::parse("viewer.json", "{}");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
