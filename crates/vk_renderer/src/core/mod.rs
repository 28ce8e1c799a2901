//! Core renderer configuration
//!
//! Everything an application tunes before the renderer starts lives here.

pub mod config;

pub use config::{
    ApplicationConfig, AssetConfig, FeatureConfig, ShaderConfig, VulkanRendererConfig, WindowConfig,
};
