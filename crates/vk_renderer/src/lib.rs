//! # Vk Renderer
//!
//! A minimal real-time renderer built directly on Vulkan.
//!
//! ## Features
//!
//! - **Device negotiation**: adapter scoring, queue family discovery, logical device creation
//! - **Swapchain management**: format/present-mode/extent negotiation with resize and minimize recovery
//! - **Fixed pipeline**: one graphics pipeline with optional depth, texture, mipmap and MSAA stages
//! - **Frames in flight**: fence/semaphore driven acquire, record, submit and present loop
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vk_renderer::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApplicationConfig::default();
//!     let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;
//!     let mut renderer = VulkanRenderer::new(&mut window, &config)?;
//!     let timer = Timer::new();
//!
//!     'running: loop {
//!         for event in window.poll_events() {
//!             match event {
//!                 WindowEvent::Quit | WindowEvent::Closed => break 'running,
//!                 WindowEvent::Resized { .. } => renderer.notify_resized(),
//!             }
//!         }
//!         renderer.draw_frame(&mut window, timer.elapsed_secs())?;
//!     }
//!
//!     renderer.wait_idle()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod assets;
pub mod render;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        assets::{AssetError, ImageData, ObjLoader},
        core::config::{
            ApplicationConfig, AssetConfig, FeatureConfig, ShaderConfig, VulkanRendererConfig,
            WindowConfig,
        },
        config::{Config, ConfigError},
        foundation::time::Timer,
        render::{
            backends::vulkan::{FrameOutcome, VulkanError, VulkanRenderer, VulkanResult},
            mesh::{MeshData, Vertex},
            window::{Window, WindowError, WindowEvent},
            RenderFeatures,
        },
    };
}
