//! Room viewer
//!
//! Opens a window and spins a textured model (or the built-in quads) until
//! Escape or the close button. The configuration comes from the path given as
//! the first argument, else `room_viewer.toml` if present, else defaults.
//!
//! Without a config file the sample room under `assets/models/viking_room/`
//! is drawn when it exists; otherwise the built-in quads are.

use std::path::Path;
use std::process::ExitCode;

use thiserror::Error;
use vk_renderer::core::config::DEFAULT_MODEL_PATH;
use vk_renderer::foundation::logging;
use vk_renderer::prelude::*;

const DEFAULT_CONFIG_PATH: &str = "room_viewer.toml";

/// Everything that can end the viewer early
#[derive(Error, Debug)]
enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Window error: {0}")]
    Window(#[from] WindowError),

    #[error("Renderer error: {0}")]
    Renderer(#[from] VulkanError),
}

fn load_config(explicit: Option<&str>) -> Result<ApplicationConfig, AppError> {
    let config = match explicit {
        Some(path) => ApplicationConfig::load_from_file(path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => ApplicationConfig::load_from_file(DEFAULT_CONFIG_PATH)?,
        None => default_config(Path::new(DEFAULT_MODEL_PATH).exists()),
    };
    config.validate().map_err(AppError::InvalidConfig)?;
    Ok(config)
}

fn default_config(sample_room_present: bool) -> ApplicationConfig {
    let mut config = ApplicationConfig::new("Room Viewer");
    if sample_room_present {
        config.assets = AssetConfig::sample_room();
    }
    config
}

fn run(config: &ApplicationConfig) -> Result<(), AppError> {
    let mut window = Window::new(&config.window.title, config.window.width, config.window.height)?;
    let mut renderer = VulkanRenderer::new(&mut window, config)?;
    if config.assets.uses_builtin_mesh() {
        log::info!("No model configured, drawing the built-in quads");
    }
    let (width, height) = renderer.swapchain_extent();
    log::info!("Rendering {}x{} with {:?}", width, height, renderer.features());
    let mut timer = Timer::new();
    let mut recreations = 0_u32;

    'running: while !window.should_close() {
        for event in window.poll_events() {
            match event {
                WindowEvent::Quit | WindowEvent::Closed => break 'running,
                WindowEvent::Resized { width, height } => {
                    log::debug!("Window resized to {}x{}", width, height);
                    renderer.notify_resized();
                }
            }
        }

        match renderer.draw_frame(&mut window, timer.elapsed_secs())? {
            FrameOutcome::Presented => timer.tick(),
            FrameOutcome::SwapchainRecreated => recreations += 1,
        }
    }

    renderer.wait_idle()?;
    let (width, height) = renderer.swapchain_extent();
    log::info!(
        "Presented {} frames ({} submitted) in {:.1}s ({:.1} FPS average, {} swapchain recreations, final size {}x{})",
        timer.frame_count(),
        renderer.frame_count(),
        timer.elapsed_secs(),
        timer.average_fps(),
        recreations,
        width,
        height
    );
    Ok(())
}

fn main() -> ExitCode {
    let explicit_path = std::env::args().nth(1);
    let config = match load_config(explicit_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            logging::init("info");
            log::error!("{}", e);
            eprintln!("room_viewer: {}", e);
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.log_filter);
    log::info!("Starting {}", config.window.title);

    match run(&config) {
        Ok(()) => {
            log::info!("Viewer closed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("room_viewer: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let result = load_config(Some("does/not/exist.toml"));
        assert!(matches!(result, Err(AppError::Config(ConfigError::Io(_)))));
    }

    #[test]
    fn test_unknown_extension_is_an_error() {
        let result = load_config(Some("build.rs"));
        assert!(matches!(result, Err(AppError::Config(ConfigError::UnsupportedFormat(_)))));
    }

    #[test]
    fn test_defaults_without_config_file() {
        if Path::new(DEFAULT_CONFIG_PATH).exists() {
            return;
        }
        let config = load_config(None).unwrap();
        assert_eq!(config.window.title, "Room Viewer");
        assert_eq!(config.renderer.max_frames_in_flight, 2);
        assert_eq!(config.assets.uses_builtin_mesh(), !Path::new(DEFAULT_MODEL_PATH).exists());
    }

    #[test]
    fn test_default_falls_back_to_builtin_quads() {
        assert_eq!(default_config(false).assets, AssetConfig::builtin());
        let with_room = default_config(true);
        assert_eq!(with_room.assets, AssetConfig::sample_room());
        assert!(with_room.validate().is_ok());
    }
}
