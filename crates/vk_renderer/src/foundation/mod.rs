//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the renderer:
//! - Time management
//! - Logging utilities

pub mod time;
pub mod logging;
