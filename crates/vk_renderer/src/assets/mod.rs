//! Asset loading collaborators
//!
//! Mesh, texture and shader blobs are read from disk here and handed to the
//! renderer as plain data.

pub mod obj_loader;
pub mod image_loader;
pub mod shader_loader;

pub use obj_loader::{ObjLoader, ObjError, RawMesh, FaceCorner};
pub use image_loader::ImageData;
pub use shader_loader::load_shader;

use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Failed to load asset
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// Invalid asset data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Mesh file could not be parsed
    #[error(transparent)]
    Obj(#[from] ObjError),

    /// IO error during asset loading
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
