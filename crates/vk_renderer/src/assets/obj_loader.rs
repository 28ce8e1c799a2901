//! OBJ file loader for 3D models
//!
//! Produces the raw, un-deduplicated attribute arrays plus one corner per face
//! vertex. Deduplication into a vertex/index buffer happens in
//! [`crate::render::mesh::MeshData::from_raw`].

use std::path::Path;
use thiserror::Error;

/// OBJ loading errors
#[derive(Error, Debug)]
pub enum ObjError {
    /// The OBJ parser rejected the file
    #[error("OBJ load error in {path}: {source}")]
    Load {
        /// File that failed to load
        path: String,
        /// Parser error
        source: tobj::LoadError,
    },
    /// Structurally invalid mesh data
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

/// One face vertex: which position and (optionally) which texcoord it uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceCorner {
    /// Index into [`RawMesh::positions`]
    pub position_index: u32,
    /// Index into [`RawMesh::texcoords`], if the face specified one
    pub texcoord_index: Option<u32>,
}

/// Mesh exactly as stored in the file, triangulated
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMesh {
    /// Vertex positions
    pub positions: Vec<[f32; 3]>,
    /// Texture coordinates as written in the file (v not flipped)
    pub texcoords: Vec<[f32; 2]>,
    /// Face corners, three per triangle
    pub corners: Vec<FaceCorner>,
}

impl RawMesh {
    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.corners.len() / 3
    }

    /// Merge every model of an OBJ file into one raw mesh
    pub fn from_models(models: &[tobj::Model]) -> Result<Self, ObjError> {
        let mut raw = Self::default();

        for model in models {
            let mesh = &model.mesh;
            let position_offset = raw.positions.len() as u32;
            let texcoord_offset = raw.texcoords.len() as u32;

            raw.positions.extend(mesh.positions.chunks_exact(3).map(|p| [p[0], p[1], p[2]]));
            raw.texcoords.extend(mesh.texcoords.chunks_exact(2).map(|t| [t[0], t[1]]));

            let has_texcoords = !mesh.texcoords.is_empty();
            if !mesh.texcoord_indices.is_empty() && mesh.texcoord_indices.len() != mesh.indices.len() {
                return Err(ObjError::InvalidFormat(format!(
                    "Model '{}' has {} position indices but {} texcoord indices",
                    model.name,
                    mesh.indices.len(),
                    mesh.texcoord_indices.len()
                )));
            }

            for (corner, &index) in mesh.indices.iter().enumerate() {
                let texcoord_index = if !mesh.texcoord_indices.is_empty() {
                    Some(texcoord_offset + mesh.texcoord_indices[corner])
                } else if has_texcoords {
                    Some(texcoord_offset + index)
                } else {
                    None
                };

                raw.corners.push(FaceCorner {
                    position_index: position_offset + index,
                    texcoord_index,
                });
            }
        }

        raw.check_bounds()?;
        Ok(raw)
    }

    fn check_bounds(&self) -> Result<(), ObjError> {
        if self.corners.len() % 3 != 0 {
            return Err(ObjError::InvalidFormat(format!(
                "{} face corners do not form whole triangles",
                self.corners.len()
            )));
        }

        for corner in &self.corners {
            if corner.position_index as usize >= self.positions.len() {
                return Err(ObjError::InvalidFormat(format!(
                    "Position index {} out of bounds ({} positions)",
                    corner.position_index,
                    self.positions.len()
                )));
            }
            if let Some(texcoord) = corner.texcoord_index {
                if texcoord as usize >= self.texcoords.len() {
                    return Err(ObjError::InvalidFormat(format!(
                        "Texcoord index {} out of bounds ({} texcoords)",
                        texcoord,
                        self.texcoords.len()
                    )));
                }
            }
        }

        Ok(())
    }
}

/// Wavefront OBJ loader
pub struct ObjLoader;

impl ObjLoader {
    /// Load and triangulate an OBJ file
    pub fn load_obj<P: AsRef<Path>>(path: P) -> Result<RawMesh, ObjError> {
        let path_ref = path.as_ref();
        log::debug!("Loading OBJ from: {:?}", path_ref);

        let options = tobj::LoadOptions {
            triangulate: true,
            single_index: false,
            ..Default::default()
        };

        let (models, _materials) = tobj::load_obj(path_ref, &options).map_err(|source| ObjError::Load {
            path: path_ref.display().to_string(),
            source,
        })?;

        let raw = RawMesh::from_models(&models)?;
        if raw.corners.is_empty() {
            return Err(ObjError::InvalidFormat(format!("No faces found in {}", path_ref.display())));
        }

        log::info!(
            "Loaded {:?}: {} positions, {} texcoords, {} triangles",
            path_ref,
            raw.positions.len(),
            raw.texcoords.len(),
            raw.triangle_count()
        );
        Ok(raw)
    }
}
