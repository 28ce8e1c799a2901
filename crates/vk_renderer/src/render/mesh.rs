//! Mesh representation for 3D models
//!
//! Pure vertex/index data with no backend types; the Vulkan vertex input
//! description lives in `backends::vulkan::rendering::vertex_layout`.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};

use crate::assets::RawMesh;

/// Color given to every imported vertex
pub const IMPORTED_VERTEX_COLOR: [f32; 3] = [1.0, 1.0, 1.0];

/// Vertex record uploaded to the vertex buffer
///
/// `#[repr(C)]` keeps the field offsets stable: position at 0, color at 12,
/// texture coordinate at 24, 32 bytes in total.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Linear RGB color
    pub color: [f32; 3],
    /// Texture coordinate with v pointing down the image
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Create a vertex
    pub const fn new(position: [f32; 3], color: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self { position, color, tex_coord }
    }
}

/// Hashable identity of a vertex, used as the dedup key
///
/// Agrees with `Vertex`'s `PartialEq`: `-0.0` keys the same as `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VertexKey([u32; 8]);

impl From<&Vertex> for VertexKey {
    fn from(vertex: &Vertex) -> Self {
        let [px, py, pz] = vertex.position;
        let [r, g, b] = vertex.color;
        let [u, v] = vertex.tex_coord;
        Self([px, py, pz, r, g, b, u, v].map(|x| (if x == 0.0 { 0.0_f32 } else { x }).to_bits()))
    }
}

/// Deduplicated geometry ready for upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Unique vertices in first-occurrence order
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Collapse repeated vertices, keeping the first occurrence of each
    pub fn from_vertices<I>(vertices: I) -> Self
    where
        I: IntoIterator<Item = Vertex>,
    {
        let mut unique: HashMap<VertexKey, u32> = HashMap::new();
        let mut mesh = Self::default();

        for vertex in vertices {
            let next_index = mesh.vertices.len() as u32;
            let index = *unique.entry(VertexKey::from(&vertex)).or_insert_with(|| {
                mesh.vertices.push(vertex);
                next_index
            });
            mesh.indices.push(index);
        }

        mesh
    }

    /// Build from a loaded OBJ mesh: flip v, paint white, deduplicate
    pub fn from_raw(raw: &RawMesh) -> Self {
        let corners = raw.corners.iter().map(|corner| {
            let position = raw.positions[corner.position_index as usize];
            let tex_coord = corner
                .texcoord_index
                .map_or([0.0, 0.0], |index| {
                    let [u, v] = raw.texcoords[index as usize];
                    [u, 1.0 - v]
                });
            Vertex::new(position, IMPORTED_VERTEX_COLOR, tex_coord)
        });

        let mesh = Self::from_vertices(corners);
        log::debug!(
            "Deduplicated {} face corners into {} unique vertices",
            raw.corners.len(),
            mesh.vertices.len()
        );
        mesh
    }

    /// Two stacked colored quads, used when no model is configured
    pub fn demo_quads() -> Self {
        let vertices = vec![
            Vertex::new([-0.5, -0.5, 0.0], [1.0, 0.0, 0.0], [1.0, 0.0]),
            Vertex::new([0.5, -0.5, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex::new([0.5, 0.5, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            Vertex::new([-0.5, 0.5, 0.0], [1.0, 1.0, 1.0], [1.0, 1.0]),
            Vertex::new([-0.5, -0.5, -0.5], [1.0, 0.0, 0.0], [0.0, 0.0]),
            Vertex::new([0.5, -0.5, -0.5], [0.0, 1.0, 0.0], [1.0, 0.0]),
            Vertex::new([0.5, 0.5, -0.5], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([-0.5, 0.5, -0.5], [1.0, 1.0, 1.0], [0.0, 1.0]),
        ];
        let indices = vec![0, 1, 2, 2, 3, 0, 4, 5, 6, 6, 7, 4];
        Self { vertices, indices }
    }

    /// Number of indices drawn
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Vertex data as raw bytes
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index data as raw bytes
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Expand back into one vertex per index
    pub fn expanded(&self) -> impl Iterator<Item = Vertex> + '_ {
        self.indices.iter().map(|&i| self.vertices[i as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::FaceCorner;
    use std::collections::HashSet;

    fn corner(position_index: u32, texcoord_index: Option<u32>) -> FaceCorner {
        FaceCorner { position_index, texcoord_index }
    }

    fn quad_with_shared_edge() -> RawMesh {
        RawMesh {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            texcoords: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            corners: vec![
                corner(0, Some(0)), corner(1, Some(1)), corner(2, Some(2)),
                corner(2, Some(2)), corner(3, Some(3)), corner(0, Some(0)),
            ],
        }
    }

    #[test]
    fn test_vertex_layout_is_32_bytes() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
        assert_eq!(std::mem::align_of::<Vertex>(), 4);
    }

    #[test]
    fn test_shared_corners_collapse() {
        let mesh = MeshData::from_raw(&quad_with_shared_edge());
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 2, 3, 0]);
    }

    #[test]
    fn test_unique_count_matches_distinct_tuples() {
        let raw = quad_with_shared_edge();
        let mesh = MeshData::from_raw(&raw);

        let distinct: HashSet<VertexKey> = mesh.expanded().map(|v| VertexKey::from(&v)).collect();
        assert_eq!(mesh.vertices.len(), distinct.len());
        assert_eq!(mesh.indices.len(), raw.corners.len());
    }

    #[test]
    fn test_same_position_different_texcoord_stays_distinct() {
        let raw = RawMesh {
            positions: vec![[0.0, 0.0, 0.0]],
            texcoords: vec![[0.0, 0.0], [0.5, 0.5]],
            corners: vec![corner(0, Some(0)), corner(0, Some(1)), corner(0, Some(0))],
        };
        let mesh = MeshData::from_raw(&raw);
        assert_eq!(mesh.vertices.len(), 2);
        assert_eq!(mesh.indices, vec![0, 1, 0]);
    }

    #[test]
    fn test_first_occurrence_wins_ordering() {
        let a = Vertex::new([1.0, 0.0, 0.0], [1.0; 3], [0.0, 0.0]);
        let b = Vertex::new([2.0, 0.0, 0.0], [1.0; 3], [0.0, 0.0]);
        let mesh = MeshData::from_vertices([b, a, b, a]);
        assert_eq!(mesh.vertices, vec![b, a]);
        assert_eq!(mesh.indices, vec![0, 1, 0, 1]);
    }

    #[test]
    fn test_signed_zero_vertices_collapse() {
        let positive = Vertex::new([0.0, 1.0, 0.0], [1.0; 3], [0.0, 0.5]);
        let negative = Vertex::new([-0.0, 1.0, -0.0], [1.0; 3], [-0.0, 0.5]);
        assert_eq!(positive, negative);

        let mesh = MeshData::from_vertices([positive, negative]);
        assert_eq!(mesh.vertices.len(), 1);
        assert_eq!(mesh.indices, vec![0, 0]);
    }

    #[test]
    fn test_dedup_is_idempotent() {
        let mesh = MeshData::from_raw(&quad_with_shared_edge());
        let again = MeshData::from_vertices(mesh.expanded());
        assert_eq!(again, mesh);
    }

    #[test]
    fn test_import_flips_v_and_paints_white() {
        let raw = RawMesh {
            positions: vec![[0.0; 3]; 3],
            texcoords: vec![[0.25, 0.75]],
            corners: vec![corner(0, Some(0)), corner(1, Some(0)), corner(2, None)],
        };
        let mesh = MeshData::from_raw(&raw);
        assert_eq!(mesh.vertices[0].tex_coord, [0.25, 0.25]);
        assert_eq!(mesh.vertices[0].color, IMPORTED_VERTEX_COLOR);
        assert_eq!(mesh.vertices[1].tex_coord, [0.0, 0.0]);
    }

    #[test]
    fn test_demo_quads() {
        let mesh = MeshData::demo_quads();
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.index_count(), 12);
        assert_eq!(mesh.vertex_bytes().len(), 8 * 32);
        assert_eq!(mesh.index_bytes().len(), 12 * 4);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertices.len()));
    }
}
