//! # Surface Extraction
//!
//! Turns a `DensityField` into a triangle mesh approximating its zero isosurface. The
//! extraction runs Surface Nets over the field lattice (via the `fast-surface-nets` crate),
//! then moves every vertex from chunk-local lattice space into world space and normalizes
//! the gradient-based normals.
//!
//! Extraction is a pure function of the field. Together with a pure density generator this
//! makes the whole generate → mesh → serialize chain deterministic, which the chunk cache's
//! tolerated duplicate-generation race depends on.

pub mod vertex;

use fast_surface_nets::ndshape::ConstShape3u32;
use fast_surface_nets::{surface_nets, SurfaceNetsBuffer};

use crate::server_state::voxels::density::{DensityField, FIELD_EDGE};
pub use vertex::Vertex;

const FIELD_EDGE_U32: u32 = FIELD_EDGE as u32;

/// Lattice shape of one density field.
type FieldShape = ConstShape3u32<{ FIELD_EDGE_U32 }, { FIELD_EDGE_U32 }, { FIELD_EDGE_U32 }>;

/// An indexed triangle list in world space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    /// Vertex data, positions in world units
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Whether the mesh has no triangles.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Extracts the isosurface of a density field.
///
/// Fields that are entirely inside or entirely outside the surface return an empty mesh
/// without running the extractor.
///
/// # Arguments
/// * `field` - The sampled density of one chunk
///
/// # Returns
/// The world-space mesh for the chunk
pub fn extract_surface(field: &DensityField) -> Mesh {
    if !field.has_surface() {
        return Mesh::default();
    }

    let mut buffer = SurfaceNetsBuffer::default();
    let max = FIELD_EDGE_U32 - 1;
    surface_nets(field.samples(), &FieldShape {}, [0; 3], [max; 3], &mut buffer);

    let origin = field.coord().world_origin();
    let offset = [origin.x as f32, origin.y as f32, origin.z as f32];

    let vertices = buffer
        .positions
        .iter()
        .zip(buffer.normals.iter())
        .map(|(position, normal)| {
            Vertex::new(
                [
                    position[0] + offset[0],
                    position[1] + offset[1],
                    position[2] + offset[2],
                ],
                normalize(*normal),
            )
        })
        .collect();

    Mesh {
        vertices,
        indices: buffer.indices,
    }
}

/// Normalizes a gradient; degenerate gradients point straight up.
fn normalize(v: [f32; 3]) -> [f32; 3] {
    let length = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
    if length <= f32::EPSILON || !length.is_finite() {
        return [0.0, 1.0, 0.0];
    }
    [v[0] / length, v[1] / length, v[2] / length]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_state::voxels::coords::{ChunkCoordinate, CHUNK_SIZE};
    use crate::server_state::voxels::density::DensityGenerator;
    use approx::assert_relative_eq;

    /// A flat ground plane at a fixed height.
    struct Plane(i32);

    impl DensityGenerator for Plane {
        fn density_at(&self, _x: i32, y: i32, _z: i32) -> f32 {
            y as f32 - self.0 as f32 - 0.5
        }
    }

    #[test]
    fn solid_and_empty_chunks_have_no_mesh() {
        let plane = Plane(0);
        assert!(extract_surface(&plane.generate(ChunkCoordinate::new(0, 5, 0))).is_empty());
        assert!(extract_surface(&plane.generate(ChunkCoordinate::new(0, -5, 0))).is_empty());
    }

    #[test]
    fn plane_mesh_sits_at_the_surface_in_world_space() {
        let plane = Plane(20);
        let coord = ChunkCoordinate::new(2, 1, -1);
        let mesh = extract_surface(&plane.generate(coord));

        assert!(!mesh.is_empty());
        assert_eq!(mesh.indices.len() % 3, 0);
        let min_x = (coord.x * CHUNK_SIZE) as f32;
        for vertex in &mesh.vertices {
            assert_relative_eq!(vertex.position[1], 20.5, epsilon = 1e-4);
            assert!(vertex.position[0] >= min_x && vertex.position[0] <= min_x + CHUNK_SIZE as f32);
            // Density grows upward, so the outward normal points up.
            assert_relative_eq!(vertex.normal[1], 1.0, epsilon = 1e-4);
        }
        for index in &mesh.indices {
            assert!((*index as usize) < mesh.vertices.len());
        }
    }

    #[test]
    fn degenerate_normals_fall_back_to_up() {
        assert_eq!(normalize([0.0, 0.0, 0.0]), [0.0, 1.0, 0.0]);
        let n = normalize([3.0, 0.0, 4.0]);
        assert_relative_eq!(n[0], 0.6);
        assert_relative_eq!(n[2], 0.8);
    }
}
