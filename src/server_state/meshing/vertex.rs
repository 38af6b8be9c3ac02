//! Vertex layout shared by the surface extractor and the ChunkData packet.

/// Number of `f32` values a vertex occupies on the wire.
pub const FLOATS_PER_VERTEX: usize = 6;

/// A mesh vertex in world space.
///
/// # Wire Layout
/// - Position: 3x f32 (12 bytes)
/// - Outward unit normal: 3x f32 (12 bytes)
///
/// Total size: 24 bytes, written big-endian by the protocol layer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vertex {
    /// Position in world units
    pub position: [f32; 3],
    /// Unit-length normal pointing out of the solid volume
    pub normal: [f32; 3],
}

impl Vertex {
    /// Creates a vertex from a position and a normal.
    pub fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Vertex { position, normal }
    }

    /// The interleaved wire representation: `[px, py, pz, nx, ny, nz]`.
    pub fn to_floats(&self) -> [f32; FLOATS_PER_VERTEX] {
        let [px, py, pz] = self.position;
        let [nx, ny, nz] = self.normal;
        [px, py, pz, nx, ny, nz]
    }

    /// Rebuilds a vertex from its interleaved wire representation.
    pub fn from_floats(floats: [f32; FLOATS_PER_VERTEX]) -> Self {
        let [px, py, pz, nx, ny, nz] = floats;
        Vertex::new([px, py, pz], [nx, ny, nz])
    }
}
