//! # Density Generation
//!
//! Terrain is described by a scalar density function over world space: negative values are
//! inside solid ground, non-negative values are air. A chunk's `DensityField` is that
//! function sampled on the chunk's integer lattice plus one border layer on the positive
//! side, so that neighbouring chunks share their boundary samples.
//!
//! The default `TerrainGenerator` layers a fractal Perlin heightfield with a low-amplitude
//! 3-D Perlin term that carves overhangs. It is a pure function of `(seed, position)`, which
//! the chunk cache relies on (see `ChunkCache`).

use noise::{NoiseFn, Perlin};

use super::coords::{ChunkCoordinate, CHUNK_SIZE};

/// Samples per field edge: the chunk edge plus one border sample.
pub const FIELD_EDGE: usize = CHUNK_SIZE as usize + 1;
/// Samples per field.
pub const FIELD_LEN: usize = FIELD_EDGE * FIELD_EDGE * FIELD_EDGE;

/// Amplitude of the heightfield in world units.
const HEIGHT_RANGE: f64 = 32.0;
/// Frequency of the cave noise.
const CAVE_FREQUENCY: f64 = 0.045;
/// Amplitude of the cave noise; small relative to the heightfield slope.
const CAVE_STRENGTH: f64 = 6.0;

/// A seed-keyed, deterministic density function.
///
/// Implementations must be pure: the same position always yields the same value, on any
/// thread. Worker threads call `generate` concurrently through a shared reference.
pub trait DensityGenerator: Send + Sync {
    /// Density at an integer world position.
    fn density_at(&self, x: i32, y: i32, z: i32) -> f32;

    /// Samples the field for one chunk.
    fn generate(&self, coord: ChunkCoordinate) -> DensityField {
        let origin = coord.world_origin();
        let mut samples = Vec::with_capacity(FIELD_LEN);
        for k in 0..FIELD_EDGE as i32 {
            for j in 0..FIELD_EDGE as i32 {
                for i in 0..FIELD_EDGE as i32 {
                    samples.push(self.density_at(origin.x + i, origin.y + j, origin.z + k));
                }
            }
        }
        DensityField {
            coord,
            samples: samples.into_boxed_slice(),
        }
    }
}

/// A sampled density field for one chunk.
///
/// Samples are stored x-fastest, then y, then z: index `i + j·P + k·P²` with
/// `P = FIELD_EDGE`. This matches the linearization used by the surface extractor.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityField {
    coord: ChunkCoordinate,
    samples: Box<[f32]>,
}

impl DensityField {
    /// The chunk this field was sampled for.
    pub fn coord(&self) -> ChunkCoordinate {
        self.coord
    }

    /// All samples in storage order.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample at chunk-local lattice position `(i, j, k)`, each in `0..FIELD_EDGE`.
    ///
    /// # Panics
    /// Panics if any index is out of range.
    pub fn get(&self, i: usize, j: usize, k: usize) -> f32 {
        self.samples[i + FIELD_EDGE * j + FIELD_EDGE * FIELD_EDGE * k]
    }

    /// Whether any sample lies inside the surface and any lies outside.
    ///
    /// Fields without a sign change produce an empty mesh.
    pub fn has_surface(&self) -> bool {
        let inside = self.samples.iter().any(|s| *s < 0.0);
        let outside = self.samples.iter().any(|s| *s >= 0.0);
        inside && outside
    }
}

/// Rolling-hills terrain with shallow overhangs.
#[derive(Clone)]
pub struct TerrainGenerator {
    height_noise: Perlin,
    cave_noise: Perlin,
    base_frequency: f64,
    octaves: usize,
    persistence: f64,
    lacunarity: f64,
}

impl TerrainGenerator {
    /// Creates a generator for the given world seed.
    pub fn new(seed: u32) -> Self {
        Self {
            height_noise: Perlin::new(seed),
            cave_noise: Perlin::new(seed.wrapping_add(1)),
            base_frequency: 0.01,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }

    /// Height of the heightfield component at a horizontal position, in world units.
    pub fn surface_height(&self, x: f64, z: f64) -> f64 {
        let mut amplitude = 1.0;
        let mut frequency = self.base_frequency;
        let mut noise_height = 0.0;
        let mut max_value = 0.0;

        for _ in 0..self.octaves {
            noise_height += self.height_noise.get([x * frequency, z * frequency]) * amplitude;
            max_value += amplitude;
            amplitude *= self.persistence;
            frequency *= self.lacunarity;
        }

        (noise_height / max_value) * HEIGHT_RANGE
    }
}

impl DensityGenerator for TerrainGenerator {
    fn density_at(&self, x: i32, y: i32, z: i32) -> f32 {
        let (x, y, z) = (x as f64, y as f64, z as f64);
        let height = y - self.surface_height(x, z);
        let caves = self.cave_noise.get([
            x * CAVE_FREQUENCY,
            y * CAVE_FREQUENCY,
            z * CAVE_FREQUENCY,
        ]) * CAVE_STRENGTH;
        (height + caves) as f32
    }
}
