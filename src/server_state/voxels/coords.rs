//! # Chunk Coordinates
//!
//! Conversion between continuous world positions and the integer chunk grid.

use std::fmt;

use cgmath::Point3;

/// The edge length of a chunk in world units.
pub const CHUNK_SIZE: i32 = 16;

/// Largest chunk index magnitude a client may move to.
///
/// Leaves headroom so that a view box around any accepted center, and the world origin of
/// every chunk in it, stay within `i32`.
pub const MAX_CHUNK_INDEX: i32 = i32::MAX / CHUNK_SIZE / 2;

/// Identifies one cubic chunk of world space.
///
/// Chunk `(x, y, z)` covers world positions `[x * CHUNK_SIZE, (x + 1) * CHUNK_SIZE)` on each
/// axis. Coordinates are plain values: they are copied into worker tasks and used as keys for
/// the cache and for every per-client set.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoordinate {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoordinate {
    /// Creates a coordinate from its three components.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Returns the chunk containing a world-space position.
    ///
    /// Uses floor division, so `-0.5` belongs to chunk `-1`, not chunk `0`.
    ///
    /// # Arguments
    /// * `position` - A position in world units
    pub fn containing(position: Point3<f32>) -> Self {
        let size = CHUNK_SIZE as f32;
        Self {
            x: (position.x / size).floor() as i32,
            y: (position.y / size).floor() as i32,
            z: (position.z / size).floor() as i32,
        }
    }

    /// Like `containing`, but rejects positions outside the streamable world.
    ///
    /// # Returns
    /// `None` if a component is not finite or its chunk index exceeds `MAX_CHUNK_INDEX`
    pub fn try_containing(position: Point3<f32>) -> Option<Self> {
        let size = CHUNK_SIZE as f32;
        let index = |v: f32| {
            let chunk = (v / size).floor();
            (chunk.is_finite() && chunk.abs() <= MAX_CHUNK_INDEX as f32).then_some(chunk as i32)
        };
        Some(Self {
            x: index(position.x)?,
            y: index(position.y)?,
            z: index(position.z)?,
        })
    }

    /// The world-space position of this chunk's minimum corner.
    ///
    /// Only meaningful for indices within `MAX_CHUNK_INDEX` (plus a view radius).
    pub fn world_origin(&self) -> Point3<i32> {
        Point3::new(
            self.x * CHUNK_SIZE,
            self.y * CHUNK_SIZE,
            self.z * CHUNK_SIZE,
        )
    }

    /// Every coordinate within a box around this one.
    ///
    /// The box spans `radius_xz` chunks on the x and z axes and `radius_y` chunks on the y
    /// axis in both directions, so it holds `(2·radius_xz + 1)² · (2·radius_y + 1)` entries.
    /// Iteration order is y-major, then z, then x.
    pub fn neighborhood(&self, radius_xz: i32, radius_y: i32) -> impl Iterator<Item = Self> {
        let center = *self;
        (-radius_y..=radius_y).flat_map(move |dy| {
            (-radius_xz..=radius_xz).flat_map(move |dz| {
                (-radius_xz..=radius_xz)
                    .map(move |dx| Self::new(center.x + dx, center.y + dy, center.z + dz))
            })
        })
    }
}

impl From<Point3<i32>> for ChunkCoordinate {
    fn from(point: Point3<i32>) -> Self {
        Self::new(point.x, point.y, point.z)
    }
}

impl fmt::Display for ChunkCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use test_case::test_case;

    #[test_case(0.0, 0.0, 0.0, 0, 0, 0)]
    #[test_case(15.99, 0.0, 0.0, 0, 0, 0)]
    #[test_case(16.0, 0.0, 0.0, 1, 0, 0)]
    #[test_case(-0.5, -16.0, -16.01, -1, -1, -2)]
    #[test_case(100.0, 40.0, -33.0, 6, 2, -3)]
    fn containing_uses_floor_division(x: f32, y: f32, z: f32, cx: i32, cy: i32, cz: i32) {
        assert_eq!(
            ChunkCoordinate::containing(Point3::new(x, y, z)),
            ChunkCoordinate::new(cx, cy, cz)
        );
    }

    #[test_case(1.0e12, 0.0, 0.0 ; "far beyond i32 chunks")]
    #[test_case(2.4e9, 0.0, 0.0 ; "origin would overflow")]
    #[test_case(0.0, -3.0e10, 0.0 ; "far below")]
    #[test_case(f32::NAN, 0.0, 0.0 ; "nan")]
    #[test_case(0.0, 0.0, f32::INFINITY ; "infinite")]
    fn positions_outside_the_world_are_rejected(x: f32, y: f32, z: f32) {
        assert_eq!(ChunkCoordinate::try_containing(Point3::new(x, y, z)), None);
    }

    #[test]
    fn edge_of_the_world_still_has_a_valid_view() {
        let edge = (MAX_CHUNK_INDEX as f32 - 1.0) * CHUNK_SIZE as f32;
        let center = ChunkCoordinate::try_containing(Point3::new(edge, 0.0, -edge)).unwrap();
        for coord in center.neighborhood(64, 2) {
            let origin = coord.world_origin();
            assert!(origin.x.checked_add(CHUNK_SIZE).is_some());
            assert!(origin.z.checked_sub(CHUNK_SIZE).is_some());
        }
    }

    #[test]
    fn in_world_positions_match_containing() {
        let position = Point3::new(-40.0, 300.5, 17.0);
        assert_eq!(
            ChunkCoordinate::try_containing(position),
            Some(ChunkCoordinate::containing(position))
        );
    }

    #[test]
    fn world_origin_scales_by_chunk_size() {
        let coord = ChunkCoordinate::new(-2, 1, 3);
        assert_eq!(coord.world_origin(), Point3::new(-32, 16, 48));
    }

    #[test_case(0, 0, 1)]
    #[test_case(1, 0, 9)]
    #[test_case(2, 1, 75)]
    fn neighborhood_size(radius_xz: i32, radius_y: i32, expected: usize) {
        let center = ChunkCoordinate::new(3, -1, 7);
        let all: HashSet<_> = center.neighborhood(radius_xz, radius_y).collect();
        assert_eq!(all.len(), expected);
        assert!(all.contains(&center));
    }
}
