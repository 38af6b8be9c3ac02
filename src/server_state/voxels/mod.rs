//! # Voxel World
//!
//! Addressing and content of the streamed world.
//!
//! * **coords**: `ChunkCoordinate`, the key every other component uses
//! * **density**: the seed-keyed density function and its per-chunk sampled fields
//! * **tasks**: worker-side units of work that turn coordinates into ready payloads

pub mod coords;
pub mod density;
pub mod tasks;
