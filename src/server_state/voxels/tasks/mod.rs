//! # Voxel Task System
//!
//! Tasks that run on pool workers to produce chunk payloads off the network thread.

pub mod chunk_generation_task;
