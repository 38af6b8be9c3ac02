//! # Core Module
//!
//! This module provides the small set of shared-ownership primitives used throughout
//! the streaming server. There are exactly two flavours, and which one a piece of
//! state uses says which threads are allowed to touch it.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource behind a mutex. Used for the
//!   state that worker threads write to (the chunk cache map and the ready queue).
//! - `StResource`: Single-threaded reference-counted resource with interior mutability.
//!   It is neither `Send` nor `Sync`, so anything wrapped in it stays on the thread that
//!   created it. The network handle is built on it.
//!
//! ## Usage
//! ```rust
//! use voxel_stream_server::core::{MtResource, StResource};
//!
//! // Thread-safe resource
//! let counter = MtResource::new(0);
//! *counter.lock() += 1;
//! assert_eq!(*counter.lock(), 1);
//!
//! // Single-threaded resource
//! let names = StResource::new(Vec::<String>::new());
//! names.get_mut().push("ada".to_string());
//! assert_eq!(names.get().len(), 1);
//! ```

pub mod mt_resource;
pub mod st_resource;

pub use mt_resource::MtResource;
pub use st_resource::StResource;
