//! # Error Types
//!
//! Two error families exist. `ProtocolError` describes a malformed packet; it is always
//! recoverable (the packet is dropped and the connection is kept). `StreamError` covers
//! everything that can go wrong while bringing the server up; these are fatal.

use std::io;

use thiserror::Error;

use crate::network::protocol::PacketTag;

/// Result alias used by fallible server operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Decoding failures for inbound and outbound packets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty packet")]
    Empty,

    #[error("unknown packet tag {0:#04x}")]
    UnknownTag(u8),

    #[error("{tag:?} packet truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated {
        tag: PacketTag,
        needed: usize,
        remaining: usize,
    },

    #[error("vertex float count {0} is not a multiple of 6")]
    VertexStride(u32),

    #[error("player name is not valid UTF-8")]
    InvalidName,

    #[error("{tag:?} packet has {extra} trailing bytes")]
    TrailingBytes { tag: PacketTag, extra: usize },
}

/// Server-level failures.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid configuration: {field} = {value} ({reason})")]
    InvalidConfig {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("failed to read config {path}: {source}")]
    ConfigRead { path: String, source: io::Error },

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: String,
        source: serde_json::Error,
    },

    #[error("failed to spawn worker thread {index}: {source}")]
    WorkerSpawn { index: usize, source: io::Error },

    #[error("failed to create network host on {addr}: {source}")]
    NetworkBind { addr: String, source: io::Error },
}
