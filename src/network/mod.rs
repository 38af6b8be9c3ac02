//! # Network
//!
//! The transport boundary of the server. A `Transport` moves opaque packet bytes between
//! the server and its peers; `NetworkHandle` is the single-threaded handle the network
//! loop and the streaming scheduler share.
//!
//! `NetworkHandle` is built on `StResource`, so it can never leave the network thread:
//!
//! ```compile_fail
//! use voxel_stream_server::network::{loopback::LoopbackTransport, NetworkHandle};
//!
//! let network = NetworkHandle::new(LoopbackTransport::new());
//! std::thread::spawn(move || network.flush());
//! ```

pub mod loopback;
pub mod protocol;
pub mod tcp;

use std::{cell::RefCell, fmt, io, rc::Rc};

use log::warn;

use crate::core::StResource;

/// Opaque identifier of a connected peer. Never reused within one transport.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

/// Something that happened on the transport since the last poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetEvent {
    /// A new peer connected.
    Connected(PeerId),
    /// A peer disconnected or its connection failed.
    Disconnected(PeerId),
    /// A complete packet arrived from a peer.
    Received(PeerId, Vec<u8>),
}

/// A reliable, ordered, packet-oriented transport.
pub trait Transport {
    /// Collects every event that happened since the previous call. Never blocks.
    fn poll(&mut self) -> Vec<NetEvent>;

    /// Queues one packet for reliable delivery to `peer`.
    fn send_reliable(&mut self, peer: PeerId, bytes: &[u8]) -> io::Result<()>;

    /// Pushes queued outbound data towards the peers.
    fn flush(&mut self) -> io::Result<()>;
}

/// Shared handle to the server's transport.
///
/// Cloning the handle shares the same transport. All sends go through here; failures are
/// logged and never propagate past a single peer.
#[derive(Clone)]
pub struct NetworkHandle {
    transport: StResource<dyn Transport>,
}

impl NetworkHandle {
    /// Wraps a transport.
    pub fn new<T: Transport + 'static>(transport: T) -> Self {
        let shared: Rc<RefCell<dyn Transport>> = Rc::new(RefCell::new(transport));
        NetworkHandle {
            transport: StResource::from_rc(shared),
        }
    }

    /// Collects pending transport events.
    pub fn poll(&self) -> Vec<NetEvent> {
        self.transport.get_mut().poll()
    }

    /// Sends one packet reliably.
    ///
    /// # Returns
    /// `true` if the transport accepted the packet
    pub fn send_reliable(&self, peer: PeerId, bytes: &[u8]) -> bool {
        match self.transport.get_mut().send_reliable(peer, bytes) {
            Ok(()) => true,
            Err(err) => {
                warn!("Send of {} bytes to {} failed: {}", bytes.len(), peer, err);
                false
            }
        }
    }

    /// Flushes the transport's outbound buffers.
    pub fn flush(&self) {
        if let Err(err) = self.transport.get_mut().flush() {
            warn!("Transport flush failed: {}", err);
        }
    }
}
