//! In-memory transport.
//!
//! `LoopbackTransport` has no sockets: events are injected by the caller and sent packets
//! are recorded for inspection. Clones share the same state, so a test can hand one clone
//! to a `NetworkHandle` and keep another to drive and observe it.

use std::{
    collections::{HashSet, VecDeque},
    io,
};

use crate::core::StResource;

use super::{NetEvent, PeerId, Transport};

#[derive(Default)]
struct LoopbackState {
    connected: HashSet<PeerId>,
    inbound: VecDeque<NetEvent>,
    sent: Vec<(PeerId, Vec<u8>)>,
    flushes: usize,
}

/// Transport that keeps everything in memory.
#[derive(Clone)]
pub struct LoopbackTransport {
    state: StResource<LoopbackState>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    pub fn new() -> Self {
        LoopbackTransport {
            state: StResource::new(LoopbackState::default()),
        }
    }

    /// Simulates a peer connecting. The `Connected` event is returned by the next poll.
    pub fn connect(&self, peer: PeerId) {
        let mut state = self.state.get_mut();
        state.connected.insert(peer);
        state.inbound.push_back(NetEvent::Connected(peer));
    }

    /// Simulates a peer dropping. Later sends to it fail.
    pub fn disconnect(&self, peer: PeerId) {
        let mut state = self.state.get_mut();
        state.connected.remove(&peer);
        state.inbound.push_back(NetEvent::Disconnected(peer));
    }

    /// Simulates a packet arriving from `peer`.
    pub fn deliver(&self, peer: PeerId, bytes: Vec<u8>) {
        self.state
            .get_mut()
            .inbound
            .push_back(NetEvent::Received(peer, bytes));
    }

    /// Removes and returns every packet sent so far, in send order.
    pub fn take_sent(&self) -> Vec<(PeerId, Vec<u8>)> {
        std::mem::take(&mut self.state.get_mut().sent)
    }

    /// Packets sent to one peer so far, in send order. Does not consume them.
    pub fn sent_to(&self, peer: PeerId) -> Vec<Vec<u8>> {
        self.state
            .get()
            .sent
            .iter()
            .filter(|(to, _)| *to == peer)
            .map(|(_, bytes)| bytes.clone())
            .collect()
    }

    /// Number of times the transport was flushed.
    pub fn flush_count(&self) -> usize {
        self.state.get().flushes
    }
}

impl Transport for LoopbackTransport {
    fn poll(&mut self) -> Vec<NetEvent> {
        self.state.get_mut().inbound.drain(..).collect()
    }

    fn send_reliable(&mut self, peer: PeerId, bytes: &[u8]) -> io::Result<()> {
        let mut state = self.state.get_mut();
        if !state.connected.contains(&peer) {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("{} is not connected", peer),
            ));
        }
        state.sent.push((peer, bytes.to_vec()));
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.state.get_mut().flushes += 1;
        Ok(())
    }
}
