//! # Client View Tracker
//!
//! Per-client record of which chunks have been delivered (`sent`) and which are being
//! produced (`pending`). Owned and mutated by the network thread only.
//!
//! A coordinate enters `pending` only when it is in neither set, and leaves `pending` for
//! `sent` when the flush delivers it. Between flushes the two sets are disjoint.

use std::collections::HashSet;

use crate::network::PeerId;
use crate::server_state::voxels::coords::ChunkCoordinate;

/// Streaming state of one connected client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientViewState {
    pub peer: PeerId,
    /// Chunk the client was last seen in; `None` until the first move after (re)spawn
    pub last_center: Option<ChunkCoordinate>,
    /// Chunks delivered to the client
    pub sent: HashSet<ChunkCoordinate>,
    /// Chunks scheduled but not yet delivered
    pub pending: HashSet<ChunkCoordinate>,
    /// Name announced by the client's PlayerJoin packet
    pub name: Option<String>,
    /// View generation; work scheduled under an older generation is discarded
    pub generation: u64,
}

impl ClientViewState {
    fn new(peer: PeerId, generation: u64) -> Self {
        ClientViewState {
            peer,
            last_center: None,
            sent: HashSet::new(),
            pending: HashSet::new(),
            name: None,
            generation,
        }
    }

    /// Whether the chunk is already delivered or on its way.
    pub fn knows(&self, coord: &ChunkCoordinate) -> bool {
        self.sent.contains(coord) || self.pending.contains(coord)
    }
}

/// All connected clients.
///
/// A linear `Vec` is enough: client counts are small and lookups happen a handful of times
/// per tick.
#[derive(Default)]
pub struct ClientViewTracker {
    clients: Vec<ClientViewState>,
    next_generation: u64,
}

impl ClientViewTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// Starts tracking a client. An existing entry for the same peer is replaced.
    pub fn add(&mut self, peer: PeerId) -> &mut ClientViewState {
        let generation = self.bump_generation();
        let state = ClientViewState::new(peer, generation);
        match self.clients.iter().position(|c| c.peer == peer) {
            Some(index) => {
                self.clients[index] = state;
                &mut self.clients[index]
            }
            None => {
                self.clients.push(state);
                let last = self.clients.len() - 1;
                &mut self.clients[last]
            }
        }
    }

    /// Stops tracking a client. Returns its final state, if it was tracked.
    pub fn remove(&mut self, peer: PeerId) -> Option<ClientViewState> {
        let index = self.clients.iter().position(|c| c.peer == peer)?;
        Some(self.clients.swap_remove(index))
    }

    /// Forgets everything sent to a client, as after a respawn.
    ///
    /// The player name survives; the view generation advances.
    pub fn reset(&mut self, peer: PeerId) -> Option<&mut ClientViewState> {
        let generation = self.bump_generation();
        let state = self.clients.iter_mut().find(|c| c.peer == peer)?;
        state.last_center = None;
        state.sent.clear();
        state.pending.clear();
        state.generation = generation;
        Some(state)
    }

    pub fn find(&self, peer: PeerId) -> Option<&ClientViewState> {
        self.clients.iter().find(|c| c.peer == peer)
    }

    pub fn find_mut(&mut self, peer: PeerId) -> Option<&mut ClientViewState> {
        self.clients.iter_mut().find(|c| c.peer == peer)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_find_remove() {
        let mut tracker = ClientViewTracker::new();
        tracker.add(PeerId(1));
        tracker.add(PeerId(2));

        assert_eq!(tracker.len(), 2);
        assert!(tracker.find(PeerId(2)).is_some());
        assert_eq!(tracker.remove(PeerId(1)).map(|s| s.peer), Some(PeerId(1)));
        assert!(tracker.find(PeerId(1)).is_none());
        assert!(tracker.remove(PeerId(1)).is_none());
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn re_adding_a_peer_replaces_its_state() {
        let mut tracker = ClientViewTracker::new();
        tracker.add(PeerId(1)).sent.insert(ChunkCoordinate::new(0, 0, 0));
        tracker.add(PeerId(1));

        assert_eq!(tracker.len(), 1);
        assert!(tracker.find(PeerId(1)).unwrap().sent.is_empty());
    }

    #[test]
    fn reset_clears_view_but_keeps_name() {
        let mut tracker = ClientViewTracker::new();
        let state = tracker.add(PeerId(3));
        state.name = Some("miner".to_string());
        state.last_center = Some(ChunkCoordinate::new(1, 1, 1));
        state.sent.insert(ChunkCoordinate::new(1, 1, 1));
        state.pending.insert(ChunkCoordinate::new(2, 1, 1));
        let before = state.generation;

        let state = tracker.reset(PeerId(3)).unwrap();
        assert_eq!(state.last_center, None);
        assert!(state.sent.is_empty() && state.pending.is_empty());
        assert_eq!(state.name.as_deref(), Some("miner"));
        assert!(state.generation > before);
    }

    #[test]
    fn generations_are_unique_across_peers() {
        let mut tracker = ClientViewTracker::new();
        let a = tracker.add(PeerId(1)).generation;
        let b = tracker.add(PeerId(2)).generation;
        let c = tracker.reset(PeerId(1)).unwrap().generation;
        assert!(a < b && b < c);
    }

    #[test]
    fn reset_of_unknown_peer_is_none() {
        let mut tracker = ClientViewTracker::new();
        assert!(tracker.reset(PeerId(9)).is_none());
    }
}
