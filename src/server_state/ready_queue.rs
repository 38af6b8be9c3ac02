//! # Ready Queue
//!
//! Hand-off point between workers and the network thread. Workers push finished chunks; the
//! network thread swaps the whole queue out once per tick and sends what it finds.

use std::mem;

use crate::core::MtResource;
use crate::network::PeerId;
use crate::server_state::chunk_cache::SerializedChunkPayload;
use crate::server_state::voxels::coords::ChunkCoordinate;

/// A chunk payload that is ready to be sent to one client.
#[derive(Clone, Debug)]
pub struct ReadyItem {
    /// The client the chunk was scheduled for
    pub peer: PeerId,
    /// The chunk
    pub coord: ChunkCoordinate,
    /// The serialized ChunkData packet
    pub payload: SerializedChunkPayload,
    /// The client's view generation when the chunk was scheduled
    pub generation: u64,
}

/// Multi-producer, single-consumer list of ready items.
///
/// Cloning shares the same queue.
#[derive(Clone, Default)]
pub struct ReadyQueue {
    items: MtResource<Vec<ReadyItem>>,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an item. Callable from any thread.
    pub fn push(&self, item: ReadyItem) {
        self.items.lock().push(item);
    }

    /// Takes every queued item, leaving the queue empty.
    ///
    /// The lock is held only for the swap.
    pub fn drain(&self) -> Vec<ReadyItem> {
        mem::take(&mut *self.items.lock())
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn item(peer: u64, x: i32) -> ReadyItem {
        ReadyItem {
            peer: PeerId(peer),
            coord: ChunkCoordinate::new(x, 0, 0),
            payload: vec![1, 2, 3].into(),
            generation: 0,
        }
    }

    #[test]
    fn drain_empties_the_queue() {
        let queue = ReadyQueue::new();
        queue.push(item(1, 0));
        queue.push(item(1, 1));

        let batch = queue.drain();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[1].coord, ChunkCoordinate::new(1, 0, 0));
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn pushes_from_many_threads_all_arrive() {
        let queue = ReadyQueue::new();
        let handles: Vec<_> = (0..4)
            .map(|peer| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for x in 0..25 {
                        queue.push(item(peer, x));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.drain().len(), 100);
    }
}
