//! # Chunk Generation Task
//!
//! This module defines the `ChunkGenerationTask`, scheduled when a client moves into a view
//! that includes a chunk the cache does not hold yet.

use std::sync::Arc;

use crate::network::PeerId;
use crate::server_state::chunk_cache::ChunkCache;
use crate::server_state::ready_queue::{ReadyItem, ReadyQueue};
use crate::server_state::task_management::Task;
use crate::server_state::voxels::coords::ChunkCoordinate;

/// Produces one chunk for one client.
///
/// This task is responsible for:
/// 1. Fetching the chunk from the cache, generating and inserting it on a miss
/// 2. Handing the payload to the network thread through the ready queue
///
/// It captures identifiers and shared handles only. The client may have disconnected or
/// respawned by the time the task runs; the flush sorts that out.
pub struct ChunkGenerationTask {
    /// Shared chunk cache
    cache: Arc<ChunkCache>,
    /// Where the result goes
    ready: ReadyQueue,
    /// The client that asked for the chunk
    peer: PeerId,
    /// The chunk to produce
    coord: ChunkCoordinate,
    /// The client's view generation at scheduling time
    generation: u64,
}

impl ChunkGenerationTask {
    /// Creates a new chunk generation task.
    ///
    /// # Arguments
    /// * `cache` - The shared chunk cache
    /// * `ready` - The ready queue drained by the network thread
    /// * `peer` - The requesting client
    /// * `coord` - The chunk to produce
    /// * `generation` - The client's current view generation
    pub fn new(
        cache: Arc<ChunkCache>,
        ready: ReadyQueue,
        peer: PeerId,
        coord: ChunkCoordinate,
        generation: u64,
    ) -> Self {
        ChunkGenerationTask {
            cache,
            ready,
            peer,
            coord,
            generation,
        }
    }
}

impl Task for ChunkGenerationTask {
    fn process(self: Box<Self>) {
        let payload = self.cache.get_or_generate(self.coord);
        self.ready.push(ReadyItem {
            peer: self.peer,
            coord: self.coord,
            payload,
            generation: self.generation,
        });
    }

    fn name(&self) -> &'static str {
        "chunk-generation"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_state::voxels::density::TerrainGenerator;

    #[test]
    fn processing_fills_cache_and_ready_queue() {
        let cache = Arc::new(ChunkCache::new(Arc::new(TerrainGenerator::new(1))));
        let ready = ReadyQueue::new();
        let coord = ChunkCoordinate::new(2, -1, 0);

        Box::new(ChunkGenerationTask::new(cache.clone(), ready.clone(), PeerId(4), coord, 9))
            .process();

        let items = ready.drain();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].peer, PeerId(4));
        assert_eq!(items[0].coord, coord);
        assert_eq!(items[0].generation, 9);
        assert!(items[0].payload.ptr_eq(&cache.get(coord).unwrap()));
    }
}
