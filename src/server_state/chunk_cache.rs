//! # Chunk Cache
//!
//! The process-wide store of serialized chunks. Every coordinate is generated, meshed and
//! serialized at most once in the common case; afterwards all clients share the same
//! immutable payload.
//!
//! ## Locking
//!
//! The map lock is held only for the lookup and for the insert. Generation runs unlocked, so
//! two workers asked for the same uncached coordinate may both generate it. That race is
//! tolerated: generation is a pure function of `(seed, coordinate)`, both payloads are
//! byte-identical, and the later insert simply replaces an equal value.
//!
//! ## Lifetime
//!
//! Entries live for the whole process. There is no eviction and no invalidation.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::debug;

use crate::core::MtResource;
use crate::network::protocol::pack_chunk;
use crate::server_state::meshing::extract_surface;
use crate::server_state::voxels::coords::ChunkCoordinate;
use crate::server_state::voxels::density::DensityGenerator;

/// A complete, immutable ChunkData packet shared by reference count.
///
/// Cloning is cheap; every client receiving a chunk gets a clone of the same buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializedChunkPayload(Arc<[u8]>);

impl SerializedChunkPayload {
    /// The packet bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether two payloads share one allocation.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Vec<u8>> for SerializedChunkPayload {
    fn from(bytes: Vec<u8>) -> Self {
        SerializedChunkPayload(bytes.into())
    }
}

impl Deref for SerializedChunkPayload {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

/// Thread-safe map from chunk coordinate to serialized payload.
pub struct ChunkCache {
    entries: MtResource<HashMap<ChunkCoordinate, SerializedChunkPayload>>,
    generator: Arc<dyn DensityGenerator>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ChunkCache {
    /// Creates an empty cache that fills itself from `generator`.
    pub fn new(generator: Arc<dyn DensityGenerator>) -> Self {
        ChunkCache {
            entries: MtResource::new(HashMap::new()),
            generator,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Looks up a payload without generating.
    pub fn get(&self, coord: ChunkCoordinate) -> Option<SerializedChunkPayload> {
        let found = self.entries.lock().get(&coord).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Returns the cached payload for `coord`, producing and inserting it first if needed.
    ///
    /// Safe to call from any thread. See the module docs for the duplicate-generation race.
    ///
    /// # Arguments
    /// * `coord` - The chunk to fetch
    ///
    /// # Returns
    /// The serialized ChunkData packet for the chunk
    pub fn get_or_generate(&self, coord: ChunkCoordinate) -> SerializedChunkPayload {
        if let Some(payload) = self.get(coord) {
            return payload;
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let payload = self.produce(coord);
        self.entries.lock().insert(coord, payload.clone());
        payload
    }

    /// Runs the generate → mesh → serialize chain without touching the map.
    pub fn produce(&self, coord: ChunkCoordinate) -> SerializedChunkPayload {
        let field = self.generator.generate(coord);
        let mesh = extract_surface(&field);
        debug!(
            "Generated chunk {} ({} vertices, {} triangles)",
            coord,
            mesh.vertices.len(),
            mesh.triangle_count()
        );
        pack_chunk(coord, &mesh).into()
    }

    /// Number of cached chunks.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lookups answered from the map.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that had to generate.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::protocol::Packet;
    use crate::server_state::voxels::density::TerrainGenerator;
    use std::sync::Barrier;
    use std::thread;

    fn cache(seed: u32) -> ChunkCache {
        ChunkCache::new(Arc::new(TerrainGenerator::new(seed)))
    }

    /// A chunk that straddles the terrain surface near the origin.
    fn surface_chunk(generator: &TerrainGenerator) -> ChunkCoordinate {
        (-4..=4)
            .map(|y| ChunkCoordinate::new(0, y, 0))
            .find(|coord| generator.generate(*coord).has_surface())
            .expect("terrain crosses the origin column")
    }

    #[test]
    fn miss_then_hit_returns_the_same_buffer() {
        let cache = cache(7);
        let coord = ChunkCoordinate::new(0, 0, 0);

        assert!(cache.get(coord).is_none());
        let first = cache.get_or_generate(coord);
        let second = cache.get_or_generate(coord);

        assert!(first.ptr_eq(&second));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn payload_is_a_chunk_packet_for_the_coordinate() {
        let generator = TerrainGenerator::new(3);
        let coord = surface_chunk(&generator);
        let cache = cache(3);

        let payload = cache.get_or_generate(coord);
        match Packet::unpack(&payload).unwrap() {
            Packet::ChunkData { coord: decoded, vertices, indices } => {
                assert_eq!(decoded, coord);
                assert!(!vertices.is_empty());
                assert_eq!(indices.len() % 3, 0);
            }
            other => panic!("unexpected packet {:?}", other),
        }
    }

    #[test]
    fn generation_is_deterministic_across_caches_and_threads() {
        let generator = TerrainGenerator::new(11);
        let coord = surface_chunk(&generator);
        let local = cache(11).get_or_generate(coord);

        let remote = thread::spawn(move || cache(11).get_or_generate(coord))
            .join()
            .unwrap();
        assert_eq!(local.bytes(), remote.bytes());
    }

    #[test]
    fn concurrent_requests_for_one_coordinate_agree() {
        const REQUESTS: usize = 8;
        let cache = Arc::new(cache(5));
        let barrier = Arc::new(Barrier::new(REQUESTS));
        let coord = ChunkCoordinate::new(0, 1, 0);

        let handles: Vec<_> = (0..REQUESTS)
            .map(|_| {
                let cache = cache.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    cache.get_or_generate(coord)
                })
            })
            .collect();
        let payloads: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(cache.len(), 1);
        for payload in &payloads[1..] {
            assert_eq!(payload.bytes(), payloads[0].bytes());
        }
        assert_eq!(cache.get(coord).unwrap().bytes(), payloads[0].bytes());
    }
}
