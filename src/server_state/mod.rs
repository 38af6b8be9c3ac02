//! # Server State Module
//!
//! The streaming scheduler and everything it coordinates.
//!
//! ## Key Components
//!
//! * `ServerState` - decides which chunks each client needs and delivers them
//! * `chunk_cache` - process-wide store of serialized chunk packets
//! * `ready_queue` - hand-off from workers back to the network thread
//! * `view_tracker` - per-client sent/pending bookkeeping
//! * `task_management` - the worker pool
//! * `voxels` / `meshing` - the generate → mesh half of chunk production
//! * `spawn` - spawn height search
//!
//! ## Threading
//!
//! `ServerState` lives on the network thread. Every method here runs there and is the only
//! code that touches client state or the transport. Work handed to the pool carries a peer
//! id, a coordinate and a view generation plus `Arc` handles; it never borrows into the
//! tracker. Results come back through the ready queue and are sent by `flush`.
//!
//! ## Per-tick flow
//!
//! 1. Transport events are routed through `handle_event`
//! 2. Moves schedule the chunks entering the client's view
//! 3. `flush` drains the ready queue and sends everything that is still wanted

pub mod chunk_cache;
pub mod meshing;
pub mod ready_queue;
pub mod spawn;
pub mod task_management;
pub mod view_tracker;
pub mod voxels;

use std::sync::Arc;

use cgmath::Point3;
use log::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::StreamResult;
use crate::network::protocol::Packet;
use crate::network::{NetEvent, NetworkHandle, PeerId};
use chunk_cache::ChunkCache;
use ready_queue::{ReadyItem, ReadyQueue};
use spawn::find_spawn_y;
use task_management::TaskPool;
use view_tracker::{ClientViewState, ClientViewTracker};
use voxels::coords::ChunkCoordinate;
use voxels::density::DensityGenerator;
use voxels::tasks::chunk_generation_task::ChunkGenerationTask;

/// The streaming scheduler.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use voxel_stream_server::config::ServerConfig;
/// use voxel_stream_server::network::{loopback::LoopbackTransport, NetworkHandle, PeerId};
/// use voxel_stream_server::server_state::{voxels::density::TerrainGenerator, ServerState};
///
/// let config = ServerConfig {
///     view_radius_xz: 1,
///     view_radius_y: 1,
///     worker_threads: Some(1),
///     ..ServerConfig::default()
/// };
/// let mut server = ServerState::new(config, Arc::new(TerrainGenerator::new(42))).unwrap();
///
/// let loopback = LoopbackTransport::new();
/// let network = NetworkHandle::new(loopback.clone());
/// loopback.connect(PeerId(1));
///
/// server.tick(&network);
/// assert!(server.client(PeerId(1)).is_some());
/// ```
pub struct ServerState {
    config: ServerConfig,
    generator: Arc<dyn DensityGenerator>,
    cache: Arc<ChunkCache>,
    ready: ReadyQueue,
    clients: ClientViewTracker,
    pool: TaskPool,
}

impl ServerState {
    /// Creates the scheduler and starts the worker pool.
    ///
    /// # Arguments
    /// * `config` - Validated before anything is started
    /// * `generator` - The world's density function
    ///
    /// # Returns
    /// The scheduler, or the configuration / worker spawn error
    pub fn new(config: ServerConfig, generator: Arc<dyn DensityGenerator>) -> StreamResult<Self> {
        config.validate()?;
        let pool = TaskPool::new(config.resolved_worker_threads())?;
        let cache = Arc::new(ChunkCache::new(generator.clone()));

        info!(
            "[ServerState] View radius {}x{}, spawn burst radius {}",
            config.view_radius_xz, config.view_radius_y, config.spawn_burst_radius
        );

        Ok(ServerState {
            config,
            generator,
            cache,
            ready: ReadyQueue::new(),
            clients: ClientViewTracker::new(),
            pool,
        })
    }

    /// Starts streaming to a newly connected client.
    ///
    /// The client receives the spawn burst and its spawn position before this returns.
    pub fn on_client_connect(&mut self, peer: PeerId, network: &NetworkHandle) {
        self.clients.add(peer);
        info!("[ServerState] {} connected ({} clients)", peer, self.clients.len());
        self.spawn_client(peer, network);
    }

    /// Reacts to a position update.
    ///
    /// Positions that are not finite or lie beyond `MAX_CHUNK_INDEX` chunks are dropped.
    /// Nothing happens while the client stays inside the same chunk. When it crosses a chunk
    /// boundary, every coordinate of the new view that the client has neither received nor
    /// been promised is scheduled: cached chunks go straight to the ready queue, the rest
    /// are generated by the pool.
    ///
    /// # Arguments
    /// * `peer` - The moving client
    /// * `x`, `y`, `z` - The client's world position
    pub fn on_client_move(&mut self, peer: PeerId, x: f32, y: f32, z: f32) {
        let Some(state) = self.clients.find_mut(peer) else {
            debug!("[ServerState] Ignoring move from untracked {}", peer);
            return;
        };
        let Some(center) = ChunkCoordinate::try_containing(Point3::new(x, y, z)) else {
            warn!(
                "[ServerState] Dropping move of {} to ({}, {}, {}): outside the world",
                peer, x, y, z
            );
            return;
        };
        if state.last_center == Some(center) {
            return;
        }
        state.last_center = Some(center);

        let generation = state.generation;
        let mut from_cache = 0;
        let mut submitted = 0;
        for coord in center.neighborhood(self.config.view_radius_xz, self.config.view_radius_y) {
            if state.knows(&coord) {
                continue;
            }
            match self.cache.get(coord) {
                Some(payload) => {
                    state.sent.insert(coord);
                    self.ready.push(ReadyItem {
                        peer,
                        coord,
                        payload,
                        generation,
                    });
                    from_cache += 1;
                }
                None => {
                    state.pending.insert(coord);
                    self.pool.submit(Box::new(ChunkGenerationTask::new(
                        self.cache.clone(),
                        self.ready.clone(),
                        peer,
                        coord,
                        generation,
                    )));
                    submitted += 1;
                }
            }
        }
        debug!(
            "[ServerState] {} entered {}: {} cached, {} scheduled",
            peer, center, from_cache, submitted
        );
    }

    /// Puts a client back at its spawn point with a fresh view.
    pub fn on_client_respawn(&mut self, peer: PeerId, network: &NetworkHandle) {
        if self.clients.reset(peer).is_none() {
            debug!("[ServerState] Ignoring respawn of untracked {}", peer);
            return;
        }
        info!("[ServerState] {} respawning", peer);
        self.spawn_client(peer, network);
    }

    /// Stops tracking a client. Work already scheduled for it runs to completion and is
    /// discarded at flush.
    pub fn on_client_disconnect(&mut self, peer: PeerId) {
        if let Some(state) = self.clients.remove(peer) {
            info!(
                "[ServerState] {} disconnected after {} chunks ({} clients)",
                state.name.as_deref().unwrap_or("unnamed client"),
                state.sent.len(),
                self.clients.len()
            );
        }
    }

    /// Decodes and routes one inbound packet.
    ///
    /// Malformed packets and packets only the server may send are dropped; the connection
    /// is kept.
    pub fn handle_packet(&mut self, peer: PeerId, bytes: &[u8], network: &NetworkHandle) {
        let packet = match Packet::unpack(bytes) {
            Ok(packet) => packet,
            Err(err) => {
                warn!("[ServerState] Dropping malformed packet from {}: {}", peer, err);
                return;
            }
        };

        match packet {
            Packet::PlayerMove { x, y, z, .. } => self.on_client_move(peer, x, y, z),
            Packet::PlayerJoin { name } => match self.clients.find_mut(peer) {
                Some(state) => {
                    info!("[ServerState] {} is {}", peer, name);
                    state.name = Some(name);
                }
                None => debug!("[ServerState] Ignoring join from untracked {}", peer),
            },
            Packet::PlayerLeave => self.on_client_disconnect(peer),
            Packet::RespawnRequest => self.on_client_respawn(peer, network),
            other @ (Packet::ChunkData { .. } | Packet::SpawnPosition { .. }) => {
                warn!("[ServerState] {} sent server-only packet {:?}", peer, other.tag());
            }
        }
    }

    /// Routes one transport event.
    pub fn handle_event(&mut self, event: NetEvent, network: &NetworkHandle) {
        match event {
            NetEvent::Connected(peer) => self.on_client_connect(peer, network),
            NetEvent::Disconnected(peer) => self.on_client_disconnect(peer),
            NetEvent::Received(peer, bytes) => self.handle_packet(peer, &bytes, network),
        }
    }

    /// Sends every ready chunk that is still wanted, then flushes the transport.
    ///
    /// Items for clients that are gone, or that were scheduled before the client's last
    /// respawn, are dropped.
    ///
    /// # Returns
    /// The number of chunk packets handed to the transport
    pub fn flush(&mut self, network: &NetworkHandle) -> usize {
        let batch = self.ready.drain();
        let mut sent = 0;
        for item in batch {
            let Some(state) = self.clients.find_mut(item.peer) else {
                continue;
            };
            if state.generation != item.generation {
                debug!(
                    "[ServerState] Dropping {} for {}: scheduled before respawn",
                    item.coord, item.peer
                );
                continue;
            }
            state.pending.remove(&item.coord);
            state.sent.insert(item.coord);
            if network.send_reliable(item.peer, &item.payload) {
                sent += 1;
            }
        }
        network.flush();
        sent
    }

    /// Runs one server tick: routes all pending transport events, then flushes.
    ///
    /// # Returns
    /// The number of chunk packets sent by the flush
    pub fn tick(&mut self, network: &NetworkHandle) -> usize {
        for event in network.poll() {
            self.handle_event(event, network);
        }
        self.flush(network)
    }

    /// Stops the worker pool. Queued work is dropped.
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
        info!(
            "[ServerState] Shut down with {} cached chunks ({} hits, {} misses)",
            self.cache.len(),
            self.cache.hits(),
            self.cache.misses()
        );
    }

    /// Whether the pool has neither queued nor running work.
    ///
    /// Once idle, every scheduled chunk is in the ready queue.
    pub fn is_idle(&self) -> bool {
        self.pool.queued() == 0 && self.pool.active() == 0
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ChunkCache> {
        &self.cache
    }

    /// Number of items waiting for the next flush.
    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn client(&self, peer: PeerId) -> Option<&ClientViewState> {
        self.clients.find(peer)
    }

    pub fn clients(&self) -> &ClientViewTracker {
        &self.clients
    }

    /// Spawn height at the world origin column.
    pub fn spawn_height(&self) -> f32 {
        find_spawn_y(
            |y| self.generator.density_at(0, y, 0),
            &self.config.spawn_search(),
        )
    }

    /// Sends the spawn burst and the spawn position inline. `last_center` stays unset so the
    /// first move schedules the whole view.
    fn spawn_client(&mut self, peer: PeerId, network: &NetworkHandle) {
        let spawn_y = self.spawn_height();
        let spawn_chunk = ChunkCoordinate::containing(Point3::new(0.0, spawn_y, 0.0));
        let radius = self.config.spawn_burst_radius;

        let Some(state) = self.clients.find_mut(peer) else {
            return;
        };
        for coord in spawn_chunk.neighborhood(radius, radius) {
            let payload = self.cache.get_or_generate(coord);
            network.send_reliable(peer, &payload);
            state.sent.insert(coord);
        }
        network.send_reliable(
            peer,
            &Packet::SpawnPosition {
                x: 0.0,
                y: spawn_y,
                z: 0.0,
            }
            .pack(),
        );
        network.flush();
        info!(
            "[ServerState] {} spawned at y={:.1} with {} chunks",
            peer,
            spawn_y,
            state.sent.len()
        );
    }
}
