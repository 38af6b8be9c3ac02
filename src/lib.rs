#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Voxel Stream Server
//!
//! Server-side chunk streaming for a voxel world. Terrain is a seed-keyed density field;
//! chunks are generated, meshed and serialized on a worker pool, cached for the lifetime of
//! the process, and sent to each client as it moves.
//!
//! ## Key Modules
//!
//! * `config` - Runtime configuration and its validation
//! * `core` - Shared-ownership wrappers used across threads (`MtResource`) and within the
//!   network thread (`StResource`)
//! * `error` - Error types
//! * `network` - Transports, the network handle and the wire protocol
//! * `server_state` - The streaming scheduler, the chunk cache, the worker pool and the
//!   terrain pipeline
//!
//! ## Architecture
//!
//! One network thread owns all client state and is the only caller of send primitives.
//! Worker threads turn chunk coordinates into serialized payloads and hand them back through
//! a mutex-guarded ready queue, which the network thread drains once per tick.
//!
//! ## Usage
//!
//! ```no_run
//! use voxel_stream_server::config::ServerConfig;
//!
//! fn main() {
//!     voxel_stream_server::init_logging();
//!     if let Err(err) = voxel_stream_server::run(ServerConfig::default()) {
//!         log::error!("{}", err);
//!     }
//! }
//! ```

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info};

use config::ServerConfig;
use error::StreamResult;
use network::{tcp::TcpTransport, NetworkHandle};
use server_state::{voxels::density::TerrainGenerator, ServerState};

pub mod config;
pub mod core;
pub mod error;
pub mod network;
pub mod server_state;

/// Ticks between two periodic status lines.
const STATUS_INTERVAL_TICKS: u64 = 600;

/// Initializes `env_logger` on stdout. `RUST_LOG` overrides the default `info` level.
pub fn init_logging() {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .filter_level(log::LevelFilter::Info)
        .parse_env("RUST_LOG")
        .init();

    info!("Logger initialized");
}

/// Routes panics through the logger before the default hook prints them.
fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let thread = thread::current();
        error!(
            "Thread '{}' panicked: {}",
            thread.name().unwrap_or("<unnamed>"),
            panic_info
        );
        default_hook(panic_info);
    }));
}

/// Runs the server until the process is terminated.
///
/// # Arguments
/// * `config` - The server configuration
///
/// # Returns
/// Only on startup failure: invalid configuration, worker spawn or bind errors
pub fn run(config: ServerConfig) -> StreamResult<()> {
    install_panic_hook();

    let generator = Arc::new(TerrainGenerator::new(config.seed));
    let transport = TcpTransport::bind(&config.bind_address)?;
    let tick_interval = Duration::from_millis(config.tick_interval_ms);
    let mut server = ServerState::new(config, generator)?;
    let network = NetworkHandle::new(transport);

    info!(
        "Server running (seed {}, tick {:?})",
        server.config().seed,
        tick_interval
    );

    let mut tick: u64 = 0;
    loop {
        let started = Instant::now();
        let sent = server.tick(&network);
        if sent > 0 {
            debug!("Tick {}: sent {} chunks", tick, sent);
        }

        tick += 1;
        if tick % STATUS_INTERVAL_TICKS == 0 {
            info!(
                "{} clients, {} cached chunks",
                server.clients().len(),
                server.cache().len()
            );
        }

        if let Some(remaining) = tick_interval.checked_sub(started.elapsed()) {
            thread::sleep(remaining);
        }
    }
}
