//! # Voxel Stream Server Entry Point
//!
//! Parses command-line flags, layers them over the optional JSON config file and calls
//! into the library's `run()`.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release -- --config server.json --seed 1337
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use voxel_stream_server::config::ServerConfig;
use voxel_stream_server::error::StreamResult;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON configuration file; missing fields use defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the config file
    #[arg(short, long)]
    bind: Option<String>,

    /// World seed, overriding the config file
    #[arg(short, long)]
    seed: Option<u32>,

    /// Number of chunk worker threads, overriding the config file
    #[arg(short, long)]
    workers: Option<usize>,
}

fn load_config(args: Args) -> StreamResult<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(workers) = args.workers {
        config.worker_threads = Some(workers);
    }
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    let args = Args::parse();
    voxel_stream_server::init_logging();

    match load_config(args).and_then(voxel_stream_server::run) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
