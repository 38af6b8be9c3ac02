//! # Server Configuration
//!
//! `ServerConfig` collects every tunable of the streaming server. Values come from three
//! layers, later layers winning: built-in defaults, an optional JSON file, and command-line
//! flags (applied by the binary). Missing fields in the JSON file fall back to defaults.
//!
//! ## Example file
//! ```json
//! {
//!     "bind_address": "0.0.0.0:7777",
//!     "seed": 1337,
//!     "view_radius_xz": 6,
//!     "view_radius_y": 2
//! }
//! ```

use std::{fs, path::Path};

use cgmath::Point3;
use serde::{Deserialize, Serialize};

use crate::error::{StreamError, StreamResult};
use crate::server_state::spawn::SpawnSearch;
use crate::server_state::voxels::coords::ChunkCoordinate;

/// Largest accepted view radius, in chunks, on any axis.
pub const MAX_VIEW_RADIUS: i32 = 64;

/// Complete runtime configuration for the streaming server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the TCP transport listens on
    pub bind_address: String,
    /// World seed fed to the density generator
    pub seed: u32,
    /// Duration of one server tick in milliseconds
    pub tick_interval_ms: u64,
    /// Horizontal (x and z) view radius in chunks
    pub view_radius_xz: i32,
    /// Vertical view radius in chunks
    pub view_radius_y: i32,
    /// Radius of the cube of chunks generated and sent inline on connect
    pub spawn_burst_radius: i32,
    /// Worker thread count; `None` uses available parallelism minus one
    pub worker_threads: Option<usize>,
    /// Height added above the ground surface when placing a player
    pub player_height: f32,
    /// First height sampled by the spawn search
    pub spawn_search_top: i32,
    /// Last height sampled by the spawn search
    pub spawn_search_bottom: i32,
    /// Spawn height used when the search finds no surface
    pub spawn_fallback_y: f32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:7777".to_string(),
            seed: 42,
            tick_interval_ms: 50,
            view_radius_xz: 4,
            view_radius_y: 2,
            spawn_burst_radius: 1,
            worker_threads: None,
            player_height: 1.8,
            spawn_search_top: 128,
            spawn_search_bottom: -64,
            spawn_fallback_y: 64.0,
        }
    }
}

impl ServerConfig {
    /// Loads a configuration from a JSON file and validates it.
    ///
    /// # Arguments
    /// * `path` - Location of the JSON file
    ///
    /// # Returns
    /// The parsed configuration, or the read/parse/validation error
    pub fn load(path: impl AsRef<Path>) -> StreamResult<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| StreamError::ConfigRead {
            path: display.clone(),
            source,
        })?;
        let config: ServerConfig =
            serde_json::from_str(&text).map_err(|source| StreamError::ConfigParse {
                path: display,
                source,
            })?;
        config.validate()?;
        log::info!("[ServerConfig] Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Validates configuration parameters.
    pub fn validate(&self) -> StreamResult<()> {
        if self.tick_interval_ms == 0 {
            return Err(invalid("tick_interval_ms", &self.tick_interval_ms, "must be positive"));
        }
        if self.view_radius_xz < 0 {
            return Err(invalid("view_radius_xz", &self.view_radius_xz, "cannot be negative"));
        }
        if self.view_radius_y < 0 {
            return Err(invalid("view_radius_y", &self.view_radius_y, "cannot be negative"));
        }
        if self.view_radius_xz > MAX_VIEW_RADIUS {
            return Err(invalid("view_radius_xz", &self.view_radius_xz, "exceeds MAX_VIEW_RADIUS"));
        }
        if self.view_radius_y > MAX_VIEW_RADIUS {
            return Err(invalid("view_radius_y", &self.view_radius_y, "exceeds MAX_VIEW_RADIUS"));
        }
        if self.spawn_burst_radius < 0 {
            return Err(invalid(
                "spawn_burst_radius",
                &self.spawn_burst_radius,
                "cannot be negative",
            ));
        }
        if self.spawn_burst_radius > self.view_radius_xz.min(self.view_radius_y) {
            return Err(invalid(
                "spawn_burst_radius",
                &self.spawn_burst_radius,
                "must not exceed the view radii",
            ));
        }
        if self.spawn_search_top <= self.spawn_search_bottom {
            return Err(invalid(
                "spawn_search_top",
                &self.spawn_search_top,
                "must be above spawn_search_bottom",
            ));
        }
        if !(self.player_height > 0.0) {
            return Err(invalid("player_height", &self.player_height, "must be positive"));
        }
        let highest_spawn = self.spawn_search_top as f32 + 1.0 + self.player_height;
        if !inside_world(highest_spawn) || !inside_world(self.spawn_search_bottom as f32) {
            return Err(invalid(
                "spawn_search_top",
                &self.spawn_search_top,
                "spawn search leaves the world",
            ));
        }
        if !inside_world(self.spawn_fallback_y) {
            return Err(invalid(
                "spawn_fallback_y",
                &self.spawn_fallback_y,
                "must be a finite height inside the world",
            ));
        }
        Ok(())
    }

    /// Number of worker threads the task pool should start.
    ///
    /// Reserves one core for the network thread when no explicit count is configured.
    /// Both paths clamp to at least one worker.
    pub fn resolved_worker_threads(&self) -> usize {
        let requested = self.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get().saturating_sub(1))
                .unwrap_or(1)
        });
        requested.max(1)
    }

    /// The spawn search parameters derived from this configuration.
    pub fn spawn_search(&self) -> SpawnSearch {
        SpawnSearch {
            top: self.spawn_search_top,
            bottom: self.spawn_search_bottom,
            player_height: self.player_height,
            fallback_y: self.spawn_fallback_y,
        }
    }
}

fn inside_world(height: f32) -> bool {
    ChunkCoordinate::try_containing(Point3::new(0.0, height, 0.0)).is_some()
}

fn invalid(field: &'static str, value: &dyn std::fmt::Display, reason: &'static str) -> StreamError {
    StreamError::InvalidConfig {
        field,
        value: value.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn defaults_are_valid() {
        assert!(ServerConfig::default().validate().is_ok());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ServerConfig =
            serde_json::from_str(r#"{ "seed": 7, "view_radius_xz": 6 }"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.view_radius_xz, 6);
        assert_eq!(config.view_radius_y, ServerConfig::default().view_radius_y);
        assert_eq!(config.bind_address, "0.0.0.0:7777");
    }

    #[test_case(|c: &mut ServerConfig| { c.tick_interval_ms = 0 }, "tick_interval_ms" ; "zero tick")]
    #[test_case(|c: &mut ServerConfig| { c.view_radius_xz = -1 }, "view_radius_xz" ; "negative horizontal radius")]
    #[test_case(|c: &mut ServerConfig| { c.view_radius_y = -1 }, "view_radius_y" ; "negative vertical radius")]
    #[test_case(|c: &mut ServerConfig| { c.view_radius_xz = 65 }, "view_radius_xz" ; "horizontal radius too large")]
    #[test_case(|c: &mut ServerConfig| { c.view_radius_y = i32::MAX }, "view_radius_y" ; "vertical radius too large")]
    #[test_case(|c: &mut ServerConfig| { c.spawn_burst_radius = 5 }, "spawn_burst_radius" ; "burst beyond view")]
    #[test_case(|c: &mut ServerConfig| { c.spawn_search_top = -100 }, "spawn_search_top" ; "inverted spawn search")]
    #[test_case(|c: &mut ServerConfig| { c.player_height = 1.0e20 }, "spawn_search_top" ; "player height beyond the world")]
    #[test_case(|c: &mut ServerConfig| { c.spawn_search_bottom = i32::MIN }, "spawn_search_top" ; "search below the world")]
    #[test_case(|c: &mut ServerConfig| { c.spawn_fallback_y = f32::NAN }, "spawn_fallback_y" ; "nan fallback")]
    #[test_case(|c: &mut ServerConfig| { c.player_height = 0.0 }, "player_height" ; "zero player height")]
    fn invalid_values_are_rejected(mutate: fn(&mut ServerConfig), expected_field: &str) {
        let mut config = ServerConfig::default();
        mutate(&mut config);
        match config.validate() {
            Err(StreamError::InvalidConfig { field, .. }) => assert_eq!(field, expected_field),
            other => panic!("expected InvalidConfig for {expected_field}, got {other:?}"),
        }
    }

    #[test_case(Some(0), 1)]
    #[test_case(Some(1), 1)]
    #[test_case(Some(6), 6)]
    fn worker_count_is_clamped(requested: Option<usize>, expected: usize) {
        let config = ServerConfig {
            worker_threads: requested,
            ..ServerConfig::default()
        };
        assert_eq!(config.resolved_worker_threads(), expected);
    }

    #[test]
    fn automatic_worker_count_is_at_least_one() {
        assert!(ServerConfig::default().resolved_worker_threads() >= 1);
    }
}
