//! Spawn height search.
//!
//! A player spawns standing on the first ground surface found when scanning a column
//! downwards: the first pair of adjacent integer heights where `y + 1` is air and `y` is
//! solid.

/// Parameters of the downward surface scan.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpawnSearch {
    /// First height sampled
    pub top: i32,
    /// Last height sampled
    pub bottom: i32,
    /// Added on top of the surface so the player stands on it
    pub player_height: f32,
    /// Used when the column has no surface in range
    pub fallback_y: f32,
}

/// Finds the spawn height of a column.
///
/// # Arguments
/// * `density` - Density of the column at an integer height; negative is solid
/// * `search` - Scan range and offsets
///
/// # Returns
/// `y + 1 + player_height` for the highest crossing, or `fallback_y` if there is none
pub fn find_spawn_y(density: impl Fn(i32) -> f32, search: &SpawnSearch) -> f32 {
    let mut above = density(search.top);
    for y in (search.bottom..search.top).rev() {
        let here = density(y);
        if above >= 0.0 && here < 0.0 {
            return (y + 1) as f32 + search.player_height;
        }
        above = here;
    }
    search.fallback_y
}
