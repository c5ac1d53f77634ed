use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::terrain::chunk::Chunk;
use crate::terrain::codec::ChunkSnapshot;
use crate::terrain::terrain_config::TerrainConfig;

/// Integer address of a chunk in the world's chunk lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32) -> Self {
        ChunkCoord { x, y }
    }
}

/// Pack a grid coordinate into the registry's map key. Bijective over the
/// full i32 range on both axes.
#[inline]
pub fn chunk_hash(x: i32, y: i32) -> i64 {
    ((x as i64) << 32) | (y as u32 as i64)
}

/// Invert [`chunk_hash`].
#[inline]
pub fn chunk_unhash(hash: i64) -> ChunkCoord {
    ChunkCoord {
        x: (hash >> 32) as i32,
        y: hash as i32,
    }
}

/// Authoritative chunk-address table for one world.
///
/// Resolves world-space brush operations to the chunks they overlap and
/// owns the chunk list. Callers hold the manager directly; there is no
/// global lookup.
pub struct ChunkManager {
    config: TerrainConfig,
    global_chunk_size: f32,
    chunks: Vec<Arc<Mutex<Chunk>>>,
    active_map: HashMap<i64, Arc<Mutex<Chunk>>>,
}

impl ChunkManager {
    pub fn new(config: TerrainConfig) -> Self {
        ChunkManager {
            config,
            global_chunk_size: 0.0,
            chunks: Vec::new(),
            active_map: HashMap::new(),
        }
    }

    /// Chunk edge length shared by every chunk in this world. Zero until
    /// the first chunk is spawned or the map is rebuilt over existing ones.
    pub fn global_chunk_size(&self) -> f32 {
        self.global_chunk_size
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Spawn a chunk at `coord`, procedurally filled unless source samples
    /// are given. Spawning onto an occupied coordinate returns the chunk
    /// already there.
    pub fn spawn_chunk(
        &mut self,
        coord: ChunkCoord,
        source_heights: Option<&[f32]>,
        source_weights: Option<&[[u8; 4]]>,
    ) -> Result<Arc<Mutex<Chunk>>> {
        if let Some(existing) = self.active_map.get(&chunk_hash(coord.x, coord.y)) {
            warn!("chunk ({}, {}) already spawned", coord.x, coord.y);
            return Ok(Arc::clone(existing));
        }

        if self.global_chunk_size <= 0.0 {
            self.global_chunk_size = self.config.chunk_size;
        }

        let mut chunk = Chunk::new(coord);
        chunk.z_scale = self.config.z_scale;
        chunk.collision_update_delay = self.config.collision_update_delay();
        chunk.initialize(
            coord,
            self.global_chunk_size,
            self.config.resolution,
            self.config.noise_frequency,
            source_heights,
            source_weights,
        )?;

        let chunk = Arc::new(Mutex::new(chunk));
        self.chunks.push(Arc::clone(&chunk));
        self.active_map
            .insert(chunk_hash(coord.x, coord.y), Arc::clone(&chunk));
        Ok(chunk)
    }

    /// The default sandbox world: one procedural chunk at the origin.
    pub fn spawn_default_chunk(&mut self) -> Result<Arc<Mutex<Chunk>>> {
        let chunk = self.spawn_chunk(ChunkCoord::new(0, 0), None, None)?;
        info!("sandbox chunk created");
        Ok(chunk)
    }

    /// Restore a chunk from a saved snapshot and register it.
    pub fn insert_from_snapshot(&mut self, snapshot: &ChunkSnapshot) -> Result<Arc<Mutex<Chunk>>> {
        if self.global_chunk_size <= 0.0 {
            self.global_chunk_size = snapshot.world_size;
        }

        let coord = snapshot.grid_coordinate;
        let mut chunk = Chunk::new(coord);
        chunk.z_scale = self.config.z_scale;
        chunk.collision_update_delay = self.config.collision_update_delay();
        chunk.initialize_from_snapshot(snapshot)?;

        let chunk = Arc::new(Mutex::new(chunk));
        // Replace anything already registered at this coordinate.
        self.remove_chunk(coord);
        self.chunks.push(Arc::clone(&chunk));
        self.active_map
            .insert(chunk_hash(coord.x, coord.y), Arc::clone(&chunk));
        Ok(chunk)
    }

    pub fn remove_chunk(&mut self, coord: ChunkCoord) -> bool {
        let hash = chunk_hash(coord.x, coord.y);
        let removed = self.active_map.remove(&hash).is_some();
        self.chunks.retain(|chunk| {
            chunk
                .lock()
                .map(|c| c.grid_coordinate != coord)
                .unwrap_or(true)
        });
        removed
    }

    /// Fan a world-space brush out to every chunk its bounding box
    /// overlaps. Missing chunks are skipped silently; a stroke straddling
    /// an unloaded neighbor just affects the chunks that exist.
    pub fn apply_global_brush(
        &mut self,
        world_pos: [f32; 2],
        radius: f32,
        strength: f32,
        is_hole: bool,
        paint_layer: i32,
    ) {
        if self.global_chunk_size <= 0.0 {
            // Lazy repair: infer the size from whatever chunks exist.
            self.rebuild_chunk_map();
            if self.global_chunk_size <= 0.0 {
                warn!("global brush ignored: chunk size unset and no chunks registered");
                return;
            }
        }
        if radius <= 0.0 {
            return;
        }

        let size = self.global_chunk_size;
        let min_x = ((world_pos[0] - radius) / size).floor() as i32;
        let min_y = ((world_pos[1] - radius) / size).floor() as i32;
        let max_x = ((world_pos[0] + radius) / size).floor() as i32;
        let max_y = ((world_pos[1] + radius) / size).floor() as i32;

        for x in min_x..=max_x {
            for y in min_y..=max_y {
                let Some(chunk) = self.active_map.get(&chunk_hash(x, y)) else {
                    continue;
                };
                if let Ok(mut chunk) = chunk.lock() {
                    let center = chunk.world_center();
                    let local = [world_pos[0] - center[0], world_pos[1] - center[1]];
                    chunk.apply_local_edit(local, radius, strength, is_hole, paint_layer);
                }
            }
        }
    }

    /// Single-coordinate lookup by world position.
    pub fn get_chunk_at_location(&self, world_pos: [f32; 2]) -> Option<Arc<Mutex<Chunk>>> {
        if self.global_chunk_size <= 0.0 {
            return None;
        }
        let x = (world_pos[0] / self.global_chunk_size).floor() as i32;
        let y = (world_pos[1] / self.global_chunk_size).floor() as i32;
        self.active_map.get(&chunk_hash(x, y)).cloned()
    }

    /// Re-key the address table from each live chunk's own coordinate.
    /// Idempotent; also repairs an unset global chunk size from the first
    /// chunk seen.
    pub fn rebuild_chunk_map(&mut self) {
        self.active_map.clear();
        for chunk in &self.chunks {
            if let Ok(c) = chunk.lock() {
                if self.global_chunk_size <= 0.0 {
                    self.global_chunk_size = c.chunk_size;
                }
                self.active_map.insert(
                    chunk_hash(c.grid_coordinate.x, c.grid_coordinate.y),
                    Arc::clone(chunk),
                );
            }
        }
        debug!("chunk map rebuilt: {} entries", self.active_map.len());
    }

    /// Pump deferred collision rebuilds. Chunks are independent, so the
    /// iteration order carries no meaning. Returns how many rebuilt.
    pub fn update(&mut self, now: Instant) -> usize {
        let mut rebuilt = 0;
        for chunk in &self.chunks {
            if let Ok(mut chunk) = chunk.lock() {
                if chunk.tick(now) {
                    rebuilt += 1;
                }
            }
        }
        rebuilt
    }

    /// Snapshot every initialized chunk. Deep copies captured on the
    /// calling thread, safe to hand to background writers.
    pub fn capture_snapshots(&self) -> Vec<ChunkSnapshot> {
        self.chunks
            .iter()
            .filter_map(|chunk| chunk.lock().ok().and_then(|c| c.capture_snapshot()))
            .collect()
    }

    pub fn chunk_coords(&self) -> Vec<ChunkCoord> {
        self.chunks
            .iter()
            .filter_map(|chunk| chunk.lock().ok().map(|c| c.grid_coordinate))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::chunk::ChunkState;

    fn test_config() -> TerrainConfig {
        TerrainConfig {
            chunk_size: 100.0,
            resolution: 5,
            ..TerrainConfig::default()
        }
    }

    fn manager_with_grid(coords: &[(i32, i32)]) -> ChunkManager {
        let mut manager = ChunkManager::new(test_config());
        for &(x, y) in coords {
            let zeros = vec![0.0f32; 25];
            manager
                .spawn_chunk(ChunkCoord::new(x, y), Some(&zeros), None)
                .unwrap();
        }
        manager
    }

    #[test]
    fn hash_round_trips_over_signed_coords() {
        for &(x, y) in &[
            (0, 0),
            (1, -1),
            (-1, 1),
            (-1, -1),
            (i32::MAX, i32::MIN),
            (i32::MIN, i32::MAX),
            (12345, -98765),
        ] {
            let coord = chunk_unhash(chunk_hash(x, y));
            assert_eq!((coord.x, coord.y), (x, y));
        }
    }

    #[test]
    fn hash_is_collision_free_on_a_lattice() {
        let mut seen = std::collections::HashSet::new();
        for x in -50..50 {
            for y in -50..50 {
                assert!(seen.insert(chunk_hash(x, y)));
            }
        }
    }

    #[test]
    fn lookup_uses_floor_division() {
        let manager = manager_with_grid(&[(0, 0), (-1, -1)]);

        let chunk = manager.get_chunk_at_location([50.0, 50.0]).unwrap();
        assert_eq!(chunk.lock().unwrap().grid_coordinate, ChunkCoord::new(0, 0));

        let chunk = manager.get_chunk_at_location([-50.0, -50.0]).unwrap();
        assert_eq!(
            chunk.lock().unwrap().grid_coordinate,
            ChunkCoord::new(-1, -1)
        );

        assert!(manager.get_chunk_at_location([250.0, 0.0]).is_none());
    }

    #[test]
    fn lookup_fails_gracefully_without_chunks() {
        let manager = ChunkManager::new(test_config());
        assert!(manager.get_chunk_at_location([0.0, 0.0]).is_none());
    }

    #[test]
    fn global_brush_without_chunks_is_a_no_op() {
        let mut manager = ChunkManager::new(test_config());
        // Must not panic or divide by zero.
        manager.apply_global_brush([0.0, 0.0], 50.0, 500.0, false, -1);
    }

    #[test]
    fn brush_fans_out_to_overlapping_chunks_only() {
        let mut manager = manager_with_grid(&[(0, 0), (1, 0), (0, 1), (1, 1)]);

        // Circle centered near the right edge of chunk (0,0), spilling into
        // (1,0) but staying clear of the y=1 row.
        manager.apply_global_brush([95.0, 50.0], 10.0, 2560.0, false, -1);

        let dirty: Vec<(i32, i32)> = manager
            .chunks
            .iter()
            .filter_map(|c| {
                let c = c.lock().unwrap();
                c.is_dirty()
                    .then_some((c.grid_coordinate.x, c.grid_coordinate.y))
            })
            .collect();
        assert_eq!(dirty.len(), 2);
        assert!(dirty.contains(&(0, 0)));
        assert!(dirty.contains(&(1, 0)));
    }

    #[test]
    fn corner_chunk_outside_the_circle_is_untouched() {
        // Finer grid (cells 5 units apart) so cell coverage tracks the
        // circle closely.
        let mut manager = ChunkManager::new(TerrainConfig {
            chunk_size: 100.0,
            resolution: 21,
            ..TerrainConfig::default()
        });
        let zeros = vec![0.0f32; 441];
        for &(x, y) in &[(0, 0), (1, 0), (0, 1), (1, 1)] {
            manager
                .spawn_chunk(ChunkCoord::new(x, y), Some(&zeros), None)
                .unwrap();
        }

        // The brush bbox reaches chunk (1,1) but the circle does not: the
        // shared corner (100,100) is 7.07 units away with radius 6.
        manager.apply_global_brush([95.0, 95.0], 6.0, 2560.0, false, -1);

        let corner = manager.get_chunk_at_location([150.0, 150.0]).unwrap();
        assert_eq!(corner.lock().unwrap().state(), ChunkState::Ready);
        for world in [[50.0, 50.0], [150.0, 50.0], [50.0, 150.0]] {
            let chunk = manager.get_chunk_at_location(world).unwrap();
            assert!(chunk.lock().unwrap().is_dirty());
        }
    }

    #[test]
    fn brush_skips_missing_chunks_silently() {
        let mut manager = manager_with_grid(&[(0, 0)]);

        // Straddles the boundary with a nonexistent neighbor at (1,0).
        manager.apply_global_brush([99.0, 50.0], 20.0, 2560.0, false, -1);

        let chunk = manager.get_chunk_at_location([50.0, 50.0]).unwrap();
        assert!(chunk.lock().unwrap().is_dirty());
    }

    #[test]
    fn edits_across_the_seam_land_in_local_space() {
        let mut manager = manager_with_grid(&[(0, 0), (1, 0)]);
        manager.apply_global_brush([100.0, 50.0], 30.0, 2560.0, false, -1);

        // World (100,50) is local (+50,0) in chunk (0,0) and (-50,0) in
        // chunk (1,0): both edge columns get the full-strength center.
        let left = manager.get_chunk_at_location([50.0, 50.0]).unwrap();
        let left = left.lock().unwrap();
        let heights = &left.height_field().unwrap().heights;
        assert!((heights[2 * 5 + 4] - 10.0).abs() < 1e-3);

        let right = manager.get_chunk_at_location([150.0, 50.0]).unwrap();
        let right = right.lock().unwrap();
        let heights = &right.height_field().unwrap().heights;
        assert!((heights[2 * 5] - 10.0).abs() < 1e-3);
    }

    #[test]
    fn rebuild_chunk_map_is_idempotent() {
        let mut manager = manager_with_grid(&[(0, 0), (2, -3)]);
        manager.rebuild_chunk_map();
        manager.rebuild_chunk_map();
        assert_eq!(manager.active_map.len(), 2);
        assert!(manager.get_chunk_at_location([250.0, -250.0]).is_some());
    }

    #[test]
    fn rebuild_infers_chunk_size_from_live_chunks() {
        let mut manager = manager_with_grid(&[(0, 0)]);
        manager.global_chunk_size = 0.0;
        manager.rebuild_chunk_map();
        assert_eq!(manager.global_chunk_size, 100.0);
    }

    #[test]
    fn spawning_twice_returns_the_existing_chunk() {
        let mut manager = manager_with_grid(&[(0, 0)]);
        let again = manager
            .spawn_chunk(ChunkCoord::new(0, 0), None, None)
            .unwrap();
        assert_eq!(manager.chunk_count(), 1);
        assert_eq!(again.lock().unwrap().grid_coordinate, ChunkCoord::new(0, 0));
    }

    #[test]
    fn remove_then_rebuild_stays_consistent() {
        let mut manager = manager_with_grid(&[(0, 0), (1, 0)]);
        assert!(manager.remove_chunk(ChunkCoord::new(0, 0)));
        assert!(!manager.remove_chunk(ChunkCoord::new(0, 0)));
        manager.rebuild_chunk_map();
        assert_eq!(manager.chunk_count(), 1);
        assert!(manager.get_chunk_at_location([50.0, 50.0]).is_none());
    }

    #[test]
    fn update_pumps_deferred_rebuilds() {
        let mut manager = manager_with_grid(&[(0, 0), (1, 0)]);
        for chunk in &manager.chunks {
            chunk.lock().unwrap().collision_update_delay = std::time::Duration::ZERO;
        }

        manager.apply_global_brush([100.0, 50.0], 30.0, 2560.0, false, -1);
        let rebuilt = manager.update(Instant::now());
        assert_eq!(rebuilt, 2);
        assert_eq!(manager.update(Instant::now()), 0);
    }

    #[test]
    fn default_chunk_spawn_sets_global_size() {
        let mut manager = ChunkManager::new(TerrainConfig::default());
        manager.spawn_default_chunk().unwrap();
        assert_eq!(manager.global_chunk_size(), 10000.0);
        assert!(manager.get_chunk_at_location([5000.0, 5000.0]).is_some());
    }
}
