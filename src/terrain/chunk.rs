use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::Result;
use crate::terrain::brush;
use crate::terrain::chunk_manager::ChunkCoord;
use crate::terrain::codec::ChunkSnapshot;
use crate::terrain::collision::CollisionMesh;
use crate::terrain::heightfield::{HeightField, PaintLayers};

// Edits weaker than this (after normalization) are ignored outright.
const MIN_EDIT_STRENGTH: f32 = 0.0001;

/// Lifecycle of a chunk's collision geometry relative to its height data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// No height field allocated yet; edits are silent no-ops.
    Uninitialized,
    /// Collision geometry matches the height field.
    Ready,
    /// Height data changed; a deferred collision rebuild is pending.
    Dirty,
}

/// Single-shot deadline driven by the owner's event loop.
///
/// Re-arming while pending simply pushes the deadline out, which is what
/// coalesces an edit burst into one rebuild.
#[derive(Debug, Default)]
pub struct RebuildTimer {
    deadline: Option<Instant>,
}

impl RebuildTimer {
    pub fn arm(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if deadline <= now)
    }
}

/// A fixed-size square tile of terrain owning its height field, paint
/// layers and derived collision mesh.
pub struct Chunk {
    pub grid_coordinate: ChunkCoord,
    pub chunk_size: f32,
    pub resolution: u32,
    /// World Z per unit of stored height.
    pub z_scale: f32,
    /// Delay between the last edit of a burst and the collision rebuild.
    pub collision_update_delay: Duration,

    height_field: Option<HeightField>,
    paint: Option<PaintLayers>,
    collision: Option<CollisionMesh>,
    state: ChunkState,
    rebuild_timer: RebuildTimer,
}

impl Chunk {
    pub fn new(coord: ChunkCoord) -> Self {
        Chunk {
            grid_coordinate: coord,
            chunk_size: 10000.0,
            resolution: 128,
            z_scale: 256.0,
            collision_update_delay: Duration::from_millis(50),
            height_field: None,
            paint: None,
            collision: None,
            state: ChunkState::Uninitialized,
            rebuild_timer: RebuildTimer::default(),
        }
    }

    /// Allocate the height field and build initial collision synchronously.
    ///
    /// With no source samples the grid is filled procedurally; otherwise
    /// the imported samples are taken as-is. Weight sources are optional
    /// either way.
    pub fn initialize(
        &mut self,
        coord: ChunkCoord,
        chunk_size: f32,
        resolution: u32,
        noise_frequency: f32,
        source_heights: Option<&[f32]>,
        source_weights: Option<&[[u8; 4]]>,
    ) -> Result<()> {
        self.grid_coordinate = coord;
        self.chunk_size = chunk_size;
        self.resolution = resolution;

        let field = match source_heights {
            Some(samples) => HeightField::from_samples(resolution, chunk_size, samples)?,
            None => HeightField::procedural(coord, chunk_size, resolution, noise_frequency),
        };

        let paint = match source_weights {
            Some(packed) => PaintLayers::from_packed(resolution, packed)?,
            None => PaintLayers::new(resolution),
        };

        let mut mesh = CollisionMesh::build_grid(chunk_size, (resolution / 2).max(1));
        mesh.sync_from_heights(&field.heights, resolution, chunk_size, self.z_scale);

        self.height_field = Some(field);
        self.paint = Some(paint);
        self.collision = Some(mesh);
        self.state = ChunkState::Ready;
        self.rebuild_timer.cancel();
        Ok(())
    }

    /// Restore a chunk from a saved snapshot.
    pub fn initialize_from_snapshot(&mut self, snapshot: &ChunkSnapshot) -> Result<()> {
        let resolution = snapshot.resolution.max(0) as u32;
        let weights = if snapshot.weight_data.is_empty() {
            None
        } else {
            Some(snapshot.weight_data.as_slice())
        };
        self.initialize(
            snapshot.grid_coordinate,
            snapshot.world_size,
            resolution,
            0.0,
            Some(&snapshot.height_data),
            weights,
        )
    }

    /// The chunk center in world units; brush positions arriving from the
    /// registry are relative to this point.
    pub fn world_center(&self) -> [f32; 2] {
        let half = self.chunk_size * 0.5;
        [
            self.grid_coordinate.x as f32 * self.chunk_size + half,
            self.grid_coordinate.y as f32 * self.chunk_size + half,
        ]
    }

    /// Public edit entry point, in chunk-local coordinates.
    ///
    /// A non-negative `paint_layer` routes to the paint path and leaves the
    /// height field alone. Hole cutting happens at the material level, so
    /// `is_hole` skips height modification entirely. Height edits that
    /// touch any cell mark the chunk dirty and re-arm the rebuild timer.
    pub fn apply_local_edit(
        &mut self,
        relative_pos: [f32; 2],
        radius: f32,
        strength: f32,
        is_hole: bool,
        paint_layer: i32,
    ) -> bool {
        if self.height_field.is_none() {
            return false;
        }

        if paint_layer >= 0 {
            let Some(paint) = self.paint.as_mut() else {
                return false;
            };
            // Paint stamps at full opacity; collision is unaffected.
            return brush::apply_paint_brush(
                &mut paint.weights,
                self.resolution,
                self.chunk_size,
                relative_pos,
                radius,
                1.0,
                paint_layer as usize,
            );
        }

        if is_hole {
            return false;
        }

        let normalized = strength / self.z_scale;
        if normalized.abs() < MIN_EDIT_STRENGTH {
            return false;
        }

        let Some(field) = self.height_field.as_mut() else {
            return false;
        };
        let modified = brush::apply_height_brush(
            &mut field.heights,
            self.resolution,
            self.chunk_size,
            relative_pos,
            radius,
            normalized,
        );

        if modified {
            self.state = ChunkState::Dirty;
            self.rebuild_timer.arm(self.collision_update_delay);
        }
        modified
    }

    /// Fire the deferred rebuild if it is due. Returns whether a rebuild
    /// ran. Called by the registry's pump each frame.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.state != ChunkState::Dirty || !self.rebuild_timer.is_due(now) {
            return false;
        }
        self.rebuild_timer.cancel();
        self.perform_deferred_collision_update();
        true
    }

    /// Re-derive collision geometry from the current height field and
    /// clear the dirty flag. A sync failure keeps the previous geometry
    /// and is logged, never fatal.
    pub fn perform_deferred_collision_update(&mut self) {
        if self.state != ChunkState::Dirty {
            return;
        }
        self.sync_collision_geometry();
        self.state = ChunkState::Ready;
    }

    fn sync_collision_geometry(&mut self) {
        let (Some(mesh), Some(field)) = (self.collision.as_mut(), self.height_field.as_ref())
        else {
            return;
        };
        if !mesh.sync_from_heights(&field.heights, self.resolution, self.chunk_size, self.z_scale)
        {
            warn!(
                "chunk ({}, {}): collision rebuild failed, keeping previous geometry",
                self.grid_coordinate.x, self.grid_coordinate.y
            );
        } else {
            debug!(
                "chunk ({}, {}): collision rebuilt",
                self.grid_coordinate.x, self.grid_coordinate.y
            );
        }
    }

    /// Deep-copy the persistent state for background save. Returns `None`
    /// for an uninitialized chunk.
    pub fn capture_snapshot(&self) -> Option<ChunkSnapshot> {
        let field = self.height_field.as_ref()?;
        Some(ChunkSnapshot {
            grid_coordinate: self.grid_coordinate,
            resolution: self.resolution as i32,
            world_size: self.chunk_size,
            height_data: field.heights.clone(),
            weight_data: self
                .paint
                .as_ref()
                .map(|p| p.packed())
                .unwrap_or_default(),
        })
    }

    pub fn state(&self) -> ChunkState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state == ChunkState::Dirty
    }

    pub fn height_field(&self) -> Option<&HeightField> {
        self.height_field.as_ref()
    }

    pub fn paint_layers(&self) -> Option<&PaintLayers> {
        self.paint.as_ref()
    }

    pub fn collision_mesh(&self) -> Option<&CollisionMesh> {
        self.collision.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_chunk(resolution: u32, chunk_size: f32) -> Chunk {
        let mut chunk = Chunk::new(ChunkCoord { x: 0, y: 0 });
        let samples = vec![0.0f32; (resolution * resolution) as usize];
        chunk
            .initialize(
                ChunkCoord { x: 0, y: 0 },
                chunk_size,
                resolution,
                0.05,
                Some(&samples),
                None,
            )
            .unwrap();
        chunk
    }

    #[test]
    fn uninitialized_chunk_ignores_edits() {
        let mut chunk = Chunk::new(ChunkCoord { x: 0, y: 0 });
        assert_eq!(chunk.state(), ChunkState::Uninitialized);
        assert!(!chunk.apply_local_edit([0.0, 0.0], 50.0, 500.0, false, -1));
        assert!(chunk.capture_snapshot().is_none());
    }

    #[test]
    fn initialize_builds_collision_synchronously() {
        let chunk = flat_chunk(8, 100.0);
        assert_eq!(chunk.state(), ChunkState::Ready);
        assert!(chunk.collision_mesh().is_some());
        assert!(chunk.paint_layers().is_some());
    }

    #[test]
    fn height_edit_marks_dirty_and_arms_timer() {
        let mut chunk = flat_chunk(5, 100.0);
        let modified = chunk.apply_local_edit([0.0, 0.0], 50.0, 2560.0, false, -1);
        assert!(modified);
        assert!(chunk.is_dirty());

        // strength / z_scale = 10 at the center cell.
        let heights = &chunk.height_field().unwrap().heights;
        assert!((heights[2 * 5 + 2] - 10.0).abs() < 1e-4);
    }

    #[test]
    fn tiny_strength_is_a_no_op() {
        let mut chunk = flat_chunk(5, 100.0);
        // 0.02 / 256 is far below the edit threshold.
        assert!(!chunk.apply_local_edit([0.0, 0.0], 50.0, 0.02, false, -1));
        assert_eq!(chunk.state(), ChunkState::Ready);
    }

    #[test]
    fn hole_edit_leaves_heights_alone() {
        let mut chunk = flat_chunk(5, 100.0);
        assert!(!chunk.apply_local_edit([0.0, 0.0], 50.0, 2560.0, true, -1));
        assert_eq!(chunk.state(), ChunkState::Ready);
        assert!(chunk.height_field().unwrap().heights.iter().all(|&h| h == 0.0));
    }

    #[test]
    fn paint_edit_does_not_dirty_collision() {
        let mut chunk = flat_chunk(5, 100.0);
        let modified = chunk.apply_local_edit([0.0, 0.0], 50.0, 2560.0, false, 1);
        assert!(modified);
        assert_eq!(chunk.state(), ChunkState::Ready);
        assert!(!chunk.rebuild_timer.is_armed());

        let weights = &chunk.paint_layers().unwrap().weights;
        assert!((weights[2 * 5 + 2][1] - 1.0).abs() < 1e-6);
        assert!(chunk.height_field().unwrap().heights.iter().all(|&h| h == 0.0));
    }

    #[test]
    fn edit_burst_coalesces_into_one_rebuild() {
        let mut chunk = flat_chunk(5, 100.0);
        chunk.collision_update_delay = Duration::ZERO;

        for _ in 0..5 {
            chunk.apply_local_edit([0.0, 0.0], 50.0, 2560.0, false, -1);
        }
        assert!(chunk.is_dirty());

        // One tick after the deadline fires exactly one rebuild.
        assert!(chunk.tick(Instant::now()));
        assert_eq!(chunk.state(), ChunkState::Ready);
        assert!(!chunk.tick(Instant::now()));
    }

    #[test]
    fn rebuild_waits_for_the_deadline() {
        let mut chunk = flat_chunk(5, 100.0);
        chunk.collision_update_delay = Duration::from_secs(3600);
        chunk.apply_local_edit([0.0, 0.0], 50.0, 2560.0, false, -1);

        assert!(!chunk.tick(Instant::now()));
        assert!(chunk.is_dirty());
    }

    #[test]
    fn rebuild_syncs_collision_to_edited_heights() {
        let mut chunk = flat_chunk(5, 100.0);
        chunk.collision_update_delay = Duration::ZERO;
        chunk.apply_local_edit([0.0, 0.0], 50.0, 2560.0, false, -1);
        chunk.tick(Instant::now());

        // Center vertex: height 10 * z_scale 256.
        let center = chunk
            .collision_mesh()
            .unwrap()
            .vertices
            .iter()
            .find(|v| v[0] == 0.0 && v[1] == 0.0)
            .copied()
            .unwrap();
        assert!((center[2] - 2560.0).abs() < 0.5);
    }

    #[test]
    fn snapshot_round_trips_through_chunk() {
        let mut chunk = flat_chunk(5, 100.0);
        chunk.apply_local_edit([0.0, 0.0], 50.0, 2560.0, false, -1);
        chunk.apply_local_edit([0.0, 0.0], 50.0, 1.0, false, 0);

        let snapshot = chunk.capture_snapshot().unwrap();
        assert_eq!(snapshot.resolution, 5);
        assert_eq!(snapshot.world_size, 100.0);

        let mut restored = Chunk::new(ChunkCoord { x: 9, y: 9 });
        restored.initialize_from_snapshot(&snapshot).unwrap();
        assert_eq!(restored.grid_coordinate, snapshot.grid_coordinate);
        assert_eq!(
            restored.height_field().unwrap().heights,
            chunk.height_field().unwrap().heights
        );
    }

    #[test]
    fn timer_rearm_pushes_deadline() {
        let mut timer = RebuildTimer::default();
        timer.arm(Duration::from_secs(100));
        assert!(timer.is_armed());
        assert!(!timer.is_due(Instant::now()));

        timer.arm(Duration::ZERO);
        assert!(timer.is_due(Instant::now()));

        timer.cancel();
        assert!(!timer.is_armed());
    }
}
