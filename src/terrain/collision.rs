//! Collision geometry derived from a chunk's height field.
//!
//! The mesh is a flat XY grid built once at chunk initialization; deferred
//! rebuilds only re-sample vertex Z from the current heights. The physics
//! engine itself is an external collaborator and only sees vertex data.

use log::warn;

/// Triangulated grid mesh used for collision queries.
///
/// Vertices are chunk-local, centered on the chunk origin. The grid is
/// coarser than the height field (half the sample resolution), which is
/// plenty for collision while keeping rebuilds cheap.
pub struct CollisionMesh {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    divisions: u32,
}

impl CollisionMesh {
    /// Build a flat grid of `divisions` quads per side, spanning
    /// `[-chunk_size/2, +chunk_size/2]` on both axes, z = 0.
    pub fn build_grid(chunk_size: f32, divisions: u32) -> Self {
        let divisions = divisions.max(1);
        let verts_per_side = divisions + 1;
        let half = chunk_size * 0.5;

        let mut vertices = Vec::with_capacity((verts_per_side * verts_per_side) as usize);
        for y in 0..verts_per_side {
            for x in 0..verts_per_side {
                let px = (x as f32 / divisions as f32) * chunk_size - half;
                let py = (y as f32 / divisions as f32) * chunk_size - half;
                vertices.push([px, py, 0.0]);
            }
        }

        let mut indices = Vec::with_capacity((divisions * divisions * 6) as usize);
        for y in 0..divisions {
            for x in 0..divisions {
                let i0 = y * verts_per_side + x;
                let i1 = i0 + 1;
                let i2 = i0 + verts_per_side;
                let i3 = i2 + 1;
                indices.extend_from_slice(&[i0, i2, i1, i1, i2, i3]);
            }
        }

        CollisionMesh {
            vertices,
            indices,
            divisions,
        }
    }

    /// Re-sample every vertex Z from the height grid (nearest sample).
    ///
    /// A height buffer that does not match the declared resolution leaves
    /// the previous geometry in place; stale collision beats torn collision.
    pub fn sync_from_heights(
        &mut self,
        heights: &[f32],
        resolution: u32,
        chunk_size: f32,
        z_scale: f32,
    ) -> bool {
        let res = resolution as usize;
        if res < 2 || heights.len() != res * res {
            warn!(
                "collision sync skipped: {} height samples for resolution {}",
                heights.len(),
                resolution
            );
            return false;
        }

        let max_index = res as i32 - 1;
        let half = chunk_size * 0.5;
        let inv_size = 1.0 / chunk_size;

        for vertex in &mut self.vertices {
            let u = (vertex[0] + half) * inv_size;
            let v = (vertex[1] + half) * inv_size;
            // Clamp so float error at the edges can't read out of bounds.
            let grid_x = ((u * max_index as f32).round() as i32).clamp(0, max_index);
            let grid_y = ((v * max_index as f32).round() as i32).clamp(0, max_index);
            vertex[2] = heights[grid_y as usize * res + grid_x as usize] * z_scale;
        }
        true
    }

    pub fn divisions(&self) -> u32 {
        self.divisions
    }
}

/// Pure mapping from a height grid to collision vertices, exposed for the
/// physics integration. Returns an empty vector on invariant mismatch.
pub fn rebuild_collision_from_heights(
    heights: &[f32],
    resolution: u32,
    chunk_size: f32,
    z_scale: f32,
) -> Vec<[f32; 3]> {
    let mut mesh = CollisionMesh::build_grid(chunk_size, (resolution / 2).max(1));
    if !mesh.sync_from_heights(heights, resolution, chunk_size, z_scale) {
        return Vec::new();
    }
    mesh.vertices
}
