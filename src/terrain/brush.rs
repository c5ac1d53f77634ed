//! Circular brush application with radial falloff.
//!
//! These are pure functions over flat sample buffers: no I/O, no logging,
//! no allocation. The chunk decides what counts as an edit and handles
//! dirty marking; this module only touches cells.

/// Radial falloff: 1 at the brush center, 0 at the boundary, smooth at the
/// edge. `radius` must be positive.
#[inline]
pub fn falloff(distance: f32, radius: f32) -> f32 {
    let t = 1.0 - distance / radius;
    t * t
}

// Inclusive grid bounding box of a brush in cell coordinates, clamped to
// the grid. Returns (min_x, max_x, min_y, max_y).
fn grid_bounds(
    grid_x: f32,
    grid_y: f32,
    grid_radius: f32,
    max_index: i32,
) -> (i32, i32, i32, i32) {
    (
        ((grid_x - grid_radius).floor() as i32).clamp(0, max_index),
        ((grid_x + grid_radius).ceil() as i32).clamp(0, max_index),
        ((grid_y - grid_radius).floor() as i32).clamp(0, max_index),
        ((grid_y + grid_radius).ceil() as i32).clamp(0, max_index),
    )
}

/// Apply a signed height delta in a circle around `local_pos`.
///
/// `local_pos` is the offset from the chunk center in world units and
/// `strength` is already normalized to the stored height range. Every cell
/// within `radius` gains `strength * falloff`. Resulting heights are not
/// clamped; repeated same-sign edits accumulate without a ceiling.
///
/// Returns whether any cell was inside the brush circle. A zero strength
/// or non-positive radius never mutates the buffer, so callers can re-issue
/// an edit with strength 0 to force downstream refreshes.
pub fn apply_height_brush(
    heights: &mut [f32],
    resolution: u32,
    chunk_size: f32,
    local_pos: [f32; 2],
    radius: f32,
    strength: f32,
) -> bool {
    if strength == 0.0 || radius <= 0.0 || chunk_size <= 0.0 {
        return false;
    }
    let res = resolution as usize;
    if res < 2 || heights.len() != res * res {
        debug_assert!(false, "height buffer does not match resolution");
        return false;
    }

    let max_index = res as i32 - 1;
    let half = chunk_size * 0.5;
    let grid_x = ((local_pos[0] + half) / chunk_size) * max_index as f32;
    let grid_y = ((local_pos[1] + half) / chunk_size) * max_index as f32;
    let grid_radius = (radius / chunk_size) * max_index as f32;

    let (min_x, max_x, min_y, max_y) = grid_bounds(grid_x, grid_y, grid_radius, max_index);

    let mut modified = false;
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            // Cell position in chunk-local world units.
            let u = x as f32 / max_index as f32;
            let v = y as f32 / max_index as f32;
            let px = u * chunk_size - half;
            let py = v * chunk_size - half;

            let dist = (local_pos[0] - px).hypot(local_pos[1] - py);
            if dist <= radius {
                let alpha = falloff(dist, radius);
                heights[y as usize * res + x as usize] += strength * alpha;
                modified = true;
            }
        }
    }
    modified
}

/// Stamp one weight channel in a circle around `local_pos`.
///
/// Same coordinate mapping and falloff as the height brush. The stamp is
/// max-blended so a stroke never darkens paint that is already there;
/// other channels are left untouched and weights are not renormalized.
pub fn apply_paint_brush(
    weights: &mut [[f32; 4]],
    resolution: u32,
    chunk_size: f32,
    local_pos: [f32; 2],
    radius: f32,
    strength: f32,
    layer: usize,
) -> bool {
    if strength == 0.0 || radius <= 0.0 || chunk_size <= 0.0 || layer >= 4 {
        return false;
    }
    let res = resolution as usize;
    if res < 2 || weights.len() != res * res {
        debug_assert!(false, "weight buffer does not match resolution");
        return false;
    }

    let max_index = res as i32 - 1;
    let half = chunk_size * 0.5;
    let grid_x = ((local_pos[0] + half) / chunk_size) * max_index as f32;
    let grid_y = ((local_pos[1] + half) / chunk_size) * max_index as f32;
    let grid_radius = (radius / chunk_size) * max_index as f32;

    let (min_x, max_x, min_y, max_y) = grid_bounds(grid_x, grid_y, grid_radius, max_index);

    let mut modified = false;
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let u = x as f32 / max_index as f32;
            let v = y as f32 / max_index as f32;
            let px = u * chunk_size - half;
            let py = v * chunk_size - half;

            let dist = (local_pos[0] - px).hypot(local_pos[1] - py);
            if dist <= radius {
                let stamp = strength * falloff(dist, radius);
                let cell = &mut weights[y as usize * res + x as usize];
                if stamp > cell[layer] {
                    cell[layer] = stamp;
                }
                modified = true;
            }
        }
    }
    modified
}
