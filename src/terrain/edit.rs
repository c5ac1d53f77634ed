//! Interactive editing front end: tool modes, brush settings and the
//! mapping from a pointer hit to a global brush application.

use log::debug;

use crate::terrain::chunk_manager::ChunkManager;

pub const MIN_BRUSH_RADIUS: f32 = 100.0;
pub const MAX_BRUSH_RADIUS: f32 = 20000.0;
pub const BRUSH_RADIUS_STEP: f32 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolMode {
    SculptRaise,
    SculptLower,
    Paint,
}

/// Current brush parameters, shared by every tool mode.
#[derive(Debug, Clone, Copy)]
pub struct BrushSettings {
    pub radius: f32,
    pub strength: f32,
    /// Weight channel the paint tool writes to (0..4).
    pub active_layer: u32,
}

impl Default for BrushSettings {
    fn default() -> Self {
        BrushSettings {
            radius: 1500.0,
            strength: 50.0,
            active_layer: 0,
        }
    }
}

impl BrushSettings {
    /// Grow or shrink the radius by whole wheel notches, clamped to the
    /// usable range.
    pub fn adjust_radius(&mut self, notches: i32) {
        let next = self.radius + notches as f32 * BRUSH_RADIUS_STEP;
        self.radius = next.clamp(MIN_BRUSH_RADIUS, MAX_BRUSH_RADIUS);
    }
}

/// Routes edit requests to the chunk registry according to the active
/// tool. Owns no terrain state of its own.
pub struct EditController {
    pub tool: ToolMode,
    pub brush: BrushSettings,
}

impl Default for EditController {
    fn default() -> Self {
        EditController {
            tool: ToolMode::SculptRaise,
            brush: BrushSettings::default(),
        }
    }
}

impl EditController {
    pub fn new(tool: ToolMode, brush: BrushSettings) -> Self {
        EditController { tool, brush }
    }

    /// Apply the active tool at a world-space hit position.
    pub fn perform(&self, manager: &mut ChunkManager, world_pos: [f32; 2]) {
        debug!(
            "edit {:?} at ({:.1}, {:.1}) radius {:.0}",
            self.tool, world_pos[0], world_pos[1], self.brush.radius
        );
        match self.tool {
            ToolMode::SculptRaise => {
                manager.apply_global_brush(world_pos, self.brush.radius, self.brush.strength, false, -1);
            }
            ToolMode::SculptLower => {
                manager.apply_global_brush(world_pos, self.brush.radius, -self.brush.strength, false, -1);
            }
            ToolMode::Paint => {
                // Paint ignores sculpt strength; the stamp is pure falloff.
                manager.apply_global_brush(
                    world_pos,
                    self.brush.radius,
                    1.0,
                    false,
                    self.brush.active_layer as i32,
                );
            }
        }
    }
}
