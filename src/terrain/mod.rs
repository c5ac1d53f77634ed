pub mod brush;
pub mod chunk;
pub mod chunk_manager;
pub mod chunk_storage;
pub mod codec;
pub mod collision;
pub mod edit;
pub mod heightfield;
pub mod terrain_config;

pub use chunk::{Chunk, ChunkState};
pub use chunk_manager::{ChunkCoord, ChunkManager};
pub use chunk_storage::{ChunkStorage, SlotManifest};
pub use codec::ChunkSnapshot;
pub use collision::CollisionMesh;
pub use edit::{BrushSettings, EditController, ToolMode};
pub use heightfield::{HeightField, PaintLayers};
pub use terrain_config::TerrainConfig;
