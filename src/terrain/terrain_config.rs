use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TerrainError};

/// Tunables for terrain generation, editing and persistence.
///
/// Loaded once at startup (TOML) and handed to the chunk manager; there is
/// no global configuration lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// World-unit edge length of every chunk in the world.
    pub chunk_size: f32,
    /// Samples per chunk side.
    pub resolution: u32,
    /// World Z per unit of stored (normalized) height.
    pub z_scale: f32,
    /// Frequency of the default generation pattern. Changing this changes
    /// the terrain every unsaved world starts with.
    pub noise_frequency: f32,
    /// Quiet period after the last edit before collision is rebuilt.
    pub collision_update_delay_ms: u64,
    /// Worker threads for background saves. 0 picks a size from the CPU
    /// count.
    pub max_threads: usize,
    /// Loaded-snapshot cache entries kept by chunk storage.
    pub chunk_cache_size: usize,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        let cpu_count = num_cpus::get();
        TerrainConfig {
            chunk_size: 10000.0,
            resolution: 128,
            z_scale: 256.0,
            noise_frequency: 0.05,
            collision_update_delay_ms: 50,
            // Leave one core for the thread that owns the world.
            max_threads: std::cmp::max(1, cpu_count.saturating_sub(1)),
            chunk_cache_size: 100,
        }
    }
}

impl TerrainConfig {
    pub fn collision_update_delay(&self) -> Duration {
        Duration::from_millis(self.collision_update_delay_ms)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: TerrainConfig =
            toml::from_str(text).map_err(|e| TerrainError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size <= 0.0 {
            return Err(TerrainError::Config(format!(
                "chunk_size must be positive, got {}",
                self.chunk_size
            )));
        }
        if self.resolution < 2 {
            return Err(TerrainError::Config(format!(
                "resolution must be at least 2, got {}",
                self.resolution
            )));
        }
        if self.z_scale <= 0.0 {
            return Err(TerrainError::Config(format!(
                "z_scale must be positive, got {}",
                self.z_scale
            )));
        }
        Ok(())
    }
}
