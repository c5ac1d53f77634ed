use crate::error::{Result, TerrainError};
use crate::terrain::chunk_manager::ChunkCoord;

// Amplitude of the default generation pattern around the 0.5 midline.
const NOISE_AMPLITUDE: f32 = 0.2;

/// A per-chunk 2D grid of normalized height samples.
///
/// The single source of truth for a chunk's shape. Samples are stored
/// row-major (`y * resolution + x`); world Z is `height * z_scale`.
pub struct HeightField {
    pub resolution: u32,
    pub chunk_size: f32,
    pub heights: Vec<f32>,
}

impl HeightField {
    /// Fill the grid with the deterministic default pattern.
    ///
    /// The sample offset is the chunk's absolute grid offset, so adjacent
    /// chunks tile without visible seams.
    pub fn procedural(
        coord: ChunkCoord,
        chunk_size: f32,
        resolution: u32,
        noise_frequency: f32,
    ) -> Self {
        let res = resolution as usize;
        let mut heights = vec![0.0f32; res * res];

        let offset_x = (coord.x * resolution as i32) as f32;
        let offset_y = (coord.y * resolution as i32) as f32;

        for y in 0..res {
            for x in 0..res {
                let sample_x = (x as f32 + offset_x) * noise_frequency;
                let sample_y = (y as f32 + offset_y) * noise_frequency;
                heights[y * res + x] = 0.5 + sample_x.sin() * sample_y.cos() * NOISE_AMPLITUDE;
            }
        }

        HeightField {
            resolution,
            chunk_size,
            heights,
        }
    }

    /// Build a height field from imported samples (heightmap import or a
    /// loaded snapshot). Rejects a sample count that does not match the
    /// declared resolution.
    pub fn from_samples(resolution: u32, chunk_size: f32, samples: &[f32]) -> Result<Self> {
        let expected = resolution as usize * resolution as usize;
        if samples.len() != expected {
            return Err(TerrainError::Config(format!(
                "height sample count {} does not match resolution {} ({} expected)",
                samples.len(),
                resolution,
                expected
            )));
        }
        Ok(HeightField {
            resolution,
            chunk_size,
            heights: samples.to_vec(),
        })
    }

    pub fn is_valid(&self) -> bool {
        self.heights.len() == self.resolution as usize * self.resolution as usize
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        (y * self.resolution + x) as usize
    }

    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.heights[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32, value: f32) {
        let idx = self.index(x, y);
        self.heights[idx] = value;
    }

    /// Read access for GPU upload paths; the caller never owns the buffer.
    pub fn as_slice(&self) -> &[f32] {
        &self.heights
    }
}

/// Per-cell material weights, four channels per sample.
///
/// Values are conceptually in [0,1] but are not clamped on write. A chunk
/// may have no paint layers at all (height-only terrain).
pub struct PaintLayers {
    pub weights: Vec<[f32; 4]>,
}

impl PaintLayers {
    pub fn new(resolution: u32) -> Self {
        let count = resolution as usize * resolution as usize;
        PaintLayers {
            weights: vec![[0.0; 4]; count],
        }
    }

    /// Rebuild layers from packed RGBA8 quads (snapshot load path).
    pub fn from_packed(resolution: u32, packed: &[[u8; 4]]) -> Result<Self> {
        let expected = resolution as usize * resolution as usize;
        if packed.len() != expected {
            return Err(TerrainError::Config(format!(
                "weight sample count {} does not match resolution {}",
                packed.len(),
                resolution
            )));
        }
        let weights = packed
            .iter()
            .map(|quad| {
                [
                    quad[0] as f32 / 255.0,
                    quad[1] as f32 / 255.0,
                    quad[2] as f32 / 255.0,
                    quad[3] as f32 / 255.0,
                ]
            })
            .collect();
        Ok(PaintLayers { weights })
    }

    /// Pack to RGBA8 quads for snapshot capture.
    pub fn packed(&self) -> Vec<[u8; 4]> {
        self.weights
            .iter()
            .map(|cell| {
                [
                    (cell[0].clamp(0.0, 1.0) * 255.0).round() as u8,
                    (cell[1].clamp(0.0, 1.0) * 255.0).round() as u8,
                    (cell[2].clamp(0.0, 1.0) * 255.0).round() as u8,
                    (cell[3].clamp(0.0, 1.0) * 255.0).round() as u8,
                ]
            })
            .collect()
    }
}
