//! Disk persistence for chunk snapshots.
//!
//! Each chunk lives in its own `chunk_{x}_{y}.bin` file inside a save-slot
//! directory, next to a `manifest.json` that records which coordinates the
//! slot contains and when it was written. Saves can be dispatched to a
//! thread pool; `flush` blocks until every dispatched save has landed.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex};

use chrono::{DateTime, Utc};
use log::{error, warn};
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TerrainError};
use crate::terrain::chunk_manager::ChunkCoord;
use crate::terrain::codec::{self, ChunkSnapshot};
use crate::threading::ThreadPool;

const MANIFEST_FILE: &str = "manifest.json";

/// Index of a save slot, written alongside the chunk files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotManifest {
    pub slot_name: String,
    pub saved_at: DateTime<Utc>,
    pub chunk_coordinates: Vec<ChunkCoord>,
}

pub struct ChunkStorage {
    save_dir: PathBuf,
    cache: Mutex<LruCache<ChunkCoord, ChunkSnapshot>>,
    // Count of saves dispatched but not yet finished, paired with a
    // condvar so flush() can sleep instead of spin.
    pending: Arc<(Mutex<usize>, Condvar)>,
}

impl ChunkStorage {
    pub fn new(save_dir: impl Into<PathBuf>, cache_size: usize) -> Result<Self> {
        let save_dir = save_dir.into();
        std::fs::create_dir_all(&save_dir)?;
        let capacity = NonZeroUsize::new(cache_size.max(1))
            .ok_or_else(|| TerrainError::Config("cache size must be positive".into()))?;
        Ok(ChunkStorage {
            save_dir,
            cache: Mutex::new(LruCache::new(capacity)),
            pending: Arc::new((Mutex::new(0), Condvar::new())),
        })
    }

    /// Directory for a named save slot under a common base.
    pub fn slot_path(base: impl AsRef<Path>, slot_name: &str) -> PathBuf {
        base.as_ref().join(slot_name)
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    pub fn chunk_path(&self, coord: ChunkCoord) -> PathBuf {
        self.save_dir.join(format!("chunk_{}_{}.bin", coord.x, coord.y))
    }

    pub fn chunk_exists(&self, coord: ChunkCoord) -> bool {
        self.chunk_path(coord).is_file()
    }

    /// Serialize and write a snapshot on the calling thread. A snapshot
    /// with no height data is skipped; there is nothing worth persisting.
    pub fn save_chunk_sync(&self, snapshot: &ChunkSnapshot) -> Result<()> {
        if !snapshot.is_valid() {
            warn!(
                "skipping save of empty chunk ({}, {})",
                snapshot.grid_coordinate.x, snapshot.grid_coordinate.y
            );
            return Ok(());
        }
        let bytes = codec::serialize_snapshot(snapshot)?;
        let path = self.chunk_path(snapshot.grid_coordinate);
        std::fs::write(&path, bytes)?;
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(snapshot.grid_coordinate, snapshot.clone());
        }
        Ok(())
    }

    /// Hand a snapshot to the pool for compression and I/O. The snapshot
    /// is already a deep copy, so the live chunk stays editable while the
    /// save runs. Failures are logged; flush() still completes.
    pub fn save_chunk_async(self: &Arc<Self>, snapshot: ChunkSnapshot, pool: &ThreadPool) {
        {
            let (count, _) = &*self.pending;
            if let Ok(mut count) = count.lock() {
                *count += 1;
            }
        }

        let storage = Arc::clone(self);
        pool.execute(move || {
            if let Err(e) = storage.save_chunk_sync(&snapshot) {
                error!(
                    "failed to save chunk ({}, {}): {}",
                    snapshot.grid_coordinate.x, snapshot.grid_coordinate.y, e
                );
            }
            let (count, condvar) = &*storage.pending;
            if let Ok(mut count) = count.lock() {
                *count = count.saturating_sub(1);
            }
            condvar.notify_all();
        });
    }

    /// Block until every dispatched async save has completed.
    pub fn flush(&self) {
        let (count, condvar) = &*self.pending;
        let Ok(mut guard) = count.lock() else { return };
        while *guard > 0 {
            guard = match condvar.wait(guard) {
                Ok(guard) => guard,
                Err(_) => return,
            };
        }
    }

    /// Load a chunk snapshot from disk, going through the cache.
    ///
    /// `Ok(None)` means there is nothing usable at that coordinate: no
    /// file, or a file that is not a terrain chunk at all. Corruption and
    /// unknown versions are real errors the caller must handle.
    pub fn load_chunk(&self, coord: ChunkCoord) -> Result<Option<ChunkSnapshot>> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(snapshot) = cache.get(&coord) {
                return Ok(Some(snapshot.clone()));
            }
        }

        let path = self.chunk_path(coord);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match codec::deserialize_snapshot(&bytes) {
            Ok(snapshot) => {
                if let Ok(mut cache) = self.cache.lock() {
                    cache.put(coord, snapshot.clone());
                }
                Ok(Some(snapshot))
            }
            Err(TerrainError::NotTerrainFile) => {
                warn!("{} is not a terrain chunk file, ignoring", path.display());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Write the slot manifest for the given set of coordinates.
    pub fn write_manifest(&self, slot_name: &str, coords: Vec<ChunkCoord>) -> Result<()> {
        let manifest = SlotManifest {
            slot_name: slot_name.to_string(),
            saved_at: Utc::now(),
            chunk_coordinates: coords,
        };
        let json = serde_json::to_string_pretty(&manifest)?;
        std::fs::write(self.save_dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }

    pub fn read_manifest(&self) -> Result<Option<SlotManifest>> {
        let path = self.save_dir.join(MANIFEST_FILE);
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&text)?))
    }

    /// Save every snapshot and the manifest, then wait for the saves.
    pub fn save_world(
        self: &Arc<Self>,
        slot_name: &str,
        snapshots: Vec<ChunkSnapshot>,
        pool: &ThreadPool,
    ) -> Result<()> {
        let coords: Vec<ChunkCoord> = snapshots.iter().map(|s| s.grid_coordinate).collect();
        for snapshot in snapshots {
            self.save_chunk_async(snapshot, pool);
        }
        self.write_manifest(slot_name, coords)?;
        self.flush();
        Ok(())
    }

    /// Load every chunk named by the manifest. Chunks whose files have
    /// gone missing since the manifest was written are skipped with a
    /// warning rather than failing the whole load.
    pub fn load_world(&self) -> Result<HashMap<ChunkCoord, ChunkSnapshot>> {
        let Some(manifest) = self.read_manifest()? else {
            return Ok(HashMap::new());
        };

        let mut snapshots = HashMap::with_capacity(manifest.chunk_coordinates.len());
        for coord in manifest.chunk_coordinates {
            match self.load_chunk(coord)? {
                Some(snapshot) => {
                    snapshots.insert(coord, snapshot);
                }
                None => {
                    warn!(
                        "manifest lists chunk ({}, {}) but no file was found",
                        coord.x, coord.y
                    );
                }
            }
        }
        Ok(snapshots)
    }
}
