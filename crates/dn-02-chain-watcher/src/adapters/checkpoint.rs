//! Checkpoint stores
//!
//! `JsonCheckpointStore` keeps one small JSON document per chain and
//! replaces it atomically through a temp file. `MemoryCheckpointStore`
//! is for tests and development runs that should not touch the disk.

use crate::ports::outbound::{CheckpointError, CheckpointStore};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_types::{BlockHeight, ChainId};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct CheckpointFile {
    chain: ChainId,
    last_processed: BlockHeight,
}

/// File-backed checkpoints, one `<chain>.checkpoint.json` per chain.
#[derive(Debug, Clone)]
pub struct JsonCheckpointStore {
    dir: PathBuf,
}

impl JsonCheckpointStore {
    /// Store under `dir`. The directory is created on first save.
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Directory holding the checkpoint files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the checkpoint of `chain`.
    pub fn path_for(&self, chain: &ChainId) -> PathBuf {
        let name: String = chain
            .as_str()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{name}.checkpoint.json"))
    }
}

fn io_error(e: impl std::fmt::Display) -> CheckpointError {
    CheckpointError::Io {
        message: e.to_string(),
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn load(&self, chain: &ChainId) -> Result<Option<BlockHeight>, CheckpointError> {
        let path = self.path_for(chain);
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(e)),
        };

        let file: CheckpointFile =
            serde_json::from_str(&raw).map_err(|e| CheckpointError::Corrupt {
                chain: chain.clone(),
                message: e.to_string(),
            })?;
        if &file.chain != chain {
            return Err(CheckpointError::Corrupt {
                chain: chain.clone(),
                message: format!("file belongs to chain {}", file.chain),
            });
        }

        debug!(
            chain = %chain,
            last_processed = file.last_processed,
            path = %path.display(),
            "[dn-02] Checkpoint loaded"
        );
        Ok(Some(file.last_processed))
    }

    fn save(&self, chain: &ChainId, last_processed: BlockHeight) -> Result<(), CheckpointError> {
        std::fs::create_dir_all(&self.dir).map_err(io_error)?;

        let bytes = serde_json::to_vec_pretty(&CheckpointFile {
            chain: chain.clone(),
            last_processed,
        })
        .map_err(io_error)?;

        // Write atomically via temp file
        let path = self.path_for(chain);
        let temp_path = path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).map_err(io_error)?;
        file.write_all(&bytes).map_err(io_error)?;
        file.sync_all().map_err(io_error)?;
        std::fs::rename(&temp_path, &path).map_err(io_error)?;

        Ok(())
    }
}

/// In-memory checkpoints; lost with the process.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    heights: Mutex<HashMap<ChainId, BlockHeight>>,
}

impl MemoryCheckpointStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored height for `chain`.
    pub fn get(&self, chain: &ChainId) -> Option<BlockHeight> {
        self.heights.lock().get(chain).copied()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self, chain: &ChainId) -> Result<Option<BlockHeight>, CheckpointError> {
        Ok(self.get(chain))
    }

    fn save(&self, chain: &ChainId, last_processed: BlockHeight) -> Result<(), CheckpointError> {
        self.heights.lock().insert(chain.clone(), last_processed);
        Ok(())
    }
}
