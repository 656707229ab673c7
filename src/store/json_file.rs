//! JSON snapshot store.
//!
//! Keeps the state in memory and rewrites the whole snapshot file on every
//! committed write. The new snapshot goes to a temporary file first and is
//! renamed over the store file, so a crash leaves either the old or the new
//! snapshot on disk.

use super::{StateBackend, StoreState};
use crate::error::{IpamError, IpamResult};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl JsonFileStore {
    /// Open the store file, starting empty when it does not exist yet.
    pub fn open(path: impl AsRef<Path>) -> IpamResult<JsonFileStore> {
        let path = path.as_ref().to_path_buf();
        let state = match std::fs::read_to_string(&path) {
            Ok(json) => {
                log::info!("Reading store file: {}", path.display());
                let mut state = parse_snapshot(&json, &path)?;
                state.reconcile().map_err(|e| {
                    IpamError::Storage(format!("Invalid store file {}: {e}", path.display()))
                })?;
                state
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Store file not found, starting empty: {}", path.display());
                StoreState::default()
            }
            Err(e) => {
                return Err(IpamError::Storage(format!(
                    "Error reading store file {}: {e}",
                    path.display()
                )))
            }
        };
        Ok(JsonFileStore {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, state: &StoreState) -> IpamResult<()> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|e| IpamError::Storage(format!("Error serializing store: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        if let Err(e) = write_synced(&tmp, json.as_bytes()) {
            let _ = std::fs::remove_file(&tmp);
            return Err(IpamError::Storage(format!("Error writing {}: {e}", tmp.display())));
        }
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(IpamError::Storage(format!(
                "Error replacing store file {}: {e}",
                self.path.display()
            )));
        }
        log::trace!("store snapshot written to {}", self.path.display());
        Ok(())
    }
}

/// Write `bytes` to `path` and flush them to disk.
fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn parse_snapshot(json: &str, path: &Path) -> IpamResult<StoreState> {
    let mut deserializer = serde_json::Deserializer::from_str(json);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        IpamError::Storage(format!(
            "Error parsing store file {}: path={} error={}",
            path.display(),
            e.path(),
            e
        ))
    })
}

impl StateBackend for JsonFileStore {
    fn read<T>(&self, f: impl FnOnce(&StoreState) -> IpamResult<T>) -> IpamResult<T> {
        let guard = self
            .state
            .lock()
            .map_err(|e| IpamError::Storage(format!("store lock poisoned: {e}")))?;
        f(&*guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut StoreState) -> IpamResult<T>) -> IpamResult<T> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| IpamError::Storage(format!("store lock poisoned: {e}")))?;
        let mut scratch = guard.clone();
        let out = f(&mut scratch)?;
        self.persist(&scratch)?;
        *guard = scratch;
        Ok(out)
    }
}
