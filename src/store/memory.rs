//! Process-local store.

use super::{StateBackend, StoreState};
use crate::error::{IpamError, IpamResult};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// Start from an existing state, after checking its ids.
    pub fn with_state(mut state: StoreState) -> IpamResult<MemoryStore> {
        state.reconcile()?;
        Ok(MemoryStore {
            state: Mutex::new(state),
        })
    }
}

impl StateBackend for MemoryStore {
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
        *guard = scratch;
        Ok(out)
    }
}
