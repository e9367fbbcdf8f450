use crate::error::IoError;
use crate::serialization::{decode_world, encode_world};
use ascension_core::WorldStore;
use ascension_data::WorldState;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// World state as a flat JSON file.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash mid-write leaves the previous document intact. Saves block; wrap
/// in [`crate::BackgroundStore`] to keep them off the tick path.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_owned(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl WorldStore for FileStore {
    fn load(&self) -> anyhow::Result<Option<WorldState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&self.path)
            .map_err(|e| IoError::file("reading", &self.path, e))?;
        Ok(Some(decode_world(&json)?))
    }

    fn save(&self, state: &WorldState) -> anyhow::Result<()> {
        let json = encode_world(state)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.temp_path();
        std::fs::write(&tmp, json)
            .map_err(|e| IoError::file("writing", &tmp, e))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| IoError::file("replacing", &self.path, e))?;
        Ok(())
    }
}

/// In-memory store with switchable failures. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<Option<WorldState>>>,
    fail_loads: Arc<AtomicBool>,
    fail_saves: Arc<AtomicBool>,
    saves: Arc<AtomicU64>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_state(world: WorldState) -> Self {
        let store = Self::default();
        *store.lock() = Some(world);
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<WorldState>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_loads(&self, fail: bool) {
        self.fail_loads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Last successfully saved state.
    #[must_use]
    pub fn saved(&self) -> Option<WorldState> {
        self.lock().clone()
    }

    /// Number of successful saves.
    #[must_use]
    pub fn save_count(&self) -> u64 {
        self.saves.load(Ordering::SeqCst)
    }
}

impl WorldStore for MemoryStore {
    fn load(&self) -> anyhow::Result<Option<WorldState>> {
        if self.fail_loads.load(Ordering::SeqCst) {
            return Err(IoError::Injected("load").into());
        }
        Ok(self.lock().clone())
    }

    fn save(&self, state: &WorldState) -> anyhow::Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(IoError::Injected("save").into());
        }
        *self.lock() = Some(state.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
