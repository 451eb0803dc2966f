//! services/portal/src/adapters/file_cache.rs
//!
//! A durable `LocalCache` backed by a single JSON object on disk. Every write
//! rewrites the file through a temporary sibling and a rename, so a crash leaves
//! either the old or the new contents.

use pcas_core::ports::{LocalCache, PortError, PortResult};
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

pub struct FileCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileCache {
    /// Opens (or creates) the cache file at `path`.
    ///
    /// A file that is not a JSON object of strings is set aside and the cache starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, std::io::Error> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), "Local cache file is malformed, starting empty: {}", e);
                    let aside = path.with_extension("corrupt");
                    if let Err(e) = fs::rename(&path, &aside) {
                        warn!(path = %aside.display(), "Could not set malformed cache aside: {}", e);
                    }
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e),
        };

        info!(path = %path.display(), entries = entries.len(), "Opened local cache");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> PortResult<()> {
        let serialized =
            serde_json::to_string_pretty(entries).map_err(|e| PortError::Storage(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serialized).map_err(|e| PortError::Storage(e.to_string()))?;
        fs::rename(&tmp, &self.path).map_err(|e| PortError::Storage(e.to_string()))
    }
}

impl LocalCache for FileCache {
    fn get(&self, key: &str) -> PortResult<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> PortResult<()> {
        let mut entries = self.lock();
        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.flush(&entries) {
            // Keep memory and disk in step.
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> PortResult<()> {
        let mut entries = self.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> PortResult<Vec<String>> {
        Ok(self.lock().keys().cloned().collect())
    }
}
