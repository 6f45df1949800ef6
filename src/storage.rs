use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// String key/value store persisted as one JSON document.
///
/// Writes go straight to disk; a store opened without a path keeps
/// everything in memory.
#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, String>>,
}

impl LocalStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => match serde_json::from_str::<BTreeMap<String, String>>(&text) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Discarding unreadable storage file {:?}: {}", path, e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read storage file {:?}", path))
            }
        };
        debug!("Opened storage {:?} with {} keys", path, entries.len());
        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.lock();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.lock();
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.persist(&entries)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        // A poisoned map is still a consistent map; every mutation is a single insert/remove.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let text = serde_json::to_string_pretty(entries).context("Failed to encode storage")?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, text).with_context(|| format!("Failed to write {:?}", tmp))?;
        fs::rename(&tmp, path).with_context(|| format!("Failed to replace {:?}", path))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = LocalStore::open(&path).unwrap();
        store.set("token", "abc").unwrap();
        store.set("other", "1").unwrap();
        store.remove("other").unwrap();
        drop(store);

        let reopened = LocalStore::open(&path).unwrap();
        assert_eq!(reopened.get("token").as_deref(), Some("abc"));
        assert_eq!(reopened.get("other"), None);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{not json").unwrap();
        let store = LocalStore::open(&path).unwrap();
        assert_eq!(store.get("token"), None);
    }
}
