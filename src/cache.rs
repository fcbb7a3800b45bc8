use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tempfile::Builder;
use tracing::{debug, warn};

use crate::error::ImfError;
use crate::table::Table;

pub const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Storage for assembled tables, keyed by a dataset/version string.
pub trait TableCache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Table>, ImfError>;
    fn set(&self, key: &str, table: &Table, ttl: Option<Duration>) -> Result<(), ImfError>;
    fn has(&self, key: &str) -> Result<bool, ImfError> {
        Ok(self.get(key)?.is_some())
    }
    fn clear(&self) -> Result<(), ImfError>;
}

struct MemoryEntry {
    table: Table,
    expires_at: Option<Instant>,
}

/// Process-local cache; entries live until they expire or `clear` is called.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TableCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Table>, ImfError> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        let expired = entries
            .get(key)
            .and_then(|entry| entry.expires_at)
            .is_some_and(|expires_at| expires_at <= Instant::now());
        if expired {
            entries.remove(key);
            return Ok(None);
        }
        Ok(entries.get(key).map(|entry| entry.table.clone()))
    }

    fn set(&self, key: &str, table: &Table, ttl: Option<Duration>) -> Result<(), ImfError> {
        let mut entries = self.entries.lock().map_err(|_| poisoned())?;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                table: table.clone(),
                expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
            },
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), ImfError> {
        self.entries.lock().map_err(|_| poisoned())?.clear();
        Ok(())
    }
}

fn poisoned() -> ImfError {
    ImfError::CacheIo("cache lock poisoned".to_string())
}

#[derive(Debug, Serialize, Deserialize)]
struct DiskEntry {
    key: String,
    stored_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    table: Table,
}

/// One JSON file per key under a cache directory.
#[derive(Debug, Clone)]
pub struct DiskCache {
    root: Utf8PathBuf,
}

impl DiskCache {
    /// Uses `~/.cache/imf-reader`.
    pub fn new() -> Result<Self, ImfError> {
        let root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("imf-reader")).ok()
            })
            .ok_or_else(|| ImfError::CacheIo("unable to resolve cache directory".to_string()))?;
        Ok(Self { root })
    }

    pub fn new_with_root(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn entry_path(&self, key: &str) -> Utf8PathBuf {
        let file_name = key
            .chars()
            .map(|ch| {
                if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                    ch
                } else {
                    '_'
                }
            })
            .collect::<String>();
        self.root.join(format!("{file_name}.json"))
    }

    fn write_atomic(&self, path: &Utf8Path, content: &[u8]) -> Result<(), ImfError> {
        fs::create_dir_all(self.root.as_std_path())
            .map_err(|err| ImfError::CacheIo(err.to_string()))?;
        let mut temp = Builder::new()
            .prefix("imf-reader-entry")
            .tempfile_in(self.root.as_std_path())
            .map_err(|err| ImfError::CacheIo(err.to_string()))?;
        temp.write_all(content)
            .map_err(|err| ImfError::CacheIo(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| ImfError::CacheIo(err.to_string()))?;
        Ok(())
    }
}

impl TableCache for DiskCache {
    fn get(&self, key: &str) -> Result<Option<Table>, ImfError> {
        let path = self.entry_path(key);
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let content =
            fs::read(path.as_std_path()).map_err(|err| ImfError::CacheIo(err.to_string()))?;
        let entry: DiskEntry = match serde_json::from_slice(&content) {
            Ok(entry) => entry,
            Err(err) => {
                warn!(%path, %err, "discarding unreadable cache entry");
                fs::remove_file(path.as_std_path())
                    .map_err(|err| ImfError::CacheIo(err.to_string()))?;
                return Ok(None);
            }
        };
        if entry.expires_at.is_some_and(|expires_at| expires_at <= Utc::now()) {
            debug!(key, "cache entry expired");
            fs::remove_file(path.as_std_path())
                .map_err(|err| ImfError::CacheIo(err.to_string()))?;
            return Ok(None);
        }
        debug!(key, "cache hit");
        Ok(Some(entry.table))
    }

    fn set(&self, key: &str, table: &Table, ttl: Option<Duration>) -> Result<(), ImfError> {
        let stored_at = Utc::now();
        // A TTL past the representable range never expires.
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| stored_at.checked_add_signed(ttl));
        let entry = DiskEntry {
            key: key.to_string(),
            stored_at,
            expires_at,
            table: table.clone(),
        };
        let content =
            serde_json::to_vec(&entry).map_err(|err| ImfError::CacheIo(err.to_string()))?;
        self.write_atomic(&self.entry_path(key), &content)
    }

    fn clear(&self) -> Result<(), ImfError> {
        if self.root.as_std_path().exists() {
            fs::remove_dir_all(self.root.as_std_path())
                .map_err(|err| ImfError::CacheIo(err.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, ColumnValues};

    fn sample() -> Table {
        Table::from_columns(vec![Column::new(
            "OBS_VALUE",
            ColumnValues::Float(vec![Some(1.5), None]),
        )])
        .unwrap()
    }

    #[test]
    fn memory_cache_round_trip_and_clear() {
        let cache = MemoryCache::new();
        assert!(!cache.has("weo_data_April_2024").unwrap());
        cache.set("weo_data_April_2024", &sample(), None).unwrap();
        assert_eq!(cache.get("weo_data_April_2024").unwrap(), Some(sample()));
        cache.clear().unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn memory_cache_expires_entries() {
        let cache = MemoryCache::new();
        cache
            .set("key", &sample(), Some(Duration::from_secs(0)))
            .unwrap();
        assert_eq!(cache.get("key").unwrap(), None);
    }

    #[test]
    fn oversized_ttl_never_expires() {
        let cache = MemoryCache::new();
        cache.set("key", &sample(), Some(Duration::MAX)).unwrap();
        assert_eq!(cache.get("key").unwrap(), Some(sample()));
    }

    #[test]
    fn disk_cache_keys_become_safe_file_names() {
        let cache = DiskCache::new_with_root(Utf8PathBuf::from("/tmp/imf"));
        assert_eq!(
            cache.entry_path("sdr/holdings 2024"),
            Utf8PathBuf::from("/tmp/imf/sdr_holdings_2024.json")
        );
    }
}
