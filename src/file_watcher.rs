// Watched files: stat, conditional read, and the mtime/content cache that lets a cycle skip reads.

use crate::config::FileConfig;
use crate::models::MonitoredFile;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::instrument;

pub const FILE_NOT_FOUND: &str = "File not found";
pub const UNREADABLE_CONTENT: &str = "Unable to read file content";

/// Result of one file probe.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub file: MonitoredFile,
    /// Set when the content was freshly read; the cache should now hold this mtime and text.
    pub cache_update: Option<CachedFile>,
}

/// Last text read for a path, and the mtime it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedFile {
    pub modified: SystemTime,
    pub content: Arc<str>,
}

/// Process-wide read cache keyed by path. Entries are replaced whole.
#[derive(Debug, Default)]
pub struct FileCache {
    entries: RwLock<HashMap<String, CachedFile>>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<CachedFile> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
    }

    pub fn store(&self, path: &str, entry: CachedFile) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A file as seen by one cycle, with full content whenever it exists.
#[derive(Debug, Clone)]
pub struct ObservedFile {
    pub file: MonitoredFile,
    /// Mtime the content corresponds to. `None` when there is nothing a subscriber could reuse
    /// (missing file, unreadable content, no mtime support).
    pub content_modified: Option<SystemTime>,
}

/// Probes `config.path`. When `previous_modified` equals the current mtime the read is skipped
/// and the result is `unchanged` with no content. Pass `None` to force a full read.
///
/// Only the mtime is compared: a rewrite that preserves the mtime is reported as unchanged.
#[instrument(skip_all, fields(operation = "inspect_file", path = %config.path))]
pub async fn inspect(config: &FileConfig, previous_modified: Option<SystemTime>) -> Inspection {
    let meta = match tokio::fs::metadata(&config.path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return missing(config, FILE_NOT_FOUND.to_string());
        }
        Err(e) => {
            tracing::debug!(error = %e, "stat failed");
            return missing(config, e.to_string());
        }
    };

    let modified = meta.modified().ok();
    let mut file = MonitoredFile {
        name: config.name.clone(),
        path: config.path.clone(),
        expand: config.expand,
        exists: true,
        size: Some(meta.len()),
        modified: modified.map(epoch_secs),
        content: None,
        unchanged: false,
        error: None,
    };

    if let (Some(prev), Some(now)) = (previous_modified, modified)
        && prev == now
    {
        file.unchanged = true;
        return Inspection {
            file,
            cache_update: None,
        };
    }

    match tokio::fs::read(&config.path).await {
        Ok(bytes) => {
            let content: Arc<str> = Arc::from(String::from_utf8_lossy(&bytes));
            file.content = Some(content.to_string());
            Inspection {
                file,
                cache_update: modified.map(|modified| CachedFile { modified, content }),
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "read failed");
            file.content = Some(UNREADABLE_CONTENT.to_string());
            Inspection {
                file,
                cache_update: None,
            }
        }
    }
}

/// Probes through `cache`: reuses cached text on an mtime hit, refreshes the cache on a read.
/// `force_full` ignores the cached mtime and always reads.
pub async fn observe(config: &FileConfig, cache: &FileCache, force_full: bool) -> ObservedFile {
    let cached = if force_full {
        None
    } else {
        cache.get(&config.path)
    };
    let Inspection {
        mut file,
        cache_update,
    } = inspect(config, cached.as_ref().map(|c| c.modified)).await;

    let content_modified = if file.unchanged {
        // Hit: `cached` is Some, since inspect only reports unchanged against a previous mtime.
        let hit = cached.map(|c| {
            file.content = Some(c.content.to_string());
            c.modified
        });
        file.unchanged = false;
        hit
    } else if let Some(update) = cache_update {
        let modified = update.modified;
        cache.store(&config.path, update);
        Some(modified)
    } else {
        None
    };

    ObservedFile {
        file,
        content_modified,
    }
}

fn missing(config: &FileConfig, error: String) -> Inspection {
    Inspection {
        file: MonitoredFile {
            name: config.name.clone(),
            path: config.path.clone(),
            expand: config.expand,
            exists: false,
            size: None,
            modified: None,
            content: None,
            unchanged: false,
            error: Some(error),
        },
        cache_update: None,
    }
}

fn epoch_secs(t: SystemTime) -> f64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
