use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::Resource;

/// Longest readable URL prefix kept in an entry file name
const MAX_KEY_PREFIX: usize = 80;

const META_EXT: &str = "json";
const BODY_EXT: &str = "bin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            let remaining_mins = minutes % 60;
            if remaining_mins >= 30 {
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            let remaining_hours = (minutes % 1440) / 60;
            if remaining_hours >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// One generation of the response cache, stored at `<root>/<name>/`.
///
/// Writes are last-writer-wins per URL. Files are written to a temporary
/// name and renamed into place, and the lock keeps a reader from pairing
/// old metadata with a new body.
pub struct CacheStore {
    root: PathBuf,
    name: String,
    dir: PathBuf,
    lock: RwLock<()>,
}

impl CacheStore {
    pub fn open(root: impl Into<PathBuf>, name: &str) -> Result<Self> {
        let root = root.into();
        let dir = root.join(name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache directory: {}", dir.display()))?;
        Ok(Self {
            root,
            name: name.to_string(),
            dir,
            lock: RwLock::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, url: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", entry_key(url), ext))
    }

    /// Look up the entry stored for `url`.
    pub fn match_url(&self, url: &str) -> Result<Option<CachedData<Resource>>> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);

        let meta_path = self.entry_path(url, META_EXT);
        if !meta_path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&meta_path)
            .with_context(|| format!("Failed to read cache entry: {}", url))?;
        let mut cached: CachedData<Resource> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache entry: {}", url))?;

        if cached.data.url != url {
            // Key collision with a different URL
            debug!(url = url, stored = %cached.data.url, "Cache key collision, treating as miss");
            return Ok(None);
        }

        let body = fs::read(self.entry_path(url, BODY_EXT))
            .with_context(|| format!("Failed to read cached body: {}", url))?;
        if body.len() != cached.data.len {
            debug!(url = url, expected = cached.data.len, actual = body.len(), "Cached body length mismatch, treating as miss");
            return Ok(None);
        }
        cached.data.body = body;

        Ok(Some(cached))
    }

    /// Store `resource`, replacing whatever was cached for its URL.
    pub fn put(&self, resource: &Resource) -> Result<()> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);

        let mut meta = resource.clone();
        meta.len = resource.body.len();
        let cached = CachedData::new(meta);

        write_atomically(&self.entry_path(&resource.url, BODY_EXT), &resource.body)
            .with_context(|| format!("Failed to write cached body: {}", resource.url))?;
        let contents = serde_json::to_string_pretty(&cached)?;
        write_atomically(&self.entry_path(&resource.url, META_EXT), contents.as_bytes())
            .with_context(|| format!("Failed to write cache entry: {}", resource.url))?;

        debug!(url = %resource.url, bytes = cached.data.len, cache = %self.name, "Cached response");
        Ok(())
    }

    /// Metadata of every stored entry, bodies left empty. Sorted by URL.
    pub fn entries(&self) -> Result<Vec<CachedData<Resource>>> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);

        let mut entries = Vec::new();
        for dir_entry in fs::read_dir(&self.dir)? {
            let path = dir_entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(META_EXT) {
                continue;
            }
            let contents = fs::read_to_string(&path)?;
            match serde_json::from_str::<CachedData<Resource>>(&contents) {
                Ok(cached) => entries.push(cached),
                Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable cache entry"),
            }
        }
        entries.sort_by(|a, b| a.data.url.cmp(&b.data.url));
        Ok(entries)
    }

    /// Delete every cache generation under the root except this one.
    /// Returns the names removed.
    pub fn prune_other_generations(&self) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        for dir_entry in fs::read_dir(&self.root)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_dir() {
                continue;
            }
            let name = dir_entry.file_name().to_string_lossy().to_string();
            if name == self.name {
                continue;
            }
            fs::remove_dir_all(dir_entry.path())
                .with_context(|| format!("Failed to delete old cache: {}", name))?;
            info!(cache = %name, "Deleted old cache generation");
            removed.push(name);
        }
        removed.sort();
        Ok(removed)
    }
}

fn write_atomically(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}

/// File-name key for a URL: a readable sanitized prefix plus an FNV-1a hash
/// of the full URL.
fn entry_key(url: &str) -> String {
    let prefix: String = url
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .take(MAX_KEY_PREFIX)
        .collect();

    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in url.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }

    format!("{}-{:016x}", prefix, hash)
}

// ============================================================================
// Tests
// ============================================================================
