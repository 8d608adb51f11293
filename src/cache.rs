//! Key/value cache for provider results.
//!
//! Entries are content-addressed: callers derive keys from a hash of the
//! request (see [`request_key`]) so logically identical requests collide.
//! Two backends: [`MemoryCache`] for tests and runs with caching disabled on
//! disk, and [`DiskCache`] which stores one JSON file per key.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::CacheConfig;
use crate::providers::GenerateRequest;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize cache entry: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;

    /// Store `value`; `ttl` overrides the backend default.
    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError>;
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Cache key for a generation request.
///
/// Absent fields are left out before hashing and the remaining keys are
/// sorted, so extra defaults never change the key.
pub fn request_key(
    prompt: &str,
    model: Option<&str>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    system_prompt: Option<&str>,
) -> String {
    let mut fields: BTreeMap<&str, Value> = BTreeMap::new();
    fields.insert("prompt", Value::from(prompt));
    if let Some(model) = model {
        fields.insert("model", Value::from(model));
    }
    if let Some(temperature) = temperature {
        fields.insert("temperature", Value::from(f64::from(temperature)));
    }
    if let Some(max_tokens) = max_tokens {
        fields.insert("max_tokens", Value::from(max_tokens));
    }
    if let Some(system_prompt) = system_prompt {
        fields.insert("system_prompt", Value::from(system_prompt));
    }

    // BTreeMap serializes in key order
    let canonical = serde_json::to_string(&fields).unwrap_or_default();
    sha256_hex(canonical.as_bytes())
}

/// [`request_key`] for a request sent to `model`.
pub fn generate_key(model: &str, request: &GenerateRequest) -> String {
    request_key(
        &request.prompt,
        Some(model),
        request.temperature,
        request.max_tokens,
        request.system_prompt.as_deref(),
    )
}

/// In-process cache, lost on exit.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Value, Option<Instant>)>>,
    default_ttl: Option<Duration>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl: Some(ttl),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().ok()?;
        match entries.get(key) {
            Some((_, Some(expires))) if *expires <= Instant::now() => {
                entries.remove(key);
                None
            }
            Some((value, _)) => Some(value.clone()),
            None => None,
        }
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires = ttl.or(self.default_ttl).map(|ttl| Instant::now() + ttl);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), (value, expires));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct DiskEntry {
    /// Unix seconds; `None` never expires
    expires_at: Option<i64>,
    value: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: u64,
    pub hits: u64,
    pub misses: u64,
}

/// One JSON file per key under `dir`, bounded by `max_size` bytes.
pub struct DiskCache {
    dir: PathBuf,
    ttl: Duration,
    max_size: u64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DiskCache {
    /// `ttl` of zero means entries never expire.
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration, max_size: u64) -> Result<Self, CacheError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            ttl,
            max_size,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    /// Cache directory resolved against `base` when relative.
    pub fn from_config(config: &CacheConfig, base: &Path) -> Result<Self, CacheError> {
        let dir = Path::new(&config.dir);
        let dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            base.join(dir)
        };
        Self::new(dir, Duration::from_secs(config.ttl_secs), config.max_size)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sha256_hex(key.as_bytes())))
    }

    fn entry_files(&self) -> Vec<(PathBuf, std::fs::Metadata)> {
        std::fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
                    .filter_map(|path| std::fs::metadata(&path).ok().map(|meta| (path, meta)))
                    .filter(|(_, meta)| meta.is_file())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn miss(&self) -> Option<Value> {
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Drop oldest-written entries until the directory fits in `max_size`.
    fn evict(&self) -> Result<usize, CacheError> {
        let mut files = self.entry_files();
        let mut total: u64 = files.iter().map(|(_, meta)| meta.len()).sum();
        if total <= self.max_size {
            return Ok(0);
        }

        files.sort_by_key(|(_, meta)| meta.modified().ok());

        let mut evicted = 0;
        for (path, meta) in files {
            if total <= self.max_size {
                break;
            }
            std::fs::remove_file(&path)?;
            total = total.saturating_sub(meta.len());
            evicted += 1;
        }

        log::debug!("cache evicted={evicted} bytes={total}");
        Ok(evicted)
    }

    /// Remove every entry; returns the number removed.
    pub fn clear(&self) -> Result<usize, CacheError> {
        let files = self.entry_files();
        for (path, _) in &files {
            std::fs::remove_file(path)?;
        }
        Ok(files.len())
    }

    pub fn stats(&self) -> CacheStats {
        let files = self.entry_files();
        CacheStats {
            entries: files.len(),
            bytes: files.iter().map(|(_, meta)| meta.len()).sum(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Cache for DiskCache {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.entry_path(key);
        let Ok(data) = std::fs::read(&path) else {
            return self.miss();
        };

        let entry: DiskEntry = match serde_json::from_slice(&data) {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("cache entry {} is corrupt: {e}", path.display());
                let _ = std::fs::remove_file(&path);
                return self.miss();
            }
        };

        if let Some(expires_at) = entry.expires_at {
            if expires_at <= chrono::Utc::now().timestamp() {
                let _ = std::fs::remove_file(&path);
                return self.miss();
            }
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value)
    }

    fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        let ttl = ttl.unwrap_or(self.ttl);
        let expires_at = if ttl.is_zero() {
            None
        } else {
            let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
            Some(chrono::Utc::now().timestamp().saturating_add(secs))
        };

        let data = serde_json::to_vec(&DiskEntry { expires_at, value })?;

        let path = self.entry_path(key);
        let temp_path = path.with_extension("tmp");
        if let Err(e) = std::fs::write(&temp_path, &data) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e.into());
        }
        std::fs::rename(&temp_path, &path)?;

        self.evict()?;
        Ok(())
    }
}
