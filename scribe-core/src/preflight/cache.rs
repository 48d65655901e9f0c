//! Content-addressed cache of diagnostics + suggestions.
//!
//! One JSON file per `(sha1(audio bytes), AUTO_TUNE_VERSION)`:
//!
//! ```json
//! {"timestamp": 1700000000.25, "diagnostics": {...}, "suggestion": {"cfg": {...}, "rationale": {...}}}
//! ```
//!
//! Anything unreadable, unparsable, incomplete or older than the TTL is a
//! miss. Concurrent writers of the same key produce identical content, so
//! last-writer-wins is harmless.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use crate::analysis::AudioDiagnostics;
use crate::error::Result;
use crate::thresholds::AUTO_TUNE_VERSION;
use crate::tuning::AutoTuneSuggestion;

/// Read size while hashing audio files.
const HASH_CHUNK: usize = 64 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    timestamp: f64,
    diagnostics: AudioDiagnostics,
    suggestion: AutoTuneSuggestion,
}

/// A valid cache hit.
#[derive(Debug, Clone)]
pub struct CachedAnalysis {
    pub diagnostics: AudioDiagnostics,
    pub suggestion: AutoTuneSuggestion,
}

/// On-disk analysis cache rooted at one directory.
#[derive(Debug, Clone)]
pub struct DiagnosticsCache {
    dir: PathBuf,
    version: String,
}

impl DiagnosticsCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            version: AUTO_TUNE_VERSION.to_string(),
        }
    }

    /// `<user cache dir>/scribe/autotune`.
    pub fn default_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.cache_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".cache"))
            .join("scribe")
            .join("autotune")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache file for an audio content hash.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}_{}.json", self.version))
    }

    /// Return the cached analysis for `key` if present, complete and fresh.
    pub fn load(&self, key: &str, ttl: Duration) -> Option<CachedAnalysis> {
        let path = self.entry_path(key);
        let raw = fs::read_to_string(&path).ok()?;
        let entry = match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                debug!(path = %path.display(), "ignoring unreadable cache entry: {e}");
                return None;
            }
        };
        let age = unix_now() - entry.timestamp;
        if age > ttl.as_secs_f64() {
            debug!(path = %path.display(), age, "cache entry expired");
            return None;
        }
        Some(CachedAnalysis {
            diagnostics: entry.diagnostics,
            suggestion: entry.suggestion,
        })
    }

    /// Persist an analysis, creating the cache directory as needed.
    ///
    /// Failures are logged and swallowed; a missing entry only costs a recompute.
    pub fn store(&self, key: &str, diagnostics: &AudioDiagnostics, suggestion: &AutoTuneSuggestion) {
        let path = self.entry_path(key);
        let entry = CacheEntry {
            timestamp: unix_now(),
            diagnostics: diagnostics.clone(),
            suggestion: suggestion.clone(),
        };
        let written = fs::create_dir_all(&self.dir)
            .map_err(anyhow::Error::from)
            .and_then(|_| serde_json::to_string(&entry).map_err(anyhow::Error::from))
            .and_then(|json| fs::write(&path, json).map_err(anyhow::Error::from));
        if let Err(e) = written {
            warn!(path = %path.display(), "failed to write preflight cache: {e}");
        }
    }
}

/// Hex SHA-1 of the file's full contents, read in 64 KiB chunks.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; HASH_CHUNK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn unix_now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
