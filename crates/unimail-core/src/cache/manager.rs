use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use super::CredentialFingerprint;

/// Logical cache key for the session token.
pub const SESSION_TOKEN_KEY: &str = "sessionToken";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to read cache file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse cache file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write cache file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize cache contents: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// File-backed cache of values scoped to one credential pair.
///
/// The file is a JSON object keyed by fingerprint, each entry holding the
/// cached values for that credential pair:
///
/// ```json
/// {
///   "9c2f4a1b7d0e3f58": { "sessionToken": "..." }
/// }
/// ```
///
/// Every operation reads (and for `set`, rewrites) the whole file. It is
/// meant for one CLI process at a time; concurrent writers race and the last
/// write wins.
#[derive(Debug, Clone)]
pub struct CredentialCache {
    path: PathBuf,
    fingerprint: CredentialFingerprint,
}

impl CredentialCache {
    pub fn new(path: impl Into<PathBuf>, fingerprint: CredentialFingerprint) -> Self {
        Self {
            path: path.into(),
            fingerprint,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn fingerprint(&self) -> &CredentialFingerprint {
        &self.fingerprint
    }

    /// Look up a cached value. A missing file is simply a miss.
    pub fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let Some(contents) = self.load()? else {
            return Ok(None);
        };

        Ok(contents
            .get(self.fingerprint.as_str())
            .and_then(|entry| entry.get(key))
            .and_then(Value::as_str)
            .map(str::to_owned))
    }

    /// Store a value under this cache's fingerprint, keeping every other
    /// fingerprint's entries intact.
    pub fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut contents = self.load()?.unwrap_or_default();

        let entry = contents
            .entry(self.fingerprint.as_str())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(values) = entry {
            values.insert(key.to_string(), Value::String(value.to_string()));
        }

        self.save(&contents)
    }

    fn load(&self) -> Result<Option<Map<String, Value>>, CacheError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "Cache file does not exist");
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&self.path).map_err(|source| CacheError::Read {
            path: self.path.clone(),
            source,
        })?;

        if contents.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|source| CacheError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    fn save(&self, contents: &Map<String, Value>) -> Result<(), CacheError> {
        let write_err = |source| CacheError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        // Write to a sibling file first so a crash never leaves half a document.
        let serialized = serde_json::to_string_pretty(contents)?;
        let tmp = crate::config::file::with_extension(&self.path, "tmp");
        std::fs::write(&tmp, serialized).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;

        debug!(path = %self.path.display(), "Cache file written");
        Ok(())
    }
}
