//! Config file discovery and loading.
//!
//! The config file is located from a base path (by default
//! `~/.config/unimail/config`). The base path itself is tried first, then the
//! same path with a `.json` and a `.json5` extension. Both formats are read by
//! the JSON5 parser, which is a superset of JSON and allows comments.
//!
//! The document must be a flat object whose keys are config key names, e.g.
//!
//! ```json5
//! {
//!   // credentials issued in the unimail dashboard
//!   tokenKey: "key_123",
//!   tokenSecret: "secret_456",
//!   port: 8443,
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::ConfigKey;

/// Extensions probed after the bare base path, in priority order.
pub const CONFIG_EXTENSIONS: [&str; 2] = ["json", "json5"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("failed to read config file at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json5::Error,
    },

    #[error("unknown key `{key}` in config file at {path}")]
    UnknownKey { path: PathBuf, key: String },

    #[error("key `{key}` in config file at {path} must be a string, number or boolean")]
    InvalidValue { path: PathBuf, key: String },
}

/// A loaded config file: a validated mapping from key to value.
#[derive(Clone)]
pub struct ConfigFile {
    path: PathBuf,
    values: HashMap<ConfigKey, String>,
}

impl ConfigFile {
    /// Find the config file for `base`, if one exists.
    pub fn locate(base: &Path) -> Option<PathBuf> {
        if base.is_file() {
            return Some(base.to_path_buf());
        }

        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| with_extension(base, ext))
            .find(|candidate| candidate.is_file())
    }

    /// Read and validate the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let raw: BTreeMap<String, Value> =
            serde_json5::from_str(&contents).map_err(|source| ConfigFileError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let mut values = HashMap::new();
        for (name, value) in raw {
            let key = ConfigKey::from_name(&name).ok_or_else(|| ConfigFileError::UnknownKey {
                path: path.to_path_buf(),
                key: name.clone(),
            })?;

            let value = match value {
                Value::Null => continue,
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(ConfigFileError::InvalidValue {
                        path: path.to_path_buf(),
                        key: name,
                    })
                }
            };
            values.insert(key, value);
        }

        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        self.values
            .get(&key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

impl fmt::Debug for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.values.keys().map(|key| key.name()).collect();
        f.debug_struct("ConfigFile")
            .field("path", &self.path)
            .field("keys", &keys)
            .finish()
    }
}

/// Append an extension without replacing anything after a dot in the base
/// (`config.d/base` → `config.d/base.json`).
pub(crate) fn with_extension(base: &Path, ext: &str) -> PathBuf {
    let mut os = base.as_os_str().to_os_string();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}
