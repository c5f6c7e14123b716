//! Client configuration resolution.
//!
//! Every setting is identified by a [`ConfigKey`] and resolved from four
//! sources, first non-empty value wins:
//!
//! 1. explicit [`ClientOptions`] passed when the client is created
//! 2. the `UNIMAIL_*` environment variable derived from the key name
//!    (`tokenSecret` → `UNIMAIL_TOKEN_SECRET`)
//! 3. the optional config file (`~/.config/unimail/config{,.json,.json5}`,
//!    or `$UNIMAIL_CONFIG_FILE`)
//! 4. built-in defaults
//!
//! The config file is located and parsed lazily on first use and memoized
//! for the lifetime of the [`Config`].

pub mod env;
pub mod file;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use secrecy::SecretString;
use tracing::debug;

use crate::api::ApiError;
use crate::auth::Credentials;

pub use env::Environment;
pub use file::{ConfigFile, ConfigFileError};

/// Default API host
pub const DEFAULT_HOST: &str = "api.unimail.co";

/// Default API protocol
pub const DEFAULT_PROTOCOL: &str = "https";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    Host,
    Protocol,
    Port,
    TokenKey,
    TokenSecret,
    Cache,
    SessionKey,
    Verbose,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 8] = [
        ConfigKey::Host,
        ConfigKey::Protocol,
        ConfigKey::Port,
        ConfigKey::TokenKey,
        ConfigKey::TokenSecret,
        ConfigKey::Cache,
        ConfigKey::SessionKey,
        ConfigKey::Verbose,
    ];

    /// Name as written in option maps and config files.
    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::Host => "host",
            ConfigKey::Protocol => "protocol",
            ConfigKey::Port => "port",
            ConfigKey::TokenKey => "tokenKey",
            ConfigKey::TokenSecret => "tokenSecret",
            ConfigKey::Cache => "cache",
            ConfigKey::SessionKey => "sessionKey",
            ConfigKey::Verbose => "verbose",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == name)
    }

    /// Environment variable that supplies this key.
    pub fn env_var(self) -> String {
        env_var_name(self.name())
    }

    /// Values that must never show up in logs or debug output.
    pub fn is_secret(self) -> bool {
        matches!(self, ConfigKey::TokenSecret | ConfigKey::SessionKey)
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `tokenSecret` → `UNIMAIL_TOKEN_SECRET`
fn env_var_name(key: &str) -> String {
    let mut out = String::from(env::ENV_PREFIX);
    let mut prev_lower = false;
    for c in key.chars() {
        if c.is_ascii_uppercase() && prev_lower {
            out.push('_');
        }
        if c == '-' || c == ' ' {
            out.push('_');
            prev_lower = false;
            continue;
        }
        prev_lower = c.is_ascii_lowercase() || c.is_ascii_digit();
        out.push(c.to_ascii_uppercase());
    }
    out
}

/// Explicit settings supplied by the caller at client construction.
#[derive(Clone, Default)]
pub struct ClientOptions {
    values: HashMap<ConfigKey, String>,
    config_file: Option<PathBuf>,
    no_cache: bool,
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a config value. Empty values are ignored during resolution.
    pub fn set(mut self, key: ConfigKey, value: impl Into<String>) -> Self {
        self.values.insert(key, value.into());
        self
    }

    /// Only an enabled flag is recorded, so `false` still lets the
    /// environment or config file turn verbosity on.
    pub fn verbose(self, verbose: bool) -> Self {
        if verbose {
            self.set(ConfigKey::Verbose, "true")
        } else {
            self
        }
    }

    /// Use an explicit config file base path instead of the default one.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn cache_file(self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_string_lossy().into_owned();
        self.set(ConfigKey::Cache, path)
    }

    /// Never read or write the session token cache.
    pub fn no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    fn get(&self, key: ConfigKey) -> Option<&str> {
        self.values
            .get(&key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

impl fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut values: Vec<(&str, &str)> = self
            .values
            .iter()
            .map(|(key, value)| {
                let shown = if key.is_secret() { "[REDACTED]" } else { value.as_str() };
                (key.name(), shown)
            })
            .collect();
        values.sort_unstable();

        f.debug_struct("ClientOptions")
            .field("values", &values)
            .field("config_file", &self.config_file)
            .field("no_cache", &self.no_cache)
            .finish()
    }
}

/// Resolved configuration for a single client instance.
pub struct Config {
    options: ClientOptions,
    env: Environment,
    config_base: Option<PathBuf>,
    file: OnceCell<Option<ConfigFile>>,
}

impl Config {
    pub fn new(options: ClientOptions, env: Environment) -> Self {
        let config_base = options
            .config_file
            .clone()
            .or_else(|| env.default_config_base());

        Self {
            options,
            env,
            config_base,
            file: OnceCell::new(),
        }
    }

    /// Resolve a required value.
    pub fn get(&self, key: ConfigKey) -> Result<String, ApiError> {
        match self.get_optional(key)? {
            Some(value) => Ok(value),
            None => Err(self.missing(key)),
        }
    }

    /// Resolve a value that may legitimately be absent.
    pub fn get_optional(&self, key: ConfigKey) -> Result<Option<String>, ApiError> {
        if let Some(value) = self.options.get(key) {
            return Ok(Some(value.to_string()));
        }

        if let Some(value) = self.env.var(&key.env_var()) {
            return Ok(Some(value.to_string()));
        }

        if let Some(value) = self.file()?.and_then(|file| file.get(key)) {
            return Ok(Some(value.to_string()));
        }

        Ok(self.default_value(key))
    }

    /// Resolve a boolean switch; absent means off.
    pub fn flag(&self, key: ConfigKey) -> Result<bool, ApiError> {
        Ok(self
            .get_optional(key)?
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on"))
            .unwrap_or(false))
    }

    /// `protocol://host[:port]`; the port segment is omitted when unset.
    pub fn base_url(&self) -> Result<String, ApiError> {
        let protocol = self.get(ConfigKey::Protocol)?;
        let host = self.get(ConfigKey::Host)?;
        match self.get_optional(ConfigKey::Port)? {
            Some(port) => Ok(format!("{}://{}:{}", protocol, host, port)),
            None => Ok(format!("{}://{}", protocol, host)),
        }
    }

    /// Long-lived credential pair used to create sessions.
    pub fn credentials(&self) -> Result<Credentials, ApiError> {
        let key = self.get(ConfigKey::TokenKey)?;
        let secret = SecretString::from(self.get(ConfigKey::TokenSecret)?);
        Ok(Credentials::new(key, secret))
    }

    /// Cache file location, or `None` when caching is turned off, either by
    /// [`ClientOptions::no_cache`] or by a `cache` value of `false`.
    pub fn cache_path(&self) -> Result<Option<PathBuf>, ApiError> {
        if self.options.no_cache {
            return Ok(None);
        }
        Ok(self
            .get_optional(ConfigKey::Cache)?
            .filter(|value| !value.eq_ignore_ascii_case("false"))
            .map(PathBuf::from))
    }

    /// Path of the config file in use, if one was found.
    pub fn config_file_path(&self) -> Result<Option<&Path>, ApiError> {
        Ok(self.file()?.map(ConfigFile::path))
    }

    fn file(&self) -> Result<Option<&ConfigFile>, ApiError> {
        let file = self.file.get_or_try_init(|| {
            let Some(path) = self.config_base.as_deref().and_then(ConfigFile::locate) else {
                debug!(base = ?self.config_base, "No config file found");
                return Ok::<_, ConfigFileError>(None);
            };
            debug!(path = %path.display(), "Loading config file");
            ConfigFile::load(&path).map(Some)
        })?;
        Ok(file.as_ref())
    }

    fn default_value(&self, key: ConfigKey) -> Option<String> {
        match key {
            ConfigKey::Host => Some(DEFAULT_HOST.to_string()),
            ConfigKey::Protocol => Some(DEFAULT_PROTOCOL.to_string()),
            ConfigKey::Cache => self
                .env
                .default_cache_file()
                .map(|path| path.to_string_lossy().into_owned()),
            _ => None,
        }
    }

    fn missing(&self, key: ConfigKey) -> ApiError {
        // A file that failed to load has already surfaced its own error.
        let located = self.file.get().and_then(Option::as_ref).map(ConfigFile::path);
        let location = match (located, &self.config_base) {
            (Some(path), _) => format!("(currently located at {})", path.display()),
            (None, Some(base)) => format!(
                "(not created; defaults to {} or {})",
                file::with_extension(base, file::CONFIG_EXTENSIONS[0]).display(),
                file::with_extension(base, file::CONFIG_EXTENSIONS[1]).display(),
            ),
            (None, None) => "(not created; no home directory to look in)".to_string(),
        };

        ApiError::Configuration {
            key: key.name().to_string(),
            env_var: key.env_var(),
            location,
        }
    }
}
