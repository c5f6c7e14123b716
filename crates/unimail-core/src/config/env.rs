//! Snapshot of the process environment relevant to the client.
//!
//! The environment is read once (normally at startup) and then passed around
//! explicitly, so resolution never depends on hidden global state and tests
//! can build an environment from a plain list of pairs.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use tracing::warn;

/// Prefix shared by every unimail environment variable
pub const ENV_PREFIX: &str = "UNIMAIL_";

/// Overrides the config file base path
pub const CONFIG_FILE_VAR: &str = "UNIMAIL_CONFIG_FILE";

/// Overrides the cache file path
pub const CACHE_FILE_VAR: &str = "UNIMAIL_CACHE_FILE";

const XDG_CONFIG_HOME_VAR: &str = "XDG_CONFIG_HOME";

/// Application directory under the config home
const APP_DIR: &str = "unimail";

/// Config file base name (extensions are probed by the loader)
const CONFIG_BASE_NAME: &str = "config";

/// Cache file name
const CACHE_FILE_NAME: &str = "cache.json";

#[derive(Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
    home_dir: Option<PathBuf>,
}

impl Environment {
    /// Capture the relevant variables from the running process.
    pub fn capture() -> Self {
        Self::from_vars_os(std::env::vars_os()).with_home_dir(dirs::home_dir())
    }

    /// Like [`Environment::from_vars`], but tolerates variables that are not
    /// valid Unicode. Unrelated ones are ignored and relevant ones are
    /// skipped with a warning.
    pub fn from_vars_os<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let vars = vars.into_iter().filter_map(|(name, value)| {
            let name = name.into_string().ok().filter(|name| is_relevant(name))?;
            match value.into_string() {
                Ok(value) => Some((name, value)),
                Err(_) => {
                    warn!(name = %name, "Ignoring environment variable that is not valid UTF-8");
                    None
                }
            }
        });
        Self::from_vars(vars)
    }

    /// Build an environment from explicit pairs. Variables that are not
    /// `UNIMAIL_*` or `XDG_CONFIG_HOME` are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(k, _)| is_relevant(k))
            .collect();

        Self {
            vars,
            home_dir: None,
        }
    }

    pub fn with_home_dir(mut self, home_dir: Option<PathBuf>) -> Self {
        self.home_dir = home_dir;
        self
    }

    /// Look up a variable, treating empty values as unset.
    pub fn var(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn config_home(&self) -> Option<PathBuf> {
        self.var(XDG_CONFIG_HOME_VAR)
            .map(PathBuf::from)
            .or_else(|| self.home_dir.as_ref().map(|home| home.join(".config")))
    }

    /// Base path (without extension) of the config file.
    pub fn default_config_base(&self) -> Option<PathBuf> {
        self.var(CONFIG_FILE_VAR).map(PathBuf::from).or_else(|| {
            self.config_home()
                .map(|dir| dir.join(APP_DIR).join(CONFIG_BASE_NAME))
        })
    }

    /// Location of the session token cache.
    pub fn default_cache_file(&self) -> Option<PathBuf> {
        self.var(CACHE_FILE_VAR).map(PathBuf::from).or_else(|| {
            self.config_home()
                .map(|dir| dir.join(APP_DIR).join(CACHE_FILE_NAME))
        })
    }
}

fn is_relevant(name: &str) -> bool {
    name.starts_with(ENV_PREFIX) || name == XDG_CONFIG_HOME_VAR
}

// Values may hold credentials, so only names are shown.
impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.vars.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Environment")
            .field("vars", &names)
            .field("home_dir", &self.home_dir)
            .finish()
    }
}
