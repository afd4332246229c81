//! Configuration loading for Toggle.
//!
//! ```toml
//! [storage]
//! dir = "${HOME}/.local/share/toggle/persist"
//!
//! [timing]
//! bounce_delay_ms = 250
//! restore_delay_ms = 250
//!
//! [propagation]
//! max_depth = 64
//!
//! [accessory]
//! manufacturer = "Toggle"
//!
//! [[switch]]
//! name = "Evening"
//! depends_on = ["Porch", "Hall"]
//! ```

use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs};

use serde::Deserialize;
use thiserror::Error;
use toggle_types::{AccessoryInfo, SwitchConfig};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "TOGGLE_CONFIG";

const DEFAULT_DELAY_MS: u64 = 250;
const DEFAULT_MAX_DEPTH: usize = 64;

const fn default_delay_ms() -> u64 {
    DEFAULT_DELAY_MS
}

const fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

#[derive(Debug, Default, Deserialize)]
pub struct ToggleConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub propagation: PropagationConfig,
    /// Information block announced for every switch.
    #[serde(default)]
    pub accessory: AccessoryInfo,
    /// Switches in registration order.
    #[serde(default, rename = "switch")]
    pub switches: Vec<SwitchConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn path(&self) -> &PathBuf {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one record per switch. `${VAR}` references are expanded.
    pub dir: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TimingConfig {
    /// Delay before a stale re-assertion is bounced back to the host.
    #[serde(default = "default_delay_ms")]
    pub bounce_delay_ms: u64,
    /// Delay before a persisted ON state is pushed to a freshly built switch.
    #[serde(default = "default_delay_ms")]
    pub restore_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            bounce_delay_ms: DEFAULT_DELAY_MS,
            restore_delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub fn bounce_delay(&self) -> Duration {
        Duration::from_millis(self.bounce_delay_ms)
    }

    #[must_use]
    pub fn restore_delay(&self) -> Duration {
        Duration::from_millis(self.restore_delay_ms)
    }
}

#[derive(Debug, Deserialize)]
pub struct PropagationConfig {
    /// Longest chain of cascaded updates before the cascade is aborted.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) if end > 0 => {
                out.push_str(&env::var(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            Some(_) => {
                out.push_str("${}");
                rest = &after[1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

impl ToggleConfig {
    /// Load from [`config_path`]. A missing file is not an error.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(path).map(Some)
    }

    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {}: {err}", path.display());
                return Err(ConfigError::Read { path, source: err });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {}: {err}", path.display());
                Err(ConfigError::Parse { path, source: err })
            }
        }
    }

    /// Resolved store directory.
    ///
    /// Explicit `[storage] dir` wins, then the platform data dir, then
    /// `./.toggle/persist`.
    #[must_use]
    pub fn storage_dir(&self) -> PathBuf {
        if let Some(dir) = self.storage.dir.as_deref() {
            return PathBuf::from(expand_env_vars(dir));
        }
        dirs::data_dir()
            .map(|data| data.join("toggle").join("persist"))
            .unwrap_or_else(|| PathBuf::from(".toggle").join("persist"))
    }
}

/// `$TOGGLE_CONFIG`, else `<config_dir>/toggle/toggle.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var(CONFIG_ENV)
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("toggle").join("toggle.toml"))
}
