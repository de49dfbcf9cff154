//! # Viewer Configuration
//!
//! Loaded once at startup from `volviewer.toml`. Every field has a default,
//! so a missing file or a partial file is fine.
//!
//! ```toml
//! arena_size = 67108864
//! dispatch_timeout_ms = 0
//! frame_rate = 60
//!
//! [watch]
//! backend = "poll"
//! poll_interval_ms = 250
//!
//! [[shaders]]
//! path = "shaders/render_model.frag.glsl"
//! header = "#version 460 core\n#line 1\n"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

/// Errors from loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// The config file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for [`ViewerConfig`].
    #[error("invalid config {}: {source}", .path.display())]
    Parse {
        /// The config file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range.
    #[error("invalid config value: {0}")]
    Invalid(&'static str),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// How file changes are detected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// OS change notifications.
    #[default]
    Native,
    /// Modification-time polling.
    Poll,
}

/// File watch settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Detection mechanism.
    pub backend: WatchMode,
    /// Rescan period for [`WatchMode::Poll`].
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            backend: WatchMode::Native,
            poll_interval_ms: 250,
        }
    }
}

impl WatchConfig {
    /// Rescan period as a duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// A shader source kept current by hot reload.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ShaderConfig {
    /// Path of the source file.
    pub path: String,
    /// Text prepended to the file's contents.
    #[serde(default)]
    pub header: String,
}

/// Top-level viewer configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    /// Bytes reserved for the process arena.
    pub arena_size: usize,
    /// How long each frame may wait for file events.
    pub dispatch_timeout_ms: u64,
    /// Target frames per second.
    pub frame_rate: u32,
    /// Stop after this many frames; run forever if absent.
    pub frame_limit: Option<u64>,
    /// File watch settings.
    pub watch: WatchConfig,
    /// Hot-reloaded shader sources.
    pub shaders: Vec<ShaderConfig>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            arena_size: 64 * 1024 * 1024,
            dispatch_timeout_ms: 0,
            frame_rate: 60,
            frame_limit: None,
            watch: WatchConfig::default(),
            shaders: Vec::new(),
        }
    }
}

impl ViewerConfig {
    /// Loads configuration from `path`, falling back to defaults if the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, does not parse, or
    /// holds out-of-range values.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.arena_size == 0 {
            return Err(ConfigError::Invalid("arena_size must be positive"));
        }
        if self.frame_rate == 0 {
            return Err(ConfigError::Invalid("frame_rate must be positive"));
        }
        if self.watch.backend == WatchMode::Poll && self.watch.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive"));
        }
        Ok(())
    }

    /// Per-frame wait for file events.
    #[must_use]
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    /// Time budget of one frame.
    #[must_use]
    pub fn frame_budget(&self) -> Duration {
        Duration::from_secs(1) / self.frame_rate.max(1)
    }
}
