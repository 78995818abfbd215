//! Engine configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no
//! file at all) is a valid configuration.

use crate::error::{Result, ScpError};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SCPWIRE_CONFIG";

/// Default read buffer / payload chunk size (64KB)
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Default maximum directory nesting accepted or produced
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Default maximum length of a single directive line
pub const DEFAULT_MAX_LINE_LEN: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum number of open directory levels in either direction
    pub max_depth: usize,
    /// Longest directive or reply line accepted from the peer
    pub max_line_len: usize,
    /// Stream read buffer size, also the payload chunk size
    pub buffer_size: usize,
    /// Sort directory entries by name when sending
    pub sort_entries: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            buffer_size: DEFAULT_BUFFER_SIZE,
            sort_entries: true,
        }
    }
}

impl EngineConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ScpError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ScpError::filesystem(path, e))?;
        Self::from_toml(&text)
    }

    /// Resolve the config the way the remote binary does: `$SCPWIRE_CONFIG`
    /// first, then `<config_dir>/scpwire/config.toml`, then defaults.
    pub fn discover() -> Result<Self> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }
        match default_config_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(ScpError::Config("max_depth must be at least 1".into()));
        }
        // Room for a mode, a size and a name.
        if self.max_line_len < 64 {
            return Err(ScpError::Config("max_line_len must be at least 64".into()));
        }
        if self.buffer_size == 0 {
            return Err(ScpError::Config("buffer_size must be non-zero".into()));
        }
        Ok(())
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("scpwire").join("config.toml"))
}
