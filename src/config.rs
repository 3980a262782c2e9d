//! Tunable limits for the codecs, loadable from TOML.
//!
//! ```toml
//! [text]
//! component_max_len = 262143
//! # legacy_max_len = 32767
//!
//! [tag]
//! max_depth = 512
//! max_bytes = 2097152
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::tag::TagLimits;

/// Byte cap for structured values sent as text from 1.13 up to 1.20.3.
pub const DEFAULT_COMPONENT_MAX_LEN: usize = 262_143;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    pub text: TextLimits,
    pub tag: TagLimits,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TextLimits {
    pub component_max_len: usize,
    /// Cap for the pre-1.13 text band. Unset means uncapped.
    pub legacy_max_len: Option<usize>,
}

impl Default for TextLimits {
    fn default() -> Self {
        TextLimits {
            component_max_len: DEFAULT_COMPONENT_MAX_LEN,
            legacy_max_len: None,
        }
    }
}

impl CodecConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(?config, "loaded codec config");
        Ok(config)
    }
}
