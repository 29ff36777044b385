use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum nesting depth followed while encoding a parameter
    pub max_depth: usize,
    /// Treat every sequence as unordered (useful for `HashSet` parameters)
    pub canonical_seqs: bool,
    /// Number of entries the memo table is pre-sized for
    pub initial_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            canonical_seqs: false,
            initial_capacity: 0,
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Overlays the `VALMEMO_*` variables found by `lookup` on the defaults.
    /// Values that fail to parse or validate are ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(val) = lookup("VALMEMO_MAX_DEPTH") {
            config.max_depth = val
                .trim()
                .parse()
                .ok()
                .filter(|&depth| depth > 0)
                .unwrap_or(DEFAULT_MAX_DEPTH);
        }
        if let Some(val) = lookup("VALMEMO_CANONICAL_SEQS") {
            config.canonical_seqs = val.trim().parse().unwrap_or(false);
        }
        if let Some(val) = lookup("VALMEMO_INITIAL_CAPACITY") {
            config.initial_capacity = val.trim().parse().unwrap_or(0);
        }
        config
    }

    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::InvalidValue {
                name: "max_depth",
                value: self.max_depth.to_string(),
            });
        }
        Ok(())
    }

    /// Replaces values rejected by [`validate`](Self::validate) with their
    /// defaults.
    pub fn sanitized(mut self) -> Self {
        if self.max_depth == 0 {
            self.max_depth = DEFAULT_MAX_DEPTH;
        }
        self
    }

    pub fn key_config(&self) -> KeyConfig {
        KeyConfig {
            max_depth: self.max_depth,
            canonical_seqs: self.canonical_seqs,
        }
    }
}

/// Settings consumed by the key deriver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyConfig {
    pub max_depth: usize,
    pub canonical_seqs: bool,
}

impl Default for KeyConfig {
    fn default() -> Self {
        CacheConfig::default().key_config()
    }
}
