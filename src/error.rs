use std::fmt::Display;

use thiserror::Error;

/// Failure to turn a parameter value into a cache key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("parameter exceeds the maximum nesting depth of {limit} (cyclic value graph?)")]
    DepthExceeded { limit: usize },
    #[error("parameter cannot be serialized: {0}")]
    Custom(String),
}

impl serde::ser::Error for KeyError {
    fn custom<T: Display>(msg: T) -> Self {
        KeyError::Custom(msg.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for {name}")]
    InvalidValue { name: &'static str, value: String },
    #[cfg(feature = "toml-config")]
    #[error("failed to parse cache configuration: {0}")]
    Toml(#[from] toml::de::Error),
}
