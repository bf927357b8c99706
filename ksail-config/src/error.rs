use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_yaml_ng::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("invalid mirror registry '{spec}': {reason}")]
    InvalidMirror { spec: String, reason: String },
}

impl From<ConfigError> for ksail_core::KsailError {
    fn from(err: ConfigError) -> Self {
        ksail_core::KsailError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
