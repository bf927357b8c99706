//! Error type for registry lifecycle operations.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Docker object kinds that can be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Registry,
    Container,
    Volume,
    Image,
    Network,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Registry => "registry",
            ResourceKind::Container => "container",
            ResourceKind::Volume => "volume",
            ResourceKind::Image => "image",
            ResourceKind::Network => "network",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    /// Sentinel for a missing container, volume, image or network.
    #[error("{kind} '{name}' not found")]
    NotFound { kind: ResourceKind, name: String },

    #[error("invalid registry configuration: {0}")]
    InvalidConfig(String),

    #[error("registry '{0}' has no host port bound to the registry port")]
    MissingPort(String),

    #[error("{context}: {source}")]
    Docker {
        context: String,
        #[source]
        source: ksail_core::KsailError,
    },

    #[error("failed to decode docker output for {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to render {what}: {source}")]
    Render {
        what: String,
        #[source]
        source: tera::Error,
    },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("request to registry at {endpoint} failed: {source}")]
    Http {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("registry at {endpoint} did not become ready within {seconds}s")]
    NotReady { endpoint: String, seconds: u64 },

    #[error("failed to provision registry '{name}': {source}")]
    Batch {
        name: String,
        #[source]
        source: Box<RegistryError>,
    },
}

impl RegistryError {
    pub fn not_found(kind: ResourceKind, name: impl Into<String>) -> Self {
        RegistryError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn docker(context: impl Into<String>, source: ksail_core::KsailError) -> Self {
        RegistryError::Docker {
            context: context.into(),
            source,
        }
    }

    /// True when this error, or the error a batch failure wraps, is the
    /// not-found sentinel.
    pub fn is_not_found(&self) -> bool {
        match self {
            RegistryError::NotFound { .. } => true,
            RegistryError::Batch { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<ksail_core::KsailError> for RegistryError {
    fn from(err: ksail_core::KsailError) -> Self {
        match err {
            ksail_core::KsailError::Validation(msg) => RegistryError::InvalidConfig(msg),
            other => RegistryError::docker("docker operation failed", other),
        }
    }
}

impl From<RegistryError> for ksail_core::KsailError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Docker { source, .. }
                if matches!(
                    source,
                    ksail_core::KsailError::DockerNotRunning
                        | ksail_core::KsailError::DockerPermission
                        | ksail_core::KsailError::Dependency(_)
                ) =>
            {
                source
            }
            other => ksail_core::KsailError::Other(other.into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
