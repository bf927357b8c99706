//! Errors raised while provisioning clusters.

use thiserror::Error;

use ksail_config::ConfigError;
use ksail_core::KsailError;
use ksail_registry::RegistryError;

#[derive(Error, Debug)]
pub enum ProvisionerError {
    #[error("{tool} failed: {source}")]
    Tool {
        tool: &'static str,
        #[source]
        source: KsailError,
    },

    #[error("cluster '{0}' already exists")]
    ClusterExists(String),

    #[error("cluster '{0}' not found")]
    ClusterNotFound(String),

    #[error("failed to decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, ProvisionerError>;

impl ProvisionerError {
    pub fn tool(tool: &'static str, source: KsailError) -> Self {
        ProvisionerError::Tool { tool, source }
    }
}

impl From<ProvisionerError> for KsailError {
    fn from(err: ProvisionerError) -> Self {
        match err {
            ProvisionerError::Tool {
                source: source @ (KsailError::Dependency(_)
                | KsailError::DockerNotRunning
                | KsailError::DockerPermission),
                ..
            } => source,
            ProvisionerError::Registry(e) => e.into(),
            ProvisionerError::Config(e) => e.into(),
            other => KsailError::Other(other.into()),
        }
    }
}
