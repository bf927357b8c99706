//! Registry configuration, service options and reported state.

use std::fmt;

use serde::Serialize;

use crate::error::{RegistryError, Result};
use crate::{DEFAULT_HOST, REGISTRY_CONTAINER_PORT};

/// Everything the manager needs to provision one registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Container name; also the value of the registry label.
    pub name: String,
    /// Host port bound to the registry port.
    pub port: u16,
    /// Host address the port binds to.
    pub host: String,
    /// Upstream URL; set for pull-through mirrors.
    pub upstream_url: Option<String>,
    /// Cluster that asked for the registry.
    pub cluster_name: Option<String>,
    /// Network to connect right after the container starts.
    pub network_name: Option<String>,
    /// Volume holding the registry data; defaults to the registry name.
    pub volume_name: Option<String>,
}

impl RegistryConfig {
    pub fn new(name: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            port,
            host: DEFAULT_HOST.to_string(),
            upstream_url: None,
            cluster_name: None,
            network_name: None,
            volume_name: None,
        }
    }

    pub fn with_upstream(mut self, upstream: impl Into<String>) -> Self {
        self.upstream_url = Some(upstream.into());
        self
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster_name = Some(cluster.into());
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network_name = Some(network.into());
        self
    }

    pub fn volume(&self) -> &str {
        self.volume_name.as_deref().unwrap_or(&self.name)
    }

    pub fn validate(&self) -> Result<()> {
        ksail_core::validation::validate_resource_name("registry", &self.name)?;
        ksail_core::validation::validate_port(self.port)?;
        if self.host.trim().is_empty() {
            return Err(RegistryError::InvalidConfig(format!(
                "registry '{}' has an empty host",
                self.name
            )));
        }
        if let Some(volume) = &self.volume_name {
            ksail_core::validation::validate_resource_name("volume", volume)?;
        }
        if let Some(url) = &self.upstream_url {
            ksail_core::validation::validate_upstream_url(url)?;
        }
        Ok(())
    }
}

/// Result of `RegistryManager::create_registry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// `volume_created` is false when an existing volume was reused.
    Created { volume_created: bool },
    AlreadyExists,
}

impl CreateOutcome {
    pub fn is_created(self) -> bool {
        matches!(self, CreateOutcome::Created { .. })
    }
}

/// Result of stopping a registry on behalf of a cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Container (and volume, if requested) removed.
    Removed,
    /// Another cluster network is still attached; the registry was kept.
    StillInUse,
    /// Nothing to do, the registry does not exist.
    Absent,
}

/// What `docker inspect` tells us about an existing registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryDetails {
    pub name: String,
    pub container_id: String,
    pub running: bool,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub networks: Vec<String>,
    pub volume: Option<String>,
    pub upstream_url: Option<String>,
}

/// Registry status as reported to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Running,
    Stopped,
    NotProvisioned,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Running => write!(f, "running"),
            Status::Stopped => write!(f, "stopped"),
            Status::NotProvisioned => write!(f, "not provisioned"),
        }
    }
}

/// Service-level view of a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Info {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub endpoint: String,
    pub status: Status,
    pub volume: String,
    pub upstream_url: Option<String>,
    pub networks: Vec<String>,
}

impl Info {
    pub fn not_provisioned(name: &str) -> Self {
        Self {
            name: name.to_string(),
            host: String::new(),
            port: 0,
            endpoint: String::new(),
            status: Status::NotProvisioned,
            volume: String::new(),
            upstream_url: None,
            networks: Vec::new(),
        }
    }

    pub fn from_details(details: &RegistryDetails) -> Self {
        // 0.0.0.0 is not something a client can connect to
        let host = match details.host.as_deref() {
            None | Some("") | Some("0.0.0.0") | Some("::") => "localhost".to_string(),
            Some(host) => host.to_string(),
        };
        let port = details.port.unwrap_or(0);
        let endpoint = if port == 0 {
            String::new()
        } else {
            format!("{}:{}", host, port)
        };

        Self {
            name: details.name.clone(),
            host,
            port,
            endpoint,
            status: if details.running {
                Status::Running
            } else {
                Status::Stopped
            },
            volume: details
                .volume
                .clone()
                .unwrap_or_else(|| details.name.clone()),
            upstream_url: details.upstream_url.clone(),
            networks: details.networks.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    pub name: String,
    pub host: Option<String>,
    pub port: u16,
    pub volume_name: Option<String>,
    pub upstream_url: Option<String>,
    pub cluster_name: Option<String>,
}

impl CreateOptions {
    pub fn to_config(&self) -> RegistryConfig {
        RegistryConfig {
            name: self.name.clone(),
            port: self.port,
            host: self
                .host
                .clone()
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            upstream_url: self.upstream_url.clone(),
            cluster_name: self.cluster_name.clone(),
            network_name: None,
            volume_name: self.volume_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub name: String,
    pub network_name: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct StopOptions {
    pub name: String,
    pub cluster_name: Option<String>,
    pub network_name: Option<String>,
    pub delete_volume: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StatusOptions {
    pub name: String,
}

/// A mirror as cluster nodes see it: requests for `host` go to
/// `http://<container_name>:<container_port>` on the cluster network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorEndpoint {
    pub host: String,
    pub upstream: String,
    pub container_name: String,
    pub container_port: u16,
}

impl MirrorEndpoint {
    pub fn new(
        host: impl Into<String>,
        upstream: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            upstream: upstream.into(),
            container_name: container_name.into(),
            container_port: REGISTRY_CONTAINER_PORT,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}:{}", self.container_name, self.container_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validation() {
        assert!(RegistryConfig::new("local-registry", 5000).validate().is_ok());
        assert!(RegistryConfig::new("", 5000).validate().is_err());
        assert!(RegistryConfig::new("local-registry", 0).validate().is_err());
        assert!(RegistryConfig::new("m", 5001)
            .with_upstream("registry-1.docker.io")
            .validate()
            .is_err());

        let mut config = RegistryConfig::new("m", 5001);
        config.host = " ".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn volume_defaults_to_name() {
        let mut config = RegistryConfig::new("kind-docker-io", 5001);
        assert_eq!(config.volume(), "kind-docker-io");
        config.volume_name = Some("cache".into());
        assert_eq!(config.volume(), "cache");
    }

    #[test]
    fn info_from_details() {
        let details = RegistryDetails {
            name: "local-registry".into(),
            container_id: "abc".into(),
            running: true,
            host: Some("0.0.0.0".into()),
            port: Some(5000),
            networks: vec!["kind".into()],
            volume: None,
            upstream_url: None,
        };
        let info = Info::from_details(&details);
        assert_eq!(info.endpoint, "localhost:5000");
        assert_eq!(info.status, Status::Running);
        assert_eq!(info.volume, "local-registry");

        let stopped = RegistryDetails {
            running: false,
            host: Some("127.0.0.1".into()),
            ..details
        };
        let info = Info::from_details(&stopped);
        assert_eq!(info.endpoint, "127.0.0.1:5000");
        assert_eq!(info.status.to_string(), "stopped");
    }

    #[test]
    fn mirror_endpoint_url() {
        let mirror = MirrorEndpoint::new("docker.io", "https://registry-1.docker.io", "kind-docker-io");
        assert_eq!(mirror.url(), "http://kind-docker-io:5000");
    }
}
