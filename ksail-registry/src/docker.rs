//! The Docker operations registry management needs.
//!
//! Implementations: [`crate::DockerCli`] drives the `docker` binary, and the
//! in-memory `FakeDocker` backs the tests.

use std::collections::BTreeMap;

use crate::error::Result;

/// Selects containers, stopped ones included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerFilter {
    /// `(key, None)` matches any value, `(key, Some(v))` only `v`.
    pub labels: Vec<(String, Option<String>)>,
    /// Exact container name.
    pub name: Option<String>,
}

impl ContainerFilter {
    pub fn label(key: impl Into<String>) -> Self {
        Self {
            labels: vec![(key.into(), None)],
            name: None,
        }
    }

    pub fn label_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            labels: vec![(key.into(), Some(value.into()))],
            name: None,
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            labels: Vec::new(),
            name: Some(name.into()),
        }
    }

    /// Whether a container with these labels and name passes the filter.
    pub fn matches(&self, name: &str, labels: &BTreeMap<String, String>) -> bool {
        if let Some(wanted) = &self.name {
            if wanted != name {
                return false;
            }
        }
        self.labels.iter().all(|(key, value)| match value {
            Some(value) => labels.get(key) == Some(value),
            None => labels.contains_key(key),
        })
    }
}

/// One row of a container listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub labels: BTreeMap<String, String>,
}

impl ContainerSummary {
    pub fn is_running(&self) -> bool {
        self.state == "running"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub host_ip: String,
    pub host_port: u16,
}

/// The parts of `docker container inspect` ksail reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDetails {
    pub id: String,
    pub name: String,
    pub image: String,
    pub running: bool,
    pub labels: BTreeMap<String, String>,
    pub env: Vec<String>,
    /// Attached network names.
    pub networks: Vec<String>,
    /// Keyed by container port, e.g. `5000/tcp`.
    pub port_bindings: BTreeMap<String, Vec<PortBinding>>,
    /// Named volume mounts as `(volume, destination)`.
    pub volume_mounts: Vec<(String, String)>,
}

impl ContainerDetails {
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env.iter().find_map(|entry| {
            entry
                .split_once('=')
                .filter(|(k, _)| *k == key)
                .map(|(_, v)| v)
        })
    }

    pub fn host_binding(&self, container_port: u16) -> Option<&PortBinding> {
        self.port_bindings
            .get(&format!("{}/tcp", container_port))
            .and_then(|bindings| bindings.first())
    }

    pub fn volume_at(&self, destination: &str) -> Option<&str> {
        self.volume_mounts
            .iter()
            .find(|(_, dest)| dest == destination)
            .map(|(volume, _)| volume.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host_ip: String,
    pub host_port: u16,
    pub container_port: u16,
}

/// Parameters for creating a container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub labels: BTreeMap<String, String>,
    pub env: Vec<String>,
    pub ports: Vec<PortMapping>,
    /// `(volume, destination)` pairs.
    pub volumes: Vec<(String, String)>,
    pub restart_policy: Option<String>,
}

/// Docker Engine operations used by the registry manager.
///
/// A missing object is reported as `RegistryError::NotFound`. Connecting a
/// container to a network it is already on, or disconnecting it from one it
/// is not on, succeeds without doing anything.
pub trait DockerClient: Send + Sync {
    fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>>;
    fn inspect_container(&self, id_or_name: &str) -> Result<ContainerDetails>;
    /// Returns the new container's id.
    fn create_container(&self, spec: &ContainerSpec) -> Result<String>;
    fn start_container(&self, id_or_name: &str) -> Result<()>;
    fn stop_container(&self, id_or_name: &str) -> Result<()>;
    /// Force-removes the container.
    fn remove_container(&self, id_or_name: &str) -> Result<()>;

    fn image_exists(&self, image: &str) -> Result<bool>;
    fn pull_image(&self, image: &str) -> Result<()>;

    fn volume_exists(&self, name: &str) -> Result<bool>;
    fn create_volume(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<()>;
    fn remove_volume(&self, name: &str) -> Result<()>;

    fn connect_network(&self, network: &str, container: &str) -> Result<()>;
    fn disconnect_network(&self, network: &str, container: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn filter_matching() {
        let l = labels(&[("io.ksail.registry", "mirror")]);
        assert!(ContainerFilter::label("io.ksail.registry").matches("x", &l));
        assert!(ContainerFilter::label_value("io.ksail.registry", "mirror").matches("x", &l));
        assert!(!ContainerFilter::label_value("io.ksail.registry", "other").matches("x", &l));
        assert!(ContainerFilter::name("x").matches("x", &BTreeMap::new()));
        assert!(!ContainerFilter::name("x").matches("xy", &BTreeMap::new()));
    }

    #[test]
    fn details_helpers() {
        let mut bindings = BTreeMap::new();
        bindings.insert(
            "5000/tcp".to_string(),
            vec![PortBinding {
                host_ip: "127.0.0.1".into(),
                host_port: 5001,
            }],
        );
        let details = ContainerDetails {
            id: "id".into(),
            name: "kind-docker-io".into(),
            image: "registry:3".into(),
            running: true,
            labels: BTreeMap::new(),
            env: vec![
                "PATH=/usr/bin".into(),
                "REGISTRY_PROXY_REMOTEURL=https://registry-1.docker.io".into(),
            ],
            networks: vec![],
            port_bindings: bindings,
            volume_mounts: vec![("kind-docker-io".into(), "/var/lib/registry".into())],
        };
        assert_eq!(
            details.env_value("REGISTRY_PROXY_REMOTEURL"),
            Some("https://registry-1.docker.io")
        );
        assert_eq!(details.env_value("MISSING"), None);
        assert_eq!(details.host_binding(5000).map(|b| b.host_port), Some(5001));
        assert!(details.host_binding(80).is_none());
        assert_eq!(details.volume_at("/var/lib/registry"), Some("kind-docker-io"));
    }
}
