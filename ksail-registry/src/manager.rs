//! Registry lifecycle on top of [`DockerClient`].
//!
//! A registry is the container, its data volume and its network
//! attachments. Containers are found by the `io.ksail.registry` label first
//! and by exact name second, so registries created by hand under the same
//! name are adopted instead of clashing.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use crate::docker::{ContainerDetails, ContainerFilter, ContainerSpec, DockerClient, PortMapping};
use crate::error::{RegistryError, ResourceKind, Result};
use crate::types::{CreateOutcome, DeleteOutcome, RegistryConfig, RegistryDetails};
use crate::{
    CLUSTER_LABEL, PROXY_REMOTE_URL_ENV, REGISTRY_CONTAINER_PORT, REGISTRY_DATA_PATH,
    REGISTRY_IMAGE, REGISTRY_LABEL, RESTART_POLICY,
};

/// Networks Docker creates on every host; attachment to them says nothing
/// about cluster usage.
const IGNORED_NETWORKS: &[&str] = &["bridge", "host", "none"];

/// Prefixes of the networks Kind and K3d create for their clusters.
const CLUSTER_NETWORK_PREFIXES: &[&str] = &["kind", "k3d"];

/// Whether an attached network marks the registry as used by a cluster.
pub fn is_cluster_network(network: &str) -> bool {
    !IGNORED_NETWORKS.contains(&network)
        && CLUSTER_NETWORK_PREFIXES
            .iter()
            .any(|prefix| network.starts_with(prefix))
}

#[derive(Clone)]
pub struct RegistryManager {
    docker: Arc<dyn DockerClient>,
}

impl RegistryManager {
    pub fn new(docker: Arc<dyn DockerClient>) -> Self {
        Self { docker }
    }

    pub fn docker(&self) -> &Arc<dyn DockerClient> {
        &self.docker
    }

    /// Create and start a registry. Calling this for a registry that already
    /// exists does nothing and returns [`CreateOutcome::AlreadyExists`].
    pub fn create_registry(&self, config: &RegistryConfig) -> Result<CreateOutcome> {
        config.validate()?;
        let _span = info_span!("create_registry", registry = %config.name).entered();

        if let Some(existing) = self.find_container(&config.name)? {
            info!(
                "Registry '{}' already exists ({}), skipping creation",
                config.name, existing
            );
            return Ok(CreateOutcome::AlreadyExists);
        }

        if !self.docker.image_exists(REGISTRY_IMAGE)? {
            info!("Pulling registry image {}", REGISTRY_IMAGE);
            self.docker.pull_image(REGISTRY_IMAGE)?;
        }

        let volume = config.volume().to_string();
        let created_volume = if self.docker.volume_exists(&volume)? {
            debug!("Reusing volume '{}'", volume);
            false
        } else {
            self.docker.create_volume(&volume, &self.labels(config))?;
            true
        };

        let spec = self.container_spec(config);
        let id = match self.docker.create_container(&spec) {
            Ok(id) => id,
            Err(err) => {
                self.cleanup_failed_create(None, created_volume.then_some(volume.as_str()));
                return Err(err);
            }
        };

        let started = self.docker.start_container(&id).and_then(|()| {
            match &config.network_name {
                Some(network) => self.docker.connect_network(network, &config.name),
                None => Ok(()),
            }
        });
        if let Err(err) = started {
            self.cleanup_failed_create(Some(&id), created_volume.then_some(volume.as_str()));
            return Err(err);
        }

        info!(
            "Created registry '{}' on {}:{}",
            config.name, config.host, config.port
        );
        Ok(CreateOutcome::Created {
            volume_created: created_volume,
        })
    }

    fn labels(&self, config: &RegistryConfig) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        labels.insert(REGISTRY_LABEL.to_string(), config.name.clone());
        if let Some(cluster) = &config.cluster_name {
            labels.insert(CLUSTER_LABEL.to_string(), cluster.clone());
        }
        labels
    }

    fn container_spec(&self, config: &RegistryConfig) -> ContainerSpec {
        let env = config
            .upstream_url
            .iter()
            .map(|url| format!("{}={}", PROXY_REMOTE_URL_ENV, url))
            .collect();

        ContainerSpec {
            name: config.name.clone(),
            image: REGISTRY_IMAGE.to_string(),
            labels: self.labels(config),
            env,
            ports: vec![PortMapping {
                host_ip: config.host.clone(),
                host_port: config.port,
                container_port: REGISTRY_CONTAINER_PORT,
            }],
            volumes: vec![(config.volume().to_string(), REGISTRY_DATA_PATH.to_string())],
            restart_policy: Some(RESTART_POLICY.to_string()),
        }
    }

    fn cleanup_failed_create(&self, container: Option<&str>, volume: Option<&str>) {
        if let Some(id) = container {
            if let Err(e) = self.docker.remove_container(id) {
                warn!("Failed to remove container '{}' after failed create: {}", id, e);
            }
        }
        if let Some(volume) = volume {
            if let Err(e) = self.docker.remove_volume(volume) {
                warn!("Failed to remove volume '{}' after failed create: {}", volume, e);
            }
        }
    }

    /// Detach a registry from a cluster and remove it unless another
    /// cluster network still uses it.
    pub fn delete_registry(
        &self,
        name: &str,
        cluster_name: Option<&str>,
        network_name: Option<&str>,
        delete_volume: bool,
    ) -> Result<DeleteOutcome> {
        let _span = info_span!(
            "delete_registry",
            registry = %name,
            cluster = cluster_name.unwrap_or("-")
        )
        .entered();

        let id = self
            .find_container(name)?
            .ok_or_else(|| RegistryError::not_found(ResourceKind::Registry, name))?;

        if let Some(network) = network_name {
            debug!("Disconnecting '{}' from network '{}'", name, network);
            self.docker.disconnect_network(network, &id)?;
        }

        let details = self.docker.inspect_container(&id)?;
        if uses_cluster_network(&details) {
            info!(
                "Registry '{}' is still attached to {:?}, keeping it",
                name, details.networks
            );
            return Ok(DeleteOutcome::StillInUse);
        }

        self.remove_container_and_volume(&details, delete_volume)?;
        Ok(DeleteOutcome::Removed)
    }

    /// Remove a registry regardless of its network attachments.
    pub fn remove_registry(&self, name: &str, delete_volume: bool) -> Result<()> {
        let id = self
            .find_container(name)?
            .ok_or_else(|| RegistryError::not_found(ResourceKind::Registry, name))?;
        let details = self.docker.inspect_container(&id)?;
        self.remove_container_and_volume(&details, delete_volume)
    }

    fn remove_container_and_volume(
        &self,
        details: &ContainerDetails,
        delete_volume: bool,
    ) -> Result<()> {
        if details.running {
            self.docker.stop_container(&details.id)?;
        }
        self.docker.remove_container(&details.id)?;
        info!("Removed registry '{}'", details.name);

        if delete_volume {
            let volume = details
                .volume_at(REGISTRY_DATA_PATH)
                .unwrap_or(&details.name)
                .to_string();
            match self.docker.remove_volume(&volume) {
                Ok(()) => info!("Removed volume '{}'", volume),
                Err(e) if e.is_not_found() => debug!("Volume '{}' already gone", volume),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Names of all ksail-managed registries, sorted.
    pub fn list_registries(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .docker
            .list_containers(&ContainerFilter::label(REGISTRY_LABEL))?
            .into_iter()
            .map(|c| c.labels.get(REGISTRY_LABEL).cloned().unwrap_or(c.name))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    pub fn is_registry_in_use(&self, name: &str) -> Result<bool> {
        let id = self
            .find_container(name)?
            .ok_or_else(|| RegistryError::not_found(ResourceKind::Registry, name))?;
        Ok(uses_cluster_network(&self.docker.inspect_container(&id)?))
    }

    /// Host port bound to the registry's container port.
    pub fn get_registry_port(&self, name: &str) -> Result<u16> {
        self.inspect_registry(name)?
            .ok_or_else(|| RegistryError::not_found(ResourceKind::Registry, name))?
            .port
            .ok_or_else(|| RegistryError::MissingPort(name.to_string()))
    }

    pub fn inspect_registry(&self, name: &str) -> Result<Option<RegistryDetails>> {
        let Some(id) = self.find_container(name)? else {
            return Ok(None);
        };
        let details = self.docker.inspect_container(&id)?;
        let binding = details.host_binding(REGISTRY_CONTAINER_PORT);

        Ok(Some(RegistryDetails {
            name: details
                .labels
                .get(REGISTRY_LABEL)
                .cloned()
                .unwrap_or_else(|| details.name.clone()),
            container_id: details.id.clone(),
            running: details.running,
            host: binding.map(|b| b.host_ip.clone()),
            port: binding.map(|b| b.host_port),
            networks: details.networks.clone(),
            volume: details.volume_at(REGISTRY_DATA_PATH).map(str::to_string),
            upstream_url: details.env_value(PROXY_REMOTE_URL_ENV).map(str::to_string),
        }))
    }

    /// Start a stopped registry and attach it to `network_name`.
    pub fn start_registry(&self, name: &str, network_name: Option<&str>) -> Result<()> {
        let id = self
            .find_container(name)?
            .ok_or_else(|| RegistryError::not_found(ResourceKind::Registry, name))?;
        let details = self.docker.inspect_container(&id)?;
        if !details.running {
            self.docker.start_container(&id)?;
            info!("Started registry '{}'", name);
        }
        if let Some(network) = network_name {
            self.docker.connect_network(network, &id)?;
        }
        Ok(())
    }

    /// Attach an existing registry to a network.
    pub fn connect_registry(&self, name: &str, network: &str) -> Result<()> {
        let id = self
            .find_container(name)?
            .ok_or_else(|| RegistryError::not_found(ResourceKind::Registry, name))?;
        self.docker.connect_network(network, &id)
    }

    /// Container id of the registry, looked up by label, then by name.
    fn find_container(&self, name: &str) -> Result<Option<String>> {
        let labelled = self
            .docker
            .list_containers(&ContainerFilter::label_value(REGISTRY_LABEL, name))?;
        if let Some(container) = labelled.into_iter().next() {
            return Ok(Some(container.id));
        }
        let named = self.docker.list_containers(&ContainerFilter::name(name))?;
        Ok(named.into_iter().next().map(|c| c.id))
    }
}

fn uses_cluster_network(details: &ContainerDetails) -> bool {
    details.networks.iter().any(|n| is_cluster_network(n))
}
