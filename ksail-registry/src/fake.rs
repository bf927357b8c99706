//! In-memory [`DockerClient`] for tests.
//!
//! Records every call, keeps containers, volumes and networks in a map, and
//! can be told to fail a given operation on a given object.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use ksail_core::KsailError;

use crate::docker::{
    ContainerDetails, ContainerFilter, ContainerSpec, ContainerSummary, DockerClient, PortBinding,
};
use crate::error::{RegistryError, ResourceKind, Result};

#[derive(Debug, Clone)]
struct FakeContainer {
    id: String,
    name: String,
    image: String,
    running: bool,
    labels: BTreeMap<String, String>,
    env: Vec<String>,
    networks: Vec<String>,
    port_bindings: BTreeMap<String, Vec<PortBinding>>,
    volumes: Vec<(String, String)>,
}

#[derive(Debug)]
struct Failure {
    op: String,
    name: String,
    once: bool,
}

#[derive(Debug, Default)]
struct State {
    containers: Vec<FakeContainer>,
    volumes: BTreeMap<String, BTreeMap<String, String>>,
    images: BTreeSet<String>,
    networks: BTreeSet<String>,
    calls: Vec<String>,
    failures: Vec<Failure>,
    next_id: u32,
}

impl State {
    fn find(&self, id_or_name: &str) -> Option<usize> {
        self.containers
            .iter()
            .position(|c| c.id == id_or_name || c.name == id_or_name)
    }

    fn container(&mut self, id_or_name: &str) -> Result<&mut FakeContainer> {
        match self.find(id_or_name) {
            Some(index) => Ok(&mut self.containers[index]),
            None => Err(RegistryError::not_found(ResourceKind::Container, id_or_name)),
        }
    }

    /// Log the call and return the injected failure, if any.
    fn record(&mut self, op: &str, target: &str) -> Result<()> {
        self.calls.push(format!("{} {}", op, target).trim_end().to_string());
        let name = self
            .find(target)
            .map(|i| self.containers[i].name.clone())
            .unwrap_or_else(|| target.to_string());
        if let Some(index) = self
            .failures
            .iter()
            .position(|f| f.op == op && (f.name == name || f.name == target))
        {
            if self.failures[index].once {
                self.failures.remove(index);
            }
            return Err(RegistryError::docker(
                format!("{} '{}'", op, name),
                KsailError::Command(format!("injected failure: {} {}", op, name)),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct FakeDocker {
    state: Mutex<State>,
}

impl FakeDocker {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make `op` (a [`DockerClient`] method name) fail for `name`.
    pub fn fail_on(&self, op: &str, name: &str) {
        self.inject(op, name, false);
    }

    /// Like [`FakeDocker::fail_on`], but only for the next matching call.
    pub fn fail_once(&self, op: &str, name: &str) {
        self.inject(op, name, true);
    }

    fn inject(&self, op: &str, name: &str, once: bool) {
        self.state().failures.push(Failure {
            op: op.to_string(),
            name: name.to_string(),
            once,
        });
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    pub fn add_network(&self, name: &str) {
        self.state().networks.insert(name.to_string());
    }


    pub fn add_volume(&self, name: &str) {
        self.state()
            .volumes
            .insert(name.to_string(), BTreeMap::new());
    }

    /// Add a running container without going through `create_container`.
    pub fn add_container(&self, name: &str, labels: &[(&str, &str)], networks: &[&str]) {
        let mut state = self.state();
        state.next_id += 1;
        let id = format!("fake{:04}", state.next_id);
        for network in networks {
            state.networks.insert(network.to_string());
        }
        state.containers.push(FakeContainer {
            id,
            name: name.to_string(),
            image: "busybox".to_string(),
            running: true,
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            env: Vec::new(),
            networks: networks.iter().map(|n| n.to_string()).collect(),
            port_bindings: BTreeMap::new(),
            volumes: Vec::new(),
        });
    }

    pub fn add_plain_container(&self, name: &str, networks: &[&str]) {
        self.add_container(name, &[], networks);
    }

    /// Attach a container to a network, creating the network if needed.
    pub fn attach(&self, container: &str, network: &str) {
        let mut state = self.state();
        state.networks.insert(network.to_string());
        if let Some(index) = state.find(container) {
            let networks = &mut state.containers[index].networks;
            if !networks.iter().any(|n| n == network) {
                networks.push(network.to_string());
            }
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn container_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state()
            .containers
            .iter()
            .map(|c| c.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn volume_names(&self) -> Vec<String> {
        self.state().volumes.keys().cloned().collect()
    }

    pub fn is_running(&self, name: &str) -> bool {
        let state = self.state();
        state
            .find(name)
            .map(|i| state.containers[i].running)
            .unwrap_or(false)
    }

    pub fn networks_of(&self, name: &str) -> Vec<String> {
        let state = self.state();
        state
            .find(name)
            .map(|i| state.containers[i].networks.clone())
            .unwrap_or_default()
    }
}

impl DockerClient for FakeDocker {
    fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>> {
        let mut state = self.state();
        state.record("list_containers", "")?;
        Ok(state
            .containers
            .iter()
            .filter(|c| filter.matches(&c.name, &c.labels))
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
                image: c.image.clone(),
                state: if c.running { "running" } else { "exited" }.to_string(),
                labels: c.labels.clone(),
            })
            .collect())
    }

    fn inspect_container(&self, id_or_name: &str) -> Result<ContainerDetails> {
        let mut state = self.state();
        state.record("inspect_container", id_or_name)?;
        let c = state.container(id_or_name)?;
        Ok(ContainerDetails {
            id: c.id.clone(),
            name: c.name.clone(),
            image: c.image.clone(),
            running: c.running,
            labels: c.labels.clone(),
            env: c.env.clone(),
            networks: c.networks.clone(),
            port_bindings: c.port_bindings.clone(),
            volume_mounts: c.volumes.clone(),
        })
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let mut state = self.state();
        state.record("create_container", &spec.name)?;
        if state.find(&spec.name).is_some() {
            return Err(RegistryError::docker(
                format!("create container '{}'", spec.name),
                KsailError::Command(format!("name '{}' is already in use", spec.name)),
            ));
        }
        if !state.images.contains(&spec.image) {
            return Err(RegistryError::not_found(ResourceKind::Image, &spec.image));
        }
        let taken = state.containers.iter().any(|c| {
            c.port_bindings
                .values()
                .flatten()
                .any(|b| spec.ports.iter().any(|p| p.host_port == b.host_port))
        });
        if taken {
            return Err(RegistryError::docker(
                format!("create container '{}'", spec.name),
                KsailError::Command("port is already allocated".to_string()),
            ));
        }
        for (volume, _) in &spec.volumes {
            state.volumes.entry(volume.clone()).or_default();
        }

        state.next_id += 1;
        let id = format!("fake{:04}", state.next_id);
        let mut port_bindings: BTreeMap<String, Vec<PortBinding>> = BTreeMap::new();
        for port in &spec.ports {
            port_bindings
                .entry(format!("{}/tcp", port.container_port))
                .or_default()
                .push(PortBinding {
                    host_ip: port.host_ip.clone(),
                    host_port: port.host_port,
                });
        }
        state.containers.push(FakeContainer {
            id: id.clone(),
            name: spec.name.clone(),
            image: spec.image.clone(),
            running: false,
            labels: spec.labels.clone(),
            env: spec.env.clone(),
            networks: Vec::new(),
            port_bindings,
            volumes: spec.volumes.clone(),
        });
        Ok(id)
    }

    fn start_container(&self, id_or_name: &str) -> Result<()> {
        let mut state = self.state();
        state.record("start_container", id_or_name)?;
        let c = state.container(id_or_name)?;
        c.running = true;
        if c.networks.is_empty() {
            c.networks.push("bridge".to_string());
        }
        Ok(())
    }

    fn stop_container(&self, id_or_name: &str) -> Result<()> {
        let mut state = self.state();
        state.record("stop_container", id_or_name)?;
        state.container(id_or_name)?.running = false;
        Ok(())
    }

    fn remove_container(&self, id_or_name: &str) -> Result<()> {
        let mut state = self.state();
        state.record("remove_container", id_or_name)?;
        match state.find(id_or_name) {
            Some(index) => {
                state.containers.remove(index);
                Ok(())
            }
            None => Err(RegistryError::not_found(ResourceKind::Container, id_or_name)),
        }
    }

    fn image_exists(&self, image: &str) -> Result<bool> {
        let mut state = self.state();
        state.record("image_exists", image)?;
        Ok(state.images.contains(image))
    }

    fn pull_image(&self, image: &str) -> Result<()> {
        let mut state = self.state();
        state.record("pull_image", image)?;
        state.images.insert(image.to_string());
        Ok(())
    }

    fn volume_exists(&self, name: &str) -> Result<bool> {
        let mut state = self.state();
        state.record("volume_exists", name)?;
        Ok(state.volumes.contains_key(name))
    }

    fn create_volume(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<()> {
        let mut state = self.state();
        state.record("create_volume", name)?;
        state.volumes.insert(name.to_string(), labels.clone());
        Ok(())
    }

    fn remove_volume(&self, name: &str) -> Result<()> {
        let mut state = self.state();
        state.record("remove_volume", name)?;
        if !state.volumes.contains_key(name) {
            return Err(RegistryError::not_found(ResourceKind::Volume, name));
        }
        if state
            .containers
            .iter()
            .any(|c| c.volumes.iter().any(|(v, _)| v == name))
        {
            return Err(RegistryError::docker(
                format!("remove volume '{}'", name),
                KsailError::Command("volume is in use".to_string()),
            ));
        }
        state.volumes.remove(name);
        Ok(())
    }

    fn connect_network(&self, network: &str, container: &str) -> Result<()> {
        let mut state = self.state();
        state.record("connect_network", container)?;
        if !state.networks.contains(network) {
            return Err(RegistryError::not_found(ResourceKind::Network, network));
        }
        let c = state.container(container)?;
        if !c.networks.iter().any(|n| n == network) {
            c.networks.push(network.to_string());
        }
        Ok(())
    }

    fn disconnect_network(&self, network: &str, container: &str) -> Result<()> {
        let mut state = self.state();
        state.record("disconnect_network", container)?;
        state
            .container(container)?
            .networks
            .retain(|n| n != network);
        Ok(())
    }
}
