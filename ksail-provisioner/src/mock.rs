//! Recording provisioner for tests; no external tools involved.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

use ksail_config::Distribution;
use ksail_core::KsailError;
use ksail_registry::FakeDocker;

use crate::error::{ProvisionerError, Result};
use crate::{ClusterProvisioner, CreateClusterOptions};

#[derive(Debug, Default)]
struct MockState {
    clusters: BTreeSet<String>,
    calls: Vec<String>,
    failing: BTreeSet<String>,
    last_create: Option<CreateClusterOptions>,
}

pub struct MockProvisioner {
    distribution: Distribution,
    docker: Option<Arc<FakeDocker>>,
    state: Mutex<MockState>,
}

impl MockProvisioner {
    pub fn new(distribution: Distribution) -> Self {
        Self {
            distribution,
            docker: None,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Create the cluster network in `docker` whenever a cluster is created.
    pub fn with_docker(mut self, docker: Arc<FakeDocker>) -> Self {
        self.docker = Some(docker);
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_cluster(&self, name: &str) {
        self.state().clusters.insert(name.to_string());
        if let Some(docker) = &self.docker {
            docker.add_network(&self.network_name(name));
        }
    }

    /// Make `op` (`create`, `delete`, `start`, `stop`, `list`) fail.
    pub fn fail_on(&self, op: &str) {
        self.state().failing.insert(op.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn clusters(&self) -> Vec<String> {
        self.state().clusters.iter().cloned().collect()
    }

    pub fn last_create_options(&self) -> Option<CreateClusterOptions> {
        self.state().last_create.clone()
    }

    fn record(&self, op: &str, name: &str) -> Result<()> {
        let mut state = self.state();
        state.calls.push(format!("{} {}", op, name).trim_end().to_string());
        if state.failing.contains(op) {
            return Err(ProvisionerError::tool(
                self.distribution.binary(),
                KsailError::Command(format!("injected failure: {} {}", op, name)),
            ));
        }
        Ok(())
    }

    fn require(&self, name: &str) -> Result<()> {
        if self.state().clusters.contains(name) {
            Ok(())
        } else {
            Err(ProvisionerError::ClusterNotFound(name.to_string()))
        }
    }
}

impl ClusterProvisioner for MockProvisioner {
    fn distribution(&self) -> Distribution {
        self.distribution
    }

    fn create(&self, name: &str, options: &CreateClusterOptions) -> Result<()> {
        self.record("create", name)?;
        if self.state().clusters.contains(name) {
            return Err(ProvisionerError::ClusterExists(name.to_string()));
        }
        self.state().last_create = Some(options.clone());
        self.add_cluster(name);
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        self.record("delete", name)?;
        self.require(name)?;
        self.state().clusters.remove(name);
        Ok(())
    }

    fn start(&self, name: &str) -> Result<()> {
        self.record("start", name)?;
        self.require(name)
    }

    fn stop(&self, name: &str) -> Result<()> {
        self.record("stop", name)?;
        self.require(name)
    }

    fn list(&self) -> Result<Vec<String>> {
        self.record("list", "")?;
        Ok(self.clusters())
    }
}
