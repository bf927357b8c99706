//! Cluster provisioners for the Kubernetes distributions ksail drives, and
//! the lifecycle that provisions registries alongside clusters.
//!
//! Each distribution is driven through its own CLI (`kind`, `k3d`); the
//! [`ClusterProvisioner`] trait hides the differences from the lifecycle.

use std::path::PathBuf;
use std::sync::Arc;

use ksail_config::Distribution;
use ksail_registry::DockerClient;

pub mod error;
pub mod k3d;
pub mod kind;
pub mod lifecycle;

#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;

pub use error::{ProvisionerError, Result};
pub use k3d::K3dProvisioner;
pub use kind::KindProvisioner;
pub use lifecycle::{ClusterLifecycle, RegistryPlan};

/// Extra inputs for cluster creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateClusterOptions {
    /// Distribution config file (Kind `Cluster` / K3d `Simple`).
    pub config_path: Option<PathBuf>,
    /// K3d `registries.yaml`; ignored by Kind, which reads mirrors from the
    /// containerd config in its cluster config.
    pub registry_config: Option<PathBuf>,
}

/// Lifecycle of local clusters of one distribution.
pub trait ClusterProvisioner: Send + Sync {
    fn distribution(&self) -> Distribution;

    fn create(&self, name: &str, options: &CreateClusterOptions) -> Result<()>;

    fn delete(&self, name: &str) -> Result<()>;

    fn start(&self, name: &str) -> Result<()>;

    fn stop(&self, name: &str) -> Result<()>;

    /// Names of existing clusters, sorted.
    fn list(&self) -> Result<Vec<String>>;

    fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.list()?.iter().any(|cluster| cluster == name))
    }

    /// Docker network the cluster's nodes are attached to.
    fn network_name(&self, name: &str) -> String {
        self.distribution().network_name(name)
    }
}

/// Provisioner for `distribution`, using `docker` where the distribution's
/// own CLI has no matching command.
pub fn get_provisioner(
    distribution: Distribution,
    docker: Arc<dyn DockerClient>,
) -> Box<dyn ClusterProvisioner> {
    match distribution {
        Distribution::Kind => Box::new(KindProvisioner::new(docker)),
        Distribution::K3d => Box::new(K3dProvisioner::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ksail_registry::FakeDocker;

    #[test]
    fn provisioner_matches_distribution() {
        let docker: Arc<dyn DockerClient> = Arc::new(FakeDocker::new());
        for distribution in [Distribution::Kind, Distribution::K3d] {
            let provisioner = get_provisioner(distribution, docker.clone());
            assert_eq!(provisioner.distribution(), distribution);
        }
    }

    #[test]
    fn network_names() {
        let docker: Arc<dyn DockerClient> = Arc::new(FakeDocker::new());
        assert_eq!(
            get_provisioner(Distribution::Kind, docker.clone()).network_name("dev"),
            "kind"
        );
        assert_eq!(
            get_provisioner(Distribution::K3d, docker).network_name("dev"),
            "k3d-dev"
        );
    }
}
