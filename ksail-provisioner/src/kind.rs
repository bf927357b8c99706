//! Kind clusters via the `kind` CLI.
//!
//! Kind has no start/stop commands; its node containers carry the
//! `io.x-k8s.kind.cluster` label and are started and stopped through Docker.

use std::sync::Arc;

use tracing::{debug, info};

use ksail_config::Distribution;
use ksail_core::command::{run_tool_checked, stream_tool};
use ksail_registry::docker::ContainerFilter;
use ksail_registry::DockerClient;

use crate::error::{ProvisionerError, Result};
use crate::{ClusterProvisioner, CreateClusterOptions};

const KIND: &str = "kind";

/// Label kind puts on every node container.
pub const KIND_CLUSTER_LABEL: &str = "io.x-k8s.kind.cluster";

pub struct KindProvisioner {
    docker: Arc<dyn DockerClient>,
}

impl KindProvisioner {
    pub fn new(docker: Arc<dyn DockerClient>) -> Self {
        Self { docker }
    }

    fn node_containers(&self, name: &str) -> Result<Vec<String>> {
        let nodes = self
            .docker
            .list_containers(&ContainerFilter::label_value(KIND_CLUSTER_LABEL, name))?;
        if nodes.is_empty() {
            return Err(ProvisionerError::ClusterNotFound(name.to_string()));
        }
        Ok(nodes.into_iter().map(|node| node.name).collect())
    }
}

pub(crate) fn create_args(name: &str, options: &CreateClusterOptions) -> Vec<String> {
    let mut args = vec![
        "create".to_string(),
        "cluster".to_string(),
        "--name".to_string(),
        name.to_string(),
    ];
    if let Some(config) = &options.config_path {
        args.push("--config".to_string());
        args.push(config.display().to_string());
    }
    args
}

pub(crate) fn delete_args(name: &str) -> Vec<String> {
    vec![
        "delete".to_string(),
        "cluster".to_string(),
        "--name".to_string(),
        name.to_string(),
    ]
}

/// `kind get clusters` prints one name per line, and nothing (with a note
/// on stderr) when there are none.
pub(crate) fn parse_clusters(stdout: &str) -> Vec<String> {
    let mut clusters: Vec<String> = stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("No kind clusters"))
        .map(str::to_string)
        .collect();
    clusters.sort();
    clusters
}

impl ClusterProvisioner for KindProvisioner {
    fn distribution(&self) -> Distribution {
        Distribution::Kind
    }

    fn create(&self, name: &str, options: &CreateClusterOptions) -> Result<()> {
        if self.exists(name)? {
            return Err(ProvisionerError::ClusterExists(name.to_string()));
        }
        stream_tool(KIND, &create_args(name, options))
            .map_err(|e| ProvisionerError::tool(KIND, e))?;
        info!("Created Kind cluster '{}'", name);
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        if !self.exists(name)? {
            return Err(ProvisionerError::ClusterNotFound(name.to_string()));
        }
        stream_tool(KIND, &delete_args(name)).map_err(|e| ProvisionerError::tool(KIND, e))?;
        info!("Deleted Kind cluster '{}'", name);
        Ok(())
    }

    fn start(&self, name: &str) -> Result<()> {
        for node in self.node_containers(name)? {
            debug!("Starting node '{}'", node);
            self.docker.start_container(&node)?;
        }
        Ok(())
    }

    fn stop(&self, name: &str) -> Result<()> {
        for node in self.node_containers(name)? {
            debug!("Stopping node '{}'", node);
            self.docker.stop_container(&node)?;
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>> {
        let stdout = run_tool_checked(KIND, &["get", "clusters"])
            .map_err(|e| ProvisionerError::tool(KIND, e))?;
        Ok(parse_clusters(&stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ksail_registry::FakeDocker;
    use std::path::PathBuf;

    #[test]
    fn create_arguments() {
        assert_eq!(
            create_args("dev", &CreateClusterOptions::default()),
            vec!["create", "cluster", "--name", "dev"]
        );
        let options = CreateClusterOptions {
            config_path: Some(PathBuf::from("/work/kind.yaml")),
            registry_config: Some(PathBuf::from("/work/registries.yaml")),
        };
        assert_eq!(
            create_args("dev", &options),
            vec!["create", "cluster", "--name", "dev", "--config", "/work/kind.yaml"]
        );
    }

    #[test]
    fn delete_arguments() {
        assert_eq!(delete_args("dev"), vec!["delete", "cluster", "--name", "dev"]);
    }

    #[test]
    fn parses_cluster_list() {
        assert_eq!(parse_clusters("prod\ndev\n"), vec!["dev", "prod"]);
        assert!(parse_clusters("").is_empty());
        assert!(parse_clusters("No kind clusters found.\n").is_empty());
    }

    #[test]
    fn start_and_stop_drive_node_containers() {
        let docker = Arc::new(FakeDocker::new());
        docker.add_container("dev-control-plane", &[(KIND_CLUSTER_LABEL, "dev")], &["kind"]);
        docker.add_container("dev-worker", &[(KIND_CLUSTER_LABEL, "dev")], &["kind"]);
        docker.add_container("other-control-plane", &[(KIND_CLUSTER_LABEL, "other")], &["kind"]);
        let kind = KindProvisioner::new(docker.clone());

        kind.stop("dev").unwrap();
        assert!(!docker.is_running("dev-control-plane"));
        assert!(!docker.is_running("dev-worker"));
        assert!(docker.is_running("other-control-plane"));

        kind.start("dev").unwrap();
        assert!(docker.is_running("dev-worker"));
    }

    #[test]
    fn start_of_unknown_cluster() {
        let kind = KindProvisioner::new(Arc::new(FakeDocker::new()));
        assert!(matches!(
            kind.start("ghost").unwrap_err(),
            ProvisionerError::ClusterNotFound(_)
        ));
    }
}
