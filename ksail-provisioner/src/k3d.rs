//! K3d clusters via the `k3d` CLI.

use serde::Deserialize;
use tracing::info;

use ksail_config::Distribution;
use ksail_core::command::{run_tool_checked, stream_tool};

use crate::error::{ProvisionerError, Result};
use crate::{ClusterProvisioner, CreateClusterOptions};

const K3D: &str = "k3d";

#[derive(Debug, Default)]
pub struct K3dProvisioner;

impl K3dProvisioner {
    pub fn new() -> Self {
        Self
    }

    fn cluster_command(&self, verb: &str, name: &str) -> Result<()> {
        stream_tool(K3D, &cluster_args(verb, name)).map_err(|e| ProvisionerError::tool(K3D, e))
    }
}

pub(crate) fn create_args(name: &str, options: &CreateClusterOptions) -> Vec<String> {
    let mut args = cluster_args("create", name);
    if let Some(config) = &options.config_path {
        args.push("--config".to_string());
        args.push(config.display().to_string());
    }
    if let Some(registries) = &options.registry_config {
        args.push("--registry-config".to_string());
        args.push(registries.display().to_string());
    }
    args
}

pub(crate) fn cluster_args(verb: &str, name: &str) -> Vec<String> {
    vec!["cluster".to_string(), verb.to_string(), name.to_string()]
}

#[derive(Debug, Deserialize)]
struct ClusterEntry {
    name: String,
}

pub(crate) fn parse_cluster_list(stdout: &str) -> Result<Vec<String>> {
    if stdout.trim().is_empty() {
        return Ok(Vec::new());
    }
    let entries: Vec<ClusterEntry> =
        serde_json::from_str(stdout).map_err(|source| ProvisionerError::Decode {
            context: "k3d cluster list".to_string(),
            source,
        })?;
    let mut clusters: Vec<String> = entries.into_iter().map(|entry| entry.name).collect();
    clusters.sort();
    Ok(clusters)
}

impl ClusterProvisioner for K3dProvisioner {
    fn distribution(&self) -> Distribution {
        Distribution::K3d
    }

    fn create(&self, name: &str, options: &CreateClusterOptions) -> Result<()> {
        if self.exists(name)? {
            return Err(ProvisionerError::ClusterExists(name.to_string()));
        }
        stream_tool(K3D, &create_args(name, options))
            .map_err(|e| ProvisionerError::tool(K3D, e))?;
        info!("Created K3d cluster '{}'", name);
        Ok(())
    }

    fn delete(&self, name: &str) -> Result<()> {
        if !self.exists(name)? {
            return Err(ProvisionerError::ClusterNotFound(name.to_string()));
        }
        self.cluster_command("delete", name)?;
        info!("Deleted K3d cluster '{}'", name);
        Ok(())
    }

    fn start(&self, name: &str) -> Result<()> {
        if !self.exists(name)? {
            return Err(ProvisionerError::ClusterNotFound(name.to_string()));
        }
        self.cluster_command("start", name)
    }

    fn stop(&self, name: &str) -> Result<()> {
        if !self.exists(name)? {
            return Err(ProvisionerError::ClusterNotFound(name.to_string()));
        }
        self.cluster_command("stop", name)
    }

    fn list(&self) -> Result<Vec<String>> {
        let stdout = run_tool_checked(K3D, &["cluster", "list", "-o", "json"])
            .map_err(|e| ProvisionerError::tool(K3D, e))?;
        parse_cluster_list(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn create_arguments() {
        let options = CreateClusterOptions {
            config_path: Some(PathBuf::from("k3d.yaml")),
            registry_config: Some(PathBuf::from("/work/.ksail/dev/registries.yaml")),
        };
        assert_eq!(
            create_args("dev", &options).join(" "),
            "cluster create dev --config k3d.yaml --registry-config /work/.ksail/dev/registries.yaml"
        );
        assert_eq!(
            create_args("dev", &CreateClusterOptions::default()),
            vec!["cluster", "create", "dev"]
        );
    }

    #[test]
    fn lifecycle_arguments() {
        assert_eq!(cluster_args("stop", "dev"), vec!["cluster", "stop", "dev"]);
    }

    #[test]
    fn parses_cluster_list() {
        let json = r#"[
            {"name": "b", "serversCount": 1, "serversRunning": 1, "agentsCount": 0},
            {"name": "a", "serversCount": 1, "serversRunning": 0, "agentsCount": 2}
        ]"#;
        assert_eq!(parse_cluster_list(json).unwrap(), vec!["a", "b"]);
        assert!(parse_cluster_list("[]").unwrap().is_empty());
        assert!(parse_cluster_list("\n").unwrap().is_empty());
        assert!(matches!(
            parse_cluster_list("oops").unwrap_err(),
            ProvisionerError::Decode { .. }
        ));
    }
}
