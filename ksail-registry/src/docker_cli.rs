//! [`DockerClient`] backed by the `docker` command-line client.
//!
//! Listings use `--format '{{json .}}'` and detail lookups use `inspect`,
//! both decoded with serde.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::debug;

use ksail_core::command::{format_command, run_tool, ToolOutput};
use ksail_core::KsailError;

use crate::docker::{
    ContainerDetails, ContainerFilter, ContainerSpec, ContainerSummary, DockerClient, PortBinding,
};
use crate::error::{RegistryError, ResourceKind, Result};

#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new()
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self {
            binary: "docker".to_string(),
        }
    }

    fn exec(&self, args: &[&str]) -> Result<ToolOutput> {
        run_tool(&self.binary, args)
            .map_err(|e| RegistryError::docker(format!("failed to run {}", self.binary), e))
    }

    /// Run and require success; a "no such ..." failure becomes `NotFound`.
    fn run(&self, kind: ResourceKind, name: &str, args: &[&str]) -> Result<String> {
        let output = self.exec(args)?;
        if output.success {
            return Ok(output.stdout);
        }
        let command = format_command(&self.binary, args);
        if is_not_found(&output.stderr) {
            debug!("{} reported missing {} '{}'", command, kind, name);
            return Err(RegistryError::not_found(kind, name));
        }
        Err(RegistryError::docker(
            format!("docker {} failed for {} '{}'", describe(args), kind, name),
            KsailError::from_docker_stderr(&command, &output.stderr),
        ))
    }

    /// `inspect`-style existence probe.
    fn exists(&self, kind: ResourceKind, name: &str, args: &[&str]) -> Result<bool> {
        match self.run(kind, name, args) {
            Ok(_) => Ok(true),
            Err(RegistryError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn is_not_found(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    stderr.contains("no such container")
        || stderr.contains("no such volume")
        || stderr.contains("no such image")
        || stderr.contains("no such object")
        || stderr.contains("no such network")
        || (stderr.contains("network") && stderr.contains("not found"))
}

fn describe(args: &[&str]) -> String {
    args.iter()
        .take_while(|a| !a.starts_with('-'))
        .take(2)
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsRow {
    #[serde(rename = "ID")]
    id: String,
    names: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    labels: String,
}

fn parse_label_string(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            Some((k.trim().to_string(), v.to_string()))
        })
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

pub(crate) fn parse_ps_output(output: &str) -> Result<Vec<ContainerSummary>> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let row: PsRow = serde_json::from_str(line).map_err(|source| RegistryError::Decode {
                context: "container listing".to_string(),
                source,
            })?;
            Ok(ContainerSummary {
                id: row.id,
                name: row.names.split(',').next().unwrap_or_default().to_string(),
                image: row.image,
                state: row.state,
                labels: parse_label_string(&row.labels),
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectContainer {
    id: String,
    name: String,
    state: InspectState,
    config: InspectConfig,
    #[serde(default)]
    host_config: Option<InspectHostConfig>,
    #[serde(default)]
    network_settings: Option<InspectNetworkSettings>,
    #[serde(default)]
    mounts: Option<Vec<InspectMount>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    #[serde(default)]
    running: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    image: String,
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
    #[serde(default)]
    env: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectHostConfig {
    #[serde(default)]
    port_bindings: Option<BTreeMap<String, Option<Vec<InspectPortBinding>>>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectPortBinding {
    #[serde(default)]
    host_ip: String,
    #[serde(default)]
    host_port: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectNetworkSettings {
    #[serde(default)]
    networks: Option<BTreeMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectMount {
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    destination: String,
}

pub(crate) fn parse_inspect_output(output: &str, name: &str) -> Result<ContainerDetails> {
    let mut containers: Vec<InspectContainer> =
        serde_json::from_str(output).map_err(|source| RegistryError::Decode {
            context: format!("container '{}'", name),
            source,
        })?;
    if containers.is_empty() {
        return Err(RegistryError::not_found(ResourceKind::Container, name));
    }
    let raw = containers.swap_remove(0);

    let port_bindings = raw
        .host_config
        .and_then(|hc| hc.port_bindings)
        .unwrap_or_default()
        .into_iter()
        .map(|(port, bindings)| {
            let bindings = bindings
                .unwrap_or_default()
                .into_iter()
                .filter_map(|b| {
                    Some(PortBinding {
                        host_port: b.host_port.parse().ok()?,
                        host_ip: b.host_ip,
                    })
                })
                .collect();
            (port, bindings)
        })
        .collect();

    let networks = raw
        .network_settings
        .and_then(|ns| ns.networks)
        .map(|networks| networks.into_keys().collect())
        .unwrap_or_default();

    let volume_mounts = raw
        .mounts
        .unwrap_or_default()
        .into_iter()
        .filter(|m| m.kind == "volume")
        .filter_map(|m| Some((m.name?, m.destination)))
        .collect();

    Ok(ContainerDetails {
        id: raw.id,
        name: raw.name.trim_start_matches('/').to_string(),
        image: raw.config.image,
        running: raw.state.running,
        labels: raw.config.labels.unwrap_or_default(),
        env: raw.config.env.unwrap_or_default(),
        networks,
        port_bindings,
        volume_mounts,
    })
}

/// IPv6 bind addresses need brackets in `--publish`.
fn publish_host(host_ip: &str) -> String {
    if host_ip.contains(':') && !host_ip.starts_with('[') {
        format!("[{}]", host_ip)
    } else {
        host_ip.to_string()
    }
}

pub(crate) fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec![
        "container".to_string(),
        "create".to_string(),
        "--name".to_string(),
        spec.name.clone(),
    ];
    for (key, value) in &spec.labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }
    for env in &spec.env {
        args.push("--env".to_string());
        args.push(env.clone());
    }
    for port in &spec.ports {
        args.push("--publish".to_string());
        args.push(format!(
            "{}:{}:{}",
            publish_host(&port.host_ip),
            port.host_port,
            port.container_port
        ));
    }
    for (volume, destination) in &spec.volumes {
        args.push("--volume".to_string());
        args.push(format!("{}:{}", volume, destination));
    }
    if let Some(policy) = &spec.restart_policy {
        args.push("--restart".to_string());
        args.push(policy.clone());
    }
    args.push(spec.image.clone());
    args
}

impl DockerClient for DockerCli {
    fn list_containers(&self, filter: &ContainerFilter) -> Result<Vec<ContainerSummary>> {
        let mut args: Vec<String> = vec!["ps".into(), "--all".into(), "--no-trunc".into()];
        for (key, value) in &filter.labels {
            args.push("--filter".into());
            args.push(match value {
                Some(value) => format!("label={}={}", key, value),
                None => format!("label={}", key),
            });
        }
        if let Some(name) = &filter.name {
            args.push("--filter".into());
            args.push(format!("name=^/?{}$", name));
        }
        args.push("--format".into());
        args.push("{{json .}}".into());

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let stdout = self.run(ResourceKind::Container, "*", &args)?;
        // docker's name filter is a regex; re-check names exactly
        Ok(parse_ps_output(&stdout)?
            .into_iter()
            .filter(|c| filter.matches(&c.name, &c.labels))
            .collect())
    }

    fn inspect_container(&self, id_or_name: &str) -> Result<ContainerDetails> {
        let stdout = self.run(
            ResourceKind::Container,
            id_or_name,
            &["container", "inspect", id_or_name],
        )?;
        parse_inspect_output(&stdout, id_or_name)
    }

    fn create_container(&self, spec: &ContainerSpec) -> Result<String> {
        let args = create_args(spec);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let stdout = self.run(ResourceKind::Image, &spec.image, &args)?;
        Ok(stdout.trim().to_string())
    }

    fn start_container(&self, id_or_name: &str) -> Result<()> {
        self.run(
            ResourceKind::Container,
            id_or_name,
            &["container", "start", id_or_name],
        )
        .map(|_| ())
    }

    fn stop_container(&self, id_or_name: &str) -> Result<()> {
        self.run(
            ResourceKind::Container,
            id_or_name,
            &["container", "stop", id_or_name],
        )
        .map(|_| ())
    }

    fn remove_container(&self, id_or_name: &str) -> Result<()> {
        self.run(
            ResourceKind::Container,
            id_or_name,
            &["container", "rm", "--force", id_or_name],
        )
        .map(|_| ())
    }

    fn image_exists(&self, image: &str) -> Result<bool> {
        self.exists(ResourceKind::Image, image, &["image", "inspect", image])
    }

    fn pull_image(&self, image: &str) -> Result<()> {
        self.run(ResourceKind::Image, image, &["image", "pull", image])
            .map(|_| ())
    }

    fn volume_exists(&self, name: &str) -> Result<bool> {
        self.exists(ResourceKind::Volume, name, &["volume", "inspect", name])
    }

    fn create_volume(&self, name: &str, labels: &BTreeMap<String, String>) -> Result<()> {
        let mut args: Vec<String> = vec!["volume".into(), "create".into()];
        for (key, value) in labels {
            args.push("--label".into());
            args.push(format!("{}={}", key, value));
        }
        args.push(name.to_string());
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.run(ResourceKind::Volume, name, &args).map(|_| ())
    }

    fn remove_volume(&self, name: &str) -> Result<()> {
        self.run(ResourceKind::Volume, name, &["volume", "rm", name])
            .map(|_| ())
    }

    fn connect_network(&self, network: &str, container: &str) -> Result<()> {
        let args = ["network", "connect", network, container];
        let output = self.exec(&args)?;
        if output.success || output.stderr.contains("already exists in network") {
            return Ok(());
        }
        let stderr = output.stderr.to_lowercase();
        if stderr.contains("no such container") {
            return Err(RegistryError::not_found(ResourceKind::Container, container));
        }
        if is_not_found(&stderr) {
            return Err(RegistryError::not_found(ResourceKind::Network, network));
        }
        Err(RegistryError::docker(
            format!("failed to connect '{}' to network '{}'", container, network),
            KsailError::from_docker_stderr(&format_command(&self.binary, &args), &output.stderr),
        ))
    }

    fn disconnect_network(&self, network: &str, container: &str) -> Result<()> {
        let args = ["network", "disconnect", network, container];
        let output = self.exec(&args)?;
        if output.success {
            return Ok(());
        }
        let stderr = output.stderr.to_lowercase();
        if stderr.contains("no such container") {
            return Err(RegistryError::not_found(ResourceKind::Container, container));
        }
        // not attached, or the network is already gone
        if stderr.contains("is not connected") || is_not_found(&stderr) {
            debug!("'{}' was not on network '{}'", container, network);
            return Ok(());
        }
        Err(RegistryError::docker(
            format!(
                "failed to disconnect '{}' from network '{}'",
                container, network
            ),
            KsailError::from_docker_stderr(&format_command(&self.binary, &args), &output.stderr),
        ))
    }
}
