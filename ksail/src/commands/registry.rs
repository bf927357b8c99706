//! Registry command handlers
//!
//! Thin wrappers over [`RegistryService`]; every handler reports through
//! the shared message templates.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use tracing::debug;

use crate::cli::RegistrySubcommand;
use ksail_core::command::ensure_tool;
use ksail_core::{ksail_info, ksail_operation, ksail_println, ksail_success};
use ksail_messages::{messages::MESSAGES, msg};
use ksail_registry::{
    list_catalog, wait_for_registry_ready, CreateOptions, DeleteOutcome, DockerCli, Info,
    RegistryService, StartOptions, Status, StatusOptions, StopOptions,
};

const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Handle registry commands
pub async fn handle_registry_command(command: &RegistrySubcommand) -> Result<()> {
    match command {
        RegistrySubcommand::Create {
            name,
            port,
            host,
            upstream,
            volume,
        } => {
            let opts = CreateOptions {
                name: name.clone(),
                host: host.clone(),
                port: *port,
                volume_name: volume.clone(),
                upstream_url: upstream.clone(),
                cluster_name: None,
            };
            // reject bad input before looking for docker
            opts.to_config().validate()?;
            handle_create(&service()?, &opts)
        }
        RegistrySubcommand::Start {
            name,
            network,
            wait,
        } => handle_start(&service()?, name, network.clone(), *wait).await,
        RegistrySubcommand::Stop {
            name,
            network,
            cluster,
            delete_volume,
        } => handle_stop(
            &service()?,
            StopOptions {
                name: name.clone(),
                cluster_name: cluster.clone(),
                network_name: network.clone(),
                delete_volume: *delete_volume,
            },
        ),
        RegistrySubcommand::Status { name } => handle_status(&service()?, name),
        RegistrySubcommand::List => handle_list(&service()?),
        RegistrySubcommand::Images { name } => handle_images(&service()?, name).await,
    }
}

fn service() -> Result<RegistryService> {
    ensure_tool("docker")?;
    Ok(RegistryService::new(Arc::new(DockerCli::new())))
}

fn handle_create(service: &RegistryService, opts: &CreateOptions) -> Result<()> {
    ksail_operation!(start REGISTRY_OPS.create, name = &opts.name);
    match service.create(opts) {
        Ok(info) => {
            ksail_operation!(success REGISTRY_OPS.create, name = &opts.name);
            print_info(&info);
            Ok(())
        }
        Err(e) => {
            ksail_operation!(failed REGISTRY_OPS.create, name = &opts.name, error = &e);
            Err(e.into())
        }
    }
}

async fn handle_start(
    service: &RegistryService,
    name: &str,
    network: Option<String>,
    wait: bool,
) -> Result<()> {
    ksail_operation!(start REGISTRY_OPS.start, name = name);
    let info = match service.start(&StartOptions {
        name: name.to_string(),
        network_name: network,
    }) {
        Ok(info) => info,
        Err(e) => {
            ksail_operation!(failed REGISTRY_OPS.start, name = name, error = &e);
            return Err(e.into());
        }
    };

    if wait && !info.endpoint.is_empty() {
        ksail_info!("{}", msg!(MESSAGES.registry_waiting, endpoint = &info.endpoint));
        wait_for_registry_ready(&info.endpoint, READY_TIMEOUT).await?;
    }

    ksail_operation!(success REGISTRY_OPS.start, name = name);
    Ok(())
}

fn handle_stop(service: &RegistryService, opts: StopOptions) -> Result<()> {
    ksail_operation!(start REGISTRY_OPS.stop, name = &opts.name);
    match service.stop(&opts) {
        Ok(DeleteOutcome::Removed) => {
            ksail_operation!(success REGISTRY_OPS.stop, name = &opts.name);
        }
        Ok(DeleteOutcome::StillInUse) => {
            ksail_info!("{}", msg!(MESSAGES.registry_in_use, name = &opts.name));
        }
        Ok(DeleteOutcome::Absent) => {
            ksail_info!("{}", msg!(MESSAGES.registry_not_found, name = &opts.name));
        }
        Err(e) => {
            ksail_operation!(failed REGISTRY_OPS.stop, name = &opts.name, error = &e);
            return Err(e.into());
        }
    }
    Ok(())
}

fn handle_status(service: &RegistryService, name: &str) -> Result<()> {
    let info = service.status(&StatusOptions {
        name: name.to_string(),
    })?;
    if info.status == Status::NotProvisioned {
        ksail_info!("{}", msg!(MESSAGES.registry_not_found, name = name));
        return Ok(());
    }
    print_info(&info);
    Ok(())
}

fn print_info(info: &Info) {
    ksail_println!("{}", format_status_block(info));
}

pub(crate) fn format_status_block(info: &Info) -> String {
    let networks = if info.networks.is_empty() {
        "-".to_string()
    } else {
        info.networks.join(", ")
    };
    msg!(
        MESSAGES.registry_status_block,
        name = &info.name,
        status = info.status,
        endpoint = if info.endpoint.is_empty() { "-" } else { info.endpoint.as_str() },
        volume = &info.volume,
        upstream = info.upstream_url.as_deref().unwrap_or("-"),
        networks = networks
    )
}

pub(crate) fn format_list_row(info: &Info) -> String {
    let endpoint = if info.endpoint.is_empty() {
        "-"
    } else {
        info.endpoint.as_str()
    };
    format!("{:<30} {:<17} {}", info.name, info.status.to_string(), endpoint)
}

fn handle_list(service: &RegistryService) -> Result<()> {
    let registries = service.list()?;
    if registries.is_empty() {
        ksail_println!("{}", MESSAGES.registry_list_empty);
        return Ok(());
    }

    ksail_println!("{}", MESSAGES.registry_list_header);
    for info in &registries {
        ksail_println!("{}", format_list_row(info));
    }
    Ok(())
}

async fn handle_images(service: &RegistryService, name: &str) -> Result<()> {
    let info = service.status(&StatusOptions {
        name: name.to_string(),
    })?;
    match info.status {
        Status::NotProvisioned => bail!(msg!(MESSAGES.registry_not_found, name = name)),
        Status::Stopped => bail!("Registry '{}' is not running", name),
        Status::Running => {}
    }

    debug!("Listing catalog of '{}' at {}", name, info.endpoint);
    let repositories = list_catalog(&info.endpoint).await?;
    if repositories.is_empty() {
        ksail_println!("{}", MESSAGES.registry_catalog_empty);
        return Ok(());
    }

    ksail_success!("{}", msg!(MESSAGES.registry_catalog_header, name = name));
    for repository in repositories {
        ksail_println!("  {}", repository);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running() -> Info {
        Info {
            name: "k3d-docker.io".to_string(),
            host: "localhost".to_string(),
            port: 5001,
            endpoint: "localhost:5001".to_string(),
            status: Status::Running,
            volume: "k3d-docker.io".to_string(),
            upstream_url: Some("https://registry-1.docker.io".to_string()),
            networks: vec!["bridge".to_string(), "k3d-dev".to_string()],
        }
    }

    #[test]
    fn status_block_lists_every_field() {
        let block = format_status_block(&running());
        assert!(block.contains("Name:     k3d-docker.io"));
        assert!(block.contains("Status:   running"));
        assert!(block.contains("Endpoint: localhost:5001"));
        assert!(block.contains("Upstream: https://registry-1.docker.io"));
        assert!(block.contains("Networks: bridge, k3d-dev"));
    }

    #[test]
    fn status_block_placeholders() {
        let mut info = running();
        info.upstream_url = None;
        info.networks.clear();
        info.endpoint.clear();
        let block = format_status_block(&info);
        assert!(block.contains("Upstream: -"));
        assert!(block.contains("Networks: -"));
        assert!(block.contains("Endpoint: -"));
    }

    #[test]
    fn list_row_is_aligned_with_header() {
        let row = format_list_row(&running());
        let status_column = MESSAGES.registry_list_header.find("STATUS").unwrap();
        let endpoint_column = MESSAGES.registry_list_header.find("ENDPOINT").unwrap();
        assert_eq!(&row[status_column..status_column + 7], "running");
        assert_eq!(&row[endpoint_column..], "localhost:5001");
    }
}
