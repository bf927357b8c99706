//! Cluster command handlers
//!
//! Each handler builds a [`ClusterLifecycle`] for the project's `ksail.yaml`
//! and reports progress with the shared operation messages.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use dialoguer::Confirm;
use tracing::{debug, warn};

use crate::cli::ClusterSubcommand;
use ksail_config::{KsailConfig, MirrorSpec};
use ksail_core::command::ensure_tool;
use ksail_core::{
    ksail_info, ksail_operation, ksail_println, ksail_success, ksail_warning,
};
use ksail_messages::{messages::MESSAGES, msg};
use ksail_provisioner::lifecycle::CreateReport;
use ksail_provisioner::{get_provisioner, ClusterLifecycle};
use ksail_registry::{
    DeleteOutcome, DockerCli, DockerClient, RegistryController, RegistryManager, TeardownReport,
};

pub fn handle_cluster_command(command: &ClusterSubcommand, config: Option<&Path>) -> Result<()> {
    let (mut config, project_dir) = super::load_project(config)?;

    if let ClusterSubcommand::Create { mirror_registry } = command {
        apply_mirror_flags(&mut config, mirror_registry)?;
    }

    ensure_tool("docker")?;
    ensure_tool(config.cluster.distribution.binary())?;

    let docker: Arc<dyn DockerClient> = Arc::new(DockerCli::new());
    let provisioner = get_provisioner(config.cluster.distribution, docker.clone());
    let controller = RegistryController::new(RegistryManager::new(docker));
    let lifecycle = ClusterLifecycle::new(config, provisioner, controller, project_dir);

    match command {
        ClusterSubcommand::Create { .. } => handle_create(&lifecycle),
        ClusterSubcommand::Start => handle_start(&lifecycle),
        ClusterSubcommand::Stop => handle_stop(&lifecycle),
        ClusterSubcommand::Delete { force } => handle_delete(&lifecycle, *force),
        ClusterSubcommand::List => handle_list(&lifecycle),
    }
}

/// Layer `--mirror-registry` flags over the configured mirrors.
pub(crate) fn apply_mirror_flags(config: &mut KsailConfig, mirrors: &[MirrorSpec]) -> Result<()> {
    if mirrors.is_empty() {
        return Ok(());
    }
    debug!("Adding {} mirror(s) from the command line", mirrors.len());
    config.merge_mirror_specs(mirrors);
    config.validate()?;
    Ok(())
}

fn handle_create(lifecycle: &ClusterLifecycle) -> Result<()> {
    let name = lifecycle.cluster_name();
    ksail_operation!(start CLUSTER_OPS.create, name = name);

    let report = match lifecycle.create() {
        Ok(report) => report,
        Err(e) => {
            ksail_operation!(failed CLUSTER_OPS.create, name = name, error = &e);
            return Err(e.into());
        }
    };

    print_create_report(lifecycle, &report);
    ksail_operation!(success CLUSTER_OPS.create, name = name);
    Ok(())
}

fn print_create_report(lifecycle: &ClusterLifecycle, report: &CreateReport) {
    if !report.registries.is_empty() {
        let network = lifecycle
            .config()
            .cluster
            .distribution
            .network_name(lifecycle.cluster_name());
        for registry in &report.registries {
            if !registry.created {
                ksail_info!("{}", msg!(MESSAGES.registry_exists, name = &registry.config.name));
            }
            ksail_info!(
                "{}",
                msg!(
                    MESSAGES.cluster_registry_connected,
                    registry = &registry.config.name,
                    network = &network
                )
            );
        }
        ksail_success!(
            "{}",
            msg!(
                MESSAGES.cluster_registries_provisioned,
                count = report.registries.len()
            )
        );
    }

    if let Some(path) = &report.mirror_config {
        ksail_info!(
            "{}",
            msg!(MESSAGES.cluster_mirror_config_written, path = path.display())
        );
    }

    if let (Some(mirrors_dir), Some(user_config)) = (
        &report.unmounted_mirrors,
        &lifecycle.config().cluster.distribution_config,
    ) {
        ksail_warning!(
            "{}",
            msg!(
                MESSAGES.cluster_user_config_hint,
                path = user_config.display(),
                mirrors_dir = mirrors_dir.display()
            )
        );
    }
}

fn handle_start(lifecycle: &ClusterLifecycle) -> Result<()> {
    let name = lifecycle.cluster_name();
    ksail_operation!(start CLUSTER_OPS.start, name = name);
    if let Err(e) = lifecycle.start() {
        ksail_operation!(failed CLUSTER_OPS.start, name = name, error = &e);
        return Err(e.into());
    }
    ksail_operation!(success CLUSTER_OPS.start, name = name);
    Ok(())
}

fn handle_stop(lifecycle: &ClusterLifecycle) -> Result<()> {
    let name = lifecycle.cluster_name();
    ksail_operation!(start CLUSTER_OPS.stop, name = name);
    if let Err(e) = lifecycle.stop() {
        ksail_operation!(failed CLUSTER_OPS.stop, name = name, error = &e);
        return Err(e.into());
    }
    ksail_operation!(success CLUSTER_OPS.stop, name = name);
    Ok(())
}

fn confirm_delete(name: &str) -> Result<bool> {
    Ok(Confirm::new()
        .with_prompt(msg!(MESSAGES.cluster_delete_confirm, name = name))
        .default(false)
        .interact()?)
}

fn handle_delete(lifecycle: &ClusterLifecycle, force: bool) -> Result<()> {
    let name = lifecycle.cluster_name();
    if !force && !confirm_delete(name)? {
        ksail_println!("{}", MESSAGES.cluster_delete_cancelled);
        return Ok(());
    }

    ksail_operation!(start CLUSTER_OPS.delete, name = name);
    let report = match lifecycle.delete() {
        Ok(report) => report,
        Err(e) => {
            ksail_operation!(failed CLUSTER_OPS.delete, name = name, error = &e);
            return Err(e.into());
        }
    };

    print_teardown_report(&report);
    ksail_operation!(success CLUSTER_OPS.delete, name = name);
    Ok(())
}

fn print_teardown_report(report: &TeardownReport) {
    for (registry, outcome) in &report.outcomes {
        match outcome {
            DeleteOutcome::Removed => {
                ksail_operation!(success REGISTRY_OPS.delete, name = registry);
            }
            DeleteOutcome::StillInUse => {
                ksail_info!("{}", msg!(MESSAGES.registry_in_use, name = registry));
            }
            DeleteOutcome::Absent => {
                debug!("Registry '{}' was already gone", registry);
            }
        }
    }
    for (registry, error) in &report.failures {
        warn!("Failed to remove registry '{}': {}", registry, error);
        ksail_operation!(failed REGISTRY_OPS.delete, name = registry, error = error);
    }
}

fn handle_list(lifecycle: &ClusterLifecycle) -> Result<()> {
    let distribution = lifecycle.config().cluster.distribution;
    let clusters = lifecycle.list()?;
    if clusters.is_empty() {
        ksail_println!(
            "{}",
            msg!(MESSAGES.cluster_list_empty, distribution = distribution)
        );
        return Ok(());
    }

    ksail_println!(
        "{}",
        msg!(MESSAGES.cluster_list_header, distribution = distribution)
    );
    for cluster in clusters {
        let marker = if cluster == lifecycle.cluster_name() {
            "*"
        } else {
            " "
        };
        ksail_println!(" {} {}", marker, cluster);
    }
    Ok(())
}
