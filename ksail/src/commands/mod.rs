// Command handlers

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::debug;

use crate::cli::{Args, Command};
use ksail_config::KsailConfig;
use ksail_core::{ksail_error, ksail_info};
use ksail_messages::{messages::MESSAGES, msg};

pub mod cluster;
pub mod init;
pub mod registry;

/// Main command dispatcher
#[must_use = "command execution results should be handled"]
pub async fn execute_command(args: Args) -> Result<()> {
    match args.command {
        Command::Init {
            distribution,
            name,
            mirror_registry,
            local_registry,
            force,
        } => {
            debug!("Handling init command");
            init::handle_init(init::InitOptions {
                path: args.config,
                distribution,
                name,
                mirrors: mirror_registry,
                local_registry,
                force,
            })
        }
        Command::Cluster { command } => {
            debug!("Calling cluster operations");
            cluster::handle_cluster_command(&command, args.config.as_deref())
        }
        Command::Registry { command } => {
            debug!("Calling registry operations");
            registry::handle_registry_command(&command).await
        }
        Command::Completion { shell } => {
            debug!("Generating shell completions for: {}", shell);
            handle_completion(&shell)
        }
    }
}

/// Load `ksail.yaml` and return it with the directory generated files go to.
pub(crate) fn load_project(explicit: Option<&Path>) -> Result<(KsailConfig, PathBuf)> {
    let cwd = env::current_dir().context("Failed to determine the current directory")?;
    let (config, path) = KsailConfig::load(explicit, &cwd)?;

    let project_dir = match path {
        Some(path) => {
            debug!("Loaded configuration from {}", path.display());
            match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => cwd.join(parent),
                _ => cwd,
            }
        }
        None => {
            ksail_info!("{}", MESSAGES.config_not_found_defaults);
            cwd
        }
    };
    Ok((config, project_dir))
}

fn handle_completion(shell: &str) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, shells};
    use std::io;

    let mut cmd = crate::cli::Args::command();

    match shell.to_lowercase().as_str() {
        "bash" => generate(shells::Bash, &mut cmd, "ksail", &mut io::stdout()),
        "zsh" => generate(shells::Zsh, &mut cmd, "ksail", &mut io::stdout()),
        "fish" => generate(shells::Fish, &mut cmd, "ksail", &mut io::stdout()),
        "powershell" => generate(shells::PowerShell, &mut cmd, "ksail", &mut io::stdout()),
        _ => {
            ksail_error!(
                "{}",
                msg!(
                    "Unsupported shell: {shell}. Supported shells: bash, zsh, fish, powershell",
                    shell = shell
                )
            );
            bail!("Shell '{}' is not supported", shell);
        }
    }
    Ok(())
}
