// CLI argument parsing and definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use ksail_config::{ConfigError, Distribution, MirrorSpec};

#[derive(Debug, Clone, Parser)]
#[command(name = "ksail")]
#[command(about = "Local Kubernetes clusters with pull-through registry mirrors")]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Path to ksail.yaml (defaults to ./ksail.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,
}

fn parse_distribution(value: &str) -> Result<Distribution, ConfigError> {
    value.parse()
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Write a ksail.yaml for a new project
    Init {
        /// Kubernetes distribution: kind or k3d
        #[arg(long, value_parser = parse_distribution)]
        distribution: Option<Distribution>,

        /// Cluster name
        #[arg(long)]
        name: Option<String>,

        /// Pull-through mirror, e.g. docker.io or ghcr.io=https://ghcr.io (repeatable)
        #[arg(long = "mirror-registry", value_name = "HOST[=UPSTREAM]", value_parser = MirrorSpec::parse)]
        mirror_registry: Vec<MirrorSpec>,

        /// Run a local registry to push images into
        #[arg(long)]
        local_registry: bool,

        /// Overwrite an existing ksail.yaml
        #[arg(short, long)]
        force: bool,
    },

    /// Manage the project's cluster
    Cluster {
        #[command(subcommand)]
        command: ClusterSubcommand,
    },

    /// Manage registry containers
    Registry {
        #[command(subcommand)]
        command: RegistrySubcommand,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell: bash, zsh, fish or powershell
        shell: String,
    },
}

impl Command {
    /// Short name used in the request span.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Init { .. } => "init",
            Command::Cluster { .. } => "cluster",
            Command::Registry { .. } => "registry",
            Command::Completion { .. } => "completion",
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum ClusterSubcommand {
    /// Create the cluster and its registries
    Create {
        /// Extra pull-through mirror on top of ksail.yaml (repeatable)
        #[arg(long = "mirror-registry", value_name = "HOST[=UPSTREAM]", value_parser = MirrorSpec::parse)]
        mirror_registry: Vec<MirrorSpec>,
    },
    /// Start a stopped cluster
    Start,
    /// Stop the cluster; registries keep running
    Stop,
    /// Delete the cluster and the registries no other cluster uses
    Delete {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// List clusters of the configured distribution
    List,
}

#[derive(Debug, Clone, Subcommand)]
pub enum RegistrySubcommand {
    /// Create and start a registry
    Create {
        /// Registry (container) name
        name: String,

        /// Host port
        #[arg(short, long, default_value_t = ksail_registry::DEFAULT_REGISTRY_PORT)]
        port: u16,

        /// Host address to bind
        #[arg(long)]
        host: Option<String>,

        /// Upstream URL; makes the registry a pull-through mirror
        #[arg(short, long)]
        upstream: Option<String>,

        /// Data volume (defaults to the registry name)
        #[arg(long)]
        volume: Option<String>,
    },
    /// Start an existing registry
    Start {
        name: String,

        /// Network to connect the registry to
        #[arg(short, long)]
        network: Option<String>,

        /// Wait until the registry answers on its endpoint
        #[arg(short, long)]
        wait: bool,
    },
    /// Detach a registry and remove it unless a cluster still uses it
    Stop {
        name: String,

        /// Network to disconnect first
        #[arg(short, long)]
        network: Option<String>,

        /// Cluster the registry is stopped for
        #[arg(long)]
        cluster: Option<String>,

        /// Also remove the data volume
        #[arg(long)]
        delete_volume: bool,
    },
    /// Show a registry's status
    Status { name: String },
    /// List ksail-managed registries
    List,
    /// List the repositories a registry holds
    Images { name: String },
}
