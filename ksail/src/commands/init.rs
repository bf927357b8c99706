// Project initialization

use std::path::PathBuf;

use anyhow::{bail, Result};
use tracing::debug;

use ksail_config::{Distribution, KsailConfig, MirrorSpec, CONFIG_FILE_NAME};
use ksail_core::ksail_success;
use ksail_messages::{messages::MESSAGES, msg};

pub struct InitOptions {
    pub path: Option<PathBuf>,
    pub distribution: Option<Distribution>,
    pub name: Option<String>,
    pub mirrors: Vec<MirrorSpec>,
    pub local_registry: bool,
    pub force: bool,
}

/// Build the configuration `ksail init` writes.
pub fn build_config(options: &InitOptions) -> Result<KsailConfig> {
    let mut config = KsailConfig::default();
    if let Some(distribution) = options.distribution {
        config.cluster.distribution = distribution;
    }
    if let Some(name) = &options.name {
        config.cluster.name = name.clone();
    }
    config.registry.local.enabled = options.local_registry;
    config.merge_mirror_specs(&options.mirrors);
    config.validate()?;
    Ok(config)
}

pub fn handle_init(options: InitOptions) -> Result<()> {
    let path = options
        .path
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

    if path.exists() && !options.force {
        bail!(msg!(MESSAGES.config_exists, path = path.display()));
    }

    let config = build_config(&options)?;
    debug!(
        "Writing {} for cluster '{}' ({})",
        path.display(),
        config.cluster.name,
        config.cluster.distribution
    );
    config.save(&path)?;

    ksail_success!("{}", msg!(MESSAGES.config_written, path = path.display()));
    Ok(())
}
