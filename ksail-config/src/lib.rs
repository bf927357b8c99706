//! Project configuration for ksail.
//!
//! A project is described by a `ksail.yaml` next to the user's manifests. It
//! names the cluster, picks the distribution (Kind or K3d) and lists the
//! registries that should run alongside the cluster: an optional local
//! registry to push images into and any number of pull-through mirrors.

pub mod config;
pub mod error;
pub mod mirror;

pub use config::{
    ClusterSettings, Distribution, KsailConfig, LocalRegistrySettings, MirrorSettings,
    RegistrySettings, CONFIG_FILE_NAME,
};
pub use error::ConfigError;
pub use mirror::MirrorSpec;
