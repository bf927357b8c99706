//! # ksail registry
//!
//! Lifecycle management for the Docker registries that run next to local
//! Kind and K3d clusters: a local registry to push images into, and
//! pull-through mirrors that cache images from upstream registries.
//!
//! A registry is a composite resource: a `registry:3` container, a named
//! volume holding the blobs, and attachments to cluster networks. One
//! registry can serve several clusters; it is only removed once no cluster
//! network is attached to it any more.
//!
//! ## Layers
//!
//! ```text
//! RegistryController   batches with rollback, port allocation
//!        │
//! RegistryService      create / start / stop / status → Info
//!        │
//! RegistryManager      container + volume + network composite
//!        │
//! DockerClient         DockerCli (docker CLI) or FakeDocker (tests)
//! ```

pub mod controller;
pub mod docker;
pub mod docker_cli;
pub mod error;
pub mod health;
pub mod manager;
pub mod mirror_config;
pub mod service;
pub mod types;

#[cfg(any(test, feature = "test-helpers"))]
pub mod fake;
#[cfg(any(test, feature = "test-helpers"))]
pub use fake::FakeDocker;

pub use controller::{
    next_free_port, PortRequest, ProvisionedRegistry, RegistryController, TeardownReport,
};
pub use docker::DockerClient;
pub use docker_cli::DockerCli;
pub use error::{RegistryError, Result};
pub use health::{check_registry_running, list_catalog, wait_for_registry_ready};
pub use manager::{is_cluster_network, RegistryManager};
pub use service::RegistryService;
pub use types::{
    CreateOptions, CreateOutcome, DeleteOutcome, Info, MirrorEndpoint, RegistryConfig,
    RegistryDetails, StartOptions, Status, StatusOptions, StopOptions,
};

/// Image every registry container runs.
pub const REGISTRY_IMAGE: &str = "registry:3";

/// Port the registry listens on inside its container.
pub const REGISTRY_CONTAINER_PORT: u16 = 5000;

/// Where the registry keeps its blobs inside the container.
pub const REGISTRY_DATA_PATH: &str = "/var/lib/registry";

/// Default host port of the local registry.
pub const DEFAULT_REGISTRY_PORT: u16 = 5000;

/// First host port handed out to mirrors without a pinned port.
pub const MIRROR_PORT_START: u16 = 5001;

/// Default bind address for registry host ports.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Label carrying the registry name on containers and volumes.
pub const REGISTRY_LABEL: &str = "io.ksail.registry";

/// Label recording the cluster that created a registry.
pub const CLUSTER_LABEL: &str = "io.ksail.cluster";

pub const RESTART_POLICY: &str = "unless-stopped";

/// Environment variable that turns `registry` into a pull-through proxy.
pub const PROXY_REMOTE_URL_ENV: &str = "REGISTRY_PROXY_REMOTEURL";
