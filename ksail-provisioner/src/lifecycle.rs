//! Clusters together with their registries.
//!
//! Creating a cluster provisions its registries first, renders the mirror
//! configuration the distribution needs, creates the cluster and finally
//! attaches every registry to the cluster network. Deleting a cluster
//! detaches the registries again; shared ones survive until the last
//! cluster using them is gone.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, info_span, warn};

use ksail_config::{Distribution, KsailConfig};
use ksail_registry::controller::PortRequest;
use ksail_registry::mirror_config::{
    write_k3d_registries_yaml, write_kind_cluster_config, write_kind_mirror_dir,
};
use ksail_registry::{
    MirrorEndpoint, ProvisionedRegistry, RegistryConfig, RegistryController, TeardownReport,
    MIRROR_PORT_START, REGISTRY_CONTAINER_PORT,
};

use crate::error::{ProvisionerError, Result};
use crate::{ClusterProvisioner, CreateClusterOptions};

/// Directory, next to `ksail.yaml`, holding generated per-cluster files.
pub const GENERATED_DIR: &str = ".ksail";

/// Registries a cluster needs and how its nodes reach them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryPlan {
    pub registries: Vec<RegistryConfig>,
    pub mirrors: Vec<MirrorEndpoint>,
}

#[derive(Debug)]
pub struct CreateReport {
    pub registries: Vec<ProvisionedRegistry>,
    /// Generated mirror configuration, when there were mirrors to configure.
    pub mirror_config: Option<PathBuf>,
    /// Set when a user-supplied Kind config was used; the mirror directory
    /// must be mounted by that config for the mirrors to take effect.
    pub unmounted_mirrors: Option<PathBuf>,
}

#[derive(Debug, Default)]
struct MirrorFiles {
    config: Option<PathBuf>,
    unmounted: Option<PathBuf>,
}

pub struct ClusterLifecycle {
    config: KsailConfig,
    provisioner: Box<dyn ClusterProvisioner>,
    controller: RegistryController,
    project_dir: PathBuf,
}

impl ClusterLifecycle {
    pub fn new(
        config: KsailConfig,
        provisioner: Box<dyn ClusterProvisioner>,
        controller: RegistryController,
        project_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            config,
            provisioner,
            controller,
            project_dir: project_dir.into(),
        }
    }

    pub fn config(&self) -> &KsailConfig {
        &self.config
    }

    pub fn cluster_name(&self) -> &str {
        &self.config.cluster.name
    }

    fn distribution(&self) -> Distribution {
        self.config.cluster.distribution
    }

    pub fn generated_dir(&self) -> PathBuf {
        self.project_dir
            .join(GENERATED_DIR)
            .join(self.cluster_name())
    }

    fn user_config(&self) -> Option<PathBuf> {
        self.config
            .cluster
            .distribution_config
            .as_ref()
            .map(|path| resolve(&self.project_dir, path))
    }

    /// Names of the registries configured for this cluster.
    pub fn registry_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let local = &self.config.registry.local;
        if local.enabled {
            names.push(local.name.clone());
        }
        let prefix = self.distribution().registry_prefix();
        for mirror in &self.config.registry.mirrors {
            names.push(mirror.spec()?.container_name(prefix));
        }
        Ok(names)
    }

    /// Registry configs with host ports assigned, plus the mirror endpoints.
    pub fn plan_registries(&self) -> Result<RegistryPlan> {
        let cluster = self.cluster_name();
        let prefix = self.distribution().registry_prefix();
        let local = &self.config.registry.local;

        let mut requests = Vec::new();
        if local.enabled {
            requests.push(PortRequest {
                name: local.name.clone(),
                pinned: Some(local.port),
            });
        }
        let mut specs = Vec::new();
        for mirror in &self.config.registry.mirrors {
            let spec = mirror.spec()?;
            requests.push(PortRequest {
                name: spec.container_name(prefix),
                pinned: mirror.port,
            });
            specs.push(spec);
        }

        let mut ports = self
            .controller
            .resolve_ports(&requests, MIRROR_PORT_START)?
            .into_iter();
        let mut plan = RegistryPlan {
            registries: Vec::with_capacity(requests.len()),
            mirrors: Vec::with_capacity(requests.len()),
        };

        if local.enabled {
            let port = ports.next().unwrap_or(local.port);
            plan.registries
                .push(RegistryConfig::new(&local.name, port).with_cluster(cluster));
            // nodes pull pushed images through localhost:<port>
            plan.mirrors.push(MirrorEndpoint::new(
                format!("localhost:{}", port),
                format!("http://{}:{}", local.name, REGISTRY_CONTAINER_PORT),
                &local.name,
            ));
        }
        for spec in specs {
            let name = spec.container_name(prefix);
            let port = ports.next().unwrap_or(MIRROR_PORT_START);
            plan.registries.push(
                RegistryConfig::new(&name, port)
                    .with_upstream(&spec.upstream)
                    .with_cluster(cluster),
            );
            plan.mirrors
                .push(MirrorEndpoint::new(&spec.host, &spec.upstream, &name));
        }
        Ok(plan)
    }

    pub fn create(&self) -> Result<CreateReport> {
        let name = self.cluster_name();
        let _span = info_span!(
            "cluster_create",
            cluster = %name,
            distribution = %self.distribution()
        )
        .entered();

        if self.provisioner.exists(name)? {
            return Err(ProvisionerError::ClusterExists(name.to_string()));
        }

        let plan = self.plan_registries()?;
        let registries = self.controller.provision(&plan.registries)?;

        let created = self.write_mirror_config(&plan).and_then(|(options, files)| {
            self.provisioner.create(name, &options)?;
            Ok(files)
        });
        let files = match created {
            Ok(files) => files,
            Err(err) => {
                warn!("Cluster '{}' was not created, removing its new registries", name);
                self.controller.remove_created(&registries);
                return Err(err);
            }
        };

        let network = self.provisioner.network_name(name);
        for registry in &plan.registries {
            self.controller
                .manager()
                .connect_registry(&registry.name, &network)?;
            debug!("Connected '{}' to '{}'", registry.name, network);
        }

        info!(
            "Cluster '{}' is up with {} registries",
            name,
            registries.len()
        );
        Ok(CreateReport {
            registries,
            mirror_config: files.config,
            unmounted_mirrors: files.unmounted,
        })
    }

    /// Write the distribution's mirror configuration and return the options
    /// for creating the cluster with it.
    fn write_mirror_config(
        &self,
        plan: &RegistryPlan,
    ) -> Result<(CreateClusterOptions, MirrorFiles)> {
        let user_config = self.user_config();
        let mut options = CreateClusterOptions {
            config_path: user_config.clone(),
            registry_config: None,
        };
        if plan.mirrors.is_empty() {
            return Ok((options, MirrorFiles::default()));
        }

        let dir = self.generated_dir();
        match self.distribution() {
            Distribution::Kind => {
                let mirrors_dir = dir.join("certs.d");
                write_kind_mirror_dir(&mirrors_dir, &plan.mirrors)?;
                if user_config.is_some() {
                    // the user's config is passed through untouched
                    let files = MirrorFiles {
                        config: Some(mirrors_dir.clone()),
                        unmounted: Some(mirrors_dir),
                    };
                    return Ok((options, files));
                }
                let path = dir.join("kind-cluster.yaml");
                write_kind_cluster_config(&path, self.cluster_name(), &mirrors_dir)?;
                options.config_path = Some(path.clone());
                Ok((options, MirrorFiles { config: Some(path), unmounted: None }))
            }
            Distribution::K3d => {
                let path = dir.join("registries.yaml");
                write_k3d_registries_yaml(&path, &plan.mirrors)?;
                options.registry_config = Some(path.clone());
                Ok((options, MirrorFiles { config: Some(path), unmounted: None }))
            }
        }
    }

    /// Delete the cluster and detach its registries, removing those no
    /// other cluster uses.
    pub fn delete(&self) -> Result<TeardownReport> {
        let name = self.cluster_name();
        let _span = info_span!("cluster_delete", cluster = %name).entered();

        self.provisioner.delete(name)?;

        // every kind cluster shares one network; keep registries on it while
        // another kind cluster is around
        let network = match self.distribution() {
            Distribution::Kind if self.provisioner.list()?.iter().any(|c| c != name) => {
                debug!("Other Kind clusters remain, keeping registries on 'kind'");
                None
            }
            _ => Some(self.provisioner.network_name(name)),
        };

        let report = self.controller.teardown(
            &self.registry_names()?,
            Some(name),
            network.as_deref(),
            self.config.registry.delete_volumes,
        );

        let dir = self.generated_dir();
        if dir.exists() {
            if let Err(e) = fs::remove_dir_all(&dir) {
                warn!("Failed to remove {}: {}", dir.display(), e);
            }
        }
        Ok(report)
    }

    /// Start the cluster's registries, then the cluster.
    pub fn start(&self) -> Result<()> {
        let name = self.cluster_name();
        for registry in self.registry_names()? {
            match self.controller.manager().start_registry(&registry, None) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    warn!("Registry '{}' does not exist, skipping", registry)
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.provisioner.start(name)
    }

    /// Stop the cluster. Registries keep running for other clusters.
    pub fn stop(&self) -> Result<()> {
        self.provisioner.stop(self.cluster_name())
    }

    pub fn list(&self) -> Result<Vec<String>> {
        self.provisioner.list()
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
