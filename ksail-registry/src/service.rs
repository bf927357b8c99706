//! User-facing registry operations, reported as [`Info`].

use std::sync::Arc;

use tracing::debug;

use crate::docker::DockerClient;
use crate::error::{RegistryError, ResourceKind, Result};
use crate::manager::RegistryManager;
use crate::types::{
    CreateOptions, DeleteOutcome, Info, StartOptions, StatusOptions, StopOptions,
};

#[derive(Clone)]
pub struct RegistryService {
    manager: RegistryManager,
}

impl RegistryService {
    pub fn new(docker: Arc<dyn DockerClient>) -> Self {
        Self::from_manager(RegistryManager::new(docker))
    }

    pub fn from_manager(manager: RegistryManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &RegistryManager {
        &self.manager
    }

    /// Create (or adopt) a registry and report it.
    pub fn create(&self, opts: &CreateOptions) -> Result<Info> {
        let config = opts.to_config();
        config.validate()?;
        self.manager.create_registry(&config)?;
        self.status(&StatusOptions {
            name: opts.name.clone(),
        })
    }

    /// Start an existing registry; a missing one is `NotFound`.
    pub fn start(&self, opts: &StartOptions) -> Result<Info> {
        ksail_core::validation::validate_resource_name("registry", &opts.name)?;
        self.manager
            .start_registry(&opts.name, opts.network_name.as_deref())?;
        self.status(&StatusOptions {
            name: opts.name.clone(),
        })
    }

    /// Stop a registry on behalf of a cluster. Stopping a registry that does
    /// not exist does nothing.
    pub fn stop(&self, opts: &StopOptions) -> Result<DeleteOutcome> {
        ksail_core::validation::validate_resource_name("registry", &opts.name)?;
        match self.manager.delete_registry(
            &opts.name,
            opts.cluster_name.as_deref(),
            opts.network_name.as_deref(),
            opts.delete_volume,
        ) {
            Err(RegistryError::NotFound {
                kind: ResourceKind::Registry,
                ..
            }) => {
                debug!("Registry '{}' not found, nothing to stop", opts.name);
                Ok(DeleteOutcome::Absent)
            }
            other => other,
        }
    }

    pub fn status(&self, opts: &StatusOptions) -> Result<Info> {
        Ok(match self.manager.inspect_registry(&opts.name)? {
            Some(details) => Info::from_details(&details),
            None => Info::not_provisioned(&opts.name),
        })
    }

    pub fn list(&self) -> Result<Vec<Info>> {
        self.manager
            .list_registries()?
            .iter()
            .map(|name| self.status(&StatusOptions { name: name.clone() }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeDocker;
    use crate::types::Status;

    fn service() -> (Arc<FakeDocker>, RegistryService) {
        let docker = Arc::new(FakeDocker::new());
        (docker.clone(), RegistryService::new(docker))
    }

    fn local() -> CreateOptions {
        CreateOptions {
            name: "local-registry".into(),
            port: 5000,
            ..Default::default()
        }
    }

    #[test]
    fn create_reports_running_registry() {
        let (_, service) = service();
        let info = service.create(&local()).unwrap();
        assert_eq!(info.status, Status::Running);
        assert_eq!(info.endpoint, "127.0.0.1:5000");
        assert_eq!(info.volume, "local-registry");
        assert!(info.upstream_url.is_none());

        // idempotent
        let again = service.create(&local()).unwrap();
        assert_eq!(again, info);
    }

    #[test]
    fn create_rejects_port_zero() {
        let (docker, service) = service();
        let opts = CreateOptions {
            port: 0,
            ..local()
        };
        assert!(matches!(
            service.create(&opts).unwrap_err(),
            RegistryError::InvalidConfig(_)
        ));
        assert!(docker.calls().is_empty());
    }

    #[test]
    fn status_of_unknown_registry() {
        let (_, service) = service();
        let info = service
            .status(&StatusOptions {
                name: "ghost".into(),
            })
            .unwrap();
        assert_eq!(info.status, Status::NotProvisioned);
    }

    #[test]
    fn start_of_unknown_registry_is_not_found() {
        let (_, service) = service();
        let err = service
            .start(&StartOptions {
                name: "ghost".into(),
                network_name: None,
            })
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn stop_then_status() {
        let (docker, service) = service();
        service.create(&local()).unwrap();

        let outcome = service
            .stop(&StopOptions {
                name: "local-registry".into(),
                delete_volume: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::Removed);
        assert!(docker.volume_names().is_empty());

        let info = service
            .status(&StatusOptions {
                name: "local-registry".into(),
            })
            .unwrap();
        assert_eq!(info.status, Status::NotProvisioned);

        // stopping again is a no-op
        let outcome = service
            .stop(&StopOptions {
                name: "local-registry".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::Absent);
    }

    #[test]
    fn stopped_container_reports_stopped() {
        let (docker, service) = service();
        service.create(&local()).unwrap();
        docker.stop_container("local-registry").unwrap();

        let infos = service.list().unwrap();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].status, Status::Stopped);

        let info = service
            .start(&StartOptions {
                name: "local-registry".into(),
                network_name: None,
            })
            .unwrap();
        assert_eq!(info.status, Status::Running);
    }
}
