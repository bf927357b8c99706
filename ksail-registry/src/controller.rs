//! Batch provisioning for a cluster's registries.
//!
//! A batch is all-or-nothing: when one registry fails, the ones this batch
//! created are removed again, newest first. Registries that existed before
//! the batch are left alone.

use std::collections::BTreeSet;

use tracing::{info, info_span, warn};

use crate::error::{RegistryError, Result};
use crate::manager::RegistryManager;
use crate::types::{CreateOutcome, DeleteOutcome, Info, RegistryConfig};

/// One registry of a successful batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionedRegistry {
    pub config: RegistryConfig,
    pub info: Info,
    /// False when the registry already existed before the batch.
    pub created: bool,
    /// True when the batch also created the data volume.
    pub volume_created: bool,
}

/// Outcome of stopping a batch. Failures do not stop the remaining
/// registries from being processed.
#[derive(Debug, Default)]
pub struct TeardownReport {
    pub outcomes: Vec<(String, DeleteOutcome)>,
    pub failures: Vec<(String, RegistryError)>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn removed(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == DeleteOutcome::Removed)
            .map(|(name, _)| name.as_str())
    }
}

/// A registry that wants a host port; `pinned` ports are kept as they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRequest {
    pub name: String,
    pub pinned: Option<u16>,
}

#[derive(Clone)]
pub struct RegistryController {
    manager: RegistryManager,
}

impl RegistryController {
    pub fn new(manager: RegistryManager) -> Self {
        Self { manager }
    }

    pub fn manager(&self) -> &RegistryManager {
        &self.manager
    }

    /// Create every registry in order, rolling the batch back on failure.
    pub fn provision(&self, configs: &[RegistryConfig]) -> Result<Vec<ProvisionedRegistry>> {
        let _span = info_span!("provision", count = configs.len()).entered();
        let mut provisioned: Vec<ProvisionedRegistry> = Vec::with_capacity(configs.len());

        for config in configs {
            let result = self.manager.create_registry(config).and_then(|outcome| {
                let volume_created = matches!(
                    outcome,
                    CreateOutcome::Created {
                        volume_created: true
                    }
                );
                // rollback must cover it even if the inspect below fails
                provisioned.push(ProvisionedRegistry {
                    config: config.clone(),
                    info: Info::not_provisioned(&config.name),
                    created: outcome.is_created(),
                    volume_created,
                });
                let info = self
                    .manager
                    .inspect_registry(&config.name)?
                    .map(|details| Info::from_details(&details))
                    .unwrap_or_else(|| Info::not_provisioned(&config.name));
                if let Some(registry) = provisioned.last_mut() {
                    registry.info = info;
                }
                Ok(())
            });

            if let Err(err) = result {
                warn!(
                    "Provisioning '{}' failed, rolling back {} registries",
                    config.name,
                    provisioned.iter().filter(|r| r.created).count()
                );
                self.remove_created(&provisioned);
                return Err(RegistryError::Batch {
                    name: config.name.clone(),
                    source: Box::new(err),
                });
            }
        }

        info!("Provisioned {} registries", provisioned.len());
        Ok(provisioned)
    }

    /// Remove the registries a batch created, newest first, along with the
    /// volumes it created. Reused volumes are kept. Failures are logged and
    /// skipped.
    pub fn remove_created(&self, provisioned: &[ProvisionedRegistry]) {
        for registry in provisioned.iter().rev().filter(|r| r.created) {
            let name = &registry.config.name;
            match self
                .manager
                .remove_registry(name, registry.volume_created)
            {
                Ok(()) => info!("Rolled back registry '{}'", name),
                Err(e) => warn!(
                    "{}",
                    ksail_core::messages::msg!(
                        ksail_core::messages::MESSAGES.registry_rollback_warning,
                        name = name,
                        error = e
                    )
                ),
            }
        }
    }

    /// Stop each registry on behalf of `cluster`, detaching it from
    /// `network`. Registries still used by other clusters are kept.
    pub fn teardown(
        &self,
        names: &[String],
        cluster: Option<&str>,
        network: Option<&str>,
        delete_volumes: bool,
    ) -> TeardownReport {
        let _span = info_span!("teardown", cluster = cluster.unwrap_or("-")).entered();
        let mut report = TeardownReport::default();

        for name in names {
            match self
                .manager
                .delete_registry(name, cluster, network, delete_volumes)
            {
                Ok(outcome) => report.outcomes.push((name.clone(), outcome)),
                Err(e) if e.is_not_found() => {
                    report.outcomes.push((name.clone(), DeleteOutcome::Absent))
                }
                Err(e) => {
                    warn!("Failed to stop registry '{}': {}", name, e);
                    report.failures.push((name.clone(), e));
                }
            }
        }
        report
    }

    /// Assign a host port to every request: existing registries keep the
    /// port they are bound to, pinned requests get their pin, and the rest
    /// get the next free port from `start` upwards.
    pub fn resolve_ports(&self, requests: &[PortRequest], start: u16) -> Result<Vec<u16>> {
        let mut taken = BTreeSet::new();
        for name in self.manager.list_registries()? {
            if let Some(port) = self
                .manager
                .inspect_registry(&name)?
                .and_then(|details| details.port)
            {
                taken.insert(port);
            }
        }
        let pinned: BTreeSet<u16> = requests.iter().filter_map(|r| r.pinned).collect();

        let mut ports = Vec::with_capacity(requests.len());
        for request in requests {
            let existing = self
                .manager
                .inspect_registry(&request.name)?
                .and_then(|details| details.port);
            let port = match (existing, request.pinned) {
                (Some(port), _) => port,
                (None, Some(port)) => port,
                (None, None) => {
                    let port = next_free_port(start, &taken, &pinned).ok_or_else(|| {
                        RegistryError::InvalidConfig(format!(
                            "no free port left for registry '{}'",
                            request.name
                        ))
                    })?;
                    taken.insert(port);
                    port
                }
            };
            ports.push(port);
        }
        Ok(ports)
    }
}

/// Lowest port `>= start` that is neither taken nor pinned.
pub fn next_free_port(start: u16, taken: &BTreeSet<u16>, pinned: &BTreeSet<u16>) -> Option<u16> {
    (start..=u16::MAX).find(|port| !taken.contains(port) && !pinned.contains(port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeDocker;
    use crate::MIRROR_PORT_START;
    use std::sync::Arc;

    fn controller() -> (Arc<FakeDocker>, RegistryController) {
        let docker = Arc::new(FakeDocker::new());
        let manager = RegistryManager::new(docker.clone());
        (docker, RegistryController::new(manager))
    }

    fn batch() -> Vec<RegistryConfig> {
        vec![
            RegistryConfig::new("local-registry", 5000),
            RegistryConfig::new("kind-docker-io", 5001)
                .with_upstream("https://registry-1.docker.io"),
            RegistryConfig::new("kind-ghcr-io", 5002).with_upstream("https://ghcr.io"),
        ]
    }

    #[test]
    fn provisions_in_order() {
        let (docker, controller) = controller();
        let result = controller.provision(&batch()).unwrap();

        assert_eq!(result.len(), 3);
        assert!(result.iter().all(|r| r.created));
        assert_eq!(result[1].info.port, 5001);
        assert_eq!(docker.container_names().len(), 3);
    }

    #[test]
    fn failure_rolls_back_in_reverse_and_keeps_preexisting() {
        let (docker, controller) = controller();
        // local-registry exists before the batch
        controller.provision(&batch()[..1]).unwrap();
        docker.fail_on("start_container", "kind-ghcr-io");
        docker.clear_calls();

        let err = controller.provision(&batch()).unwrap_err();
        match &err {
            RegistryError::Batch { name, .. } => assert_eq!(name, "kind-ghcr-io"),
            other => panic!("unexpected error: {other}"),
        }

        assert_eq!(docker.container_names(), vec!["local-registry".to_string()]);
        assert_eq!(docker.volume_names(), vec!["local-registry".to_string()]);

        let removals: Vec<String> = docker
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("remove_container"))
            .collect();
        // the failed container itself first, then the batch in reverse
        assert_eq!(removals.len(), 2);
        assert!(!removals.iter().any(|c| c.contains("local-registry")));
    }

    #[test]
    fn rollback_order_is_newest_first() {
        let (docker, controller) = controller();
        let mut configs = batch();
        configs.push(RegistryConfig::new("kind-quay-io", 5003));
        docker.fail_on("create_container", "kind-quay-io");

        controller.provision(&configs).unwrap_err();

        let volume_removals: Vec<String> = docker
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("remove_volume"))
            .collect();
        assert_eq!(
            volume_removals,
            vec![
                "remove_volume kind-quay-io",
                "remove_volume kind-ghcr-io",
                "remove_volume kind-docker-io",
                "remove_volume local-registry",
            ]
        );
        assert!(docker.container_names().is_empty());
    }

    #[test]
    fn rollback_keeps_reused_volume() {
        let (docker, controller) = controller();
        // cache left behind by an earlier cluster
        docker.add_volume("kind-docker-io");
        docker.fail_on("start_container", "kind-ghcr-io");

        controller.provision(&batch()[1..]).unwrap_err();

        assert!(docker.container_names().is_empty());
        assert_eq!(docker.volume_names(), vec!["kind-docker-io".to_string()]);
    }

    #[test]
    fn failed_inspect_rolls_back_the_new_registry() {
        let (docker, controller) = controller();
        docker.fail_once("inspect_container", "kind-ghcr-io");

        let err = controller.provision(&batch()).unwrap_err();
        match &err {
            RegistryError::Batch { name, .. } => assert_eq!(name, "kind-ghcr-io"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(docker.container_names().is_empty());
        assert!(docker.volume_names().is_empty());
    }

    #[test]
    fn rollback_failures_do_not_mask_the_original_error() {
        let (docker, controller) = controller();
        docker.fail_on("create_container", "kind-ghcr-io");
        docker.fail_on("remove_container", "kind-docker-io");

        let err = controller.provision(&batch()).unwrap_err();
        assert!(err.to_string().contains("kind-ghcr-io"));
        assert_eq!(docker.container_names(), vec!["kind-docker-io".to_string()]);
    }

    #[test]
    fn teardown_reports_each_registry() {
        let (docker, controller) = controller();
        docker.add_network("kind");
        let configs: Vec<RegistryConfig> = batch()
            .into_iter()
            .map(|c| c.with_network("kind"))
            .collect();
        controller.provision(&configs).unwrap();
        docker.attach("kind-ghcr-io", "k3d-other");

        let names = vec![
            "local-registry".to_string(),
            "kind-ghcr-io".to_string(),
            "missing".to_string(),
        ];
        let report = controller.teardown(&names, Some("dev"), Some("kind"), false);
        assert!(report.is_clean());
        assert_eq!(
            report.outcomes,
            vec![
                ("local-registry".to_string(), DeleteOutcome::Removed),
                ("kind-ghcr-io".to_string(), DeleteOutcome::StillInUse),
                ("missing".to_string(), DeleteOutcome::Absent),
            ]
        );
        assert_eq!(report.removed().collect::<Vec<_>>(), vec!["local-registry"]);
    }

    #[test]
    fn free_port_search() {
        let taken: BTreeSet<u16> = [5001, 5002].into_iter().collect();
        let pinned: BTreeSet<u16> = [5003].into_iter().collect();
        assert_eq!(next_free_port(5001, &taken, &pinned), Some(5004));
        assert_eq!(next_free_port(5001, &BTreeSet::new(), &BTreeSet::new()), Some(5001));
        let full: BTreeSet<u16> = [u16::MAX].into_iter().collect();
        assert_eq!(next_free_port(u16::MAX, &full, &BTreeSet::new()), None);
    }

    #[test]
    fn resolve_ports_respects_existing_and_pinned() {
        let (_, controller) = controller();
        controller
            .provision(&[RegistryConfig::new("kind-docker-io", 5001)])
            .unwrap();

        let requests = vec![
            PortRequest {
                name: "kind-ghcr-io".into(),
                pinned: None,
            },
            PortRequest {
                name: "kind-docker-io".into(),
                pinned: None,
            },
            PortRequest {
                name: "kind-quay-io".into(),
                pinned: Some(5002),
            },
            PortRequest {
                name: "kind-gcr-io".into(),
                pinned: None,
            },
        ];
        let ports = controller
            .resolve_ports(&requests, MIRROR_PORT_START)
            .unwrap();
        assert_eq!(ports, vec![5003, 5001, 5002, 5004]);
    }
}
