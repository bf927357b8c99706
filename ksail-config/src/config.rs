//! The `ksail.yaml` model, loading and validation.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::mirror::{default_upstream, MirrorSpec};

/// File name searched for in the working directory.
pub const CONFIG_FILE_NAME: &str = "ksail.yaml";

/// Root of `ksail.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KsailConfig {
    #[serde(default)]
    pub cluster: ClusterSettings,

    #[serde(default)]
    pub registry: RegistrySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterSettings {
    #[serde(default = "default_cluster_name")]
    pub name: String,

    #[serde(default)]
    pub distribution: Distribution,

    /// Kind/K3d config handed to the distribution CLI untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution_config: Option<PathBuf>,
}

fn default_cluster_name() -> String {
    "ksail-default".to_string()
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            name: default_cluster_name(),
            distribution: Distribution::default(),
            distribution_config: None,
        }
    }
}

/// Supported local Kubernetes distributions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    #[default]
    Kind,
    K3d,
}

impl Distribution {
    /// CLI binary that manages clusters of this distribution.
    pub fn binary(self) -> &'static str {
        match self {
            Distribution::Kind => "kind",
            Distribution::K3d => "k3d",
        }
    }

    /// Docker network the distribution attaches cluster nodes to.
    pub fn network_name(self, cluster_name: &str) -> String {
        match self {
            // kind puts every cluster on one shared network
            Distribution::Kind => "kind".to_string(),
            Distribution::K3d => format!("k3d-{}", cluster_name),
        }
    }

    /// Prefix for mirror registry container names.
    pub fn registry_prefix(self) -> &'static str {
        self.binary()
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Distribution::Kind => write!(f, "Kind"),
            Distribution::K3d => write!(f, "K3d"),
        }
    }
}

impl FromStr for Distribution {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "kind" => Ok(Distribution::Kind),
            "k3d" => Ok(Distribution::K3d),
            other => Err(ConfigError::Invalid(format!(
                "unknown distribution '{}' (expected kind or k3d)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySettings {
    #[serde(default)]
    pub local: LocalRegistrySettings,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mirrors: Vec<MirrorSettings>,

    /// Remove registry volumes (cached layers) when the cluster is deleted.
    #[serde(default)]
    pub delete_volumes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalRegistrySettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_local_registry_name")]
    pub name: String,

    #[serde(default = "default_local_registry_port")]
    pub port: u16,
}

fn default_local_registry_name() -> String {
    "local-registry".to_string()
}

fn default_local_registry_port() -> u16 {
    5000
}

impl Default for LocalRegistrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            name: default_local_registry_name(),
            port: default_local_registry_port(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorSettings {
    pub host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,

    /// Host port; allocated automatically when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl MirrorSettings {
    pub fn spec(&self) -> Result<MirrorSpec> {
        match &self.upstream {
            Some(upstream) => MirrorSpec::parse(&format!("{}={}", self.host, upstream)),
            None => MirrorSpec::parse(&self.host),
        }
    }
}

impl From<MirrorSpec> for MirrorSettings {
    fn from(spec: MirrorSpec) -> Self {
        let upstream = if spec.upstream == default_upstream(&spec.host) {
            None
        } else {
            Some(spec.upstream)
        };
        Self {
            host: spec.host,
            upstream,
            port: None,
        }
    }
}

impl KsailConfig {
    /// Load configuration from `explicit`, or from `ksail.yaml` in `dir`.
    ///
    /// Returns the path that was read, or `None` when no file exists and the
    /// defaults are used. An explicit path that does not exist is an error.
    pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<(Self, Option<PathBuf>)> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = dir.join(CONFIG_FILE_NAME);
                if !candidate.exists() {
                    debug!("No {} in {}, using defaults", CONFIG_FILE_NAME, dir.display());
                    return Ok((Self::default(), None));
                }
                candidate
            }
        };

        let config = Self::from_file(&path)?;
        Ok((config, Some(path)))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_yaml_ng::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path, yaml).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Add mirrors from `host=upstream` specs, replacing configured mirrors
    /// for the same host.
    pub fn merge_mirror_specs(&mut self, specs: &[MirrorSpec]) {
        for spec in specs {
            let settings = MirrorSettings::from(spec.clone());
            match self
                .registry
                .mirrors
                .iter_mut()
                .find(|m| m.host == spec.host)
            {
                Some(existing) => {
                    existing.upstream = settings.upstream;
                }
                None => self.registry.mirrors.push(settings),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |e: ksail_core::KsailError| ConfigError::Invalid(e.to_string());

        ksail_core::validation::validate_resource_name("cluster", &self.cluster.name)
            .map_err(invalid)?;

        let mut used_ports: HashMap<u16, String> = HashMap::new();

        let local = &self.registry.local;
        if local.enabled {
            ksail_core::validation::validate_resource_name("registry", &local.name)
                .map_err(invalid)?;
            ksail_core::validation::validate_port(local.port).map_err(invalid)?;
            used_ports.insert(local.port, local.name.clone());
        }

        let prefix = self.cluster.distribution.registry_prefix();
        let mut hosts = HashSet::new();
        // container name -> what claimed it
        let mut containers: HashMap<String, String> = HashMap::new();
        if local.enabled {
            containers.insert(local.name.clone(), "the local registry".to_string());
        }
        for mirror in &self.registry.mirrors {
            let spec = mirror.spec()?;
            if !hosts.insert(mirror.host.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "mirror host '{}' is listed more than once",
                    mirror.host
                )));
            }
            let container = spec.container_name(prefix);
            if let Some(other) =
                containers.insert(container.clone(), format!("mirror '{}'", mirror.host))
            {
                return Err(ConfigError::Invalid(format!(
                    "mirror '{}' would use container '{}', which is already taken by {}",
                    mirror.host, container, other
                )));
            }
            if let Some(port) = mirror.port {
                ksail_core::validation::validate_port(port).map_err(invalid)?;
                if let Some(other) = used_ports.insert(port, mirror.host.clone()) {
                    return Err(ConfigError::Invalid(format!(
                        "port {} is used by both '{}' and '{}'",
                        port, other, mirror.host
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_a_file() {
        let dir = TempDir::new().unwrap();
        let (config, path) = KsailConfig::load(None, dir.path()).unwrap();
        assert!(path.is_none());
        assert_eq!(config.cluster.name, "ksail-default");
        assert_eq!(config.cluster.distribution, Distribution::Kind);
        assert!(!config.registry.local.enabled);
        assert!(config.registry.mirrors.is_empty());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope.yaml");
        let err = KsailConfig::load(Some(&missing), dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn parses_a_full_file() {
        let dir = TempDir::new().unwrap();
        let yaml = r#"
cluster:
  name: dev
  distribution: k3d
  distribution_config: k3d.yaml
registry:
  local:
    enabled: true
    port: 5050
  mirrors:
    - host: docker.io
    - host: ghcr.io
      upstream: https://ghcr.io
      port: 5060
  delete_volumes: true
"#;
        fs::write(dir.path().join(CONFIG_FILE_NAME), yaml).unwrap();

        let (config, path) = KsailConfig::load(None, dir.path()).unwrap();
        assert_eq!(path.unwrap(), dir.path().join(CONFIG_FILE_NAME));
        assert_eq!(config.cluster.name, "dev");
        assert_eq!(config.cluster.distribution, Distribution::K3d);
        assert_eq!(
            config.cluster.distribution_config,
            Some(PathBuf::from("k3d.yaml"))
        );
        assert!(config.registry.local.enabled);
        assert_eq!(config.registry.local.name, "local-registry");
        assert_eq!(config.registry.local.port, 5050);
        assert_eq!(config.registry.mirrors.len(), 2);
        assert_eq!(config.registry.mirrors[1].port, Some(5060));
        assert!(config.registry.delete_volumes);
    }

    #[test]
    fn unknown_distribution_fails_to_parse() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "cluster:\n  distribution: minikube\n").unwrap();
        let err = KsailConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = KsailConfig::default();
        config.cluster.name = "roundtrip".to_string();
        config.registry.local.enabled = true;
        config.merge_mirror_specs(&[MirrorSpec::parse("docker.io").unwrap()]);
        config.save(&path).unwrap();

        let loaded = KsailConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        // default upstreams stay implicit in the written file
        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.contains("registry-1.docker.io"));
    }

    #[test]
    fn merge_replaces_upstream_for_known_hosts() {
        let mut config = KsailConfig::default();
        config.merge_mirror_specs(&[MirrorSpec::parse("ghcr.io").unwrap()]);
        config.merge_mirror_specs(&[MirrorSpec::parse("ghcr.io=https://mirror.example.com").unwrap()]);
        assert_eq!(config.registry.mirrors.len(), 1);
        assert_eq!(
            config.registry.mirrors[0].upstream.as_deref(),
            Some("https://mirror.example.com")
        );
    }

    #[test]
    fn rejects_duplicate_hosts_and_ports() {
        let mut config = KsailConfig::default();
        config.registry.mirrors = vec![
            MirrorSettings {
                host: "docker.io".into(),
                upstream: None,
                port: None,
            },
            MirrorSettings {
                host: "docker.io".into(),
                upstream: None,
                port: None,
            },
        ];
        assert!(config.validate().is_err());

        let mut config = KsailConfig::default();
        config.registry.local.enabled = true;
        config.registry.mirrors = vec![MirrorSettings {
            host: "docker.io".into(),
            upstream: None,
            port: Some(5000),
        }];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("port 5000"));
    }

    #[test]
    fn rejects_mirrors_sharing_a_container_name() {
        let mirror = |host: &str, upstream: &str| MirrorSettings {
            host: host.into(),
            upstream: Some(upstream.into()),
            port: None,
        };

        let mut config = KsailConfig::default();
        config.registry.mirrors = vec![
            mirror("my.registry", "https://a.example"),
            mirror("my-registry", "https://b.example"),
        ];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("kind-my-registry"));

        config.registry.mirrors = vec![
            mirror("docker.io", "https://registry-1.docker.io"),
            mirror("Docker.IO", "https://registry-1.docker.io"),
        ];
        assert!(config.validate().is_err());

        // a mirror cannot take over the local registry's container
        let mut config = KsailConfig::default();
        config.registry.local.enabled = true;
        config.registry.local.name = "kind-ghcr-io".into();
        config.registry.mirrors = vec![mirror("ghcr.io", "https://ghcr.io")];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("local registry"));
    }

    #[test]
    fn rejects_invalid_cluster_name() {
        let mut config = KsailConfig::default();
        config.cluster.name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn distribution_networks() {
        assert_eq!(Distribution::Kind.network_name("a"), "kind");
        assert_eq!(Distribution::K3d.network_name("a"), "k3d-a");
        assert_eq!("K3D".parse::<Distribution>().unwrap(), Distribution::K3d);
        assert!("minikube".parse::<Distribution>().is_err());
    }
}
