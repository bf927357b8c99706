//! Cluster-side mirror configuration.
//!
//! Kind nodes read containerd `hosts.toml` files from a directory mounted
//! into every node; K3d takes a `registries.yaml` at cluster creation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Serialize;
use tera::{Context as TeraContext, Tera};
use tracing::debug;

use crate::error::{RegistryError, Result};
use crate::types::MirrorEndpoint;

/// Where containerd looks for per-registry host configuration in a node.
pub const CONTAINERD_CERTS_DIR: &str = "/etc/containerd/certs.d";

const HOSTS_TOML: &str = "hosts.toml";
const KIND_CLUSTER: &str = "kind-cluster.yaml";
const K3D_REGISTRIES: &str = "registries.yaml";

static TEMPLATES: OnceLock<Tera> = OnceLock::new();

fn templates() -> &'static Tera {
    TEMPLATES.get_or_init(|| {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (HOSTS_TOML, include_str!("templates/hosts.toml.j2")),
            (KIND_CLUSTER, include_str!("templates/kind-cluster.yaml.j2")),
            (K3D_REGISTRIES, include_str!("templates/k3d-registries.yaml.j2")),
        ])
        .expect("Failed to add mirror templates");
        tera
    })
}

fn render(name: &str, context: &TeraContext) -> Result<String> {
    templates()
        .render(name, context)
        .map_err(|source| RegistryError::Render {
            what: name.to_string(),
            source,
        })
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RegistryError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, contents).map_err(|source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("Wrote {}", path.display());
    Ok(())
}

#[derive(Serialize)]
struct MirrorView<'a> {
    host: &'a str,
    endpoint: String,
}

pub fn render_kind_hosts_toml(mirror: &MirrorEndpoint) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("upstream", &mirror.upstream);
    context.insert("endpoint", &mirror.url());
    render(HOSTS_TOML, &context)
}

/// Write `<dir>/<host>/hosts.toml` for every mirror and return the files.
pub fn write_kind_mirror_dir(dir: &Path, mirrors: &[MirrorEndpoint]) -> Result<Vec<PathBuf>> {
    mirrors
        .iter()
        .map(|mirror| {
            let path = dir.join(&mirror.host).join(HOSTS_TOML);
            write_file(&path, &render_kind_hosts_toml(mirror)?)?;
            Ok(path)
        })
        .collect()
}

/// Minimal Kind cluster config that points containerd at `mirrors_dir`.
pub fn render_kind_cluster_config(cluster_name: &str, mirrors_dir: &Path) -> Result<String> {
    let mut context = TeraContext::new();
    context.insert("cluster_name", cluster_name);
    context.insert("mirrors_dir", &mirrors_dir.display().to_string());
    context.insert("certs_dir", CONTAINERD_CERTS_DIR);
    render(KIND_CLUSTER, &context)
}

pub fn render_k3d_registries_yaml(mirrors: &[MirrorEndpoint]) -> Result<String> {
    if mirrors.is_empty() {
        return Ok("mirrors: {}\n".to_string());
    }
    let views: Vec<MirrorView<'_>> = mirrors
        .iter()
        .map(|m| MirrorView {
            host: &m.host,
            endpoint: m.url(),
        })
        .collect();
    let mut context = TeraContext::new();
    context.insert("mirrors", &views);
    render(K3D_REGISTRIES, &context)
}

pub fn write_k3d_registries_yaml(path: &Path, mirrors: &[MirrorEndpoint]) -> Result<()> {
    write_file(path, &render_k3d_registries_yaml(mirrors)?)
}

pub fn write_kind_cluster_config(path: &Path, cluster_name: &str, mirrors_dir: &Path) -> Result<()> {
    write_file(path, &render_kind_cluster_config(cluster_name, mirrors_dir)?)
}
