//! `host=upstream` mirror registry specs.

use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, Result};

const DOCKER_HUB_HOST: &str = "docker.io";
const DOCKER_HUB_UPSTREAM: &str = "https://registry-1.docker.io";

/// One pull-through mirror: the registry host images are requested from and
/// the upstream URL the mirror proxies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSpec {
    pub host: String,
    pub upstream: String,
}

impl MirrorSpec {
    /// Parse `host=upstream` or a bare `host`.
    ///
    /// A bare host proxies to `https://<host>`, except `docker.io` whose API
    /// lives at `registry-1.docker.io`.
    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = |reason: &str| ConfigError::InvalidMirror {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let (host, upstream) = match spec.split_once('=') {
            Some((host, upstream)) => (host.trim(), Some(upstream.trim())),
            None => (spec.trim(), None),
        };

        if host.is_empty() {
            return Err(invalid("host is empty"));
        }
        if host.contains("://") || host.contains('/') {
            return Err(invalid("host must be a registry host such as docker.io or ghcr.io"));
        }

        let upstream = match upstream {
            Some("") => return Err(invalid("upstream is empty")),
            Some(url) => {
                ksail_core::validation::validate_upstream_url(url)
                    .map_err(|e| invalid(&e.to_string()))?;
                url.trim_end_matches('/').to_string()
            }
            None => default_upstream(host),
        };

        Ok(Self {
            host: host.to_string(),
            upstream,
        })
    }

    /// Container name for this mirror, e.g. `kind-docker-io`.
    pub fn container_name(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, sanitize_host(&self.host))
    }
}

impl FromStr for MirrorSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for MirrorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.host, self.upstream)
    }
}

pub fn default_upstream(host: &str) -> String {
    if host == DOCKER_HUB_HOST {
        DOCKER_HUB_UPSTREAM.to_string()
    } else {
        format!("https://{}", host)
    }
}

fn sanitize_host(host: &str) -> String {
    host.chars()
        .map(|c| match c {
            '.' | ':' | '/' | '_' => '-',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}
