//! Validation of names and ports before anything touches Docker.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{KsailError, Result};

static DOCKER_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").expect("static regex should compile")
});

/// Validate a container, volume or cluster name against Docker's naming rules.
///
/// `kind` only names the object for the error message ("registry", "cluster").
pub fn validate_resource_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(KsailError::Validation(format!("{} name cannot be empty", kind)));
    }
    if name.len() > 128 {
        return Err(KsailError::Validation(format!(
            "{} name '{}' is longer than 128 characters",
            kind, name
        )));
    }
    if !DOCKER_NAME.is_match(name) {
        return Err(KsailError::Validation(format!(
            "{} name '{}' may only contain letters, digits, '_', '.' and '-' and must start with a letter or digit",
            kind, name
        )));
    }
    Ok(())
}

/// Host ports must be in 1..=65535.
pub fn validate_port(port: u16) -> Result<()> {
    if port == 0 {
        return Err(KsailError::Validation(
            "port must be between 1 and 65535".to_string(),
        ));
    }
    Ok(())
}

/// Upstream URLs for pull-through registries must be http(s).
pub fn validate_upstream_url(url: &str) -> Result<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| {
            KsailError::Validation(format!(
                "upstream URL '{}' must start with http:// or https://",
                url
            ))
        })?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(KsailError::Validation(format!(
            "upstream URL '{}' has no host",
            url
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_docker_style_names() {
        for name in ["local-registry", "kind-docker-io", "k3d_mirror.1", "r"] {
            assert!(validate_resource_name("registry", name).is_ok(), "{}", name);
        }
    }

    #[test]
    fn rejects_bad_names() {
        assert!(validate_resource_name("registry", "").is_err());
        assert!(validate_resource_name("registry", "  ").is_err());
        assert!(validate_resource_name("registry", "-leading").is_err());
        assert!(validate_resource_name("registry", "has space").is_err());
        assert!(validate_resource_name("registry", "docker.io/library").is_err());
        assert!(validate_resource_name("registry", &"a".repeat(129)).is_err());
    }

    #[test]
    fn name_errors_mention_the_kind() {
        let err = validate_resource_name("cluster", "").unwrap_err();
        assert_eq!(err.to_string(), "Validation error: cluster name cannot be empty");
    }

    #[test]
    fn port_range() {
        assert!(validate_port(0).is_err());
        assert!(validate_port(1).is_ok());
        assert!(validate_port(65535).is_ok());
    }

    #[test]
    fn upstream_urls() {
        assert!(validate_upstream_url("https://registry-1.docker.io").is_ok());
        assert!(validate_upstream_url("http://localhost:5000").is_ok());
        assert!(validate_upstream_url("registry-1.docker.io").is_err());
        assert!(validate_upstream_url("https://").is_err());
        assert!(validate_upstream_url("ftp://example.com").is_err());
    }
}
