use std::fmt::{self, Display, Formatter};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum KsailError {
    Config(String),
    Validation(String),
    Command(String),
    Dependency(String),
    Io(#[from] std::io::Error),
    Serialization(String),
    Timeout(String),
    DockerNotRunning,
    DockerPermission,
    Other(#[from] anyhow::Error),
}

impl Display for KsailError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            KsailError::Config(s) => write!(f, "Configuration error: {}", s),
            KsailError::Validation(s) => write!(f, "Validation error: {}", s),
            KsailError::Command(s) => write!(f, "Command failed: {}", s),
            KsailError::Dependency(s) => write!(f, "Dependency not found: {}", s),
            KsailError::Io(e) => write!(f, "I/O error: {}", e),
            KsailError::Serialization(s) => write!(f, "Serialization error: {}", s),
            KsailError::Timeout(s) => write!(f, "Timed out: {}", s),
            KsailError::DockerNotRunning => {
                writeln!(f, "Docker daemon is not running\n")?;
                writeln!(f, "Fix:")?;
                writeln!(f, "  • Start Docker Desktop, or")?;
                writeln!(f, "  • Run: sudo systemctl start docker")?;
                write!(f, "  • Verify: docker ps")
            }
            KsailError::DockerPermission => {
                writeln!(f, "Permission denied accessing Docker\n")?;
                writeln!(f, "Fix:")?;
                writeln!(f, "  • Add user to docker group: sudo usermod -aG docker $USER")?;
                write!(f, "  • Log out and back in")
            }
            KsailError::Other(e) => write!(f, "{:#}", e),
        }
    }
}

impl KsailError {
    /// Classify a failed `docker` invocation by its stderr.
    pub fn from_docker_stderr(command: &str, stderr: &str) -> Self {
        let lowered = stderr.to_lowercase();
        if lowered.contains("cannot connect to the docker daemon")
            || lowered.contains("is the docker daemon running")
        {
            KsailError::DockerNotRunning
        } else if lowered.contains("permission denied") && lowered.contains("docker.sock") {
            KsailError::DockerPermission
        } else {
            KsailError::Command(format!("{}: {}", command, stderr.trim()))
        }
    }
}

impl From<serde_yaml_ng::Error> for KsailError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        KsailError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for KsailError {
    fn from(err: serde_json::Error) -> Self {
        KsailError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KsailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn docker_daemon_errors_are_classified() {
        let err = KsailError::from_docker_stderr(
            "docker ps",
            "Cannot connect to the Docker daemon at unix:///var/run/docker.sock. Is the docker daemon running?",
        );
        assert!(matches!(err, KsailError::DockerNotRunning));

        let err = KsailError::from_docker_stderr(
            "docker ps",
            "permission denied while trying to connect to the Docker daemon socket at unix:///var/run/docker.sock",
        );
        assert!(matches!(err, KsailError::DockerPermission));
    }

    #[test]
    fn other_docker_errors_keep_the_command() {
        let err = KsailError::from_docker_stderr("docker volume rm x", "volume is in use\n");
        assert_eq!(
            err.to_string(),
            "Command failed: docker volume rm x: volume is in use"
        );
    }
}
