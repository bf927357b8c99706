//! Registry HTTP API v2 probes.

use std::time::Duration;

use serde::Deserialize;
use tokio::time::{sleep, Instant};
use tracing::debug;

use crate::error::{RegistryError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

fn client(endpoint: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|source| RegistryError::Http {
            endpoint: endpoint.to_string(),
            source,
        })
}

fn base_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

/// True when `GET /v2/` answers 200, or 401 for registries behind auth.
pub async fn check_registry_running(endpoint: &str) -> bool {
    let Ok(client) = client(endpoint) else {
        return false;
    };
    match client.get(format!("{}/v2/", base_url(endpoint))).send().await {
        Ok(response) => {
            let status = response.status();
            status.is_success() || status == reqwest::StatusCode::UNAUTHORIZED
        }
        Err(e) => {
            debug!("Registry at {} not reachable: {}", endpoint, e);
            false
        }
    }
}

/// Poll until the registry answers or `timeout` passes.
pub async fn wait_for_registry_ready(endpoint: &str, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if check_registry_running(endpoint).await {
            return Ok(());
        }
        if Instant::now() + POLL_INTERVAL > deadline {
            return Err(RegistryError::NotReady {
                endpoint: endpoint.to_string(),
                seconds: timeout.as_secs(),
            });
        }
        sleep(POLL_INTERVAL).await;
    }
}

#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(default)]
    repositories: Vec<String>,
}

/// Repositories stored in the registry, from `GET /v2/_catalog`.
pub async fn list_catalog(endpoint: &str) -> Result<Vec<String>> {
    let http_error = |source: reqwest::Error| RegistryError::Http {
        endpoint: endpoint.to_string(),
        source,
    };
    let catalog: Catalog = client(endpoint)?
        .get(format!("{}/v2/_catalog", base_url(endpoint)))
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(http_error)?
        .json()
        .await
        .map_err(http_error)?;

    let mut repositories = catalog.repositories;
    repositories.sort();
    Ok(repositories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve `responses` in order, one per connection, and return the
    /// `host:port` to reach them on.
    fn serve(responses: Vec<(&'static str, &'static str)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        thread::spawn(move || {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut buf = [0u8; 2048];
                let _ = stream.read(&mut buf);
                let reply = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(reply.as_bytes());
            }
        });
        addr
    }

    #[test]
    fn base_url_adds_scheme() {
        assert_eq!(base_url("localhost:5000"), "http://localhost:5000");
        assert_eq!(base_url("https://r.example/"), "https://r.example");
    }

    #[tokio::test]
    async fn ok_and_unauthorized_count_as_running() {
        let addr = serve(vec![("200 OK", "{}"), ("401 Unauthorized", "")]);
        assert!(check_registry_running(&addr).await);
        assert!(check_registry_running(&addr).await);
    }

    #[tokio::test]
    async fn server_error_is_not_running() {
        let addr = serve(vec![("503 Service Unavailable", "")]);
        assert!(!check_registry_running(&addr).await);
    }

    #[tokio::test]
    async fn wait_gives_up_after_timeout() {
        // nothing listens on a freshly released port
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().to_string()
        };
        let err = wait_for_registry_ready(&addr, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::NotReady { seconds: 1, .. }));
    }

    #[tokio::test]
    async fn catalog_is_sorted() {
        let addr = serve(vec![(
            "200 OK",
            r#"{"repositories":["library/nginx","app","library/alpine"]}"#,
        )]);
        assert_eq!(
            list_catalog(&addr).await.unwrap(),
            vec!["app", "library/alpine", "library/nginx"]
        );
    }
}
