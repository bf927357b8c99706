#[cfg(feature = "integration")]
use std::sync::Arc;
#[cfg(feature = "integration")]
use std::time::Duration;

#[cfg(feature = "integration")]
use ksail_registry::{
    check_registry_running, wait_for_registry_ready, CreateOptions, DeleteOutcome, DockerCli,
    RegistryService, Status, StatusOptions, StopOptions,
};

#[cfg(feature = "integration")]
fn is_docker_available() -> bool {
    std::process::Command::new("docker")
        .arg("version")
        .output()
        .is_ok_and(|output| output.status.success())
}

#[tokio::test]
#[cfg(feature = "integration")]
async fn test_registry_lifecycle_integration() {
    if !is_docker_available() {
        println!("Skipping test: Docker is not available.");
        return;
    }

    let service = RegistryService::new(Arc::new(DockerCli::new()));
    let name = "ksail-it-registry";
    let stop = StopOptions {
        name: name.to_string(),
        delete_volume: true,
        ..Default::default()
    };

    // Clean slate; absent registries are fine
    service.stop(&stop).expect("initial cleanup");

    let info = service
        .create(&CreateOptions {
            name: name.to_string(),
            port: 5099,
            ..Default::default()
        })
        .expect("Failed to create registry");
    assert_eq!(info.status, Status::Running);
    assert_eq!(info.endpoint, "127.0.0.1:5099");

    wait_for_registry_ready(&info.endpoint, Duration::from_secs(30))
        .await
        .expect("Registry did not become ready");

    // Second create adopts the running registry
    let again = service
        .create(&CreateOptions {
            name: name.to_string(),
            port: 5099,
            ..Default::default()
        })
        .expect("Second create failed");
    assert_eq!(again.endpoint, info.endpoint);

    assert_eq!(service.stop(&stop).unwrap(), DeleteOutcome::Removed);
    assert!(!check_registry_running(&info.endpoint).await);

    let status = service
        .status(&StatusOptions {
            name: name.to_string(),
        })
        .unwrap();
    assert_eq!(status.status, Status::NotProvisioned);
}
