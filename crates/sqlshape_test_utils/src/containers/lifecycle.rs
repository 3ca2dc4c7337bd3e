//! Container lifecycle management: start, stop, readiness.

use crate::config::DbVersion;
use anyhow::{bail, Context, Result};
use sqlshape_db::{MssqlSession, SqlSession};
use std::path::PathBuf;
use std::process::{Command, Output};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// SQL Server needs a while to run its first-boot upgrade scripts.
const CONTAINER_STARTUP_TIMEOUT: Duration = Duration::from_secs(120);

const READY_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Get the path to the docker-compose.yml file.
pub fn docker_compose_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("docker")
        .join("docker-compose.yml")
}

/// Check if Docker is available on the system.
pub fn is_docker_available() -> bool {
    Command::new("docker")
        .arg("info")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Run `docker compose` (v2) against the test compose file.
fn compose(args: &[&str]) -> Result<Output> {
    Command::new("docker")
        .args(["compose", "-f"])
        .arg(docker_compose_path())
        .args(args)
        .output()
        .context("Failed to run docker compose")
}

/// Check if the container for `version` is running.
pub fn is_container_running(version: DbVersion) -> bool {
    compose(&["ps", "-q", version.service_name()])
        .map(|out| out.status.success() && !out.stdout.is_empty())
        .unwrap_or(false)
}

/// Start the container for `version`.
pub fn start_container(version: DbVersion) -> Result<()> {
    let service = version.service_name();
    info!(service, "Starting SQL Server container");

    let output = compose(&["up", "-d", service])?;
    if !output.status.success() {
        bail!(
            "Failed to start container {}: {}",
            service,
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(())
}

/// Stop and remove all test containers.
pub fn stop_all_containers() -> Result<()> {
    info!("Stopping all SQL Server test containers");

    let output = compose(&["down", "-v"])?;
    if !output.status.success() {
        bail!(
            "Failed to stop containers: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
    Ok(())
}

/// Block until the server answers `SELECT 1`.
pub fn wait_until_ready(version: DbVersion) -> Result<()> {
    let start = Instant::now();
    info!(%version, port = version.port(), "Waiting for SQL Server");

    loop {
        let attempt = MssqlSession::from_ado_string(&version.connection_string())
            .and_then(|session| session.query_all("SELECT 1 AS ready", &[]));
        match attempt {
            Ok(_) => {
                debug!(%version, elapsed = ?start.elapsed(), "SQL Server is ready");
                return Ok(());
            }
            Err(err) if start.elapsed() > CONTAINER_STARTUP_TIMEOUT => {
                bail!(
                    "Timeout waiting for {} after {:?}: {}",
                    version,
                    CONTAINER_STARTUP_TIMEOUT,
                    err
                );
            }
            Err(err) => debug!(%version, error = %err, "SQL Server not ready yet"),
        }
        sleep(READY_CHECK_INTERVAL);
    }
}

/// Ensure the container for `version` is running and accepting queries.
pub fn ensure_container_running(version: DbVersion) -> Result<()> {
    if !is_docker_available() {
        bail!("Docker is not available. Please install Docker to run these tests.");
    }

    if !is_container_running(version) {
        start_container(version)?;
    }

    wait_until_ready(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docker_compose_path() {
        assert!(docker_compose_path().ends_with("docker/docker-compose.yml"));
        assert!(docker_compose_path().exists());
    }
}
