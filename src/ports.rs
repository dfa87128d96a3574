//! Free host port selection for published compose services.
//!
//! A port is taken when another service of the compose file publishes
//! it, when a container of another project or service publishes it, or
//! when it cannot be bound locally.

use std::collections::BTreeSet;
use std::net::TcpListener;
use std::path::Path;

use tracing::{debug, warn};

use crate::cmd::Runner;
use crate::compose;
use crate::error::OrodcResult;

/// `docker ps` template: compose project, compose service, ports.
pub const PS_FORMAT: &str =
    "{{.Label \"com.docker.compose.project\"}}|{{.Label \"com.docker.compose.service\"}}|{{.Ports}}";

/// Compose files looked up in the compose directory, first match wins.
const COMPOSE_FILE_NAMES: [&str; 2] = ["compose.yml", "docker-compose.yml"];

/// One line of [`PS_FORMAT`] output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerPorts {
    pub project: String,
    pub service: String,
    pub host_ports: Vec<u16>,
}

impl ContainerPorts {
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.splitn(3, '|');
        let project = parts.next()?.trim().to_string();
        let service = parts.next()?.trim().to_string();
        let host_ports = host_ports(parts.next()?);
        Some(Self {
            project,
            service,
            host_ports,
        })
    }
}

/// Host ports in a docker `Ports` column such as
/// `0.0.0.0:8080->80/tcp, :::8080->80/tcp`.
#[must_use]
pub fn host_ports(column: &str) -> Vec<u16> {
    let mut ports: Vec<u16> = column
        .split(',')
        .filter_map(|mapping| {
            let (host, _) = mapping.trim().split_once("->")?;
            host.rsplit(':').next()?.parse().ok()
        })
        .collect();
    ports.sort_unstable();
    ports.dedup();
    ports
}

/// Host ports published by containers other than `project`/`service`.
pub fn docker_used_ports(
    runner: &dyn Runner,
    docker: &str,
    project: &str,
    service: &str,
) -> OrodcResult<BTreeSet<u16>> {
    let output = runner.capture(docker, &["ps", "-a", "--format", PS_FORMAT])?;
    Ok(output
        .lines()
        .filter_map(ContainerPorts::parse)
        .filter(|c| !(c.project == project && c.service == service))
        .flat_map(|c| c.host_ports)
        .collect())
}

/// Host ports published by other services of the compose file in
/// `compose_dir`. A missing or unreadable file contributes nothing.
#[must_use]
pub fn compose_used_ports(compose_dir: &Path, service: &str) -> BTreeSet<u16> {
    let Some(file) = COMPOSE_FILE_NAMES
        .iter()
        .map(|name| compose_dir.join(name))
        .find(|path| path.is_file())
    else {
        debug!(dir = %compose_dir.display(), "no compose file");
        return BTreeSet::new();
    };

    match compose::published_ports(&file, Some(service)) {
        Ok(ports) => ports.into_iter().collect(),
        Err(e) => {
            warn!(file = %file.display(), error = %e, "cannot read compose ports");
            BTreeSet::new()
        }
    }
}

/// Whether `port` can be bound on all interfaces right now.
#[must_use]
pub fn is_bindable(port: u16) -> bool {
    TcpListener::bind(("0.0.0.0", port)).is_ok()
}

/// First port from `start` upwards that is neither in `used` nor
/// rejected by `bindable`.
pub fn find_free_port<F>(start: u16, used: &BTreeSet<u16>, bindable: F) -> Option<u16>
where
    F: Fn(u16) -> bool,
{
    (start..=u16::MAX).find(|port| !used.contains(port) && bindable(*port))
}
