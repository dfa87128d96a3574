use std::path::{Path, PathBuf};

use docker_compose_types::{Compose, Ports, PublishedPort};

use crate::defaults::DatabaseSchema;
use crate::error::OrodcResult;

/// Base compose file and its default override, always first.
pub const BASE_FILES: [&str; 2] = ["docker-compose.yml", "docker-compose-default.yml"];

/// Engine-specific override file name.
#[must_use]
pub fn schema_file(schema: DatabaseSchema) -> String {
    format!("docker-compose-{}.yml", schema.as_str())
}

/// Ordered compose file set. Later files override earlier ones, so
/// the schema-specific override always comes last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeFiles {
    files: Vec<PathBuf>,
}

impl ComposeFiles {
    #[must_use]
    pub fn new(config_dir: &Path, schema: DatabaseSchema) -> Self {
        let mut files: Vec<PathBuf> = BASE_FILES.iter().map(|f| config_dir.join(f)).collect();
        files.push(config_dir.join(schema_file(schema)));
        Self { files }
    }

    #[must_use]
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// `-f <file>` pairs, in order.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        self.files
            .iter()
            .flat_map(|f| ["-f".to_string(), f.display().to_string()])
            .collect()
    }

    /// Full `docker` argument list: `compose -f ... <extra>`.
    #[must_use]
    pub fn command<S: AsRef<str>>(&self, extra: &[S]) -> Vec<String> {
        let mut args = vec!["compose".to_string()];
        args.extend(self.args());
        args.extend(extra.iter().map(|a| a.as_ref().to_string()));
        args
    }
}

/// Host ports published by services in a compose file, skipping
/// `exclude_service`. Port ranges are ignored.
pub fn published_ports(path: &Path, exclude_service: Option<&str>) -> OrodcResult<Vec<u16>> {
    let content = std::fs::read_to_string(path)?;
    let compose: Compose = serde_yaml::from_str(&content)?;

    let mut ports = Vec::new();
    for (name, service) in &compose.services.0 {
        if Some(name.as_str()) == exclude_service {
            continue;
        }
        let Some(service) = service else { continue };
        match &service.ports {
            Ports::Short(entries) => {
                ports.extend(entries.iter().filter_map(|p| short_host_port(p)));
            }
            Ports::Long(entries) => {
                ports.extend(entries.iter().filter_map(|p| match &p.published {
                    Some(PublishedPort::Single(port)) => Some(*port),
                    _ => None,
                }));
            }
        }
    }
    ports.sort_unstable();
    ports.dedup();
    Ok(ports)
}

/// Host side of a short port mapping such as `8080:80`,
/// `127.0.0.1:8080:80/tcp`. A bare container port has no host port.
#[must_use]
pub fn short_host_port(mapping: &str) -> Option<u16> {
    let mapping = mapping.split('/').next()?;
    let parts: Vec<&str> = mapping.split(':').collect();
    if parts.len() < 2 {
        return None;
    }
    parts[parts.len() - 2].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_port_forms() {
        assert_eq!(short_host_port("8080:80"), Some(8080));
        assert_eq!(short_host_port("127.0.0.1:8443:443/tcp"), Some(8443));
        assert_eq!(short_host_port("80"), None);
        assert_eq!(short_host_port("8000-8010:8000-8010"), None);
    }
}
