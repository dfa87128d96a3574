//! Container overview for `orodc status`.

use serde::Deserialize;

use crate::config::Entries;
use crate::defaults::DatabaseSchema;

/// One line of `docker ps --format json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerInfo {
    pub names: String,
    pub status: String,
    pub state: String,
    pub image: String,
    pub ports: String,
}

impl ContainerInfo {
    /// Service part of a `<project>_<service>_...` container name.
    #[must_use]
    pub fn service(&self) -> &str {
        let name = self.names.trim_start_matches('/');
        name.split('_').nth(1).unwrap_or(name)
    }

    #[must_use]
    pub fn health(&self) -> &'static str {
        let status = self.status.to_lowercase();
        if status.contains("unhealthy") {
            "unhealthy"
        } else if status.contains("healthy") {
            "healthy"
        } else if status.contains("starting") {
            "starting"
        } else {
            "-"
        }
    }

    /// Published host ports, comma separated.
    #[must_use]
    pub fn host_ports(&self) -> String {
        let ports = crate::ports::host_ports(&self.ports);
        if ports.is_empty() {
            "-".to_string()
        } else {
            ports
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(",")
        }
    }

    /// Image name without registry, shortened to 30 characters.
    #[must_use]
    pub fn short_image(&self) -> String {
        let image = self.image.rsplit('/').next().unwrap_or(&self.image);
        if image.chars().count() > 30 {
            let head: String = image.chars().take(27).collect();
            format!("{head}...")
        } else {
            image.to_string()
        }
    }
}

/// Parse newline-delimited JSON from `docker ps`. Lines that are not
/// valid container records are skipped.
#[must_use]
pub fn parse_containers(output: &str) -> Vec<ContainerInfo> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .collect()
}

/// `(label, address)` for each service whose host port is known.
#[must_use]
pub fn service_urls(entries: &Entries, domain: &str, schema: DatabaseSchema) -> Vec<(String, String)> {
    let port = |name: &str| entries.get(&format!("DC_ORO_PORT_{name}"));
    let db_port = match schema {
        DatabaseSchema::Pgsql => port("PGSQL"),
        DatabaseSchema::Mysql => port("MYSQL"),
    };

    let mut urls = Vec::new();
    if let Some(p) = port("NGINX") {
        urls.push(("Application".to_string(), format!("https://{domain}")));
        urls.push(("Direct".to_string(), format!("http://localhost:{p}")));
    }
    if let Some(p) = port("MAIL_WEBGUI") {
        urls.push(("Mail".to_string(), format!("http://localhost:{p}")));
    }
    if let Some(p) = port("XHGUI") {
        urls.push(("XHProf".to_string(), format!("http://localhost:{p}")));
    }
    if let Some(p) = db_port {
        urls.push(("Database".to_string(), format!("localhost:{p}")));
    }
    if let Some(p) = port("SEARCH") {
        urls.push(("Search".to_string(), format!("http://localhost:{p}")));
    }
    if let Some(p) = port("SSH") {
        urls.push(("SSH".to_string(), format!("ssh -p {p} developer@localhost")));
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ps_json() {
        let output = r#"{"Names":"shop_nginx_1","State":"running","Status":"Up 2 minutes (healthy)","Image":"nginx:alpine","Ports":"0.0.0.0:30280->80/tcp"}
not json
{"Names":"shop_database_1","State":"exited","Status":"Exited (0)","Image":"postgres:15"}"#;
        let containers = parse_containers(output);

        assert_eq!(containers.len(), 2);
        assert_eq!(containers[0].service(), "nginx");
        assert_eq!(containers[0].health(), "healthy");
        assert_eq!(containers[0].host_ports(), "30280");
        assert_eq!(containers[1].host_ports(), "-");
    }

    #[test]
    fn unhealthy_is_not_healthy() {
        let info = ContainerInfo {
            status: "Up 1 minute (unhealthy)".into(),
            ..ContainerInfo::default()
        };
        assert_eq!(info.health(), "unhealthy");
    }

    #[test]
    fn image_without_registry() {
        let info = ContainerInfo {
            image: "ghcr.io/oroinc/php-fpm:8.3".into(),
            ..ContainerInfo::default()
        };
        assert_eq!(info.short_image(), "php-fpm:8.3");
    }
}
