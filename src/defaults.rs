//! Connection defaulting.
//!
//! For each service the resolution order is: structured entries already
//! present, then fields parsed from the service's raw connection string,
//! then the fixed defaults below. A canonical URI is synthesized when
//! none is set. No non-empty entry is ever overwritten, so running the
//! engine a second time over its own output changes nothing.

use std::fmt;
use std::str::FromStr;

use tracing::{debug, info};

use crate::config::{Entries, MODE, SEARCH_DSN, USER_NAME};
use crate::dsn::{self, Connection, Field, Service, UriOrigin};

/// Database engine family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatabaseSchema {
    #[default]
    Pgsql,
    Mysql,
}

impl DatabaseSchema {
    /// Map a scheme or engine alias to its family.
    #[must_use]
    pub fn from_alias(alias: &str) -> Option<Self> {
        match alias.trim().to_lowercase().as_str() {
            "mysql" | "mariadb" | "pdo_mysql" => Some(Self::Mysql),
            "postgres" | "postgresql" | "pgsql" | "pdo_pgsql" => Some(Self::Pgsql),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pgsql => "pgsql",
            Self::Mysql => "mysql",
        }
    }

    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Pgsql => 5432,
            Self::Mysql => 3306,
        }
    }

    /// Scheme used when synthesizing `ORO_DB_URL`.
    #[must_use]
    pub const fn uri_scheme(self) -> &'static str {
        match self {
            Self::Pgsql => "postgres",
            Self::Mysql => "mysql",
        }
    }
}

impl fmt::Display for DatabaseSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseSchema {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_alias(s).ok_or_else(|| {
            format!("unknown database schema '{s}', expected 'pgsql' or 'mysql'")
        })
    }
}

/// Resolved connections for all services.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Services {
    pub schema: DatabaseSchema,
    pub database: Connection,
    pub search: Connection,
    pub mq: Connection,
    pub redis: Connection,
    /// Search DSN handed to the application; empty for ORM-backed
    /// search.
    pub search_dsn: String,
}

impl Services {
    #[must_use]
    pub const fn get(&self, service: Service) -> &Connection {
        match service {
            Service::Database => &self.database,
            Service::Search => &self.search,
            Service::Mq => &self.mq,
            Service::Redis => &self.redis,
        }
    }
}

/// Schema precedence: explicit entry, then the database URL scheme,
/// then `pgsql`.
#[must_use]
pub fn detect_schema(entries: &Entries) -> DatabaseSchema {
    let explicit = entries
        .get(&Service::Database.key(Field::Schema))
        .and_then(DatabaseSchema::from_alias);
    if let Some(schema) = explicit {
        return schema;
    }

    entries
        .get(Service::Database.url_key())
        .and_then(|url| dsn::parse(url, Service::Database))
        .and_then(|conn| conn.scheme)
        .and_then(|scheme| DatabaseSchema::from_alias(&scheme))
        .unwrap_or_default()
}

/// Fixed fallback values for `service`.
#[must_use]
pub fn defaults_for(service: Service, schema: DatabaseSchema) -> Connection {
    let text = |s: &str| Some(s.to_string());
    match service {
        Service::Database => Connection {
            scheme: text(schema.uri_scheme()),
            user: text("app"),
            password: text("app"),
            host: text("database"),
            port: Some(schema.default_port()),
            dbname: text("app"),
            ..Connection::default()
        },
        Service::Mq => Connection {
            scheme: text("amqp"),
            user: text("app"),
            password: text("app"),
            host: text("mq"),
            port: Some(5672),
            dbname: text("%2f"),
            ..Connection::default()
        },
        Service::Search => Connection {
            scheme: text("elastic-search"),
            host: text("search"),
            port: Some(9200),
            ..Connection::default()
        },
        Service::Redis => Connection {
            scheme: text("redis"),
            host: text("redis"),
            port: Some(6379),
            ..Connection::default()
        },
    }
}

/// Resolve one service and export its fields into `entries`.
pub fn resolve_service(
    entries: &mut Entries,
    service: Service,
    schema: DatabaseSchema,
) -> Connection {
    let mut conn = Connection::from_entries(entries, service);
    if service == Service::Database {
        // The database SCHEMA entry names the engine, not the URI scheme.
        conn.scheme = None;
    }

    let explicit = entries
        .get(service.url_key())
        .and_then(|url| dsn::parse(url, service));

    match &explicit {
        Some(parsed) => {
            info!(%service, key = service.url_key(), "using connection string from project");
            conn.fill_from(parsed);
            conn.origin = UriOrigin::Explicit;
        }
        None => {
            debug!(%service, "no connection string, using defaults");
            conn.origin = UriOrigin::Synthesized;
        }
    }

    conn.fill_from(&defaults_for(service, schema));
    if conn.uri.is_none() {
        conn.uri = conn.synthesize();
    }

    if service == Service::Database {
        entries.set_default(&service.key(Field::Schema), schema.as_str());
    }
    conn.export(service, entries);
    if let Some(uri) = &conn.uri {
        entries.set_default(service.url_key(), uri.clone());
    }
    conn
}

/// Resolve all four services, filling `entries` with every missing
/// connection value.
pub fn resolve(entries: &mut Entries) -> Services {
    let schema = detect_schema(entries);
    info!(%schema, "database schema");

    let database = resolve_service(entries, Service::Database, schema);

    let search = resolve_service(entries, Service::Search, schema);
    let mq = resolve_service(entries, Service::Mq, schema);
    let redis = resolve_service(entries, Service::Redis, schema);

    let search_url = entries
        .get(Service::Search.url_key())
        .unwrap_or_default()
        .to_string();
    if !entries.is_set(SEARCH_DSN) {
        let dsn = if search_url.contains("orm:") {
            String::new()
        } else {
            search_url
        };
        entries.set(SEARCH_DSN, dsn);
    }
    let search_dsn = entries.raw(SEARCH_DSN).unwrap_or_default().to_string();

    Services {
        schema,
        database,
        search,
        mq,
        redis,
        search_dsn,
    }
}

/// Container user identity, as `(DC_ORO_USER_*, DC_ORO_PHP_USER_*, default)`.
const USER_DEFAULTS: [(&str, &str, &str); 4] = [
    (USER_NAME, "DC_ORO_PHP_USER_NAME", "developer"),
    ("DC_ORO_USER_GROUP", "DC_ORO_PHP_USER_GROUP", "developer"),
    ("DC_ORO_USER_UID", "DC_ORO_PHP_USER_UID", "1000"),
    ("DC_ORO_USER_GID", "DC_ORO_PHP_USER_GID", "1000"),
];

/// Sync mode for the application code volume on host `os`
/// (`std::env::consts::OS`).
#[must_use]
pub fn sync_mode(os: &str) -> &'static str {
    if os == "macos" { "mutagen" } else { "default" }
}

/// Image and user defaults that do not depend on any service.
pub fn apply_host_defaults(entries: &mut Entries, os: &str) {
    for (key, php_key, fallback) in USER_DEFAULTS {
        entries.set_default(key, fallback);
        let value = entries.get(key).unwrap_or(fallback).to_string();
        entries.set_default(php_key, value);
    }
    entries.set_default(MODE, sync_mode(os));
    entries.set_default("DC_ORO_COMPOSER_VERSION", "2");
    entries.set_default("DC_ORO_PHP_DIST", "alpine");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_by_os() {
        assert_eq!(sync_mode("macos"), "mutagen");
        assert_eq!(sync_mode("linux"), "default");
    }

    #[test]
    fn php_user_mirrors_user() {
        let mut entries = Entries::new();
        entries.set(USER_NAME, "alice");
        apply_host_defaults(&mut entries, "linux");

        assert_eq!(entries.get("DC_ORO_PHP_USER_NAME"), Some("alice"));
        assert_eq!(entries.get("DC_ORO_PHP_USER_GID"), Some("1000"));
        assert_eq!(entries.get(MODE), Some("default"));
    }

    #[test]
    fn aliases() {
        for alias in ["mysql", "mariadb", "pdo_mysql", "MySQL"] {
            assert_eq!(DatabaseSchema::from_alias(alias), Some(DatabaseSchema::Mysql));
        }
        for alias in ["postgres", "postgresql", "pgsql", "pdo_pgsql"] {
            assert_eq!(DatabaseSchema::from_alias(alias), Some(DatabaseSchema::Pgsql));
        }
        assert_eq!(DatabaseSchema::from_alias("sqlite"), None);
    }

    #[test]
    fn parse_schema_error_message() {
        let err = "oracle".parse::<DatabaseSchema>().unwrap_err();
        assert!(err.contains("oracle"));
    }
}
