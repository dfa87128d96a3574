//! Shell scripts for database export and import, run inside the
//! `cli` container with the dump directory mounted at [`MOUNT`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use shell_words::quote;

use crate::defaults::DatabaseSchema;
use crate::dsn::Connection;
use crate::error::{OrodcError, OrodcResult};

/// Container path the host dump directory is mounted on.
pub const MOUNT: &str = "/dump";

/// `dump-YYYYmmdd-HHMMSS.sql.gz`.
#[must_use]
pub fn default_file_name(now: DateTime<Local>) -> String {
    format!("dump-{}.sql.gz", now.format("%Y%m%d-%H%M%S"))
}

/// A host dump file split into the directory to mount and the file
/// name inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpFile {
    pub dir: PathBuf,
    pub name: String,
}

impl DumpFile {
    pub fn new(path: &Path) -> OrodcResult<Self> {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                OrodcError::InvalidArgument(format!("not a file path: {}", path.display()))
            })?
            .to_string();
        let dir = path
            .parent()
            .map_or_else(|| PathBuf::from("/"), Path::to_path_buf);
        Ok(Self { dir, name })
    }

    /// `-v <dir>:/dump` for `compose run`.
    #[must_use]
    pub fn volume(&self) -> String {
        format!("{}:{MOUNT}", self.dir.display())
    }

    #[must_use]
    pub fn container_path(&self) -> String {
        format!("{MOUNT}/{}", self.name)
    }

    #[must_use]
    pub fn is_gzip(&self) -> bool {
        Path::new(&self.name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
    }
}

/// Connection values, each quoted for `bash -c`.
struct Credentials {
    user: String,
    password: String,
    host: String,
    port: String,
    dbname: String,
}

impl Credentials {
    fn new(schema: DatabaseSchema, conn: &Connection) -> Self {
        let quoted =
            |value: Option<&str>, fallback: &str| quote(value.unwrap_or(fallback)).into_owned();
        Self {
            user: quoted(conn.user.as_deref(), ""),
            password: quoted(conn.password.as_deref(), ""),
            host: quoted(conn.host.as_deref(), "database"),
            port: conn.port.unwrap_or_else(|| schema.default_port()).to_string(),
            dbname: quoted(conn.dbname.as_deref(), ""),
        }
    }
}

/// Dump the database, gzip-compressed, to `file`.
#[must_use]
pub fn export_script(schema: DatabaseSchema, conn: &Connection, file: &DumpFile) -> String {
    let c = Credentials::new(schema, conn);
    let out = quote(&file.container_path()).into_owned();
    match schema {
        DatabaseSchema::Pgsql => format!(
            "PGPASSWORD={} pg_dump -h {} -p {} -U {} -d {} | gzip > {out}",
            c.password, c.host, c.port, c.user, c.dbname
        ),
        DatabaseSchema::Mysql => format!(
            "MYSQL_PWD={} mysqldump -h{} -P{} -u{} {} | gzip > {out}",
            c.password, c.host, c.port, c.user, c.dbname
        ),
    }
}

/// Load `file` into the database. Function definitions are made
/// replaceable for PostgreSQL and definers are reset for MySQL so a
/// dump from another installation applies cleanly.
#[must_use]
pub fn import_script(schema: DatabaseSchema, conn: &Connection, file: &DumpFile) -> String {
    let c = Credentials::new(schema, conn);
    let reader = if file.is_gzip() { "zcat" } else { "cat" };
    let input = quote(&file.container_path()).into_owned();
    match schema {
        DatabaseSchema::Pgsql => format!(
            "{reader} {input} | sed -E 's/^\\s*CREATE\\s+FUNCTION/CREATE OR REPLACE FUNCTION/I' \
             | PGPASSWORD={} psql -h {} -p {} -U {} -d {}",
            c.password, c.host, c.port, c.user, c.dbname
        ),
        DatabaseSchema::Mysql => format!(
            "{reader} {input} | sed -e 's/DEFINER[ ]*=[ ]*[^*]*\\*/DEFINER=CURRENT_USER */' \
             | MYSQL_PWD={} mysql -h{} -P{} -u{} {}",
            c.password, c.host, c.port, c.user, c.dbname
        ),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn timestamped_name() {
        let now = Local.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(default_file_name(now), "dump-20260304-050607.sql.gz");
    }

    #[test]
    fn mounts_parent_directory() {
        let file = DumpFile::new(Path::new("/backups/shop.sql.gz")).unwrap();
        assert_eq!(file.volume(), "/backups:/dump");
        assert_eq!(file.container_path(), "/dump/shop.sql.gz");
        assert!(file.is_gzip());
    }

    #[test]
    fn paths_and_passwords_are_quoted() {
        let conn = Connection {
            user: Some("app".into()),
            password: Some("it's; rm -rf /".into()),
            dbname: Some("shop".into()),
            ..Connection::default()
        };
        let file = DumpFile::new(Path::new("/backups/my dump.sql.gz")).unwrap();

        let export = export_script(DatabaseSchema::Pgsql, &conn, &file);
        assert!(export.starts_with("PGPASSWORD='it'\\''s; rm -rf /' pg_dump"));
        assert!(export.ends_with("| gzip > '/dump/my dump.sql.gz'"));

        let import = import_script(DatabaseSchema::Mysql, &conn, &file);
        assert!(import.starts_with("zcat '/dump/my dump.sql.gz' |"));
        assert!(import.contains("MYSQL_PWD='it'\\''s; rm -rf /' mysql"));
    }

    #[test]
    fn plain_sql_is_read_with_cat() {
        let conn = Connection {
            user: Some("app".into()),
            password: Some("app".into()),
            dbname: Some("app".into()),
            ..Connection::default()
        };
        let file = DumpFile::new(Path::new("/tmp/seed.sql")).unwrap();
        let script = import_script(DatabaseSchema::Mysql, &conn, &file);
        assert!(script.starts_with("cat /dump/seed.sql"));
        assert!(script.contains("-P3306"));
    }
}
