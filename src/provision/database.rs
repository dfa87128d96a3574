//! Make sure the application database exists inside the running
//! `database` service.

use tracing::{debug, warn};

use crate::cmd::Runner;
use crate::compose::ComposeFiles;
use crate::defaults::DatabaseSchema;
use crate::dsn::Connection;
use crate::error::{OrodcError, OrodcResult};
use crate::provision::Provisioned;

/// Compose service the database client commands run in.
pub const SERVICE: &str = "database";

/// Everything needed to talk to the database service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub schema: DatabaseSchema,
    pub user: String,
    pub password: String,
    pub dbname: String,
}

impl DatabaseTarget {
    /// Build a target from a resolved connection. Returns `None` when
    /// no database name is configured.
    #[must_use]
    pub fn from_connection(schema: DatabaseSchema, conn: &Connection) -> Option<Self> {
        Some(Self {
            schema,
            user: conn.user.clone().unwrap_or_default(),
            password: conn.password.clone().unwrap_or_default(),
            dbname: conn.dbname.clone()?,
        })
    }

    /// Client invocation inside the service, without the statement.
    fn client(&self) -> Vec<String> {
        match self.schema {
            DatabaseSchema::Mysql => vec![
                "mysql".into(),
                format!("-u{}", self.user),
                format!("-p{}", self.password),
                "-N".into(),
            ],
            DatabaseSchema::Pgsql => vec![
                "psql".into(),
                "-U".into(),
                self.user.clone(),
                "-d".into(),
                "postgres".into(),
                "-v".into(),
                "ON_ERROR_STOP=1".into(),
                "-tA".into(),
            ],
        }
    }

    /// Client arguments running one `statement`.
    #[must_use]
    pub fn statement_args(&self, statement: &str) -> Vec<String> {
        let mut args = self.client();
        args.push(match self.schema {
            DatabaseSchema::Mysql => "-e".into(),
            DatabaseSchema::Pgsql => "-c".into(),
        });
        args.push(statement.to_string());
        args
    }

    #[must_use]
    pub fn exists_query(&self) -> String {
        match self.schema {
            DatabaseSchema::Mysql => format!("SHOW DATABASES LIKE '{}'", self.dbname),
            DatabaseSchema::Pgsql => {
                format!("SELECT 1 FROM pg_database WHERE datname='{}'", self.dbname)
            }
        }
    }

    /// The "create if not exists" form. PostgreSQL has no such
    /// statement, so it selects a `CREATE DATABASE` and runs it with
    /// `\gexec`, which psql only honours when reading a script.
    #[must_use]
    pub fn conditional_create(&self) -> String {
        match self.schema {
            DatabaseSchema::Mysql => format!("CREATE DATABASE IF NOT EXISTS `{}`", self.dbname),
            DatabaseSchema::Pgsql => format!(
                "SELECT 'CREATE DATABASE \"{db}\"' WHERE NOT EXISTS \
                 (SELECT FROM pg_database WHERE datname = '{db}')\\gexec\n",
                db = self.dbname
            ),
        }
    }

    #[must_use]
    pub fn direct_create(&self) -> String {
        match self.schema {
            DatabaseSchema::Mysql => format!("CREATE DATABASE `{}`", self.dbname),
            DatabaseSchema::Pgsql => format!("CREATE DATABASE \"{}\"", self.dbname),
        }
    }

    /// Whether the client's answer to [`Self::exists_query`] means the
    /// database is there.
    #[must_use]
    pub fn exists_in(&self, output: &str) -> bool {
        match self.schema {
            DatabaseSchema::Mysql => output.lines().any(|l| l.trim() == self.dbname),
            DatabaseSchema::Pgsql => output.lines().any(|l| l.trim() == "1"),
        }
    }
}

/// Database names are spliced into SQL, so only plain identifiers
/// are accepted.
pub fn validate_name(name: &str) -> OrodcResult<()> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(OrodcError::InvalidArgument(format!(
            "database name '{name}' must contain only letters, digits, '_' and '-'"
        )))
    }
}

fn exec_args(compose: &ComposeFiles, client: Vec<String>) -> Vec<String> {
    let mut extra = vec!["exec".to_string(), "-T".to_string(), SERVICE.to_string()];
    extra.extend(client);
    compose.command(&extra)
}

fn run(runner: &dyn Runner, docker: &str, args: &[String]) -> OrodcResult<String> {
    let refs: Vec<&str> = args.iter().map(String::as_str).collect();
    runner.capture(docker, &refs)
}

/// Check for the database and create it when missing: first with the
/// conditional statement, then with a direct `CREATE DATABASE`. An
/// "already exists" failure of the direct form counts as success.
pub fn ensure_database(
    runner: &dyn Runner,
    docker: &str,
    compose: &ComposeFiles,
    target: &DatabaseTarget,
) -> OrodcResult<Provisioned> {
    validate_name(&target.dbname)?;
    eprintln!("Checking if database '{}' exists", target.dbname);

    let check = exec_args(compose, target.statement_args(&target.exists_query()));
    match run(runner, docker, &check) {
        Ok(output) if target.exists_in(&output) => {
            eprintln!("Database '{}' already exists", target.dbname);
            return Ok(Provisioned::Existing);
        }
        Ok(output) => debug!(%output, "database not listed"),
        Err(e) => warn!(error = %e, "failed to check database existence"),
    }

    eprintln!("Creating database '{}'", target.dbname);
    let conditional = match target.schema {
        DatabaseSchema::Mysql => {
            let args = exec_args(compose, target.statement_args(&target.conditional_create()));
            run(runner, docker, &args)
        }
        DatabaseSchema::Pgsql => {
            let args = exec_args(compose, target.client());
            let refs: Vec<&str> = args.iter().map(String::as_str).collect();
            runner.capture_with_stdin(docker, &refs, target.conditional_create().as_bytes())
        }
    };

    let Err(e) = conditional else {
        return Ok(Provisioned::Created);
    };
    warn!(error = %e, "conditional create failed, trying direct CREATE DATABASE");

    let direct = exec_args(compose, target.statement_args(&target.direct_create()));
    match run(runner, docker, &direct) {
        Ok(_) => Ok(Provisioned::Created),
        Err(e) if e.is_already_exists() => {
            eprintln!("Database '{}' already exists", target.dbname);
            Ok(Provisioned::Existing)
        }
        Err(e) => Err(e),
    }
}
