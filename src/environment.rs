//! The resolution pipeline shared by every subcommand.
//!
//! Order matters: project identity, env files, connection defaulting,
//! version detection, host defaults, then the compose file set. The
//! resulting [`Entries`] become the environment of every process the
//! tool spawns.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::cmd::{Runner, System};
use crate::compose::ComposeFiles;
use crate::config::Entries;
use crate::defaults::{self, Services};
use crate::env;
use crate::error::OrodcResult;
use crate::project::Project;
use crate::provision::database::{self, DatabaseTarget};
use crate::provision::ssh_key;
use crate::provision::{self, Provisioned, Step};
use crate::version;

/// Tool settings, independent of any project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub project_dir: PathBuf,
    pub config_root: PathBuf,
    pub compose_source: Option<PathBuf>,
    pub docker_bin: String,
}

/// Fully resolved configuration of one project for one invocation.
#[derive(Debug, Clone)]
pub struct Environment {
    pub settings: Settings,
    pub project: Project,
    pub entries: Entries,
    pub services: Services,
    pub compose: ComposeFiles,
    /// Env files that were found and applied, in load order.
    pub env_files: Vec<PathBuf>,
}

impl Environment {
    /// Resolve against the current process environment and host OS.
    pub fn resolve(settings: Settings) -> OrodcResult<Self> {
        Self::resolve_with(settings, Entries::from_process(), std::env::consts::OS)
    }

    /// Resolve starting from `entries` as if running on `os`.
    pub fn resolve_with(settings: Settings, mut entries: Entries, os: &str) -> OrodcResult<Self> {
        let project = Project::discover(&settings.project_dir, &settings.config_root)?;
        info!(project = %project.name, root = %project.root.display(), "resolving environment");

        project.ensure_config_dir(settings.compose_source.as_deref())?;

        let env_files = env::load_project(&project.root, &mut entries)?;
        project.export(&mut entries);

        let services = defaults::resolve(&mut entries);
        version::apply(&project.root, &mut entries);
        defaults::apply_host_defaults(&mut entries, os);

        let compose = ComposeFiles::new(&project.config_dir, services.schema);
        debug!(files = ?compose.files(), "compose file set");

        Ok(Self {
            settings,
            project,
            entries,
            services,
            compose,
            env_files,
        })
    }

    #[must_use]
    pub fn docker(&self) -> &str {
        &self.settings.docker_bin
    }

    /// A process runner exporting the resolved entries.
    #[must_use]
    pub fn runner(&self) -> System {
        System::with_envs(self.entries.to_env())
    }

    /// `docker` arguments for `compose -f ... <extra>`.
    #[must_use]
    pub fn compose_args<S: AsRef<str>>(&self, extra: &[S]) -> Vec<String> {
        self.compose.command(extra)
    }

    /// Ensure the shared network, the appcode volume and the SSH key.
    /// Steps listed in `required` abort on failure; the rest warn.
    pub fn provision(&mut self, runner: &dyn Runner, required: &[Step]) -> OrodcResult<()> {
        let docker = self.settings.docker_bin.clone();

        let network = provision::ensure_network(runner, &docker);
        provision::settle(Step::Network, network, required)?;

        let volume = provision::ensure_volume(runner, &docker, &self.project.appcode_volume());
        provision::settle(Step::Volume, volume, required)?;

        let key = ssh_key::ensure_ssh_key(
            runner,
            &self.project.ssh_key_path(),
            &self.project.name,
            &mut self.entries,
        );
        provision::settle(Step::SshKey, key, required)?;
        Ok(())
    }

    /// Ensure the application database exists. Never fatal.
    pub fn ensure_database(&self, runner: &dyn Runner) -> OrodcResult<Option<Provisioned>> {
        let Some(target) =
            DatabaseTarget::from_connection(self.services.schema, &self.services.database)
        else {
            debug!("no database name configured, skipping");
            return Ok(None);
        };
        let result = database::ensure_database(runner, self.docker(), &self.compose, &target);
        provision::settle(Step::Database, result, &[])
    }
}
