//! Idempotent check-then-create provisioning of the shared resources
//! a project needs before compose can start it.
//!
//! Every step lists what exists, compares by exact name, and creates
//! only on a miss. Whether a failed step aborts the invocation is
//! decided by [`severity`], not by the step itself.

pub mod database;
pub mod ssh_key;

use tracing::warn;

use crate::cmd::Runner;
use crate::error::OrodcResult;

/// Name of the docker network shared by all projects.
pub const SHARED_NETWORK: &str = "dc_shared_net";

/// A provisioning step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Network,
    Volume,
    SshKey,
    Database,
}

impl Step {
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Network => "shared network",
            Self::Volume => "appcode volume",
            Self::SshKey => "SSH key",
            Self::Database => "database",
        }
    }
}

/// Result of a successful step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// The resource was already there and was left untouched.
    Existing,
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Abort the invocation.
    Fatal,
    /// Log a warning and continue.
    Advisory,
}

/// Failure policy: a step is fatal only when the running subcommand
/// cannot work without it. The database step is always advisory.
#[must_use]
pub fn severity(step: Step, required: &[Step]) -> Severity {
    if step != Step::Database && required.contains(&step) {
        Severity::Fatal
    } else {
        Severity::Advisory
    }
}

/// Apply the failure policy to a step's result. Advisory failures
/// are logged and turned into `Ok(None)`.
pub fn settle(
    step: Step,
    result: OrodcResult<Provisioned>,
    required: &[Step],
) -> OrodcResult<Option<Provisioned>> {
    match result {
        Ok(outcome) => Ok(Some(outcome)),
        Err(e) => match severity(step, required) {
            Severity::Fatal => Err(e),
            Severity::Advisory => {
                warn!(step = step.describe(), error = %e, "provisioning failed, continuing");
                Ok(None)
            }
        },
    }
}

/// Kind of named docker object managed with `ls` / `create`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DockerObject {
    Network,
    Volume,
}

impl DockerObject {
    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Volume => "volume",
        }
    }
}

/// Ensure a docker network or volume called `name` exists.
pub fn ensure_object(
    runner: &dyn Runner,
    docker: &str,
    kind: DockerObject,
    name: &str,
) -> OrodcResult<Provisioned> {
    let noun = kind.noun();
    let listing = runner.capture(docker, &[noun, "ls", "--format", "{{.Name}}"])?;

    if listing.lines().any(|line| line.trim() == name) {
        eprintln!("Docker {noun} '{name}' already exists");
        return Ok(Provisioned::Existing);
    }

    eprintln!("Creating docker {noun} '{name}'");
    runner.capture(docker, &[noun, "create", name])?;
    Ok(Provisioned::Created)
}

pub fn ensure_network(runner: &dyn Runner, docker: &str) -> OrodcResult<Provisioned> {
    ensure_object(runner, docker, DockerObject::Network, SHARED_NETWORK)
}

pub fn ensure_volume(runner: &dyn Runner, docker: &str, name: &str) -> OrodcResult<Provisioned> {
    ensure_object(runner, docker, DockerObject::Volume, name)
}
