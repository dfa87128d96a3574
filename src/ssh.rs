use std::path::{Path, PathBuf};

use crate::cmd::Runner;
use crate::config::{Entries, USER_NAME};
use crate::error::{OrodcError, OrodcResult};

/// User the ssh container accepts when none is configured.
pub const DEFAULT_USER: &str = "developer";

/// SSH session into the project's ssh container, reached through
/// its published port on the loopback interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshSession {
    host: String,
    port: u16,
    user: String,
    key: Option<PathBuf>,
}

impl SshSession {
    #[must_use]
    pub fn new(port: u16, user: &str) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port,
            user: user.to_string(),
            key: None,
        }
    }

    /// Session for the resolved project: user from `DC_ORO_USER_NAME`.
    #[must_use]
    pub fn for_project(entries: &Entries, port: u16, key: &Path) -> Self {
        let user = entries.get(USER_NAME).unwrap_or(DEFAULT_USER);
        Self::new(port, user).with_key(key)
    }

    #[must_use]
    pub fn with_key(mut self, key_path: &Path) -> Self {
        self.key = Some(key_path.to_path_buf());
        self
    }

    /// Open an interactive session, or run `command` remotely when
    /// given.
    pub fn connect(&self, runner: &dyn Runner, command: &[String]) -> OrodcResult<()> {
        let args = self.build_ssh_args(command);
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        runner.interactive("ssh", &refs)
    }

    fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Full `ssh` argument list.
    #[must_use]
    pub fn build_ssh_args(&self, command: &[String]) -> Vec<String> {
        let mut args = self.ssh_base_args();
        args.push(self.destination());
        args.extend(command.iter().cloned());
        args
    }

    fn ssh_base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "SendEnv=COMPOSER_AUTH".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
        ];
        if let Some(key) = &self.key {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args.push("-p".to_string());
        args.push(self.port.to_string());
        args
    }
}

/// Host port from `docker compose port` output such as
/// `0.0.0.0:2222` or `[::]:2222`.
pub fn parse_published_port(output: &str) -> OrodcResult<u16> {
    output
        .lines()
        .find_map(|line| line.trim().rsplit(':').next()?.parse().ok())
        .ok_or_else(|| {
            OrodcError::SshFailed(
                "SSH container is not running, try `orodc up -d` first".to_string(),
            )
        })
}
