use std::process::{Command, Output, Stdio};

use tracing::debug;

use crate::error::{OrodcError, OrodcResult};

/// Seam between the resolution core and the external processes it
/// drives (`docker`, `ssh-keygen`, `ssh`).
pub trait Runner {
    /// Run a command and capture its trimmed stdout. Fails if the
    /// command returns a non-zero exit code.
    fn capture(&self, program: &str, args: &[&str]) -> OrodcResult<String>;

    /// Like [`Runner::capture`], feeding `stdin_data` to the
    /// command's stdin.
    fn capture_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        stdin_data: &[u8],
    ) -> OrodcResult<String>;

    /// Run a command with stdin/stdout/stderr inherited.
    fn interactive(&self, program: &str, args: &[&str]) -> OrodcResult<()>;
}

impl<R: Runner + ?Sized> Runner for std::rc::Rc<R> {
    fn capture(&self, program: &str, args: &[&str]) -> OrodcResult<String> {
        (**self).capture(program, args)
    }

    fn capture_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        stdin_data: &[u8],
    ) -> OrodcResult<String> {
        (**self).capture_with_stdin(program, args, stdin_data)
    }

    fn interactive(&self, program: &str, args: &[&str]) -> OrodcResult<()> {
        (**self).interactive(program, args)
    }
}

/// Runs real processes, exporting the resolved configuration as
/// their environment.
#[derive(Debug, Clone, Default)]
pub struct System {
    envs: Vec<(String, String)>,
}

impl System {
    #[must_use]
    pub const fn new() -> Self {
        Self { envs: Vec::new() }
    }

    #[must_use]
    pub fn with_envs<I>(envs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            envs: envs.into_iter().collect(),
        }
    }

    fn command(&self, program: &str, args: &[&str]) -> Command {
        debug!(command = %format_command(program, args), "spawning");
        let mut command = Command::new(program);
        command.args(args).envs(self.envs.iter().map(|(k, v)| (k, v)));
        command
    }
}

impl Runner for System {
    fn capture(&self, program: &str, args: &[&str]) -> OrodcResult<String> {
        let output = self
            .command(program, args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| not_found_or_io(program, e))?;

        finish(program, args, &output)
    }

    fn capture_with_stdin(
        &self,
        program: &str,
        args: &[&str],
        stdin_data: &[u8],
    ) -> OrodcResult<String> {
        use std::io::Write;

        let mut child = self
            .command(program, args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| not_found_or_io(program, e))?;

        if let Some(stdin) = &mut child.stdin {
            stdin.write_all(stdin_data)?;
        }
        drop(child.stdin.take());

        let output = child.wait_with_output()?;
        finish(program, args, &output)
    }

    fn interactive(&self, program: &str, args: &[&str]) -> OrodcResult<()> {
        let status = self
            .command(program, args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| not_found_or_io(program, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(OrodcError::CommandFailed {
                command: format_command(program, args),
                status,
                stderr: String::new(),
            })
        }
    }
}

/// Check if a command exists on PATH.
#[must_use]
pub fn command_exists(program: &str) -> bool {
    Command::new("which")
        .arg(program)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|s| s.success())
}

/// Render a command line for logs and error messages.
#[must_use]
pub fn format_command(program: &str, args: &[&str]) -> String {
    let mut parts = vec![program.to_string()];
    parts.extend(args.iter().map(|a| (*a).to_string()));
    parts.join(" ")
}

fn finish(program: &str, args: &[&str], output: &Output) -> OrodcResult<String> {
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        debug!(%stderr, "command failed");
        Err(OrodcError::CommandFailed {
            command: format_command(program, args),
            status: output.status,
            stderr,
        })
    }
}

fn not_found_or_io(program: &str, e: std::io::Error) -> OrodcError {
    if e.kind() == std::io::ErrorKind::NotFound {
        OrodcError::CommandNotFound(program.to_string())
    } else {
        OrodcError::Io(e)
    }
}
