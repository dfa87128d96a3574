use std::process::ExitStatus;

pub type OrodcResult<T> = Result<T, OrodcError>;

#[derive(Debug, thiserror::Error)]
pub enum OrodcError {
    #[error("command failed: {command}")]
    CommandFailed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("SSH connection failed: {0}")]
    SshFailed(String),

    #[error("prerequisite missing: {0}")]
    PrerequisiteMissing(String),

    #[error("environment variable missing: {0}")]
    EnvMissing(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl OrodcError {
    /// Exit code to hand back to the shell. A failed downstream
    /// command keeps its own code; everything else is `1`.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CommandFailed { status, .. } => status.code().unwrap_or(1),
            _ => 1,
        }
    }

    /// Whether a failed command reported that the target already
    /// exists.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        match self {
            Self::CommandFailed { stderr, .. } => stderr.contains("already exists"),
            Self::Other(msg) => msg.contains("already exists"),
            _ => false,
        }
    }
}
