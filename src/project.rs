use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::{APPDIR, CONFIG_DIR, Entries, NAME};
use crate::error::{OrodcError, OrodcResult};

/// Well-known locations of the packaged compose templates, tried in
/// order after the one next to the executable.
const SHARED_COMPOSE_DIRS: [&str; 2] = [
    "/opt/homebrew/share/orodc/compose",
    "/usr/local/share/orodc/compose",
];

/// Identity of the project in the current working directory.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use orodc::project::Project;
///
/// let project = Project::new(Path::new("/work/shop"), Path::new("/home/me/.orodc")).unwrap();
///
/// assert_eq!(project.name, "shop");
/// assert_eq!(project.appcode_volume(), "shop_appcode");
/// assert_eq!(project.config_dir, Path::new("/home/me/.orodc/shop"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub root: PathBuf,
    pub config_dir: PathBuf,
}

impl Project {
    /// Derive the project from its root directory. The config
    /// directory is `<config_root>/<name>`.
    pub fn new(root: &Path, config_root: &Path) -> OrodcResult<Self> {
        let name = root
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| {
                OrodcError::InvalidArgument(format!(
                    "cannot derive a project name from {}",
                    root.display()
                ))
            })?
            .to_string();

        Ok(Self {
            config_dir: config_root.join(&name),
            root: root.to_path_buf(),
            name,
        })
    }

    /// Resolve `root` to an absolute path first.
    pub fn discover(root: &Path, config_root: &Path) -> OrodcResult<Self> {
        let root = root.canonicalize().map_err(|e| {
            OrodcError::Other(format!("cannot resolve project directory {}: {e}", root.display()))
        })?;
        Self::new(&root, config_root)
    }

    #[must_use]
    pub fn appcode_volume(&self) -> String {
        format!("{}_appcode", self.name)
    }

    #[must_use]
    pub fn ssh_key_path(&self) -> PathBuf {
        self.config_dir.join("ssh_id_ed25519")
    }

    /// Local hostname the application is served on.
    #[must_use]
    pub fn domain(&self) -> String {
        format!("{}.docker.local", self.name)
    }

    pub fn export(&self, entries: &mut Entries) {
        entries.set(NAME, self.name.clone());
        entries.set(APPDIR, self.root.display().to_string());
        entries.set(CONFIG_DIR, self.config_dir.display().to_string());
    }

    /// Create the config directory on first use and seed it with the
    /// packaged compose templates. An existing directory is left
    /// untouched. Returns whether the directory was created.
    ///
    /// Templates are copied into a staging directory that is renamed
    /// into place, so a failed or impossible copy leaves no config
    /// directory behind and the next run seeds it again.
    pub fn ensure_config_dir(&self, compose_source: Option<&Path>) -> OrodcResult<bool> {
        if self.config_dir.is_dir() {
            debug!(dir = %self.config_dir.display(), "config directory exists");
            return Ok(false);
        }

        let Some(src) = compose_source.filter(|src| src.is_dir()) else {
            return Err(OrodcError::PrerequisiteMissing(format!(
                "compose templates not found, cannot seed {} (set ORODC_COMPOSE_SOURCE)",
                self.config_dir.display()
            )));
        };

        eprintln!("Creating config directory {}", self.config_dir.display());
        let staging = self.config_dir.with_file_name(format!(".{}.partial", self.name));
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging).map_err(|e| {
            OrodcError::Other(format!(
                "failed to create config directory {}: {e}",
                self.config_dir.display()
            ))
        })?;

        let copied = match copy_tree(src, &staging) {
            Ok(copied) => copied,
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    warn!(dir = %staging.display(), error = %cleanup, "failed to remove staging directory");
                }
                return Err(e);
            }
        };
        fs::rename(&staging, &self.config_dir)?;
        eprintln!("Copied {copied} compose files from {}", src.display());
        Ok(true)
    }
}

/// `~/.orodc`.
pub fn default_config_root() -> OrodcResult<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(".orodc"))
        .ok_or_else(|| OrodcError::EnvMissing("HOME".into()))
}

/// First existing compose template directory: next to the
/// executable (`<prefix>/bin/../share/orodc/compose`), then the
/// Homebrew locations.
#[must_use]
pub fn default_compose_source() -> Option<PathBuf> {
    let beside_exe = std::env::current_exe().ok().and_then(|exe| {
        exe.parent()
            .and_then(Path::parent)
            .map(|prefix| prefix.join("share").join("orodc").join("compose"))
    });

    beside_exe
        .into_iter()
        .chain(SHARED_COMPOSE_DIRS.iter().map(PathBuf::from))
        .find(|dir| dir.is_dir())
}

/// Copy every file under `src` into `dst`, keeping relative paths.
/// Returns the number of files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> OrodcResult<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| OrodcError::Other(e.to_string()))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target).map_err(|e| {
                OrodcError::Other(format!(
                    "failed to copy {} to {}: {e}",
                    entry.path().display(),
                    target.display()
                ))
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}
