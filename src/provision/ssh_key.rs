use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::cmd::Runner;
use crate::config::{Entries, SSH_PUBLIC_KEY};
use crate::error::{OrodcError, OrodcResult};
use crate::provision::Provisioned;

/// `<key>.pub`.
#[must_use]
pub fn public_key_path(key: &Path) -> PathBuf {
    let mut path = key.as_os_str().to_owned();
    path.push(".pub");
    PathBuf::from(path)
}

/// Ensure a passphrase-less ed25519 keypair exists at `key`, then
/// export its public half as `ORO_SSH_PUBLIC_KEY` for the ssh
/// container.
pub fn ensure_ssh_key(
    runner: &dyn Runner,
    key: &Path,
    comment: &str,
    entries: &mut Entries,
) -> OrodcResult<Provisioned> {
    let outcome = if key.exists() {
        Provisioned::Existing
    } else {
        if let Some(parent) = key.parent() {
            fs::create_dir_all(parent)?;
        }
        eprintln!("Generating SSH key {}", key.display());
        let key_str = key.display().to_string();
        runner.capture(
            "ssh-keygen",
            &["-t", "ed25519", "-f", &key_str, "-N", "", "-q", "-C", comment],
        )?;
        restrict_permissions(key)?;
        Provisioned::Created
    };

    let pub_path = public_key_path(key);
    match fs::read_to_string(&pub_path) {
        Ok(public) => entries.set(SSH_PUBLIC_KEY, public.trim()),
        Err(e) if outcome == Provisioned::Created => {
            return Err(OrodcError::FileNotFound(format!(
                "public key not found after generation: {}: {e}",
                pub_path.display()
            )));
        }
        Err(e) => warn!(path = %pub_path.display(), error = %e, "cannot read SSH public key"),
    }
    Ok(outcome)
}

#[cfg(unix)]
fn restrict_permissions(key: &Path) -> OrodcResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(key, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_key: &Path) -> OrodcResult<()> {
    Ok(())
}
