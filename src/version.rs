//! Runtime version detection from project marker files.

use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::info;

use crate::config::{Entries, NODE_VERSION, PHP_VERSION};

/// A probe inspects the project root and returns a version if its
/// marker file yields one.
pub type Probe = fn(&Path) -> Option<String>;

/// Runtime whose version is pinned for the container images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    Php,
    Node,
}

impl Runtime {
    pub const ALL: [Self; 2] = [Self::Php, Self::Node];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Php => PHP_VERSION,
            Self::Node => NODE_VERSION,
        }
    }

    #[must_use]
    pub const fn fallback(self) -> &'static str {
        match self {
            Self::Php => "8.3",
            Self::Node => "20",
        }
    }

    /// Probes in priority order: pin file, runtime config, manifest.
    #[must_use]
    pub fn probes(self) -> &'static [(&'static str, Probe)] {
        match self {
            Self::Php => &PHP_PROBES,
            Self::Node => &NODE_PROBES,
        }
    }
}

static PHP_PROBES: [(&str, Probe); 3] = [
    (".php-version", php_version_file),
    (".phprc", phprc),
    ("composer.json", composer_json),
];

static NODE_PROBES: [(&str, Probe); 3] = [
    (".nvmrc", nvmrc),
    (".node-version", node_version_file),
    ("package.json", package_json),
];

/// Detect `runtime`'s version under `root`: first probe with a
/// non-empty answer wins, otherwise the fallback.
#[must_use]
pub fn detect(runtime: Runtime, root: &Path) -> String {
    runtime
        .probes()
        .iter()
        .find_map(|(marker, probe)| {
            probe(root).inspect(|version| {
                info!(?runtime, marker, version = %version, "detected runtime version");
            })
        })
        .unwrap_or_else(|| runtime.fallback().to_string())
}

/// Set each runtime version entry that is not already configured.
pub fn apply(root: &Path, entries: &mut Entries) {
    for runtime in Runtime::ALL {
        if entries.is_set(runtime.key()) {
            continue;
        }
        let version = detect(runtime, root);
        entries.set(runtime.key(), version);
    }
}

fn first_line(root: &Path, name: &str) -> Option<String> {
    let content = fs::read_to_string(root.join(name)).ok()?;
    let version = content.trim().lines().next()?.trim();
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}

fn php_version_file(root: &Path) -> Option<String> {
    first_line(root, ".php-version")
}

fn phprc(root: &Path) -> Option<String> {
    first_line(root, ".phprc")
}

fn nvmrc(root: &Path) -> Option<String> {
    first_line(root, ".nvmrc").map(|v| v.trim_start_matches('v').to_string())
}

fn node_version_file(root: &Path) -> Option<String> {
    first_line(root, ".node-version").map(|v| v.trim_start_matches('v').to_string())
}

/// `"php": ">=8.1"` style constraint in `composer.json`.
fn composer_json(root: &Path) -> Option<String> {
    let content = fs::read_to_string(root.join("composer.json")).ok()?;
    let re = Regex::new(r#""php"\s*:\s*"[^"]*?(\d+\.\d+)"#).ok()?;
    re.captures(&content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// `engines.node` in `package.json`, reduced to its first `N` or `N.M`.
fn package_json(root: &Path) -> Option<String> {
    let content = fs::read_to_string(root.join("package.json")).ok()?;
    let manifest: serde_json::Value = serde_json::from_str(&content).ok()?;
    let constraint = manifest.get("engines")?.get("node")?.as_str()?;
    let re = Regex::new(r"(\d+(?:\.\d+)?)").ok()?;
    re.captures(constraint)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
