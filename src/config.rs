//! The layered configuration entry store.
//!
//! Every resolved value ends up here as a `KEY=VALUE` entry with
//! last-write-wins semantics. The store is threaded explicitly through
//! the loader, the defaulting engine, and the version detector, and is
//! finally exported as the environment of each spawned process.

use std::collections::BTreeMap;

pub const NAME: &str = "DC_ORO_NAME";
pub const APPDIR: &str = "DC_ORO_APPDIR";
pub const CONFIG_DIR: &str = "DC_ORO_CONFIG_DIR";
pub const PHP_VERSION: &str = "DC_ORO_PHP_VERSION";
pub const NODE_VERSION: &str = "DC_ORO_NODE_VERSION";
pub const SEARCH_DSN: &str = "DC_ORO_SEARCH_DSN";
pub const SSH_PUBLIC_KEY: &str = "ORO_SSH_PUBLIC_KEY";
pub const USER_NAME: &str = "DC_ORO_USER_NAME";
pub const MODE: &str = "DC_ORO_MODE";

/// Prefix for all entries owned by the tool.
pub const PREFIX: &str = "DC_ORO";

/// Process environment keys carried into the store before any file
/// is loaded.
const INHERITED_PREFIXES: [&str; 4] = ["DC_ORO_", "ORO_", "COMPOSER_", "XDEBUG_"];

/// Ordered key/value configuration store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entries {
    map: BTreeMap<String, String>,
}

impl Entries {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from the current process environment, keeping
    /// only the keys this tool reads or forwards.
    #[must_use]
    pub fn from_process() -> Self {
        Self::from_vars(std::env::vars())
    }

    #[must_use]
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let map = vars
            .into_iter()
            .filter(|(k, _)| INHERITED_PREFIXES.iter().any(|p| k.starts_with(p)))
            .collect();
        Self { map }
    }

    /// Raw value, including empty strings.
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Value if present and non-empty. An empty entry counts as unset.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.raw(key).filter(|v| !v.is_empty())
    }

    #[must_use]
    pub fn is_set(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    /// Set `key` only when it is unset or empty. Returns whether the
    /// value was written.
    pub fn set_default(&mut self, key: &str, value: impl Into<String>) -> bool {
        if self.is_set(key) {
            return false;
        }
        self.map.insert(key.to_string(), value.into());
        true
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.map.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Owned pairs for a child process environment.
    #[must_use]
    pub fn to_env(&self) -> Vec<(String, String)> {
        self.map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Entries {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            map: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for Entries {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.set(k, v);
        }
    }
}

/// Whether `key` holds a secret that should be masked when printed.
#[must_use]
pub fn is_secret(key: &str) -> bool {
    key.ends_with("_PASSWORD") || key == "COMPOSER_AUTH"
}
