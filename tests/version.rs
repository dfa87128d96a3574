use orodc::config::Entries;
use orodc::version::{self, Runtime};
use tempfile::TempDir;

mod common;
use common::write;

#[test]
fn pin_file_wins_over_everything() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".php-version", "8.1\n");
    write(dir.path(), ".phprc", "8.2\n");
    write(dir.path(), "composer.json", r#"{"require": {"php": "^8.4"}}"#);

    assert_eq!(version::detect(Runtime::Php, dir.path()), "8.1");
}

#[test]
fn falls_through_to_manifest() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".php-version", "\n");
    write(
        dir.path(),
        "composer.json",
        r#"{"require": {"php": ">=8.2 <8.5", "ext-json": "*"}}"#,
    );

    assert_eq!(version::detect(Runtime::Php, dir.path()), "8.2");
}

#[test]
fn fallback_versions() {
    let dir = TempDir::new().unwrap();

    assert_eq!(version::detect(Runtime::Php, dir.path()), "8.3");
    assert_eq!(version::detect(Runtime::Node, dir.path()), "20");
}

#[test]
fn node_probes() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "package.json", r#"{"engines": {"node": ">=18.17 <21"}}"#);
    assert_eq!(version::detect(Runtime::Node, dir.path()), "18.17");

    write(dir.path(), ".node-version", "v22.1.0\n");
    assert_eq!(version::detect(Runtime::Node, dir.path()), "22.1.0");

    write(dir.path(), ".nvmrc", "v16\n");
    assert_eq!(version::detect(Runtime::Node, dir.path()), "16");
}

#[test]
fn broken_manifest_is_ignored() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "package.json", "{ not json");

    assert_eq!(version::detect(Runtime::Node, dir.path()), "20");
}

#[test]
fn configured_versions_are_not_probed() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), ".php-version", "8.1\n");

    let mut entries = Entries::new();
    entries.set("DC_ORO_PHP_VERSION", "7.4");
    version::apply(dir.path(), &mut entries);

    assert_eq!(entries.get("DC_ORO_PHP_VERSION"), Some("7.4"));
    assert_eq!(entries.get("DC_ORO_NODE_VERSION"), Some("20"));
}
