use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Entries;
use crate::error::OrodcResult;

/// Project env files, in precedence order (later overrides earlier).
pub const ENV_FILES: [&str; 4] = [".env", ".env-app", ".env-app.local", ".env.orodc"];

/// Parse one `KEY=VALUE` line.
///
/// Blank lines, `#` comments and lines without `=` yield `None`.
/// A leading `export ` is dropped. Whitespace around key and value is
/// trimmed and one layer of matching quotes is removed from the value.
#[must_use]
pub fn parse_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let line = line.strip_prefix("export ").map_or(line, str::trim_start);

    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }

    Some((key.to_string(), unquote(value.trim()).to_string()))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Apply every valid line of `content` to `entries`.
pub fn apply(content: &str, entries: &mut Entries) -> usize {
    let mut count = 0;
    for (key, value) in content.lines().filter_map(parse_line) {
        entries.set(key, value);
        count += 1;
    }
    count
}

/// Load a single env file into `entries`. A missing file is not an
/// error; it returns `Ok(false)`.
pub fn load_file(path: &Path, entries: &mut Entries) -> OrodcResult<bool> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let count = apply(&content, entries);
    debug!(path = %path.display(), entries = count, "loaded env file");
    Ok(true)
}

/// Load the project env files from `root` in precedence order and
/// return the paths that were found.
pub fn load_project(root: &Path, entries: &mut Entries) -> OrodcResult<Vec<PathBuf>> {
    let mut loaded = Vec::new();
    for name in ENV_FILES {
        let path = root.join(name);
        if load_file(&path, entries)? {
            loaded.push(path);
        }
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_matching_quotes_once() {
        assert_eq!(
            parse_line(r#"A="'x'""#),
            Some(("A".into(), "'x'".into()))
        );
    }

    #[test]
    fn keeps_unbalanced_quotes() {
        assert_eq!(parse_line(r#"A="x"#), Some(("A".into(), "\"x".into())));
        assert_eq!(parse_line(r#"A="x'"#), Some(("A".into(), "\"x'".into())));
    }

    #[test]
    fn value_may_contain_equals() {
        assert_eq!(
            parse_line("ORO_DB_URL=postgres://a:b@c/d?x=1"),
            Some(("ORO_DB_URL".into(), "postgres://a:b@c/d?x=1".into()))
        );
    }
}
