//! Settings files: one `KEY=VALUE` per line, `#` comments.

use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;

use crate::util::fs::{atomic_write, read_to_string};

/// Parse settings text.
///
/// Comment lines and lines without `=` are ignored; otherwise the line is
/// split on the first `=` and both sides are trimmed.
pub fn parse_settings(contents: &str) -> IndexMap<String, String> {
    let mut settings = IndexMap::new();

    for line in contents.lines() {
        if line.trim_start().starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        settings.insert(key.to_string(), value.trim().to_string());
    }

    settings
}

/// Load a settings file.
pub fn load_settings(path: &Path) -> Result<IndexMap<String, String>> {
    let contents = read_to_string(path)?;
    Ok(parse_settings(&contents))
}

/// Render settings in file format.
pub fn render_settings<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut out = String::from("# Generated by wheelwright env\n");
    for (key, value) in entries {
        out.push_str(key);
        out.push('=');
        out.push_str(value);
        out.push('\n');
    }
    out
}

/// Write a settings file atomically.
pub fn write_settings<'a, I>(path: &Path, entries: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    atomic_write(path, render_settings(entries).as_bytes())
        .with_context(|| format!("failed to write settings file: {}", path.display()))
}
