//! Ordered CMake cache definitions.
//!
//! Entries keep the position of their first insertion; setting an existing
//! key replaces the value in place. Values are passed through verbatim.

use indexmap::IndexMap;

/// Prefix used when handing defines to a PEP 517 frontend (`pip wheel`)
/// for scikit-build-core to forward to CMake.
pub const NESTED_DEFINE_PREFIX: &str = "--config-settings=cmake.define.";

/// Accumulated `KEY[:TYPE]=VALUE` cache entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CMakeDefines {
    entries: IndexMap<String, String>,
}

impl CMakeDefines {
    pub fn new() -> Self {
        CMakeDefines::default()
    }

    /// Insert or replace a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Get a value, or `default` when the key is absent.
    pub fn get<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.entries.get(key).map(String::as_str).unwrap_or(default)
    }

    /// Apply `set` for each pair, in order.
    pub fn update<I, K, V>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in entries {
            self.set(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Render as `-D<key>=<value>` arguments for `cmake`.
    pub fn to_cmake_args(&self) -> Vec<String> {
        self.to_nested_args("-D")
    }

    /// Render as `<prefix><key>=<value>` arguments.
    pub fn to_nested_args(&self, prefix: &str) -> Vec<String> {
        self.entries
            .iter()
            .map(|(key, value)| format!("{prefix}{key}={value}"))
            .collect()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for CMakeDefines {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut defines = CMakeDefines::new();
        defines.update(iter);
        defines
    }
}
