//! Environment resolution.
//!
//! Produces the single flat configuration every later step reads. Layers,
//! from lowest to highest priority:
//!
//! 1. computed defaults (platform, tools, version) and `[env]` from config
//! 2. inherited process environment
//! 3. the input settings file
//! 4. trailing `KEY=VALUE` overrides (`KEY=UNSET` removes the key)
//!
//! Defaults are only computed for keys no higher layer supplies, so a
//! missing tool is not an error when its path was given explicitly.

pub mod error;
pub mod overrides;
pub mod settings;
pub mod tools;
pub mod version;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;

use crate::core::{Arch, HostOs, HostPlatform};

pub use error::EnvError;
pub use overrides::{is_valid_key, parse_overrides, Override, UNSET};
pub use settings::{load_settings, parse_settings, write_settings};
pub use tools::{PathLocator, RequiredTool, ToolLocator, REQUIRED_TOOLS};

/// Well-known configuration keys.
pub mod keys {
    pub const PLATFORM_OS: &str = "PLATFORM_OS";
    pub const PLATFORM_ARCH: &str = "PLATFORM_ARCH";
    pub const SOURCE_DIR: &str = "SOURCE_DIR";
    pub const BUILD_DIR_ROOT: &str = "BUILD_DIR_ROOT";
    pub const BUILD_TYPE: &str = "BUILD_TYPE";
    pub const SOURCE_GIT_REF: &str = "SOURCE_GIT_REF";
    pub const PACKAGE_VERSION: &str = "PACKAGE_VERSION";
    pub const CMAKE_EXECUTABLE: &str = "CMAKE_EXECUTABLE";
    pub const NINJA_EXECUTABLE: &str = "NINJA_EXECUTABLE";
    pub const DOXYGEN_EXECUTABLE: &str = "DOXYGEN_EXECUTABLE";
    pub const MANYLINUX_VERSION: &str = "MANYLINUX_VERSION";
    pub const MACOSX_DEPLOYMENT_TARGET: &str = "MACOSX_DEPLOYMENT_TARGET";
    pub const REUSE_BUILD_CACHE: &str = "REUSE_BUILD_CACHE";
    pub const CC: &str = "CC";
    pub const CXX: &str = "CXX";
}

/// Compiler variables forwarded to native build tools.
pub const COMPILER_VARS: &[&str] = &["CC", "CXX", "CFLAGS", "CXXFLAGS", "LDFLAGS"];

/// Per-shell variables that never describe the build.
const SHELL_VARS: &[&str] = &["_", "PWD", "OLDPWD", "SHLVL"];

/// Version used when the source tree carries no usable tag.
pub const FALLBACK_VERSION: &str = "0.0.0";

/// The explicit inputs to resolution, lowest priority first.
#[derive(Debug, Clone, Default)]
pub struct EnvLayers {
    /// `[env]` table from the config file
    pub config: IndexMap<String, String>,
    /// Inherited process environment (already filtered)
    pub environment: IndexMap<String, String>,
    /// Input settings file
    pub file: IndexMap<String, String>,
    /// Trailing command-line overrides
    pub overrides: Vec<Override>,
}

impl EnvLayers {
    /// Adopt the inherited process environment as a layer.
    ///
    /// Shell bookkeeping variables are skipped, as are names that are not
    /// valid keys and values spanning lines, which a settings file cannot
    /// hold.
    pub fn with_process_environment<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.environment = vars
            .into_iter()
            .filter(|(k, v)| {
                is_valid_key(k) && !SHELL_VARS.contains(&k.as_str()) && !v.contains(['\n', '\r'])
            })
            .collect();
        self
    }

    /// Whether any explicit layer supplies (or removes) `key`.
    fn supplies(&self, key: &str) -> bool {
        self.config.contains_key(key)
            || self.environment.contains_key(key)
            || self.file.contains_key(key)
            || self.overrides.iter().any(|o| o.key() == key)
    }

    /// Value of `key` after merging the explicit layers.
    pub fn lookup(&self, key: &str) -> Option<&str> {
        for o in self.overrides.iter().rev() {
            match o {
                Override::Set { key: k, value } if k == key => return Some(value.as_str()),
                Override::Unset { key: k } if k == key => return None,
                _ => {}
            }
        }
        self.file
            .get(key)
            .or_else(|| self.environment.get(key))
            .or_else(|| self.config.get(key))
            .map(String::as_str)
    }
}

/// Merge layers in ascending priority onto `base`.
pub fn merge_layers(base: IndexMap<String, String>, layers: &EnvLayers) -> IndexMap<String, String> {
    let mut merged = base;

    for layer in [&layers.config, &layers.environment, &layers.file] {
        for (key, value) in layer {
            merged.insert(key.clone(), value.clone());
        }
    }

    for o in &layers.overrides {
        match o {
            Override::Set { key, value } => {
                merged.insert(key.clone(), value.clone());
            }
            Override::Unset { key } => {
                merged.shift_remove(key);
            }
        }
    }

    merged
}

/// Computes defaults and merges layers.
pub struct EnvResolver<'a> {
    host: HostPlatform,
    cwd: PathBuf,
    build_type: String,
    locator: &'a dyn ToolLocator,
}

impl<'a> EnvResolver<'a> {
    pub fn new(host: HostPlatform, cwd: impl Into<PathBuf>, locator: &'a dyn ToolLocator) -> Self {
        EnvResolver {
            host,
            cwd: cwd.into(),
            build_type: "Release".to_string(),
            locator,
        }
    }

    /// Default build type when no layer sets `BUILD_TYPE`.
    pub fn with_build_type(mut self, build_type: impl Into<String>) -> Self {
        self.build_type = build_type.into();
        self
    }

    /// Resolve the full configuration.
    pub fn resolve(&self, layers: &EnvLayers) -> Result<ResolvedEnv> {
        let defaults = self.compute_defaults(layers)?;
        Ok(ResolvedEnv::from_map(merge_layers(defaults, layers)))
    }

    fn compute_defaults(&self, layers: &EnvLayers) -> Result<IndexMap<String, String>> {
        let mut defaults = IndexMap::new();
        let mut put = |key: &str, value: String| {
            defaults.insert(key.to_string(), value);
        };
        let missing = |key: &str| !layers.supplies(key);

        if missing(keys::PLATFORM_OS) {
            put(keys::PLATFORM_OS, self.host.os.to_string());
        }
        if missing(keys::PLATFORM_ARCH) {
            put(keys::PLATFORM_ARCH, self.host.arch.to_string());
        }

        let source_dir = layers
            .lookup(keys::SOURCE_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.cwd.clone());
        if missing(keys::SOURCE_DIR) {
            put(keys::SOURCE_DIR, source_dir.display().to_string());
        }
        if missing(keys::BUILD_DIR_ROOT) {
            put(keys::BUILD_DIR_ROOT, source_dir.join("build").display().to_string());
        }
        if missing(keys::BUILD_TYPE) {
            put(keys::BUILD_TYPE, self.build_type.clone());
        }

        if missing(keys::SOURCE_GIT_REF) {
            if let Some(git_ref) = version::source_ref(&source_dir)
                .with_context(|| format!("failed to inspect {}", source_dir.display()))?
            {
                put(keys::SOURCE_GIT_REF, git_ref);
            }
        }
        if missing(keys::PACKAGE_VERSION) {
            let version = version::source_version(&source_dir)
                .with_context(|| format!("failed to compute version of {}", source_dir.display()))?
                .unwrap_or_else(|| FALLBACK_VERSION.to_string());
            put(keys::PACKAGE_VERSION, version);
        }

        for tool in REQUIRED_TOOLS {
            if missing(tool.key) {
                let path = tool.resolve(self.locator)?;
                put(tool.key, path.display().to_string());
            }
        }

        match self.host.os {
            HostOs::Linux if missing(keys::MANYLINUX_VERSION) => {
                put(keys::MANYLINUX_VERSION, "_2_28".to_string());
            }
            HostOs::Darwin if missing(keys::MACOSX_DEPLOYMENT_TARGET) => {
                let target = if self.host.arch == Arch::Arm64 { "11.0" } else { "10.9" };
                put(keys::MACOSX_DEPLOYMENT_TARGET, target.to_string());
            }
            _ => {}
        }

        if missing(keys::REUSE_BUILD_CACHE) {
            put(keys::REUSE_BUILD_CACHE, "OFF".to_string());
        }

        Ok(defaults)
    }
}

/// The resolved configuration: one flat, ordered string mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedEnv {
    values: IndexMap<String, String>,
}

impl ResolvedEnv {
    pub fn from_map(values: IndexMap<String, String>) -> Self {
        ResolvedEnv { values }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Get a key that must be present.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .with_context(|| format!("configuration key `{key}` is not set"))
    }

    /// Get a key that must be present, as a path.
    pub fn require_path(&self, key: &str) -> Result<PathBuf> {
        self.require(key).map(PathBuf::from)
    }

    /// Interpret a key as a CMake-style boolean (`ON`, `1`, `TRUE`, `YES`).
    pub fn get_bool(&self, key: &str) -> bool {
        matches!(
            self.get(key).map(str::to_ascii_uppercase).as_deref(),
            Some("ON" | "1" | "TRUE" | "YES")
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Write as a settings file.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        write_settings(path, self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn map(entries: &[(&str, &str)]) -> IndexMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn fake_tools(name: &str) -> Option<PathBuf> {
        Some(PathBuf::from(format!("/opt/tools/bin/{name}")))
    }

    fn no_tools(_: &str) -> Option<PathBuf> {
        None
    }

    fn linux() -> HostPlatform {
        HostPlatform::new(HostOs::Linux, Arch::X64)
    }

    #[test]
    fn test_priority_resolution() {
        let env = map(&[("A", "1")]);
        let file = map(&[("A", "2")]);

        let all = EnvLayers {
            environment: env.clone(),
            file: file.clone(),
            overrides: parse_overrides(["A=3"]).unwrap(),
            ..Default::default()
        };
        assert_eq!(merge_layers(IndexMap::new(), &all)["A"], "3");

        let no_override = EnvLayers {
            environment: env.clone(),
            file,
            ..Default::default()
        };
        assert_eq!(merge_layers(IndexMap::new(), &no_override)["A"], "2");

        let env_only = EnvLayers {
            environment: env,
            ..Default::default()
        };
        assert_eq!(merge_layers(IndexMap::new(), &env_only)["A"], "1");
    }

    #[test]
    fn test_unset_removes_key_entirely() {
        let tmp = TempDir::new().unwrap();
        let layers = EnvLayers {
            file: map(&[("EXTRA", "x")]),
            overrides: parse_overrides(["EXTRA=UNSET", "REUSE_BUILD_CACHE=UNSET"]).unwrap(),
            ..Default::default()
        };

        let resolved = EnvResolver::new(linux(), tmp.path(), &fake_tools)
            .resolve(&layers)
            .unwrap();

        assert_eq!(resolved.get("EXTRA"), None);
        assert_eq!(resolved.get(keys::REUSE_BUILD_CACHE), None);
    }

    #[test]
    fn test_defaults_for_plain_directory() {
        let tmp = TempDir::new().unwrap();
        let resolved = EnvResolver::new(linux(), tmp.path(), &fake_tools)
            .resolve(&EnvLayers::default())
            .unwrap();

        assert_eq!(resolved.get(keys::PLATFORM_OS), Some("linux"));
        assert_eq!(resolved.get(keys::PLATFORM_ARCH), Some("x64"));
        assert_eq!(resolved.get(keys::BUILD_TYPE), Some("Release"));
        assert_eq!(resolved.get(keys::PACKAGE_VERSION), Some(FALLBACK_VERSION));
        assert_eq!(resolved.get(keys::SOURCE_GIT_REF), None);
        assert_eq!(resolved.get(keys::MANYLINUX_VERSION), Some("_2_28"));
        assert_eq!(resolved.get(keys::MACOSX_DEPLOYMENT_TARGET), None);
        assert_eq!(
            resolved.get(keys::CMAKE_EXECUTABLE),
            Some("/opt/tools/bin/cmake")
        );
        assert_eq!(
            resolved.require_path(keys::BUILD_DIR_ROOT).unwrap(),
            tmp.path().join("build")
        );
    }

    #[test]
    fn test_build_dir_follows_supplied_source_dir() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(&src).unwrap();
        let layers = EnvLayers {
            overrides: vec![Override::Set {
                key: keys::SOURCE_DIR.to_string(),
                value: src.display().to_string(),
            }],
            ..Default::default()
        };

        let resolved = EnvResolver::new(linux(), tmp.path(), &fake_tools)
            .resolve(&layers)
            .unwrap();

        assert_eq!(resolved.require_path(keys::BUILD_DIR_ROOT).unwrap(), src.join("build"));
    }

    #[test]
    fn test_missing_tool_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let err = EnvResolver::new(linux(), tmp.path(), &no_tools)
            .resolve(&EnvLayers::default())
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<EnvError>(),
            Some(EnvError::MissingTool { .. })
        ));
    }

    #[test]
    fn test_supplied_tools_skip_discovery() {
        let tmp = TempDir::new().unwrap();
        let layers = EnvLayers {
            file: map(&[
                ("CMAKE_EXECUTABLE", "/x/cmake"),
                ("NINJA_EXECUTABLE", "/x/ninja"),
            ]),
            overrides: parse_overrides(["DOXYGEN_EXECUTABLE=/x/doxygen"]).unwrap(),
            ..Default::default()
        };

        let resolved = EnvResolver::new(linux(), tmp.path(), &no_tools)
            .resolve(&layers)
            .unwrap();

        assert_eq!(resolved.get(keys::CMAKE_EXECUTABLE), Some("/x/cmake"));
        assert_eq!(resolved.get(keys::DOXYGEN_EXECUTABLE), Some("/x/doxygen"));
    }

    #[test]
    fn test_darwin_deployment_target() {
        let tmp = TempDir::new().unwrap();
        let resolved = EnvResolver::new(
            HostPlatform::new(HostOs::Darwin, Arch::Arm64),
            tmp.path(),
            &fake_tools,
        )
        .resolve(&EnvLayers::default())
        .unwrap();

        assert_eq!(resolved.get(keys::MACOSX_DEPLOYMENT_TARGET), Some("11.0"));
        assert_eq!(resolved.get(keys::MANYLINUX_VERSION), None);
    }

    #[test]
    fn test_config_env_is_lowest_explicit_layer() {
        let tmp = TempDir::new().unwrap();
        let layers = EnvLayers {
            config: map(&[("MANYLINUX_VERSION", "_2_34"), ("BUILD_TYPE", "Debug")]),
            environment: map(&[("BUILD_TYPE", "RelWithDebInfo")]),
            ..Default::default()
        };

        let resolved = EnvResolver::new(linux(), tmp.path(), &fake_tools)
            .resolve(&layers)
            .unwrap();

        assert_eq!(resolved.get(keys::MANYLINUX_VERSION), Some("_2_34"));
        assert_eq!(resolved.get(keys::BUILD_TYPE), Some("RelWithDebInfo"));
    }

    #[test]
    fn test_process_environment_is_a_full_layer() {
        let layers = EnvLayers::default().with_process_environment(vec![
            ("WW_INHERITED".to_string(), "1".to_string()),
            ("CC".to_string(), "clang".to_string()),
            ("PWD".to_string(), "/somewhere".to_string()),
            ("BASH_FUNC_f%%".to_string(), "() { :; }".to_string()),
            ("MULTILINE".to_string(), "a\nb".to_string()),
        ]);

        let keys: Vec<_> = layers.environment.keys().cloned().collect();
        assert_eq!(keys, vec!["WW_INHERITED", "CC"]);

        let tmp = TempDir::new().unwrap();
        let resolved = EnvResolver::new(linux(), tmp.path(), &fake_tools)
            .resolve(&layers)
            .unwrap();
        assert_eq!(resolved.get("WW_INHERITED"), Some("1"));
    }

    #[test]
    fn test_get_bool() {
        let env = ResolvedEnv::from_map(map(&[("A", "on"), ("B", "OFF"), ("C", "1")]));
        assert!(env.get_bool("A"));
        assert!(!env.get_bool("B"));
        assert!(env.get_bool("C"));
        assert!(!env.get_bool("MISSING"));
    }
}
