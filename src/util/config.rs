//! Configuration file support for wheelwright.
//!
//! wheelwright supports two configuration file locations:
//! - Global: `~/.wheelwright/config.toml` - User-wide defaults
//! - Project: `wheelwright.toml` - Project-specific settings
//!
//! Project config takes precedence over global config. Both are optional.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Name of the project configuration file.
pub const PROJECT_CONFIG_FILE: &str = "wheelwright.toml";

/// wheelwright configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Distribution metadata used by the smoke test
    pub package: PackageConfig,

    /// Build settings
    pub build: BuildConfig,

    /// Base CMake defines, keyed `NAME:TYPE`
    pub defines: IndexMap<String, String>,

    /// Extra defaults for resolved configuration keys
    pub env: IndexMap<String, String>,
}

/// Package identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Distribution name installed by the smoke test
    pub name: Option<String>,

    /// Module imported by the smoke test (defaults to `name`)
    pub import: Option<String>,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Python versions to build wheels for, e.g. `["3.10", "3.11"]`
    pub python_versions: Vec<String>,

    /// CMake build type (Release, RelWithDebInfo, ...)
    pub build_type: Option<String>,

    /// Package the native build tree as a reusable archive
    pub tarball: Option<bool>,

    /// Remove intermediate build trees after a successful build
    pub cleanup: Option<bool>,
}

impl PackageConfig {
    /// Name of the module the smoke test imports.
    pub fn import_name(&self) -> Option<&str> {
        self.import.as_deref().or(self.name.as_deref())
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.package.name.is_some() {
            self.package.name = other.package.name;
        }
        if other.package.import.is_some() {
            self.package.import = other.package.import;
        }

        if !other.build.python_versions.is_empty() {
            self.build.python_versions = other.build.python_versions;
        }
        if other.build.build_type.is_some() {
            self.build.build_type = other.build.build_type;
        }
        if other.build.tarball.is_some() {
            self.build.tarball = other.build.tarball;
        }
        if other.build.cleanup.is_some() {
            self.build.cleanup = other.build.cleanup;
        }

        self.defines.extend(other.defines);
        self.env.extend(other.env);
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (`wheelwright.toml`)
/// 2. Global config (`~/.wheelwright/config.toml`)
/// 3. Defaults
///
/// Missing files are skipped; a file that exists but does not parse is an error.
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Result<Config> {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load(global_path)?);
        }
    }

    if project_path.exists() {
        config.merge(Config::load(project_path)?);
    }

    Ok(config)
}

/// Get the global wheelwright config directory (~/.wheelwright).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".wheelwright"))
}

/// Get the global config path (~/.wheelwright/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}
