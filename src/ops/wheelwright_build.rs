//! Implementation of `wheelwright build`.

use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::core::{parse_module_specs, Arch, CMakeDefines, HostOs};
use crate::driver::common::python_tag;
use crate::driver::{build_target, driver_for, BuildLayout, BuildOptions, BuildTarget};
use crate::env::{keys, EnvError, PathLocator};
use crate::ops::wheelwright_env::resolve_env;
use crate::util::GlobalContext;

/// Options for the build command.
#[derive(Debug, Clone, Default)]
pub struct WheelBuildOptions {
    /// Settings file produced by `wheelwright env`
    pub env_file: Option<PathBuf>,

    /// Trailing `KEY=VALUE` overrides
    pub overrides: Vec<String>,

    /// Python versions to build for (empty = from config)
    pub python_versions: Vec<String>,

    /// Keep intermediate build trees
    pub no_cleanup: bool,

    /// Package the native build tree
    pub tarball: bool,

    /// Local module source roots
    pub module_roots: Vec<PathBuf>,

    /// Remote modules, `org/repo@tag:org2/repo2@tag2`
    pub deps: Option<String>,

    /// `KEY[:TYPE]=VALUE` CMake define overrides
    pub defines: Vec<String>,
}

/// A target whose step list ran to completion.
#[derive(Debug, Clone)]
pub struct BuiltTarget {
    pub name: String,
    pub report: PathBuf,
    pub dist: PathBuf,
}

/// Parse a `-D KEY[:TYPE]=VALUE` argument.
pub fn parse_define(entry: &str) -> Result<(String, String)> {
    match entry.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => bail!("malformed define `{}`: expected KEY[:TYPE]=VALUE", entry),
    }
}

/// Build wheels for every requested Python version, in order.
///
/// Stops at the first target whose step list fails; earlier targets keep
/// their completed reports.
pub fn build_wheels(ctx: &GlobalContext, opts: &WheelBuildOptions) -> Result<Vec<BuiltTarget>> {
    let config = ctx.load_config()?;

    let defines = opts
        .defines
        .iter()
        .map(|d| parse_define(d))
        .collect::<Result<CMakeDefines>>()?;

    let modules = match &opts.deps {
        Some(spec) => parse_module_specs(spec)?,
        None => Vec::new(),
    };

    let versions = if opts.python_versions.is_empty() {
        config.build.python_versions.clone()
    } else {
        opts.python_versions.clone()
    };
    if versions.is_empty() {
        bail!("no Python versions requested (pass --python or set build.python_versions)");
    }
    for version in &versions {
        python_tag(version)?;
    }

    let env = resolve_env(ctx, &config, opts.env_file.as_deref(), &opts.overrides, &PathLocator)?;

    let os_name = env.require(keys::PLATFORM_OS)?;
    let os = HostOs::from_os_name(os_name);
    if os == HostOs::Unknown {
        return Err(EnvError::UnsupportedPlatform {
            os: os_name.to_string(),
        }
        .into());
    }
    let driver = driver_for(os)?;
    let arch = Arch::normalize(env.require(keys::PLATFORM_ARCH)?, os);

    let options = BuildOptions {
        cleanup: !opts.no_cleanup && config.build.cleanup.unwrap_or(true),
        tarball: opts.tarball || config.build.tarball.unwrap_or(false),
        module_roots: opts
            .module_roots
            .iter()
            .map(|p| ctx.resolve_path(p))
            .collect(),
        modules,
        defines,
    };

    let root = ctx.resolve_path(&env.require_path(keys::BUILD_DIR_ROOT)?);

    let mut built = Vec::new();
    for version in versions {
        let target = BuildTarget {
            env: &env,
            config: &config,
            options: &options,
            arch: arch.clone(),
            layout: BuildLayout::new(&root, os, &arch, &version),
            python_version: version,
        };

        build_target(driver.as_ref(), &target)?;

        built.push(BuiltTarget {
            name: target.layout.name().to_string(),
            report: target.layout.report_path(),
            dist: target.layout.dist_dir(),
        });
    }

    Ok(built)
}
