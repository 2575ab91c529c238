//! Tool invocations shared by every platform.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use walkdir::WalkDir;

use super::BuildTarget;
use crate::core::{CMakeDefines, NESTED_DEFINE_PREFIX};
use crate::env::{keys, ResolvedEnv, COMPILER_VARS};
use crate::util::fs::{ensure_dir, glob_files};
use crate::util::process::ProcessBuilder;

/// `"3.11"` -> `"311"`. Rejects anything but `MAJOR.MINOR`.
pub fn python_tag(version: &str) -> Result<String> {
    let valid = version
        .split_once('.')
        .map(|(major, minor)| {
            !major.is_empty()
                && !minor.is_empty()
                && major.chars().all(|c| c.is_ascii_digit())
                && minor.chars().all(|c| c.is_ascii_digit())
        })
        .unwrap_or(false);

    if !valid {
        bail!("invalid Python version `{}` (expected MAJOR.MINOR, e.g. 3.11)", version);
    }
    Ok(version.replace('.', ""))
}

/// Pass compiler settings and the macOS deployment target from the
/// resolved configuration to a child process.
pub fn with_build_env(mut cmd: ProcessBuilder, env: &ResolvedEnv) -> ProcessBuilder {
    for key in COMPILER_VARS
        .iter()
        .copied()
        .chain([keys::MACOSX_DEPLOYMENT_TARGET])
    {
        if let Some(value) = env.get(key) {
            cmd = cmd.env(key, value);
        }
    }
    cmd
}

/// Defines every platform passes to CMake.
pub fn base_defines(target: &BuildTarget<'_>, venv_python: &Path) -> CMakeDefines {
    let mut defines = CMakeDefines::new();
    defines.set("CMAKE_BUILD_TYPE:STRING", target.build_type());
    defines.set("Python3_EXECUTABLE:FILEPATH", venv_python.display().to_string());
    defines.set("BUILD_TESTING:BOOL", "OFF");

    if let Some(ninja) = target.env.get(keys::NINJA_EXECUTABLE) {
        defines.set("CMAKE_MAKE_PROGRAM:FILEPATH", ninja);
    }
    if let Some(doxygen) = target.env.get(keys::DOXYGEN_EXECUTABLE) {
        defines.set("DOXYGEN_EXECUTABLE:FILEPATH", doxygen);
    }

    let roots = target.module_roots();
    if !roots.is_empty() {
        let joined = roots
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(";");
        defines.set("EXTERNAL_MODULE_ROOTS:PATH", joined);
    }

    defines
}

/// Create a virtual environment with `python -m venv`.
pub fn create_venv(python: &Path, venv: &Path) -> Result<()> {
    tracing::info!("Creating virtual environment {}", venv.display());
    ProcessBuilder::new(python)
        .args(["-m", "venv"])
        .arg(venv)
        .run()
}

/// Install or upgrade packages into the environment owning `python`.
pub fn pip_install(python: &Path, packages: &[&str]) -> Result<()> {
    ProcessBuilder::new(python)
        .args(["-m", "pip", "install", "--upgrade"])
        .args(packages)
        .run()
}

/// Configure the native tree with the Ninja generator.
pub fn cmake_configure(
    cmake: &Path,
    source_dir: &Path,
    build_dir: &Path,
    defines: &CMakeDefines,
    env: &ResolvedEnv,
) -> Result<()> {
    ensure_dir(build_dir)?;

    let cmd = ProcessBuilder::new(cmake)
        .arg("-S")
        .arg(source_dir)
        .arg("-B")
        .arg(build_dir)
        .args(["-G", "Ninja"])
        .args(defines.to_cmake_args());

    with_build_env(cmd, env)
        .run()
        .context("CMake configuration failed")
}

/// Build a configured native tree.
pub fn cmake_build(cmake: &Path, build_dir: &Path, build_type: &str, env: &ResolvedEnv) -> Result<()> {
    if !build_dir.join("CMakeCache.txt").is_file() {
        bail!(
            "{} is not a configured CMake build tree",
            build_dir.display()
        );
    }

    let cmd = ProcessBuilder::new(cmake)
        .arg("--build")
        .arg(build_dir)
        .args(["--config", build_type]);

    with_build_env(cmd, env).run().context("native build failed")
}

/// Build wheels for `source_dir` into `out_dir` through `pip wheel`,
/// reusing the native tree at `build_dir`.
pub fn pip_wheel(
    python: &Path,
    source_dir: &Path,
    out_dir: &Path,
    build_dir: &Path,
    defines: &CMakeDefines,
    env: &ResolvedEnv,
) -> Result<()> {
    let mut cmd = ProcessBuilder::new(python)
        .args(["-m", "pip", "wheel", "--no-deps", "--no-build-isolation"])
        .arg("-w")
        .arg(out_dir)
        .arg(format!("--config-settings=build-dir={}", build_dir.display()))
        .args(defines.to_nested_args(NESTED_DEFINE_PREFIX))
        .arg(source_dir);

    if let Some(version) = env.get(keys::PACKAGE_VERSION) {
        cmd = cmd.env("SETUPTOOLS_SCM_PRETEND_VERSION", version);
    }

    with_build_env(cmd, env).run().context("wheel build failed")
}

/// Wheels directly inside `dir`.
pub fn find_wheels(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    glob_files(dir, "*.whl")
}

/// Install `wheels` and import the package from outside the source tree.
pub fn smoke_test(python: &Path, wheels: &[PathBuf], import: Option<&str>, cwd: &Path) -> Result<()> {
    ProcessBuilder::new(python)
        .args(["-m", "pip", "install", "--force-reinstall"])
        .args(wheels)
        .cwd(cwd)
        .run()
        .context("failed to install built wheels")?;

    let Some(module) = import else {
        tracing::warn!("no [package] import name configured, skipping import check");
        return Ok(());
    };

    ProcessBuilder::new(python)
        .arg("-c")
        .arg(format!("import {module}"))
        .cwd(cwd)
        .exec_and_check()
        .with_context(|| format!("`import {module}` failed"))?;

    tracing::info!("Imported `{}`", module);
    Ok(())
}

/// Write a gzip-compressed tar of `src_dir`.
///
/// Entries live under a single top-level directory named after the archive
/// (`foo.tar.gz` unpacks into `foo/`), added in file-name order.
pub fn create_tarball(src_dir: &Path, dest: &Path) -> Result<()> {
    let stem = tarball_stem(dest)?;
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }

    tracing::info!("Packaging {} into {}", src_dir.display(), dest.display());

    let file = File::create(dest)
        .with_context(|| format!("failed to create archive: {}", dest.display()))?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    builder.follow_symlinks(false);

    for entry in WalkDir::new(src_dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", src_dir.display()))?;
        let relative = entry.path().strip_prefix(src_dir)?;
        let name = Path::new(&stem).join(relative);

        builder
            .append_path_with_name(entry.path(), &name)
            .with_context(|| format!("failed to add {} to archive", entry.path().display()))?;
    }

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .with_context(|| format!("failed to finalize archive: {}", dest.display()))?;

    Ok(())
}

fn tarball_stem(dest: &Path) -> Result<String> {
    let file_name = dest
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("invalid archive path: {}", dest.display()))?;

    let stem = file_name
        .strip_suffix(".tar.gz")
        .or_else(|| file_name.strip_suffix(".tgz"))
        .unwrap_or(file_name);
    Ok(stem.to_string())
}
