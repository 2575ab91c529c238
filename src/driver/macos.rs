//! macOS driver: python.org framework builds and `delocate`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::{BuildTarget, PlatformDriver};
use crate::core::{Arch, CMakeDefines, HostOs};
use crate::env::keys;
use crate::util::process::ProcessBuilder;

#[derive(Debug, Clone, Copy, Default)]
pub struct MacOsDriver;

/// Deployment target used when the configuration does not name one.
pub fn default_deployment_target(arch: &Arch) -> &'static str {
    match arch {
        Arch::Arm64 | Arch::Aarch64 => "11.0",
        _ => "10.9",
    }
}

impl PlatformDriver for MacOsDriver {
    fn os(&self) -> HostOs {
        HostOs::Darwin
    }

    fn python_candidates(&self, version: &str) -> Vec<PathBuf> {
        vec![
            PathBuf::from(format!(
                "/Library/Frameworks/Python.framework/Versions/{version}/bin/python{version}"
            )),
            PathBuf::from(format!("/opt/homebrew/opt/python@{version}/bin/python{version}")),
            PathBuf::from(format!("/usr/local/opt/python@{version}/bin/python{version}")),
        ]
    }

    fn repair_package(&self) -> &'static str {
        "delocate"
    }

    fn platform_defines(&self, target: &BuildTarget<'_>) -> Result<CMakeDefines> {
        let mut defines = CMakeDefines::new();
        defines.set(
            "CMAKE_OSX_DEPLOYMENT_TARGET:STRING",
            target.env.get_or(
                keys::MACOSX_DEPLOYMENT_TARGET,
                default_deployment_target(&target.arch),
            ),
        );
        defines.set("CMAKE_OSX_ARCHITECTURES:STRING", target.arch.wheel_machine());
        Ok(defines)
    }

    fn repair_wheel(&self, target: &BuildTarget<'_>, wheel: &Path, dest: &Path) -> Result<()> {
        let delocate = target.layout.venv_dir().join("bin").join("delocate-wheel");
        if !delocate.is_file() {
            anyhow::bail!("{} not found; re-run prepare_venv", delocate.display());
        }

        let deployment_target = target.env.get_or(
            keys::MACOSX_DEPLOYMENT_TARGET,
            default_deployment_target(&target.arch),
        );

        ProcessBuilder::new(&delocate)
            .args(["-v", "-w"])
            .arg(dest)
            .arg(wheel)
            .env(keys::MACOSX_DEPLOYMENT_TARGET, deployment_target)
            .run()
            .with_context(|| format!("failed to delocate {}", wheel.display()))
    }
}
