//! Linux driver: manylinux interpreters and `auditwheel`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{BuildTarget, PlatformDriver};
use crate::core::{Arch, HostOs};
use crate::env::keys;
use crate::util::process::ProcessBuilder;

/// Policy used when the configuration does not name one.
pub const DEFAULT_MANYLINUX_VERSION: &str = "_2_28";

#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxDriver;

/// `auditwheel` platform tag, e.g. `manylinux_2_28_x86_64`.
pub fn manylinux_platform(manylinux_version: &str, arch: &Arch) -> String {
    format!("manylinux{}_{}", manylinux_version, arch.wheel_machine())
}

impl PlatformDriver for LinuxDriver {
    fn os(&self) -> HostOs {
        HostOs::Linux
    }

    fn python_candidates(&self, version: &str) -> Vec<PathBuf> {
        let tag = version.replace('.', "");
        vec![
            // manylinux images
            PathBuf::from(format!("/opt/python/cp{tag}-cp{tag}/bin/python")),
            PathBuf::from(format!("/usr/bin/python{version}")),
        ]
    }

    fn repair_package(&self) -> &'static str {
        "auditwheel"
    }

    fn repair_wheel(&self, target: &BuildTarget<'_>, wheel: &Path, dest: &Path) -> Result<()> {
        let policy = target
            .env
            .get_or(keys::MANYLINUX_VERSION, DEFAULT_MANYLINUX_VERSION);
        let platform = manylinux_platform(policy, &target.arch);

        ProcessBuilder::new(self.venv_python(&target.layout.venv_dir()))
            .args(["-m", "auditwheel", "repair", "--plat", &platform, "-w"])
            .arg(dest)
            .arg(wheel)
            .run()
    }
}
