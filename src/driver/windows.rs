//! Windows driver: `C:\PythonXY` installs and `delvewheel`.

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{BuildTarget, PlatformDriver};
use crate::core::HostOs;
use crate::util::process::ProcessBuilder;

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsDriver;

impl PlatformDriver for WindowsDriver {
    fn os(&self) -> HostOs {
        HostOs::Windows
    }

    fn python_candidates(&self, version: &str) -> Vec<PathBuf> {
        let tag = version.replace('.', "");
        vec![
            PathBuf::from(format!(r"C:\Python{tag}-x64\python.exe")),
            PathBuf::from(format!(r"C:\Python{tag}\python.exe")),
        ]
    }

    fn venv_python(&self, venv: &Path) -> PathBuf {
        venv.join("Scripts").join("python.exe")
    }

    fn repair_package(&self) -> &'static str {
        "delvewheel"
    }

    fn repair_wheel(&self, target: &BuildTarget<'_>, wheel: &Path, dest: &Path) -> Result<()> {
        // DLLs produced by the native build live next to its executables
        let native_bin = target.layout.native_dir().join("bin");

        ProcessBuilder::new(self.venv_python(&target.layout.venv_dir()))
            .args(["-m", "delvewheel", "repair", "--add-path"])
            .arg(&native_bin)
            .arg("-w")
            .arg(dest)
            .arg(wheel)
            .run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venv_layout() {
        assert_eq!(
            WindowsDriver.venv_python(Path::new("venv")),
            Path::new("venv").join("Scripts").join("python.exe")
        );
        assert_eq!(
            WindowsDriver.python_candidates("3.11")[0],
            PathBuf::from(r"C:\Python311-x64\python.exe")
        );
    }
}
