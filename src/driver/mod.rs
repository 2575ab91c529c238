//! Platform build drivers.
//!
//! A driver supplies the actions for each named build step. The shared
//! steps are default methods on [`PlatformDriver`]; platforms override
//! interpreter discovery, virtual environment layout, CMake defines and the
//! wheel repair tool. The driver is picked once per invocation by
//! [`driver_for`] and the resulting step list is handed to a
//! [`BuildOrchestrator`].
//!
//! Every step re-derives what it needs from the [`BuildLayout`] and the
//! resolved configuration, since any prefix of the step list may have been
//! completed by an earlier invocation.

pub mod common;
pub mod linux;
pub mod macos;
pub mod windows;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::core::{Arch, CMakeDefines, HostOs, RemoteModule};
use crate::env::{keys, EnvError, ResolvedEnv};
use crate::orchestrator::BuildOrchestrator;
use crate::util::config::Config;
use crate::util::fs::{ensure_dir, remove_dir_all_if_exists};
use crate::util::process::find_executable;

pub use linux::LinuxDriver;
pub use macos::MacOsDriver;
pub use windows::WindowsDriver;

/// Step names, in execution order.
pub mod steps {
    pub const PREPARE_VENV: &str = "prepare_venv";
    pub const FETCH_MODULES: &str = "fetch_modules";
    pub const CONFIGURE_NATIVE: &str = "configure_native";
    pub const BUILD_NATIVE: &str = "build_native";
    pub const BUILD_WHEELS: &str = "build_wheels";
    pub const FIXUP_WHEELS: &str = "fixup_wheels";
    pub const SMOKE_TEST: &str = "smoke_test";
    pub const BUILD_TARBALL: &str = "build_tarball";
    pub const CLEANUP: &str = "cleanup";

    /// Every step a build can have, in execution order.
    pub const ALL: &[&str] = &[
        PREPARE_VENV,
        FETCH_MODULES,
        CONFIGURE_NATIVE,
        BUILD_NATIVE,
        BUILD_WHEELS,
        FIXUP_WHEELS,
        SMOKE_TEST,
        BUILD_TARBALL,
        CLEANUP,
    ];
}

/// Directory under the build root that holds one report per target.
pub const REPORTS_DIR: &str = "reports";

/// Directory under the build root that remote modules are cloned into.
pub const MODULES_DIR: &str = "modules";

/// Per-invocation build choices shared by every target.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Remove intermediate trees once a target is built
    pub cleanup: bool,
    /// Package the native build tree as an archive
    pub tarball: bool,
    /// Local module source roots handed to CMake
    pub module_roots: Vec<PathBuf>,
    /// Remote modules fetched before configuring
    pub modules: Vec<RemoteModule>,
    /// `-D` overrides from the command line, applied last
    pub defines: CMakeDefines,
}

/// Filesystem layout of one build target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    root: PathBuf,
    name: String,
}

impl BuildLayout {
    /// Layout for `<os>-<arch>-py<version>` under `root`.
    pub fn new(root: impl Into<PathBuf>, os: HostOs, arch: &Arch, python_version: &str) -> Self {
        BuildLayout {
            root: root.into(),
            name: format!("{}-{}-py{}", os, arch, python_version),
        }
    }

    /// Target name, e.g. `linux-x64-py3.11`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn target_dir(&self) -> PathBuf {
        self.root.join(&self.name)
    }

    pub fn venv_dir(&self) -> PathBuf {
        self.target_dir().join("venv")
    }

    /// CMake binary tree.
    pub fn native_dir(&self) -> PathBuf {
        self.target_dir().join("native")
    }

    /// Wheels as produced by the build frontend.
    pub fn wheel_dir(&self) -> PathBuf {
        self.target_dir().join("wheels")
    }

    /// Repaired, distributable wheels.
    pub fn dist_dir(&self) -> PathBuf {
        self.target_dir().join("dist")
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.root.join(MODULES_DIR)
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join(REPORTS_DIR).join(format!("{}.json", self.name))
    }

    pub fn tarball_path(&self) -> PathBuf {
        self.dist_dir().join(format!("{}-native.tar.gz", self.name))
    }
}

/// Everything a step needs to build one target.
#[derive(Debug, Clone)]
pub struct BuildTarget<'a> {
    pub env: &'a ResolvedEnv,
    pub config: &'a Config,
    pub options: &'a BuildOptions,
    pub arch: Arch,
    pub python_version: String,
    pub layout: BuildLayout,
}

impl BuildTarget<'_> {
    pub fn source_dir(&self) -> Result<PathBuf> {
        self.env.require_path(keys::SOURCE_DIR)
    }

    pub fn build_type(&self) -> &str {
        self.env.get_or(keys::BUILD_TYPE, "Release")
    }

    /// Explicit module roots plus the checkouts of fetched modules.
    pub fn module_roots(&self) -> Vec<PathBuf> {
        let modules_dir = self.layout.modules_dir();
        self.options
            .module_roots
            .iter()
            .cloned()
            .chain(self.options.modules.iter().map(|m| modules_dir.join(&m.repo)))
            .collect()
    }
}

/// Platform-specific supplier of build step actions.
pub trait PlatformDriver {
    fn os(&self) -> HostOs;

    /// Interpreter locations tried before searching `PATH`.
    fn python_candidates(&self, version: &str) -> Vec<PathBuf>;

    /// Python package providing the wheel repair tool.
    fn repair_package(&self) -> &'static str;

    /// Bundle external shared libraries into `wheel`, writing to `dest`.
    fn repair_wheel(&self, target: &BuildTarget<'_>, wheel: &Path, dest: &Path) -> Result<()>;

    /// Interpreter inside a virtual environment.
    fn venv_python(&self, venv: &Path) -> PathBuf {
        venv.join("bin").join("python")
    }

    /// Defines only this platform needs.
    fn platform_defines(&self, _target: &BuildTarget<'_>) -> Result<CMakeDefines> {
        Ok(CMakeDefines::new())
    }

    /// Locate the base interpreter for a `MAJOR.MINOR` version.
    fn find_python(&self, version: &str) -> Result<PathBuf> {
        common::python_tag(version)?;

        let candidates = self.python_candidates(version);
        if let Some(found) = candidates.iter().find(|c| c.is_file()) {
            return Ok(found.clone());
        }

        find_executable(&format!("python{version}")).with_context(|| {
            format!(
                "Python {} not found (looked in {} and on PATH)",
                version,
                candidates
                    .iter()
                    .map(|c| c.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        })
    }

    /// Full define set: config and base first, then platform, compilers,
    /// and command-line overrides last.
    fn cmake_defines(&self, target: &BuildTarget<'_>) -> Result<CMakeDefines> {
        let mut defines = CMakeDefines::new();
        defines.update(target.config.defines.iter());
        let venv_python = self.venv_python(&target.layout.venv_dir());
        defines.update(common::base_defines(target, &venv_python).iter());
        defines.update(self.platform_defines(target)?.iter());

        if let Some(cc) = target.env.get(keys::CC) {
            defines.set("CMAKE_C_COMPILER:FILEPATH", cc);
        }
        if let Some(cxx) = target.env.get(keys::CXX) {
            defines.set("CMAKE_CXX_COMPILER:FILEPATH", cxx);
        }

        defines.update(target.options.defines.iter());
        Ok(defines)
    }

    fn prepare_venv(&self, target: &BuildTarget<'_>) -> Result<()> {
        let python = self.find_python(&target.python_version)?;
        let venv = target.layout.venv_dir();

        remove_dir_all_if_exists(&venv)?;
        common::create_venv(&python, &venv)?;
        common::pip_install(
            &self.venv_python(&venv),
            &["pip", "wheel", "scikit-build-core", self.repair_package()],
        )
    }

    fn fetch_modules(&self, target: &BuildTarget<'_>) -> Result<()> {
        let dest = target.layout.modules_dir();
        for module in &target.options.modules {
            crate::core::modules::fetch_module(module, &dest)?;
        }
        Ok(())
    }

    fn configure_native(&self, target: &BuildTarget<'_>) -> Result<()> {
        let cmake = target.env.require_path(keys::CMAKE_EXECUTABLE)?;
        let native = target.layout.native_dir();

        if !target.env.get_bool(keys::REUSE_BUILD_CACHE) {
            remove_dir_all_if_exists(&native)?;
        }

        common::cmake_configure(
            &cmake,
            &target.source_dir()?,
            &native,
            &self.cmake_defines(target)?,
            target.env,
        )
    }

    fn build_native(&self, target: &BuildTarget<'_>) -> Result<()> {
        let cmake = target.env.require_path(keys::CMAKE_EXECUTABLE)?;
        common::cmake_build(&cmake, &target.layout.native_dir(), target.build_type(), target.env)
    }

    fn build_wheels(&self, target: &BuildTarget<'_>) -> Result<()> {
        let out = target.layout.wheel_dir();
        remove_dir_all_if_exists(&out)?;
        ensure_dir(&out)?;

        common::pip_wheel(
            &self.venv_python(&target.layout.venv_dir()),
            &target.source_dir()?,
            &out,
            &target.layout.native_dir(),
            &self.cmake_defines(target)?,
            target.env,
        )
    }

    fn fixup_wheels(&self, target: &BuildTarget<'_>) -> Result<()> {
        let wheel_dir = target.layout.wheel_dir();
        let wheels = common::find_wheels(&wheel_dir)?;
        if wheels.is_empty() {
            bail!("no wheels found in {}", wheel_dir.display());
        }

        let dest = target.layout.dist_dir();
        remove_dir_all_if_exists(&dest)?;
        ensure_dir(&dest)?;

        for wheel in &wheels {
            self.repair_wheel(target, wheel, &dest)?;
        }
        Ok(())
    }

    fn smoke_test(&self, target: &BuildTarget<'_>) -> Result<()> {
        let dist = target.layout.dist_dir();
        let wheels = common::find_wheels(&dist)?;
        if wheels.is_empty() {
            bail!("no repaired wheels found in {}", dist.display());
        }

        common::smoke_test(
            &self.venv_python(&target.layout.venv_dir()),
            &wheels,
            target.config.package.import_name(),
            &target.layout.target_dir(),
        )
    }

    fn build_tarball(&self, target: &BuildTarget<'_>) -> Result<()> {
        let native = target.layout.native_dir();
        if !native.is_dir() {
            bail!("native build tree {} does not exist", native.display());
        }
        common::create_tarball(&native, &target.layout.tarball_path())
    }

    fn cleanup(&self, target: &BuildTarget<'_>) -> Result<()> {
        for dir in [
            target.layout.native_dir(),
            target.layout.wheel_dir(),
            target.layout.venv_dir(),
        ] {
            tracing::debug!("removing {}", dir.display());
            remove_dir_all_if_exists(&dir)?;
        }
        Ok(())
    }
}

/// Select the driver for a host OS.
pub fn driver_for(os: HostOs) -> Result<Box<dyn PlatformDriver>, EnvError> {
    match os {
        HostOs::Linux => Ok(Box::new(LinuxDriver)),
        HostOs::Darwin => Ok(Box::new(MacOsDriver)),
        HostOs::Windows => Ok(Box::new(WindowsDriver)),
        HostOs::Unknown => Err(EnvError::UnsupportedPlatform {
            os: os.to_string(),
        }),
    }
}

/// A named step and the action that performs it.
pub struct Step<'a> {
    pub name: &'static str,
    action: Box<dyn FnOnce() -> Result<()> + 'a>,
}

impl<'a> Step<'a> {
    pub fn new(name: &'static str, action: impl FnOnce() -> Result<()> + 'a) -> Self {
        Step {
            name,
            action: Box::new(action),
        }
    }
}

impl std::fmt::Debug for Step<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step").field("name", &self.name).finish()
    }
}

/// The ordered step list for one target.
pub fn plan_steps<'a>(driver: &'a dyn PlatformDriver, target: &'a BuildTarget<'a>) -> Vec<Step<'a>> {
    let mut plan = vec![Step::new(steps::PREPARE_VENV, move || {
        driver.prepare_venv(target)
    })];

    if !target.options.modules.is_empty() {
        plan.push(Step::new(steps::FETCH_MODULES, move || {
            driver.fetch_modules(target)
        }));
    }

    plan.push(Step::new(steps::CONFIGURE_NATIVE, move || {
        driver.configure_native(target)
    }));
    plan.push(Step::new(steps::BUILD_NATIVE, move || {
        driver.build_native(target)
    }));
    plan.push(Step::new(steps::BUILD_WHEELS, move || {
        driver.build_wheels(target)
    }));
    plan.push(Step::new(steps::FIXUP_WHEELS, move || {
        driver.fixup_wheels(target)
    }));
    plan.push(Step::new(steps::SMOKE_TEST, move || driver.smoke_test(target)));

    if target.options.tarball {
        plan.push(Step::new(steps::BUILD_TARBALL, move || {
            driver.build_tarball(target)
        }));
    }
    if target.options.cleanup {
        plan.push(Step::new(steps::CLEANUP, move || driver.cleanup(target)));
    }

    plan
}

/// Run `plan` against the report at `report`, stopping at the first failure.
pub fn run_steps(report: &Path, plan: Vec<Step<'_>>) -> Result<()> {
    let mut orchestrator = BuildOrchestrator::open(report, plan.iter().map(|s| s.name))?;

    for step in plan {
        orchestrator
            .run_step(step.name, step.action)
            .with_context(|| format!("step `{}` failed", step.name))?;
    }

    Ok(())
}

/// Build one target through its persisted report.
pub fn build_target(driver: &dyn PlatformDriver, target: &BuildTarget<'_>) -> Result<()> {
    let report = target.layout.report_path();
    tracing::info!("Building {} ({})", target.layout.name(), report.display());
    run_steps(&report, plan_steps(driver, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{BuildReport, StepStatus};
    use indexmap::IndexMap;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct NullDriver;

    impl PlatformDriver for NullDriver {
        fn os(&self) -> HostOs {
            HostOs::Linux
        }

        fn python_candidates(&self, _version: &str) -> Vec<PathBuf> {
            Vec::new()
        }

        fn repair_package(&self) -> &'static str {
            "auditwheel"
        }

        fn repair_wheel(&self, _: &BuildTarget<'_>, _: &Path, _: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn resolved(entries: &[(&str, &str)]) -> ResolvedEnv {
        ResolvedEnv::from_map(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<IndexMap<_, _>>(),
        )
    }

    fn target<'a>(
        env: &'a ResolvedEnv,
        config: &'a Config,
        options: &'a BuildOptions,
        root: &Path,
    ) -> BuildTarget<'a> {
        BuildTarget {
            env,
            config,
            options,
            arch: Arch::X64,
            python_version: "3.11".to_string(),
            layout: BuildLayout::new(root, HostOs::Linux, &Arch::X64, "3.11"),
        }
    }

    #[test]
    fn test_layout_paths() {
        let layout = BuildLayout::new("/b", HostOs::Darwin, &Arch::Arm64, "3.12");
        assert_eq!(layout.name(), "darwin-arm64-py3.12");
        assert_eq!(
            layout.report_path(),
            PathBuf::from("/b/reports/darwin-arm64-py3.12.json")
        );
        assert_eq!(
            layout.native_dir(),
            PathBuf::from("/b/darwin-arm64-py3.12/native")
        );
        assert_eq!(
            layout.tarball_path(),
            PathBuf::from("/b/darwin-arm64-py3.12/dist/darwin-arm64-py3.12-native.tar.gz")
        );
    }

    #[test]
    fn test_default_step_plan() {
        let tmp = TempDir::new().unwrap();
        let env = ResolvedEnv::default();
        let config = Config::default();
        let options = BuildOptions::default();
        let target = target(&env, &config, &options, tmp.path());

        let names: Vec<_> = plan_steps(&NullDriver, &target)
            .iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(
            names,
            vec![
                steps::PREPARE_VENV,
                steps::CONFIGURE_NATIVE,
                steps::BUILD_NATIVE,
                steps::BUILD_WHEELS,
                steps::FIXUP_WHEELS,
                steps::SMOKE_TEST,
            ]
        );
    }

    #[test]
    fn test_full_step_plan() {
        let tmp = TempDir::new().unwrap();
        let env = ResolvedEnv::default();
        let config = Config::default();
        let options = BuildOptions {
            cleanup: true,
            tarball: true,
            modules: crate::core::parse_module_specs("org/repo@v1").unwrap(),
            ..BuildOptions::default()
        };
        let target = target(&env, &config, &options, tmp.path());

        let names: Vec<_> = plan_steps(&NullDriver, &target)
            .iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, steps::ALL.to_vec());
    }

    #[test]
    fn test_define_merge_order() {
        let tmp = TempDir::new().unwrap();
        let env = resolved(&[
            (keys::BUILD_TYPE, "Release"),
            (keys::NINJA_EXECUTABLE, "/usr/bin/ninja"),
            (keys::CC, "/usr/bin/clang"),
        ]);
        let mut config = Config::default();
        config
            .defines
            .insert("BUILD_EXAMPLES:BOOL".to_string(), "ON".to_string());
        config
            .defines
            .insert("CMAKE_C_COMPILER:FILEPATH".to_string(), "/usr/bin/gcc".to_string());
        let options = BuildOptions {
            defines: [("BUILD_EXAMPLES:BOOL", "OFF")].into_iter().collect(),
            ..BuildOptions::default()
        };
        let target = target(&env, &config, &options, tmp.path());

        let defines = NullDriver.cmake_defines(&target).unwrap();
        // Compiler from the resolved environment beats the config file
        assert_eq!(defines.get("CMAKE_C_COMPILER:FILEPATH", ""), "/usr/bin/clang");
        // Command-line overrides win and keep their original position
        assert_eq!(defines.get("BUILD_EXAMPLES:BOOL", ""), "OFF");
        assert_eq!(defines.to_cmake_args()[0], "-DBUILD_EXAMPLES:BOOL=OFF");
        assert_eq!(defines.get("CMAKE_BUILD_TYPE:STRING", ""), "Release");
        assert_eq!(defines.get("CMAKE_MAKE_PROGRAM:FILEPATH", ""), "/usr/bin/ninja");
    }

    #[test]
    fn test_driver_for_unknown_platform() {
        assert!(driver_for(HostOs::Linux).is_ok());
        assert_eq!(driver_for(HostOs::Windows).unwrap().os(), HostOs::Windows);
        assert!(matches!(
            driver_for(HostOs::Unknown),
            Err(EnvError::UnsupportedPlatform { .. })
        ));
    }

    #[test]
    fn test_run_steps_halts_on_first_failure() {
        let tmp = TempDir::new().unwrap();
        let report = tmp.path().join("reports").join("t.json");
        let ran = RefCell::new(Vec::new());

        let plan = vec![
            Step::new("a", || {
                ran.borrow_mut().push("a");
                Ok(())
            }),
            Step::new("b", || {
                ran.borrow_mut().push("b");
                bail!("compiler exploded")
            }),
            Step::new("c", || {
                ran.borrow_mut().push("c");
                Ok(())
            }),
        ];

        let err = run_steps(&report, plan).unwrap_err();
        assert!(format!("{:#}", err).contains("compiler exploded"));
        assert_eq!(*ran.borrow(), vec!["a", "b"]);

        let saved = BuildReport::load(&report).unwrap().unwrap();
        assert_eq!(saved.get("a").unwrap().status, StepStatus::Done);
        assert_eq!(saved.get("b").unwrap().status, StepStatus::Failed);
        assert_eq!(saved.get("c").unwrap().status, StepStatus::Pending);
    }

    #[test]
    fn test_run_steps_resumes_after_failure() {
        let tmp = TempDir::new().unwrap();
        let report = tmp.path().join("t.json");
        let ran = RefCell::new(Vec::new());

        let _ = run_steps(
            &report,
            vec![
                Step::new("a", || {
                    ran.borrow_mut().push("a");
                    Ok(())
                }),
                Step::new("b", || bail!("flaky")),
            ],
        );

        run_steps(
            &report,
            vec![
                Step::new("a", || {
                    ran.borrow_mut().push("a");
                    Ok(())
                }),
                Step::new("b", || {
                    ran.borrow_mut().push("b");
                    Ok(())
                }),
            ],
        )
        .unwrap();

        assert_eq!(*ran.borrow(), vec!["a", "b"]);
        assert!(BuildReport::load(&report).unwrap().unwrap().is_complete());
    }
}
