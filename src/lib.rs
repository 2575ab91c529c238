//! wheelwright - resumable wheel builds for large native Python extensions
//!
//! This crate provides the library side of wheelwright: environment
//! resolution, the resumable step orchestrator, and the platform drivers
//! that configure, build, repair and test wheels.

pub mod core;
pub mod driver;
pub mod env;
pub mod ops;
pub mod orchestrator;
pub mod util;

pub use core::{CMakeDefines, HostOs, HostPlatform};
pub use env::{EnvError, ResolvedEnv};
pub use orchestrator::{BuildOrchestrator, BuildReport, ReportError, StepRecord, StepStatus};
pub use util::context::GlobalContext;
