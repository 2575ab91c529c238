//! Core data types shared by configuration and drivers.

pub mod defines;
pub mod modules;
pub mod platform;

pub use defines::{CMakeDefines, NESTED_DEFINE_PREFIX};
pub use modules::{parse_module_specs, RemoteModule};
pub use platform::{Arch, HostOs, HostPlatform};
