//! High-level operations.
//!
//! This module contains the implementation of wheelwright commands.

pub mod clean;
pub mod status;
pub mod wheelwright_build;
pub mod wheelwright_env;

pub use clean::{clean, CleanOptions};
pub use status::{find_reports, format_report, load_report, report_name};
pub use wheelwright_build::{build_wheels, parse_define, BuiltTarget, WheelBuildOptions};
pub use wheelwright_env::{generate_env, locate_build_root, resolve_env, EnvOptions};
