//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// wheelwright - resumable wheel builds for native Python extensions
#[derive(Parser)]
#[command(name = "wheelwright")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve the build configuration and write a settings file
    Env(EnvArgs),

    /// Build, repair and test wheels, resuming any unfinished build
    Build(BuildArgs),

    /// Show the progress recorded in build reports
    Status(StatusArgs),

    /// Remove build trees or recorded progress
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct EnvArgs {
    /// Settings file to start from
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Write settings here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Overrides; `KEY=UNSET` removes a key
    #[arg(value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,
}

#[derive(Args)]
pub struct BuildArgs {
    /// Settings file produced by `wheelwright env`
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,

    /// Python version to build for (repeatable)
    #[arg(long = "python", value_name = "VERSION")]
    pub python: Vec<String>,

    /// Keep intermediate build trees
    #[arg(long)]
    pub no_cleanup: bool,

    /// Local module source root (repeatable)
    #[arg(long = "module-root", value_name = "DIR")]
    pub module_roots: Vec<PathBuf>,

    /// Remote modules to fetch, `org/repo@tag:org2/repo2@tag2`
    #[arg(long, value_name = "SPEC")]
    pub deps: Option<String>,

    /// CMake define override (repeatable)
    #[arg(short = 'D', value_name = "KEY=VALUE")]
    pub defines: Vec<String>,

    /// Package the native build tree as a reusable archive
    #[arg(long)]
    pub tarball: bool,

    /// Configuration overrides; `KEY=UNSET` removes a key
    #[arg(value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Report files to show (default: every report in the build root)
    #[arg(value_name = "REPORT")]
    pub reports: Vec<PathBuf>,

    /// Build root to look in
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<PathBuf>,

    /// Settings file the build was run with
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Only remove recorded progress
    #[arg(long)]
    pub reports_only: bool,

    /// Build root to clean
    #[arg(long, value_name = "DIR")]
    pub build_dir: Option<PathBuf>,

    /// Settings file the build was run with
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}
