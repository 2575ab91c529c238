//! Implementation of `wheelwright clean`.

use std::path::PathBuf;

use anyhow::Result;

use crate::driver::REPORTS_DIR;
use crate::ops::wheelwright_env::locate_build_root;
use crate::util::fs::remove_dir_all_if_exists;
use crate::util::GlobalContext;

/// Options for the clean command.
#[derive(Debug, Clone, Default)]
pub struct CleanOptions {
    /// Build root to clean (default: located like `build` does)
    pub build_dir: Option<PathBuf>,

    /// Settings file that may name the build root
    pub env_file: Option<PathBuf>,

    /// Only forget progress, keep build trees
    pub reports_only: bool,
}

/// Remove the build root or its reports. Returns the removed path.
pub fn clean(ctx: &GlobalContext, opts: &CleanOptions) -> Result<PathBuf> {
    let root = match &opts.build_dir {
        Some(dir) => ctx.resolve_path(dir),
        None => locate_build_root(ctx, &ctx.load_config()?, opts.env_file.as_deref())?,
    };

    let target = if opts.reports_only {
        root.join(REPORTS_DIR)
    } else {
        root
    };

    tracing::debug!("removing {}", target.display());
    remove_dir_all_if_exists(&target)?;
    Ok(target)
}
