//! `wheelwright clean` command

use anyhow::Result;

use crate::cli::CleanArgs;
use wheelwright::ops::{clean, CleanOptions};
use wheelwright::util::GlobalContext;

pub fn execute(args: CleanArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;

    let removed = clean(
        &ctx,
        &CleanOptions {
            build_dir: args.build_dir,
            env_file: args.env_file,
            reports_only: args.reports_only,
        },
    )?;
    eprintln!("     Removed {}", removed.display());

    Ok(())
}
