//! `wheelwright build` command

use anyhow::Result;

use crate::cli::BuildArgs;
use wheelwright::ops::{build_wheels, WheelBuildOptions};
use wheelwright::util::GlobalContext;

pub fn execute(args: BuildArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;

    let opts = WheelBuildOptions {
        env_file: args.env_file,
        overrides: args.overrides,
        python_versions: args.python,
        no_cleanup: args.no_cleanup,
        tarball: args.tarball,
        module_roots: args.module_roots,
        deps: args.deps,
        defines: args.defines,
    };

    for target in build_wheels(&ctx, &opts)? {
        eprintln!(
            "    Finished `{}` -> {}",
            target.name,
            target.dist.display()
        );
    }

    Ok(())
}
