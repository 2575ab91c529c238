//! `wheelwright env` command

use std::io::Write;

use anyhow::Result;

use crate::cli::EnvArgs;
use wheelwright::env::settings::render_settings;
use wheelwright::ops::{generate_env, EnvOptions};
use wheelwright::util::GlobalContext;

pub fn execute(args: EnvArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;

    let opts = EnvOptions {
        input: args.input,
        output: args.output,
        overrides: args.overrides,
    };

    let env = generate_env(&ctx, &opts)?;

    match &opts.output {
        Some(path) => eprintln!("       Wrote {} keys to {}", env.len(), path.display()),
        None => std::io::stdout().write_all(render_settings(env.iter()).as_bytes())?,
    }

    Ok(())
}
