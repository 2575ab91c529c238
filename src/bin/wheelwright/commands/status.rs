//! `wheelwright status` command

use anyhow::Result;

use crate::cli::StatusArgs;
use wheelwright::ops::{find_reports, format_report, load_report, locate_build_root, report_name};
use wheelwright::util::GlobalContext;

pub fn execute(args: StatusArgs) -> Result<()> {
    let ctx = GlobalContext::new()?;

    let paths = if args.reports.is_empty() {
        let root = match &args.build_dir {
            Some(dir) => ctx.resolve_path(dir),
            None => locate_build_root(&ctx, &ctx.load_config()?, args.env_file.as_deref())?,
        };
        let found = find_reports(&root)?;
        if found.is_empty() {
            eprintln!("No build reports in {}", root.display());
        }
        found
    } else {
        args.reports.iter().map(|p| ctx.resolve_path(p)).collect()
    };

    for (i, path) in paths.iter().enumerate() {
        let report = load_report(path)?;
        if i > 0 {
            println!();
        }
        print!("{}", format_report(&report_name(path), &report));
    }

    Ok(())
}
