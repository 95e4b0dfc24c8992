//! Shell completion scripts for `goai-edit`.

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::{generate, generate_to};
use std::{fs, io};

use crate::cli::{AppContext, Cli, CompletionsArgs};

const BIN_NAME: &str = "goai-edit";

/// Print the script, or write it under `--out-dir`.
pub fn run(args: CompletionsArgs, ctx: &AppContext) -> Result<()> {
    let mut cmd = Cli::command();

    let Some(dir) = args.out_dir else {
        generate(args.shell, &mut cmd, BIN_NAME, &mut io::stdout());
        return Ok(());
    };

    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = generate_to(args.shell, &mut cmd, BIN_NAME, &dir)
        .with_context(|| format!("Failed to write {} completions", args.shell))?;

    if !ctx.quiet {
        eprintln!("Wrote {} completions to {}", args.shell, path.display());
    }
    Ok(())
}
