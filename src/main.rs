use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use goai_edit::cli::{AppContext, Cli, Commands, expand_path};
use goai_edit::cli_ext::{backup_cmd, diff_cmd, edit_cmd};
use goai_edit::infra::telemetry;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    telemetry::init(cli.verbose, !cli.no_color && std::io::stderr().is_terminal());

    // Build a context once, pass everywhere
    let ctx = AppContext {
        root: expand_path(&cli.root)?,
        quiet: cli.quiet,
        no_color: cli.no_color,
        dry_run: cli.dry_run,
    };

    // Edit failures are reported in the envelope; the exit code mirrors `ok`
    let ok = match cli.command {
        Commands::Edit(args) => edit_cmd::run(args, &ctx)?,
        Commands::Schema(args) => edit_cmd::schema(args, &ctx).map(|()| true)?,
        Commands::Diff(args) => diff_cmd::run(args, &ctx).map(|_| true)?,
        Commands::Backup(args) => backup_cmd::run(args, &ctx).map(|()| true)?,
        Commands::Init(args) => goai_edit::infra::config::init(args, &ctx).map(|()| true)?,
        Commands::Completions(args) => goai_edit::completion::run(args, &ctx).map(|()| true)?,
    };

    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}
