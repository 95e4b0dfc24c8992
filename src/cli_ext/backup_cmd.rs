//! CLI handlers for `backup list|restore|sweep`.

use anyhow::Result;
use owo_colors::OwoColorize;
use tabled::{Table, Tabled};

use crate::cli::{
    AppContext, BackupArgs, BackupListArgs, BackupRestoreArgs, BackupSubcommand, BackupSweepArgs,
};
use crate::core::backup::BackupRecord;
use crate::core::backup_ops::{
    ListRequest, RestoreRequest, SweepRequest, list_backups, restore_backup, sweep_backups,
};
use crate::core::edit::EditOrchestrator;

pub fn run(args: BackupArgs, ctx: &AppContext) -> Result<()> {
    let orch = EditOrchestrator::open(&ctx.root)?;
    match args.command {
        BackupSubcommand::List(a) => list(&orch, a, ctx),
        BackupSubcommand::Restore(a) => restore(&orch, a, ctx),
        BackupSubcommand::Sweep(a) => sweep(&orch, a, ctx),
    }
}

#[derive(Tabled)]
struct BackupRow {
    backup: String,
    file: String,
    created: String,
    size: String,
}

impl From<&BackupRecord> for BackupRow {
    fn from(r: &BackupRecord) -> Self {
        Self {
            backup: r.file_name.clone(),
            file: r.original_file.clone(),
            created: r.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
            size: format!("{} B", r.size),
        }
    }
}

fn list(orch: &EditOrchestrator, args: BackupListArgs, ctx: &AppContext) -> Result<()> {
    let req = ListRequest {
        file: args.file,
        since: args.since,
        limit: args.limit,
    };
    let records = list_backups(orch.backups(), &req)?;

    if args.json {
        println!("{}", serde_json::to_string(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        if !ctx.quiet {
            println!("No backups in {}", orch.backups().dir().display());
        }
        return Ok(());
    }

    let rows: Vec<BackupRow> = records.iter().map(BackupRow::from).collect();
    println!("{}", Table::new(rows));
    Ok(())
}

fn restore(orch: &EditOrchestrator, args: BackupRestoreArgs, ctx: &AppContext) -> Result<()> {
    let req = RestoreRequest {
        backup: args.backup,
        target: args.target,
        dry_run: ctx.dry_run,
        show_diff: args.show_diff,
        verify_checksum: args.verify_checksum,
        backup_current: args.backup_current,
    };
    let result = restore_backup(orch, &req)?;

    if args.json {
        println!("{}", serde_json::to_string(&result)?);
        return Ok(());
    }

    if let Some(diff) = &result.diff {
        print_diff(diff, ctx.no_color);
    }
    if ctx.quiet {
        return Ok(());
    }

    let checksum = match result.checksum_ok {
        Some(true) => "checksum ok",
        Some(false) => "checksum MISMATCH",
        None => "no checksum",
    };
    let verb = if result.restored { "Restored" } else { "Would restore" };
    if ctx.no_color {
        println!(
            "{verb} {} -> {} ({checksum})",
            result.backup.display(),
            result.target.display()
        );
    } else {
        println!(
            "{} {} -> {} ({checksum})",
            verb.green().bold(),
            result.backup.display(),
            result.target.display().cyan()
        );
    }
    if let Some(saved) = &result.current_backup {
        println!("  Previous content saved to {}", saved.display());
    }
    Ok(())
}

fn sweep(orch: &EditOrchestrator, args: BackupSweepArgs, ctx: &AppContext) -> Result<()> {
    let req = SweepRequest {
        older_than: args.older_than,
        dry_run: ctx.dry_run,
    };
    let result = sweep_backups(orch.backups(), &req)?;

    if args.json {
        println!("{}", serde_json::to_string(&result)?);
        return Ok(());
    }
    if ctx.quiet {
        return Ok(());
    }

    let verb = if result.dry_run { "Would remove" } else { "Removed" };
    for name in &result.removed {
        println!("  {name}");
    }
    println!(
        "{verb} {} backup(s), {} bytes",
        result.removed.len(),
        result.bytes_freed
    );
    Ok(())
}

/// Unified diff with +/- lines colored unless disabled
pub fn print_diff(diff: &str, no_color: bool) {
    if no_color {
        print!("{diff}");
        return;
    }
    for line in diff.lines() {
        if line.starts_with("+++") || line.starts_with("---") {
            println!("{}", line.bold());
        } else if line.starts_with('+') {
            println!("{}", line.green());
        } else if line.starts_with('-') {
            println!("{}", line.red());
        } else if line.starts_with("@@") {
            println!("{}", line.cyan());
        } else {
            println!("{line}");
        }
    }
}
