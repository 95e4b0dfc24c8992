//! CLI handler for `diff`: the edit engine's renderer over two files.

use anyhow::{Context, Result};

use crate::cli::{AppContext, DiffArgs};
use crate::cli_ext::backup_cmd::print_diff;
use crate::core::diff::{DiffAlgorithmKind, DiffEngine};
use crate::infra::config::load_config;
use crate::infra::io::read_file_smart;

/// Print the diff; returns whether the files differ.
pub fn run(args: DiffArgs, ctx: &AppContext) -> Result<bool> {
    let cfg = load_config(&ctx.root)?.diff;
    let kind: DiffAlgorithmKind = args.algorithm.map(Into::into).unwrap_or(cfg.algorithm);
    let engine = DiffEngine::with_kind(kind, cfg.lookahead, args.context.unwrap_or(cfg.context_lines));

    let old = read_file_smart(&args.old)?;
    let new = read_file_smart(&args.new)?;
    let old_text = old
        .as_str()
        .with_context(|| format!("{} is not UTF-8 text", args.old.display()))?;
    let new_text = new
        .as_str()
        .with_context(|| format!("{} is not UTF-8 text", args.new.display()))?;

    let body = engine.diff(old_text, new_text);
    if body.is_empty() {
        return Ok(false);
    }

    let rendered = format!(
        "--- {}\n+++ {}\n{body}",
        args.old.display(),
        args.new.display()
    );
    print_diff(&rendered, ctx.no_color);
    Ok(true)
}
