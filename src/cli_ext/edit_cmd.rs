//! CLI handlers for `edit` and `schema`.
//!
//! `edit` feeds one JSON request through [`EditFileTool`] and prints the
//! envelope on stdout, exactly what a tool dispatcher would receive.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tracing::debug;

use crate::cli::{AppContext, EditArgs, SchemaArgs};
use crate::core::edit::{EditOrchestrator, EditResult, summarize};
use crate::core::tool::{EditFileTool, Tool, ToolContext, ToolResponse, parse_request};

/// Run one request; returns whether the envelope reported success.
pub fn run(args: EditArgs, ctx: &AppContext) -> Result<bool> {
    let raw = read_request(&args)?;

    let response = match serde_json::from_str::<Value>(&raw) {
        Ok(input) => match EditOrchestrator::open(&ctx.root) {
            Ok(orch) if ctx.dry_run => preview(&orch, input),
            Ok(orch) => EditFileTool::new(orch).respond(&ToolContext::default(), input),
            Err(e) => ToolResponse::failure(
                format!("Failed to edit {}", request_path(&input)),
                format!("setup error: {e:#}"),
            ),
        },
        Err(e) => ToolResponse::failure("Failed to edit ", format!("invalid JSON input: {e}")),
    };

    print_json(&response, args.pretty)?;
    Ok(response.ok)
}

/// Print the tool name, description and input schema as one JSON object.
pub fn schema(args: SchemaArgs, ctx: &AppContext) -> Result<()> {
    let orch = EditOrchestrator::open(&ctx.root)?;
    let tool = EditFileTool::new(orch);
    let out = json!({
        "name": tool.name(),
        "description": tool.description(),
        "input_schema": tool.input_schema(),
    });
    print_json(&out, args.pretty)
}

fn request_path(input: &Value) -> String {
    input
        .get("path")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn preview(orch: &EditOrchestrator, input: Value) -> ToolResponse<EditResult> {
    let path = request_path(&input);

    match parse_request(input).and_then(|req| orch.preview(&req)) {
        Ok(result) => ToolResponse::success(format!("[dry-run] {}", summarize(&result)), result),
        Err(e) => ToolResponse::failure(format!("Failed to edit {path}"), e.to_string()),
    }
}

fn read_request(args: &EditArgs) -> Result<String> {
    if let Some(inline) = &args.json {
        return Ok(inline.clone());
    }

    match args.request.as_deref() {
        Some(path) if path != Path::new("-") => {
            debug!(path = %path.display(), "reading request file");
            fs::read_to_string(path)
                .with_context(|| format!("Failed to read request file {}", path.display()))
        }
        _ => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            Ok(buf)
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{text}");
    Ok(())
}
