//! `edit_file` tool contract
//!
//! The dispatcher-facing surface of the engine: name, description, JSON
//! input schema, validation, and execution returning one JSON envelope
//! `{ ok, summary, data?, error? }` for every outcome.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::core::edit::{
    CancelToken, EditError, EditOrchestrator, EditRequest, EditResult, summarize,
};

pub const TOOL_EDIT_FILE: &str = "edit_file";

const DESCRIPTION: &str = "\
Edit an existing file using one of four strategies.

Strategies:
- replace: replace `old_text` with `new_text`. The first occurrence by default, every \
occurrence with `replace_all`, or every occurrence inside `line_start`..`line_end`.
- insert: insert `text` at `line` (0 prepends; N makes the text line N) or after the \
first line containing `after_anchor`.
- anchored: replace `old_text` with `new_text` inside the region after `before_anchor` \
and/or before `after_anchor`.
- apply_patch: apply a unified diff in `patch`. Hunks are consumed as one continuous \
stream unless `use_hunk_offsets` is true.

A backup is taken before the write and restored if the edit fails. Potential problems \
(ambiguous matches, anchors found more than once, leftover merge markers) are reported \
as conflicts but never block the edit.";

/// Dispatcher-facing tool
pub trait Tool {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn input_schema(&self) -> Value;
    /// Reject malformed input without side effects.
    fn validate(&self, input: &Value) -> anyhow::Result<()>;
    /// Run the tool; the string is always a JSON envelope.
    fn execute(&self, ctx: &ToolContext, input: Value) -> String;
}

/// Per-call context handed down by the dispatcher
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub cancel: CancelToken,
}

/// Envelope returned for every tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse<T> {
    pub ok: bool,
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ToolResponse<T> {
    pub fn success(summary: impl Into<String>, data: T) -> Self {
        Self {
            ok: true,
            summary: summary.into(),
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(summary: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            ok: false,
            summary: summary.into(),
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            json!({
                "ok": false,
                "summary": "Failed to serialize tool response",
                "error": e.to_string(),
            })
            .to_string()
        })
    }
}

pub struct EditFileTool {
    orchestrator: EditOrchestrator,
}

impl EditFileTool {
    pub fn new(orchestrator: EditOrchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &EditOrchestrator {
        &self.orchestrator
    }

    /// Run and return the typed envelope (what [`Tool::execute`] serializes).
    pub fn respond(&self, ctx: &ToolContext, input: Value) -> ToolResponse<EditResult> {
        let path = input
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let outcome = parse_request(input)
            .and_then(|req| self.orchestrator.execute_with(&req, &ctx.cancel));

        match outcome {
            Ok(result) => ToolResponse::success(summarize(&result), result),
            Err(e) => {
                warn!(%path, kind = %e.kind(), error = %e, "edit_file failed");
                ToolResponse::failure(format!("Failed to edit {path}"), e.to_string())
            }
        }
    }
}

/// Deserialize tool input; wrong shapes are validation errors.
pub fn parse_request(input: Value) -> Result<EditRequest, EditError> {
    if !input.is_object() {
        return Err(EditError::Validation("input must be a JSON object".into()));
    }
    serde_json::from_value(input).map_err(|e| EditError::Validation(format!("invalid input: {e}")))
}

impl Tool for EditFileTool {
    fn name(&self) -> &str {
        TOOL_EDIT_FILE
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    fn input_schema(&self) -> Value {
        input_schema()
    }

    fn validate(&self, input: &Value) -> anyhow::Result<()> {
        let req = parse_request(input.clone())?;
        self.orchestrator.validate(&req)?;
        Ok(())
    }

    fn execute(&self, ctx: &ToolContext, input: Value) -> String {
        self.respond(ctx, input).to_json()
    }
}

/// JSON Schema for [`EditRequest`]
pub fn input_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "path": {
                "type": "string",
                "description": "File path relative to the project root."
            },
            "strategy": {
                "type": "string",
                "enum": ["replace", "insert", "anchored", "apply_patch"],
                "description": "Edit strategy (default replace).",
                "default": "replace"
            },
            "create_backup": {
                "type": "boolean",
                "description": "Back the file up before editing (default true).",
                "default": true
            },
            "detect_conflicts": {
                "type": "boolean",
                "description": "Report potential problems before editing (default true).",
                "default": true
            },
            "old_text": {
                "type": "string",
                "description": "replace/anchored: exact text to replace."
            },
            "new_text": {
                "type": "string",
                "description": "replace/anchored: replacement text."
            },
            "line_start": {
                "type": "integer",
                "minimum": 1,
                "description": "replace: first line (1-based) of the range."
            },
            "line_end": {
                "type": "integer",
                "minimum": 1,
                "description": "replace: last line (1-based, inclusive) of the range."
            },
            "replace_all": {
                "type": "boolean",
                "description": "replace: replace every occurrence (default false).",
                "default": false
            },
            "text": {
                "type": "string",
                "description": "insert: text to insert."
            },
            "line": {
                "type": "integer",
                "minimum": 0,
                "description": "insert: 0 prepends; N makes the text line N."
            },
            "after_anchor": {
                "type": "string",
                "description": "insert: insert after the first line containing this. anchored: region ends before this."
            },
            "before_anchor": {
                "type": "string",
                "description": "anchored: region starts after this."
            },
            "patch": {
                "type": "string",
                "description": "apply_patch: unified diff with @@ hunk headers."
            },
            "use_hunk_offsets": {
                "type": "boolean",
                "description": "apply_patch: honour hunk header line numbers and verify context (default false).",
                "default": false
            }
        },
        "required": ["path", "strategy"]
    })
}
