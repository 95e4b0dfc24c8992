//! Unified-diff strategy, a thin wrapper over [`crate::core::patch`]

use super::{Applied, EditStrategy, StrategyKind, required};
use crate::core::edit::{EditError, EditRequest};
use crate::core::patch::{PatchOptions, apply_patch, scan_patch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchEdit {
    pub patch: String,
    pub use_hunk_offsets: bool,
}

impl PatchEdit {
    pub fn from_request(req: &EditRequest) -> Result<Self, EditError> {
        let patch = required(&req.patch, "patch", StrategyKind::ApplyPatch)?;
        if patch.trim().is_empty() {
            return Err(EditError::Validation("patch must not be empty".into()));
        }
        Ok(Self {
            patch: patch.to_string(),
            use_hunk_offsets: req.use_hunk_offsets.unwrap_or(false),
        })
    }

    fn options(&self) -> PatchOptions {
        PatchOptions {
            use_hunk_offsets: self.use_hunk_offsets,
        }
    }
}

impl EditStrategy for PatchEdit {
    fn kind(&self) -> StrategyKind {
        StrategyKind::ApplyPatch
    }

    fn apply(&self, content: &str) -> Result<Applied, EditError> {
        let outcome = apply_patch(content, &self.patch, self.options())?;
        Ok(Applied {
            content: outcome.content,
            lines_modified: outcome.lines_modified,
        })
    }

    fn detect_conflicts(&self, content: &str) -> Vec<String> {
        scan_patch(content, &self.patch, self.options())
    }
}
