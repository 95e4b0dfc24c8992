//! Edit strategies
//!
//! Each strategy is a small struct built from a validated [`EditRequest`]
//! and implementing [`EditStrategy`]. [`Strategy`] is the closed set the
//! orchestrator dispatches over.

use std::fmt;
use std::str::FromStr;

use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize};

use crate::core::edit::{EditError, EditRequest};

pub mod anchored;
pub mod apply_patch;
pub mod insert;
pub mod replace;

pub use anchored::AnchoredEdit;
pub use apply_patch::PatchEdit;
pub use insert::{InsertEdit, InsertPosition};
pub use replace::ReplaceEdit;

/// Strategy names accepted in the `strategy` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Replace,
    Insert,
    Anchored,
    ApplyPatch,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 4] = [
        StrategyKind::Replace,
        StrategyKind::Insert,
        StrategyKind::Anchored,
        StrategyKind::ApplyPatch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Replace => "replace",
            StrategyKind::Insert => "insert",
            StrategyKind::Anchored => "anchored",
            StrategyKind::ApplyPatch => "apply_patch",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = EditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                EditError::Validation(format!(
                    "unknown strategy {s:?} (expected one of: {})",
                    StrategyKind::ALL.iter().join(", ")
                ))
            })
    }
}

/// Output of a successful strategy run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub content: String,
    pub lines_modified: usize,
}

/// A validated, ready-to-run edit
pub trait EditStrategy {
    fn kind(&self) -> StrategyKind;

    /// Transform `content`; must not touch the filesystem.
    fn apply(&self, content: &str) -> Result<Applied, EditError>;

    /// Advisory warnings about how the edit will land. Never fatal.
    fn detect_conflicts(&self, content: &str) -> Vec<String>;
}

/// The closed set of strategies
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Replace(ReplaceEdit),
    Insert(InsertEdit),
    Anchored(AnchoredEdit),
    ApplyPatch(PatchEdit),
}

impl Strategy {
    /// Resolve the strategy name (default `replace`) and validate its fields.
    pub fn from_request(request: &EditRequest) -> Result<Self, EditError> {
        let kind = match request.strategy.as_deref().map(str::trim) {
            None | Some("") => StrategyKind::default(),
            Some(name) => name.parse()?,
        };

        Ok(match kind {
            StrategyKind::Replace => Strategy::Replace(ReplaceEdit::from_request(request)?),
            StrategyKind::Insert => Strategy::Insert(InsertEdit::from_request(request)?),
            StrategyKind::Anchored => Strategy::Anchored(AnchoredEdit::from_request(request)?),
            StrategyKind::ApplyPatch => Strategy::ApplyPatch(PatchEdit::from_request(request)?),
        })
    }

    fn inner(&self) -> &dyn EditStrategy {
        match self {
            Strategy::Replace(s) => s,
            Strategy::Insert(s) => s,
            Strategy::Anchored(s) => s,
            Strategy::ApplyPatch(s) => s,
        }
    }
}

impl EditStrategy for Strategy {
    fn kind(&self) -> StrategyKind {
        self.inner().kind()
    }

    fn apply(&self, content: &str) -> Result<Applied, EditError> {
        self.inner().apply(content)
    }

    fn detect_conflicts(&self, content: &str) -> Vec<String> {
        self.inner().detect_conflicts(content)
    }
}

/// Required string field, or a validation error naming it
pub(crate) fn required<'a>(
    value: &'a Option<String>,
    field: &str,
    strategy: StrategyKind,
) -> Result<&'a str, EditError> {
    value.as_deref().ok_or_else(|| {
        EditError::Validation(format!("{field} is required for the {strategy} strategy"))
    })
}

/// Optional 1-based line number; rejects values below `min`.
pub(crate) fn line_number(
    value: Option<i64>,
    field: &str,
    min: i64,
) -> Result<Option<usize>, EditError> {
    match value {
        None => Ok(None),
        Some(n) if n < min => Err(EditError::Validation(format!(
            "{field} must be >= {min}, got {n}"
        ))),
        Some(n) => usize::try_from(n)
            .map(Some)
            .map_err(|_| EditError::Validation(format!("{field} is out of range: {n}"))),
    }
}

/// Number of line positions whose text differs, the shorter side padded.
pub fn count_changed_lines(before: &str, after: &str) -> usize {
    before
        .split('\n')
        .zip_longest(after.split('\n'))
        .filter(|pair| match pair {
            EitherOrBoth::Both(a, b) => a != b,
            EitherOrBoth::Left(_) | EitherOrBoth::Right(_) => true,
        })
        .count()
}

/// Non-overlapping occurrences of `needle` in `haystack`.
pub(crate) fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    memchr::memmem::find_iter(haystack.as_bytes(), needle.as_bytes()).count()
}
