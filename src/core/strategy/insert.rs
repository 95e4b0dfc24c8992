//! Insert a block of text at a line number or after an anchor line

use super::{Applied, EditStrategy, StrategyKind, line_number, required};
use crate::core::edit::{EditError, EditRequest};

/// Where the text lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertPosition {
    /// `0` prepends; `N` makes the text line `N` of the result
    Line(usize),
    /// Directly after the first line containing the anchor
    AfterAnchor(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertEdit {
    pub text: String,
    pub position: InsertPosition,
}

impl InsertEdit {
    pub fn from_request(req: &EditRequest) -> Result<Self, EditError> {
        let text = required(&req.text, "text", StrategyKind::Insert)?;
        let line = line_number(req.line, "line", 0)?;

        let position = match (line, req.after_anchor.as_deref()) {
            (Some(n), None) => InsertPosition::Line(n),
            (None, Some("")) => {
                return Err(EditError::Validation("after_anchor must not be empty".into()));
            }
            (None, Some(anchor)) => InsertPosition::AfterAnchor(anchor.to_string()),
            _ => {
                return Err(EditError::Validation(
                    "insert requires exactly one of line or after_anchor".into(),
                ));
            }
        };

        Ok(Self {
            text: text.to_string(),
            position,
        })
    }

    /// Index in the split line vector where the text is spliced.
    fn insertion_index(&self, lines: &[&str]) -> Result<usize, EditError> {
        match &self.position {
            InsertPosition::Line(0) => Ok(0),
            InsertPosition::Line(n) => {
                if *n > lines.len() + 1 {
                    return Err(EditError::Validation(format!(
                        "line {n} is beyond the end of the file ({} lines)",
                        lines.len()
                    )));
                }
                Ok(n - 1)
            }
            InsertPosition::AfterAnchor(anchor) => lines
                .iter()
                .position(|l| l.contains(anchor.as_str()))
                .map(|i| i + 1)
                .ok_or_else(|| {
                    EditError::NotFound(format!("after_anchor {anchor:?} not found in file"))
                }),
        }
    }
}

impl EditStrategy for InsertEdit {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Insert
    }

    fn apply(&self, content: &str) -> Result<Applied, EditError> {
        let mut lines: Vec<&str> = content.split('\n').collect();
        let at = self.insertion_index(&lines)?;
        lines.insert(at, &self.text);

        Ok(Applied {
            content: lines.join("\n"),
            lines_modified: 1,
        })
    }

    fn detect_conflicts(&self, content: &str) -> Vec<String> {
        let line_count = content.split('\n').count();
        match &self.position {
            InsertPosition::Line(n) if *n > line_count + 1 => vec![format!(
                "line {n} is beyond the end of the file ({line_count} lines)"
            )],
            InsertPosition::Line(_) => Vec::new(),
            InsertPosition::AfterAnchor(anchor) => {
                let hits: Vec<usize> = content
                    .split('\n')
                    .enumerate()
                    .filter(|(_, l)| l.contains(anchor.as_str()))
                    .map(|(i, _)| i + 1)
                    .collect();
                match hits.as_slice() {
                    [] => vec![format!("after_anchor {anchor:?} does not appear in the file")],
                    [_] => Vec::new(),
                    [first, ..] => vec![format!(
                        "after_anchor {anchor:?} appears on {} lines; inserting after line {first}",
                        hits.len()
                    )],
                }
            }
        }
    }
}
