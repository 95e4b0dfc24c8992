//! Replace text inside a region delimited by anchor strings
//!
//! Only the matched occurrence of `old_text` changes; every byte outside
//! it, anchors and surrounding whitespace included, is kept as is.

use std::ops::Range;

use super::{Applied, EditStrategy, StrategyKind, count_changed_lines, count_occurrences, required};
use crate::core::edit::{EditError, EditRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchoredEdit {
    pub old_text: String,
    pub new_text: String,
    pub before_anchor: Option<String>,
    pub after_anchor: Option<String>,
}

impl AnchoredEdit {
    pub fn from_request(req: &EditRequest) -> Result<Self, EditError> {
        let kind = StrategyKind::Anchored;
        let old_text = required(&req.old_text, "old_text", kind)?;
        let new_text = required(&req.new_text, "new_text", kind)?;
        if old_text.is_empty() {
            return Err(EditError::Validation("old_text must not be empty".into()));
        }
        if req.before_anchor.is_none() && req.after_anchor.is_none() {
            return Err(EditError::Validation(
                "anchored requires before_anchor, after_anchor, or both".into(),
            ));
        }
        for (name, anchor) in [
            ("before_anchor", &req.before_anchor),
            ("after_anchor", &req.after_anchor),
        ] {
            if anchor.as_deref() == Some("") {
                return Err(EditError::Validation(format!("{name} must not be empty")));
            }
        }

        Ok(Self {
            old_text: old_text.to_string(),
            new_text: new_text.to_string(),
            before_anchor: req.before_anchor.clone(),
            after_anchor: req.after_anchor.clone(),
        })
    }

    /// Byte range between the anchors (exclusive of both).
    pub fn region(&self, content: &str) -> Result<Range<usize>, EditError> {
        let start = match &self.before_anchor {
            Some(before) => content
                .find(before.as_str())
                .map(|i| i + before.len())
                .ok_or_else(|| {
                    EditError::NotFound(format!("before_anchor {before:?} not found in file"))
                })?,
            None => 0,
        };

        let end = match &self.after_anchor {
            Some(after) => content[start..]
                .find(after.as_str())
                .map(|i| start + i)
                .ok_or_else(|| {
                    let scope = if self.before_anchor.is_some() {
                        "after before_anchor"
                    } else {
                        "in file"
                    };
                    EditError::NotFound(format!("after_anchor {after:?} not found {scope}"))
                })?,
            None => content.len(),
        };

        Ok(start..end)
    }
}

impl EditStrategy for AnchoredEdit {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Anchored
    }

    fn apply(&self, content: &str) -> Result<Applied, EditError> {
        let region = self.region(content)?;
        let offset = content[region.clone()]
            .find(self.old_text.as_str())
            .ok_or_else(|| EditError::NotFound("old_text not found between the anchors".into()))?;

        let at = region.start + offset;
        let mut updated =
            String::with_capacity(content.len() - self.old_text.len() + self.new_text.len());
        updated.push_str(&content[..at]);
        updated.push_str(&self.new_text);
        updated.push_str(&content[at + self.old_text.len()..]);

        Ok(Applied {
            lines_modified: count_changed_lines(content, &updated),
            content: updated,
        })
    }

    fn detect_conflicts(&self, content: &str) -> Vec<String> {
        let mut conflicts = Vec::new();

        for (name, anchor) in [
            ("before_anchor", &self.before_anchor),
            ("after_anchor", &self.after_anchor),
        ] {
            let Some(anchor) = anchor else { continue };
            match count_occurrences(content, anchor) {
                0 => conflicts.push(format!("{name} {anchor:?} does not appear in the file")),
                1 => {}
                n => conflicts.push(format!(
                    "{name} {anchor:?} appears {n} times; the first occurrence is used"
                )),
            }
        }

        if let Ok(region) = self.region(content) {
            let n = count_occurrences(&content[region], &self.old_text);
            if n > 1 {
                conflicts.push(format!(
                    "old_text appears {n} times between the anchors; only the first is replaced"
                ));
            }
        }

        conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchored(old: &str, new: &str, before: Option<&str>, after: Option<&str>) -> AnchoredEdit {
        AnchoredEdit::from_request(&EditRequest::anchored("f.txt", old, new, before, after))
            .unwrap()
    }

    #[test]
    fn replaces_only_inside_region() {
        let content = "value = 1\n[section]\nvalue = 1\n[end]\nvalue = 1\n";
        let out = anchored("value = 1", "value = 2", Some("[section]"), Some("[end]"))
            .apply(content)
            .unwrap();
        assert_eq!(out.content, "value = 1\n[section]\nvalue = 2\n[end]\nvalue = 1\n");
        assert_eq!(out.lines_modified, 1);
    }

    #[test]
    fn whitespace_around_anchors_is_preserved() {
        let content = "start  \n\n   target   \n\n  end";
        let out = anchored("target", "done", Some("start"), Some("end"))
            .apply(content)
            .unwrap();
        assert_eq!(out.content, "start  \n\n   done   \n\n  end");
    }

    #[test]
    fn only_before_anchor_runs_to_eof() {
        let out = anchored("x", "y", Some("mark"), None)
            .apply("x\nmark\nx")
            .unwrap();
        assert_eq!(out.content, "x\nmark\ny");
    }

    #[test]
    fn only_after_anchor_starts_at_bof() {
        let out = anchored("x", "y", None, Some("mark"))
            .apply("a x\nmark\nx")
            .unwrap();
        assert_eq!(out.content, "a y\nmark\nx");
    }

    #[test]
    fn after_anchor_must_follow_before_anchor() {
        let err = anchored("x", "y", Some("B"), Some("A"))
            .apply("A\nx\nB\n")
            .unwrap_err();
        assert!(matches!(err, EditError::NotFound(_)));
        assert!(err.to_string().contains("after before_anchor"));
    }

    #[test]
    fn old_text_outside_region_is_not_found() {
        let err = anchored("x", "y", Some("B"), None)
            .apply("x\nB\nz")
            .unwrap_err();
        assert!(matches!(err, EditError::NotFound(_)));
    }

    #[test]
    fn needs_an_anchor() {
        let req = EditRequest::anchored("f.txt", "a", "b", None, None);
        assert!(matches!(
            AnchoredEdit::from_request(&req),
            Err(EditError::Validation(_))
        ));
    }

    #[test]
    fn conflicts_flag_anchor_counts() {
        let e = anchored("x", "y", Some("B"), Some("E"));
        let warnings = e.detect_conflicts("B x B x E");
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("appears 2 times"));
        assert!(warnings[1].contains("between the anchors"));

        let warnings = e.detect_conflicts("x E");
        assert!(warnings[0].contains("does not appear"));
    }
}
