//! Literal text replacement, optionally limited to a line range

use super::{
    Applied, EditStrategy, StrategyKind, count_changed_lines, count_occurrences, line_number,
    required,
};
use crate::core::edit::{EditError, EditRequest};

/// Inclusive 1-based range; `end` is clamped to the file at execution time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaceEdit {
    pub old_text: String,
    pub new_text: String,
    pub range: Option<LineRange>,
    pub replace_all: bool,
}

impl ReplaceEdit {
    pub fn from_request(req: &EditRequest) -> Result<Self, EditError> {
        let kind = StrategyKind::Replace;
        let old_text = required(&req.old_text, "old_text", kind)?;
        let new_text = required(&req.new_text, "new_text", kind)?;
        if old_text.is_empty() {
            return Err(EditError::Validation("old_text must not be empty".into()));
        }

        let start = line_number(req.line_start, "line_start", 1)?;
        let end = line_number(req.line_end, "line_end", 1)?;
        // A lone bound means a single line (start) or everything up to it (end)
        let range = match (start, end) {
            (None, None) => None,
            (Some(s), None) => Some(LineRange { start: s, end: s }),
            (None, Some(e)) => Some(LineRange { start: 1, end: e }),
            (Some(s), Some(e)) => Some(LineRange { start: s, end: e }),
        };

        Ok(Self {
            old_text: old_text.to_string(),
            new_text: new_text.to_string(),
            range,
            replace_all: req.replace_all.unwrap_or(false),
        })
    }

    fn replace_in_range(&self, content: &str, range: LineRange) -> Result<String, EditError> {
        let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
        let total = lines.len();
        if range.start > total {
            return Err(EditError::Validation(format!(
                "line_start {} is beyond the end of the file ({total} lines)",
                range.start
            )));
        }
        let end = range.end.min(total);

        let mut hits = 0usize;
        for line in lines.iter_mut().take(end).skip(range.start - 1) {
            if line.contains(&self.old_text) {
                *line = line.replace(&self.old_text, &self.new_text);
                hits += 1;
            }
        }
        if hits == 0 {
            return Err(EditError::NotFound(format!(
                "old_text not found in lines {}-{end}",
                range.start
            )));
        }

        Ok(lines.join("\n"))
    }
}

impl EditStrategy for ReplaceEdit {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Replace
    }

    fn apply(&self, content: &str) -> Result<Applied, EditError> {
        let updated = match self.range {
            Some(range) => self.replace_in_range(content, range)?,
            None => {
                if !content.contains(&self.old_text) {
                    return Err(EditError::NotFound("old_text not found in file".into()));
                }
                if self.replace_all {
                    content.replace(&self.old_text, &self.new_text)
                } else {
                    content.replacen(&self.old_text, &self.new_text, 1)
                }
            }
        };

        Ok(Applied {
            lines_modified: count_changed_lines(content, &updated),
            content: updated,
        })
    }

    fn detect_conflicts(&self, content: &str) -> Vec<String> {
        let mut conflicts = Vec::new();

        if self.old_text == self.new_text {
            conflicts.push("old_text and new_text are identical; the file will not change".into());
        }

        let total = count_occurrences(content, &self.old_text);
        match self.range {
            None => {
                if total > 1 && !self.replace_all {
                    conflicts.push(format!(
                        "old_text appears {total} times; only the first occurrence will be replaced \
                         (set replace_all or a line range to disambiguate)"
                    ));
                }
            }
            Some(range) => {
                let line_count = content.split('\n').count();
                if range.end > line_count {
                    conflicts.push(format!(
                        "line_end {} is beyond the end of the file ({line_count} lines) and will be clamped",
                        range.end
                    ));
                }
                let inside: usize = content
                    .split('\n')
                    .take(range.end.min(line_count))
                    .skip(range.start.saturating_sub(1))
                    .map(|line| count_occurrences(line, &self.old_text))
                    .sum();
                if total > inside {
                    conflicts.push(format!(
                        "old_text also appears {} time(s) outside lines {}-{}; those are left unchanged",
                        total - inside,
                        range.start,
                        range.end
                    ));
                }
            }
        }

        conflicts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit(old: &str, new: &str) -> ReplaceEdit {
        ReplaceEdit::from_request(&EditRequest::replace("f.txt", old, new)).unwrap()
    }

    fn ranged(old: &str, new: &str, start: i64, end: i64) -> ReplaceEdit {
        let req = EditRequest {
            line_start: Some(start),
            line_end: Some(end),
            ..EditRequest::replace("f.txt", old, new)
        };
        ReplaceEdit::from_request(&req).unwrap()
    }

    #[test]
    fn replaces_first_occurrence_by_default() {
        let out = edit("foo", "bar").apply("foo\nfoo\n").unwrap();
        assert_eq!(out.content, "bar\nfoo\n");
        assert_eq!(out.lines_modified, 1);
    }

    #[test]
    fn replace_all_hits_every_occurrence() {
        let mut e = edit("foo", "bar");
        e.replace_all = true;
        let out = e.apply("foo\nx foo foo\n").unwrap();
        assert_eq!(out.content, "bar\nx bar bar\n");
        assert_eq!(out.lines_modified, 2);
    }

    #[test]
    fn missing_text_is_not_found() {
        let err = edit("World", "Go").apply("Hello\n").unwrap_err();
        assert!(matches!(err, EditError::NotFound(_)));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn range_limits_replacement() {
        let out = ranged("x", "y", 2, 3).apply("x\nx x\nx\nx").unwrap();
        assert_eq!(out.content, "x\ny y\ny\nx");
        assert_eq!(out.lines_modified, 2);
    }

    #[test]
    fn range_end_is_clamped() {
        let out = ranged("b", "B", 2, 99).apply("a\nb").unwrap();
        assert_eq!(out.content, "a\nB");
    }

    #[test]
    fn range_start_past_end_is_rejected() {
        let err = ranged("a", "b", 5, 6).apply("a\nb").unwrap_err();
        assert!(matches!(err, EditError::Validation(_)));
    }

    #[test]
    fn range_without_match_is_not_found() {
        let err = ranged("a", "b", 2, 2).apply("a\nc").unwrap_err();
        assert!(matches!(err, EditError::NotFound(_)));
    }

    #[test]
    fn validation_rejects_missing_and_bad_fields() {
        let mut req = EditRequest::replace("f.txt", "", "x");
        assert!(ReplaceEdit::from_request(&req).is_err());

        req.old_text = Some("a".into());
        req.new_text = None;
        assert!(ReplaceEdit::from_request(&req).is_err());

        req.new_text = Some("b".into());
        req.line_start = Some(0);
        assert!(matches!(
            ReplaceEdit::from_request(&req),
            Err(EditError::Validation(_))
        ));
    }

    #[test]
    fn conflicts_flag_ambiguity_and_noop() {
        let warnings = edit("a", "a").detect_conflicts("a a\n");
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("identical"));
        assert!(warnings[1].contains("2 times"));
    }

    #[test]
    fn conflicts_flag_range_issues() {
        let warnings = ranged("x", "y", 2, 10).detect_conflicts("x\nx\nz");
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("clamped"));
        assert!(warnings[1].contains("outside lines 2-10"));
    }

    #[test]
    fn unambiguous_edit_has_no_conflicts() {
        assert!(edit("a", "b").detect_conflicts("a\nc\n").is_empty());
    }
}
