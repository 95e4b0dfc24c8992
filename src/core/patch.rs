//! Unified-diff patch applier
//!
//! A single-pass, position-tracking line consumer rather than a general
//! patch engine:
//! - everything before the first `@@` header is skipped
//! - `+` lines are emitted, `-` lines skip one original line, ` ` lines copy
//!   the original line under the cursor
//! - later headers start a new hunk without moving the cursor, so hunks are
//!   applied as one continuous stream
//! - leftover original lines are appended verbatim
//! - `\ No newline at end of file` after a `+`, `-` or ` ` line records
//!   which side ends without a terminator, and the final newline is added
//!   or dropped to match
//!
//! With [`PatchOptions::use_hunk_offsets`] the declared old-start of every
//! header is honoured and context/removed lines must match the original.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("static hunk header regex")
});

/// Patch application failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("patch contains no hunk header (@@ ... @@)")]
    NoHunks,

    #[error("patch line {patch_line}: hunk runs past end of file ({file_lines} lines)")]
    PastEnd { patch_line: usize, file_lines: usize },

    #[error("patch line {patch_line}: malformed hunk header: {header}")]
    BadHeader { patch_line: usize, header: String },

    #[error(
        "patch line {patch_line}: hunk starts at line {declared} but the patch already consumed line {consumed}"
    )]
    OverlappingHunk {
        patch_line: usize,
        declared: usize,
        consumed: usize,
    },

    #[error("patch line {patch_line}: line {line} mismatch: expected {expected:?}, found {found:?}")]
    Mismatch {
        patch_line: usize,
        line: usize,
        expected: String,
        found: String,
    },
}

/// Applier knobs
#[derive(Debug, Clone, Copy, Default)]
pub struct PatchOptions {
    /// Seek to each header's declared start and verify context lines
    pub use_hunk_offsets: bool,
}

/// Result of a successful application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub content: String,
    /// Count of `+` and `-` lines consumed
    pub lines_modified: usize,
}

/// Declared ranges of a `@@ -a,b +c,d @@` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HunkHeader {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
}

impl HunkHeader {
    /// Parse the numeric part of a header line; `None` if it has no ranges.
    pub fn parse(line: &str) -> Option<Self> {
        let caps = HUNK_HEADER.captures(line)?;
        let num = |i: usize, default: usize| {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .unwrap_or(default)
        };
        Some(Self {
            old_start: num(1, 0),
            old_len: num(2, 1),
            new_start: num(3, 0),
            new_len: num(4, 1),
        })
    }

    /// 0-based index of the first original line the hunk covers
    fn old_index(&self) -> usize {
        if self.old_len == 0 {
            self.old_start
        } else {
            self.old_start.saturating_sub(1)
        }
    }
}

fn is_header(line: &str) -> bool {
    line.starts_with("@@")
}

/// Apply `patch` to `original`.
pub fn apply_patch(
    original: &str,
    patch: &str,
    opts: PatchOptions,
) -> Result<PatchOutcome, PatchError> {
    let mut walk = Walk::new(original, opts, false);
    walk.run(patch)?;
    Ok(walk.finish())
}

/// Advisory scan: describe where the patch disagrees with the file.
///
/// Never fails; an error the applier would hit is reported as a warning.
pub fn scan_patch(original: &str, patch: &str, opts: PatchOptions) -> Vec<String> {
    let mut walk = Walk::new(original, opts, true);
    if let Err(e) = walk.run(patch) {
        walk.warnings.push(e.to_string());
    }
    walk.warnings
}

/// Cursor state shared by apply and scan
struct Walk<'a> {
    lines: Vec<&'a str>,
    cursor: usize,
    out: Vec<&'a str>,
    modified: usize,
    opts: PatchOptions,
    collect: bool,
    warnings: Vec<String>,
    hunk: usize,
    hunk_warned: bool,
    last_sign: Option<char>,
    old_unterminated: bool,
    new_unterminated: bool,
}

impl<'a> Walk<'a> {
    fn new(original: &'a str, opts: PatchOptions, collect: bool) -> Self {
        Self {
            lines: original.split('\n').collect(),
            cursor: 0,
            out: Vec::new(),
            modified: 0,
            opts,
            collect,
            warnings: Vec::new(),
            hunk: 0,
            hunk_warned: false,
            last_sign: None,
            old_unterminated: false,
            new_unterminated: false,
        }
    }

    fn run(&mut self, patch: &'a str) -> Result<(), PatchError> {
        let mut lines = patch
            .split('\n')
            .enumerate()
            .skip_while(|(_, l)| !is_header(l));

        let (idx, header) = lines.next().ok_or(PatchError::NoHunks)?;
        self.begin_hunk(idx + 1, header)?;

        for (idx, line) in lines {
            let patch_line = idx + 1;
            if line.starts_with('\\') {
                self.mark_unterminated();
                continue;
            }
            self.last_sign = line.chars().next();
            if is_header(line) {
                self.begin_hunk(patch_line, line)?;
            } else if let Some(added) = line.strip_prefix('+') {
                self.out.push(added);
                self.modified += 1;
            } else if let Some(removed) = line.strip_prefix('-') {
                self.check_line(patch_line, removed)?;
                self.cursor += 1;
                self.modified += 1;
            } else if let Some(context) = line.strip_prefix(' ') {
                self.check_line(patch_line, context)?;
                self.out.push(self.lines[self.cursor]);
                self.cursor += 1;
            }
            // Anything else (blanks, trailing text) is ignored
        }

        Ok(())
    }

    fn mark_unterminated(&mut self) {
        match self.last_sign {
            Some('+') => self.new_unterminated = true,
            Some('-') => self.old_unterminated = true,
            Some(' ') => {
                self.old_unterminated = true;
                self.new_unterminated = true;
            }
            _ => {}
        }
    }

    fn begin_hunk(&mut self, patch_line: usize, header: &str) -> Result<(), PatchError> {
        self.hunk += 1;
        self.hunk_warned = false;

        let parsed = HunkHeader::parse(header);

        if self.opts.use_hunk_offsets {
            let parsed = parsed.ok_or_else(|| PatchError::BadHeader {
                patch_line,
                header: header.to_string(),
            })?;
            let target = parsed.old_index();
            if target < self.cursor {
                return Err(PatchError::OverlappingHunk {
                    patch_line,
                    declared: parsed.old_start,
                    consumed: self.cursor,
                });
            }
            if target > self.lines.len() {
                return Err(PatchError::PastEnd {
                    patch_line,
                    file_lines: self.lines.len(),
                });
            }
            self.out.extend_from_slice(&self.lines[self.cursor..target]);
            self.cursor = target;
        } else if self.collect {
            if let Some(parsed) = parsed {
                if parsed.old_index() != self.cursor {
                    self.warnings.push(format!(
                        "hunk {} declares original line {} but is applied at line {}; hunks are applied as one continuous stream",
                        self.hunk,
                        parsed.old_start,
                        self.cursor + 1
                    ));
                }
            }
        }

        Ok(())
    }

    /// Bounds check, then compare the expected text with the original line.
    fn check_line(&mut self, patch_line: usize, expected: &str) -> Result<(), PatchError> {
        if self.cursor >= self.lines.len() {
            return Err(PatchError::PastEnd {
                patch_line,
                file_lines: self.lines.len(),
            });
        }

        let found = self.lines[self.cursor];
        if found == expected {
            return Ok(());
        }

        let mismatch = PatchError::Mismatch {
            patch_line,
            line: self.cursor + 1,
            expected: expected.to_string(),
            found: found.to_string(),
        };
        if self.opts.use_hunk_offsets {
            return Err(mismatch);
        }
        // One warning per hunk keeps the report readable
        if self.collect && !self.hunk_warned {
            self.warnings
                .push(format!("hunk {}: {}", self.hunk, mismatch));
            self.hunk_warned = true;
        }
        Ok(())
    }

    fn finish(mut self) -> PatchOutcome {
        self.out.extend_from_slice(&self.lines[self.cursor..]);
        let mut content = self.out.join("\n");
        if self.new_unterminated && !self.old_unterminated {
            if content.ends_with('\n') {
                content.pop();
            }
        } else if self.old_unterminated && !self.new_unterminated && !self.out.is_empty() {
            content.push('\n');
        }
        PatchOutcome {
            content,
            lines_modified: self.modified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(original: &str, patch: &str) -> Result<PatchOutcome, PatchError> {
        apply_patch(original, patch, PatchOptions::default())
    }

    #[test]
    fn applies_single_hunk() {
        let original = "one\ntwo\nthree\n";
        let patch = "--- a/f\n+++ b/f\n@@ -1,3 +1,3 @@\n one\n-two\n+TWO\n three\n";
        let out = stream(original, patch).unwrap();
        assert_eq!(out.content, "one\nTWO\nthree\n");
        assert_eq!(out.lines_modified, 2);
    }

    #[test]
    fn remaining_lines_are_appended() {
        let original = "a\nb\nc\nd";
        let out = stream(original, "@@ -1,2 +1,2 @@\n-a\n+A\n b").unwrap();
        assert_eq!(out.content, "A\nb\nc\nd");
    }

    #[test]
    fn missing_header_is_an_error() {
        assert_eq!(stream("a\n", "-a\n+b\n"), Err(PatchError::NoHunks));
    }

    #[test]
    fn cursor_past_end_is_an_error() {
        let err = stream("a", "@@ -1,3 +1,0 @@\n-a\n-b\n-c").unwrap_err();
        assert!(matches!(err, PatchError::PastEnd { patch_line: 3, .. }));
    }

    #[test]
    fn later_headers_do_not_move_the_cursor() {
        // Second hunk claims line 4, but the stream continues at line 2
        let original = "a\nb\nc\nd\ne";
        let patch = "@@ -1,1 +1,1 @@\n-a\n+A\n@@ -4,1 +4,1 @@\n-d\n+D\n";
        let out = stream(original, patch).unwrap();
        assert_eq!(out.content, "A\nD\nc\nd\ne");
    }

    #[test]
    fn hunk_offsets_seek_when_enabled() {
        let original = "a\nb\nc\nd\ne";
        let patch = "@@ -1,1 +1,1 @@\n-a\n+A\n@@ -4,1 +4,1 @@\n-d\n+D\n";
        let out = apply_patch(
            original,
            patch,
            PatchOptions {
                use_hunk_offsets: true,
            },
        )
        .unwrap();
        assert_eq!(out.content, "A\nb\nc\nD\ne");
    }

    #[test]
    fn strict_mode_rejects_context_mismatch() {
        let err = apply_patch(
            "a\nb\n",
            "@@ -1,2 +1,2 @@\n x\n-b\n+B\n",
            PatchOptions {
                use_hunk_offsets: true,
            },
        )
        .unwrap_err();
        assert!(matches!(err, PatchError::Mismatch { line: 1, .. }));
    }

    #[test]
    fn strict_mode_rejects_overlapping_hunks() {
        let patch = "@@ -1,2 +1,2 @@\n a\n-b\n+B\n@@ -1,1 +1,1 @@\n-a\n+A\n";
        let err = apply_patch(
            "a\nb\nc",
            patch,
            PatchOptions {
                use_hunk_offsets: true,
            },
        )
        .unwrap_err();
        assert!(matches!(err, PatchError::OverlappingHunk { declared: 1, .. }));
    }

    #[test]
    fn scan_reports_offset_drift_and_mismatch() {
        let original = "a\nb\nc\nd\ne";
        let patch = "@@ -4,1 +4,1 @@\n-d\n+D\n";
        let warnings = scan_patch(original, patch, PatchOptions::default());
        assert_eq!(warnings.len(), 2);
        assert!(warnings[0].contains("continuous stream"));
        assert!(warnings[1].contains("mismatch"));
    }

    #[test]
    fn scan_is_quiet_for_clean_patch() {
        let warnings = scan_patch(
            "one\ntwo\n",
            "@@ -1,2 +1,2 @@\n one\n-two\n+2\n",
            PatchOptions::default(),
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn eof_marker_adds_or_drops_final_newline() {
        let add = "@@ -1,2 +1,2 @@\n a\n-b\n\\ No newline at end of file\n+b\n";
        assert_eq!(stream("a\nb", add).unwrap().content, "a\nb\n");

        let drop = "@@ -1,2 +1,2 @@\n a\n-b\n+b\n\\ No newline at end of file\n";
        assert_eq!(stream("a\nb\n", drop).unwrap().content, "a\nb");

        let both = "@@ -1,2 +1,2 @@\n-x\n+y\n end\n\\ No newline at end of file\n";
        assert_eq!(stream("x\nend", both).unwrap().content, "y\nend");
    }

    #[test]
    fn deleting_an_unterminated_file_leaves_it_empty() {
        let patch = "@@ -1,1 +0,0 @@\n-x\n\\ No newline at end of file\n";
        let opts = PatchOptions { use_hunk_offsets: true };
        assert_eq!(apply_patch("x", patch, opts).unwrap().content, "");
    }

    #[test]
    fn header_parse_defaults_lengths() {
        let h = HunkHeader::parse("@@ -3 +4,2 @@ fn main").unwrap();
        assert_eq!((h.old_start, h.old_len, h.new_start, h.new_len), (3, 1, 4, 2));
        assert!(HunkHeader::parse("@@ nonsense @@").is_none());
    }
}
