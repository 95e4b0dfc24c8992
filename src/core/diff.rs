//! Line-level diff engine with unified-diff rendering
//!
//! Two interchangeable backends sit behind [`DiffAlgorithm`]:
//! - [`LookaheadDiff`]: cursor walk that resynchronizes within a small
//!   window. Cheap and predictable, but it can miss distant resyncs and
//!   over-report the size of a change.
//! - [`MyersDiff`]: minimal edit script via the `similar` crate.
//!
//! Both produce the same [`Change`] shape, so hunk grouping and rendering
//! are shared.
//!
//! Lines are compared with their `\n` terminators, so a file that only
//! gains or loses its final newline still diffs. The rendered hunk marks
//! the unterminated side with `\ No newline at end of file`.

use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffOp, capture_diff_slices};

/// Marker line for a final line without a terminator
pub const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

/// Default number of context lines around each change
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Default resync window for the lookahead heuristic
pub const DEFAULT_LOOKAHEAD: usize = 5;

/// Backend selector, used by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffAlgorithmKind {
    #[default]
    Lookahead,
    Myers,
}

/// Kind of a raw change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Add,
    Delete,
    Modify,
}

/// A contiguous run of changed lines.
///
/// `start_line`/`end_line` are 1-based inclusive positions in the original
/// buffer. A pure addition touches no original line, so its `end_line` is
/// `start_line - 1` and `start_line` is the original line it lands before.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub start_line: usize,
    pub end_line: usize,
    /// 1-based position of the first new line in the modified buffer
    pub new_line: usize,
    pub old_lines: Vec<String>,
    pub new_lines: Vec<String>,
}

impl Change {
    fn new(kind: ChangeKind, old_idx: usize, new_idx: usize, old: &[&str], new: &[&str]) -> Self {
        Self {
            kind,
            start_line: old_idx + 1,
            end_line: old_idx + old.len(),
            new_line: new_idx + 1,
            old_lines: old.iter().map(|s| strip_eol(s).to_string()).collect(),
            new_lines: new.iter().map(|s| strip_eol(s).to_string()).collect(),
        }
    }

    fn add(old_idx: usize, new_idx: usize, new: &[&str]) -> Self {
        Self::new(ChangeKind::Add, old_idx, new_idx, &[], new)
    }

    fn delete(old_idx: usize, new_idx: usize, old: &[&str]) -> Self {
        Self::new(ChangeKind::Delete, old_idx, new_idx, old, &[])
    }

    fn modify(old_idx: usize, new_idx: usize, old: &[&str], new: &[&str]) -> Self {
        Self::new(ChangeKind::Modify, old_idx, new_idx, old, new)
    }

    /// 0-based start in the original
    fn old_start(&self) -> usize {
        self.start_line - 1
    }

    /// 0-based exclusive end in the original
    fn old_end(&self) -> usize {
        self.old_start() + self.old_lines.len()
    }

    fn new_start(&self) -> usize {
        self.new_line - 1
    }

    fn new_end(&self) -> usize {
        self.new_start() + self.new_lines.len()
    }
}

/// A line in a rendered hunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HunkLine {
    Context(String), // Unchanged line (starts with ' ')
    Remove(String),  // Removed line (starts with '-')
    Add(String),     // Added line (starts with '+')
    NoNewline,       // Previous line has no terminator
}

/// A context-padded group of changes
#[derive(Debug, Clone)]
pub struct Hunk {
    pub start_original: usize, // 1-based
    pub len_original: usize,
    pub start_modified: usize, // 1-based
    pub len_modified: usize,
    pub changes: Vec<Change>,
    pub lines: Vec<HunkLine>,
}

/// Computes raw changes between two line sequences
pub trait DiffAlgorithm: Send + Sync {
    fn changes(&self, original: &[&str], modified: &[&str]) -> Vec<Change>;
}

/// Two-cursor walk with a bounded resync search
#[derive(Debug, Clone, Copy)]
pub struct LookaheadDiff {
    pub window: usize,
}

impl Default for LookaheadDiff {
    fn default() -> Self {
        Self {
            window: DEFAULT_LOOKAHEAD,
        }
    }
}

impl LookaheadDiff {
    /// Nearest (by combined distance) equal pair ahead of the cursors.
    fn resync(&self, original: &[&str], modified: &[&str], i: usize, j: usize) -> Option<(usize, usize)> {
        for distance in 1..=self.window * 2 {
            for di in 0..=distance.min(self.window) {
                let dj = distance - di;
                if dj > self.window {
                    continue;
                }
                if i + di < original.len()
                    && j + dj < modified.len()
                    && original[i + di] == modified[j + dj]
                {
                    return Some((di, dj));
                }
            }
        }
        None
    }
}

impl DiffAlgorithm for LookaheadDiff {
    fn changes(&self, original: &[&str], modified: &[&str]) -> Vec<Change> {
        let (mut i, mut j) = (0usize, 0usize);
        let mut out = Vec::new();

        while i < original.len() || j < modified.len() {
            if i < original.len() && j < modified.len() && original[i] == modified[j] {
                i += 1;
                j += 1;
                continue;
            }

            // One side exhausted: the rest of the other side is one span
            if i >= original.len() {
                out.push(Change::add(i, j, &modified[j..]));
                break;
            }
            if j >= modified.len() {
                out.push(Change::delete(i, j, &original[i..]));
                break;
            }

            match self.resync(original, modified, i, j) {
                Some((di, dj)) => {
                    if di > 0 {
                        out.push(Change::delete(i, j, &original[i..i + di]));
                    }
                    if dj > 0 {
                        out.push(Change::add(i + di, j, &modified[j..j + dj]));
                    }
                    i += di;
                    j += dj;
                }
                None => {
                    out.push(Change::modify(i, j, &original[i..=i], &modified[j..=j]));
                    i += 1;
                    j += 1;
                }
            }
        }

        out
    }
}

/// Minimal edit script (Myers) backed by `similar`
#[derive(Debug, Clone, Copy, Default)]
pub struct MyersDiff;

impl DiffAlgorithm for MyersDiff {
    fn changes(&self, original: &[&str], modified: &[&str]) -> Vec<Change> {
        capture_diff_slices(Algorithm::Myers, original, modified)
            .into_iter()
            .filter_map(|op| match op {
                DiffOp::Equal { .. } => None,
                DiffOp::Delete {
                    old_index,
                    old_len,
                    new_index,
                } => Some(Change::delete(
                    old_index,
                    new_index,
                    &original[old_index..old_index + old_len],
                )),
                DiffOp::Insert {
                    old_index,
                    new_index,
                    new_len,
                } => Some(Change::add(
                    old_index,
                    new_index,
                    &modified[new_index..new_index + new_len],
                )),
                DiffOp::Replace {
                    old_index,
                    old_len,
                    new_index,
                    new_len,
                } => Some(Change::modify(
                    old_index,
                    new_index,
                    &original[old_index..old_index + old_len],
                    &modified[new_index..new_index + new_len],
                )),
            })
            .collect()
    }
}

/// Diff front-end: algorithm + hunk grouping + rendering
pub struct DiffEngine {
    algorithm: Box<dyn DiffAlgorithm>,
    context_lines: usize,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new(Box::new(LookaheadDiff::default()), DEFAULT_CONTEXT_LINES)
    }
}

impl std::fmt::Debug for DiffEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffEngine")
            .field("context_lines", &self.context_lines)
            .finish_non_exhaustive()
    }
}

impl DiffEngine {
    pub fn new(algorithm: Box<dyn DiffAlgorithm>, context_lines: usize) -> Self {
        Self {
            algorithm,
            context_lines,
        }
    }

    /// Build an engine for the configured backend
    pub fn with_kind(kind: DiffAlgorithmKind, lookahead: usize, context_lines: usize) -> Self {
        let algorithm: Box<dyn DiffAlgorithm> = match kind {
            DiffAlgorithmKind::Lookahead => Box::new(LookaheadDiff { window: lookahead }),
            DiffAlgorithmKind::Myers => Box::new(MyersDiff),
        };
        Self::new(algorithm, context_lines)
    }

    pub fn context_lines(&self) -> usize {
        self.context_lines
    }

    /// Raw change list between two buffers
    pub fn changes(&self, original: &str, modified: &str) -> Vec<Change> {
        let a = split_lines(original);
        let b = split_lines(modified);
        self.algorithm.changes(&a, &b)
    }

    /// Changes grouped into context-padded hunks
    pub fn hunks(&self, original: &str, modified: &str) -> Vec<Hunk> {
        let a = split_lines(original);
        let b = split_lines(modified);
        let changes = self.algorithm.changes(&a, &b);
        group_hunks(changes, &a, &b, self.context_lines)
    }

    /// Unified diff body (hunks only); empty when the buffers match
    pub fn diff(&self, original: &str, modified: &str) -> String {
        let mut out = String::new();
        for hunk in self.hunks(original, modified) {
            render_hunk(&mut out, &hunk);
        }
        out
    }

    /// Unified diff with `--- a/` / `+++ b/` file headers
    pub fn diff_with_header(&self, path: &str, original: &str, modified: &str) -> String {
        let body = self.diff(original, modified);
        if body.is_empty() {
            return body;
        }
        format!("--- a/{path}\n+++ b/{path}\n{body}")
    }
}

/// Lines with their terminators; only the last one may lack `\n`.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.split_inclusive('\n').collect()
}

fn strip_eol(line: &str) -> &str {
    line.strip_suffix('\n').unwrap_or(line)
}

/// Push `raw` as a hunk line, followed by the marker when it is unterminated
fn push_line(lines: &mut Vec<HunkLine>, raw: &str, wrap: fn(String) -> HunkLine) {
    lines.push(wrap(strip_eol(raw).to_string()));
    if !raw.ends_with('\n') {
        lines.push(HunkLine::NoNewline);
    }
}

/// Group raw changes into hunks.
///
/// A change joins the current hunk when it starts within `2 * context`
/// lines of the previous change's end.
pub fn group_hunks(
    changes: Vec<Change>,
    original: &[&str],
    modified: &[&str],
    context: usize,
) -> Vec<Hunk> {
    let mut groups: Vec<Vec<Change>> = Vec::new();

    for change in changes {
        match groups.last_mut() {
            Some(group)
                if group
                    .last()
                    .is_some_and(|prev| change.old_start() <= prev.old_end() + 2 * context) =>
            {
                group.push(change)
            }
            _ => groups.push(vec![change]),
        }
    }

    groups
        .into_iter()
        .filter_map(|group| build_hunk(group, original, modified, context))
        .collect()
}

fn build_hunk(
    changes: Vec<Change>,
    original: &[&str],
    modified: &[&str],
    context: usize,
) -> Option<Hunk> {
    let first = changes.first()?;
    let last = changes.last()?;

    // Lines around the group are unchanged, so both sides pad by the same amount
    let lead = context.min(first.old_start()).min(first.new_start());
    let trail = context.min(original.len().saturating_sub(last.old_end()));

    let start_o = first.old_start() - lead;
    let start_m = first.new_start() - lead;
    let end_o = last.old_end() + trail;
    let end_m = last.new_end() + trail;

    let mut lines = Vec::new();
    let mut cursor = start_o;
    for change in &changes {
        for raw in &original[cursor..change.old_start()] {
            push_line(&mut lines, raw, HunkLine::Context);
        }
        for raw in &original[change.old_start()..change.old_end()] {
            push_line(&mut lines, raw, HunkLine::Remove);
        }
        for raw in &modified[change.new_start()..change.new_end()] {
            push_line(&mut lines, raw, HunkLine::Add);
        }
        cursor = change.old_end();
    }
    for raw in &original[cursor..end_o] {
        push_line(&mut lines, raw, HunkLine::Context);
    }

    Some(Hunk {
        start_original: start_o + 1,
        len_original: end_o - start_o,
        start_modified: start_m + 1,
        len_modified: end_m - start_m,
        changes,
        lines,
    })
}

/// Render a single hunk
pub fn render_hunk(output: &mut String, hunk: &Hunk) {
    // Empty ranges point at the line before them, per unified-diff convention
    let old_start = if hunk.len_original == 0 {
        hunk.start_original - 1
    } else {
        hunk.start_original
    };
    let new_start = if hunk.len_modified == 0 {
        hunk.start_modified - 1
    } else {
        hunk.start_modified
    };

    output.push_str(&format!(
        "@@ -{},{} +{},{} @@\n",
        old_start, hunk.len_original, new_start, hunk.len_modified
    ));

    for line in &hunk.lines {
        match line {
            HunkLine::Context(content) => output.push_str(&format!(" {}\n", content)),
            HunkLine::Remove(content) => output.push_str(&format!("-{}\n", content)),
            HunkLine::Add(content) => output.push_str(&format!("+{}\n", content)),
            HunkLine::NoNewline => {
                output.push_str(NO_NEWLINE_MARKER);
                output.push('\n');
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {i}\n")).collect()
    }

    #[test]
    fn identical_buffers_produce_no_diff() {
        let engine = DiffEngine::default();
        assert!(engine.changes("a\nb\n", "a\nb\n").is_empty());
        assert_eq!(engine.diff("a\nb\n", "a\nb\n"), "");
    }

    #[test]
    fn unsynced_last_line_is_a_modify() {
        let engine = DiffEngine::default();
        let changes = engine.changes("a\nb", "a\nB");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Modify);
        assert_eq!(changes[0].start_line, 2);
        assert_eq!(changes[0].end_line, 2);
        assert_eq!(changes[0].old_lines, vec!["b"]);
        assert_eq!(changes[0].new_lines, vec!["B"]);
    }

    #[test]
    fn replaced_middle_line_is_delete_then_add() {
        let engine = DiffEngine::default();
        let changes = engine.changes("a\nb\nc", "a\nB\nc");
        let kinds: Vec<_> = changes.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Delete, ChangeKind::Add]);
        assert_eq!(changes[0].start_line, 2);
        assert_eq!(changes[1].new_lines, vec!["B"]);
    }

    #[test]
    fn insertion_resyncs_within_window() {
        let engine = DiffEngine::default();
        let changes = engine.changes("a\nb\nc", "a\nx\ny\nb\nc");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Add);
        assert_eq!(changes[0].start_line, 2);
        assert_eq!(changes[0].new_lines, vec!["x", "y"]);
    }

    #[test]
    fn deletion_resyncs_within_window() {
        let engine = DiffEngine::default();
        let changes = engine.changes("a\nb\nc\nd", "a\nd");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Delete);
        assert_eq!(changes[0].start_line, 2);
        assert_eq!(changes[0].end_line, 3);
    }

    #[test]
    fn trailing_lines_become_one_span() {
        let engine = DiffEngine::default();
        let changes = engine.changes("a\n", "a\nb\nc\n");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Add);
        assert_eq!(changes[0].new_lines, vec!["b", "c"]);

        let changes = engine.changes("a\nb\nc\n", "a\n");
        assert_eq!(changes[0].kind, ChangeKind::Delete);
        assert_eq!(changes[0].old_lines, vec!["b", "c"]);
    }

    #[test]
    fn lookahead_overreports_distant_insertions() {
        // Seven new lines on top: beyond the 5-line window, so the heuristic
        // degrades to line-by-line modifies while Myers finds a pure insert.
        let original = "l1\nl2\nl3";
        let modified = "x1\nx2\nx3\nx4\nx5\nx6\nx7\nl1\nl2\nl3";

        let lookahead = DiffEngine::default();
        let removed: usize = lookahead
            .changes(original, modified)
            .iter()
            .map(|c| c.old_lines.len())
            .sum();
        assert_eq!(removed, 3);

        let myers = DiffEngine::with_kind(DiffAlgorithmKind::Myers, 5, 3);
        let changes = myers.changes(original, modified);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Add);
        assert_eq!(changes[0].new_lines.len(), 7);
    }

    #[test]
    fn hunk_header_and_context() {
        let engine = DiffEngine::default();
        let original = numbered(10);
        let modified = original.replace("line 5\n", "line five\n");

        let diff = engine.diff(&original, &modified);
        let expected = "@@ -2,7 +2,7 @@\n line 2\n line 3\n line 4\n-line 5\n+line five\n line 6\n line 7\n line 8\n";
        assert_eq!(diff, expected);
    }

    #[test]
    fn nearby_changes_share_a_hunk() {
        let engine = DiffEngine::default();
        let original = numbered(20);
        // Lines 3 and 9: gap of 5 unchanged lines (<= 6), one hunk
        let modified = original
            .replace("line 3\n", "line three\n")
            .replace("line 9\n", "line nine\n");
        let hunks = engine.hunks(&original, &modified);
        assert_eq!(hunks.len(), 1);
        let removed = hunks[0]
            .lines
            .iter()
            .filter(|l| matches!(l, HunkLine::Remove(_)))
            .count();
        assert_eq!(removed, 2);
    }

    #[test]
    fn distant_changes_split_hunks() {
        let engine = DiffEngine::default();
        let original = numbered(30);
        let modified = original
            .replace("line 2\n", "line two\n")
            .replace("line 20\n", "line twenty\n");
        let hunks = engine.hunks(&original, &modified);
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].start_original, 1);
        assert_eq!(hunks[1].start_original, 17);
        assert_eq!(hunks[1].len_original, 7);
    }

    #[test]
    fn added_final_newline_is_a_change() {
        for engine in [
            DiffEngine::default(),
            DiffEngine::with_kind(DiffAlgorithmKind::Myers, 5, 3),
        ] {
            let diff = engine.diff("a\nb", "a\nb\n");
            assert_eq!(
                diff,
                "@@ -1,2 +1,2 @@\n a\n-b\n\\ No newline at end of file\n+b\n"
            );
        }
    }

    #[test]
    fn removed_final_newline_is_a_change() {
        let engine = DiffEngine::default();
        let changes = engine.changes("a\nb\n", "a\nb");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].old_lines, vec!["b"]);
        assert_eq!(changes[0].new_lines, vec!["b"]);

        let diff = engine.diff("a\nb\n", "a\nb");
        assert!(diff.ends_with("-b\n+b\n\\ No newline at end of file\n"));
    }

    #[test]
    fn unterminated_context_line_is_marked() {
        let engine = DiffEngine::default();
        let diff = engine.diff("x\nend", "y\nend");
        assert!(diff.ends_with(" end\n\\ No newline at end of file\n"));
    }

    #[test]
    fn empty_original_uses_zero_start() {
        let engine = DiffEngine::default();
        let diff = engine.diff("", "a\nb\n");
        assert!(diff.starts_with("@@ -0,0 +1,2 @@\n"));
        assert!(diff.contains("+a\n+b\n"));
    }

    #[test]
    fn header_only_when_changed() {
        let engine = DiffEngine::default();
        assert_eq!(engine.diff_with_header("f.txt", "a", "a"), "");
        let diff = engine.diff_with_header("f.txt", "a", "b");
        assert!(diff.starts_with("--- a/f.txt\n+++ b/f.txt\n@@ "));
    }
}
