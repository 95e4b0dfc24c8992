//! Git conflict marker detection
//!
//! Byte-level, column-0 anchored scan for unresolved merge blocks:
//! - 3-way blocks: <<<<<<< HEAD → ||||||| base → ======= → >>>>>>> feature/x
//! - 2-way blocks: <<<<<<< HEAD → ======= → >>>>>>> feature/x
//!
//! Used only as an advisory: editing a file that still carries markers is
//! allowed, but the caller is told about it.

use memchr::memchr_iter;

/// One complete conflict block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerBlock {
    /// Line range within file (1-based inclusive)
    pub line_range: (usize, usize),
    pub ours_meta: String,   // e.g., "HEAD"
    pub theirs_meta: String, // e.g., "feature/x"
    pub has_base: bool,      // true if ||||||| base section present
}

/// State machine for parsing Git conflict markers
#[derive(Debug, Clone, Copy, PartialEq)]
enum ParseState {
    Scanning, // Looking for conflict start
    InOurs,   // Inside ours section
    InBase,   // Inside base section (3-way only)
    InTheirs, // Inside theirs section
}

/// Find every complete conflict block in `content`.
///
/// Unterminated blocks are not reported.
pub fn scan_markers(content: &str) -> Vec<MarkerBlock> {
    let bytes = content.as_bytes();
    let mut blocks = Vec::new();
    let mut state = ParseState::Scanning;

    let mut start_line = 0usize;
    let mut ours_meta = String::new();
    let mut has_base = false;

    for (idx, line) in lines_of(bytes).enumerate() {
        let line_no = idx + 1;
        match state {
            ParseState::Scanning => {
                if is_hdr_b(line) {
                    state = ParseState::InOurs;
                    start_line = line_no;
                    ours_meta = meta_bytes(line, b'<');
                    has_base = false;
                }
            }
            ParseState::InOurs => {
                if is_base_b(line) {
                    state = ParseState::InBase;
                    has_base = true;
                } else if is_sep_b(line) {
                    state = ParseState::InTheirs;
                }
            }
            ParseState::InBase => {
                if is_sep_b(line) {
                    state = ParseState::InTheirs;
                }
            }
            ParseState::InTheirs => {
                if is_trl_b(line) {
                    blocks.push(MarkerBlock {
                        line_range: (start_line, line_no),
                        ours_meta: std::mem::take(&mut ours_meta),
                        theirs_meta: meta_bytes(line, b'>'),
                        has_base,
                    });
                    state = ParseState::Scanning;
                }
            }
        }
    }

    blocks
}

/// One-line advisory for a non-empty scan
pub fn describe(blocks: &[MarkerBlock]) -> Option<String> {
    let first = blocks.first()?;
    Some(format!(
        "file contains {} unresolved merge conflict block(s); first at lines {}-{}",
        blocks.len(),
        first.line_range.0,
        first.line_range.1
    ))
}

/// Lines without their terminator, split on `\n` with memchr
fn lines_of(bytes: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut start = 0usize;
    let ends = memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len()));
    ends.filter_map(move |end| {
        if start > bytes.len() {
            return None;
        }
        let line = &bytes[start..end];
        start = end + 1;
        Some(line)
    })
}

/// Returns true if line starts with ≥7 of the given byte (column-0 anchored)
fn starts_with_n(line: &[u8], ch: u8) -> bool {
    if line.len() < 7 {
        return false;
    } // fast fail
    line.iter().take(7).all(|&b| b == ch)
}

/// Check for conflict start header: "<<<<<<<"
fn is_hdr_b(line: &[u8]) -> bool {
    starts_with_n(line, b'<')
}

/// Check for base section marker: "|||||||"
fn is_base_b(line: &[u8]) -> bool {
    starts_with_n(line, b'|')
}

/// Check for separator marker: "======="
fn is_sep_b(line: &[u8]) -> bool {
    starts_with_n(line, b'=')
}

/// Check for conflict end trailer: ">>>>>>>"
fn is_trl_b(line: &[u8]) -> bool {
    starts_with_n(line, b'>')
}

/// Extract trailing metadata after the marker run (and one optional space)
fn meta_bytes(line: &[u8], marker: u8) -> String {
    let mut i = 0usize; // cursor
    while i < line.len() && line[i] == marker {
        i += 1;
    } // skip run
    if i < line.len() && line[i] == b' ' {
        i += 1;
    } // optional space
    String::from_utf8_lossy(&line[i..]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_marker_detection() {
        assert!(is_hdr_b(b"<<<<<<<"));
        assert!(is_hdr_b(b"<<<<<<< HEAD"));
        assert!(!is_hdr_b(b"<<<<<< not enough"));
        assert!(!is_hdr_b(b" <<<<<<< indented")); // Column-0 requirement

        assert!(is_base_b(b"||||||| base"));
        assert!(is_sep_b(b"======="));
        assert!(!is_sep_b(b"====== not enough"));
        assert!(is_trl_b(b">>>>>>> feature/x"));
    }

    #[test]
    fn test_scan_2way_block() {
        let input = "\
fn keep() {}
<<<<<<< HEAD
fn hello() { main() }
=======
fn hello() { feature() }
>>>>>>> feature/greeting
";
        let blocks = scan_markers(input);
        assert_eq!(
            blocks,
            vec![MarkerBlock {
                line_range: (2, 6),
                ours_meta: "HEAD".into(),
                theirs_meta: "feature/greeting".into(),
                has_base: false,
            }]
        );
    }

    #[test]
    fn test_scan_3way_block() {
        let input = "<<<<<<< HEAD\na\n||||||| base\nb\n=======\nc\n>>>>>>> topic";
        let blocks = scan_markers(input);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].has_base);
        assert_eq!(blocks[0].line_range, (1, 7));
    }

    #[test]
    fn test_indented_and_unterminated_markers_ignored() {
        let indented = "    <<<<<<< HEAD\n    a\n    =======\n    b\n    >>>>>>> x\n";
        assert!(scan_markers(indented).is_empty());

        let open = "<<<<<<< HEAD\na\n=======\nb\n";
        assert!(scan_markers(open).is_empty());
    }

    #[test]
    fn test_crlf_handling() {
        let input = "<<<<<<< HEAD\r\nx\r\n=======\r\ny\r\n>>>>>>> win\r\n";
        let blocks = scan_markers(input);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].theirs_meta, "win");
    }

    #[test]
    fn test_metadata_extraction() {
        assert_eq!(meta_bytes(b"<<<<<<< HEAD", b'<'), "HEAD");
        assert_eq!(meta_bytes(b"<<<<<<<", b'<'), "");
        assert_eq!(meta_bytes(b"<<<<<<<no space", b'<'), "no space");
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe(&[]), None);
        let blocks = scan_markers("<<<<<<<\n=======\n>>>>>>>\n");
        let msg = describe(&blocks).unwrap();
        assert!(msg.contains("1 unresolved merge conflict block"));
        assert!(msg.contains("lines 1-3"));
    }
}
