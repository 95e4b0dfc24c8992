//! Property tests for edit round-trips and the diff/patch pair.

use std::fs;

use goai_edit::core::diff::{DiffAlgorithmKind, DiffEngine};
use goai_edit::core::edit::{EditOrchestrator, EditRequest};
use goai_edit::core::patch::{PatchOptions, apply_patch};
use goai_edit::infra::config::Config;
use proptest::prelude::*;
use tempfile::TempDir;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// replace_all there and back restores the original bytes
    #[test]
    fn replace_all_round_trip(prefix in "[a-z \n]{0,80}", suffix in "[a-z \n]{0,80}") {
        let original = format!("{prefix}ab{suffix}");
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("rt.txt"), &original).unwrap();
        let orch = EditOrchestrator::new(tmp.path(), &Config::default()).unwrap();

        let forward = EditRequest { replace_all: Some(true), ..EditRequest::replace("rt.txt", "ab", "QZ") };
        let back = EditRequest { replace_all: Some(true), ..EditRequest::replace("rt.txt", "QZ", "ab") };
        orch.execute(&forward.with_backup(false)).unwrap();
        orch.execute(&back.with_backup(false)).unwrap();

        prop_assert_eq!(fs::read_to_string(tmp.path().join("rt.txt")).unwrap(), original);
    }

    /// A rendered diff applied in strict mode reproduces the new text,
    /// including whether it ends with a newline
    #[test]
    fn diff_applies_cleanly(
        old in prop::collection::vec("[a-c]{0,3}", 0..12),
        new in prop::collection::vec("[a-c]{0,3}", 0..12),
        old_eol in any::<bool>(),
        new_eol in any::<bool>(),
        myers in any::<bool>(),
    ) {
        let join = |lines: &[String], eol: bool| {
            let mut text = lines.join("\n");
            if eol && !lines.is_empty() {
                text.push('\n');
            }
            text
        };
        let old_text = join(&old, old_eol);
        let new_text = join(&new, new_eol);

        let kind = if myers { DiffAlgorithmKind::Myers } else { DiffAlgorithmKind::Lookahead };
        let engine = DiffEngine::with_kind(kind, 5, 3);
        let patch = engine.diff(&old_text, &new_text);
        prop_assert_eq!(patch.is_empty(), old_text == new_text);
        prop_assume!(!patch.is_empty());

        let opts = PatchOptions { use_hunk_offsets: true };
        let applied = apply_patch(&old_text, &patch, opts).unwrap();
        prop_assert_eq!(applied.content, new_text);
    }
}
