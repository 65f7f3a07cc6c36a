//! Markdown auto-format detection.
//!
//! Typing `"# "` at the start of a text block turns it into a header, `"- "`
//! into a bullet, and so on. Detection works on the diff between two title
//! snapshots: the edit must be a pure insertion that ends exactly where a
//! known prefix ends, and the prefix must be new.

use folio_types::{BlockType, Segment};

use crate::diff::{DiffOp, text_change};
use crate::segment;

/// Prefixes accepted in addition to each block type's canonical one.
const ALIASES: &[(&str, BlockType)] = &[("* ", BlockType::BulletedList)];

/// A detected block-type conversion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shortcut {
    pub block_type: BlockType,
    /// Length in chars of the prefix to strip from the title.
    pub prefix_len: usize,
}

fn prefixes() -> impl Iterator<Item = (&'static str, BlockType)> {
    BlockType::ALL
        .iter()
        .filter_map(|kind| kind.spec().markdown_prefix.map(|p| (p, *kind)))
        .chain(ALIASES.iter().copied())
}

/// Detect a Markdown shortcut completed by the edit `previous -> current`.
pub fn detect_shortcut(previous: &str, current: &str) -> Option<Shortcut> {
    let diffs = text_change(previous, current);
    if diffs.iter().any(|d| d.op == DiffOp::Delete) {
        return None;
    }

    let mut offset = 0;
    let mut insert_end = None;
    for diff in &diffs {
        offset += diff.text.chars().count();
        if diff.op == DiffOp::Insert {
            insert_end = Some(offset);
        }
    }
    let insert_end = insert_end?;

    let shortcut = prefixes()
        .find(|(prefix, _)| {
            current.starts_with(prefix)
                && !previous.starts_with(prefix)
                && insert_end == prefix.chars().count()
        })
        .map(|(prefix, block_type)| Shortcut {
            block_type,
            prefix_len: prefix.chars().count(),
        });
    if let Some(found) = &shortcut {
        tracing::debug!(block_type = %found.block_type, "markdown shortcut");
    }
    shortcut
}

/// Title with the shortcut prefix removed.
pub fn strip_prefix(title: &[Segment], shortcut: &Shortcut) -> Vec<Segment> {
    segment::delete_range(title, 0, shortcut.prefix_len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_prefixes() {
        assert_eq!(
            detect_shortcut("#", "# "),
            Some(Shortcut { block_type: BlockType::Header, prefix_len: 2 })
        );
        assert_eq!(
            detect_shortcut("##", "## ").map(|s| s.block_type),
            Some(BlockType::SubHeader)
        );
        assert_eq!(
            detect_shortcut("###", "### ").map(|s| s.block_type),
            Some(BlockType::SubSubHeader)
        );
    }

    #[test]
    fn test_prefix_typed_before_existing_text() {
        assert_eq!(
            detect_shortcut("-hello", "- hello"),
            Some(Shortcut { block_type: BlockType::BulletedList, prefix_len: 2 })
        );
        assert_eq!(
            detect_shortcut("*", "* ").map(|s| s.block_type),
            Some(BlockType::BulletedList)
        );
        assert_eq!(detect_shortcut("[]", "[] ").map(|s| s.block_type), Some(BlockType::Todo));
        assert_eq!(
            detect_shortcut("1.", "1. ").map(|s| s.block_type),
            Some(BlockType::NumberedList)
        );
        assert_eq!(detect_shortcut(">", "> ").map(|s| s.block_type), Some(BlockType::Quote));
    }

    #[test]
    fn test_no_shortcut_after_prefix_exists() {
        // Typing after an existing "# " is just text.
        assert_eq!(detect_shortcut("# ", "# H"), None);
        assert_eq!(detect_shortcut("a#", "a# "), None);
        assert_eq!(detect_shortcut("# x", "# "), None);
    }

    #[test]
    fn test_strip_prefix() {
        let title = vec![Segment::plain("# Title")];
        let shortcut = detect_shortcut("#Title", "# Title").unwrap();
        assert_eq!(strip_prefix(&title, &shortcut), vec![Segment::plain("Title")]);
    }
}
