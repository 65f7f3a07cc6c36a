//! Reconciling native text-input snapshots into structured edits.
//!
//! An editable surface reports its whole value plus selection before and after
//! each input event. [`deduce_input`] reduces the pair to the minimal edit:
//! which text was typed and how many chars around the previous selection it
//! replaced. Two cases are kept apart on purpose:
//!
//! - **collapsed** current selection: ordinary typing, backspace, paste. The
//!   typed text replaces everything from the common prefix up to the previous
//!   selection start.
//! - **active** current selection: an IME composition update. The typed text
//!   replaces exactly the previous (composition) selection.
//!
//! All positions are char offsets.

use serde::{Deserialize, Serialize};

use folio_types::Segment;

use crate::error::TextError;
use crate::segment;

/// Value and selection of an editable surface at one instant.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditableState {
    pub value: String,
    pub selection_start: usize,
    pub selection_end: usize,
}

impl EditableState {
    pub fn new(value: impl Into<String>, selection_start: usize, selection_end: usize) -> Self {
        Self {
            value: value.into(),
            selection_start,
            selection_end,
        }
    }

    /// State with a caret and no selection.
    pub fn collapsed(value: impl Into<String>, cursor: usize) -> Self {
        Self::new(value, cursor, cursor)
    }

    pub fn is_collapsed(&self) -> bool {
        self.selection_start == self.selection_end
    }

    pub fn char_len(&self) -> usize {
        self.value.chars().count()
    }

    /// Check the selection is ordered and inside the value.
    pub fn validate(&self) -> Result<(), TextError> {
        let len = self.char_len();
        if self.selection_start > self.selection_end || self.selection_end > len {
            return Err(TextError::InvalidSelection {
                start: self.selection_start,
                end: self.selection_end,
                len,
            });
        }
        Ok(())
    }
}

/// Minimal edit deduced from two snapshots.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeData {
    /// Full current value.
    pub text: String,
    /// The typed (changed) span.
    #[serde(rename = "type")]
    pub type_text: String,
    pub replace_prev_char_cnt: usize,
    pub replace_next_char_cnt: usize,
    pub position_delta: isize,
}

impl TypeData {
    pub fn is_noop(&self) -> bool {
        self.type_text.is_empty()
            && self.replace_prev_char_cnt == 0
            && self.replace_next_char_cnt == 0
    }
}

/// Deduce the edit that turned `previous` into `current`.
///
/// The common prefix never extends past either selection start and the common
/// suffix never extends past either selection end, so a keystroke is always
/// attributed to the caret that produced it even when neighbouring chars
/// repeat. Chars removed after the previous selection end (forward delete)
/// are counted in `replace_next_char_cnt`.
///
/// Fails with [`TextError::InvalidSelection`] when either snapshot's
/// selection is out of order or outside its value.
pub fn deduce_input(
    previous: &EditableState,
    current: &EditableState,
    could_be_emoji_input: bool,
) -> Result<TypeData, TextError> {
    previous.validate()?;
    current.validate()?;

    let prev: Vec<char> = previous.value.chars().collect();
    let cur: Vec<char> = current.value.chars().collect();

    let prefix_len = common_prefix(&prev, &cur)
        .min(previous.selection_start)
        .min(current.selection_start);
    let suffix_len = common_suffix(&prev, &cur)
        .min(prev.len() - previous.selection_end)
        .min(cur.len() - current.selection_end);
    // The two affixes can meet but never cross.
    let suffix_len = suffix_len
        .min(prev.len() - prefix_len)
        .min(cur.len() - prefix_len);

    let previous_value = &prev[prefix_len..prev.len() - suffix_len];
    let current_value = &cur[prefix_len..cur.len() - suffix_len];
    let previous_selection_start = previous.selection_start - prefix_len;
    let previous_selection_end = previous.selection_end - prefix_len;
    let current_selection_start = current.selection_start - prefix_len;
    let current_selection_end = current.selection_end - prefix_len;

    tracing::trace!(
        prefix_len,
        suffix_len,
        previous_value = %collect(previous_value),
        current_value = %collect(current_value),
        "deduce_input"
    );

    if could_be_emoji_input
        && current_selection_start == current_selection_end
        && !previous_value.is_empty()
    {
        if let Some(emoji) =
            potential_emoji(previous_value, current_value, current_selection_start)
        {
            return Ok(TypeData {
                text: current.value.clone(),
                type_text: emoji,
                ..Default::default()
            });
        }
    }

    let replace_prev_char_cnt = if current_selection_start == current_selection_end {
        previous.selection_start - prefix_len
    } else {
        previous_selection_end - previous_selection_start
    };
    // Changed chars of the previous value past its selection end.
    let replace_next_char_cnt = (prev.len() - suffix_len).saturating_sub(previous.selection_end);

    Ok(TypeData {
        text: current.value.clone(),
        type_text: collect(current_value),
        replace_prev_char_cnt,
        replace_next_char_cnt,
        position_delta: 0,
    })
}

/// The macOS emoji picker inserts at the end (or start) of the buffer rather
/// than at the caret. Recognise that shape and return just the emoji.
fn potential_emoji(
    previous_value: &[char],
    current_value: &[char],
    current_selection_start: usize,
) -> Option<String> {
    let candidate = if current_selection_start == current_value.len() {
        current_value
            .starts_with(previous_value)
            .then(|| &current_value[previous_value.len()..])
    } else {
        current_value
            .ends_with(previous_value)
            .then(|| &current_value[..current_value.len() - previous_value.len()])
    }?;
    (!candidate.is_empty() && candidate.iter().copied().any(is_emoji))
        .then(|| collect(candidate))
}

fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0xFE0F
            | 0x200D
            | 0x2600..=0x27BF
            | 0x2B00..=0x2BFF
            | 0x1F000..=0x1FAFF
    )
}

/// Apply a deduced edit to title segments.
///
/// The replaced range is anchored on the previous selection: for committed
/// input it runs from `replace_prev_char_cnt` chars before the selection
/// start to `replace_next_char_cnt` chars past the selection end; during
/// composition it is the previous selection itself. Typed text inherits the
/// annotations in effect at the insertion point.
pub fn apply_type_data(
    segments: &[Segment],
    previous: &EditableState,
    current: &EditableState,
    data: &TypeData,
) -> Vec<Segment> {
    let len = segment::text_len(segments);
    let (start, end) = if current.is_collapsed() {
        (
            previous.selection_start.saturating_sub(data.replace_prev_char_cnt),
            previous.selection_end,
        )
    } else {
        (
            previous.selection_end.saturating_sub(data.replace_prev_char_cnt),
            previous.selection_end,
        )
    };
    let start = start.min(len);
    let end = (end + data.replace_next_char_cnt).min(len).max(start);

    let inherited = segment::slice(segments, start.saturating_sub(1), start.max(1))
        .first()
        .map(|s| s.annotations.clone());
    let removed = segment::delete_range(segments, start, end);
    match inherited {
        Some(annotations) if start > 0 && !data.type_text.is_empty() => {
            segment::merge(&removed, &[Segment::new(data.type_text.clone(), annotations)], start)
        }
        _ => segment::insert_text(&removed, start, &data.type_text),
    }
}

fn common_prefix(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn common_suffix(a: &[char], b: &[char]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

fn collect(chars: &[char]) -> String {
    chars.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{Diff, text_change};
    use folio_types::Annotation;

    fn deduce(previous: &EditableState, current: &EditableState) -> TypeData {
        deduce_input(previous, current, false).unwrap()
    }

    #[test]
    fn test_pure_append() {
        let data = deduce(&EditableState::collapsed("# ", 2), &EditableState::collapsed("# H", 3));
        assert_eq!(
            data,
            TypeData {
                text: "# H".into(),
                type_text: "H".into(),
                replace_prev_char_cnt: 0,
                replace_next_char_cnt: 0,
                position_delta: 0,
            }
        );
    }

    #[test]
    fn test_autocorrect_replacement_decomposes() {
        let previous = EditableState::collapsed("Hyi jia r", 9);
        let current = EditableState::collapsed("Hyi ji are", 10);
        assert_eq!(
            text_change(&previous.value, &current.value),
            vec![Diff::equal("Hyi ji"), Diff::delete("a r"), Diff::insert(" are")]
        );

        let data = deduce(&previous, &current);
        assert_eq!(data.type_text, " are");
        assert_eq!(data.replace_prev_char_cnt, 3);
    }

    #[test]
    fn test_backspace() {
        let data = deduce(&EditableState::collapsed("abc", 3), &EditableState::collapsed("ab", 2));
        assert_eq!(data.type_text, "");
        assert_eq!(data.replace_prev_char_cnt, 1);
    }

    #[test]
    fn test_repeated_char_attributed_to_caret() {
        // Typing "a" at the start of "aaa": a naive suffix would claim the
        // insertion happened at the end.
        let data = deduce(
            &EditableState::collapsed("aaa", 0),
            &EditableState::collapsed("aaaa", 1),
        );
        assert_eq!(data.type_text, "a");
        assert_eq!(data.replace_prev_char_cnt, 0);
    }

    #[test]
    fn test_typing_over_selection() {
        let previous = EditableState::new("abcd", 1, 3);
        let current = EditableState::collapsed("aXd", 2);
        let data = deduce(&previous, &current);
        assert_eq!(data.type_text, "X");
        assert_eq!(data.replace_prev_char_cnt, 0);

        let applied = apply_type_data(&[Segment::plain("abcd")], &previous, &current, &data);
        assert_eq!(segment::plain_text(&applied), "aXd");
    }

    #[test]
    fn test_composition_replaces_previous_selection() {
        let previous = EditableState::new("abか", 2, 3);
        let current = EditableState::new("abかな", 2, 4);
        let data = deduce(&previous, &current);
        assert_eq!(data.type_text, "かな");
        assert_eq!(data.replace_prev_char_cnt, 1);

        let applied = apply_type_data(&[Segment::plain("abか")], &previous, &current, &data);
        assert_eq!(segment::plain_text(&applied), "abかな");
    }

    #[test]
    fn test_emoji_picker_insert_at_end() {
        let previous = EditableState::collapsed("ab", 1);
        let current = EditableState::collapsed("ab😀", 3);
        let data = deduce_input(&previous, &current, true).unwrap();
        assert_eq!(data.type_text, "😀");
        assert_eq!(data.replace_prev_char_cnt, 0);

        // Without the hint the same snapshots read as a replacement.
        let plain = deduce(&previous, &current);
        assert_eq!(plain.type_text, "b😀");
        assert_eq!(plain.replace_prev_char_cnt, 0);
        assert_eq!(plain.replace_next_char_cnt, 1);
    }

    #[test]
    fn test_apply_reproduces_current_value() {
        let cases = [
            (EditableState::collapsed("# ", 2), EditableState::collapsed("# H", 3)),
            (
                EditableState::collapsed("Hyi jia r", 9),
                EditableState::collapsed("Hyi ji are", 10),
            ),
            (EditableState::collapsed("abc", 3), EditableState::collapsed("ab", 2)),
            (EditableState::collapsed("hello", 0), EditableState::collapsed("Xhello", 1)),
            (EditableState::new("hello", 0, 5), EditableState::collapsed("", 0)),
            // Delete key.
            (EditableState::collapsed("abc", 1), EditableState::collapsed("ac", 1)),
            // Forward word delete.
            (EditableState::collapsed("hello world", 5), EditableState::collapsed("hello", 5)),
            (
                EditableState::collapsed("one two three", 3),
                EditableState::collapsed("one three", 3),
            ),
        ];
        for (previous, current) in cases {
            let data = deduce(&previous, &current);
            let title = [Segment::plain(previous.value.clone())];
            let applied = apply_type_data(&title, &previous, &current, &data);
            assert_eq!(
                segment::plain_text(&applied),
                current.value,
                "{previous:?} -> {current:?}"
            );
        }
    }

    #[test]
    fn test_forward_delete_counts_next_chars() {
        let data = deduce(&EditableState::collapsed("abc", 1), &EditableState::collapsed("ac", 1));
        assert_eq!(data.type_text, "");
        assert_eq!(data.replace_prev_char_cnt, 0);
        assert_eq!(data.replace_next_char_cnt, 1);
        assert!(!data.is_noop());

        let data = deduce(
            &EditableState::collapsed("hello world", 5),
            &EditableState::collapsed("hello", 5),
        );
        assert_eq!(data.replace_next_char_cnt, 6);
    }

    #[test]
    fn test_invalid_snapshot_is_an_error() {
        let err = deduce_input(
            &EditableState::new("ab", 0, 5),
            &EditableState::collapsed("ab", 1),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, TextError::InvalidSelection { end: 5, .. }));
    }

    #[test]
    fn test_apply_keeps_annotations_of_preceding_text() {
        let title = vec![Segment::new("bold", vec![Annotation::bold()]), Segment::plain(" tail")];
        let previous = EditableState::collapsed("bold tail", 4);
        let current = EditableState::collapsed("bolder tail", 6);
        let data = deduce(&previous, &current);
        let applied = apply_type_data(&title, &previous, &current, &data);
        assert_eq!(
            applied,
            vec![Segment::new("bolder", vec![Annotation::bold()]), Segment::plain(" tail")]
        );
    }

    #[test]
    fn test_validate() {
        assert!(EditableState::new("ab", 0, 2).validate().is_ok());
        assert!(EditableState::new("ab", 2, 1).validate().is_err());
        assert!(EditableState::new("ab", 0, 3).validate().is_err());
    }
}
