//! Merge and annotation algorithms over annotated segments.
//!
//! Every function here returns *normalized* segments: no empty-text segments
//! and no two neighbours with the same annotation set. Offsets are char
//! offsets into the concatenated text.

use folio_types::{Annotation, Segment, same_annotation_set};

use crate::error::TextError;

/// Total length in chars.
pub fn text_len(segments: &[Segment]) -> usize {
    segments.iter().map(Segment::char_len).sum()
}

/// Concatenated text, annotations dropped.
pub fn plain_text(segments: &[Segment]) -> String {
    segments.iter().map(|s| s.text.as_str()).collect()
}

/// Drop empty segments and coalesce neighbours with equal annotation sets.
pub fn normalize(segments: impl IntoIterator<Item = Segment>) -> Vec<Segment> {
    let mut out: Vec<Segment> = Vec::new();
    for segment in segments {
        if segment.is_empty() {
            continue;
        }
        match out.last_mut() {
            Some(last) if last.same_annotations(&segment) => last.text.push_str(&segment.text),
            _ => out.push(segment),
        }
    }
    out
}

/// Split at a char offset. Offsets past the end split at the end.
pub fn split_at(segments: &[Segment], index: usize) -> (Vec<Segment>, Vec<Segment>) {
    let mut left = Vec::new();
    let mut right = Vec::new();
    let mut offset = 0;
    for segment in segments {
        let len = segment.char_len();
        if offset + len <= index {
            left.push(segment.clone());
        } else if offset >= index {
            right.push(segment.clone());
        } else {
            let byte = byte_offset(&segment.text, index - offset);
            left.push(Segment::new(&segment.text[..byte], segment.annotations.clone()));
            right.push(Segment::new(&segment.text[byte..], segment.annotations.clone()));
        }
        offset += len;
    }
    (left, right)
}

/// Segments covering `[start, end)`.
pub fn slice(segments: &[Segment], start: usize, end: usize) -> Vec<Segment> {
    let (_, tail) = split_at(segments, start);
    let (mid, _) = split_at(&tail, end.saturating_sub(start));
    normalize(mid)
}

/// Splice `record` into `before` at char offset `insertion_index`.
///
/// Boundaries whose neighbours end up with equal annotation sets are
/// coalesced, so inserting plain text into plain text yields one segment.
/// An index past the end appends.
pub fn merge(before: &[Segment], record: &[Segment], insertion_index: usize) -> Vec<Segment> {
    let (left, right) = split_at(before, insertion_index);
    normalize(left.into_iter().chain(record.iter().cloned()).chain(right))
}

/// Remove `[start, end)`.
pub fn delete_range(segments: &[Segment], start: usize, end: usize) -> Vec<Segment> {
    let (left, rest) = split_at(segments, start);
    let (_, right) = split_at(&rest, end.saturating_sub(start));
    normalize(left.into_iter().chain(right))
}

/// Insert plain `text` at `index`, inheriting the annotations of the char
/// before the insertion point (or after it, at the very start).
pub fn insert_text(segments: &[Segment], index: usize, text: &str) -> Vec<Segment> {
    if text.is_empty() {
        return normalize(segments.iter().cloned());
    }
    let inherited = annotations_at(segments, index).unwrap_or_default();
    merge(segments, &[Segment::new(text, inherited)], index)
}

/// Annotations in effect for a char inserted at `index`.
fn annotations_at(segments: &[Segment], index: usize) -> Option<Vec<Annotation>> {
    let mut offset = 0;
    for segment in segments {
        let len = segment.char_len();
        if index > offset && index <= offset + len {
            return Some(segment.annotations.clone());
        }
        offset += len;
    }
    segments.first().map(|s| s.annotations.clone())
}

/// The annotation set shared by every char of `[start, end)`, or `None` when
/// the range is empty or mixes sets.
pub fn uniform_annotations(
    segments: &[Segment],
    start: usize,
    end: usize,
) -> Option<Vec<Annotation>> {
    let covered = slice(segments, start, end);
    match covered.as_slice() {
        [only] => Some(only.annotations.clone()),
        _ => None,
    }
}

/// Toggle `annotations` across `[start, end)`.
///
/// If the range already carries exactly that set, the range becomes
/// unannotated; otherwise the whole range takes exactly that set. Boundaries
/// inside the range are discarded, boundaries at its edges are kept by
/// splitting the overlapping segments. An empty range is a no-op.
pub fn toggle_annotations(
    segments: &[Segment],
    start: usize,
    end: usize,
    annotations: &[Annotation],
) -> Result<Vec<Segment>, TextError> {
    let len = text_len(segments);
    if start > end || end > len {
        return Err(TextError::InvalidRange { start, end, len });
    }
    if start == end {
        return Ok(normalize(segments.iter().cloned()));
    }

    let applied = match uniform_annotations(segments, start, end) {
        Some(current) if same_annotation_set(&current, annotations) => Vec::new(),
        _ => dedup(annotations),
    };

    let (left, rest) = split_at(segments, start);
    let (mid, right) = split_at(&rest, end - start);
    let mid = Segment::new(plain_text(&mid), applied);
    Ok(normalize(left.into_iter().chain(std::iter::once(mid)).chain(right)))
}

fn dedup(annotations: &[Annotation]) -> Vec<Annotation> {
    let mut out: Vec<Annotation> = Vec::with_capacity(annotations.len());
    for a in annotations {
        if !out.contains(a) {
            out.push(a.clone());
        }
    }
    out
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
