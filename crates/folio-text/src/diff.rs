//! Character-level diff primitives.
//!
//! A Myers-style diff in the diff-match-patch tradition: affix trimming,
//! half-match speedup under a time budget, middle-snake bisection, and a
//! merge cleanup pass. All offsets and lengths are in chars, never bytes.
//!
//! [`text_change`] is the cheap prefix/suffix decomposition used to classify a
//! single edit between two full-buffer snapshots (Markdown shortcuts, input
//! reconciliation). [`DiffEngine::diff_main`] is the full minimal diff.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Default time budget for a full diff, matching `Diff_Timeout = 1.0`.
pub const DEFAULT_DIFF_TIMEOUT: Duration = Duration::from_secs(1);

/// Kind of one diff run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffOp {
    Delete,
    Equal,
    Insert,
}

/// One run of a diff: an op and the text it covers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    pub op: DiffOp,
    pub text: String,
}

impl Diff {
    pub fn new(op: DiffOp, text: impl Into<String>) -> Self {
        Self {
            op,
            text: text.into(),
        }
    }

    pub fn equal(text: impl Into<String>) -> Self {
        Self::new(DiffOp::Equal, text)
    }

    pub fn insert(text: impl Into<String>) -> Self {
        Self::new(DiffOp::Insert, text)
    }

    pub fn delete(text: impl Into<String>) -> Self {
        Self::new(DiffOp::Delete, text)
    }
}

/// Five-way split returned by [`DiffEngine::half_match`].
///
/// `common` appears in both texts; the prefixes/suffixes are what surrounds it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HalfMatch {
    pub text1_prefix: String,
    pub text1_suffix: String,
    pub text2_prefix: String,
    pub text2_suffix: String,
    pub common: String,
}

type Run = (DiffOp, Vec<char>);

// ============================================================================
// Affix primitives
// ============================================================================

/// Number of leading chars shared by both texts.
pub fn common_prefix(text1: &str, text2: &str) -> usize {
    text1
        .chars()
        .zip(text2.chars())
        .take_while(|(a, b)| a == b)
        .count()
}

/// Number of trailing chars shared by both texts.
pub fn common_suffix(text1: &str, text2: &str) -> usize {
    text1
        .chars()
        .rev()
        .zip(text2.chars().rev())
        .take_while(|(a, b)| a == b)
        .count()
}

/// Length of the longest suffix of `text1` that is a prefix of `text2`.
pub fn common_overlap(text1: &str, text2: &str) -> usize {
    let a: Vec<char> = text1.chars().collect();
    let b: Vec<char> = text2.chars().collect();
    overlap_chars(&a, &b)
}

fn prefix_chars(a: &[char], b: &[char]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}

fn suffix_chars(a: &[char], b: &[char]) -> usize {
    a.iter()
        .rev()
        .zip(b.iter().rev())
        .take_while(|(x, y)| x == y)
        .count()
}

fn overlap_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    // Only the tail of `a` and the head of `b` can overlap.
    let (a, b) = match a.len().cmp(&b.len()) {
        std::cmp::Ordering::Greater => (&a[a.len() - b.len()..], b),
        std::cmp::Ordering::Less => (a, &b[..a.len()]),
        std::cmp::Ordering::Equal => (a, b),
    };
    let len = a.len();
    if a == b {
        return len;
    }

    let mut best = 0;
    let mut length = 1;
    loop {
        if length > len {
            return best;
        }
        let pattern = &a[len - length..];
        let Some(found) = find_chars(b, pattern, 0) else {
            return best;
        };
        length += found;
        if found == 0 || a[len - length..] == b[..length] {
            best = length;
            length += 1;
        }
    }
}

/// First index `>= from` where `needle` occurs in `haystack`.
fn find_chars(haystack: &[char], needle: &[char], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return (from <= haystack.len()).then_some(from);
    }
    if from >= haystack.len() || needle.len() > haystack.len() - from {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|i| i + from)
}

fn collect(chars: &[char]) -> String {
    chars.iter().collect()
}

// ============================================================================
// Whole-buffer decomposition
// ============================================================================

/// Decompose a single edit between two snapshots into at most four runs:
/// shared prefix, removed span, inserted span, shared suffix.
///
/// Empty runs are omitted. The prefix and suffix never overlap.
pub fn text_change(before: &str, after: &str) -> Vec<Diff> {
    let a: Vec<char> = before.chars().collect();
    let b: Vec<char> = after.chars().collect();
    let prefix = prefix_chars(&a, &b);
    let suffix = suffix_chars(&a[prefix..], &b[prefix..]);

    let mut diffs = Vec::with_capacity(4);
    if prefix > 0 {
        diffs.push(Diff::equal(collect(&a[..prefix])));
    }
    if a.len() - suffix > prefix {
        diffs.push(Diff::delete(collect(&a[prefix..a.len() - suffix])));
    }
    if b.len() - suffix > prefix {
        diffs.push(Diff::insert(collect(&b[prefix..b.len() - suffix])));
    }
    if suffix > 0 {
        diffs.push(Diff::equal(collect(&a[a.len() - suffix..])));
    }
    diffs
}

/// Reconstruct the source text (equalities + deletions).
pub fn source_text(diffs: &[Diff]) -> String {
    diffs
        .iter()
        .filter(|d| d.op != DiffOp::Insert)
        .map(|d| d.text.as_str())
        .collect()
}

/// Reconstruct the destination text (equalities + insertions).
pub fn destination_text(diffs: &[Diff]) -> String {
    diffs
        .iter()
        .filter(|d| d.op != DiffOp::Delete)
        .map(|d| d.text.as_str())
        .collect()
}

/// Replay `diffs` against `text`.
///
/// Returns `None` when an equality or deletion doesn't match the text at the
/// replay position, or when text is left over.
pub fn apply(text: &str, diffs: &[Diff]) -> Option<String> {
    let mut rest = text;
    let mut out = String::with_capacity(text.len());
    for diff in diffs {
        match diff.op {
            DiffOp::Insert => out.push_str(&diff.text),
            DiffOp::Equal => {
                rest = rest.strip_prefix(diff.text.as_str())?;
                out.push_str(&diff.text);
            }
            DiffOp::Delete => {
                rest = rest.strip_prefix(diff.text.as_str())?;
            }
        }
    }
    rest.is_empty().then_some(out)
}

// ============================================================================
// Full diff
// ============================================================================

/// Diff configuration. `timeout = None` means unlimited time, which also
/// disables the (non-minimal) half-match shortcut.
#[derive(Clone, Copy, Debug)]
pub struct DiffEngine {
    pub timeout: Option<Duration>,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self {
            timeout: Some(DEFAULT_DIFF_TIMEOUT),
        }
    }
}

impl DiffEngine {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Engine with no deadline: always minimal, never half-matches.
    pub fn unlimited() -> Self {
        Self { timeout: None }
    }

    /// Full diff between two texts, cleaned up by [`cleanup_merge`].
    pub fn diff_main(&self, text1: &str, text2: &str) -> Vec<Diff> {
        let a: Vec<char> = text1.chars().collect();
        let b: Vec<char> = text2.chars().collect();
        let deadline = self.timeout.map(|t| Instant::now() + t);
        self.main_chars(&a, &b, deadline)
            .into_iter()
            .map(|(op, chars)| Diff::new(op, collect(&chars)))
            .collect()
    }

    /// Find a common substring at least half the length of the longer text.
    ///
    /// Returns `None` when the engine has no time budget, when the texts are
    /// too short or too different in length, or when no such substring exists.
    pub fn half_match(&self, text1: &str, text2: &str) -> Option<HalfMatch> {
        let a: Vec<char> = text1.chars().collect();
        let b: Vec<char> = text2.chars().collect();
        let [t1p, t1s, t2p, t2s, common] = self.half_match_chars(&a, &b)?;
        Some(HalfMatch {
            text1_prefix: collect(&t1p),
            text1_suffix: collect(&t1s),
            text2_prefix: collect(&t2p),
            text2_suffix: collect(&t2s),
            common: collect(&common),
        })
    }

    fn main_chars(&self, a: &[char], b: &[char], deadline: Option<Instant>) -> Vec<Run> {
        if a == b {
            if a.is_empty() {
                return Vec::new();
            }
            return vec![(DiffOp::Equal, a.to_vec())];
        }

        let prefix = prefix_chars(a, b);
        let (common_head, a, b) = (&a[..prefix], &a[prefix..], &b[prefix..]);
        let suffix = suffix_chars(a, b);
        let common_tail = &a[a.len() - suffix..];
        let (a, b) = (&a[..a.len() - suffix], &b[..b.len() - suffix]);

        let mut runs = self.compute(a, b, deadline);
        if !common_head.is_empty() {
            runs.insert(0, (DiffOp::Equal, common_head.to_vec()));
        }
        if !common_tail.is_empty() {
            runs.push((DiffOp::Equal, common_tail.to_vec()));
        }
        merge_runs(&mut runs);
        runs
    }

    fn compute(&self, a: &[char], b: &[char], deadline: Option<Instant>) -> Vec<Run> {
        if a.is_empty() {
            return vec![(DiffOp::Insert, b.to_vec())];
        }
        if b.is_empty() {
            return vec![(DiffOp::Delete, a.to_vec())];
        }

        let a_longer = a.len() > b.len();
        let (long, short) = if a_longer { (a, b) } else { (b, a) };
        if let Some(i) = find_chars(long, short, 0) {
            // Shorter text sits inside the longer one.
            let op = if a_longer { DiffOp::Delete } else { DiffOp::Insert };
            return vec![
                (op, long[..i].to_vec()),
                (DiffOp::Equal, short.to_vec()),
                (op, long[i + short.len()..].to_vec()),
            ];
        }
        if short.len() == 1 {
            return vec![(DiffOp::Delete, a.to_vec()), (DiffOp::Insert, b.to_vec())];
        }

        if let Some([t1p, t1s, t2p, t2s, common]) = self.half_match_chars(a, b) {
            let mut runs = self.main_chars(&t1p, &t2p, deadline);
            runs.push((DiffOp::Equal, common));
            runs.extend(self.main_chars(&t1s, &t2s, deadline));
            return runs;
        }

        self.bisect(a, b, deadline)
    }

    fn half_match_chars(&self, a: &[char], b: &[char]) -> Option<[Vec<char>; 5]> {
        self.timeout?;
        let a_longer = a.len() > b.len();
        let (long, short) = if a_longer { (a, b) } else { (b, a) };
        if long.len() < 4 || short.len() * 2 < long.len() {
            return None;
        }

        // Seeds at the second and third quarters of the longer text.
        let hm1 = half_match_at(long, short, long.len().div_ceil(4));
        let hm2 = half_match_at(long, short, long.len().div_ceil(2));
        let [long_a, long_b, short_a, short_b, common] = match (hm1, hm2) {
            (None, None) => return None,
            (Some(hm), None) | (None, Some(hm)) => hm,
            (Some(hm1), Some(hm2)) => {
                if hm1[4].len() > hm2[4].len() {
                    hm1
                } else {
                    hm2
                }
            }
        };

        if a_longer {
            Some([long_a, long_b, short_a, short_b, common])
        } else {
            Some([short_a, short_b, long_a, long_b, common])
        }
    }

    /// Myers middle-snake bisection.
    fn bisect(&self, a: &[char], b: &[char], deadline: Option<Instant>) -> Vec<Run> {
        let n1 = a.len() as isize;
        let n2 = b.len() as isize;
        let max_d = (n1 + n2 + 1) / 2;
        let v_offset = max_d;
        let v_length = 2 * max_d;
        let mut v1 = vec![-1isize; v_length as usize];
        let mut v2 = vec![-1isize; v_length as usize];
        v1[(v_offset + 1) as usize] = 0;
        v2[(v_offset + 1) as usize] = 0;
        let delta = n1 - n2;
        // Odd delta: the forward path meets the reverse path.
        let front = delta % 2 != 0;
        let (mut k1start, mut k1end, mut k2start, mut k2end) = (0isize, 0isize, 0isize, 0isize);

        for d in 0..max_d {
            if deadline.is_some_and(|dl| Instant::now() > dl) {
                break;
            }

            let mut k1 = -d + k1start;
            while k1 <= d - k1end {
                let k1_offset = (v_offset + k1) as usize;
                let mut x1 = if k1 == -d || (k1 != d && v1[k1_offset - 1] < v1[k1_offset + 1]) {
                    v1[k1_offset + 1]
                } else {
                    v1[k1_offset - 1] + 1
                };
                let mut y1 = x1 - k1;
                while x1 < n1 && y1 < n2 && a[x1 as usize] == b[y1 as usize] {
                    x1 += 1;
                    y1 += 1;
                }
                v1[k1_offset] = x1;
                if x1 > n1 {
                    k1end += 2;
                } else if y1 > n2 {
                    k1start += 2;
                } else if front {
                    let k2_offset = v_offset + delta - k1;
                    if k2_offset >= 0 && k2_offset < v_length && v2[k2_offset as usize] != -1 {
                        let x2 = n1 - v2[k2_offset as usize];
                        if x1 >= x2 {
                            return self.bisect_split(a, b, x1 as usize, y1 as usize, deadline);
                        }
                    }
                }
                k1 += 2;
            }

            let mut k2 = -d + k2start;
            while k2 <= d - k2end {
                let k2_offset = (v_offset + k2) as usize;
                let mut x2 = if k2 == -d || (k2 != d && v2[k2_offset - 1] < v2[k2_offset + 1]) {
                    v2[k2_offset + 1]
                } else {
                    v2[k2_offset - 1] + 1
                };
                let mut y2 = x2 - k2;
                while x2 < n1
                    && y2 < n2
                    && a[(n1 - x2 - 1) as usize] == b[(n2 - y2 - 1) as usize]
                {
                    x2 += 1;
                    y2 += 1;
                }
                v2[k2_offset] = x2;
                if x2 > n1 {
                    k2end += 2;
                } else if y2 > n2 {
                    k2start += 2;
                } else if !front {
                    let k1_offset = v_offset + delta - k2;
                    if k1_offset >= 0 && k1_offset < v_length && v1[k1_offset as usize] != -1 {
                        let x1 = v1[k1_offset as usize];
                        let y1 = v_offset + x1 - k1_offset;
                        if x1 >= n1 - x2 {
                            return self.bisect_split(a, b, x1 as usize, y1 as usize, deadline);
                        }
                    }
                }
                k2 += 2;
            }
        }

        // Out of time, or no common run at all.
        vec![(DiffOp::Delete, a.to_vec()), (DiffOp::Insert, b.to_vec())]
    }

    fn bisect_split(
        &self,
        a: &[char],
        b: &[char],
        x: usize,
        y: usize,
        deadline: Option<Instant>,
    ) -> Vec<Run> {
        let mut runs = self.main_chars(&a[..x], &b[..y], deadline);
        runs.extend(self.main_chars(&a[x..], &b[y..], deadline));
        runs
    }
}

/// Does a quarter-length seed of `long` starting at `i` grow into a common
/// substring at least half as long as `long`?
///
/// Returns `[long_prefix, long_suffix, short_prefix, short_suffix, common]`.
fn half_match_at(long: &[char], short: &[char], i: usize) -> Option<[Vec<char>; 5]> {
    let seed = &long[i..i + long.len() / 4];
    let mut best: Option<[Vec<char>; 5]> = None;
    let mut best_len = 0;

    let mut from = 0;
    while let Some(j) = find_chars(short, seed, from) {
        let prefix_len = prefix_chars(&long[i..], &short[j..]);
        let suffix_len = suffix_chars(&long[..i], &short[..j]);
        if best_len < suffix_len + prefix_len {
            best_len = suffix_len + prefix_len;
            best = Some([
                long[..i - suffix_len].to_vec(),
                long[i + prefix_len..].to_vec(),
                short[..j - suffix_len].to_vec(),
                short[j + prefix_len..].to_vec(),
                short[j - suffix_len..j + prefix_len].to_vec(),
            ]);
        }
        from = j + 1;
    }

    best.filter(|_| best_len * 2 >= long.len())
}

/// Merge adjacent runs of the same op, factor shared affixes out of
/// delete/insert pairs, and slide single edits over neighbouring equalities.
pub fn cleanup_merge(diffs: &mut Vec<Diff>) {
    let mut runs: Vec<Run> = diffs
        .drain(..)
        .map(|d| (d.op, d.text.chars().collect()))
        .collect();
    merge_runs(&mut runs);
    diffs.extend(runs.into_iter().map(|(op, chars)| Diff::new(op, collect(&chars))));
}

fn merge_runs(runs: &mut Vec<Run>) {
    runs.retain(|(_, chars)| !chars.is_empty());
    // Sentinel equality flushes the last pending edit group.
    runs.push((DiffOp::Equal, Vec::new()));

    let mut pointer = 0;
    let mut count_delete = 0;
    let mut count_insert = 0;
    let mut text_delete: Vec<char> = Vec::new();
    let mut text_insert: Vec<char> = Vec::new();

    while pointer < runs.len() {
        match runs[pointer].0 {
            DiffOp::Insert => {
                count_insert += 1;
                text_insert.extend_from_slice(&runs[pointer].1);
                pointer += 1;
            }
            DiffOp::Delete => {
                count_delete += 1;
                text_delete.extend_from_slice(&runs[pointer].1);
                pointer += 1;
            }
            DiffOp::Equal => {
                if count_delete + count_insert > 1 {
                    if count_delete != 0 && count_insert != 0 {
                        let common = prefix_chars(&text_insert, &text_delete);
                        if common != 0 {
                            let start = pointer - count_delete - count_insert;
                            if start > 0 && runs[start - 1].0 == DiffOp::Equal {
                                runs[start - 1].1.extend_from_slice(&text_insert[..common]);
                            } else {
                                runs.insert(0, (DiffOp::Equal, text_insert[..common].to_vec()));
                                pointer += 1;
                            }
                            text_insert.drain(..common);
                            text_delete.drain(..common);
                        }
                        let common = suffix_chars(&text_insert, &text_delete);
                        if common != 0 {
                            let mut merged = text_insert[text_insert.len() - common..].to_vec();
                            merged.extend_from_slice(&runs[pointer].1);
                            runs[pointer].1 = merged;
                            text_insert.truncate(text_insert.len() - common);
                            text_delete.truncate(text_delete.len() - common);
                        }
                    }

                    pointer -= count_delete + count_insert;
                    runs.drain(pointer..pointer + count_delete + count_insert);
                    if !text_delete.is_empty() {
                        runs.insert(pointer, (DiffOp::Delete, std::mem::take(&mut text_delete)));
                        pointer += 1;
                    }
                    if !text_insert.is_empty() {
                        runs.insert(pointer, (DiffOp::Insert, std::mem::take(&mut text_insert)));
                        pointer += 1;
                    }
                    pointer += 1;
                } else if pointer != 0 && runs[pointer - 1].0 == DiffOp::Equal {
                    let tail = std::mem::take(&mut runs[pointer].1);
                    runs[pointer - 1].1.extend(tail);
                    runs.remove(pointer);
                } else {
                    pointer += 1;
                }
                count_insert = 0;
                count_delete = 0;
                text_delete.clear();
                text_insert.clear();
            }
        }
    }
    if runs.last().is_some_and(|(_, chars)| chars.is_empty()) {
        runs.pop();
    }

    // Second pass: slide single edits surrounded by equalities, e.g.
    // A<ins>BA</ins>C -> <ins>AB</ins>AC.
    let mut changed = false;
    let mut pointer = 1;
    while pointer + 1 < runs.len() {
        if runs[pointer - 1].0 == DiffOp::Equal && runs[pointer + 1].0 == DiffOp::Equal {
            let prev = runs[pointer - 1].1.clone();
            let next = runs[pointer + 1].1.clone();
            let cur = runs[pointer].1.clone();
            if cur.ends_with(&prev) {
                let mut shifted = prev.clone();
                shifted.extend_from_slice(&cur[..cur.len() - prev.len()]);
                runs[pointer].1 = shifted;
                let mut following = prev;
                following.extend_from_slice(&next);
                runs[pointer + 1].1 = following;
                runs.remove(pointer - 1);
                changed = true;
            } else if cur.starts_with(&next) {
                runs[pointer - 1].1.extend_from_slice(&next);
                let mut shifted = cur[next.len()..].to_vec();
                shifted.extend_from_slice(&next);
                runs[pointer].1 = shifted;
                runs.remove(pointer + 1);
                changed = true;
            }
        }
        pointer += 1;
    }
    if changed {
        merge_runs(runs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hm(parts: [&str; 5]) -> Option<HalfMatch> {
        Some(HalfMatch {
            text1_prefix: parts[0].to_string(),
            text1_suffix: parts[1].to_string(),
            text2_prefix: parts[2].to_string(),
            text2_suffix: parts[3].to_string(),
            common: parts[4].to_string(),
        })
    }

    #[test]
    fn test_common_prefix() {
        assert_eq!(common_prefix("abc", "xyz"), 0);
        assert_eq!(common_prefix("1234abcdef", "1234xyz"), 4);
        assert_eq!(common_prefix("1234", "1234xyz"), 4);
    }

    #[test]
    fn test_common_suffix() {
        assert_eq!(common_suffix("abc", "xyz"), 0);
        assert_eq!(common_suffix("abcdef1234", "xyz1234"), 4);
        assert_eq!(common_suffix("1234", "xyz1234"), 4);
    }

    #[test]
    fn test_common_overlap() {
        assert_eq!(common_overlap("", "abcd"), 0);
        assert_eq!(common_overlap("abc", "abcd"), 3);
        assert_eq!(common_overlap("123456", "abcd"), 0);
        assert_eq!(common_overlap("123456xxx", "xxxabcd"), 3);
        // Ligature is a distinct char, not "fi".
        assert_eq!(common_overlap("fi", "\u{fb01}i"), 0);
    }

    #[test]
    fn test_half_match_no_match() {
        let dmp = DiffEngine::default();
        assert_eq!(dmp.half_match("1234567890", "abcdef"), None);
        assert_eq!(dmp.half_match("12345", "23"), None);
    }

    #[test]
    fn test_half_match_single() {
        let dmp = DiffEngine::default();
        assert_eq!(
            dmp.half_match("1234567890", "a345678z"),
            hm(["12", "90", "a", "z", "345678"])
        );
        assert_eq!(
            dmp.half_match("a345678z", "1234567890"),
            hm(["a", "z", "12", "90", "345678"])
        );
        assert_eq!(
            dmp.half_match("abc56789z", "1234567890"),
            hm(["abc", "z", "1234", "0", "56789"])
        );
        assert_eq!(
            dmp.half_match("a23456xyz", "1234567890"),
            hm(["a", "xyz", "1", "7890", "23456"])
        );
    }

    #[test]
    fn test_half_match_multiple() {
        let dmp = DiffEngine::default();
        assert_eq!(
            dmp.half_match("121231234123451234123121", "a1234123451234z"),
            hm(["12123", "123121", "a", "z", "1234123451234"])
        );
        assert_eq!(
            dmp.half_match("x-=-=-=-=-=-=-=-=-=-=-=-=", "xx-=-=-=-=-=-=-="),
            hm(["", "-=-=-=-=-=", "x", "", "x-=-=-=-=-=-=-="])
        );
        assert_eq!(
            dmp.half_match("-=-=-=-=-=-=-=-=-=-=-=-=y", "-=-=-=-=-=-=-=yy"),
            hm(["-=-=-=-=-=", "", "", "y", "-=-=-=-=-=-=-=y"])
        );
    }

    #[test]
    fn test_half_match_non_optimal() {
        // Optimal diff would be -q+x=H-i+e=lloHe+Hu=llo-Hew+y, not -qHillo+x=HelloHe-w+Hulloy.
        let dmp = DiffEngine::default();
        assert_eq!(
            dmp.half_match("qHilloHelloHew", "xHelloHeHulloy"),
            hm(["qHillo", "w", "x", "Hulloy", "HelloHe"])
        );
    }

    #[test]
    fn test_half_match_disabled_without_timeout() {
        assert_eq!(DiffEngine::unlimited().half_match("qHilloHelloHew", "xHelloHeHulloy"), None);
    }

    #[test]
    fn test_text_change_decomposition() {
        assert_eq!(
            text_change("Hyi jia r", "Hyi ji are"),
            vec![Diff::equal("Hyi ji"), Diff::delete("a r"), Diff::insert(" are")]
        );
        assert_eq!(text_change("# ", "# H"), vec![Diff::equal("# "), Diff::insert("H")]);
        assert_eq!(text_change("same", "same"), vec![Diff::equal("same")]);
        assert!(text_change("", "").is_empty());
    }

    #[test]
    fn test_text_change_prefix_and_suffix_never_overlap() {
        // "aa" -> "aaa": prefix takes both chars, suffix must not reuse them.
        let diffs = text_change("aa", "aaa");
        assert_eq!(diffs, vec![Diff::equal("aa"), Diff::insert("a")]);
    }

    #[test]
    fn test_cleanup_merge() {
        let mut diffs = vec![Diff::equal("a"), Diff::delete("b"), Diff::insert("c")];
        cleanup_merge(&mut diffs);
        assert_eq!(diffs, vec![Diff::equal("a"), Diff::delete("b"), Diff::insert("c")]);

        let mut diffs = vec![Diff::equal("a"), Diff::equal("b"), Diff::equal("c")];
        cleanup_merge(&mut diffs);
        assert_eq!(diffs, vec![Diff::equal("abc")]);

        let mut diffs = vec![
            Diff::delete("a"),
            Diff::insert("b"),
            Diff::delete("c"),
            Diff::insert("d"),
            Diff::equal("e"),
            Diff::equal("f"),
        ];
        cleanup_merge(&mut diffs);
        assert_eq!(diffs, vec![Diff::delete("ac"), Diff::insert("bd"), Diff::equal("ef")]);

        let mut diffs = vec![Diff::delete("a"), Diff::insert("abc"), Diff::delete("dc")];
        cleanup_merge(&mut diffs);
        assert_eq!(
            diffs,
            vec![Diff::equal("a"), Diff::delete("d"), Diff::insert("b"), Diff::equal("c")]
        );
    }

    #[test]
    fn test_cleanup_merge_slides_edits() {
        let mut diffs = vec![Diff::equal("a"), Diff::insert("ba"), Diff::equal("c")];
        cleanup_merge(&mut diffs);
        assert_eq!(diffs, vec![Diff::insert("ab"), Diff::equal("ac")]);

        let mut diffs = vec![Diff::equal("c"), Diff::insert("ab"), Diff::equal("a")];
        cleanup_merge(&mut diffs);
        assert_eq!(diffs, vec![Diff::equal("ca"), Diff::insert("ba")]);
    }

    #[test]
    fn test_diff_main_trivial() {
        let dmp = DiffEngine::default();
        assert!(dmp.diff_main("", "").is_empty());
        assert_eq!(dmp.diff_main("abc", "abc"), vec![Diff::equal("abc")]);
        assert_eq!(
            dmp.diff_main("abc", "ab123c"),
            vec![Diff::equal("ab"), Diff::insert("123"), Diff::equal("c")]
        );
        assert_eq!(
            dmp.diff_main("a123bc", "abc"),
            vec![Diff::equal("a"), Diff::delete("123"), Diff::equal("bc")]
        );
        assert_eq!(
            dmp.diff_main("abc", "a123b456c"),
            vec![
                Diff::equal("a"),
                Diff::insert("123"),
                Diff::equal("b"),
                Diff::insert("456"),
                Diff::equal("c"),
            ]
        );
    }

    #[test]
    fn test_diff_main_real() {
        let dmp = DiffEngine::unlimited();
        assert_eq!(dmp.diff_main("a", "b"), vec![Diff::delete("a"), Diff::insert("b")]);
        assert_eq!(
            dmp.diff_main("Apples are a fruit.", "Bananas are also fruit."),
            vec![
                Diff::delete("Apple"),
                Diff::insert("Banana"),
                Diff::equal("s are a"),
                Diff::insert("lso"),
                Diff::equal(" fruit."),
            ]
        );
        assert_eq!(
            dmp.diff_main("1ayb2", "abxab"),
            vec![
                Diff::delete("1"),
                Diff::equal("a"),
                Diff::delete("y"),
                Diff::equal("b"),
                Diff::delete("2"),
                Diff::insert("xab"),
            ]
        );
        assert_eq!(
            dmp.diff_main("abcy", "xaxcxabc"),
            vec![Diff::insert("xaxcx"), Diff::equal("abc"), Diff::delete("y")]
        );
    }

    #[test]
    fn test_diff_roundtrip() {
        let dmp = DiffEngine::default();
        let pairs = [
            ("", "hello"),
            ("hello", ""),
            ("Hyi jia r", "Hyi ji are"),
            ("The quick brown fox", "The quack brown box jumps"),
            ("héllo wörld", "hello world!"),
            ("-=-=-=-=-=-=-=-=-=-=-=-=y", "-=-=-=-=-=-=-=yy"),
            ("qHilloHelloHew", "xHelloHeHulloy"),
        ];
        for (a, b) in pairs {
            let diffs = dmp.diff_main(a, b);
            assert_eq!(source_text(&diffs), a, "source of {a:?} -> {b:?}");
            assert_eq!(destination_text(&diffs), b, "destination of {a:?} -> {b:?}");
            assert_eq!(apply(a, &diffs).as_deref(), Some(b));

            let change = text_change(a, b);
            assert_eq!(apply(a, &change).as_deref(), Some(b));
        }
    }

    #[test]
    fn test_apply_rejects_mismatched_source() {
        let diffs = vec![Diff::equal("ab"), Diff::insert("c")];
        assert_eq!(apply("xy", &diffs), None);
        assert_eq!(apply("abz", &diffs), None);
    }
}
