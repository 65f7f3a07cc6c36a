//! Annotated text segments.
//!
//! A block title is a `Vec<Segment>`. On the wire each segment is a JSON array
//! `[text]` or `[text, [annotation, ..]]`, and each annotation is itself an
//! array whose first element names the kind (`["b"]`, `["a", "https://.."]`).

use serde::de::Deserializer;
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};

/// One inline annotation: a kind plus optional arguments.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Annotation(Vec<String>);

impl Annotation {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(vec![kind.into()])
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.0.push(arg.into());
        self
    }

    pub fn kind(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("")
    }

    pub fn args(&self) -> &[String] {
        self.0.get(1..).unwrap_or(&[])
    }

    pub fn bold() -> Self {
        Self::new("b")
    }

    pub fn italic() -> Self {
        Self::new("i")
    }

    pub fn code() -> Self {
        Self::new("c")
    }

    pub fn link(url: impl Into<String>) -> Self {
        Self::new("a").with_arg(url)
    }
}

/// A run of text carrying a uniform annotation set.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Segment {
    pub text: String,
    pub annotations: Vec<Annotation>,
}

impl Segment {
    pub fn new(text: impl Into<String>, annotations: Vec<Annotation>) -> Self {
        Self {
            text: text.into(),
            annotations,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }

    /// Length in chars. All segment offsets are char offsets.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Annotation sets compare as sets: order and duplicates don't matter.
    pub fn same_annotations(&self, other: &Segment) -> bool {
        same_annotation_set(&self.annotations, &other.annotations)
    }

    pub fn has_annotation(&self, annotation: &Annotation) -> bool {
        self.annotations.contains(annotation)
    }
}

/// Set equality over annotation lists.
pub fn same_annotation_set(a: &[Annotation], b: &[Annotation]) -> bool {
    a.iter().all(|x| b.contains(x)) && b.iter().all(|x| a.contains(x))
}

impl Serialize for Segment {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.annotations.is_empty() {
            let mut tuple = serializer.serialize_tuple(1)?;
            tuple.serialize_element(&self.text)?;
            tuple.end()
        } else {
            let mut tuple = serializer.serialize_tuple(2)?;
            tuple.serialize_element(&self.text)?;
            tuple.serialize_element(&self.annotations)?;
            tuple.end()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSegment {
    Annotated((String, Vec<Annotation>)),
    Bare((String,)),
}

impl<'de> Deserialize<'de> for Segment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawSegment::deserialize(deserializer)? {
            RawSegment::Annotated((text, annotations)) => Segment { text, annotations },
            RawSegment::Bare((text,)) => Segment::plain(text),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_wire_shape() {
        let plain = Segment::plain("12");
        assert_eq!(serde_json::to_string(&plain).unwrap(), r#"["12"]"#);

        let coded = Segment::new("12", vec![Annotation::code()]);
        assert_eq!(serde_json::to_string(&coded).unwrap(), r#"["12",[["c"]]]"#);
    }

    #[test]
    fn test_segment_parse() {
        let segments: Vec<Segment> =
            serde_json::from_str(r#"[["a"], ["b", [["b"], ["a", "https://x.y"]]]]"#).unwrap();
        assert_eq!(segments[0], Segment::plain("a"));
        assert_eq!(segments[1].annotations[1].kind(), "a");
        assert_eq!(segments[1].annotations[1].args(), ["https://x.y"]);
    }

    #[test]
    fn test_annotation_sets_ignore_order() {
        let a = Segment::new("x", vec![Annotation::bold(), Annotation::italic()]);
        let b = Segment::new("y", vec![Annotation::italic(), Annotation::bold()]);
        let c = Segment::new("z", vec![Annotation::bold()]);
        assert!(a.same_annotations(&b));
        assert!(!a.same_annotations(&c));
    }

    #[test]
    fn test_char_len_counts_chars_not_bytes() {
        assert_eq!(Segment::plain("héllo").char_len(), 5);
    }
}
