use std::collections::BTreeMap;
use std::sync::Arc;

use super::annotation::Annotation;

/// Immutable word sequence of one annotator. Replaced wholesale on edit.
pub type Sequence = Arc<[Annotation]>;

/// Per-annotator word sequences for the loaded segment.
///
/// Cloning is cheap and yields a read-only snapshot: sequences are never
/// mutated in place, only swapped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnnotationSet {
    sequences: BTreeMap<String, Sequence>,
}

impl AnnotationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from freshly fetched sequences, one per annotator.
    pub fn from_sequences<I>(sequences: I) -> Self
    where
        I: IntoIterator<Item = (String, Vec<Annotation>)>,
    {
        Self {
            sequences: sequences
                .into_iter()
                .map(|(annotator, seq)| (annotator, Sequence::from(seq)))
                .collect(),
        }
    }

    /// Sequence of `annotator`, or an empty slice when absent.
    pub fn sequence(&self, annotator: &str) -> &[Annotation] {
        self.sequences.get(annotator).map(|s| &s[..]).unwrap_or(&[])
    }

    /// Swap in a new sequence for `annotator`; existing snapshots keep the old one.
    pub fn replace(&mut self, annotator: &str, sequence: Vec<Annotation>) {
        self.sequences
            .insert(annotator.to_string(), Sequence::from(sequence));
    }

    pub fn contains(&self, annotator: &str) -> bool {
        self.sequences.contains_key(annotator)
    }

    /// Annotator names in sorted order.
    pub fn annotators(&self) -> impl Iterator<Item = &str> {
        self.sequences.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }
}
