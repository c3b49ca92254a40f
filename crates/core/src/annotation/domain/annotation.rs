use serde::{Deserialize, Serialize};

use crate::shared::time::TimeInMovie;

/// One transcript word of one annotator, optionally placed in time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    #[serde(default)]
    pub index: usize,
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<TimeInMovie>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<TimeInMovie>,
}

impl Annotation {
    pub fn unplaced(index: usize, word: impl Into<String>) -> Self {
        Self {
            index,
            word: word.into(),
            start_time: None,
            end_time: None,
        }
    }

    pub fn placed(index: usize, word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            index,
            word: word.into(),
            start_time: Some(TimeInMovie::from_secs(start)),
            end_time: Some(TimeInMovie::from_secs(end)),
        }
    }

    /// True iff both times are present and `start < end`.
    pub fn is_placed(&self) -> bool {
        self.interval().is_some()
    }

    /// `(start, end)` of a placed word.
    pub fn interval(&self) -> Option<(TimeInMovie, TimeInMovie)> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) if start < end => Some((start, end)),
            _ => None,
        }
    }

    pub fn clear_timing(&mut self) {
        self.start_time = None;
        self.end_time = None;
    }

    pub fn copy_timing_from(&mut self, other: &Annotation) {
        self.start_time = other.start_time;
        self.end_time = other.end_time;
    }
}

/// Build an all-unplaced sequence from transcript words.
pub fn from_words<S: AsRef<str>>(words: &[S]) -> Vec<Annotation> {
    words
        .iter()
        .enumerate()
        .map(|(i, w)| Annotation::unplaced(i, w.as_ref()))
        .collect()
}

/// Reassign `index` to match sequence position.
pub fn rebuild_indices(sequence: &mut [Annotation]) {
    for (i, annotation) in sequence.iter_mut().enumerate() {
        annotation.index = i;
    }
}

/// First unplaced annotation at or after `index`.
pub fn find_missing_after(sequence: &[Annotation], index: usize) -> Option<&Annotation> {
    sequence.iter().skip(index).find(|a| !a.is_placed())
}

/// Nearest placed annotation strictly after `index`.
pub fn next_placed(sequence: &[Annotation], index: usize) -> Option<&Annotation> {
    sequence.iter().skip(index + 1).find(|a| a.is_placed())
}

/// Nearest placed annotation strictly before `index`.
pub fn previous_placed(sequence: &[Annotation], index: usize) -> Option<&Annotation> {
    sequence
        .iter()
        .take(index.min(sequence.len()))
        .rev()
        .find(|a| a.is_placed())
}

pub fn first_placed(sequence: &[Annotation]) -> Option<&Annotation> {
    sequence.iter().find(|a| a.is_placed())
}

pub fn last_placed(sequence: &[Annotation]) -> Option<&Annotation> {
    sequence.iter().rev().find(|a| a.is_placed())
}

/// Words of the sequence in order, placed or not.
pub fn words(sequence: &[Annotation]) -> Vec<String> {
    sequence.iter().map(|a| a.word.clone()).collect()
}

/// Whether every pair of placed annotations appears in index order without
/// overlapping.
pub fn is_ordered(sequence: &[Annotation]) -> bool {
    let mut previous_end: Option<TimeInMovie> = None;
    for (start, end) in sequence.iter().filter_map(Annotation::interval) {
        if let Some(prev) = previous_end {
            if prev > start {
                return false;
            }
        }
        previous_end = Some(end);
    }
    true
}
