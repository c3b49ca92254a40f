use std::fmt;

use super::annotation::{
    find_missing_after, first_placed, last_placed, next_placed, previous_placed,
    rebuild_indices, Annotation,
};
use super::ordering_guard::RejectReason;
use crate::shared::constants::PLACEMENT_SECS_PER_CHAR;
use crate::shared::time::{SegmentBounds, TimeInMovie, TimeInSegment};

/// A single keyboard adjustment of a placed word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Nudge {
    StartEarlier,
    StartLater,
    EndEarlier,
    EndLater,
    ShiftEarlier,
    ShiftLater,
}

impl Nudge {
    pub const ALL: &[Nudge] = &[
        Nudge::StartEarlier,
        Nudge::StartLater,
        Nudge::EndEarlier,
        Nudge::EndLater,
        Nudge::ShiftEarlier,
        Nudge::ShiftLater,
    ];
}

impl fmt::Display for Nudge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nudge::StartEarlier => write!(f, "start-earlier"),
            Nudge::StartLater => write!(f, "start-later"),
            Nudge::EndEarlier => write!(f, "end-earlier"),
            Nudge::EndLater => write!(f, "end-later"),
            Nudge::ShiftEarlier => write!(f, "shift-earlier"),
            Nudge::ShiftLater => write!(f, "shift-later"),
        }
    }
}

/// Why an editing command had nothing to act on.
#[derive(Clone, Debug, PartialEq)]
pub enum NoTarget {
    NoSuchWord { index: usize },
    NotPlaced { index: usize },
    NothingPlaced,
    NothingToPlace,
    NoClick,
    AtFirstWord,
    AtLastWord,
}

impl fmt::Display for NoTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoTarget::NoSuchWord { index } => write!(f, "There is no word #{index}"),
            NoTarget::NotPlaced { index } => write!(f, "Word #{index} is not annotated"),
            NoTarget::NothingPlaced => write!(f, "No words are annotated"),
            NoTarget::NothingToPlace => write!(f, "Every remaining word is already annotated"),
            NoTarget::NoClick => write!(f, "Click on the spectrogram to choose where the word starts"),
            NoTarget::AtFirstWord => write!(f, "At the first word, no other annotations to select"),
            NoTarget::AtLastWord => write!(f, "At the last word, no other annotations to select"),
        }
    }
}

/// A candidate replacement for one annotator's sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct ProposedEdit {
    pub sequence: Vec<Annotation>,
    /// The retimed word, or `None` when the whole sequence was rebuilt.
    pub edited: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EditOutcome {
    Proposed(ProposedEdit),
    NoTarget(NoTarget),
}

/// What became of an edit once it reached the annotation set.
#[derive(Clone, Debug, PartialEq)]
pub enum EditResult {
    Committed { edited: Option<usize> },
    Rejected(RejectReason),
    NoTarget(NoTarget),
}

impl EditResult {
    pub fn is_committed(&self) -> bool {
        matches!(self, EditResult::Committed { .. })
    }
}

/// Editing commands over one annotator's sequence.
///
/// Every command is pure: it reads the current sequence and proposes a new
/// one. Committing is left to the caller, which must run the proposal past
/// the ordering guard first.
pub struct WordEditor;

impl WordEditor {
    /// Move one or both boundaries of a placed word by `step`.
    ///
    /// Boundaries moving outward stop at the segment edge and at the nearest
    /// placed neighbour; boundaries moving inward keep at least `step` of the
    /// word.
    pub fn nudge(
        sequence: &[Annotation],
        index: usize,
        nudge: Nudge,
        step: TimeInMovie,
        segment: SegmentBounds,
    ) -> EditOutcome {
        let Some(target) = sequence.get(index) else {
            return EditOutcome::NoTarget(NoTarget::NoSuchWord { index });
        };
        let Some((start, end)) = target.interval() else {
            return EditOutcome::NoTarget(NoTarget::NotPlaced { index });
        };

        let earliest_start = previous_placed(sequence, index)
            .and_then(Annotation::interval)
            .map(|(_, prev_end)| prev_end.max(segment.start))
            .unwrap_or(segment.start)
            .min(start);
        let latest_end = next_placed(sequence, index)
            .and_then(Annotation::interval)
            .map(|(next_start, _)| next_start.min(segment.end))
            .unwrap_or(segment.end)
            .max(end);

        let (new_start, new_end) = match nudge {
            Nudge::StartEarlier => (start.subtract_bounded(step, earliest_start), end),
            Nudge::StartLater => (start.add_bounded(step, (end - step).max(start)), end),
            Nudge::EndEarlier => (start, end.subtract_bounded(step, (start + step).min(end))),
            Nudge::EndLater => (start, end.add_bounded(step, latest_end)),
            Nudge::ShiftEarlier => {
                let s = start.subtract_bounded(step, earliest_start);
                (s, end.subtract_bounded(step, (s + step).min(end)))
            }
            Nudge::ShiftLater => {
                let s = start.add_bounded(step, (end - step).max(start));
                (s, end.add_bounded(step, latest_end))
            }
        };

        Self::retime(sequence, index, new_start, new_end)
    }

    /// Set both boundaries of a word, e.g. after dragging it.
    pub fn retime(
        sequence: &[Annotation],
        index: usize,
        start: TimeInMovie,
        end: TimeInMovie,
    ) -> EditOutcome {
        if index >= sequence.len() {
            return EditOutcome::NoTarget(NoTarget::NoSuchWord { index });
        }
        let mut proposed = sequence.to_vec();
        proposed[index].start_time = Some(start);
        proposed[index].end_time = Some(end);
        EditOutcome::Proposed(ProposedEdit {
            sequence: proposed,
            edited: Some(index),
        })
    }

    /// Place a word where the user clicked.
    ///
    /// `clicks` holds one position (start only) or two (start and end), in
    /// segment time. Without an explicit `word`, the first unplaced word
    /// after the last placed word starting before the click is chosen.
    pub fn place_at(
        sequence: &[Annotation],
        clicks: &[TimeInSegment],
        word: Option<usize>,
        segment: SegmentBounds,
    ) -> EditOutcome {
        let Some(first_click) = clicks.first() else {
            return EditOutcome::NoTarget(NoTarget::NoClick);
        };
        let start = first_click.to_movie(segment.start);

        let target = match word {
            Some(index) if index < sequence.len() => index,
            Some(index) => return EditOutcome::NoTarget(NoTarget::NoSuchWord { index }),
            None => {
                let from = sequence
                    .iter()
                    .rposition(|a| a.interval().is_some_and(|(s, _)| s < start))
                    .unwrap_or(0);
                match find_missing_after(sequence, from) {
                    Some(a) => a.index,
                    None => return EditOutcome::NoTarget(NoTarget::NothingToPlace),
                }
            }
        };

        let end = match clicks.get(1) {
            Some(second_click) => second_click.to_movie(segment.start),
            None => Self::default_end(start, &sequence[target].word, segment),
        };
        Self::retime(sequence, target, start, end)
    }

    /// Place the first unplaced word after `anchor`, starting where the
    /// anchor ends. Without an anchor, the last placed word is used.
    pub fn place_after(
        sequence: &[Annotation],
        anchor: Option<usize>,
        segment: SegmentBounds,
    ) -> EditOutcome {
        let anchor = match anchor {
            Some(index) => match sequence.get(index) {
                Some(a) => a,
                None => return EditOutcome::NoTarget(NoTarget::NoSuchWord { index }),
            },
            None => match last_placed(sequence) {
                Some(a) => a,
                None => return EditOutcome::NoTarget(NoTarget::NothingPlaced),
            },
        };
        let Some((_, anchor_end)) = anchor.interval() else {
            return EditOutcome::NoTarget(NoTarget::NotPlaced {
                index: anchor.index,
            });
        };
        let Some(target) = find_missing_after(sequence, anchor.index) else {
            return EditOutcome::NoTarget(NoTarget::NothingToPlace);
        };

        let end = Self::default_end(anchor_end, &target.word, segment);
        Self::retime(sequence, target.index, anchor_end, end)
    }

    /// Remove the timing of a word.
    pub fn clear(sequence: &[Annotation], index: usize) -> EditOutcome {
        if index >= sequence.len() {
            return EditOutcome::NoTarget(NoTarget::NoSuchWord { index });
        }
        let mut proposed = sequence.to_vec();
        proposed[index].clear_timing();
        EditOutcome::Proposed(ProposedEdit {
            sequence: proposed,
            edited: Some(index),
        })
    }

    /// Adopt a reference annotator's words and timings wholesale.
    pub fn replace_with_reference(reference: &[Annotation]) -> EditOutcome {
        let mut proposed = reference.to_vec();
        rebuild_indices(&mut proposed);
        EditOutcome::Proposed(ProposedEdit {
            sequence: proposed,
            edited: None,
        })
    }

    /// Keep the placed words of `own` and append the reference's placed
    /// words that start after the last of them ends.
    pub fn fill_with_reference(own: &[Annotation], reference: &[Annotation]) -> EditOutcome {
        let own_placed: Vec<Annotation> = own.iter().filter(|a| a.is_placed()).cloned().collect();
        let last_end = own_placed
            .iter()
            .filter_map(Annotation::interval)
            .map(|(_, end)| end)
            .reduce(TimeInMovie::max);

        let mut merged = own_placed;
        merged.extend(
            reference
                .iter()
                .filter(|a| match (a.interval(), last_end) {
                    (Some((start, _)), Some(last)) => start > last,
                    (Some(_), None) => true,
                    (None, _) => false,
                })
                .cloned(),
        );
        rebuild_indices(&mut merged);
        EditOutcome::Proposed(ProposedEdit {
            sequence: merged,
            edited: None,
        })
    }

    /// Index of the next placed word after `selected`, or the first placed
    /// word when nothing is selected.
    pub fn select_next(sequence: &[Annotation], selected: Option<usize>) -> Result<usize, NoTarget> {
        match selected {
            None => first_placed(sequence)
                .map(|a| a.index)
                .ok_or(NoTarget::NothingPlaced),
            Some(index) => next_placed(sequence, index)
                .map(|a| a.index)
                .ok_or(NoTarget::AtLastWord),
        }
    }

    /// Index of the previous placed word before `selected`, or the last
    /// placed word when nothing is selected.
    pub fn select_previous(
        sequence: &[Annotation],
        selected: Option<usize>,
    ) -> Result<usize, NoTarget> {
        match selected {
            None => last_placed(sequence)
                .map(|a| a.index)
                .ok_or(NoTarget::NothingPlaced),
            Some(index) => previous_placed(sequence, index)
                .map(|a| a.index)
                .ok_or(NoTarget::AtFirstWord),
        }
    }

    /// Selection to fall back to once `cleared` loses its timing.
    pub fn selection_after_clear(sequence: &[Annotation], cleared: usize) -> Option<usize> {
        previous_placed(sequence, cleared)
            .or_else(|| next_placed(sequence, cleared))
            .map(|a| a.index)
    }

    fn default_end(start: TimeInMovie, word: &str, segment: SegmentBounds) -> TimeInMovie {
        let length = word.chars().count() as f64 * PLACEMENT_SECS_PER_CHAR;
        start.add_constant(length).min(segment.end)
    }
}
