use std::fmt;

use super::annotation::{next_placed, previous_placed, Annotation};

/// Why an edit was turned down.
#[derive(Clone, Debug, PartialEq)]
pub enum RejectReason {
    /// The edited word would start before its placed predecessor ends.
    OverlapsPrevious { previous: usize },
    /// The edited word would end after its placed successor starts.
    OverlapsNext { next: usize },
    /// Both times are set but the start is not before the end.
    InvertedInterval,
    /// The edit refers to a position the sequence doesn't have.
    NoSuchWord { index: usize },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::OverlapsPrevious { previous } => {
                write!(f, "word would overlap the previous word (#{previous})")
            }
            RejectReason::OverlapsNext { next } => {
                write!(f, "word would overlap the next word (#{next})")
            }
            RejectReason::InvertedInterval => write!(f, "word would end before it starts"),
            RejectReason::NoSuchWord { index } => write!(f, "there is no word #{index}"),
        }
    }
}

/// Outcome of checking an edit against the ordering invariant.
#[derive(Clone, Debug, PartialEq)]
pub enum EditVerdict {
    Accepted,
    Rejected(RejectReason),
}

impl EditVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, EditVerdict::Accepted)
    }
}

/// Decides whether a retimed word may be committed.
///
/// Only the immediate placed neighbours of the edited word are consulted: if
/// the rest of the sequence already satisfies the ordering invariant, an
/// edit that respects both neighbours keeps it satisfied.
pub struct OrderingGuard;

impl OrderingGuard {
    pub fn check(sequence: &[Annotation], index: usize) -> EditVerdict {
        let Some(edited) = sequence.get(index) else {
            return EditVerdict::Rejected(RejectReason::NoSuchWord { index });
        };

        let (start, end) = match (edited.start_time, edited.end_time) {
            (Some(start), Some(end)) if start < end => (start, end),
            (Some(_), Some(_)) => return EditVerdict::Rejected(RejectReason::InvertedInterval),
            // Unplaced words impose no ordering constraint.
            _ => return EditVerdict::Accepted,
        };

        if let Some(prev) = previous_placed(sequence, index) {
            if let Some((_, prev_end)) = prev.interval() {
                if prev_end > start {
                    return EditVerdict::Rejected(RejectReason::OverlapsPrevious {
                        previous: prev.index,
                    });
                }
            }
        }

        if let Some(next) = next_placed(sequence, index) {
            if let Some((next_start, _)) = next.interval() {
                if end > next_start {
                    return EditVerdict::Rejected(RejectReason::OverlapsNext { next: next.index });
                }
            }
        }

        EditVerdict::Accepted
    }

    /// Check a sequence that was rebuilt as a whole rather than retimed at a
    /// single position.
    pub fn check_all(sequence: &[Annotation]) -> EditVerdict {
        let mut previous: Option<&Annotation> = None;
        for annotation in sequence {
            let start = match (annotation.start_time, annotation.end_time) {
                (Some(start), Some(end)) if start < end => start,
                (Some(_), Some(_)) => {
                    return EditVerdict::Rejected(RejectReason::InvertedInterval)
                }
                _ => continue,
            };
            if let Some(prev) = previous {
                if prev.end_time.is_some_and(|prev_end| prev_end > start) {
                    return EditVerdict::Rejected(RejectReason::OverlapsPrevious {
                        previous: prev.index,
                    });
                }
            }
            previous = Some(annotation);
        }
        EditVerdict::Accepted
    }

    pub fn should_reject(sequence: &[Annotation], index: usize) -> bool {
        !Self::check(sequence, index).is_accepted()
    }

    /// Returns `proposed` if the edit at `index` is acceptable, otherwise
    /// `previous` unchanged, together with the verdict.
    pub fn verify_transcript_order(
        previous: Vec<Annotation>,
        proposed: Vec<Annotation>,
        index: usize,
    ) -> (Vec<Annotation>, EditVerdict) {
        match Self::check(&proposed, index) {
            EditVerdict::Accepted => (proposed, EditVerdict::Accepted),
            rejected => {
                log::warn!("Rejected edit of word #{index}: {rejected:?}");
                (previous, rejected)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::domain::annotation::is_ordered;
    use crate::shared::time::TimeInMovie;
    use rstest::rstest;

    fn touching_pair() -> Vec<Annotation> {
        vec![
            Annotation::placed(0, "a", 0.0, 1.0),
            Annotation::placed(1, "b", 1.0, 2.0),
        ]
    }

    #[test]
    fn test_touching_neighbours_are_accepted() {
        let seq = touching_pair();
        assert_eq!(OrderingGuard::check(&seq, 0), EditVerdict::Accepted);
        assert_eq!(OrderingGuard::check(&seq, 1), EditVerdict::Accepted);
    }

    #[test]
    fn test_start_before_previous_end_is_rejected() {
        let previous = touching_pair();
        let mut proposed = previous.clone();
        proposed[1].start_time = Some(TimeInMovie::from_secs(0.5));

        let (kept, verdict) = OrderingGuard::verify_transcript_order(previous.clone(), proposed, 1);

        assert_eq!(
            verdict,
            EditVerdict::Rejected(RejectReason::OverlapsPrevious { previous: 0 })
        );
        assert_eq!(kept, previous);
    }

    #[test]
    fn test_end_after_next_start_is_rejected() {
        let mut seq = touching_pair();
        seq[0].end_time = Some(TimeInMovie::from_secs(1.5));
        assert_eq!(
            OrderingGuard::check(&seq, 0),
            EditVerdict::Rejected(RejectReason::OverlapsNext { next: 1 })
        );
    }

    #[test]
    fn test_unplaced_neighbours_are_skipped() {
        let mut seq = vec![
            Annotation::placed(0, "a", 0.0, 1.0),
            Annotation::unplaced(1, "b"),
            Annotation::placed(2, "c", 2.0, 3.0),
        ];
        seq[2].start_time = Some(TimeInMovie::from_secs(0.8));
        assert_eq!(
            OrderingGuard::check(&seq, 2),
            EditVerdict::Rejected(RejectReason::OverlapsPrevious { previous: 0 })
        );
    }

    #[rstest]
    #[case::zero_length(1.0, 1.0)]
    #[case::inverted(1.5, 1.2)]
    fn test_degenerate_interval_is_rejected(#[case] start: f64, #[case] end: f64) {
        let seq = vec![Annotation::placed(0, "a", start, end)];
        assert_eq!(
            OrderingGuard::check(&seq, 0),
            EditVerdict::Rejected(RejectReason::InvertedInterval)
        );
    }

    #[test]
    fn test_clearing_a_word_is_always_accepted() {
        let mut seq = touching_pair();
        seq[1].clear_timing();
        assert!(!OrderingGuard::should_reject(&seq, 1));
    }

    #[test]
    fn test_out_of_range_index() {
        assert_eq!(
            OrderingGuard::check(&touching_pair(), 5),
            EditVerdict::Rejected(RejectReason::NoSuchWord { index: 5 })
        );
    }

    #[test]
    fn test_check_all() {
        assert_eq!(OrderingGuard::check_all(&touching_pair()), EditVerdict::Accepted);
        let overlapping = vec![
            Annotation::placed(0, "a", 0.0, 1.0),
            Annotation::unplaced(1, "b"),
            Annotation::placed(2, "c", 0.5, 1.5),
        ];
        assert_eq!(
            OrderingGuard::check_all(&overlapping),
            EditVerdict::Rejected(RejectReason::OverlapsPrevious { previous: 0 })
        );
    }

    #[test]
    fn test_accepted_edits_preserve_ordering() {
        // Sweep candidate start/end pairs for the middle word; whatever is
        // accepted must leave the sequence ordered.
        let base = vec![
            Annotation::placed(0, "a", 0.0, 1.0),
            Annotation::placed(1, "b", 1.5, 2.0),
            Annotation::placed(2, "c", 3.0, 4.0),
        ];
        for s in 0..10 {
            for e in 0..10 {
                let mut proposed = base.clone();
                proposed[1].start_time = Some(TimeInMovie::from_secs(s as f64 * 0.5));
                proposed[1].end_time = Some(TimeInMovie::from_secs(e as f64 * 0.5));
                let (committed, _) =
                    OrderingGuard::verify_transcript_order(base.clone(), proposed, 1);
                assert!(is_ordered(&committed), "start {s} end {e}");
            }
        }
    }
}
