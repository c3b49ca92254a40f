use std::collections::BTreeMap;

use super::annotation::{rebuild_indices, Annotation};

/// Carries word timings across an edit of the transcript text.
pub struct TranscriptAligner;

impl TranscriptAligner {
    /// Longest-common-subsequence alignment of two word lists.
    ///
    /// Returns a monotone partial map `new index -> old index` of positions
    /// holding the same word in both lists.
    pub fn align_words<A, B>(new_words: &[A], old_words: &[B]) -> BTreeMap<usize, usize>
    where
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let n = new_words.len();
        let m = old_words.len();

        // lcs[i][j] = LCS length of new_words[i..] and old_words[j..]
        let mut lcs = vec![vec![0usize; m + 1]; n + 1];
        for i in (0..n).rev() {
            for j in (0..m).rev() {
                lcs[i][j] = if new_words[i].as_ref() == old_words[j].as_ref() {
                    lcs[i + 1][j + 1] + 1
                } else {
                    lcs[i + 1][j].max(lcs[i][j + 1])
                };
            }
        }

        let mut mapping = BTreeMap::new();
        let (mut i, mut j) = (0, 0);
        while i < n && j < m {
            if new_words[i].as_ref() == old_words[j].as_ref() {
                mapping.insert(i, j);
                i += 1;
                j += 1;
            } else if lcs[i + 1][j] >= lcs[i][j + 1] {
                i += 1;
            } else {
                j += 1;
            }
        }
        mapping
    }

    /// Rebuild `old` for a new transcript, keeping timings where words line up.
    ///
    /// Aligned words keep their old timing. When nothing aligns at a position
    /// but both transcripts have the same length, the word is treated as
    /// retyped and keeps the timing of the old word at the same position.
    /// That is an approximation: an insertion and a deletion elsewhere that
    /// cancel out in length will shift timings onto the wrong words.
    pub fn realign<S: AsRef<str>>(old: &[Annotation], new_words: &[S]) -> Vec<Annotation> {
        let old_words: Vec<&str> = old.iter().map(|a| a.word.as_str()).collect();
        let alignment = Self::align_words(new_words, &old_words);
        let same_length = old.len() == new_words.len();

        let mut realigned: Vec<Annotation> = new_words
            .iter()
            .enumerate()
            .map(|(index, word)| {
                let mut annotation = Annotation::unplaced(index, word.as_ref());
                if let Some(&old_index) = alignment.get(&index) {
                    annotation.copy_timing_from(&old[old_index]);
                } else if same_length {
                    annotation.copy_timing_from(&old[index]);
                }
                annotation
            })
            .collect();

        rebuild_indices(&mut realigned);
        log::debug!(
            "Realigned {} words to {} ({} aligned)",
            old.len(),
            new_words.len(),
            alignment.len()
        );
        realigned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::domain::annotation::is_ordered;
    use approx::assert_relative_eq;

    fn timed(words: &[(&str, Option<(f64, f64)>)]) -> Vec<Annotation> {
        words
            .iter()
            .enumerate()
            .map(|(i, (w, t))| match t {
                Some((s, e)) => Annotation::placed(i, *w, *s, *e),
                None => Annotation::unplaced(i, *w),
            })
            .collect()
    }

    #[test]
    fn test_align_identical_lists_is_identity() {
        let words = ["a", "b", "c"];
        let mapping = TranscriptAligner::align_words(&words, &words);
        assert_eq!(mapping, BTreeMap::from([(0, 0), (1, 1), (2, 2)]));
    }

    #[test]
    fn test_realign_unchanged_words_is_identity() {
        let old = timed(&[
            ("a", Some((0.0, 0.5))),
            ("b", None),
            ("c", Some((1.0, 1.5))),
        ]);
        let realigned = TranscriptAligner::realign(&old, &["a", "b", "c"]);
        assert_eq!(realigned, old);
    }

    #[test]
    fn test_realign_insertion_keeps_timing_on_shifted_word() {
        let old = timed(&[("a", None), ("b", Some((1.0, 1.5))), ("c", None)]);
        let realigned = TranscriptAligner::realign(&old, &["a", "x", "b", "c"]);

        assert_eq!(realigned.len(), 4);
        assert!(!realigned[1].is_placed());
        assert_eq!(realigned[2].word, "b");
        let (start, end) = realigned[2].interval().unwrap();
        assert_relative_eq!(start.secs(), 1.0);
        assert_relative_eq!(end.secs(), 1.5);
        for (k, a) in realigned.iter().enumerate() {
            assert_eq!(a.index, k);
        }
    }

    #[test]
    fn test_realign_deletion_drops_deleted_timing() {
        let old = timed(&[
            ("a", Some((0.0, 0.5))),
            ("b", Some((0.5, 1.0))),
            ("c", Some((1.0, 1.5))),
        ]);
        let realigned = TranscriptAligner::realign(&old, &["a", "c"]);
        assert_eq!(realigned.len(), 2);
        assert_relative_eq!(realigned[1].start_time.unwrap().secs(), 1.0);
        assert!(is_ordered(&realigned));
    }

    #[test]
    fn test_realign_retyped_word_keeps_timing() {
        let old = timed(&[("a", Some((0.0, 0.5))), ("teh", Some((0.5, 1.0)))]);
        let realigned = TranscriptAligner::realign(&old, &["a", "the"]);
        assert_eq!(realigned[1].word, "the");
        assert!(realigned[1].is_placed());
        assert_relative_eq!(realigned[1].start_time.unwrap().secs(), 0.5);
    }

    #[test]
    fn test_realign_same_length_shuffle_misattributes() {
        // Insert "x" at the front and delete "c" at the end: lengths match, so
        // the unaligned "x" inherits the timing of the old first word.
        let old = timed(&[
            ("a", Some((0.0, 0.5))),
            ("b", Some((0.5, 1.0))),
            ("c", Some((1.0, 1.5))),
        ]);
        let realigned = TranscriptAligner::realign(&old, &["x", "a", "b"]);
        assert_relative_eq!(realigned[0].start_time.unwrap().secs(), 0.0);
        assert_relative_eq!(realigned[1].start_time.unwrap().secs(), 0.0);
    }

    #[test]
    fn test_realign_from_empty() {
        let realigned = TranscriptAligner::realign(&[], &["hello", "world"]);
        assert_eq!(realigned.len(), 2);
        assert!(realigned.iter().all(|a| !a.is_placed()));
    }

    #[test]
    fn test_realign_to_empty() {
        let old = timed(&[("a", Some((0.0, 0.5)))]);
        let empty: [&str; 0] = [];
        assert!(TranscriptAligner::realign(&old, &empty).is_empty());
    }
}
