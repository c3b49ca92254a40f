use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotation::domain::annotation::{words, Annotation};
use crate::shared::time::TimeInMovie;

use super::view_config::AnnotationSource;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: BoxError,
    },
    #[error("malformed response from {url}: {reason}")]
    Validation { url: String, reason: String },
    #[error("store rejected the submission: {response}")]
    Rejected { response: String },
}

/// Time window and annotators to fetch.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationQuery {
    pub movie: String,
    pub start: TimeInMovie,
    pub end: TimeInMovie,
    pub workers: Vec<String>,
}

/// One placed word as submitted to the store.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedWord {
    pub start_time: TimeInMovie,
    pub end_time: TimeInMovie,
    pub index: usize,
    pub word: String,
}

/// A worker's annotation of one segment.
///
/// `annotations` holds placed words only; `words` is the full transcript so
/// the store can reconstruct unplaced positions.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub segment: String,
    pub movie: String,
    pub start: TimeInMovie,
    pub end: TimeInMovie,
    pub worker: String,
    pub annotations: Vec<TimedWord>,
    pub words: Vec<String>,
}

impl Submission {
    pub fn from_source(source: &AnnotationSource, sequence: &[Annotation]) -> Self {
        Self {
            segment: source.segment_key(),
            movie: source.movie.clone(),
            start: source.start_time,
            end: source.end_time,
            worker: source.user.clone(),
            annotations: sequence
                .iter()
                .filter_map(|a| {
                    a.interval().map(|(start_time, end_time)| TimedWord {
                        start_time,
                        end_time,
                        index: a.index,
                        word: a.word.clone(),
                    })
                })
                .collect(),
            words: words(sequence),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct SubmissionReceipt {
    pub response: String,
    #[serde(default, alias = "stoken")]
    pub token: Option<String>,
}

/// Port to the remote annotation store.
///
/// Calls block; the sync engine runs them off the owner thread.
pub trait AnnotationStore: Send + Sync {
    fn fetch_annotations(
        &self,
        query: &AnnotationQuery,
    ) -> Result<HashMap<String, Vec<Annotation>>, StoreError>;

    fn submit(&self, submission: &Submission) -> Result<SubmissionReceipt, StoreError>;

    fn worker_list(&self) -> Result<Vec<String>, StoreError>;

    fn movie_list(&self) -> Result<Vec<String>, StoreError>;

    fn workers_for_movie(&self, movie: &str) -> Result<Vec<String>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::domain::view_config::ViewConfig;

    #[test]
    fn test_submission_omits_unplaced_words() {
        let source = ViewConfig::new(
            "movie1",
            TimeInMovie::from_secs(10.0),
            TimeInMovie::from_secs(14.0),
            "worker7",
        );
        let sequence = vec![
            Annotation::placed(0, "one", 10.0, 10.4),
            Annotation::unplaced(1, "two"),
            Annotation::placed(2, "three", 10.8, 11.2),
            Annotation::unplaced(3, "#"),
            Annotation::placed(4, "five", 12.0, 12.5),
        ];

        let submission = Submission::from_source(&source, &sequence);

        assert_eq!(submission.annotations.len(), 3);
        assert_eq!(submission.words.len(), 5);
        assert_eq!(submission.annotations[1].index, 2);
        assert_eq!(submission.segment, "movie1:10:14");
        assert_eq!(submission.worker, "worker7");
    }

    #[test]
    fn test_submission_json_shape() {
        let source = ViewConfig::new(
            "m",
            TimeInMovie::from_secs(0.0),
            TimeInMovie::from_secs(4.0),
            "w",
        );
        let submission =
            Submission::from_source(&source, &[Annotation::placed(0, "hi", 0.5, 0.75)]);
        let json = serde_json::to_value(&submission).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "segment": "m:0:4",
                "movie": "m",
                "start": 0.0,
                "end": 4.0,
                "worker": "w",
                "annotations": [{"startTime": 0.5, "endTime": 0.75, "index": 0, "word": "hi"}],
                "words": ["hi"],
            })
        );
    }

    #[test]
    fn test_receipt_accepts_server_token_name() {
        let receipt: SubmissionReceipt =
            serde_json::from_str(r#"{"response":"ok","stoken":"a7"}"#).unwrap();
        assert_eq!(receipt.token.as_deref(), Some("a7"));
        let bare: SubmissionReceipt = serde_json::from_str(r#"{"response":"ok"}"#).unwrap();
        assert!(bare.token.is_none());
    }
}
