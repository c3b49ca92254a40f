use crate::shared::time::{SegmentBounds, TimeInMovie};

/// What the caller wants to look at: one segment of one movie, edited by
/// `user`, compared against `references`.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewConfig {
    pub movie: String,
    pub start_time: TimeInMovie,
    pub end_time: TimeInMovie,
    pub user: String,
    pub references: Vec<String>,
    pub default_reference: String,
    /// Read-only views (e.g. status pages) never write back to the store.
    pub should_save: bool,
}

/// The view parameters under which the current annotation set was fetched.
///
/// Saves and post-save reloads use this snapshot, never the live
/// [`ViewConfig`], which may already point elsewhere.
pub type AnnotationSource = ViewConfig;

impl ViewConfig {
    pub fn new(
        movie: impl Into<String>,
        start_time: TimeInMovie,
        end_time: TimeInMovie,
        user: impl Into<String>,
    ) -> Self {
        Self {
            movie: movie.into(),
            start_time,
            end_time,
            user: user.into(),
            references: Vec::new(),
            default_reference: String::new(),
            should_save: true,
        }
    }

    pub fn with_references(mut self, references: Vec<String>, default_reference: &str) -> Self {
        self.references = references;
        self.default_reference = default_reference.to_string();
        self
    }

    pub fn read_only(mut self) -> Self {
        self.should_save = false;
        self
    }

    pub fn bounds(&self) -> SegmentBounds {
        SegmentBounds::new(self.start_time, self.end_time)
    }

    /// Store key of the segment, `movie:start:end`.
    pub fn segment_key(&self) -> String {
        format!("{}:{}:{}", self.movie, self.start_time, self.end_time)
    }

    /// Annotators to fetch: references first, then the primary user.
    pub fn annotators(&self) -> Vec<String> {
        let mut annotators = self.references.clone();
        annotators.push(self.user.clone());
        annotators
    }

    /// The same view moved by `secs` in time.
    pub fn shifted(&self, secs: f64) -> Self {
        let mut shifted = self.clone();
        shifted.start_time = self.start_time.add_constant(secs);
        shifted.end_time = self.end_time.add_constant(secs);
        shifted
    }
}
