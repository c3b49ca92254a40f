use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::annotation::domain::annotation::{rebuild_indices, Annotation};
use crate::annotation::domain::annotation_set::AnnotationSet;
use crate::annotation::domain::ordering_guard::{EditVerdict, OrderingGuard};
use crate::annotation::domain::transcript_aligner::TranscriptAligner;
use crate::annotation::domain::word_editor::{EditOutcome, EditResult};
use crate::shared::constants::{KEYBOARD_STEP_SECS, LOAD_LOOKBEHIND_SECS};
use crate::shared::time::{SegmentBounds, TimeInMovie};
use crate::sync::domain::annotation_store::{
    AnnotationQuery, AnnotationStore, StoreError, Submission, SubmissionReceipt,
};
use crate::sync::domain::notice::{MessageLevel, Notice};
use crate::sync::domain::view_config::{AnnotationSource, ViewConfig};

/// Tuning knobs of a [`SyncEngine`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    /// How far before the visible start a load reaches back.
    pub lookbehind: TimeInMovie,
    /// Step of a single keyboard nudge.
    pub keyboard_step: TimeInMovie,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookbehind: TimeInMovie::from_secs(LOAD_LOOKBEHIND_SECS),
            keyboard_step: TimeInMovie::from_secs(KEYBOARD_STEP_SECS),
        }
    }
}

/// Network activity of the engine. At most one request is in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoState {
    Idle,
    Loading { request: u64 },
    Saving { request: u64 },
}

/// What happened to a load, save or location change request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// A request was sent to the store.
    Started { request: u64 },
    /// Deferred until the in-flight request completes.
    Queued,
    /// Dropped because another request is in flight.
    Busy,
    /// Nothing to do (read-only view, or nothing loaded yet to save).
    Skipped,
}

/// Follow-up applied once a save succeeds.
#[derive(Clone, Debug, PartialEq)]
pub enum AfterSave {
    Nothing,
    ChangeLocation(ViewConfig),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SaveRequest {
    pub reload_after: bool,
    pub then: AfterSave,
}

impl SaveRequest {
    pub fn save_only() -> Self {
        Self {
            reload_after: false,
            then: AfterSave::Nothing,
        }
    }

    pub fn save_and_reload() -> Self {
        Self {
            reload_after: true,
            then: AfterSave::Nothing,
        }
    }
}

/// Result of a completed request, as seen by the owner thread.
#[derive(Debug)]
pub enum SyncOutcome {
    Loaded { request: u64 },
    Saved { request: u64 },
    Failed { request: u64, error: StoreError },
}

enum Completion {
    Loaded {
        request: u64,
        view: ViewConfig,
        result: Result<HashMap<String, Vec<Annotation>>, StoreError>,
    },
    Saved {
        request: u64,
        save: SaveRequest,
        result: Result<SubmissionReceipt, StoreError>,
    },
}

/// Owns the annotation set of one view and keeps it in step with the store.
///
/// All state lives on the owner thread. Store calls run on short-lived
/// worker threads and report back over a channel; nothing changes until the
/// owner calls [`SyncEngine::poll`] or [`SyncEngine::wait`], so a completed
/// request is applied atomically between two edits.
pub struct SyncEngine {
    store: Arc<dyn AnnotationStore>,
    config: EngineConfig,
    view: ViewConfig,
    annotations: AnnotationSet,
    source: Option<AnnotationSource>,
    state: IoState,
    cancel_token: Option<Arc<AtomicBool>>,
    next_request: u64,
    pending_location: Option<ViewConfig>,
    pending_reload: bool,
    completions_tx: Sender<Completion>,
    completions_rx: Receiver<Completion>,
    notices: Sender<Notice>,
}

impl SyncEngine {
    /// Create an engine for `view`. Returns the engine and the receiving end
    /// of its notice channel.
    pub fn new(
        store: Arc<dyn AnnotationStore>,
        view: ViewConfig,
        config: EngineConfig,
    ) -> (Self, Receiver<Notice>) {
        let (completions_tx, completions_rx) = crossbeam_channel::unbounded();
        let (notices, notices_rx) = crossbeam_channel::unbounded();
        let engine = Self {
            store,
            config,
            view,
            annotations: AnnotationSet::new(),
            source: None,
            state: IoState::Idle,
            cancel_token: None,
            next_request: 0,
            pending_location: None,
            pending_reload: false,
            completions_tx,
            completions_rx,
            notices,
        };
        (engine, notices_rx)
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    pub fn sequence(&self, annotator: &str) -> &[Annotation] {
        self.annotations.sequence(annotator)
    }

    pub fn source(&self) -> Option<&AnnotationSource> {
        self.source.as_ref()
    }

    pub fn view(&self) -> &ViewConfig {
        &self.view
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> IoState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state != IoState::Idle
    }

    /// Bounds of the loaded segment, falling back to the requested view
    /// before the first load.
    pub fn bounds(&self) -> SegmentBounds {
        self.source.as_ref().unwrap_or(&self.view).bounds()
    }

    /// Fetch the current view from the store.
    ///
    /// Dropped while another request is in flight unless `force` is set. A
    /// forced load supersedes an in-flight load and waits for an in-flight
    /// save.
    pub fn load(&mut self, force: bool) -> Dispatch {
        match self.state {
            IoState::Idle => {}
            IoState::Loading { request } if force => {
                log::debug!("Forced load supersedes load #{request}");
                self.abandon_in_flight();
            }
            IoState::Saving { request } if force => {
                log::debug!("Forced load queued behind save #{request}");
                self.pending_reload = true;
                return Dispatch::Queued;
            }
            state => {
                log::warn!("Load skipped: {state:?}");
                return Dispatch::Busy;
            }
        }

        if self.view.start_time >= self.view.end_time {
            log::warn!(
                "Load skipped: empty segment {}..{}",
                self.view.start_time,
                self.view.end_time
            );
            return Dispatch::Skipped;
        }

        let (request, cancelled) = self.begin_request();
        self.state = IoState::Loading { request };
        self.notify(MessageLevel::Info, "Loading...");

        let view = self.view.clone();
        let query = AnnotationQuery {
            movie: view.movie.clone(),
            start: view.start_time - self.config.lookbehind,
            end: view.end_time,
            workers: view.annotators(),
        };
        log::debug!("Load #{request}: {query:?}");

        let store = Arc::clone(&self.store);
        let tx = self.completions_tx.clone();
        thread::spawn(move || {
            let result = store.fetch_annotations(&query);
            if cancelled.load(Ordering::Relaxed) {
                log::debug!("Load #{request} abandoned");
                return;
            }
            let _ = tx.send(Completion::Loaded {
                request,
                view,
                result,
            });
        });

        Dispatch::Started { request }
    }

    /// Send the primary annotator's words to the store under the snapshot
    /// they were loaded with.
    pub fn save(&mut self, save: SaveRequest) -> Dispatch {
        if !self.view.should_save {
            return Dispatch::Skipped;
        }
        if let IoState::Loading { request } | IoState::Saving { request } = self.state {
            log::warn!("Save skipped: request #{request} in flight");
            return Dispatch::Busy;
        }
        let Some(source) = self.source.clone() else {
            self.apply_after_save(save.then);
            return if save.reload_after {
                self.load(true)
            } else {
                Dispatch::Skipped
            };
        };

        let submission = Submission::from_source(&source, self.annotations.sequence(&source.user));
        let (request, cancelled) = self.begin_request();
        self.state = IoState::Saving { request };
        self.notify(MessageLevel::Info, "Saving...");
        log::debug!(
            "Save #{request}: {} ({} of {} words placed)",
            submission.segment,
            submission.annotations.len(),
            submission.words.len()
        );

        let store = Arc::clone(&self.store);
        let tx = self.completions_tx.clone();
        thread::spawn(move || {
            let result = store.submit(&submission).and_then(accepted);
            if cancelled.load(Ordering::Relaxed) {
                log::debug!("Save #{request} abandoned");
                return;
            }
            let _ = tx.send(Completion::Saved {
                request,
                save,
                result,
            });
        });

        Dispatch::Started { request }
    }

    /// Save the current segment, then move to `view` and load it.
    ///
    /// While a request is in flight the location is queued; only the latest
    /// queued location is kept.
    pub fn change_location(&mut self, view: ViewConfig) -> Dispatch {
        if self.is_busy() {
            log::debug!("Location change to {} queued", view.segment_key());
            self.pending_location = Some(view);
            return Dispatch::Queued;
        }
        if !self.view.should_save {
            self.view = view;
            return self.load(false);
        }
        self.save(SaveRequest {
            reload_after: true,
            then: AfterSave::ChangeLocation(view),
        })
    }

    /// Abandon the in-flight request, if any, along with any queued location
    /// change or reload. Its result will be ignored.
    pub fn cancel(&mut self) -> bool {
        if !self.is_busy() {
            return false;
        }
        self.abandon_in_flight();
        self.pending_location = None;
        self.pending_reload = false;
        self.notify(MessageLevel::Info, "Cancelled");
        true
    }

    /// Replace one annotator's sequence with `edit(current)`.
    ///
    /// This is the only way annotations change between loads.
    pub fn mutate<F>(&mut self, annotator: &str, edit: F)
    where
        F: FnOnce(&[Annotation]) -> Vec<Annotation>,
    {
        let next = edit(self.annotations.sequence(annotator));
        self.annotations.replace(annotator, next);
    }

    /// Run an editing command and commit its proposal if it keeps the
    /// sequence ordered.
    pub fn apply_edit<F>(&mut self, annotator: &str, edit: F) -> EditResult
    where
        F: FnOnce(&[Annotation]) -> EditOutcome,
    {
        self.dismiss_notice();

        let proposal = match edit(self.annotations.sequence(annotator)) {
            EditOutcome::Proposed(proposal) => proposal,
            EditOutcome::NoTarget(reason) => {
                self.notify(MessageLevel::Warning, reason.to_string());
                return EditResult::NoTarget(reason);
            }
        };

        let verdict = match proposal.edited {
            Some(index) => OrderingGuard::check(&proposal.sequence, index),
            None => OrderingGuard::check_all(&proposal.sequence),
        };
        match verdict {
            EditVerdict::Accepted => {
                let edited = proposal.edited;
                self.mutate(annotator, move |_| proposal.sequence);
                EditResult::Committed { edited }
            }
            EditVerdict::Rejected(reason) => {
                log::warn!("Rejected edit for {annotator}: {reason}");
                self.notify(MessageLevel::Warning, format!("Edit rejected: {reason}"));
                EditResult::Rejected(reason)
            }
        }
    }

    /// Replace an annotator's transcript text, keeping timings of words that
    /// survive the edit.
    pub fn update_transcript<S: AsRef<str>>(&mut self, annotator: &str, words: &[S]) {
        self.dismiss_notice();
        self.mutate(annotator, |old| TranscriptAligner::realign(old, words));
        if let Some((previous, next)) = first_overlap(self.annotations.sequence(annotator)) {
            log::warn!("Transcript update for {annotator} left #{previous} overlapping #{next}");
            self.notify(
                MessageLevel::Warning,
                format!("Words #{previous} and #{next} overlap after the transcript change"),
            );
        }
    }

    /// Apply the next completed request, if one is ready.
    pub fn poll(&mut self) -> Option<SyncOutcome> {
        while let Ok(completion) = self.completions_rx.try_recv() {
            if let Some(outcome) = self.complete(completion) {
                return Some(outcome);
            }
        }
        None
    }

    /// Block until the in-flight request completes or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Option<SyncOutcome> {
        let deadline = Instant::now() + timeout;
        while self.is_busy() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let completion = self.completions_rx.recv_timeout(remaining).ok()?;
            if let Some(outcome) = self.complete(completion) {
                return Some(outcome);
            }
        }
        None
    }

    /// Wait until no request is in flight or queued, collecting outcomes.
    pub fn settle(&mut self, timeout: Duration) -> Vec<SyncOutcome> {
        let deadline = Instant::now() + timeout;
        let mut outcomes = Vec::new();
        while self.is_busy() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.wait(remaining) {
                Some(outcome) => outcomes.push(outcome),
                None => break,
            }
        }
        outcomes
    }

    fn complete(&mut self, completion: Completion) -> Option<SyncOutcome> {
        let outcome = match completion {
            Completion::Loaded {
                request,
                view,
                result,
            } => {
                if !self.is_current(request) {
                    log::debug!("Discarding superseded load #{request}");
                    return None;
                }
                self.finish_request();
                match result {
                    Ok(fetched) => {
                        self.annotations = prepare_loaded(fetched, view.start_time);
                        log::info!(
                            "Loaded {} ({} annotators)",
                            view.segment_key(),
                            self.annotations.len()
                        );
                        self.source = Some(view);
                        self.notify(MessageLevel::Success, "Loaded segment");
                        SyncOutcome::Loaded { request }
                    }
                    Err(error) => {
                        log::error!("Load #{request} failed: {error}");
                        self.notify(
                            MessageLevel::Error,
                            format!("Failed to load segment: {error}"),
                        );
                        SyncOutcome::Failed { request, error }
                    }
                }
            }
            Completion::Saved {
                request,
                save,
                result,
            } => {
                if !self.is_current(request) {
                    log::debug!("Discarding superseded save #{request}");
                    return None;
                }
                self.finish_request();
                match result {
                    Ok(_) => {
                        log::info!("Saved request #{request}");
                        self.apply_after_save(save.then);
                        if save.reload_after {
                            self.pending_reload = false;
                            self.load(true);
                        } else {
                            self.notify(MessageLevel::Success, "Saved segment");
                        }
                        SyncOutcome::Saved { request }
                    }
                    Err(error) => {
                        log::error!("Save #{request} failed: {error}");
                        self.notify(
                            MessageLevel::Error,
                            format!("Failed to save segment: {error}"),
                        );
                        SyncOutcome::Failed { request, error }
                    }
                }
            }
        };

        self.dispatch_pending();
        Some(outcome)
    }

    fn dispatch_pending(&mut self) {
        if self.is_busy() {
            return;
        }
        if let Some(view) = self.pending_location.take() {
            self.pending_reload = false;
            self.change_location(view);
        } else if self.pending_reload {
            self.pending_reload = false;
            self.load(true);
        }
    }

    fn apply_after_save(&mut self, then: AfterSave) {
        if let AfterSave::ChangeLocation(view) = then {
            self.view = view;
        }
    }

    fn begin_request(&mut self) -> (u64, Arc<AtomicBool>) {
        self.next_request += 1;
        let cancelled = Arc::new(AtomicBool::new(false));
        self.cancel_token = Some(Arc::clone(&cancelled));
        (self.next_request, cancelled)
    }

    fn finish_request(&mut self) {
        self.state = IoState::Idle;
        self.cancel_token = None;
    }

    fn abandon_in_flight(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.store(true, Ordering::Relaxed);
        }
        self.state = IoState::Idle;
    }

    fn is_current(&self, request: u64) -> bool {
        matches!(
            self.state,
            IoState::Loading { request: r } | IoState::Saving { request: r } if r == request
        )
    }

    fn notify(&self, level: MessageLevel, text: impl Into<String>) {
        let _ = self.notices.send(Notice::new(level, text));
    }

    fn dismiss_notice(&self) {
        let _ = self.notices.send(Notice::closed());
    }
}

/// Indices of the first pair of consecutive placed words that overlap.
fn first_overlap(sequence: &[Annotation]) -> Option<(usize, usize)> {
    let mut previous: Option<(usize, TimeInMovie)> = None;
    for a in sequence {
        let Some((start, end)) = a.interval() else {
            continue;
        };
        if let Some((index, previous_end)) = previous {
            if previous_end > start {
                return Some((index, a.index));
            }
        }
        previous = Some((a.index, end));
    }
    None
}

fn accepted(receipt: SubmissionReceipt) -> Result<SubmissionReceipt, StoreError> {
    if receipt.response == "ok" {
        Ok(receipt)
    } else {
        Err(StoreError::Rejected {
            response: receipt.response,
        })
    }
}

/// Index fetched sequences and drop placed words that end before the
/// visible segment starts. The fetch window reaches further back so that
/// words running into the segment are kept.
fn prepare_loaded(
    fetched: HashMap<String, Vec<Annotation>>,
    visible_start: TimeInMovie,
) -> AnnotationSet {
    AnnotationSet::from_sequences(fetched.into_iter().map(|(annotator, mut sequence)| {
        rebuild_indices(&mut sequence);
        sequence.retain(|a| match a.interval() {
            Some((_, end)) => end > visible_start,
            None => true,
        });
        rebuild_indices(&mut sequence);
        (annotator, sequence)
    }))
}
