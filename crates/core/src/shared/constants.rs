use std::time::Duration;

/// How far before the visible segment start a load reaches back, so words
/// that begin earlier but run into the segment are still fetched (seconds).
pub const LOAD_LOOKBEHIND_SECS: f64 = 4.0;

/// Step applied by a single keyboard nudge of a word boundary (seconds).
pub const KEYBOARD_STEP_SECS: f64 = 0.01;

/// Default duration given to a newly placed word, per character (seconds).
pub const PLACEMENT_SECS_PER_CHAR: f64 = 0.05;

pub const DEFAULT_API_HOST: &str = "http://localhost:3000/";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
