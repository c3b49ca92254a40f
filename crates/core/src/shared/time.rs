use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, Sub};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TimeError {
    #[error("invalid time value {value}: times must be finite seconds")]
    InvalidTimeDomain { value: f64 },
    #[error("could not parse time from {input:?}")]
    Unparsable { input: String },
}

/// Coordinate space of offsets from the start of the full recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Movie {}

/// Coordinate space of offsets from the start of the loaded segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Segment {}

/// A point in time, in seconds, tagged with the space it is measured in.
///
/// `Time<Movie>` and `Time<Segment>` cannot be added, subtracted or compared
/// with each other; crossing spaces requires [`TimeInMovie::to_segment`] or
/// [`TimeInSegment::to_movie`].
pub struct Time<S> {
    secs: f64,
    space: PhantomData<S>,
}

pub type TimeInMovie = Time<Movie>;
pub type TimeInSegment = Time<Segment>;

impl<S> Time<S> {
    /// Wrap a known-finite value. Use [`Time::try_from_secs`] for input that
    /// comes from outside the process.
    pub const fn from_secs(secs: f64) -> Self {
        Self {
            secs,
            space: PhantomData,
        }
    }

    pub fn try_from_secs(secs: f64) -> Result<Self, TimeError> {
        if secs.is_finite() {
            Ok(Self::from_secs(secs))
        } else {
            Err(TimeError::InvalidTimeDomain { value: secs })
        }
    }

    pub fn parse(input: &str) -> Result<Self, TimeError> {
        let secs: f64 = input.trim().parse().map_err(|_| TimeError::Unparsable {
            input: input.to_string(),
        })?;
        Self::try_from_secs(secs)
    }

    pub fn secs(self) -> f64 {
        self.secs
    }

    pub fn add_constant(self, secs: f64) -> Self {
        Self::from_secs(self.secs + secs)
    }

    /// Move forward by `delta` without passing `bound`.
    pub fn add_bounded(self, delta: Self, bound: Self) -> Self {
        Self::from_secs((self.secs + delta.secs).min(bound.secs))
    }

    /// Move backward by `delta` without passing `bound`.
    pub fn subtract_bounded(self, delta: Self, bound: Self) -> Self {
        Self::from_secs((self.secs - delta.secs).max(bound.secs))
    }

    pub fn min(self, other: Self) -> Self {
        if other.secs < self.secs {
            other
        } else {
            self
        }
    }

    pub fn max(self, other: Self) -> Self {
        if other.secs > self.secs {
            other
        } else {
            self
        }
    }
}

impl TimeInMovie {
    pub fn to_segment(self, segment_start: TimeInMovie) -> TimeInSegment {
        TimeInSegment::from_secs(self.secs - segment_start.secs)
    }
}

impl TimeInSegment {
    pub fn to_movie(self, segment_start: TimeInMovie) -> TimeInMovie {
        TimeInMovie::from_secs(self.secs + segment_start.secs)
    }
}

/// Visible window of the loaded segment, in movie time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentBounds {
    pub start: TimeInMovie,
    pub end: TimeInMovie,
}

impl SegmentBounds {
    pub fn new(start: TimeInMovie, end: TimeInMovie) -> Self {
        Self { start, end }
    }
}

impl<S> Clone for Time<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Time<S> {}

impl<S> PartialEq for Time<S> {
    fn eq(&self, other: &Self) -> bool {
        self.secs == other.secs
    }
}

impl<S> PartialOrd for Time<S> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.secs.partial_cmp(&other.secs)
    }
}

impl<S> Add for Time<S> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::from_secs(self.secs + rhs.secs)
    }
}

impl<S> Sub for Time<S> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::from_secs(self.secs - rhs.secs)
    }
}

impl<S> TryFrom<f64> for Time<S> {
    type Error = TimeError;

    fn try_from(secs: f64) -> Result<Self, TimeError> {
        Self::try_from_secs(secs)
    }
}

impl fmt::Debug for TimeInMovie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeInMovie({})", self.secs)
    }
}

impl fmt::Debug for TimeInSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeInSegment({})", self.secs)
    }
}

impl<S> fmt::Display for Time<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.secs)
    }
}

impl<S> Serialize for Time<S> {
    fn serialize<Z: Serializer>(&self, serializer: Z) -> Result<Z::Ok, Z::Error> {
        serializer.serialize_f64(self.secs)
    }
}

impl<'de, S> Deserialize<'de> for Time<S> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Self::try_from_secs(secs).map_err(serde::de::Error::custom)
    }
}
