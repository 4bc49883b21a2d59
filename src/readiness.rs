//! Explicit waits for decoder readiness.
//!
//! Every sampling step blocks until the decoder signals that a frame for the
//! requested timestamp is available. Backends express that wait with a
//! [`Deadline`] and the [`WaitCondition`] they are blocked on, so a stream
//! that never becomes ready (corrupt data, an unsupported codec) fails with
//! [`FramepackError::DecodeTimeout`] instead of hanging.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use framepack::{Deadline, WaitCondition};
//!
//! let deadline = Deadline::start(Duration::from_secs(5));
//! deadline
//!     .check(WaitCondition::FrameReady, Duration::from_secs(2))
//!     .unwrap();
//! ```

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::{Duration, Instant};

use crate::error::FramepackError;

/// Default time a single sampling step may wait for its frame.
pub const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_secs(10);

/// The event a sampling step is waiting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitCondition {
    /// A seek has been issued and the decoder must reach the target time.
    SeekComplete,
    /// The next decoded frame at or after the target time.
    FrameReady,
    /// End of input was signalled and buffered frames are being drained.
    DecoderFlushed,
}

impl Display for WaitCondition {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let label = match self {
            WaitCondition::SeekComplete => "seek completion",
            WaitCondition::FrameReady => "next decoded frame",
            WaitCondition::DecoderFlushed => "decoder flush",
        };
        f.write_str(label)
    }
}

/// A wall-clock budget for one sampling step.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Duration,
}

impl Deadline {
    /// Start a new deadline that expires `limit` from now.
    pub fn start(limit: Duration) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    /// Time spent waiting so far.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The configured budget.
    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Returns `true` once the budget is spent.
    pub fn is_expired(&self) -> bool {
        self.elapsed() >= self.limit
    }

    /// Fail with [`FramepackError::DecodeTimeout`] if the budget is spent.
    ///
    /// Backends call this between units of decode work while they wait for
    /// `condition` to be met for the sample scheduled at `timestamp`.
    pub fn check(&self, condition: WaitCondition, timestamp: Duration) -> Result<(), FramepackError> {
        let waited = self.elapsed();
        if waited >= self.limit {
            return Err(FramepackError::DecodeTimeout {
                condition,
                timestamp,
                waited,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_deadline_passes() {
        let deadline = Deadline::start(Duration::from_secs(60));
        assert!(!deadline.is_expired());
        assert!(
            deadline
                .check(WaitCondition::SeekComplete, Duration::ZERO)
                .is_ok()
        );
    }

    #[test]
    fn zero_budget_expires_immediately() {
        let deadline = Deadline::start(Duration::ZERO);
        assert!(deadline.is_expired());
        match deadline.check(WaitCondition::DecoderFlushed, Duration::from_secs(3)) {
            Err(FramepackError::DecodeTimeout {
                condition,
                timestamp,
                ..
            }) => {
                assert_eq!(condition, WaitCondition::DecoderFlushed);
                assert_eq!(timestamp, Duration::from_secs(3));
            }
            other => panic!("expected DecodeTimeout, got {other:?}"),
        }
    }

    #[test]
    fn condition_labels() {
        assert_eq!(WaitCondition::FrameReady.to_string(), "next decoded frame");
        assert_eq!(WaitCondition::SeekComplete.to_string(), "seek completion");
    }
}
