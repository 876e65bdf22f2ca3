//! Presentation-timestamp correction across pause/resume cycles.
//!
//! Pause freezes the output timeline, but capture sources keep advancing
//! their own clocks while paused. Without correction the output file would
//! contain a time jump at every pause/resume boundary. The corrector keeps
//! a cumulative offset that is subtracted from every timing-sensitive
//! sample, and grows the offset by the observed gap on the first sample
//! after each resume.

use screenreel_media::TimedSample;
use std::time::Duration;

/// Timing state owned by the recording session.
///
/// Mutated only from the sample-dispatch path, under the session's lock.
#[derive(Debug, Default)]
pub struct TimeCorrector {
    /// Cumulative correction; monotonically non-decreasing.
    offset: Duration,

    /// Presentation end time of the last corrected sample.
    last_pts: Option<Duration>,

    /// Set by resume(); cleared by the next corrected sample.
    resume_pending: bool,
}

impl TimeCorrector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the corrector: the next corrected sample absorbs the gap that
    /// accumulated while paused.
    pub fn begin_resume(&mut self) {
        self.resume_pending = true;
    }

    /// Current cumulative offset.
    pub fn offset(&self) -> Duration {
        self.offset
    }

    pub fn resume_pending(&self) -> bool {
        self.resume_pending
    }

    /// Correct one sample in place.
    ///
    /// Returns true when this call consumed a pending resume, so the caller
    /// can fulfil the resume continuation exactly once. On that first
    /// post-resume sample the offset grows by
    /// `pts - offset - last_end_time`, which maps the sample onto the end
    /// of the last pre-pause sample.
    pub fn correct(&mut self, sample: &mut TimedSample) -> bool {
        let resumed = self.resume_pending;
        if resumed {
            self.resume_pending = false;
            if let Some(last) = self.last_pts {
                let delta = sample
                    .pts
                    .saturating_sub(self.offset)
                    .saturating_sub(last);
                self.offset += delta;
            }
        }

        // Zero offset means no pause has happened yet; leave the sample
        // untouched rather than rewriting it.
        if !self.offset.is_zero() {
            sample.pts = sample.pts.saturating_sub(self.offset);
        }
        self.last_pts = Some(sample.end_pts());

        resumed
    }
}
