//! Timestamped media samples flowing from capture sources to the writer.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which container track a sample is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MediaSampleKind {
    Video,
    SystemAudio,
    Microphone,
}

impl MediaSampleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::SystemAudio => "systemAudio",
            Self::Microphone => "microphone",
        }
    }

    pub fn is_audio(&self) -> bool {
        !matches!(self, Self::Video)
    }
}

impl std::fmt::Display for MediaSampleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format metadata carried by every sample.
///
/// Track settings are derived from the first sample of each kind, so the
/// producer must fill this in even for payloads the writer treats as opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    Video { width: u32, height: u32 },
    Audio { channels: u32, sample_rate: u32 },
}

impl SampleFormat {
    /// Whether this format is plausible for the given routing kind.
    pub fn matches_kind(&self, kind: MediaSampleKind) -> bool {
        match self {
            Self::Video { .. } => kind == MediaSampleKind::Video,
            Self::Audio { .. } => kind.is_audio(),
        }
    }
}

/// One opaque media payload with its presentation timing.
///
/// Samples are produced by a capture source, moved into the session's
/// dispatch call, and written or dropped before that call returns. The
/// session never retains a sample.
#[derive(Debug, Clone)]
pub struct TimedSample {
    /// Encoded or raw payload bytes; opaque to the session.
    pub payload: Vec<u8>,

    /// Presentation timestamp on the source's clock.
    pub pts: Duration,

    /// Sample duration; zero when the source does not report one.
    pub duration: Duration,

    /// Format metadata used for lazy track creation.
    pub format: SampleFormat,
}

impl TimedSample {
    /// Whether the sample is well-formed enough to dispatch.
    pub fn is_valid(&self) -> bool {
        if self.payload.is_empty() {
            return false;
        }
        match self.format {
            SampleFormat::Video { width, height } => width > 0 && height > 0,
            SampleFormat::Audio {
                channels,
                sample_rate,
            } => channels > 0 && sample_rate > 0,
        }
    }

    /// Presentation end time (pts + duration).
    pub fn end_pts(&self) -> Duration {
        self.pts + self.duration
    }
}
