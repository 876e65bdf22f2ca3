//! Capture source port.
//!
//! A capture source is one external producer of timestamped samples for a
//! single track kind (screen frames, system audio, microphone, external
//! device). Concrete implementations wrap an OS capture API; the session
//! only sees this trait.

use crate::sample::{MediaSampleKind, TimedSample};
use screenreel_common::error::{RecorderError, RecorderResult};
use std::sync::Arc;

/// Receiver side of a capture source's callbacks.
///
/// All stream and sample-buffer delegate shapes collapse into this one
/// dispatch surface: samples tagged by kind, plus a terminal failure
/// notification. Called from the source's own thread or task; the receiver
/// must be safe under concurrent calls from several sources at once.
pub trait SampleConsumer: Send + Sync {
    /// Deliver one sample. The sample is consumed (written or dropped)
    /// before this returns; implementations must not block.
    fn deliver(&self, kind: MediaSampleKind, sample: TimedSample);

    /// Report an unrecoverable capture failure. At most one call per
    /// source; the source stops delivering samples afterwards.
    fn capture_failed(&self, error: RecorderError);
}

/// Shared handle to a sample consumer.
pub type SampleSink = Arc<dyn SampleConsumer>;

/// One producer of raw timestamped media samples.
#[async_trait::async_trait]
pub trait CaptureSource: Send {
    /// Short label for logs ("screen", "microphone", ...).
    fn label(&self) -> &str;

    /// Start delivering samples to `sink`. Resolves once the source is
    /// actively capturing, or fails with the reason it could not start.
    async fn start_capture(&mut self, sink: SampleSink) -> RecorderResult<()>;

    /// Stop capturing. Resolves once the source has fully stopped. Must be
    /// tolerant of being called when the source never started.
    async fn stop_capture(&mut self) -> RecorderResult<()>;

    /// Whether the source is currently delivering samples.
    fn is_capturing(&self) -> bool;
}
