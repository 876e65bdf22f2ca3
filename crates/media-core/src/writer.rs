//! Container writer port.
//!
//! The writer multiplexes typed tracks into a single output file and owns
//! file-level timing. Tracks are added lazily (settings are only known once
//! the first sample of a kind arrives), writing is started once, and the
//! writer is finalized exactly once. An encoding/muxing library implements
//! this; the session never sees past it.

use crate::format::{ContainerFormat, VideoCodec};
use crate::sample::{MediaSampleKind, TimedSample};
use screenreel_common::error::RecorderResult;
use std::path::Path;
use std::time::Duration;

/// Opaque handle to one track inside an open writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub u32);

/// Per-track encoder settings, derived from the first sample of the kind
/// together with the session's negotiated options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackSettings {
    Video {
        width: u32,
        height: u32,
        codec: VideoCodec,
    },
    Audio {
        channels: u32,
        sample_rate: u32,
        lossless: bool,
    },
}

/// Sink that accepts typed media tracks and produces the output file.
///
/// Append calls for a given track are serialized by the caller; the
/// at-most-one-in-flight-per-track policy behind `is_ready_for_more` is the
/// implementation's own backpressure contract.
#[async_trait::async_trait]
pub trait ContainerWriter: Send {
    /// Create a track for `kind`. Fails if the writer rejects the settings
    /// or a track of this kind already exists.
    fn add_track(
        &mut self,
        kind: MediaSampleKind,
        settings: TrackSettings,
    ) -> RecorderResult<TrackId>;

    /// Transition the writer into its writing state. Returns false if the
    /// configured track set cannot be written.
    fn start_writing(&mut self) -> bool;

    /// Anchor the output timeline at `origin` (the first sample's pts).
    fn start_session(&mut self, origin: Duration);

    /// Whether the track can accept another sample right now.
    fn is_ready_for_more(&self, track: TrackId) -> bool;

    /// Append one sample to a track. Must not block.
    fn append(&mut self, track: TrackId, sample: &TimedSample) -> RecorderResult<()>;

    /// Mark a track complete. Called at most once per created track.
    fn mark_finished(&mut self, track: TrackId);

    /// Flush everything and close the file. Resolves once fully flushed.
    async fn finalize(&mut self) -> RecorderResult<()>;
}

/// Opens container writers for a destination path.
pub trait WriterFactory: Send + Sync {
    fn open(
        &self,
        destination: &Path,
        format: ContainerFormat,
    ) -> RecorderResult<Box<dyn ContainerWriter>>;
}
