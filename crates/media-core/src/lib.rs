//! ScreenReel media core.
//!
//! Data model and port contracts shared between the recording session and
//! its external collaborators:
//! - Timestamped samples and their routing kinds
//! - Codec/container format negotiation
//! - The capture source port (sample producers)
//! - The container writer port (track-based muxing sink)

pub mod format;
pub mod sample;
pub mod source;
pub mod writer;

pub use format::{resolve_container_format, ContainerFormat, VideoCodec};
pub use sample::{MediaSampleKind, SampleFormat, TimedSample};
pub use source::{CaptureSource, SampleConsumer, SampleSink};
pub use writer::{ContainerWriter, TrackId, TrackSettings, WriterFactory};
