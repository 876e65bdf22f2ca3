//! Recording targets and the immutable options snapshot.

use screenreel_common::config::RecordingDefaults;
use screenreel_common::error::RecorderResult;
use screenreel_media::VideoCodec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The thing being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordingTarget {
    Screen,
    Window,
    ExternalDevice,
    AudioOnly,
}

impl RecordingTarget {
    pub fn is_audio_only(&self) -> bool {
        matches!(self, Self::AudioOnly)
    }

    /// Targets other than audio-only must name a concrete device/display.
    pub fn requires_target_id(&self) -> bool {
        !self.is_audio_only()
    }
}

/// Optional crop rectangle in display points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Immutable configuration snapshot for one recording.
///
/// Validated once at session start and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingOptions {
    /// Output file; the extension decides the container format.
    pub destination: PathBuf,

    /// Identifier of the display/window/device to record.
    pub target_id: Option<String>,

    /// Video frame rate.
    pub frames_per_second: u32,

    /// Optional crop region of the captured surface.
    pub crop: Option<CropRect>,

    /// Whether the cursor is included in the capture.
    pub show_cursor: bool,

    /// Whether mouse clicks are visually highlighted.
    pub highlight_clicks: bool,

    /// Video codec for the output.
    pub video_codec: VideoCodec,

    /// Use lossless audio encoding for all audio tracks.
    pub lossless_audio: bool,

    /// Record system audio into its own track.
    pub record_system_audio: bool,

    /// Record this microphone into its own track.
    pub microphone_device_id: Option<String>,
}

impl RecordingOptions {
    /// Options for `destination` with stock defaults (60 fps, h264,
    /// cursor shown, no audio tracks).
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            target_id: None,
            frames_per_second: 60,
            crop: None,
            show_cursor: true,
            highlight_clicks: false,
            video_codec: VideoCodec::H264,
            lossless_audio: false,
            record_system_audio: false,
            microphone_device_id: None,
        }
    }

    /// Options seeded from the application's configured defaults.
    pub fn from_defaults(
        destination: impl Into<PathBuf>,
        defaults: &RecordingDefaults,
    ) -> RecorderResult<Self> {
        Ok(Self {
            destination: destination.into(),
            target_id: None,
            frames_per_second: defaults.frames_per_second,
            crop: None,
            show_cursor: defaults.show_cursor,
            highlight_clicks: defaults.highlight_clicks,
            video_codec: defaults.video_codec.parse()?,
            lossless_audio: defaults.lossless_audio,
            record_system_audio: defaults.record_system_audio,
            microphone_device_id: None,
        })
    }

    pub fn with_target_id(mut self, id: impl Into<String>) -> Self {
        self.target_id = Some(id.into());
        self
    }
}
