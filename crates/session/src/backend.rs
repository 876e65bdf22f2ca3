//! Capture backend contract.
//!
//! Once start-up negotiation has resolved the requested target id to a
//! concrete display/window/device, the backend binds the plan to platform
//! capture sources. Implementations live outside this crate.

use crate::options::CropRect;
use screenreel_common::error::RecorderResult;
use screenreel_devices::{ExternalDeviceInfo, ScreenInfo, WindowInfo};
use screenreel_media::CaptureSource;

/// A target id resolved to a concrete device.
#[derive(Debug, Clone)]
pub enum ResolvedTarget {
    Screen(ScreenInfo),
    Window(WindowInfo),
    ExternalDevice(ExternalDeviceInfo),
    /// Audio-only capture; the stream is still anchored to a display.
    AudioOnly { anchor: ScreenInfo },
}

impl ResolvedTarget {
    pub fn is_audio_only(&self) -> bool {
        matches!(self, Self::AudioOnly { .. })
    }

    /// Identifier of the bound device, for logs.
    pub fn id(&self) -> &str {
        match self {
            Self::Screen(s) => &s.id,
            Self::Window(w) => &w.id,
            Self::ExternalDevice(d) => &d.id,
            Self::AudioOnly { anchor } => &anchor.id,
        }
    }
}

/// Microphone capture parameters after channel-layout negotiation.
#[derive(Debug, Clone)]
pub struct MicrophonePlan {
    pub device_id: String,
    pub channels: u32,
}

/// Fully negotiated description of what a session will capture.
#[derive(Debug, Clone)]
pub struct CapturePlan {
    pub target: ResolvedTarget,
    pub frames_per_second: u32,
    pub crop: Option<CropRect>,
    pub show_cursor: bool,
    pub highlight_clicks: bool,
    pub record_system_audio: bool,
    pub microphone: Option<MicrophonePlan>,
}

/// Builds the concrete capture source set for a negotiated plan.
pub trait CaptureBackend: Send + Sync {
    fn create_sources(&self, plan: &CapturePlan) -> RecorderResult<Vec<Box<dyn CaptureSource>>>;
}
