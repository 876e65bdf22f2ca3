//! ScreenReel recording session engine.
//!
//! Turns a capture target plus an options snapshot into a finalized
//! container file. The session negotiates the output format and devices up
//! front, starts the platform capture sources, creates writer tracks lazily
//! from the first sample of each kind, corrects timestamps across
//! pause/resume cycles, and finalizes the writer on stop.
//!
//! Platform capture and actual muxing stay behind the [`CaptureBackend`],
//! [`screenreel_media::CaptureSource`] and [`screenreel_media::ContainerWriter`]
//! ports; this crate is the coordination layer between them.

pub mod backend;
pub mod options;
pub mod recorder;
pub mod session;
pub mod timing;

pub use backend::{CaptureBackend, CapturePlan, MicrophonePlan, ResolvedTarget};
pub use options::{CropRect, RecordingOptions, RecordingTarget};
pub use recorder::{Recorder, RecorderEvent};
pub use session::{DispatchStats, KindStats, RecordingSession, SessionState};
pub use timing::TimeCorrector;
