//! Shared fakes for session and recorder tests: an inventory with
//! scriptable devices, a capture backend whose sources are driven by hand,
//! and a container writer that records every call it receives.

#![allow(dead_code)]

use screenreel_common::error::{RecorderError, RecorderResult};
use screenreel_devices::{
    AudioInputInfo, DeviceInventory, ExternalDeviceInfo, ScreenInfo, WindowInfo,
};
use screenreel_media::{
    CaptureSource, ContainerFormat, ContainerWriter, MediaSampleKind, SampleFormat, SampleSink,
    TimedSample, TrackId, TrackSettings, WriterFactory,
};
use screenreel_session::{
    CaptureBackend, CapturePlan, RecordingOptions, RecordingSession, RecordingTarget,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn video_sample(pts_ms: u64, dur_ms: u64) -> TimedSample {
    TimedSample {
        payload: vec![0u8; 32],
        pts: Duration::from_millis(pts_ms),
        duration: Duration::from_millis(dur_ms),
        format: SampleFormat::Video {
            width: 1920,
            height: 1080,
        },
    }
}

pub fn audio_sample(pts_ms: u64, dur_ms: u64, channels: u32) -> TimedSample {
    TimedSample {
        payload: vec![0u8; 32],
        pts: Duration::from_millis(pts_ms),
        duration: Duration::from_millis(dur_ms),
        format: SampleFormat::Audio {
            channels,
            sample_rate: 48_000,
        },
    }
}

/// Everything the fake writer observed, plus failure knobs for tests.
#[derive(Default)]
pub struct WriterLog {
    pub tracks: Vec<(MediaSampleKind, TrackSettings)>,
    pub appended: Vec<(TrackId, Duration)>,
    pub start_writing_calls: u32,
    pub start_session_origins: Vec<Duration>,
    pub finished_tracks: Vec<TrackId>,
    pub finalize_calls: u32,

    pub fail_add_track_for: Option<MediaSampleKind>,
    pub fail_start_writing: bool,
    pub fail_append: bool,
    pub not_ready: bool,
}

impl WriterLog {
    /// Presentation timestamps appended to the given track, in order.
    pub fn appended_pts(&self, track: TrackId) -> Vec<Duration> {
        self.appended
            .iter()
            .filter(|(t, _)| *t == track)
            .map(|(_, pts)| *pts)
            .collect()
    }

    pub fn track_for(&self, kind: MediaSampleKind) -> Option<TrackId> {
        self.tracks
            .iter()
            .position(|(k, _)| *k == kind)
            .map(|i| TrackId(i as u32))
    }
}

pub struct FakeWriter {
    log: Arc<Mutex<WriterLog>>,
}

#[async_trait::async_trait]
impl ContainerWriter for FakeWriter {
    fn add_track(
        &mut self,
        kind: MediaSampleKind,
        settings: TrackSettings,
    ) -> RecorderResult<TrackId> {
        let mut log = self.log.lock().unwrap();
        if log.fail_add_track_for == Some(kind) {
            return Err(RecorderError::CouldNotAddInput(kind.as_str().to_string()));
        }
        let track = TrackId(log.tracks.len() as u32);
        log.tracks.push((kind, settings));
        Ok(track)
    }

    fn start_writing(&mut self) -> bool {
        let mut log = self.log.lock().unwrap();
        log.start_writing_calls += 1;
        !log.fail_start_writing
    }

    fn start_session(&mut self, origin: Duration) {
        self.log.lock().unwrap().start_session_origins.push(origin);
    }

    fn is_ready_for_more(&self, _track: TrackId) -> bool {
        !self.log.lock().unwrap().not_ready
    }

    fn append(&mut self, track: TrackId, sample: &TimedSample) -> RecorderResult<()> {
        let mut log = self.log.lock().unwrap();
        if log.fail_append {
            return Err(RecorderError::unknown("append rejected"));
        }
        log.appended.push((track, sample.pts));
        Ok(())
    }

    fn mark_finished(&mut self, track: TrackId) {
        self.log.lock().unwrap().finished_tracks.push(track);
    }

    async fn finalize(&mut self) -> RecorderResult<()> {
        self.log.lock().unwrap().finalize_calls += 1;
        Ok(())
    }
}

pub struct FakeWriterFactory {
    pub log: Arc<Mutex<WriterLog>>,
    pub opened: AtomicU32,
}

impl FakeWriterFactory {
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(WriterLog::default())),
            opened: AtomicU32::new(0),
        }
    }
}

impl WriterFactory for FakeWriterFactory {
    fn open(
        &self,
        _destination: &Path,
        _format: ContainerFormat,
    ) -> RecorderResult<Box<dyn ContainerWriter>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeWriter {
            log: Arc::clone(&self.log),
        }))
    }
}

/// Shared control surface for the fake capture sources: tests grab the
/// session's sink from here and push samples through it by hand.
pub struct SourceHub {
    sink: Mutex<Option<SampleSink>>,
    pub started: AtomicU32,
    pub stopped: AtomicU32,
    fail_start: Mutex<Option<RecorderError>>,
}

impl SourceHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sink: Mutex::new(None),
            started: AtomicU32::new(0),
            stopped: AtomicU32::new(0),
            fail_start: Mutex::new(None),
        })
    }

    /// Make the next `start_capture` fail with `error`.
    pub fn fail_next_start(&self, error: RecorderError) {
        *self.fail_start.lock().unwrap() = Some(error);
    }

    pub fn sink(&self) -> SampleSink {
        self.sink
            .lock()
            .unwrap()
            .clone()
            .expect("no source has been started yet")
    }

    /// Wait until a source has been handed the session's sink.
    pub async fn wait_for_sink(&self) -> SampleSink {
        loop {
            if let Some(sink) = self.sink.lock().unwrap().clone() {
                return sink;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    pub fn push(&self, kind: MediaSampleKind, sample: TimedSample) {
        self.sink().deliver(kind, sample);
    }

    pub fn push_video(&self, pts_ms: u64, dur_ms: u64) {
        self.push(MediaSampleKind::Video, video_sample(pts_ms, dur_ms));
    }

    pub fn push_system_audio(&self, pts_ms: u64, dur_ms: u64) {
        self.push(MediaSampleKind::SystemAudio, audio_sample(pts_ms, dur_ms, 2));
    }

    pub fn push_microphone(&self, pts_ms: u64, dur_ms: u64, channels: u32) {
        self.push(
            MediaSampleKind::Microphone,
            audio_sample(pts_ms, dur_ms, channels),
        );
    }

    /// Report an asynchronous capture failure to the session.
    pub fn fail(&self, error: RecorderError) {
        self.sink().capture_failed(error);
    }
}

struct FakeSource {
    hub: Arc<SourceHub>,
    capturing: bool,
}

#[async_trait::async_trait]
impl CaptureSource for FakeSource {
    fn label(&self) -> &str {
        "fake"
    }

    async fn start_capture(&mut self, sink: SampleSink) -> RecorderResult<()> {
        if let Some(error) = self.hub.fail_start.lock().unwrap().take() {
            return Err(error);
        }
        *self.hub.sink.lock().unwrap() = Some(sink);
        self.capturing = true;
        self.hub.started.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_capture(&mut self) -> RecorderResult<()> {
        self.capturing = false;
        self.hub.stopped.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }
}

pub struct FakeBackend {
    pub hub: Arc<SourceHub>,
    pub last_plan: Mutex<Option<CapturePlan>>,
}

impl FakeBackend {
    pub fn new(hub: Arc<SourceHub>) -> Self {
        Self {
            hub,
            last_plan: Mutex::new(None),
        }
    }
}

impl CaptureBackend for FakeBackend {
    fn create_sources(&self, plan: &CapturePlan) -> RecorderResult<Vec<Box<dyn CaptureSource>>> {
        *self.last_plan.lock().unwrap() = Some(plan.clone());
        Ok(vec![Box::new(FakeSource {
            hub: Arc::clone(&self.hub),
            capturing: false,
        })])
    }
}

pub struct FakeInventory {
    pub screens: Vec<ScreenInfo>,
    pub windows: Vec<WindowInfo>,
    pub external: Vec<ExternalDeviceInfo>,
    pub microphones: HashMap<String, u32>,
    pub permissions: bool,
    pub enable_calls: AtomicU32,
}

pub fn screen(id: &str) -> ScreenInfo {
    ScreenInfo {
        id: id.to_string(),
        name: format!("Display {id}"),
        width: 2560,
        height: 1440,
        x: 0,
        y: 0,
        scale_factor: 1.0,
        primary: true,
    }
}

impl FakeInventory {
    /// One screen ("main"), one microphone ("mic-1", stereo), one external
    /// device ("cam-1"), permissions granted.
    pub fn stock() -> Self {
        Self {
            screens: vec![screen("main")],
            windows: Vec::new(),
            external: vec![ExternalDeviceInfo {
                id: "cam-1".to_string(),
                name: "Capture Card".to_string(),
            }],
            microphones: HashMap::from([("mic-1".to_string(), 2)]),
            permissions: true,
            enable_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait::async_trait]
impl DeviceInventory for FakeInventory {
    async fn screens(&self) -> RecorderResult<Vec<ScreenInfo>> {
        if !self.permissions {
            return Err(RecorderError::NoPermissions);
        }
        Ok(self.screens.clone())
    }

    async fn windows(&self) -> RecorderResult<Vec<WindowInfo>> {
        if !self.permissions {
            return Err(RecorderError::NoPermissions);
        }
        Ok(self.windows.clone())
    }

    fn audio_inputs(&self) -> Vec<AudioInputInfo> {
        self.microphones
            .keys()
            .map(|id| AudioInputInfo {
                id: id.clone(),
                name: id.clone(),
            })
            .collect()
    }

    fn external_devices(&self) -> Vec<ExternalDeviceInfo> {
        self.external.clone()
    }

    fn microphone_channels(&self, device_id: &str) -> Option<u32> {
        self.microphones.get(device_id).copied()
    }

    fn enable_capture_devices(&self) {
        self.enable_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// A session wired to the fakes, plus handles to everything they observed.
pub struct Rig {
    pub session: RecordingSession,
    pub hub: Arc<SourceHub>,
    pub backend: Arc<FakeBackend>,
    pub factory: Arc<FakeWriterFactory>,
    pub inventory: Arc<FakeInventory>,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_inventory(FakeInventory::stock())
    }

    pub fn with_inventory(inventory: FakeInventory) -> Self {
        let hub = SourceHub::new();
        let backend = Arc::new(FakeBackend::new(Arc::clone(&hub)));
        let factory = Arc::new(FakeWriterFactory::new());
        let inventory = Arc::new(inventory);
        let session = RecordingSession::new(
            Arc::clone(&backend) as Arc<dyn CaptureBackend>,
            Arc::clone(&factory) as Arc<dyn WriterFactory>,
            Arc::clone(&inventory) as Arc<dyn DeviceInventory>,
        );
        Self {
            session,
            hub,
            backend,
            factory,
            inventory,
        }
    }

    pub fn log(&self) -> std::sync::MutexGuard<'_, WriterLog> {
        self.factory.log.lock().unwrap()
    }

    pub fn screen_options(dest: &str) -> (RecordingTarget, RecordingOptions) {
        (
            RecordingTarget::Screen,
            RecordingOptions::new(dest).with_target_id("main"),
        )
    }

    /// Start the session and unblock it with a first video sample at
    /// `pts_ms`. Panics if start fails.
    pub async fn start_screen_recording(&self, pts_ms: u64) {
        let session = self.session.clone();
        let (target, options) = Self::screen_options("/tmp/out.mp4");
        let handle = tokio::spawn(async move { session.start(target, options).await });
        self.hub.wait_for_sink().await;
        self.hub.push_video(pts_ms, 100);
        handle.await.unwrap().unwrap();
    }

    /// Wait until the writer has been finalized `count` times.
    pub async fn wait_for_finalize(&self, count: u32) {
        loop {
            if self.log().finalize_calls >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }
}
