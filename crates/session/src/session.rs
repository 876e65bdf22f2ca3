//! The recording session: state machine, startup negotiation, and the
//! per-sample dispatch path.
//!
//! A session negotiates which sources are active for a target, opens the
//! container writer handle, and then waits: the writer's tracks are created
//! lazily because dimensions and channel layouts are only known once the
//! first sample of each kind arrives. Samples are delivered concurrently
//! from independent capture threads; one mutex around the session's mutable
//! state serializes dispatch, and the writer is pulled out of that lock
//! before any async finalize.

use crate::backend::{CaptureBackend, CapturePlan, MicrophonePlan, ResolvedTarget};
use crate::options::{RecordingOptions, RecordingTarget};
use crate::timing::TimeCorrector;
use screenreel_common::error::{RecorderError, RecorderResult};
use screenreel_devices::DeviceInventory;
use screenreel_media::{
    resolve_container_format, CaptureSource, ContainerWriter, MediaSampleKind, SampleConsumer,
    SampleFormat, SampleSink, TimedSample, TrackId, TrackSettings, VideoCodec, WriterFactory,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{broadcast, oneshot};

/// State of a recording session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session created but not started.
    Idle,
    /// Sources are starting; waiting for the first sample to establish the
    /// writer session.
    Starting,
    /// Samples are flowing into the writer.
    Running,
    /// Samples are discarded, not buffered.
    Paused,
    /// Resume requested; waiting for the next corrected sample.
    Resuming,
    /// stop() is flushing tracks and finalizing the writer.
    Stopping,
    /// Finalized normally.
    Finished,
    /// Terminal failure; the error is available via `error()`.
    Failed,
}

/// Per-kind dispatch counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct KindStats {
    pub appended: u64,
    pub dropped: u64,
}

/// Dispatch accounting for the whole session.
///
/// Dropped samples are the intended backpressure policy (never block a
/// capture thread, never buffer unboundedly); the counters exist so callers
/// can observe the drop rate.
#[derive(Debug, Default, Clone, Copy)]
pub struct DispatchStats {
    pub video: KindStats,
    pub system_audio: KindStats,
    pub microphone: KindStats,
}

impl DispatchStats {
    fn for_kind_mut(&mut self, kind: MediaSampleKind) -> &mut KindStats {
        match kind {
            MediaSampleKind::Video => &mut self.video,
            MediaSampleKind::SystemAudio => &mut self.system_audio,
            MediaSampleKind::Microphone => &mut self.microphone,
        }
    }

    pub fn total_appended(&self) -> u64 {
        self.video.appended + self.system_audio.appended + self.microphone.appended
    }

    pub fn total_dropped(&self) -> u64 {
        self.video.dropped + self.system_audio.dropped + self.microphone.dropped
    }
}

/// Lazily created writer tracks, at most one per kind.
#[derive(Debug, Default)]
struct TrackSet {
    video: Option<TrackId>,
    system_audio: Option<TrackId>,
    microphone: Option<TrackId>,
}

impl TrackSet {
    fn get(&self, kind: MediaSampleKind) -> Option<TrackId> {
        match kind {
            MediaSampleKind::Video => self.video,
            MediaSampleKind::SystemAudio => self.system_audio,
            MediaSampleKind::Microphone => self.microphone,
        }
    }

    fn set(&mut self, kind: MediaSampleKind, track: TrackId) {
        match kind {
            MediaSampleKind::Video => self.video = Some(track),
            MediaSampleKind::SystemAudio => self.system_audio = Some(track),
            MediaSampleKind::Microphone => self.microphone = Some(track),
        }
    }

    fn opened(&self) -> impl Iterator<Item = TrackId> {
        [self.video, self.system_audio, self.microphone]
            .into_iter()
            .flatten()
    }
}

/// The slice of the options/negotiation outcome the dispatch path needs.
#[derive(Debug, Clone, Copy)]
struct SessionProfile {
    audio_only: bool,
    record_system_audio: bool,
    microphone_enabled: bool,
    video_codec: VideoCodec,
    lossless_audio: bool,
    mic_channels: Option<u32>,
}

/// Mutable session state, guarded by one mutex.
///
/// Hold time must stay short: no blocking I/O happens under this lock, and
/// the writer is taken out of it before finalize.
struct SessionInner {
    state: SessionState,
    profile: Option<SessionProfile>,
    timing: TimeCorrector,
    writer: Option<Box<dyn ContainerWriter>>,
    writing: bool,
    tracks: TrackSet,
    stats: DispatchStats,
    error: Option<RecorderError>,
    /// Pending start() continuation; take-and-clear before fulfilling.
    start_tx: Option<oneshot::Sender<RecorderResult<()>>>,
    /// Pending resume() continuation, one per resume cycle.
    resume_tx: Option<oneshot::Sender<()>>,
    /// Wakes the detached teardown task after an asynchronous failure.
    teardown_tx: Option<oneshot::Sender<()>>,
}

struct SessionShared {
    inner: Mutex<SessionInner>,
    /// Owned capture sources; async mutex so teardown can stop them without
    /// blocking a runtime thread.
    sources: tokio::sync::Mutex<Vec<Box<dyn CaptureSource>>>,
    error_tx: broadcast::Sender<RecorderError>,
    backend: Arc<dyn CaptureBackend>,
    writer_factory: Arc<dyn WriterFactory>,
    inventory: Arc<dyn DeviceInventory>,
}

/// One recording from start to finalized file.
///
/// Cheap to clone; all clones share the same session. Lifecycle methods are
/// not safe to call concurrently with themselves (the facade serializes
/// them), but sample delivery is safe from any number of threads.
#[derive(Clone)]
pub struct RecordingSession {
    shared: Arc<SessionShared>,
}

impl RecordingSession {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        writer_factory: Arc<dyn WriterFactory>,
        inventory: Arc<dyn DeviceInventory>,
    ) -> Self {
        let (error_tx, _) = broadcast::channel(4);
        Self {
            shared: Arc::new(SessionShared {
                inner: Mutex::new(SessionInner {
                    state: SessionState::Idle,
                    profile: None,
                    timing: TimeCorrector::new(),
                    writer: None,
                    writing: false,
                    tracks: TrackSet::default(),
                    stats: DispatchStats::default(),
                    error: None,
                    start_tx: None,
                    resume_tx: None,
                    teardown_tx: None,
                }),
                sources: tokio::sync::Mutex::new(Vec::new()),
                error_tx,
                backend,
                writer_factory,
                inventory,
            }),
        }
    }

    /// Start recording.
    ///
    /// Validates the target and options, opens the writer handle, starts the
    /// capture sources, and suspends until the first sample establishes the
    /// writer session or a fatal error occurs. Configuration errors are
    /// returned before any source or writer is touched.
    pub async fn start(
        &self,
        target: RecordingTarget,
        options: RecordingOptions,
    ) -> RecorderResult<()> {
        if self.shared.lock_inner().state != SessionState::Idle {
            return Err(RecorderError::AlreadyStarted);
        }

        if target.requires_target_id() && options.target_id.is_none() {
            return Err(RecorderError::NoTargetProvided);
        }

        let format = resolve_container_format(
            &options.destination,
            target.is_audio_only(),
            options.video_codec,
        )?;
        let resolved = self.resolve_target(target, &options).await?;
        let microphone = self.negotiate_microphone(target, &options)?;

        tracing::info!(
            target_id = resolved.id(),
            destination = %options.destination.display(),
            container = format.extension(),
            codec = options.video_codec.as_str(),
            "Starting recording session"
        );

        let writer = self
            .shared
            .writer_factory
            .open(&options.destination, format)?;

        let plan = CapturePlan {
            target: resolved,
            frames_per_second: options.frames_per_second,
            crop: options.crop,
            show_cursor: options.show_cursor,
            highlight_clicks: options.highlight_clicks,
            record_system_audio: options.record_system_audio,
            microphone: microphone.clone(),
        };
        let new_sources = self.shared.backend.create_sources(&plan)?;

        let (teardown_tx, teardown_rx) = oneshot::channel();
        let start_rx = {
            let mut inner = self.shared.lock_inner();
            if inner.state != SessionState::Idle {
                return Err(RecorderError::AlreadyStarted);
            }
            inner.state = SessionState::Starting;
            inner.profile = Some(SessionProfile {
                audio_only: target.is_audio_only(),
                record_system_audio: options.record_system_audio,
                microphone_enabled: microphone.is_some(),
                video_codec: options.video_codec,
                lossless_audio: options.lossless_audio,
                mic_channels: microphone.as_ref().map(|m| m.channels),
            });
            inner.writer = Some(writer);
            inner.teardown_tx = Some(teardown_tx);
            let (tx, rx) = oneshot::channel();
            inner.start_tx = Some(tx);
            rx
        };

        // Teardown path for failures discovered after start() has returned;
        // fired at most once by the failure handler.
        {
            let shared = Arc::clone(&self.shared);
            tokio::spawn(async move {
                if teardown_rx.await.is_ok() {
                    shared.cleanup().await;
                }
            });
        }

        let sink = SessionShared::sink(&self.shared);
        let start_failure = {
            let mut sources = self.shared.sources.lock().await;
            *sources = new_sources;
            let mut failure = None;
            for source in sources.iter_mut() {
                if let Err(error) = source.start_capture(sink.clone()).await {
                    tracing::warn!(
                        source = source.label(),
                        error = %error,
                        "Capture source failed to start"
                    );
                    failure = Some(error);
                    break;
                }
            }
            failure
        };
        if let Some(error) = start_failure {
            let error = wrap_start_failure(error);
            self.shared.abort_start(error.clone()).await;
            return Err(error);
        }

        match start_rx.await {
            Ok(Ok(())) => {
                tracing::info!("Recording session running");
                Ok(())
            }
            Ok(Err(error)) => {
                // The failure was routed to this in-flight call; teardown
                // is ours.
                self.shared.cleanup().await;
                Err(error)
            }
            // Continuation dropped without fulfilment (torn down mid-start).
            Err(_) => Err(RecorderError::could_not_start(None)),
        }
    }

    /// Stop recording, flush all active tracks, and finalize the writer.
    ///
    /// Returns only after the writer has fully flushed. Stopping a session
    /// that already failed is not an error: the terminal failure was
    /// already delivered through the error channel and teardown already
    /// ran, so this returns Ok without finalizing anything twice.
    pub async fn stop(&self) -> RecorderResult<()> {
        {
            let mut inner = self.shared.lock_inner();
            match inner.state {
                SessionState::Idle => return Err(RecorderError::NotStarted),
                SessionState::Failed | SessionState::Finished | SessionState::Stopping => {
                    return Ok(())
                }
                _ => inner.state = SessionState::Stopping,
            }
        }

        tracing::info!("Stopping recording session");
        self.shared.cleanup().await;
        self.shared.lock_inner().state = SessionState::Finished;
        tracing::info!("Recording session finished");
        Ok(())
    }

    /// Pause: subsequent samples are discarded until resume.
    pub fn pause(&self) {
        let mut inner = self.shared.lock_inner();
        if matches!(inner.state, SessionState::Running | SessionState::Resuming) {
            // A resume that never saw a sample can no longer complete.
            if let Some(tx) = inner.resume_tx.take() {
                let _ = tx.send(());
            }
            inner.state = SessionState::Paused;
            tracing::info!("Recording paused");
        }
    }

    /// Resume after a pause.
    ///
    /// Suspends until the next sample has been timestamp-corrected and
    /// forwarded, so the caller observes resumed capture only once
    /// continuity is established.
    pub async fn resume(&self) {
        let rx = {
            let mut inner = self.shared.lock_inner();
            if inner.state != SessionState::Paused {
                return;
            }
            let (tx, rx) = oneshot::channel();
            inner.resume_tx = Some(tx);
            inner.timing.begin_resume();
            inner.state = SessionState::Resuming;
            tracing::info!("Recording resuming");
            rx
        };
        let _ = rx.await;
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.shared.lock_inner().state
    }

    pub fn is_paused(&self) -> bool {
        self.state() == SessionState::Paused
    }

    /// Terminal error, if the session failed.
    pub fn error(&self) -> Option<RecorderError> {
        self.shared.lock_inner().error.clone()
    }

    /// Dispatch accounting so far.
    pub fn stats(&self) -> DispatchStats {
        self.shared.lock_inner().stats
    }

    /// Subscribe to the terminal-error notification channel. At most one
    /// error is delivered per session, and only for failures that occur
    /// when no start() call is in flight to receive them directly.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<RecorderError> {
        self.shared.error_tx.subscribe()
    }

    async fn resolve_target(
        &self,
        target: RecordingTarget,
        options: &RecordingOptions,
    ) -> RecorderResult<ResolvedTarget> {
        let inventory = &self.shared.inventory;
        match target {
            RecordingTarget::Screen => {
                let id = options
                    .target_id
                    .as_deref()
                    .ok_or(RecorderError::NoTargetProvided)?;
                let screen = inventory
                    .screens()
                    .await?
                    .into_iter()
                    .find(|screen| screen.id == id)
                    .ok_or_else(|| RecorderError::TargetNotFound(id.to_string()))?;
                Ok(ResolvedTarget::Screen(screen))
            }
            RecordingTarget::Window => {
                let id = options
                    .target_id
                    .as_deref()
                    .ok_or(RecorderError::NoTargetProvided)?;
                let window = inventory
                    .windows()
                    .await?
                    .into_iter()
                    .find(|window| window.id == id)
                    .ok_or_else(|| RecorderError::TargetNotFound(id.to_string()))?;
                Ok(ResolvedTarget::Window(window))
            }
            RecordingTarget::ExternalDevice => {
                let id = options
                    .target_id
                    .as_deref()
                    .ok_or(RecorderError::NoTargetProvided)?;
                inventory.enable_capture_devices();
                let device = inventory
                    .external_devices()
                    .into_iter()
                    .find(|device| device.id == id)
                    .ok_or_else(|| RecorderError::TargetNotFound(id.to_string()))?;
                Ok(ResolvedTarget::ExternalDevice(device))
            }
            RecordingTarget::AudioOnly => {
                // The capture stream still needs a display to bind to.
                let anchor = inventory
                    .screens()
                    .await?
                    .into_iter()
                    .next()
                    .ok_or(RecorderError::NoDisplaysConnected)?;
                Ok(ResolvedTarget::AudioOnly { anchor })
            }
        }
    }

    /// Resolve the microphone channel layout through the inventory.
    ///
    /// External-device targets route the device's own audio; a microphone
    /// selection is ignored there rather than falling through to the
    /// channel lookup.
    fn negotiate_microphone(
        &self,
        target: RecordingTarget,
        options: &RecordingOptions,
    ) -> RecorderResult<Option<MicrophonePlan>> {
        let Some(device_id) = options.microphone_device_id.clone() else {
            return Ok(None);
        };
        if target == RecordingTarget::ExternalDevice {
            tracing::debug!(
                device = %device_id,
                "Ignoring microphone selection for external-device target"
            );
            return Ok(None);
        }
        match self.shared.inventory.microphone_channels(&device_id) {
            Some(channels) => Ok(Some(MicrophonePlan {
                device_id,
                channels,
            })),
            None => Err(RecorderError::MicrophoneNotFound(device_id)),
        }
    }
}

impl SessionShared {
    fn lock_inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sink(shared: &Arc<Self>) -> SampleSink {
        Arc::new(SessionSink {
            shared: Arc::downgrade(shared),
        })
    }

    /// The single per-sample entry point, invoked from capture threads.
    fn dispatch(&self, kind: MediaSampleKind, mut sample: TimedSample) {
        let mut guard = self.lock_inner();
        let inner = &mut *guard;

        match inner.state {
            SessionState::Starting | SessionState::Running | SessionState::Resuming => {}
            // Paused samples are discarded, not buffered; terminal states
            // accept nothing.
            _ => return,
        }

        let Some(profile) = inner.profile else {
            return;
        };

        if !sample.is_valid() || !sample.format.matches_kind(kind) {
            inner.stats.for_kind_mut(kind).dropped += 1;
            return;
        }

        let admitted = match kind {
            MediaSampleKind::Video => !profile.audio_only,
            MediaSampleKind::SystemAudio => profile.record_system_audio,
            MediaSampleKind::Microphone => profile.microphone_enabled,
        };
        if !admitted {
            inner.stats.for_kind_mut(kind).dropped += 1;
            return;
        }

        // Timing-sensitive kinds: video, or any audio when the recording is
        // audio-only. The first corrected sample after a resume fulfils the
        // pending resume continuation (take-and-clear, exactly once).
        let timing_sensitive = kind == MediaSampleKind::Video || profile.audio_only;
        if timing_sensitive && inner.timing.correct(&mut sample) {
            if let Some(tx) = inner.resume_tx.take() {
                let _ = tx.send(());
            }
            if inner.state == SessionState::Resuming {
                inner.state = SessionState::Running;
            }
        }

        // Lazy track creation: settings come from this first sample.
        if inner.tracks.get(kind).is_none() {
            let Some(settings) = track_settings(&profile, kind, &sample) else {
                inner.stats.for_kind_mut(kind).dropped += 1;
                return;
            };
            let Some(writer) = inner.writer.as_mut() else {
                return;
            };
            match writer.add_track(kind, settings) {
                Ok(track) => {
                    tracing::debug!(kind = %kind, ?settings, "Created writer track");
                    inner.tracks.set(kind, track);
                }
                Err(error) => {
                    tracing::warn!(kind = %kind, error = %error, "Writer rejected track");
                    self.fail_locked(
                        inner,
                        RecorderError::CouldNotAddInput(kind.as_str().to_string()),
                    );
                    return;
                }
            }
        }

        // The first sample of the stream-establishing kind starts the
        // writer session at its (corrected) timestamp.
        if !inner.writing {
            let establishes_stream = match kind {
                MediaSampleKind::Video => !profile.audio_only,
                MediaSampleKind::SystemAudio | MediaSampleKind::Microphone => profile.audio_only,
            };
            if !establishes_stream {
                inner.stats.for_kind_mut(kind).dropped += 1;
                return;
            }
            let Some(writer) = inner.writer.as_mut() else {
                return;
            };
            if !writer.start_writing() {
                self.fail_locked(inner, RecorderError::could_not_start(None));
                return;
            }
            writer.start_session(sample.pts);
            inner.writing = true;
            if inner.state == SessionState::Starting {
                inner.state = SessionState::Running;
            }
            if let Some(tx) = inner.start_tx.take() {
                let _ = tx.send(Ok(()));
            }
            tracing::info!(origin = ?sample.pts, "Container writer session started");
        }

        let Some(track) = inner.tracks.get(kind) else {
            return;
        };
        let Some(writer) = inner.writer.as_mut() else {
            return;
        };
        if writer.is_ready_for_more(track) {
            match writer.append(track, &sample) {
                Ok(()) => inner.stats.for_kind_mut(kind).appended += 1,
                Err(error) => {
                    tracing::warn!(kind = %kind, error = %error, "Writer append failed");
                    self.fail_locked(inner, error);
                }
            }
        } else {
            // Backpressure: drop rather than block the capture thread.
            inner.stats.for_kind_mut(kind).dropped += 1;
        }
    }

    /// Transition to Failed and surface the error exactly once: either to
    /// the in-flight start() continuation, or out-of-band through the error
    /// channel plus a detached teardown. Never both.
    fn fail_locked(&self, inner: &mut SessionInner, error: RecorderError) {
        if matches!(
            inner.state,
            SessionState::Failed | SessionState::Stopping | SessionState::Finished
        ) {
            return;
        }
        inner.state = SessionState::Failed;
        inner.error = Some(error.clone());
        tracing::warn!(error = %error, "Recording session failed");

        if let Some(tx) = inner.resume_tx.take() {
            let _ = tx.send(());
        }

        if let Some(tx) = inner.start_tx.take() {
            // The pending start() caller receives the error and owns the
            // teardown.
            let _ = tx.send(Err(error));
            return;
        }

        let _ = self.error_tx.send(error);
        if let Some(tx) = inner.teardown_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Abort an in-flight start() before its continuation was armed for
    /// fulfilment by dispatch.
    async fn abort_start(&self, error: RecorderError) {
        {
            let mut inner = self.lock_inner();
            inner.state = SessionState::Failed;
            inner.error = Some(error);
            inner.start_tx = None;
        }
        self.cleanup().await;
    }

    /// Idempotent teardown: stop whatever is capturing, finish whatever
    /// tracks were created, finalize the writer if it started writing.
    /// Tolerates partially-initialized state.
    async fn cleanup(&self) {
        {
            let mut sources = self.sources.lock().await;
            for source in sources.iter_mut() {
                if source.is_capturing() {
                    if let Err(error) = source.stop_capture().await {
                        tracing::warn!(
                            source = source.label(),
                            error = %error,
                            "Failed to stop capture source"
                        );
                    }
                }
            }
        }

        let writer = {
            let mut guard = self.lock_inner();
            let inner = &mut *guard;
            inner.teardown_tx.take();
            inner.start_tx.take();
            if let Some(tx) = inner.resume_tx.take() {
                let _ = tx.send(());
            }
            if inner.writing {
                if let Some(writer) = inner.writer.as_mut() {
                    // Tracks that were never created are skipped, and the
                    // writer leaves the lock before the async finalize.
                    for track in inner.tracks.opened() {
                        writer.mark_finished(track);
                    }
                }
                inner.writer.take()
            } else {
                inner.writer.take();
                None
            }
        };

        if let Some(mut writer) = writer {
            if let Err(error) = writer.finalize().await {
                tracing::warn!(error = %error, "Writer finalize failed");
            }
        }
    }
}

/// Callback surface handed to capture sources. Holds the session weakly so
/// a source outliving its session delivers into nothing.
struct SessionSink {
    shared: Weak<SessionShared>,
}

impl SampleConsumer for SessionSink {
    fn deliver(&self, kind: MediaSampleKind, sample: TimedSample) {
        if let Some(shared) = self.shared.upgrade() {
            shared.dispatch(kind, sample);
        }
    }

    fn capture_failed(&self, error: RecorderError) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut guard = shared.lock_inner();
        let inner = &mut *guard;
        match inner.state {
            SessionState::Starting
            | SessionState::Running
            | SessionState::Paused
            | SessionState::Resuming => {
                shared.fail_locked(inner, error);
            }
            _ => {}
        }
    }
}

fn track_settings(
    profile: &SessionProfile,
    kind: MediaSampleKind,
    sample: &TimedSample,
) -> Option<TrackSettings> {
    match (kind, sample.format) {
        (
            MediaSampleKind::Video,
            SampleFormat::Video { width, height },
        ) => Some(TrackSettings::Video {
            width,
            height,
            codec: profile.video_codec,
        }),
        (
            MediaSampleKind::Microphone,
            SampleFormat::Audio {
                channels,
                sample_rate,
            },
        ) => Some(TrackSettings::Audio {
            // The negotiated device layout wins over what the sample claims.
            channels: profile.mic_channels.unwrap_or(channels),
            sample_rate,
            lossless: profile.lossless_audio,
        }),
        (
            MediaSampleKind::SystemAudio,
            SampleFormat::Audio {
                channels,
                sample_rate,
            },
        ) => Some(TrackSettings::Audio {
            channels,
            sample_rate,
            lossless: profile.lossless_audio,
        }),
        _ => None,
    }
}

/// Start failures keep their taxonomy kind where they already have one.
fn wrap_start_failure(error: RecorderError) -> RecorderError {
    match error {
        e @ RecorderError::CouldNotStartStream { .. } | e @ RecorderError::NoPermissions => e,
        other => RecorderError::could_not_start(other),
    }
}
