//! High-level recorder facade.
//!
//! Owns at most one recording session at a time and re-exposes its
//! lifecycle behind an event channel, so callers that do not care about
//! session internals get a start/stop/pause/resume surface plus a stream
//! of state-change notifications.

use crate::backend::CaptureBackend;
use crate::options::{RecordingOptions, RecordingTarget};
use crate::session::{DispatchStats, RecordingSession, SessionState};
use screenreel_common::error::{RecorderError, RecorderResult};
use screenreel_devices::DeviceInventory;
use screenreel_media::WriterFactory;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Lifecycle notifications emitted by a [`Recorder`].
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    Started,
    Paused,
    Resumed,
    Stopped,
    /// The active recording failed after start() had already returned.
    Error(RecorderError),
}

/// Entry point for driving recordings.
///
/// A recorder records one session per instance lifecycle: start, optionally
/// pause and resume, then stop. Starting while a session exists fails with
/// `AlreadyStarted`.
pub struct Recorder {
    session: Option<RecordingSession>,
    backend: Arc<dyn CaptureBackend>,
    writer_factory: Arc<dyn WriterFactory>,
    inventory: Arc<dyn DeviceInventory>,
    event_tx: broadcast::Sender<RecorderEvent>,
}

impl Recorder {
    pub fn new(
        backend: Arc<dyn CaptureBackend>,
        writer_factory: Arc<dyn WriterFactory>,
        inventory: Arc<dyn DeviceInventory>,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self {
            session: None,
            backend,
            writer_factory,
            inventory,
            event_tx,
        }
    }

    /// Subscribe to lifecycle events. Subscriptions survive across
    /// sessions started from this recorder.
    pub fn subscribe(&self) -> broadcast::Receiver<RecorderEvent> {
        self.event_tx.subscribe()
    }

    /// Start a new recording session.
    ///
    /// Resolves once samples are flowing into the output file. On failure
    /// the recorder stays empty and can be started again.
    pub async fn start(
        &mut self,
        target: RecordingTarget,
        options: RecordingOptions,
    ) -> RecorderResult<()> {
        if self.session.is_some() {
            return Err(RecorderError::AlreadyStarted);
        }

        let session = RecordingSession::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.writer_factory),
            Arc::clone(&self.inventory),
        );

        session.start(target, options).await?;

        // Forward the session's terminal error (if one ever arrives) into
        // the event stream. The task ends when the channel closes.
        let mut errors = session.subscribe_errors();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            if let Ok(error) = errors.recv().await {
                let _ = event_tx.send(RecorderEvent::Error(error));
            }
        });

        self.session = Some(session);
        let _ = self.event_tx.send(RecorderEvent::Started);
        Ok(())
    }

    /// Stop the active session and finalize the output file.
    pub async fn stop(&mut self) -> RecorderResult<()> {
        let session = self.session.take().ok_or(RecorderError::NotStarted)?;
        let result = session.stop().await;
        let _ = self.event_tx.send(RecorderEvent::Stopped);
        result
    }

    /// Pause the active session. Fails with `NotStarted` when nothing is
    /// recording.
    pub fn pause(&self) -> RecorderResult<()> {
        let session = self.session.as_ref().ok_or(RecorderError::NotStarted)?;
        session.pause();
        let _ = self.event_tx.send(RecorderEvent::Paused);
        Ok(())
    }

    /// Resume the active session; resolves once capture has continued.
    /// Fails with `NotStarted` when nothing is recording.
    pub async fn resume(&self) -> RecorderResult<()> {
        let session = self.session.as_ref().ok_or(RecorderError::NotStarted)?;
        session.resume().await;
        let _ = self.event_tx.send(RecorderEvent::Resumed);
        Ok(())
    }

    pub fn is_recording(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| matches!(s.state(), SessionState::Running | SessionState::Resuming))
    }

    pub fn is_paused(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_paused())
    }

    /// State of the active session, if any.
    pub fn session_state(&self) -> Option<SessionState> {
        self.session.as_ref().map(|s| s.state())
    }

    /// Dispatch counters of the active session, if any.
    pub fn stats(&self) -> Option<DispatchStats> {
        self.session.as_ref().map(|s| s.stats())
    }
}
