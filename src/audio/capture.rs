//! Utterance capture on top of a platform speech recognition device.
//!
//! The device reports raw [`RecognitionEvent`]s through a [`RecognitionSink`]
//! onto the controller's event queue. [`UtteranceCapture`] owns the single
//! live [`CaptureSession`], assembles transcripts, and drops anything that
//! arrives for a session that has already ended.

use crate::config::CaptureConfig;
use crate::error::{KioskError, Result};
use crate::pipeline::messages::{CaptureId, RecognitionEvent, SessionEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Options the device is opened with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionOptions {
    pub language: String,
    pub interim_results: bool,
    pub continuous: bool,
}

impl From<&CaptureConfig> for RecognitionOptions {
    fn from(config: &CaptureConfig) -> Self {
        Self {
            language: config.language.clone(),
            interim_results: config.interim_results,
            continuous: config.continuous,
        }
    }
}

/// Where a recognition device reports events for one capture session.
#[derive(Debug, Clone)]
pub struct RecognitionSink {
    capture: CaptureId,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl RecognitionSink {
    pub fn new(capture: CaptureId, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { capture, tx }
    }

    pub fn capture_id(&self) -> CaptureId {
        self.capture
    }

    /// Queue an event for the controller. Returns `false` once the session is gone.
    pub fn emit(&self, event: RecognitionEvent) -> bool {
        self.tx
            .send(SessionEvent::Recognition {
                capture: self.capture,
                event,
            })
            .is_ok()
    }
}

/// Platform speech-to-text device.
///
/// Implementations must not block: `start` opens the microphone and returns,
/// and all results flow back through the sink.
pub trait RecognitionDevice: Send {
    /// Whether the platform exposes speech recognition at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Open a new recognition session.
    ///
    /// # Errors
    ///
    /// Returns an error if the device refuses to start.
    fn start(&mut self, options: &RecognitionOptions, sink: RecognitionSink) -> Result<()>;

    /// Stop listening immediately. Must be idempotent.
    fn abort(&mut self);
}

/// Lifecycle of one capture session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureState {
    #[default]
    Idle,
    Listening,
    Finalizing,
    Error,
}

/// One microphone acquisition.
#[derive(Debug, Clone)]
pub struct CaptureSession {
    pub id: CaptureId,
    pub state: CaptureState,
    pub partial_transcript: String,
}

/// What a device event meant for the live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureUpdate {
    Listening,
    Interim(String),
    Final(String),
    Failed(String),
    /// Device stopped without producing a final transcript.
    Ended,
}

/// Owner of the recognition device and its single live session.
pub struct UtteranceCapture {
    device: Option<Box<dyn RecognitionDevice>>,
    options: RecognitionOptions,
    session: Option<CaptureSession>,
    next_id: u64,
}

impl UtteranceCapture {
    pub fn new(device: Option<Box<dyn RecognitionDevice>>, config: &CaptureConfig) -> Self {
        Self {
            device,
            options: RecognitionOptions::from(config),
            session: None,
            next_id: 1,
        }
    }

    /// Whether voice input can be offered at all.
    pub fn is_supported(&self) -> bool {
        self.device.as_ref().is_some_and(|d| d.is_available())
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    pub fn state(&self) -> CaptureState {
        self.session
            .as_ref()
            .map_or(CaptureState::Idle, |s| s.state)
    }

    /// Open a new session on the device.
    ///
    /// # Errors
    ///
    /// [`KioskError::DeviceUnavailable`] without a usable device,
    /// [`KioskError::CaptureActive`] while a session is alive, or whatever
    /// the device reports when it refuses to start.
    pub fn start(&mut self, tx: &mpsc::UnboundedSender<SessionEvent>) -> Result<CaptureId> {
        if self.session.is_some() {
            return Err(KioskError::CaptureActive);
        }
        let device = match self.device.as_mut() {
            Some(d) if d.is_available() => d,
            _ => {
                return Err(KioskError::DeviceUnavailable(
                    "speech recognition is not supported on this platform".into(),
                ));
            }
        };

        let id = CaptureId(self.next_id);
        self.next_id += 1;
        device.start(&self.options, RecognitionSink::new(id, tx.clone()))?;

        info!(%id, language = %self.options.language, "capture started");
        self.session = Some(CaptureSession {
            id,
            state: CaptureState::Listening,
            partial_transcript: String::new(),
        });
        Ok(id)
    }

    /// Abort the live session, if any. Returns whether one was alive.
    pub fn cancel(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        if let Some(device) = self.device.as_mut() {
            device.abort();
        }
        info!(id = %session.id, "capture cancelled");
        true
    }

    /// Fold a device event into the live session.
    ///
    /// Returns `None` for events that belong to another session or arrive
    /// after this one already finalized or failed.
    pub fn apply(&mut self, capture: CaptureId, event: RecognitionEvent) -> Option<CaptureUpdate> {
        let session = match self.session.as_mut() {
            Some(s) if s.id == capture => s,
            _ => {
                debug!(%capture, ?event, "dropping event for inactive capture session");
                return None;
            }
        };
        if session.state != CaptureState::Listening {
            debug!(%capture, ?event, "capture session already terminating");
            return None;
        }

        match event {
            RecognitionEvent::Started => Some(CaptureUpdate::Listening),
            RecognitionEvent::Result { segments, is_final } => {
                let transcript = segments.concat();
                session.partial_transcript.clone_from(&transcript);
                if is_final {
                    session.state = CaptureState::Finalizing;
                    info!(%capture, "final transcript: \"{transcript}\"");
                    Some(CaptureUpdate::Final(transcript))
                } else {
                    Some(CaptureUpdate::Interim(transcript))
                }
            }
            RecognitionEvent::Error { reason } => {
                session.state = CaptureState::Error;
                warn!(%capture, "recognition error: {reason}");
                Some(CaptureUpdate::Failed(reason))
            }
            RecognitionEvent::Ended => {
                session.state = CaptureState::Idle;
                debug!(%capture, "device ended without a final transcript");
                Some(CaptureUpdate::Ended)
            }
        }
    }

    /// Destroy the session after a terminal update.
    ///
    /// Continuous devices keep listening after a final result, so they are
    /// stopped here.
    pub fn finish(&mut self) -> Option<CaptureSession> {
        let session = self.session.take()?;
        if session.state == CaptureState::Finalizing && self.options.continuous {
            if let Some(device) = self.device.as_mut() {
                device.abort();
            }
        }
        Some(session)
    }
}

/// Request sent to the platform side of a [`ChannelRecognizer`].
#[derive(Debug)]
pub enum RecognizerCommand {
    Start {
        options: RecognitionOptions,
        sink: RecognitionSink,
    },
    Abort,
}

/// Recognition device backed by a channel to a platform bridge.
///
/// The bridge receives [`RecognizerCommand`]s and reports results through
/// the sink that came with `Start`.
pub struct ChannelRecognizer {
    tx: mpsc::UnboundedSender<RecognizerCommand>,
}

impl ChannelRecognizer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RecognizerCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RecognitionDevice for ChannelRecognizer {
    fn is_available(&self) -> bool {
        !self.tx.is_closed()
    }

    fn start(&mut self, options: &RecognitionOptions, sink: RecognitionSink) -> Result<()> {
        self.tx
            .send(RecognizerCommand::Start {
                options: options.clone(),
                sink,
            })
            .map_err(|e| KioskError::Recognition(format!("recognizer bridge closed: {e}")))
    }

    fn abort(&mut self) {
        let _ = self.tx.send(RecognizerCommand::Abort);
    }
}
