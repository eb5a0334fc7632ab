//! Session controller that ties capture, the conversation log, reply
//! resolution and speech output together.
//!
//! All mutation happens on one event sequence: user commands and device or
//! resolver events are handled one at a time, either by [`SessionController::run`]
//! or by calling the step methods directly.

use crate::audio::capture::{CaptureState, CaptureUpdate, RecognitionDevice, UtteranceCapture};
use crate::audio::playback::{PlaybackState, PlaybackUpdate, SpeechOutput, SynthesisDevice};
use crate::config::KioskConfig;
use crate::conversation::{ConversationLog, MessageId, MessageKind};
use crate::error::{KioskError, Result};
use crate::pipeline::handle::{SessionCommand, SessionHandle};
use crate::pipeline::messages::{CaptureId, PlaybackId, ReplyId, SessionEvent};
use crate::reply::ReplyResolver;
use crate::runtime::{Capabilities, RenderState, RuntimeEvent, StatusNotice};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why a submission did not reach the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Blank or whitespace-only text.
    EmptyInput,
    /// The input field is read-only while the microphone is open.
    CaptureActive,
    /// The previous submission has not been answered yet.
    ReplyPending,
}

/// Result of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted(ReplyId),
    Ignored(IgnoreReason),
}

/// Where user input currently stands. Capturing and awaiting a reply
/// exclude each other; speech output runs independently of both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStage {
    Idle,
    Capturing,
    AwaitingReply,
}

struct PendingReply {
    id: ReplyId,
    input: String,
    task: JoinHandle<()>,
}

enum InputPhase {
    Ready,
    Capturing(CaptureId),
    AwaitingReply(PendingReply),
}

/// Owns the conversation and every device it touches.
pub struct SessionController {
    config: KioskConfig,
    log: ConversationLog,
    capture: UtteranceCapture,
    speech: SpeechOutput,
    resolver: Arc<dyn ReplyResolver>,
    phase: InputPhase,
    /// Transcript of the latest capture, mirrored into the input field.
    transcript: String,
    next_reply_id: u64,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    event_rx: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    command_tx: mpsc::Sender<SessionCommand>,
    command_rx: Option<mpsc::Receiver<SessionCommand>>,
    runtime_tx: broadcast::Sender<RuntimeEvent>,
    cancel: CancellationToken,
}

impl SessionController {
    /// Create a controller with no speech devices attached.
    ///
    /// The configured greeting, if any, is seeded into the log.
    pub fn new(config: KioskConfig, resolver: Arc<dyn ReplyResolver>) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(config.conversation.command_capacity.max(1));
        let (runtime_tx, _) = broadcast::channel(config.conversation.runtime_event_capacity.max(1));

        let mut log = ConversationLog::new();
        if let Some(greeting) = config.conversation.greeting.as_deref() {
            if let Err(e) = log.append(MessageKind::Bot, greeting) {
                warn!("failed to seed greeting: {e}");
            }
        }

        Self {
            capture: UtteranceCapture::new(None, &config.capture),
            speech: SpeechOutput::new(None, &config.speech),
            config,
            log,
            resolver,
            phase: InputPhase::Ready,
            transcript: String::new(),
            next_reply_id: 1,
            event_tx,
            event_rx: Some(event_rx),
            command_tx,
            command_rx: Some(command_rx),
            runtime_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach the speech recognition device.
    pub fn with_recognizer(mut self, device: impl RecognitionDevice + 'static) -> Self {
        self.capture = UtteranceCapture::new(Some(Box::new(device)), &self.config.capture);
        self
    }

    /// Attach the speech synthesis device.
    pub fn with_synthesizer(mut self, device: impl SynthesisDevice + 'static) -> Self {
        self.speech = SpeechOutput::new(Some(Box::new(device)), &self.config.speech);
        self
    }

    /// Command client for frontends. Valid until the event loop stops.
    pub fn handle(&self) -> SessionHandle {
        SessionHandle::new(
            self.command_tx.clone(),
            self.runtime_tx.clone(),
            self.cancel.clone(),
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.runtime_tx.subscribe()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            speech_recognition: self.capture.is_supported(),
            speech_synthesis: self.speech.is_supported(),
        }
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn stage(&self) -> InputStage {
        match self.phase {
            InputPhase::Ready => InputStage::Idle,
            InputPhase::Capturing(_) => InputStage::Capturing,
            InputPhase::AwaitingReply(_) => InputStage::AwaitingReply,
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speech.is_speaking()
    }

    pub fn render_state(&self) -> RenderState {
        RenderState {
            messages: self.log.snapshot(),
            capture_state: self.capture.state(),
            transcript: self.transcript.clone(),
            speech_state: self.speech.state(),
            speech_text: self.speech.active().map(|p| p.text.clone()),
            speech_supported: self.capture.is_supported(),
            awaiting_reply: matches!(self.phase, InputPhase::AwaitingReply(_)),
        }
    }

    /// Submit typed (or finalized spoken) text.
    ///
    /// Blank text, submissions while the microphone is open, and submissions
    /// while a reply is pending are ignored without touching the log.
    ///
    /// # Errors
    ///
    /// Returns [`KioskError::Log`] if the log refuses the typing placeholder.
    pub fn submit_typed(&mut self, text: &str) -> Result<SubmitOutcome> {
        if text.trim().is_empty() {
            debug!("ignoring empty submission");
            return Ok(SubmitOutcome::Ignored(IgnoreReason::EmptyInput));
        }
        match &self.phase {
            InputPhase::Ready => {}
            InputPhase::Capturing(id) => {
                debug!(capture = %id, "ignoring typed submission while capturing");
                return Ok(SubmitOutcome::Ignored(IgnoreReason::CaptureActive));
            }
            InputPhase::AwaitingReply(pending) => {
                debug!(reply = %pending.id, "ignoring submission while a reply is pending");
                return Ok(SubmitOutcome::Ignored(IgnoreReason::ReplyPending));
            }
        }

        self.interrupt_speech();
        self.log.append(MessageKind::User, text)?;
        self.log.append(
            MessageKind::TypingPlaceholder,
            self.config.conversation.placeholder_text.as_str(),
        )?;

        let id = ReplyId(self.next_reply_id);
        self.next_reply_id += 1;
        let task = tokio::spawn({
            let resolver = Arc::clone(&self.resolver);
            let tx = self.event_tx.clone();
            let input = text.to_owned();
            async move {
                let result = resolver.resolve(&input).await;
                let _ = tx.send(SessionEvent::ReplyResolved { reply: id, result });
            }
        });

        info!(reply = %id, "reply requested for \"{text}\"");
        self.phase = InputPhase::AwaitingReply(PendingReply {
            id,
            input: text.to_owned(),
            task,
        });
        self.emit(RuntimeEvent::LogChanged);
        Ok(SubmitOutcome::Accepted(id))
    }

    /// Open the microphone for one utterance.
    ///
    /// # Errors
    ///
    /// [`KioskError::DeviceUnavailable`] when the platform cannot recognize
    /// speech, [`KioskError::CaptureActive`] or [`KioskError::ReplyPending`]
    /// when input is already in flight, or the device's own start failure.
    pub fn start_voice_input(&mut self) -> Result<CaptureId> {
        if !self.capture.is_supported() {
            return Err(KioskError::DeviceUnavailable(
                "speech recognition is not supported on this platform".into(),
            ));
        }
        match self.phase {
            InputPhase::Ready => {}
            InputPhase::Capturing(_) => return Err(KioskError::CaptureActive),
            InputPhase::AwaitingReply(_) => return Err(KioskError::ReplyPending),
        }

        self.interrupt_speech();
        let id = self.capture.start(&self.event_tx)?;
        self.phase = InputPhase::Capturing(id);
        self.transcript.clear();
        self.emit(RuntimeEvent::TranscriptUpdated {
            text: String::new(),
        });
        self.emit(RuntimeEvent::CaptureStateChanged {
            state: CaptureState::Listening,
        });
        Ok(id)
    }

    /// Abort the live capture and discard its transcript.
    pub fn cancel_voice_input(&mut self) -> bool {
        if !matches!(self.phase, InputPhase::Capturing(_)) {
            return false;
        }
        self.capture.cancel();
        self.discard_transcript();
        self.phase = InputPhase::Ready;
        self.emit(RuntimeEvent::CaptureStateChanged {
            state: CaptureState::Idle,
        });
        true
    }

    /// Read a bot message aloud again, superseding any playback.
    ///
    /// # Errors
    ///
    /// [`KioskError::UnknownMessage`] / [`KioskError::NotReplayable`] for bad
    /// ids, or the speech device failure (also published as a status notice).
    pub fn replay_message(&mut self, id: MessageId) -> Result<PlaybackId> {
        let message = self.log.get(id).ok_or(KioskError::UnknownMessage(id))?;
        if !message.is_replayable() {
            return Err(KioskError::NotReplayable(id));
        }
        let text = message.text.clone();
        self.speak(&text)
    }

    /// React to one device or resolver event.
    pub fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Recognition { capture, event } => {
                if let Some(update) = self.capture.apply(capture, event) {
                    self.on_capture_update(update);
                }
            }
            SessionEvent::Synthesis { playback, event } => {
                if let Some(update) = self.speech.apply(playback, event) {
                    self.on_playback_update(update);
                }
            }
            SessionEvent::ReplyResolved { reply, result } => self.on_reply(reply, result),
        }
    }

    /// Handle every event already queued. Returns how many were handled.
    pub fn process_pending_events(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let next = match self.event_rx.as_mut() {
                Some(rx) => rx.try_recv(),
                None => break,
            };
            match next {
                Ok(event) => {
                    self.handle_event(event);
                    handled += 1;
                }
                Err(_) => break,
            }
        }
        handled
    }

    /// Wait for the next event and handle it.
    ///
    /// Returns `false` if the event loop owns the queue.
    pub async fn process_next_event(&mut self) -> bool {
        let Some(rx) = self.event_rx.as_mut() else {
            return false;
        };
        match rx.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => false,
        }
    }

    /// Run the event loop until cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if the loop was already started.
    pub async fn run(mut self) -> Result<()> {
        let mut event_rx = self
            .event_rx
            .take()
            .ok_or_else(|| KioskError::Channel("session event queue already taken".into()))?;
        let mut command_rx = self
            .command_rx
            .take()
            .ok_or_else(|| KioskError::Channel("session command queue already taken".into()))?;

        let capabilities = self.capabilities();
        info!(
            recognition = capabilities.speech_recognition,
            synthesis = capabilities.speech_synthesis,
            "kiosk session running"
        );
        self.emit(RuntimeEvent::Capabilities(capabilities));

        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                command = command_rx.recv() => {
                    match command {
                        Some(command) => self.handle_command(command),
                        None => break,
                    }
                }
                event = event_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => break,
                    }
                }
            }
        }

        self.shutdown();
        info!("kiosk session stopped");
        Ok(())
    }

    /// Stop speech, close the microphone and abandon any pending reply.
    pub fn shutdown(&mut self) {
        self.capture.cancel();
        if let InputPhase::AwaitingReply(pending) =
            std::mem::replace(&mut self.phase, InputPhase::Ready)
        {
            pending.task.abort();
            self.log.remove_typing_placeholder();
            debug!(reply = %pending.id, "abandoned pending reply");
        }
        self.speech.cancel();
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::SubmitTyped { text, respond } => {
                let _ = respond.send(self.submit_typed(&text));
            }
            SessionCommand::StartVoiceInput { respond } => {
                let _ = respond.send(self.start_voice_input());
            }
            SessionCommand::CancelVoiceInput { respond } => {
                let _ = respond.send(self.cancel_voice_input());
            }
            SessionCommand::ReplayMessage { id, respond } => {
                let _ = respond.send(self.replay_message(id));
            }
            SessionCommand::RenderState { respond } => {
                let _ = respond.send(self.render_state());
            }
        }
    }

    fn on_capture_update(&mut self, update: CaptureUpdate) {
        match update {
            CaptureUpdate::Listening => {
                debug!("microphone open");
            }
            CaptureUpdate::Interim(text) => {
                self.transcript.clone_from(&text);
                self.emit(RuntimeEvent::TranscriptUpdated { text });
            }
            CaptureUpdate::Final(text) => {
                self.transcript.clone_from(&text);
                self.emit(RuntimeEvent::TranscriptUpdated { text: text.clone() });
                self.emit(RuntimeEvent::CaptureStateChanged {
                    state: CaptureState::Finalizing,
                });
                self.end_capture();
                match self.submit_typed(&text) {
                    Ok(SubmitOutcome::Accepted(_)) => {}
                    Ok(SubmitOutcome::Ignored(reason)) => {
                        debug!(?reason, "final transcript not submitted");
                    }
                    Err(e) => error!("failed to submit final transcript: {e}"),
                }
            }
            CaptureUpdate::Failed(reason) => {
                self.discard_transcript();
                self.end_capture();
                self.emit(RuntimeEvent::Status(StatusNotice::RecognitionFailed { reason }));
            }
            CaptureUpdate::Ended => {
                self.discard_transcript();
                self.end_capture();
            }
        }
    }

    fn on_playback_update(&mut self, update: PlaybackUpdate) {
        match update {
            PlaybackUpdate::Started => self.emit(RuntimeEvent::SpeechStateChanged {
                state: PlaybackState::Speaking,
            }),
            PlaybackUpdate::Ended => self.emit(RuntimeEvent::SpeechStateChanged {
                state: PlaybackState::Ended,
            }),
            PlaybackUpdate::Failed(reason) => {
                self.emit(RuntimeEvent::SpeechStateChanged {
                    state: PlaybackState::Failed,
                });
                self.emit(RuntimeEvent::Status(StatusNotice::SynthesisFailed { reason }));
            }
        }
    }

    fn on_reply(&mut self, reply: ReplyId, result: Result<String>) {
        let pending = match std::mem::replace(&mut self.phase, InputPhase::Ready) {
            InputPhase::AwaitingReply(pending) if pending.id == reply => pending,
            other => {
                self.phase = other;
                debug!(%reply, "dropping reply for inactive request");
                return;
            }
        };

        match result {
            Ok(text) => {
                self.log.replace_typing_placeholder(text.as_str());
                info!(%reply, "reply delivered for \"{}\"", pending.input);
                self.emit(RuntimeEvent::LogChanged);
                if let Err(e) = self.speak(&text) {
                    debug!(%reply, "reply not spoken: {e}");
                }
            }
            Err(e) => {
                self.log.remove_typing_placeholder();
                warn!(%reply, "reply for \"{}\" failed: {e}", pending.input);
                self.emit(RuntimeEvent::LogChanged);
                self.emit(RuntimeEvent::Status(StatusNotice::ReplyFailed {
                    reason: e.to_string(),
                }));
            }
        }
    }

    fn speak(&mut self, text: &str) -> Result<PlaybackId> {
        match self.speech.speak(text, &self.event_tx) {
            Ok(id) => {
                self.emit(RuntimeEvent::SpeechStateChanged {
                    state: PlaybackState::Idle,
                });
                Ok(id)
            }
            Err(e @ KioskError::DeviceUnavailable(_)) => {
                self.emit(RuntimeEvent::Status(StatusNotice::SpeechUnavailable));
                Err(e)
            }
            Err(e) => {
                warn!("speech output failed: {e}");
                self.emit(RuntimeEvent::Status(StatusNotice::SynthesisFailed {
                    reason: e.to_string(),
                }));
                Err(e)
            }
        }
    }

    /// New input preempts playback.
    fn interrupt_speech(&mut self) {
        if self.speech.cancel() {
            self.emit(RuntimeEvent::SpeechStateChanged {
                state: PlaybackState::Idle,
            });
        }
    }

    fn end_capture(&mut self) {
        self.capture.finish();
        self.phase = InputPhase::Ready;
        self.emit(RuntimeEvent::CaptureStateChanged {
            state: CaptureState::Idle,
        });
    }

    fn discard_transcript(&mut self) {
        self.transcript.clear();
        self.emit(RuntimeEvent::TranscriptUpdated {
            text: String::new(),
        });
    }

    fn emit(&self, event: RuntimeEvent) {
        let _ = self.runtime_tx.send(event);
    }
}
