//! Command client for a running session.

use crate::conversation::MessageId;
use crate::error::{KioskError, Result};
use crate::pipeline::coordinator::SubmitOutcome;
use crate::pipeline::messages::{CaptureId, PlaybackId};
use crate::runtime::{RenderState, RuntimeEvent};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

/// A user action routed to the session event loop.
#[derive(Debug)]
pub enum SessionCommand {
    SubmitTyped {
        text: String,
        respond: oneshot::Sender<Result<SubmitOutcome>>,
    },
    StartVoiceInput {
        respond: oneshot::Sender<Result<CaptureId>>,
    },
    CancelVoiceInput {
        respond: oneshot::Sender<bool>,
    },
    ReplayMessage {
        id: MessageId,
        respond: oneshot::Sender<Result<PlaybackId>>,
    },
    RenderState {
        respond: oneshot::Sender<RenderState>,
    },
}

/// Cloneable client for [`crate::SessionController::run`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    runtime_tx: broadcast::Sender<RuntimeEvent>,
    cancel: CancellationToken,
}

impl SessionHandle {
    pub(crate) fn new(
        tx: mpsc::Sender<SessionCommand>,
        runtime_tx: broadcast::Sender<RuntimeEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            tx,
            runtime_tx,
            cancel,
        }
    }

    pub async fn submit_typed(&self, text: impl Into<String>) -> Result<SubmitOutcome> {
        let text = text.into();
        self.request(|respond| SessionCommand::SubmitTyped { text, respond })
            .await?
    }

    pub async fn start_voice_input(&self) -> Result<CaptureId> {
        self.request(|respond| SessionCommand::StartVoiceInput { respond })
            .await?
    }

    pub async fn cancel_voice_input(&self) -> Result<bool> {
        self.request(|respond| SessionCommand::CancelVoiceInput { respond })
            .await
    }

    pub async fn replay_message(&self, id: MessageId) -> Result<PlaybackId> {
        self.request(|respond| SessionCommand::ReplayMessage { id, respond })
            .await?
    }

    pub async fn render_state(&self) -> Result<RenderState> {
        self.request(|respond| SessionCommand::RenderState { respond })
            .await
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.runtime_tx.subscribe()
    }

    /// Ask the event loop to stop. Pending work is abandoned.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T> {
        let (respond, response) = oneshot::channel();
        self.tx
            .send(build(respond))
            .await
            .map_err(|e| KioskError::Channel(format!("failed to send session command: {e}")))?;
        response
            .await
            .map_err(|e| KioskError::Channel(format!("session command response dropped: {e}")))
    }
}
