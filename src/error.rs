//! Error types for the kiosk conversation session.

use crate::conversation::MessageId;

/// Top-level error type for the voice-interactive session.
#[derive(Debug, thiserror::Error)]
pub enum KioskError {
    /// The platform has no speech recognition or synthesis capability.
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Mid-capture recognition failure reported by the device.
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Speech playback failure reported by the device.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Reply resolver failure.
    #[error("reply resolver error: {0}")]
    Resolver(String),

    /// A capture session is already alive.
    #[error("voice capture already active")]
    CaptureActive,

    /// A reply request is still outstanding.
    #[error("a reply is still pending")]
    ReplyPending,

    /// No message with this id exists in the log.
    #[error("unknown message {0}")]
    UnknownMessage(MessageId),

    /// The message exists but cannot be read aloud (user text or placeholder).
    #[error("message {0} cannot be replayed")]
    NotReplayable(MessageId),

    /// Conversation log invariant violation.
    #[error("conversation log error: {0}")]
    Log(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, KioskError>;
