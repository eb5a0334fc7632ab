//! Runtime events and render state published for the chat panel.
//!
//! The panel never mutates the session; it renders [`RenderState`] and
//! reacts to [`RuntimeEvent`]s.

use crate::audio::capture::CaptureState;
use crate::audio::playback::PlaybackState;
use crate::conversation::Message;
use serde::{Deserialize, Serialize};

/// Platform capabilities, reported once when the session starts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub speech_recognition: bool,
    pub speech_synthesis: bool,
}

/// Non-fatal problems surfaced to the UI. The conversation stays usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusNotice {
    RecognitionFailed { reason: String },
    SynthesisFailed { reason: String },
    ReplyFailed { reason: String },
    /// A reply or replay could not be read aloud because the platform has no synthesis.
    SpeechUnavailable,
}

/// Events that describe what the session is doing "right now".
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    Capabilities(Capabilities),
    CaptureStateChanged { state: CaptureState },
    /// Latest transcript of the live capture (empty when discarded).
    TranscriptUpdated { text: String },
    /// The conversation log changed; re-read the snapshot.
    LogChanged,
    SpeechStateChanged { state: PlaybackState },
    Status(StatusNotice),
}

/// Everything the chat panel needs to draw itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderState {
    pub messages: Vec<Message>,
    pub capture_state: CaptureState,
    /// Transcript shown in the input field for the latest capture.
    pub transcript: String,
    pub speech_state: PlaybackState,
    /// Text of the active playback, if any.
    pub speech_text: Option<String>,
    /// Enables the voice-input button.
    pub speech_supported: bool,
    pub awaiting_reply: bool,
}
