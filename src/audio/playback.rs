//! Speech output on top of a platform text-to-speech device.
//!
//! Only one utterance plays at a time. Every `speak` cancels whatever is
//! playing first, so the most recent request always wins.

use crate::config::SpeechConfig;
use crate::error::{KioskError, Result};
use crate::pipeline::messages::{PlaybackId, SessionEvent, SynthesisEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A voice exposed by the synthesis device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    pub name: String,
    /// BCP-47 language tag, e.g. `en-US`.
    pub lang: String,
    /// Rendered on-device rather than by a network service.
    pub local_service: bool,
}

/// A fully specified request for the device.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// `None` means the device default voice.
    pub voice: Option<Voice>,
    pub rate: f32,
    pub pitch: f32,
}

/// Where a synthesis device reports lifecycle events for one playback.
#[derive(Debug, Clone)]
pub struct PlaybackSink {
    playback: PlaybackId,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl PlaybackSink {
    pub fn new(playback: PlaybackId, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { playback, tx }
    }

    pub fn playback_id(&self) -> PlaybackId {
        self.playback
    }

    /// Queue an event for the controller. Returns `false` once the session is gone.
    pub fn emit(&self, event: SynthesisEvent) -> bool {
        self.tx
            .send(SessionEvent::Synthesis {
                playback: self.playback,
                event,
            })
            .is_ok()
    }
}

/// Platform text-to-speech device.
pub trait SynthesisDevice: Send {
    /// Whether the platform exposes speech synthesis at all.
    fn is_available(&self) -> bool {
        true
    }

    /// Voices currently installed.
    fn voices(&self) -> Vec<Voice>;

    /// Begin playback. Must return without waiting for audio to finish.
    ///
    /// # Errors
    ///
    /// Returns an error if the device refuses the utterance.
    fn speak(&mut self, utterance: Utterance, sink: PlaybackSink) -> Result<()>;

    /// Stop any playback immediately. Must be idempotent.
    fn cancel(&mut self);
}

/// Pick the voice for an utterance.
///
/// With more than one voice installed, the first network voice for
/// `language` wins. Otherwise the device default is used (`None`).
pub fn select_voice(voices: &[Voice], language: &str) -> Option<Voice> {
    if voices.len() < 2 {
        return None;
    }
    voices
        .iter()
        .find(|v| !v.local_service && normalize_lang(&v.lang) == normalize_lang(language))
        .cloned()
}

fn normalize_lang(tag: &str) -> String {
    tag.trim().replace('_', "-").to_ascii_lowercase()
}

/// Lifecycle of one playback request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// Nothing audible yet.
    #[default]
    Idle,
    Speaking,
    Ended,
    Failed,
}

/// The one active voice-output request.
#[derive(Debug, Clone)]
pub struct SpeechPlayback {
    pub id: PlaybackId,
    pub text: String,
    pub state: PlaybackState,
}

/// What a device event meant for the active playback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackUpdate {
    Started,
    Ended,
    Failed(String),
}

/// Owner of the synthesis device and its single active playback.
pub struct SpeechOutput {
    device: Option<Box<dyn SynthesisDevice>>,
    config: SpeechConfig,
    active: Option<SpeechPlayback>,
    next_id: u64,
}

impl SpeechOutput {
    pub fn new(device: Option<Box<dyn SynthesisDevice>>, config: &SpeechConfig) -> Self {
        Self {
            device,
            config: config.clone(),
            active: None,
            next_id: 1,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.device.as_ref().is_some_and(|d| d.is_available())
    }

    /// Whether a playback is alive (requested and not yet ended or failed).
    pub fn is_speaking(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&SpeechPlayback> {
        self.active.as_ref()
    }

    pub fn state(&self) -> PlaybackState {
        self.active.as_ref().map_or(PlaybackState::Idle, |p| p.state)
    }

    /// Cancel whatever is playing and start reading `text` aloud.
    ///
    /// # Errors
    ///
    /// [`KioskError::DeviceUnavailable`] without a usable device, or
    /// [`KioskError::Synthesis`] when the device rejects the utterance. In
    /// both cases nothing is left playing.
    pub fn speak(
        &mut self,
        text: &str,
        tx: &mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<PlaybackId> {
        self.cancel();

        let device = match self.device.as_mut() {
            Some(d) if d.is_available() => d,
            _ => {
                return Err(KioskError::DeviceUnavailable(
                    "speech synthesis is not supported on this platform".into(),
                ));
            }
        };

        let voice = select_voice(&device.voices(), &self.config.preferred_language);
        let id = PlaybackId(self.next_id);
        self.next_id += 1;

        let utterance = Utterance {
            text: text.to_owned(),
            voice,
            rate: self.config.rate,
            pitch: self.config.pitch,
        };
        device
            .speak(utterance, PlaybackSink::new(id, tx.clone()))
            .map_err(|e| match e {
                e @ KioskError::Synthesis(_) => e,
                other => KioskError::Synthesis(other.to_string()),
            })?;

        info!(%id, "speech requested ({} chars)", text.chars().count());
        self.active = Some(SpeechPlayback {
            id,
            text: text.to_owned(),
            state: PlaybackState::Idle,
        });
        Ok(id)
    }

    /// Stop playback unconditionally. Returns whether a playback was alive.
    pub fn cancel(&mut self) -> bool {
        if let Some(device) = self.device.as_mut() {
            device.cancel();
        }
        match self.active.take() {
            Some(playback) => {
                info!(id = %playback.id, "speech cancelled");
                true
            }
            None => false,
        }
    }

    /// Fold a device event into the active playback.
    ///
    /// Events for superseded playbacks return `None`.
    pub fn apply(&mut self, playback: PlaybackId, event: SynthesisEvent) -> Option<PlaybackUpdate> {
        let active = match self.active.as_mut() {
            Some(p) if p.id == playback => p,
            _ => {
                debug!(%playback, ?event, "dropping event for superseded playback");
                return None;
            }
        };

        match event {
            SynthesisEvent::Started => {
                active.state = PlaybackState::Speaking;
                Some(PlaybackUpdate::Started)
            }
            SynthesisEvent::Ended => {
                self.active = None;
                debug!(%playback, "speech ended");
                Some(PlaybackUpdate::Ended)
            }
            SynthesisEvent::Failed { reason } => {
                self.active = None;
                warn!(%playback, "speech failed: {reason}");
                Some(PlaybackUpdate::Failed(reason))
            }
        }
    }
}

/// Request sent to the platform side of a [`ChannelSynthesizer`].
#[derive(Debug)]
pub enum SynthesizerCommand {
    Speak {
        utterance: Utterance,
        sink: PlaybackSink,
    },
    Cancel,
}

/// Synthesis device backed by a channel to a platform bridge.
pub struct ChannelSynthesizer {
    voices: Vec<Voice>,
    tx: mpsc::UnboundedSender<SynthesizerCommand>,
}

impl ChannelSynthesizer {
    pub fn new(voices: Vec<Voice>) -> (Self, mpsc::UnboundedReceiver<SynthesizerCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { voices, tx }, rx)
    }
}

impl SynthesisDevice for ChannelSynthesizer {
    fn is_available(&self) -> bool {
        !self.tx.is_closed()
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn speak(&mut self, utterance: Utterance, sink: PlaybackSink) -> Result<()> {
        self.tx
            .send(SynthesizerCommand::Speak { utterance, sink })
            .map_err(|e| KioskError::Synthesis(format!("synthesizer bridge closed: {e}")))
    }

    fn cancel(&mut self) {
        let _ = self.tx.send(SynthesizerCommand::Cancel);
    }
}
