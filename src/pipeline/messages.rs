//! Message types carried on the session controller's event queue.

use crate::error::Result;
use std::fmt;

/// Identifies one capture session. Events tagged with a stale id are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CaptureId(pub u64);

/// Identifies one speech playback request. Last request wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackId(pub u64);

/// Identifies one reply request issued to the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReplyId(pub u64);

impl fmt::Display for CaptureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capture-{}", self.0)
    }
}

impl fmt::Display for PlaybackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "playback-{}", self.0)
    }
}

impl fmt::Display for ReplyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reply-{}", self.0)
    }
}

/// Raw event reported by a speech recognition device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// The microphone is open.
    Started,
    /// Every result segment recognized so far in this session.
    Result {
        segments: Vec<String>,
        /// The transcript is authoritative and ends the session.
        is_final: bool,
    },
    /// Device failure. Ends the session.
    Error { reason: String },
    /// The device stopped listening.
    Ended,
}

/// Raw lifecycle event reported by a speech synthesis device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisEvent {
    Started,
    Ended,
    Failed { reason: String },
}

/// Everything the controller reacts to besides user commands.
#[derive(Debug)]
pub enum SessionEvent {
    Recognition {
        capture: CaptureId,
        event: RecognitionEvent,
    },
    Synthesis {
        playback: PlaybackId,
        event: SynthesisEvent,
    },
    ReplyResolved {
        reply: ReplyId,
        result: Result<String>,
    },
}
