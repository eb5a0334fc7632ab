//! Kiosk: voice-interactive conversation session for a tourist kiosk.
//!
//! A visitor types or speaks a destination, the assistant replies in the
//! chat log and reads the reply aloud, and any earlier reply can be replayed.
//!
//! # Architecture
//!
//! One controller owns all session state and handles events one at a time:
//! - **Capture**: a single speech-recognition session per utterance
//! - **Conversation log**: ordered user and bot messages plus a typing placeholder
//! - **Reply resolver**: turns submitted text into the bot's reply
//! - **Speech output**: one active playback, superseded by newer requests
//!
//! Platform devices report back through sinks tagged with the session they
//! belong to, so events from cancelled or superseded work are dropped.

pub mod audio;
pub mod config;
pub mod conversation;
pub mod error;
pub mod map;
pub mod pipeline;
pub mod reply;
pub mod runtime;

pub use config::KioskConfig;
pub use error::{KioskError, Result};
pub use pipeline::coordinator::{SessionController, SubmitOutcome};
pub use pipeline::handle::SessionHandle;
pub use runtime::{RenderState, RuntimeEvent};
