//! Speech devices: recognition (capture) and synthesis (playback).

pub mod capture;
pub mod playback;
