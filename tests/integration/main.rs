//! Integration test binary -- all integration tests consolidated into a single
//! binary to keep link time down.

// Allow unwrap/expect in test code
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod helpers;

mod config_driven_session;
mod session_flow;
