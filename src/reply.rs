//! Reply resolution: maps submitted user text to the bot's reply.
//!
//! The session controller only relies on the data-flow contract (exactly
//! one reply per request), never on how long resolution takes.

use crate::config::ReplyConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Produces the reply for one user input.
#[async_trait]
pub trait ReplyResolver: Send + Sync {
    /// Resolve `input` into reply text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::KioskError::Resolver`] if no reply can be produced.
    async fn resolve(&self, input: &str) -> Result<String>;
}

/// Stand-in resolver: answers with a route template after a fixed delay.
#[derive(Debug, Clone)]
pub struct RouteReplyResolver {
    latency: Duration,
    template: String,
}

impl RouteReplyResolver {
    pub fn new(latency: Duration, template: impl Into<String>) -> Self {
        Self {
            latency,
            template: template.into(),
        }
    }

    pub fn from_config(config: &ReplyConfig) -> Self {
        Self::new(Duration::from_millis(config.latency_ms), config.template.clone())
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }
}

impl Default for RouteReplyResolver {
    fn default() -> Self {
        Self::from_config(&ReplyConfig::default())
    }
}

#[async_trait]
impl ReplyResolver for RouteReplyResolver {
    async fn resolve(&self, input: &str) -> Result<String> {
        debug!("resolving reply for \"{input}\" in {:?}", self.latency);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        Ok(render_reply(&self.template, input))
    }
}

/// Substitute every `{input}` in `template` with `input`, verbatim.
pub fn render_reply(template: &str, input: &str) -> String {
    template.replace("{input}", input)
}
