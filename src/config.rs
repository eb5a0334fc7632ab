//! Configuration types for the kiosk conversation session.

use crate::map::MapRegion;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration for the kiosk session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// Speech-to-text capture settings.
    pub capture: CaptureConfig,
    /// Text-to-speech output settings.
    pub speech: SpeechConfig,
    /// Reply resolver settings.
    pub reply: ReplyConfig,
    /// Conversation log and event plumbing settings.
    pub conversation: ConversationConfig,
    /// Fixed region shown by the map panel.
    pub map: MapRegion,
}

/// Utterance capture configuration, forwarded to the recognition device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// BCP-47 recognition language.
    pub language: String,
    /// Whether the device should report interim (non-final) results.
    pub interim_results: bool,
    /// Keep listening after the first final result.
    ///
    /// The session controller still ends the capture session on the first
    /// final result; this only affects how the device is opened.
    pub continuous: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_owned(),
            interim_results: true,
            continuous: false,
        }
    }
}

/// Speech output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Language of the preferred (non-local) voice.
    pub preferred_language: String,
    /// Speaking rate multiplier.
    pub rate: f32,
    /// Pitch multiplier.
    pub pitch: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            preferred_language: "en-US".to_owned(),
            rate: 1.0,
            pitch: 1.0,
        }
    }
}

/// Reply resolver configuration for the built-in stand-in resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyConfig {
    /// Fixed latency before the reply is delivered, in milliseconds.
    pub latency_ms: u64,
    /// Reply template. `{input}` is replaced with the submitted text.
    pub template: String,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            latency_ms: 1500,
            template:
                "I'll help you find the best route to {input}. Please check the map for directions."
                    .to_owned(),
        }
    }
}

/// Conversation log and event plumbing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    /// Bot message seeded into a fresh log, if any.
    pub greeting: Option<String>,
    /// Text carried by the typing placeholder.
    pub placeholder_text: String,
    /// Capacity of the runtime event broadcast channel.
    pub runtime_event_capacity: usize,
    /// Capacity of the session command channel.
    pub command_capacity: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            greeting: None,
            placeholder_text: "...".to_owned(),
            runtime_event_capacity: 64,
            command_capacity: 32,
        }
    }
}

/// Greeting used by the kiosk front desk deployment.
pub const KIOSK_GREETING: &str =
    "Welcome to the Tourism Kiosk! 👋 How can I help you explore our city today?";

impl KioskConfig {
    /// Load configuration from a TOML file, falling back to defaults for missing fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the map
    /// region is inconsistent.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::KioskError::Config(e.to_string()))?;
        config.map.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &std::path::Path) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::KioskError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/kiosk/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("kiosk").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("kiosk")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/kiosk-config/config.toml")
        }
    }
}
