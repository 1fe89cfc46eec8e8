use std::time::Duration;

use super::state::SessionMode;
use crate::audio::CaptureConstraints;
use crate::config::{Config, Language};

/// Configuration for one voice session (one page view)
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "session-1b4e28ba-...")
    pub session_id: String,

    /// Page binding this session drives
    pub mode: SessionMode,

    /// Interaction language, fixed for the life of the session
    pub language: Language,

    /// Lesson topic (lesson mode only)
    pub topic: Option<String>,

    /// How often scroll sync corrects the view while speaking
    /// Default: 50ms
    pub scroll_interval: Duration,

    /// Microphone constraints
    pub constraints: CaptureConstraints,
}

impl SessionConfig {
    pub fn new(mode: SessionMode, language: Language) -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            mode,
            language,
            topic: None,
            scroll_interval: Duration::from_millis(50),
            constraints: CaptureConstraints::default(),
        }
    }

    /// Derive from the loaded configuration
    pub fn from_config(config: &Config, mode: SessionMode) -> Self {
        Self {
            scroll_interval: Duration::from_millis(config.session.scroll_interval_ms),
            constraints: config.audio.constraints(),
            ..Self::new(mode, config.session.language)
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(SessionMode::Chat, Language::default())
    }
}
