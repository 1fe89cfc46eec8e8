use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the user may do next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceState {
    Idle,
    Recording,
    /// Waiting on the backend
    Processing,
    Playing,
    Paused,
}

impl fmt::Display for VoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VoiceState::Idle => "idle",
            VoiceState::Recording => "recording",
            VoiceState::Processing => "processing",
            VoiceState::Playing => "playing",
            VoiceState::Paused => "paused",
        };
        f.write_str(name)
    }
}

/// Which page binding a session serves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Chat,
    Lesson,
    Objects,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionMode::Chat => "chat",
            SessionMode::Lesson => "lesson",
            SessionMode::Objects => "objects",
        };
        f.write_str(name)
    }
}

/// Where the current lesson segment stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentProgress {
    #[default]
    NotStarted,
    Narrating,
    /// Stopped by the user mid-segment; resumable
    Interrupted,
    /// Ended naturally; ready for the next segment
    Finished,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonState {
    pub started: bool,
    pub current_text: String,
    pub segment: SegmentProgress,
}

impl LessonState {
    pub fn paused(&self) -> bool {
        self.segment == SegmentProgress::Interrupted
    }

    pub fn finished(&self) -> bool {
        self.segment == SegmentProgress::Finished
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One line of the displayed conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            at: Utc::now(),
        }
    }
}
