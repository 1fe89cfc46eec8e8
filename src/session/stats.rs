use chrono::{DateTime, Utc};
use serde::Serialize;

use super::state::{LessonState, SessionMode, VoiceState};
use crate::config::Language;

/// Point-in-time view of a voice session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,

    pub mode: SessionMode,

    pub state: VoiceState,

    pub language: Language,

    /// Present in lesson mode only
    pub lesson: Option<LessonState>,

    /// Number of transcript entries so far
    pub transcript_entries: usize,

    /// Message of the most recent failure, cleared by the next request
    pub last_error: Option<String>,

    pub is_playing: bool,

    pub started_at: DateTime<Utc>,

    pub uptime_secs: f64,
}
