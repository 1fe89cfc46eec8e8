//! Voice session management
//!
//! This module provides the `VoiceSession` state machine that manages:
//! - Microphone capture (start/stop speaking, barge-in)
//! - Backend exchanges through a page-specific `BackendExchange` binding
//! - Stale-reply suppression via request tickets
//! - Playback, interrupt/resume and scroll sync
//! - Transcript and lesson progress

mod config;
mod driver;
mod exchange;
mod session;
mod state;
mod stats;

pub use config::SessionConfig;
pub use driver::{spawn, SessionHandle};
pub use exchange::{
    continue_cue, BackendExchange, ChatExchange, ExchangeReply, ExchangeRequest, LessonExchange,
    ObjectsExchange, Outgoing, OutgoingKind,
};
pub use session::{Completion, SessionEvent, SessionUpdate, VoiceSession};
pub use state::{LessonState, Role, SegmentProgress, SessionMode, TranscriptEntry, VoiceState};
pub use stats::SessionSnapshot;
