//! Synthesized-speech playback
//!
//! - `PlaybackController` owns the single active clip and its lifecycle events
//! - `ScrollSync` keeps a scrollable view in step with playback progress

mod clock;
mod controller;
mod scroll;

pub use clock::{
    PlayClock, PlaybackEvent, PlaybackEventKind, PlaybackId, PlaybackState, PlaybackStatus,
};
pub use controller::PlaybackController;
pub use scroll::{scroll_offset, ScrollContainer, ScrollSync};
