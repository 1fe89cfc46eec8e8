pub mod api;
pub mod audio;
pub mod camera;
pub mod config;
pub mod error;
pub mod http;
pub mod playback;
pub mod quiz;
pub mod sequencer;
pub mod session;

pub use api::BackendClient;
pub use audio::{
    AudioClip, AudioDeviceFactory, AudioFrame, AudioOutput, CaptureConstraints, CaptureSession,
    Microphone, MicrophoneSource,
};
pub use config::{Config, Language};
pub use error::{VoiceError, VoiceResult};
pub use http::{create_router, AppState};
pub use playback::{PlaybackController, PlaybackEvent, PlaybackId, ScrollContainer, ScrollSync};
pub use quiz::{QuizBackend, QuizRunState, QuizSession};
pub use sequencer::{RequestSequencer, Ticket};
pub use session::{
    BackendExchange, SessionConfig, SessionHandle, SessionMode, SessionSnapshot, VoiceSession,
    VoiceState,
};
