pub mod client;
pub mod messages;

pub use client::{decode_audio_base64, BackendClient};
pub use messages::{LessonId, LessonSummary, QuizQuestionMessage};
