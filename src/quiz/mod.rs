//! Quiz mode
//!
//! - `QuizRunState` holds questions, score and the current selection
//! - `QuizSession` narrates questions and cues and drives auto-advance

mod model;
mod runner;

pub use model::{Advance, Feedback, Localized, Question, QuizRunState};
pub use runner::{Narration, QuizBackend, QuizEvent, QuizSession, QuizUpdate};
