//! HTTP API server for driving the voice session from a UI shell
//!
//! This module provides a REST API for one voice session:
//! - POST /voice/speak/start, /voice/speak/stop - Record and send
//! - POST /voice/text - Send a typed message
//! - POST /voice/lesson/start, /voice/lesson/continue - Lesson narration
//! - POST /voice/interrupt, /voice/resume - Pause and continue speech
//! - GET /voice/status, /voice/transcript - Query the session
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
