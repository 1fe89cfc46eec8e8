//! Page bindings between a voice session and the backend

use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use crate::api::{decode_audio_base64, BackendClient};
use crate::audio::AudioClip;
use crate::camera::Camera;
use crate::config::Language;
use crate::error::{VoiceError, VoiceResult};
use crate::sequencer::Ticket;

/// What a session sends to the backend
#[derive(Debug, Clone)]
pub enum Outgoing {
    /// Open a lesson
    Start,
    /// A typed message
    Text(String),
    /// Ask the lesson to go on to its next segment
    Continue,
    /// A finished recording
    Audio(AudioClip),
}

impl Outgoing {
    pub fn kind(&self) -> OutgoingKind {
        match self {
            Outgoing::Start => OutgoingKind::Start,
            Outgoing::Text(_) => OutgoingKind::Text,
            Outgoing::Continue => OutgoingKind::Continue,
            Outgoing::Audio(_) => OutgoingKind::Audio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutgoingKind {
    Start,
    Text,
    Continue,
    Audio,
}

#[derive(Debug, Clone)]
pub struct ExchangeRequest {
    pub payload: Outgoing,
    pub language: Language,
    pub ticket: Ticket,
}

/// Text and/or synthesized audio returned for one request
#[derive(Debug, Clone, Default)]
pub struct ExchangeReply {
    pub user_text: Option<String>,
    pub assistant_text: Option<String>,
    /// Decoded container bytes, ready for playback
    pub audio: Option<Vec<u8>>,
}

/// The backend contract a session talks through
#[async_trait::async_trait]
pub trait BackendExchange: Send + Sync {
    /// Runs before the microphone is opened; a failure aborts the capture attempt
    async fn before_capture(&self, _language: Language) -> VoiceResult<()> {
        Ok(())
    }

    async fn exchange(&self, request: ExchangeRequest) -> VoiceResult<ExchangeReply>;

    fn name(&self) -> &str;
}

/// Affirmative cue sent when the learner asks the lesson to go on
pub fn continue_cue(language: Language) -> &'static str {
    language.pick("হ্যাঁ, চালিয়ে যাও।", "Yes, please continue.")
}

fn missing(name: &str) -> VoiceError {
    VoiceError::MalformedResponse(format!("missing {}", name))
}

fn required(field: Option<String>, name: &str) -> VoiceResult<String> {
    field
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| missing(name))
}

/// Free-form conversation
pub struct ChatExchange {
    client: BackendClient,
}

impl ChatExchange {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl BackendExchange for ChatExchange {
    async fn exchange(&self, request: ExchangeRequest) -> VoiceResult<ExchangeReply> {
        match request.payload {
            Outgoing::Audio(clip) => {
                let response = self.client.chat_audio(&clip, request.language).await?;
                Ok(ExchangeReply {
                    user_text: Some(
                        response
                            .user_text
                            .ok_or_else(|| missing("user_text"))?,
                    ),
                    assistant_text: Some(required(response.assistant_text, "assistant_text")?),
                    audio: decode_audio_base64(response.audio_base64.as_deref())?,
                })
            }
            Outgoing::Text(text) => {
                let response = self.client.chat_text(&text).await?;
                Ok(ExchangeReply {
                    user_text: None,
                    assistant_text: Some(required(response.response, "response")?),
                    audio: None,
                })
            }
            other => Err(VoiceError::Unsupported(format!(
                "chat cannot send {:?}",
                other.kind()
            ))),
        }
    }

    fn name(&self) -> &str {
        "chat"
    }
}

/// Narrated lesson on one topic
pub struct LessonExchange {
    client: BackendClient,
    topic: String,
}

impl LessonExchange {
    pub fn new(client: BackendClient, topic: impl Into<String>) -> Self {
        Self {
            client,
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait::async_trait]
impl BackendExchange for LessonExchange {
    async fn exchange(&self, request: ExchangeRequest) -> VoiceResult<ExchangeReply> {
        let language = request.language;
        let response = match &request.payload {
            Outgoing::Start => self.client.lesson_start(&self.topic, language).await?,
            Outgoing::Text(text) => self.client.lesson_text(text, &self.topic, language).await?,
            Outgoing::Continue => {
                self.client
                    .lesson_text(continue_cue(language), &self.topic, language)
                    .await?
            }
            Outgoing::Audio(clip) => self.client.lesson_audio(clip, &self.topic, language).await?,
        };

        debug!(
            "Lesson reply for {} (text: {}, audio: {})",
            request.ticket,
            response.text().is_some(),
            response.audio_base64.is_some()
        );

        Ok(ExchangeReply {
            user_text: None,
            assistant_text: response.text().map(str::to_string),
            audio: decode_audio_base64(response.audio_base64.as_deref())?,
        })
    }

    fn name(&self) -> &str {
        "lesson"
    }
}

/// Spoken question about what the camera sees
pub struct ObjectsExchange {
    client: BackendClient,
    camera: Arc<dyn Camera>,
    frame: Mutex<Option<Vec<u8>>>,
}

impl ObjectsExchange {
    pub fn new(client: BackendClient, camera: Arc<dyn Camera>) -> Self {
        Self {
            client,
            camera,
            frame: Mutex::new(None),
        }
    }

    fn camera_off() -> VoiceError {
        VoiceError::PermissionDenied("Please turn on the camera first.".to_string())
    }
}

#[async_trait::async_trait]
impl BackendExchange for ObjectsExchange {
    /// Snapshot the frame the question will be about
    async fn before_capture(&self, _language: Language) -> VoiceResult<()> {
        let frame = self.camera.capture_frame().await?.ok_or_else(Self::camera_off)?;
        info!(
            "Snapshot from camera {} ({} bytes)",
            self.camera.name(),
            frame.len()
        );
        *self.frame.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame);
        Ok(())
    }

    async fn exchange(&self, request: ExchangeRequest) -> VoiceResult<ExchangeReply> {
        let Outgoing::Audio(clip) = request.payload else {
            return Err(VoiceError::Unsupported(
                "object identification only takes recordings".to_string(),
            ));
        };

        let frame = self
            .frame
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(Self::camera_off)?;

        let response = self
            .client
            .detect_objects(&clip, frame, request.language)
            .await?;

        Ok(ExchangeReply {
            user_text: None,
            assistant_text: None,
            audio: decode_audio_base64(response.audio_base64.as_deref())?,
        })
    }

    fn name(&self) -> &str {
        "objects"
    }
}
