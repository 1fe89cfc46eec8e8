use base64::Engine;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::messages::{
    AudioResponse, ChatAudioResponse, ChatTextResponse, LessonResponse, LessonStartRequest,
    LessonSummary, LessonTextRequest, QuizQuestionMessage, QuizRequest, TtsRequest,
};
use crate::audio::AudioClip;
use crate::config::{BackendConfig, Language};
use crate::error::{VoiceError, VoiceResult};

/// HTTP client for the inference backend
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> VoiceResult<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(format!("voice-tutor/{}", env!("CARGO_PKG_VERSION")));

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder.build().map_err(|e| {
            VoiceError::network(None, format!("Failed to initialize HTTP client: {}", e))
        })?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Backend client ready: {}", base_url);

        Ok(Self { http, base_url })
    }

    pub fn from_config(config: &BackendConfig) -> VoiceResult<Self> {
        Self::new(config.base_url(), config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// POST /chat/audio
    pub async fn chat_audio(
        &self,
        clip: &AudioClip,
        language: Language,
    ) -> VoiceResult<ChatAudioResponse> {
        let form = Form::new()
            .part("audio", audio_part(clip)?)
            .text("language_code", language.code());

        debug!("POST /chat/audio ({} bytes)", clip.bytes.len());
        let response = self
            .http
            .post(self.url("/chat/audio"))
            .multipart(form)
            .send()
            .await?;

        read_json(response, "Failed to process audio").await
    }

    /// POST /chat/text?text=
    pub async fn chat_text(&self, text: &str) -> VoiceResult<ChatTextResponse> {
        debug!("POST /chat/text");
        let response = self
            .http
            .post(self.url("/chat/text"))
            .query(&[("text", text)])
            .send()
            .await?;

        read_json(response, "Failed to get response").await
    }

    /// POST /lesson/start
    pub async fn lesson_start(&self, topic: &str, language: Language) -> VoiceResult<LessonResponse> {
        debug!("POST /lesson/start (topic={})", topic);
        let response = self
            .http
            .post(self.url("/lesson/start"))
            .json(&LessonStartRequest {
                topic,
                language_code: language.code(),
            })
            .send()
            .await?;

        read_json(response, "Failed to start lesson").await
    }

    /// POST /lesson/text
    pub async fn lesson_text(
        &self,
        text: &str,
        topic: &str,
        language: Language,
    ) -> VoiceResult<LessonResponse> {
        debug!("POST /lesson/text (topic={})", topic);
        let response = self
            .http
            .post(self.url("/lesson/text"))
            .json(&LessonTextRequest {
                text,
                topic,
                language_code: language.code(),
            })
            .send()
            .await?;

        read_json(response, "Failed to send message").await
    }

    /// POST /lesson/audio
    pub async fn lesson_audio(
        &self,
        clip: &AudioClip,
        topic: &str,
        language: Language,
    ) -> VoiceResult<LessonResponse> {
        let form = Form::new()
            .part("audio", audio_part(clip)?)
            .text("topic", topic.to_string())
            .text("language_code", language.code());

        debug!("POST /lesson/audio ({} bytes)", clip.bytes.len());
        let response = self
            .http
            .post(self.url("/lesson/audio"))
            .multipart(form)
            .send()
            .await?;

        read_json(response, "Failed to process audio").await
    }

    /// GET /lessons
    pub async fn lessons(&self) -> VoiceResult<Vec<LessonSummary>> {
        let response = self.http.get(self.url("/lessons")).send().await?;
        read_json(response, "Failed to load lessons").await
    }

    /// POST /lesson/quiz
    pub async fn quiz(&self, topic: &str) -> VoiceResult<Vec<QuizQuestionMessage>> {
        debug!("POST /lesson/quiz (topic={})", topic);
        let response = self
            .http
            .post(self.url("/lesson/quiz"))
            .json(&QuizRequest { topic })
            .send()
            .await?;

        read_json(response, "Quiz not found").await
    }

    /// POST /tts
    pub async fn tts(&self, text: &str, language: Language) -> VoiceResult<AudioResponse> {
        let response = self
            .http
            .post(self.url("/tts"))
            .json(&TtsRequest {
                text,
                language_code: language.code(),
            })
            .send()
            .await?;

        read_json(response, "Failed to synthesize speech").await
    }

    /// POST /objects/detect
    pub async fn detect_objects(
        &self,
        clip: &AudioClip,
        image_jpeg: Vec<u8>,
        language: Language,
    ) -> VoiceResult<AudioResponse> {
        let image = Part::bytes(image_jpeg)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")
            .map_err(|e| VoiceError::network(None, e.to_string()))?;
        let form = Form::new()
            .part("audio", audio_part(clip)?)
            .part("image", image)
            .text("language_code", language.code());

        debug!("POST /objects/detect ({} bytes audio)", clip.bytes.len());
        let response = self
            .http
            .post(self.url("/objects/detect"))
            .multipart(form)
            .send()
            .await?;

        read_json(response, "Failed to process audio").await
    }
}

fn audio_part(clip: &AudioClip) -> VoiceResult<Part> {
    Part::bytes(clip.bytes.clone())
        .file_name(AudioClip::FILE_NAME)
        .mime_str(AudioClip::MIME_TYPE)
        .map_err(|e| VoiceError::network(None, e.to_string()))
}

/// Parse a 2xx body, or surface a non-2xx body verbatim as the failure message
async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    fallback: &str,
) -> VoiceResult<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!("Backend returned {}: {}", status, body);
        let message = if body.trim().is_empty() {
            fallback.to_string()
        } else {
            body
        };
        return Err(VoiceError::network(Some(status.as_u16()), message));
    }

    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| VoiceError::MalformedResponse(e.to_string()))
}

/// Decode an optional `audio_base64` field; absent or empty means no audio
pub fn decode_audio_base64(field: Option<&str>) -> VoiceResult<Option<Vec<u8>>> {
    match field.map(str::trim) {
        None | Some("") => Ok(None),
        Some(encoded) => Ok(Some(
            base64::engine::general_purpose::STANDARD.decode(encoded)?,
        )),
    }
}
