use serde::{Deserialize, Serialize};
use std::fmt;

/// Reply of `POST /chat/audio`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatAudioResponse {
    pub user_text: Option<String>,
    pub assistant_text: Option<String>,
    pub audio_base64: Option<String>,
}

/// Reply of `POST /chat/text`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTextResponse {
    pub response: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LessonStartRequest<'a> {
    pub topic: &'a str,
    pub language_code: &'a str,
}

#[derive(Debug, Serialize)]
pub struct LessonTextRequest<'a> {
    pub text: &'a str,
    pub topic: &'a str,
    pub language_code: &'a str,
}

/// Reply of the lesson endpoints; text comes as `assistant_text` or `response`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonResponse {
    pub assistant_text: Option<String>,
    pub response: Option<String>,
    pub audio_base64: Option<String>,
}

impl LessonResponse {
    pub fn text(&self) -> Option<&str> {
        self.assistant_text
            .as_deref()
            .or(self.response.as_deref())
            .filter(|t| !t.trim().is_empty())
    }
}

/// Reply carrying synthesized audio only (`/tts`, `/objects/detect`, `/lesson/audio`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioResponse {
    pub audio_base64: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TtsRequest<'a> {
    pub text: &'a str,
    pub language_code: &'a str,
}

#[derive(Debug, Serialize)]
pub struct QuizRequest<'a> {
    pub topic: &'a str,
}

/// Lesson ids come back as strings or numbers depending on the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LessonId {
    Number(i64),
    Text(String),
}

impl fmt::Display for LessonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LessonId::Number(n) => write!(f, "{}", n),
            LessonId::Text(s) => f.write_str(s),
        }
    }
}

/// One entry of `GET /lessons`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LessonSummary {
    pub id: LessonId,
    pub title_en: String,
    pub title_bn: String,
}

/// One entry of `POST /lesson/quiz`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestionMessage {
    pub question_en: String,
    pub question_bn: String,
    pub options_en: Vec<String>,
    pub options_bn: Vec<String>,
    pub correct_answer_en: String,
    pub correct_answer_bn: String,
}
