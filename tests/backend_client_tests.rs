// Integration tests for the backend client
//
// A small axum app stands in for the inference backend on a random local
// port; every request body it sees is recorded for inspection.

mod common;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use common::{speech_frames, wav_bytes, MicProbe, MockMicrophone, MockOutput, OutputProbe};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use voice_tutor::api::LessonId;
use voice_tutor::audio::AudioClip;
use voice_tutor::session::{ChatExchange, LessonExchange, Role};
use voice_tutor::{
    BackendClient, Language, SessionConfig, SessionMode, VoiceError, VoiceSession, VoiceState,
};

#[derive(Clone, Default)]
struct Recorded {
    bodies: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl Recorded {
    fn push(&self, path: &str, body: &[u8]) {
        self.bodies
            .lock()
            .unwrap()
            .push((path.to_string(), body.to_vec()));
    }

    fn body(&self, path: &str) -> Option<String> {
        self.bodies
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(p, _)| p == path)
            .map(|(_, b)| String::from_utf8_lossy(b).into_owned())
    }
}

fn speech_base64() -> String {
    base64::engine::general_purpose::STANDARD.encode(wav_bytes(200))
}

async fn chat_audio(State(recorded): State<Recorded>, body: Bytes) -> Json<Value> {
    recorded.push("/chat/audio", &body);
    Json(json!({
        "user_text": "hello",
        "assistant_text": "hi",
        "audio_base64": speech_base64(),
    }))
}

async fn chat_text(Query(params): Query<HashMap<String, String>>) -> Response {
    let text = params.get("text").cloned().unwrap_or_default();
    match text.as_str() {
        "fail" => (StatusCode::BAD_REQUEST, "No speech detected in audio").into_response(),
        "silent failure" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "garbled" => (StatusCode::OK, "<html>oops</html>").into_response(),
        "nothing" => Json(json!({ "response": "" })).into_response(),
        _ => Json(json!({ "response": format!("echo: {}", text) })).into_response(),
    }
}

async fn lesson_start(State(recorded): State<Recorded>, body: Bytes) -> Json<Value> {
    recorded.push("/lesson/start", &body);
    Json(json!({ "response": "Welcome to fractions.", "audio_base64": speech_base64() }))
}

async fn lesson_text(State(recorded): State<Recorded>, body: Bytes) -> Json<Value> {
    recorded.push("/lesson/text", &body);
    Json(json!({ "assistant_text": "Next, halves.", "audio_base64": "" }))
}

async fn lessons() -> Json<Value> {
    Json(json!([
        { "id": 1, "title_en": "Fractions", "title_bn": "ভগ্নাংশ" },
        { "id": "geo-2", "title_en": "Shapes", "title_bn": "আকার" },
    ]))
}

async fn quiz(State(recorded): State<Recorded>, body: Bytes) -> Response {
    recorded.push("/lesson/quiz", &body);
    let request: Value = serde_json::from_slice(&body).unwrap_or_default();
    if request["topic"] == "missing" {
        return (StatusCode::NOT_FOUND, "").into_response();
    }
    Json(json!([{
        "question_en": "What is half of 4?",
        "question_bn": "৪ এর অর্ধেক কত?",
        "options_en": ["1", "2"],
        "options_bn": ["১", "২"],
        "correct_answer_en": "2",
        "correct_answer_bn": "২",
    }]))
    .into_response()
}

async fn tts(State(recorded): State<Recorded>, body: Bytes) -> Json<Value> {
    recorded.push("/tts", &body);
    Json(json!({ "audio_base64": speech_base64() }))
}

async fn fake_backend() -> Result<(BackendClient, Recorded)> {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/chat/audio", post(chat_audio))
        .route("/chat/text", post(chat_text))
        .route("/lesson/start", post(lesson_start))
        .route("/lesson/text", post(lesson_text))
        .route("/lessons", get(lessons))
        .route("/lesson/quiz", post(quiz))
        .route("/tts", post(tts))
        .with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let client = BackendClient::new(format!("http://{}/", addr), None)?;
    Ok((client, recorded))
}

async fn untranscribed_chat(State(recorded): State<Recorded>, body: Bytes) -> Json<Value> {
    recorded.push("/chat/audio", &body);
    Json(json!({
        "user_text": "",
        "assistant_text": "Could you say that again?",
        "audio_base64": speech_base64(),
    }))
}

async fn untranscribed_backend() -> Result<BackendClient> {
    let app = Router::new()
        .route("/chat/audio", post(untranscribed_chat))
        .with_state(Recorded::default());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(BackendClient::new(format!("http://{}/", addr), None)?)
}

fn clip() -> AudioClip {
    AudioClip::encode(&vec![500; 1600], 16000, 1).unwrap()
}

#[tokio::test]
async fn test_chat_audio_sends_form_and_language() -> Result<()> {
    let (client, recorded) = fake_backend().await?;

    let response = client.chat_audio(&clip(), Language::Bangla).await?;
    assert_eq!(response.user_text.as_deref(), Some("hello"));
    assert_eq!(response.assistant_text.as_deref(), Some("hi"));
    assert!(response.audio_base64.is_some());

    let body = recorded.body("/chat/audio").unwrap();
    assert!(body.contains("name=\"audio\""));
    assert!(body.contains("filename=\"audio.wav\""));
    assert!(body.contains("name=\"language_code\""));
    assert!(body.contains("bn-BD"));
    Ok(())
}

#[tokio::test]
async fn test_error_body_is_surfaced_verbatim() -> Result<()> {
    let (client, _) = fake_backend().await?;

    let err = client.chat_text("fail").await.unwrap_err();
    match &err {
        VoiceError::NetworkFailure { status, message } => {
            assert_eq!(*status, Some(400));
            assert_eq!(message, "No speech detected in audio");
        }
        other => panic!("expected a network failure, got {:?}", other),
    }
    assert_eq!(err.user_message(), "No speech detected in audio");
    Ok(())
}

#[tokio::test]
async fn test_empty_error_body_uses_fallback() -> Result<()> {
    let (client, _) = fake_backend().await?;

    let err = client.chat_text("silent failure").await.unwrap_err();
    assert_eq!(err.user_message(), "Failed to get response");

    let err = client.quiz("missing").await.unwrap_err();
    assert!(matches!(
        err,
        VoiceError::NetworkFailure {
            status: Some(404),
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn test_non_json_success_is_malformed() -> Result<()> {
    let (client, _) = fake_backend().await?;

    let err = client.chat_text("garbled").await.unwrap_err();
    assert!(matches!(err, VoiceError::MalformedResponse(_)));
    assert_eq!(
        err.user_message(),
        "Failed to process audio. Please try again."
    );
    Ok(())
}

#[tokio::test]
async fn test_unreachable_backend_is_a_network_failure() -> Result<()> {
    let client = BackendClient::new("http://127.0.0.1:9", None)?;
    let err = client.lessons().await.unwrap_err();
    assert!(err.is_network());
    Ok(())
}

#[tokio::test]
async fn test_catalog_quiz_and_tts() -> Result<()> {
    let (client, recorded) = fake_backend().await?;

    let lessons = client.lessons().await?;
    assert_eq!(lessons.len(), 2);
    assert_eq!(lessons[0].id, LessonId::Number(1));
    assert_eq!(lessons[1].id, LessonId::Text("geo-2".into()));
    assert_eq!(lessons[1].id.to_string(), "geo-2");

    let questions = client.quiz("fractions").await?;
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].correct_answer_en, "2");
    let body: Value = serde_json::from_str(&recorded.body("/lesson/quiz").unwrap())?;
    assert_eq!(body["topic"], "fractions");

    let speech = client.tts("Correct!", Language::English).await?;
    assert!(speech.audio_base64.is_some());
    let body: Value = serde_json::from_str(&recorded.body("/tts").unwrap())?;
    assert_eq!(body["text"], "Correct!");
    assert_eq!(body["language_code"], "en-US");
    Ok(())
}

#[tokio::test]
async fn test_chat_session_end_to_end() -> Result<()> {
    let (client, _) = fake_backend().await?;
    let output = OutputProbe::default();
    let mut session = VoiceSession::new(
        SessionConfig::new(SessionMode::Chat, Language::Bangla),
        Arc::new(ChatExchange::new(client)),
        Box::new(MockMicrophone::new(
            MicProbe::default(),
            speech_frames(3, 16000, 1),
        )),
        Box::new(MockOutput::new(output.clone())),
    );

    session.start_speaking().await?;
    session.stop_speaking().await?;
    session.settle().await;

    assert_eq!(session.state(), VoiceState::Idle);
    assert_eq!(session.last_error(), None);
    assert_eq!(output.started().len(), 1);

    session.send_text("how are you")?;
    session.settle().await;

    let transcript: Vec<_> = session
        .transcript()
        .iter()
        .map(|e| (e.role, e.text.clone()))
        .collect();
    assert_eq!(
        transcript,
        vec![
            (Role::User, "hello".to_string()),
            (Role::Assistant, "hi".to_string()),
            (Role::User, "how are you".to_string()),
            (Role::Assistant, "echo: how are you".to_string()),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn test_empty_chat_reply_is_reported() -> Result<()> {
    let (client, _) = fake_backend().await?;
    let mut session = VoiceSession::new(
        SessionConfig::new(SessionMode::Chat, Language::English),
        Arc::new(ChatExchange::new(client)),
        Box::new(MockMicrophone::new(MicProbe::default(), Vec::new())),
        Box::new(MockOutput::new(OutputProbe::default())),
    );

    session.send_text("nothing")?;
    session.settle().await;

    assert_eq!(session.state(), VoiceState::Idle);
    assert_eq!(
        session.last_error(),
        Some("Failed to process audio. Please try again.")
    );
    assert!(session.transcript().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_lesson_session_end_to_end() -> Result<()> {
    let (client, recorded) = fake_backend().await?;
    let mut session = VoiceSession::new(
        SessionConfig::new(SessionMode::Lesson, Language::English).with_topic("fractions"),
        Arc::new(LessonExchange::new(client, "fractions")),
        Box::new(MockMicrophone::new(MicProbe::default(), Vec::new())),
        Box::new(MockOutput::new(OutputProbe::default())),
    );

    session.start_lesson()?;
    session.settle().await;
    assert_eq!(session.lesson().current_text, "Welcome to fractions.");
    assert!(session.lesson().finished());

    let body: Value = serde_json::from_str(&recorded.body("/lesson/start").unwrap())?;
    assert_eq!(body["topic"], "fractions");
    assert_eq!(body["language_code"], "en-US");

    session.continue_lesson()?;
    session.settle().await;
    assert_eq!(session.lesson().current_text, "Next, halves.");

    let body: Value = serde_json::from_str(&recorded.body("/lesson/text").unwrap())?;
    assert_eq!(body["text"], "Yes, please continue.");
    Ok(())
}

#[tokio::test]
async fn test_blank_transcription_still_plays_reply() -> Result<()> {
    let client = untranscribed_backend().await?;
    let output = OutputProbe::default();
    let mut session = VoiceSession::new(
        SessionConfig::new(SessionMode::Chat, Language::English),
        Arc::new(ChatExchange::new(client)),
        Box::new(MockMicrophone::new(
            MicProbe::default(),
            speech_frames(3, 16000, 1),
        )),
        Box::new(MockOutput::new(output.clone())),
    );

    session.start_speaking().await?;
    session.stop_speaking().await?;
    session.settle().await;

    assert_eq!(session.last_error(), None);
    assert_eq!(output.started().len(), 1);
    let transcript: Vec<_> = session
        .transcript()
        .iter()
        .map(|e| (e.role, e.text.clone()))
        .collect();
    assert_eq!(
        transcript,
        vec![(Role::Assistant, "Could you say that again?".to_string())]
    );
    Ok(())
}
