// Shared test doubles for the integration tests
//
// Devices record what was opened and released so tests can check that
// hardware streams and playback clips never leak.

#![allow(dead_code)]

use std::collections::HashSet;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

use voice_tutor::api::QuizQuestionMessage;
use voice_tutor::audio::{AudioFrame, AudioOutput, CaptureConstraints, DecodedAudio, Microphone};
use voice_tutor::playback::{PlaybackId, ScrollContainer};
use voice_tutor::quiz::QuizBackend;
use voice_tutor::session::{BackendExchange, ExchangeReply, ExchangeRequest, Outgoing, OutgoingKind};
use voice_tutor::{Language, Ticket, VoiceError, VoiceResult};

// ============================================================================
// Audio payloads
// ============================================================================

/// A mono 16kHz WAV clip of the given length
pub fn wav_bytes(duration_ms: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..(16 * duration_ms) {
            let t = i as f32 / 16000.0;
            let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 8000.0;
            writer.write_sample(sample as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// `count` frames of 100ms each
pub fn speech_frames(count: usize, sample_rate: u32, channels: u16) -> Vec<AudioFrame> {
    let len = (sample_rate / 10) as usize * channels as usize;
    (0..count)
        .map(|i| AudioFrame {
            samples: vec![1000; len],
            sample_rate,
            channels,
            timestamp_ms: i as u64 * 100,
        })
        .collect()
}

// ============================================================================
// Microphone
// ============================================================================

#[derive(Clone, Default)]
pub struct MicProbe {
    open_streams: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
}

impl MicProbe {
    /// Hardware streams held right now
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    /// Successful opens so far
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

/// Microphone that hands out a fixed set of frames on every open
pub struct MockMicrophone {
    probe: MicProbe,
    frames: Vec<AudioFrame>,
    deny: bool,
    tx: Option<mpsc::Sender<AudioFrame>>,
}

impl MockMicrophone {
    pub fn new(probe: MicProbe, frames: Vec<AudioFrame>) -> Self {
        Self {
            probe,
            frames,
            deny: false,
            tx: None,
        }
    }

    pub fn denied(probe: MicProbe) -> Self {
        let mut mic = Self::new(probe, Vec::new());
        mic.deny = true;
        mic
    }
}

#[async_trait::async_trait]
impl Microphone for MockMicrophone {
    async fn open(
        &mut self,
        _constraints: &CaptureConstraints,
    ) -> VoiceResult<mpsc::Receiver<AudioFrame>> {
        if self.deny {
            return Err(VoiceError::PermissionDenied(
                "Microphone access denied. Please allow microphone access.".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(self.frames.len().max(1));
        for frame in &self.frames {
            tx.try_send(frame.clone()).unwrap();
        }
        if self.tx.replace(tx).is_none() {
            self.probe.open_streams.fetch_add(1, Ordering::SeqCst);
        }
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        Ok(rx)
    }

    fn close(&mut self) {
        if self.tx.take().is_some() {
            self.probe.open_streams.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_open(&self) -> bool {
        self.tx.is_some()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

impl Drop for MockMicrophone {
    fn drop(&mut self) {
        self.close();
    }
}

// ============================================================================
// Output
// ============================================================================

#[derive(Clone, Default)]
pub struct OutputProbe {
    live: Arc<Mutex<HashSet<PlaybackId>>>,
    started: Arc<Mutex<Vec<PlaybackId>>>,
    unknown_releases: Arc<AtomicUsize>,
}

impl OutputProbe {
    /// Clips started and not yet released
    pub fn live(&self) -> usize {
        self.live.lock().unwrap().len()
    }

    pub fn started(&self) -> Vec<PlaybackId> {
        self.started.lock().unwrap().clone()
    }

    /// Release calls for ids the output never accepted or already freed
    pub fn unknown_releases(&self) -> usize {
        self.unknown_releases.load(Ordering::SeqCst)
    }
}

pub struct MockOutput {
    probe: OutputProbe,
    reject: bool,
}

impl MockOutput {
    pub fn new(probe: OutputProbe) -> Self {
        Self {
            probe,
            reject: false,
        }
    }

    /// Refuses every clip, like a blocked autoplay
    pub fn rejecting(probe: OutputProbe) -> Self {
        Self {
            probe,
            reject: true,
        }
    }
}

#[async_trait::async_trait]
impl AudioOutput for MockOutput {
    async fn start(&mut self, id: PlaybackId, _clip: Arc<DecodedAudio>) -> VoiceResult<()> {
        if self.reject {
            return Err(VoiceError::PlaybackRejected("autoplay blocked".to_string()));
        }
        self.probe.live.lock().unwrap().insert(id);
        self.probe.started.lock().unwrap().push(id);
        Ok(())
    }

    fn pause(&mut self, _id: PlaybackId) {}

    async fn resume(&mut self, id: PlaybackId) -> VoiceResult<()> {
        if self.probe.live.lock().unwrap().contains(&id) {
            Ok(())
        } else {
            Err(VoiceError::PlaybackRejected(format!("{} was released", id)))
        }
    }

    fn release(&mut self, id: PlaybackId) {
        if !self.probe.live.lock().unwrap().remove(&id) {
            self.probe.unknown_releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ============================================================================
// Backend exchange
// ============================================================================

/// A request the test answers by hand
pub struct PendingExchange {
    pub kind: OutgoingKind,
    pub text: Option<String>,
    pub ticket: Ticket,
    pub language: Language,
    reply: oneshot::Sender<VoiceResult<ExchangeReply>>,
}

impl PendingExchange {
    pub fn respond(self, result: VoiceResult<ExchangeReply>) {
        let _ = self.reply.send(result);
    }
}

/// Exchange whose replies are released by the test, in any order
pub struct ScriptedExchange {
    requests: mpsc::UnboundedSender<PendingExchange>,
}

impl ScriptedExchange {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<PendingExchange>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { requests: tx }), rx)
    }
}

#[async_trait::async_trait]
impl BackendExchange for ScriptedExchange {
    async fn exchange(&self, request: ExchangeRequest) -> VoiceResult<ExchangeReply> {
        let (tx, rx) = oneshot::channel();
        let text = match &request.payload {
            Outgoing::Text(text) => Some(text.clone()),
            _ => None,
        };
        let pending = PendingExchange {
            kind: request.payload.kind(),
            text,
            ticket: request.ticket,
            language: request.language,
            reply: tx,
        };
        self.requests
            .send(pending)
            .map_err(|_| VoiceError::SessionClosed)?;
        rx.await.unwrap_or(Err(VoiceError::SessionClosed))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn reply(
    user_text: Option<&str>,
    assistant_text: Option<&str>,
    audio: Option<Vec<u8>>,
) -> ExchangeReply {
    ExchangeReply {
        user_text: user_text.map(str::to_string),
        assistant_text: assistant_text.map(str::to_string),
        audio,
    }
}

// ============================================================================
// Quiz backend
// ============================================================================

pub fn quiz_question(n: usize) -> QuizQuestionMessage {
    QuizQuestionMessage {
        question_en: format!("Question {}?", n),
        question_bn: format!("প্রশ্ন {}?", n),
        options_en: vec!["Right".into(), "Wrong".into()],
        options_bn: vec!["ঠিক".into(), "ভুল".into()],
        correct_answer_en: "Right".into(),
        correct_answer_bn: "ঠিক".into(),
    }
}

pub struct MockQuizBackend {
    questions: VoiceResult<Vec<QuizQuestionMessage>>,
    spoken: Mutex<Vec<String>>,
    clip_ms: u32,
}

impl MockQuizBackend {
    pub fn with_questions(count: usize) -> Arc<Self> {
        Arc::new(Self {
            questions: Ok((1..=count).map(quiz_question).collect()),
            spoken: Mutex::new(Vec::new()),
            clip_ms: 200,
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            questions: Err(VoiceError::network(Some(404), "Quiz not found")),
            spoken: Mutex::new(Vec::new()),
            clip_ms: 200,
        })
    }

    /// Every text sent for synthesis, in order
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl QuizBackend for MockQuizBackend {
    async fn questions(&self, _topic: &str) -> VoiceResult<Vec<QuizQuestionMessage>> {
        match &self.questions {
            Ok(questions) => Ok(questions.clone()),
            Err(e) => Err(VoiceError::network(None, e.to_string())),
        }
    }

    async fn speak(&self, text: &str, _language: Language) -> VoiceResult<Option<Vec<u8>>> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(Some(wav_bytes(self.clip_ms)))
    }
}

// ============================================================================
// Scroll container
// ============================================================================

pub struct MockContainer {
    scroll_height: f64,
    client_height: f64,
    top: Mutex<f64>,
    writes: AtomicUsize,
}

impl MockContainer {
    pub fn new(scroll_height: f64, client_height: f64) -> Arc<Self> {
        Arc::new(Self {
            scroll_height,
            client_height,
            top: Mutex::new(0.0),
            writes: AtomicUsize::new(0),
        })
    }

    pub fn top(&self) -> f64 {
        *self.top.lock().unwrap()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl ScrollContainer for MockContainer {
    fn scroll_height(&self) -> f64 {
        self.scroll_height
    }

    fn client_height(&self) -> f64 {
        self.client_height
    }

    fn set_scroll_top(&self, top: f64) {
        *self.top.lock().unwrap() = top;
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}
