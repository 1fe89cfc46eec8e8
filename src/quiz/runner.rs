use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::model::{Advance, Feedback, Question, QuizRunState};
use crate::api::{decode_audio_base64, BackendClient, QuizQuestionMessage};
use crate::audio::AudioOutput;
use crate::config::Language;
use crate::error::{VoiceError, VoiceResult};
use crate::playback::{PlaybackController, PlaybackEvent, PlaybackEventKind, PlaybackId};
use crate::sequencer::{RequestSequencer, Ticket};

const QUIZ_UNAVAILABLE: &str = "Quiz not available for this lesson.";
const NO_QUESTIONS: &str = "No questions found.";

/// Backend calls a quiz needs
#[async_trait::async_trait]
pub trait QuizBackend: Send + Sync {
    async fn questions(&self, topic: &str) -> VoiceResult<Vec<QuizQuestionMessage>>;

    /// Synthesize `text`; `None` when the backend returned no audio
    async fn speak(&self, text: &str, language: Language) -> VoiceResult<Option<Vec<u8>>>;
}

#[async_trait::async_trait]
impl QuizBackend for BackendClient {
    async fn questions(&self, topic: &str) -> VoiceResult<Vec<QuizQuestionMessage>> {
        self.quiz(topic).await
    }

    async fn speak(&self, text: &str, language: Language) -> VoiceResult<Option<Vec<u8>>> {
        let response = self.tts(text, language).await?;
        decode_audio_base64(response.audio_base64.as_deref())
    }
}

/// Synthesized speech for one narration request
#[derive(Debug)]
pub struct Narration {
    pub ticket: Ticket,
    pub result: VoiceResult<Option<Vec<u8>>>,
}

#[derive(Debug)]
pub enum QuizEvent {
    Narration(Narration),
    /// The advance timer of this cycle fired
    Advance(u64),
    Playback(PlaybackEvent),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizUpdate {
    Narrating { ticket: Ticket, id: PlaybackId },
    NarrationDiscarded { ticket: Ticket },
    NarrationFailed { message: String },
    /// Moved on to this (zero-based) question
    Advanced { index: usize },
    Finished { score: u32, total: usize },
    PlaybackEnded(PlaybackId),
    Ignored,
}

/// Quiz mode: narration follows question content instead of the microphone
///
/// Every question change, answer cue and result reveal is one ticket-guarded
/// TTS fetch-and-play; a newer narration always supersedes an older one. The
/// advance timer is a spawned sleep tagged with a cycle number, so a timer
/// from a cycle that has since been reset is ignored.
pub struct QuizSession {
    backend: Arc<dyn QuizBackend>,
    language: Language,
    advance_delay: Duration,
    run: QuizRunState,
    playback: PlaybackController,
    playback_rx: mpsc::UnboundedReceiver<PlaybackEvent>,
    narration_tx: mpsc::UnboundedSender<Narration>,
    narration_rx: mpsc::UnboundedReceiver<Narration>,
    timer_tx: mpsc::UnboundedSender<u64>,
    timer_rx: mpsc::UnboundedReceiver<u64>,
    timer: Option<JoinHandle<()>>,
    cycle: u64,
    sequencer: RequestSequencer,
    pending: Option<Ticket>,
    last_error: Option<String>,
}

impl QuizSession {
    pub fn new(
        backend: Arc<dyn QuizBackend>,
        output: Box<dyn AudioOutput>,
        language: Language,
        advance_delay: Duration,
    ) -> Self {
        let (playback, playback_rx) = PlaybackController::new(output);
        let (narration_tx, narration_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        Self {
            backend,
            language,
            advance_delay,
            run: QuizRunState::default(),
            playback,
            playback_rx,
            narration_tx,
            narration_rx,
            timer_tx,
            timer_rx,
            timer: None,
            cycle: 0,
            sequencer: RequestSequencer::new(),
            pending: None,
            last_error: None,
        }
    }

    /// Fetch the questions for `topic` and start from the first one
    pub async fn load(&mut self, topic: &str) -> VoiceResult<()> {
        self.teardown();
        self.run = QuizRunState::default();

        let questions = match self.backend.questions(topic).await {
            Ok(questions) => questions,
            Err(e) => {
                warn!("Quiz for {} failed to load: {}", topic, e);
                return Err(self.fail(QUIZ_UNAVAILABLE));
            }
        };
        if questions.is_empty() {
            return Err(self.fail(NO_QUESTIONS));
        }

        info!("Loaded quiz {} ({} questions)", topic, questions.len());
        self.last_error = None;
        self.run = QuizRunState::new(questions.into_iter().map(Question::from).collect());
        self.narrate_current();
        Ok(())
    }

    /// Answer the current question.
    ///
    /// Returns `None` when the answer is ignored (already answered, finished,
    /// or not started).
    pub fn answer(&mut self, option: &str) -> Option<Feedback> {
        let feedback = self.run.answer(option, self.language)?;
        info!(
            "Question {} answered {:?} (score {})",
            self.run.index + 1,
            feedback,
            self.run.score
        );

        self.narrate(feedback.cue(self.language).to_string());
        self.arm_advance_timer();
        Some(feedback)
    }

    /// Play again from the first question
    pub fn restart(&mut self) -> VoiceResult<()> {
        if self.run.questions.is_empty() {
            return Err(VoiceError::Unavailable(NO_QUESTIONS.to_string()));
        }
        self.cancel_timer();
        self.run.restart();
        info!("Quiz restarted");
        self.narrate_current();
        Ok(())
    }

    /// Stop timers, speech and every in-flight narration
    pub fn teardown(&mut self) {
        self.cancel_timer();
        self.sequencer.invalidate();
        self.pending = None;
        self.playback.stop();
    }

    /// Wait for the next completion. Cancel-safe.
    pub async fn recv_event(&mut self) -> Option<QuizEvent> {
        tokio::select! {
            biased;
            Some(event) = self.playback_rx.recv() => Some(QuizEvent::Playback(event)),
            Some(cycle) = self.timer_rx.recv() => Some(QuizEvent::Advance(cycle)),
            Some(narration) = self.narration_rx.recv() => Some(QuizEvent::Narration(narration)),
            else => None,
        }
    }

    pub async fn apply(&mut self, event: QuizEvent) -> QuizUpdate {
        match event {
            QuizEvent::Narration(narration) => self.apply_narration(narration).await,
            QuizEvent::Advance(cycle) => self.apply_advance(cycle),
            QuizEvent::Playback(event) => {
                if !self.playback.handle_event(&event) {
                    return QuizUpdate::Ignored;
                }
                if event.kind == PlaybackEventKind::Ended {
                    QuizUpdate::PlaybackEnded(event.id)
                } else {
                    QuizUpdate::Ignored
                }
            }
        }
    }

    pub async fn next_event(&mut self) -> Option<QuizUpdate> {
        let event = self.recv_event().await?;
        Some(self.apply(event).await)
    }

    /// Pump completions until nothing is narrating, speaking or pending
    pub async fn settle(&mut self) -> Vec<QuizUpdate> {
        let mut updates = Vec::new();
        while self.is_busy() {
            match self.next_event().await {
                Some(update) => updates.push(update),
                None => break,
            }
        }
        updates
    }

    pub fn run(&self) -> &QuizRunState {
        &self.run
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.playback.is_playing()
    }

    pub fn playback(&self) -> &PlaybackController {
        &self.playback
    }

    fn is_busy(&self) -> bool {
        self.pending.is_some() || self.timer.is_some() || self.playback.is_playing()
    }

    async fn apply_narration(&mut self, narration: Narration) -> QuizUpdate {
        let Narration { ticket, result } = narration;
        if !self.sequencer.is_current(ticket) {
            debug!("Discarding stale narration {}", ticket);
            return QuizUpdate::NarrationDiscarded { ticket };
        }
        self.pending = None;

        let audio = match result {
            Ok(Some(audio)) => audio,
            Ok(None) => {
                debug!("Narration {} came back without audio", ticket);
                return QuizUpdate::Ignored;
            }
            Err(e) => {
                warn!("Narration {} failed: {}", ticket, e);
                let message = e.user_message();
                self.last_error = Some(message.clone());
                return QuizUpdate::NarrationFailed { message };
            }
        };

        // Nothing yields between the ticket check and the output start.
        match self.playback.play(&audio).await {
            Ok(id) => QuizUpdate::Narrating { ticket, id },
            Err(e) => {
                let message = e.user_message();
                self.last_error = Some(message.clone());
                QuizUpdate::NarrationFailed { message }
            }
        }
    }

    fn apply_advance(&mut self, cycle: u64) -> QuizUpdate {
        if cycle != self.cycle || self.timer.is_none() {
            debug!("Ignoring advance timer of superseded cycle {}", cycle);
            return QuizUpdate::Ignored;
        }
        self.timer = None;

        match self.run.advance() {
            Advance::Next(index) => {
                info!("Advancing to question {}", index + 1);
                self.narrate_current();
                QuizUpdate::Advanced { index }
            }
            Advance::Finished => {
                info!("Quiz finished: {}/{}", self.run.score, self.run.total());
                self.narrate(self.run.result_narration(self.language));
                QuizUpdate::Finished {
                    score: self.run.score,
                    total: self.run.total(),
                }
            }
        }
    }

    fn narrate_current(&mut self) {
        if let Some(text) = self.run.current().map(|q| q.narration(self.language)) {
            self.narrate(text);
        }
    }

    /// Supersede whatever is being said and fetch speech for `text`
    fn narrate(&mut self, text: String) -> Ticket {
        let ticket = self.sequencer.next_ticket();
        self.pending = Some(ticket);
        self.playback.stop();

        let backend = Arc::clone(&self.backend);
        let narration_tx = self.narration_tx.clone();
        let language = self.language;
        debug!("Narration {}: {}", ticket, text);
        tokio::spawn(async move {
            let result = backend.speak(&text, language).await;
            // Receiver gone means the quiz was dropped
            let _ = narration_tx.send(Narration { ticket, result });
        });

        ticket
    }

    fn arm_advance_timer(&mut self) {
        self.cancel_timer();
        let cycle = self.cycle;
        let delay = self.advance_delay;
        let timer_tx = self.timer_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = timer_tx.send(cycle);
        }));
    }

    /// Abort the pending timer and start a new cycle
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.cycle += 1;
    }

    fn fail(&mut self, message: &str) -> VoiceError {
        self.last_error = Some(message.to_string());
        VoiceError::Unavailable(message.to_string())
    }
}

impl Drop for QuizSession {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
