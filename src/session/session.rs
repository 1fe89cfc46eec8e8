use chrono::{DateTime, Utc};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::config::SessionConfig;
use super::exchange::{
    continue_cue, BackendExchange, ExchangeReply, ExchangeRequest, Outgoing, OutgoingKind,
};
use super::state::{
    LessonState, Role, SegmentProgress, SessionMode, TranscriptEntry, VoiceState,
};
use super::stats::SessionSnapshot;
use crate::audio::{AudioOutput, CaptureSession, Microphone};
use crate::error::{VoiceError, VoiceResult};
use crate::playback::{
    PlaybackController, PlaybackEvent, PlaybackEventKind, PlaybackId, ScrollContainer, ScrollSync,
};
use crate::sequencer::{RequestSequencer, Ticket};

/// Result of one backend exchange, delivered back to the session
#[derive(Debug)]
pub struct Completion {
    pub ticket: Ticket,
    pub kind: OutgoingKind,
    /// Text the user sent, if the request carried any
    pub sent: Option<String>,
    pub result: VoiceResult<ExchangeReply>,
}

/// Everything that can complete asynchronously while a session is live
#[derive(Debug)]
pub enum SessionEvent {
    Reply(Completion),
    Playback(PlaybackEvent),
}

/// What applying an event did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    ReplyApplied { ticket: Ticket, playing: bool },
    /// Superseded by a newer request; nothing changed
    ReplyDiscarded { ticket: Ticket },
    Failed { message: String },
    PlaybackEnded(PlaybackId),
    Playback(PlaybackEvent),
    Ignored,
}

/// The voice interaction state machine for one page view
///
/// Owns the capture session, the playback controller and scroll sync. Backend
/// calls run on spawned tasks and report back through a channel; they never
/// touch session state. Completions are applied one at a time with
/// [`VoiceSession::apply`], and a reply is only honoured while its ticket is
/// still the newest one issued.
pub struct VoiceSession {
    config: SessionConfig,
    exchange: Arc<dyn BackendExchange>,
    capture: CaptureSession,
    playback: PlaybackController,
    playback_rx: mpsc::UnboundedReceiver<PlaybackEvent>,
    replies_tx: mpsc::UnboundedSender<Completion>,
    replies_rx: mpsc::UnboundedReceiver<Completion>,
    sequencer: RequestSequencer,
    scroll: ScrollSync,
    scroll_container: Option<Weak<dyn ScrollContainer>>,
    state: VoiceState,
    lesson: LessonState,
    transcript: Vec<TranscriptEntry>,
    last_error: Option<String>,
    pending: Option<(Ticket, OutgoingKind)>,
    started_at: DateTime<Utc>,
}

impl VoiceSession {
    pub fn new(
        config: SessionConfig,
        exchange: Arc<dyn BackendExchange>,
        microphone: Box<dyn Microphone>,
        output: Box<dyn AudioOutput>,
    ) -> Self {
        info!(
            "Creating {} session {} ({}, backend: {})",
            config.mode,
            config.session_id,
            config.language,
            exchange.name()
        );

        let capture = CaptureSession::new(microphone, config.constraints.clone());
        let (playback, playback_rx) = PlaybackController::new(output);
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        let scroll = ScrollSync::new(config.scroll_interval);

        Self {
            config,
            exchange,
            capture,
            playback,
            playback_rx,
            replies_tx,
            replies_rx,
            sequencer: RequestSequencer::new(),
            scroll,
            scroll_container: None,
            state: VoiceState::Idle,
            lesson: LessonState::default(),
            transcript: Vec::new(),
            last_error: None,
            pending: None,
            started_at: Utc::now(),
        }
    }

    // ------------------------------------------------------------------
    // User actions
    // ------------------------------------------------------------------

    /// Open the microphone. Barges in on any playback.
    pub async fn start_speaking(&mut self) -> VoiceResult<()> {
        match self.state {
            VoiceState::Recording => return Ok(()),
            VoiceState::Processing => return Err(VoiceError::Busy(self.state)),
            VoiceState::Playing | VoiceState::Paused => {
                info!("Barge-in: stopping playback to record");
                self.stop_playback();
            }
            VoiceState::Idle => {}
        }

        self.sequencer.invalidate();
        self.last_error = None;

        if let Err(e) = self.exchange.before_capture(self.config.language).await {
            return Err(self.fail_action(e));
        }
        if let Err(e) = self.capture.start().await {
            return Err(self.fail_action(e));
        }

        self.state = VoiceState::Recording;
        info!("Session {}: recording", self.config.session_id);
        Ok(())
    }

    /// Close the microphone and send the recording.
    ///
    /// Returns the ticket of the request, or `None` when nothing was sent.
    pub async fn stop_speaking(&mut self) -> VoiceResult<Option<Ticket>> {
        if self.state != VoiceState::Recording {
            return Ok(None);
        }

        let clip = match self.capture.stop().await {
            Ok(clip) => clip,
            Err(e) => return Err(self.fail_action(e)),
        };

        match clip {
            Some(clip) if !clip.is_empty() => Ok(Some(self.dispatch(Outgoing::Audio(clip), None))),
            _ => {
                info!("Nothing was recorded; back to idle");
                self.state = VoiceState::Idle;
                Ok(None)
            }
        }
    }

    /// Send a typed message. Blank text is ignored.
    pub fn send_text(&mut self, text: &str) -> VoiceResult<Option<Ticket>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        if self.state == VoiceState::Recording {
            return Err(VoiceError::Busy(self.state));
        }

        self.stop_playback();
        Ok(Some(self.dispatch(
            Outgoing::Text(text.to_string()),
            Some(text.to_string()),
        )))
    }

    /// Open the lesson. Only the first call sends anything.
    pub fn start_lesson(&mut self) -> VoiceResult<Option<Ticket>> {
        self.require_lesson()?;
        if self.lesson.started || matches!(self.pending, Some((_, OutgoingKind::Start))) {
            debug!("Lesson already started");
            return Ok(None);
        }
        if self.state == VoiceState::Recording {
            return Err(VoiceError::Busy(self.state));
        }

        self.stop_playback();
        Ok(Some(self.dispatch(Outgoing::Start, None)))
    }

    /// Ask for the next lesson segment
    pub fn continue_lesson(&mut self) -> VoiceResult<Option<Ticket>> {
        self.require_lesson()?;
        if !self.lesson.started || self.state == VoiceState::Recording {
            return Err(VoiceError::Busy(self.state));
        }

        self.stop_playback();
        let cue = continue_cue(self.config.language).to_string();
        Ok(Some(self.dispatch(Outgoing::Continue, Some(cue))))
    }

    /// Pause speech, keeping it resumable
    pub fn interrupt(&mut self) -> bool {
        if self.state != VoiceState::Playing || !self.playback.interrupt() {
            return false;
        }

        self.scroll.detach();
        self.state = VoiceState::Paused;
        if self.is_lesson() {
            self.lesson.segment = SegmentProgress::Interrupted;
        }
        info!("Session {}: paused", self.config.session_id);
        true
    }

    /// Continue paused speech from where it stopped
    pub async fn resume(&mut self) -> VoiceResult<bool> {
        if self.state != VoiceState::Paused {
            return Ok(false);
        }

        match self.playback.resume().await {
            Ok(true) => {
                self.state = VoiceState::Playing;
                if self.is_lesson() {
                    self.lesson.segment = SegmentProgress::Narrating;
                }
                if let Some(id) = self.playback.current() {
                    self.attach_scroll(id);
                }
                info!("Session {}: resumed", self.config.session_id);
                Ok(true)
            }
            Ok(false) => {
                self.state = VoiceState::Idle;
                Ok(false)
            }
            Err(e) => {
                self.mark_segment_finished();
                Err(self.fail_action(e))
            }
        }
    }

    /// Release everything and drop every in-flight request
    pub fn teardown(&mut self) {
        self.sequencer.invalidate();
        self.capture.teardown();
        self.playback.stop();
        self.scroll.detach();
        self.pending = None;
        self.lesson = LessonState::default();
        self.state = VoiceState::Idle;
        info!("Session {} torn down", self.config.session_id);
    }

    // ------------------------------------------------------------------
    // Completions
    // ------------------------------------------------------------------

    /// Wait for the next completion. Cancel-safe.
    pub async fn recv_event(&mut self) -> Option<SessionEvent> {
        tokio::select! {
            biased;
            Some(event) = self.playback_rx.recv() => Some(SessionEvent::Playback(event)),
            Some(completion) = self.replies_rx.recv() => Some(SessionEvent::Reply(completion)),
            else => None,
        }
    }

    /// Apply one completion to the state machine
    pub async fn apply(&mut self, event: SessionEvent) -> SessionUpdate {
        match event {
            SessionEvent::Reply(completion) => self.apply_reply(completion).await,
            SessionEvent::Playback(event) => self.apply_playback(event),
        }
    }

    pub async fn next_event(&mut self) -> Option<SessionUpdate> {
        let event = self.recv_event().await?;
        Some(self.apply(event).await)
    }

    /// Pump completions until the session is neither waiting nor speaking
    pub async fn settle(&mut self) -> Vec<SessionUpdate> {
        let mut updates = Vec::new();
        while matches!(self.state, VoiceState::Processing | VoiceState::Playing) {
            match self.next_event().await {
                Some(update) => updates.push(update),
                None => break,
            }
        }
        updates
    }

    async fn apply_reply(&mut self, completion: Completion) -> SessionUpdate {
        let Completion {
            ticket,
            kind,
            sent,
            result,
        } = completion;

        if !self.sequencer.is_current(ticket) {
            debug!("Discarding stale reply {}", ticket);
            return SessionUpdate::ReplyDiscarded { ticket };
        }
        self.pending = None;

        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                let message = self.fail_action(e).user_message();
                return SessionUpdate::Failed { message };
            }
        };

        let user_text = reply.user_text.or(sent).filter(|t| !t.trim().is_empty());
        if let Some(text) = user_text {
            self.transcript.push(TranscriptEntry::new(Role::User, text));
        }
        if let Some(text) = reply.assistant_text.filter(|t| !t.trim().is_empty()) {
            if self.is_lesson() {
                self.lesson.current_text = text.clone();
            }
            self.transcript.push(TranscriptEntry::new(Role::Assistant, text));
        }
        if self.is_lesson() && kind == OutgoingKind::Start {
            self.lesson.started = true;
        }

        let Some(audio) = reply.audio else {
            info!("Reply {} has no audio; ready", ticket);
            self.mark_segment_finished();
            self.state = VoiceState::Idle;
            return SessionUpdate::ReplyApplied {
                ticket,
                playing: false,
            };
        };

        // Nothing yields between the ticket check and the output start.
        match self.playback.play(&audio).await {
            Ok(id) => {
                self.state = VoiceState::Playing;
                if self.is_lesson() {
                    self.lesson.segment = SegmentProgress::Narrating;
                }
                self.attach_scroll(id);
                SessionUpdate::ReplyApplied {
                    ticket,
                    playing: true,
                }
            }
            Err(e) => {
                self.mark_segment_finished();
                let message = self.fail_action(e).user_message();
                SessionUpdate::Failed { message }
            }
        }
    }

    fn apply_playback(&mut self, event: PlaybackEvent) -> SessionUpdate {
        if !self.playback.handle_event(&event) {
            return SessionUpdate::Ignored;
        }

        if event.kind != PlaybackEventKind::Ended {
            return SessionUpdate::Playback(event);
        }

        self.scroll.detach();
        if self.state == VoiceState::Playing {
            self.state = VoiceState::Idle;
            self.mark_segment_finished();
        }
        info!("Session {}: finished speaking", self.config.session_id);
        SessionUpdate::PlaybackEnded(event.id)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn mode(&self) -> SessionMode {
        self.config.mode
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn lesson(&self) -> &LessonState {
        &self.lesson
    }

    pub fn transcript(&self) -> &[TranscriptEntry] {
        &self.transcript
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

    /// Follow playback with this view; held weakly
    pub fn set_scroll_container(&mut self, container: Weak<dyn ScrollContainer>) {
        self.scroll_container = Some(container);
    }

    pub fn is_scroll_attached(&self) -> bool {
        self.scroll.is_attached()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let now = Utc::now();
        SessionSnapshot {
            session_id: self.config.session_id.clone(),
            mode: self.config.mode,
            state: self.state,
            language: self.config.language,
            lesson: self.is_lesson().then(|| self.lesson.clone()),
            transcript_entries: self.transcript.len(),
            last_error: self.last_error.clone(),
            is_playing: self.playback.is_playing(),
            started_at: self.started_at,
            uptime_secs: (now - self.started_at).num_milliseconds() as f64 / 1000.0,
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn dispatch(&mut self, payload: Outgoing, sent: Option<String>) -> Ticket {
        let ticket = self.sequencer.next_ticket();
        let kind = payload.kind();
        let request = ExchangeRequest {
            payload,
            language: self.config.language,
            ticket,
        };

        self.pending = Some((ticket, kind));
        self.last_error = None;
        self.state = VoiceState::Processing;
        info!(
            "Session {}: sending {:?} as {} via {}",
            self.config.session_id,
            kind,
            ticket,
            self.exchange.name()
        );

        let exchange = Arc::clone(&self.exchange);
        let replies_tx = self.replies_tx.clone();
        tokio::spawn(async move {
            let result = exchange.exchange(request).await;
            // Receiver gone means the session was dropped
            let _ = replies_tx.send(Completion {
                ticket,
                kind,
                sent,
                result,
            });
        });

        ticket
    }

    fn stop_playback(&mut self) {
        self.scroll.detach();
        self.playback.stop();
        if self.is_lesson() && self.lesson.segment != SegmentProgress::NotStarted {
            self.lesson.segment = SegmentProgress::Finished;
        }
    }

    fn attach_scroll(&mut self, id: PlaybackId) {
        if let Some(container) = &self.scroll_container {
            self.scroll
                .attach(container.clone(), self.playback.status(), id);
        }
    }

    fn mark_segment_finished(&mut self) {
        if self.is_lesson() && self.lesson.started {
            self.lesson.segment = SegmentProgress::Finished;
        }
    }

    fn require_lesson(&self) -> VoiceResult<()> {
        if self.is_lesson() {
            Ok(())
        } else {
            Err(VoiceError::Unsupported(format!(
                "{} sessions have no lesson",
                self.config.mode
            )))
        }
    }

    fn is_lesson(&self) -> bool {
        self.config.mode == SessionMode::Lesson
    }

    /// Record a failure and return to idle
    fn fail_action(&mut self, error: VoiceError) -> VoiceError {
        warn!("Session {}: {}", self.config.session_id, error);
        self.last_error = Some(error.user_message());
        self.state = VoiceState::Idle;
        error
    }
}
