//! Runs a [`VoiceSession`] on its own task
//!
//! User commands and completions are funnelled into one loop so the session
//! is only ever touched from a single control flow.

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::session::{SessionUpdate, VoiceSession};
use super::state::TranscriptEntry;
use super::stats::SessionSnapshot;
use crate::error::{VoiceError, VoiceResult};
use crate::sequencer::Ticket;

type Reply<T> = oneshot::Sender<T>;

enum Command {
    StartSpeaking(Reply<VoiceResult<()>>),
    StopSpeaking(Reply<VoiceResult<Option<Ticket>>>),
    SendText(String, Reply<VoiceResult<Option<Ticket>>>),
    StartLesson(Reply<VoiceResult<Option<Ticket>>>),
    ContinueLesson(Reply<VoiceResult<Option<Ticket>>>),
    Interrupt(Reply<bool>),
    Resume(Reply<VoiceResult<bool>>),
    Snapshot(Reply<SessionSnapshot>),
    Transcript(Reply<Vec<TranscriptEntry>>),
    Teardown(Reply<()>),
}

/// Cloneable handle to a running session
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    updates: broadcast::Sender<SessionUpdate>,
}

/// Move `session` onto a task and return a handle to drive it.
///
/// The task tears the session down and exits once every handle is dropped.
pub fn spawn(session: VoiceSession) -> (SessionHandle, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::channel(32);
    let (updates_tx, _) = broadcast::channel(64);

    let task = tokio::spawn(run(session, commands_rx, updates_tx.clone()));
    let handle = SessionHandle {
        commands: commands_tx,
        updates: updates_tx,
    };
    (handle, task)
}

async fn run(
    mut session: VoiceSession,
    mut commands: mpsc::Receiver<Command>,
    updates: broadcast::Sender<SessionUpdate>,
) {
    info!("Session driver started: {}", session.config().session_id);

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(command) => handle_command(&mut session, command).await,
                None => break,
            },
            Some(event) = session.recv_event() => {
                let update = session.apply(event).await;
                debug!("Session update: {:?}", update);
                // No subscribers is fine
                let _ = updates.send(update);
            }
        }
    }

    session.teardown();
    info!("Session driver stopped: {}", session.config().session_id);
}

async fn handle_command(session: &mut VoiceSession, command: Command) {
    // A dropped reply receiver only means the caller stopped waiting
    match command {
        Command::StartSpeaking(reply) => {
            let _ = reply.send(session.start_speaking().await);
        }
        Command::StopSpeaking(reply) => {
            let _ = reply.send(session.stop_speaking().await);
        }
        Command::SendText(text, reply) => {
            let _ = reply.send(session.send_text(&text));
        }
        Command::StartLesson(reply) => {
            let _ = reply.send(session.start_lesson());
        }
        Command::ContinueLesson(reply) => {
            let _ = reply.send(session.continue_lesson());
        }
        Command::Interrupt(reply) => {
            let _ = reply.send(session.interrupt());
        }
        Command::Resume(reply) => {
            let _ = reply.send(session.resume().await);
        }
        Command::Snapshot(reply) => {
            let _ = reply.send(session.snapshot());
        }
        Command::Transcript(reply) => {
            let _ = reply.send(session.transcript().to_vec());
        }
        Command::Teardown(reply) => {
            session.teardown();
            let _ = reply.send(());
        }
    }
}

impl SessionHandle {
    async fn call<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> VoiceResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| VoiceError::SessionClosed)?;
        rx.await.map_err(|_| VoiceError::SessionClosed)
    }

    pub async fn start_speaking(&self) -> VoiceResult<()> {
        self.call(Command::StartSpeaking).await?
    }

    pub async fn stop_speaking(&self) -> VoiceResult<Option<Ticket>> {
        self.call(Command::StopSpeaking).await?
    }

    pub async fn send_text(&self, text: impl Into<String>) -> VoiceResult<Option<Ticket>> {
        let text = text.into();
        self.call(|reply| Command::SendText(text, reply)).await?
    }

    pub async fn start_lesson(&self) -> VoiceResult<Option<Ticket>> {
        self.call(Command::StartLesson).await?
    }

    pub async fn continue_lesson(&self) -> VoiceResult<Option<Ticket>> {
        self.call(Command::ContinueLesson).await?
    }

    pub async fn interrupt(&self) -> VoiceResult<bool> {
        self.call(Command::Interrupt).await
    }

    pub async fn resume(&self) -> VoiceResult<bool> {
        self.call(Command::Resume).await?
    }

    pub async fn snapshot(&self) -> VoiceResult<SessionSnapshot> {
        self.call(Command::Snapshot).await
    }

    pub async fn transcript(&self) -> VoiceResult<Vec<TranscriptEntry>> {
        self.call(Command::Transcript).await
    }

    pub async fn teardown(&self) -> VoiceResult<()> {
        self.call(Command::Teardown).await
    }

    /// Every update applied from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }
}
