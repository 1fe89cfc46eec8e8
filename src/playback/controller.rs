use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::clock::{
    PlayClock, PlaybackEvent, PlaybackEventKind, PlaybackId, PlaybackState, PlaybackStatus,
};
use crate::audio::{decode_audio, AudioOutput};
use crate::error::{VoiceError, VoiceResult};

struct ActiveClip {
    id: PlaybackId,
    state: PlaybackState,
    clock: PlayClock,
    duration: Duration,
    segment: u32,
    end_timer: Option<JoinHandle<()>>,
}

impl ActiveClip {
    fn cancel_end_timer(&mut self) {
        if let Some(timer) = self.end_timer.take() {
            timer.abort();
        }
    }
}

/// Owns at most one playing clip at a time
///
/// Starting a clip always stops and releases the previous one first. Lifecycle
/// events are sent on the channel returned by [`PlaybackController::new`];
/// natural ends must be fed back through [`PlaybackController::handle_event`]
/// so the resource is released on the owner's control flow.
pub struct PlaybackController {
    output: Box<dyn AudioOutput>,
    active: Option<ActiveClip>,
    next_id: u64,
    events_tx: mpsc::UnboundedSender<PlaybackEvent>,
    status_tx: watch::Sender<PlaybackStatus>,
}

impl PlaybackController {
    pub fn new(output: Box<dyn AudioOutput>) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (status_tx, _) = watch::channel(PlaybackStatus::idle());

        let controller = Self {
            output,
            active: None,
            next_id: 0,
            events_tx,
            status_tx,
        };
        (controller, events_rx)
    }

    /// Decode `audio` and start it, superseding whatever was playing
    pub async fn play(&mut self, audio: &[u8]) -> VoiceResult<PlaybackId> {
        self.stop();

        self.next_id += 1;
        let id = PlaybackId(self.next_id);

        let clip = match decode_audio(audio) {
            Ok(clip) => Arc::new(clip),
            Err(e) => {
                warn!("Could not decode {}: {}", id, e);
                return Err(e);
            }
        };
        let duration = clip.duration;

        if let Err(e) = self.output.start(id, clip).await {
            error!("Output {} rejected {}: {}", self.output.name(), id, e);
            self.publish();
            return Err(match e {
                VoiceError::PlaybackRejected(_) => e,
                other => VoiceError::PlaybackRejected(other.to_string()),
            });
        }

        let end_timer = self.arm_end_timer(id, 0, duration);
        self.active = Some(ActiveClip {
            id,
            state: PlaybackState::Playing,
            clock: PlayClock::running(Instant::now()),
            duration,
            segment: 0,
            end_timer: Some(end_timer),
        });

        info!("Playback started: {} ({:.1}s)", id, duration.as_secs_f64());
        self.emit(id, PlaybackEventKind::Started, 0);
        self.publish();

        Ok(id)
    }

    /// Pause the current clip, keeping its resource for resume
    pub fn interrupt(&mut self) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        if active.state != PlaybackState::Playing {
            return false;
        }

        active.cancel_end_timer();
        active.clock.pause(Instant::now());
        active.state = PlaybackState::Paused;

        let (id, segment) = (active.id, active.segment);
        self.output.pause(id);

        info!("Playback interrupted: {}", id);
        self.emit(id, PlaybackEventKind::Paused, segment);
        self.publish();
        true
    }

    /// Continue a paused clip from its last position
    pub async fn resume(&mut self) -> VoiceResult<bool> {
        let id = match &self.active {
            Some(active) if active.state == PlaybackState::Paused => active.id,
            _ => return Ok(false),
        };

        if let Err(e) = self.output.resume(id).await {
            error!("Output {} refused to resume {}: {}", self.output.name(), id, e);
            self.release_active();
            self.publish();
            return Err(match e {
                VoiceError::PlaybackRejected(_) => e,
                other => VoiceError::PlaybackRejected(other.to_string()),
            });
        }

        let now = Instant::now();
        let (segment, remaining) = match self.active.as_mut() {
            Some(active) if active.id == id => {
                active.segment += 1;
                active.clock.resume(now);
                active.state = PlaybackState::Playing;
                (
                    active.segment,
                    active.duration.saturating_sub(active.clock.position(now)),
                )
            }
            _ => return Ok(false),
        };

        let timer = self.arm_end_timer(id, segment, remaining);
        if let Some(active) = self.active.as_mut() {
            active.end_timer = Some(timer);
        }

        info!("Playback resumed: {} ({:.1}s left)", id, remaining.as_secs_f64());
        self.emit(id, PlaybackEventKind::Resumed, segment);
        self.publish();
        Ok(true)
    }

    /// Release the current clip without waiting for its end
    pub fn stop(&mut self) {
        if let Some((id, segment)) = self.release_active() {
            info!("Playback stopped: {}", id);
            self.emit(id, PlaybackEventKind::Stopped, segment);
            self.publish();
        }
    }

    /// Apply an event received from the controller's channel.
    ///
    /// Returns true when the event belongs to the current clip. A natural end
    /// of the current clip releases it here; events of superseded clips, and
    /// ends that arrive after the clip was paused, return false.
    pub fn handle_event(&mut self, event: &PlaybackEvent) -> bool {
        let Some(active) = self.active.as_ref() else {
            return false;
        };
        if active.id != event.id {
            debug!("Ignoring {:?} for superseded {}", event.kind, event.id);
            return false;
        }

        if event.kind != PlaybackEventKind::Ended {
            return true;
        }

        if active.state != PlaybackState::Playing || active.segment != event.segment {
            debug!("Ignoring stale end of {}", event.id);
            return false;
        }

        let duration = active.duration;
        self.release_active();
        info!("Playback ended: {}", event.id);

        self.status_tx.send_replace(PlaybackStatus {
            session: Some(event.id),
            state: PlaybackState::Ended,
            clock: PlayClock::default(),
            duration,
        });
        true
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.state() == PlaybackState::Paused
    }

    pub fn state(&self) -> PlaybackState {
        self.active
            .as_ref()
            .map(|a| a.state)
            .unwrap_or(PlaybackState::Idle)
    }

    pub fn current(&self) -> Option<PlaybackId> {
        self.active.as_ref().map(|a| a.id)
    }

    /// Position of the current clip
    pub fn position(&self) -> Duration {
        self.active
            .as_ref()
            .map(|a| a.clock.position(Instant::now()).min(a.duration))
            .unwrap_or_default()
    }

    /// Subscribe to status snapshots (used by scroll sync)
    pub fn status(&self) -> watch::Receiver<PlaybackStatus> {
        self.status_tx.subscribe()
    }

    fn release_active(&mut self) -> Option<(PlaybackId, u32)> {
        let mut active = self.active.take()?;
        active.cancel_end_timer();
        self.output.release(active.id);
        Some((active.id, active.segment))
    }

    fn arm_end_timer(&self, id: PlaybackId, segment: u32, after: Duration) -> JoinHandle<()> {
        let events_tx = self.events_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = events_tx.send(PlaybackEvent {
                id,
                kind: PlaybackEventKind::Ended,
                segment,
            });
        })
    }

    fn emit(&self, id: PlaybackId, kind: PlaybackEventKind, segment: u32) {
        // Receiver gone means the owner is shutting down
        let _ = self.events_tx.send(PlaybackEvent { id, kind, segment });
    }

    fn publish(&self) {
        let status = match &self.active {
            Some(active) => PlaybackStatus {
                session: Some(active.id),
                state: active.state,
                clock: active.clock,
                duration: active.duration,
            },
            None => PlaybackStatus::idle(),
        };
        self.status_tx.send_replace(status);
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.release_active();
    }
}
