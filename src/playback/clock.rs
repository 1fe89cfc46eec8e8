use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Identifies one playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PlaybackId(pub(crate) u64);

impl PlaybackId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PlaybackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "clip-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    Ended,
}

/// Lifecycle notifications, delivered in order through the controller's channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEventKind {
    Started,
    Paused,
    Resumed,
    /// Reached the end of the clip unassisted
    Ended,
    /// Released early: superseded by a new clip or stopped on teardown
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackEvent {
    pub id: PlaybackId,
    pub kind: PlaybackEventKind,
    /// Play segment the event belongs to; bumps on every resume
    pub segment: u32,
}

/// Position accounting for a clip that can be paused and resumed
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayClock {
    offset: Duration,
    resumed_at: Option<Instant>,
}

impl PlayClock {
    pub fn running(now: Instant) -> Self {
        Self {
            offset: Duration::ZERO,
            resumed_at: Some(now),
        }
    }

    pub fn position(&self, now: Instant) -> Duration {
        let running = self
            .resumed_at
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or_default();
        self.offset + running
    }

    pub fn pause(&mut self, now: Instant) {
        self.offset = self.position(now);
        self.resumed_at = None;
    }

    pub fn resume(&mut self, now: Instant) {
        if self.resumed_at.is_none() {
            self.resumed_at = Some(now);
        }
    }
}

/// Published snapshot of the active playback session
#[derive(Debug, Clone, Copy)]
pub struct PlaybackStatus {
    pub session: Option<PlaybackId>,
    pub state: PlaybackState,
    pub clock: PlayClock,
    pub duration: Duration,
}

impl PlaybackStatus {
    pub fn idle() -> Self {
        Self {
            session: None,
            state: PlaybackState::Idle,
            clock: PlayClock::default(),
            duration: Duration::ZERO,
        }
    }

    pub fn current_time(&self, now: Instant) -> Duration {
        self.clock.position(now).min(self.duration)
    }

    /// Fraction of the clip played, in `[0, 1]`
    pub fn progress(&self, now: Instant) -> f64 {
        if self.duration.is_zero() {
            return 0.0;
        }
        (self.current_time(now).as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_accumulates_across_pause() {
        let start = Instant::now();
        let mut clock = PlayClock::running(start);

        clock.pause(start + Duration::from_millis(300));
        assert_eq!(clock.position(start + Duration::from_secs(5)), Duration::from_millis(300));

        clock.resume(start + Duration::from_secs(1));
        assert_eq!(
            clock.position(start + Duration::from_millis(1200)),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn test_progress_is_clamped() {
        let start = Instant::now();
        let status = PlaybackStatus {
            session: Some(PlaybackId(1)),
            state: PlaybackState::Playing,
            clock: PlayClock::running(start),
            duration: Duration::from_secs(2),
        };

        assert_eq!(status.progress(start), 0.0);
        assert!((status.progress(start + Duration::from_secs(1)) - 0.5).abs() < 1e-9);
        assert_eq!(status.progress(start + Duration::from_secs(10)), 1.0);
    }

    #[test]
    fn test_zero_length_clip_has_no_progress() {
        assert_eq!(PlaybackStatus::idle().progress(Instant::now()), 0.0);
    }
}
