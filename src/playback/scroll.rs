use std::sync::Weak;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use super::clock::{PlaybackId, PlaybackState, PlaybackStatus};

/// A scrollable view whose position follows playback
pub trait ScrollContainer: Send + Sync {
    fn scroll_height(&self) -> f64;
    fn client_height(&self) -> f64;
    fn set_scroll_top(&self, top: f64);
}

/// Map playback progress onto a scroll offset in `[0, scroll_height - client_height]`
pub fn scroll_offset(progress: f64, scroll_height: f64, client_height: f64) -> f64 {
    let max = (scroll_height - client_height).max(0.0);
    let progress = if progress.is_finite() { progress } else { 0.0 };
    (progress * max).clamp(0.0, max)
}

/// Drives a container's scroll position from playback progress on a fixed interval.
///
/// The container is held weakly: if the view goes away the loop ends quietly.
pub struct ScrollSync {
    interval: Duration,
    task: Option<JoinHandle<()>>,
}

impl ScrollSync {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            task: None,
        }
    }

    /// Follow `session` until it stops playing. Replaces any previous attachment.
    pub fn attach(
        &mut self,
        container: Weak<dyn ScrollContainer>,
        mut status: watch::Receiver<PlaybackStatus>,
        session: PlaybackId,
    ) {
        self.detach();

        let interval = self.interval;
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = status.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }

                let snapshot = *status.borrow();
                if snapshot.session != Some(session) || snapshot.state != PlaybackState::Playing {
                    debug!("Scroll sync for {} finished ({:?})", session, snapshot.state);
                    break;
                }

                let Some(container) = container.upgrade() else {
                    debug!("Scroll container dropped; stopping sync for {}", session);
                    break;
                };

                let top = scroll_offset(
                    snapshot.progress(Instant::now()),
                    container.scroll_height(),
                    container.client_height(),
                );
                container.set_scroll_top(top);
            }
        }));
    }

    /// Stop following. Safe to call repeatedly and from any state.
    pub fn detach(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_attached(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }
}

impl Drop for ScrollSync {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_tracks_progress() {
        assert_eq!(scroll_offset(0.5, 1000.0, 200.0), 400.0);
        assert_eq!(scroll_offset(1.0, 1000.0, 200.0), 800.0);
    }

    #[test]
    fn test_offset_is_clamped() {
        assert_eq!(scroll_offset(1.7, 1000.0, 200.0), 800.0);
        assert_eq!(scroll_offset(-0.2, 1000.0, 200.0), 0.0);
        assert_eq!(scroll_offset(f64::NAN, 1000.0, 200.0), 0.0);
    }

    #[test]
    fn test_short_content_never_scrolls() {
        assert_eq!(scroll_offset(0.9, 150.0, 400.0), 0.0);
    }
}
