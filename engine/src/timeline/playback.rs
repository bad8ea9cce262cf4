//! Playback cursor and its auto-advance timer.
//!
//! The cursor moves by scrubbing or by the timer, independently of the
//! prefetch walk. Every move republishes the step's merged view, loaded or not.

use super::events::TimelineEvent;
use super::session::SessionSlot;
use crate::error::TimelineError;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    index: usize,
    step_count: usize,
    timer: Option<CancellationToken>,
}

impl PlaybackCursor {
    pub fn new(step_count: usize) -> Self {
        Self {
            index: 0,
            step_count,
            timer: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn is_playing(&self) -> bool {
        self.timer.is_some()
    }

    pub fn is_at_end(&self) -> bool {
        self.index + 1 >= self.step_count
    }

    pub fn set(&mut self, index: usize) -> Result<usize, TimelineError> {
        if index >= self.step_count {
            return Err(TimelineError::IndexOutOfRange {
                index,
                step_count: self.step_count,
            });
        }
        self.index = index;
        Ok(index)
    }

    /// One step forward; `None` when already on the last step.
    pub fn advance(&mut self) -> Option<usize> {
        if self.is_at_end() {
            return None;
        }
        self.index += 1;
        Some(self.index)
    }

    pub fn rewind(&mut self) {
        self.index = 0;
    }

    pub(crate) fn start(&mut self, timer: CancellationToken) {
        self.stop();
        self.timer = Some(timer);
    }

    pub(crate) fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}

/// Timer loop: one step per `period` until paused, the last step, or the session goes away.
pub(crate) async fn run_playback(
    slot: Arc<SessionSlot>,
    generation: u64,
    timer: CancellationToken,
    period: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = timer.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let keep_playing = slot
            .with_generation(generation, |session| {
                if timer.is_cancelled() {
                    return false;
                }
                // Already on the last step when scrubbed there mid-play or on a one-step scene.
                if session.cursor_mut().advance().is_some() {
                    slot.publish_view(session);
                }

                if session.cursor().is_at_end() {
                    session.cursor_mut().stop();
                    slot.emit(TimelineEvent::PlaybackStopped {
                        scene_id: session.scene_id(),
                        index: session.cursor().index(),
                    });
                    return false;
                }
                true
            })
            .unwrap_or(false);

        if !keep_playing {
            break;
        }
    }

    log::debug!("Playback timer for session {} stopped", generation);
}
