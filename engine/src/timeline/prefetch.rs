//! Background prefetch walker.
//!
//! Walks the timeline forward from a cursor, then wraps around to fill the
//! steps before it, fetching measurement chunks only where the step is still
//! missing measurement data. Fetches are sequential with a short pause in
//! between. A failed or empty fetch ends the current pass; it is never retried
//! in a loop.
//!
//! Cancellation is cooperative: the session token is checked before each
//! fetch and after every await, and results are applied only through
//! `SessionSlot::with_generation`, so a fetch that resolves after the scene
//! changed is dropped.

use super::chunk_store::ChunkKey;
use super::events::{TimelineEvent, WalkOutcome};
use super::session::SessionSlot;
use super::time_domain::SceneTimeline;
use crate::config::EngineConfig;
use crate::data_source::DataSource;
use shared::DataKind;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchPolicy {
    pub chunk_size: usize,
    pub delay: Duration,
    pub wrap_after_failure: bool,
}

impl PrefetchPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            chunk_size: config.chunk_size.max(1),
            delay: config.prefetch_delay(),
            wrap_after_failure: config.wrap_after_failure,
        }
    }
}

impl Default for PrefetchPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

enum Gap {
    Loaded,
    Cached,
    Missing,
}

pub(crate) struct PrefetchWalker<D> {
    source: Arc<D>,
    slot: Arc<SessionSlot>,
    generation: u64,
    timeline: SceneTimeline,
    token: CancellationToken,
    policy: PrefetchPolicy,
}

impl<D: DataSource> PrefetchWalker<D> {
    pub(crate) fn new(
        source: Arc<D>,
        slot: Arc<SessionSlot>,
        generation: u64,
        timeline: SceneTimeline,
        token: CancellationToken,
        policy: PrefetchPolicy,
    ) -> Self {
        Self {
            source,
            slot,
            generation,
            timeline,
            token,
            policy,
        }
    }

    /// Forward pass `[cursor, step_count)`, then wrap pass `[0, cursor)`.
    pub(crate) async fn stream_from(self, cursor: usize) -> WalkOutcome {
        let step_count = self.timeline.step_count();
        let cursor = cursor.min(step_count);
        log::info!(
            "Prefetch walk for scene {} from step {} of {}",
            self.timeline.scene_id(),
            cursor,
            step_count
        );

        let forward = self.walk(cursor, step_count).await;
        let outcome = match forward {
            WalkOutcome::Aborted => WalkOutcome::Aborted,
            WalkOutcome::StoppedEarly if !self.policy.wrap_after_failure => {
                WalkOutcome::StoppedEarly
            }
            forward => match self.walk(0, cursor).await {
                WalkOutcome::Completed => forward,
                wrap => wrap,
            },
        };

        self.slot
            .with_generation(self.generation, |session| session.end_walk());
        log::info!(
            "Prefetch walk for scene {} finished: {:?}",
            self.timeline.scene_id(),
            outcome
        );
        self.slot.emit(TimelineEvent::PrefetchFinished {
            scene_id: self.timeline.scene_id(),
            outcome,
        });
        outcome
    }

    async fn walk(&self, from: usize, to: usize) -> WalkOutcome {
        let scene_id = self.timeline.scene_id();
        let chunk_size = self.policy.chunk_size;
        let mut index = from;

        while index < to {
            if self.token.is_cancelled() {
                return WalkOutcome::Aborted;
            }

            let start_time = self.timeline.time_at(index);
            let key = ChunkKey::new(scene_id, DataKind::Measurement, start_time, chunk_size);
            let gap = self.slot.with_generation(self.generation, |session| {
                if session.table().status_at(index).has(DataKind::Measurement) {
                    Gap::Loaded
                } else if session.lookup(&key) {
                    Gap::Cached
                } else {
                    Gap::Missing
                }
            });
            match gap {
                None => return WalkOutcome::Aborted,
                Some(Gap::Loaded) => {
                    index += 1;
                    continue;
                }
                Some(Gap::Cached) => {
                    index += chunk_size;
                    continue;
                }
                Some(Gap::Missing) => {}
            }

            let fetched = self
                .source
                .chunk(scene_id, DataKind::Measurement, start_time, chunk_size)
                .await;
            if self.token.is_cancelled() {
                log::debug!(
                    "Scene {}: dropping measurement chunk at {} fetched after abort",
                    scene_id,
                    start_time
                );
                return WalkOutcome::Aborted;
            }

            let chunk = match fetched {
                Ok(chunk) => chunk,
                Err(error) => {
                    log::warn!(
                        "Scene {}: measurement fetch at step {} failed: {}",
                        scene_id,
                        index,
                        error
                    );
                    if self
                        .slot
                        .with_generation(self.generation, |session| session.record_failure())
                        .is_none()
                    {
                        return WalkOutcome::Aborted;
                    }
                    self.slot.emit(TimelineEvent::FetchFailed {
                        scene_id,
                        kind: DataKind::Measurement,
                        start_time,
                        message: error.to_string(),
                    });
                    return WalkOutcome::StoppedEarly;
                }
            };

            if chunk.is_empty() {
                log::info!(
                    "Scene {}: no measurement data from step {}, ending pass",
                    scene_id,
                    index
                );
                self.slot
                    .with_generation(self.generation, |session| session.record_empty());
                return WalkOutcome::StoppedEarly;
            }

            let records = chunk.len();
            let loaded_steps = self.slot.with_generation(self.generation, |session| {
                let projected = session.apply_chunk(chunk);
                if projected
                    .as_ref()
                    .is_some_and(|projected| projected.contains(session.cursor().index()))
                {
                    self.slot.publish_view(session);
                }
                session.loaded_steps(DataKind::Measurement)
            });
            let Some(loaded_steps) = loaded_steps else {
                return WalkOutcome::Aborted;
            };
            log::debug!(
                "Scene {}: {} measurement records at step {} ({}/{} steps loaded)",
                scene_id,
                records,
                index,
                loaded_steps,
                self.timeline.step_count()
            );
            self.slot.emit(TimelineEvent::PrefetchProgress {
                scene_id,
                loaded_steps,
                total_steps: self.timeline.step_count(),
            });

            index += chunk_size;

            tokio::select! {
                biased;
                _ = self.token.cancelled() => return WalkOutcome::Aborted,
                _ = tokio::time::sleep(self.policy.delay) => {}
            }
        }

        WalkOutcome::Completed
    }
}
