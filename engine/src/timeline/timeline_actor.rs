//! TrafficTimeline: the engine handle the UI talks to.
//!
//! Cloning the handle is cheap; all clones share one session slot and one
//! event stream. Scrubbing, playback and on-demand predictions all work while
//! a prefetch walk is running in the background.

use super::chunk_store::{CacheStatistics, ChunkKey};
use super::events::{CursorView, PredictionOutcome, TimelineEvent};
use super::playback::run_playback;
use super::prefetch::{PrefetchPolicy, PrefetchWalker};
use super::projector::{PerLocationView, TimeStepEntry};
use super::readiness::ReadinessStatus;
use super::session::SessionSlot;
use crate::config::EngineConfig;
use crate::data_source::DataSource;
use crate::error::{FetchError, TimelineError};
use futures::channel::mpsc::UnboundedReceiver;
use shared::{DataKind, Edge, Location, Scene};
use std::sync::Arc;

pub struct TrafficTimeline<D> {
    source: Arc<D>,
    slot: Arc<SessionSlot>,
    config: Arc<EngineConfig>,
}

impl<D> Clone for TrafficTimeline<D> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            slot: Arc::clone(&self.slot),
            config: Arc::clone(&self.config),
        }
    }
}

impl<D> std::fmt::Debug for TrafficTimeline<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficTimeline")
            .field("slot", &self.slot)
            .field("config", &self.config)
            .finish()
    }
}

impl<D: DataSource> TrafficTimeline<D> {
    pub fn new(source: D, config: EngineConfig) -> (Self, UnboundedReceiver<TimelineEvent>) {
        Self::with_shared_source(Arc::new(source), config)
    }

    pub fn with_shared_source(
        source: Arc<D>,
        config: EngineConfig,
    ) -> (Self, UnboundedReceiver<TimelineEvent>) {
        let (slot, timeline_event_stream) = SessionSlot::new();
        (
            Self {
                source,
                slot: Arc::new(slot),
                config: Arc::new(config),
            },
            timeline_event_stream,
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn list_scenes(&self) -> Result<Vec<Scene>, FetchError> {
        self.source.scenes().await
    }

    // ===== SCENE LIFECYCLE =====

    /// Make `scene` current, dropping every cached byte of the previous one.
    pub fn select_scene(&self, scene: Scene) -> Result<(), TimelineError> {
        let scene_id = scene.scene_id;
        self.slot.replace(scene)?;
        log::info!(
            "Selected scene {} ({} steps)",
            scene_id,
            self.step_count().unwrap_or(0)
        );
        self.slot.with_current(|session| self.slot.publish_view(session));
        Ok(())
    }

    /// Fetch locations and graph for the current scene, then start prefetching at step 0.
    ///
    /// Locations and graph only feed rendering; failing to load them is
    /// reported as an event and does not stop the prefetch. If the scene is
    /// replaced while they load, the results are dropped and no walk starts
    /// for the old scene.
    pub async fn load_data(&self) -> Result<(), TimelineError> {
        let (generation, scene_id, area_id) = self
            .slot
            .with_current(|session| {
                (
                    session.generation(),
                    session.scene_id(),
                    session.scene().area_id,
                )
            })
            .ok_or(TimelineError::NoScene)?;

        match self.source.locations(scene_id).await {
            Ok(locations) => {
                log::info!("Scene {}: {} locations", scene_id, locations.len());
                self.slot
                    .with_generation(generation, |session| session.set_locations(locations));
            }
            Err(error) => self.report_reference_failure(scene_id, "locations", error),
        }

        if let Some(area_id) = area_id {
            match self.source.graph(area_id).await {
                Ok(edges) => {
                    self.slot
                        .with_generation(generation, |session| session.set_edges(edges));
                }
                Err(error) => self.report_reference_failure(scene_id, "graph", error),
            }
        }

        if self.spawn_walk(generation, 0).is_none() {
            log::debug!(
                "Scene {}: replaced while loading reference data, prefetch not started",
                scene_id
            );
        }
        Ok(())
    }

    /// Start a background walk at `cursor`. Returns `false` if one is already running.
    pub fn start_prefetch(&self, cursor: usize) -> Result<bool, TimelineError> {
        let generation = self
            .slot
            .with_current(|session| session.generation())
            .ok_or(TimelineError::NoScene)?;
        self.spawn_walk(generation, cursor)
            .ok_or(TimelineError::NoScene)
    }

    /// `None` when the session of `generation` is gone, `Some(false)` when it already walks.
    fn spawn_walk(&self, generation: u64, cursor: usize) -> Option<bool> {
        let claimed = self.slot.with_generation(generation, |session| {
            session
                .begin_walk()
                .then(|| (*session.timeline(), session.token().clone()))
        })?;

        let Some((timeline, token)) = claimed else {
            log::debug!("Prefetch walk already running for session {}", generation);
            return Some(false);
        };

        let walker = PrefetchWalker::new(
            Arc::clone(&self.source),
            Arc::clone(&self.slot),
            generation,
            timeline,
            token,
            PrefetchPolicy::from_config(&self.config),
        );
        tokio::spawn(walker.stream_from(cursor));
        Some(true)
    }

    fn report_reference_failure(&self, scene_id: u64, what: &str, error: FetchError) {
        log::warn!("Scene {}: loading {} failed: {}", scene_id, what, error);
        self.slot.emit(TimelineEvent::ReferenceDataFailed {
            scene_id,
            message: format!("{}: {}", what, error),
        });
    }

    /// Component teardown: stops walk and playback, drops the session.
    pub fn shutdown(&self) {
        self.slot.teardown();
    }

    // ===== PLAYBACK =====

    pub fn set_cursor(&self, index: usize) -> Result<(), TimelineError> {
        self.slot
            .with_current(|session| {
                session.cursor_mut().set(index)?;
                self.slot.publish_view(session);
                Ok(())
            })
            .ok_or(TimelineError::NoScene)?
    }

    /// Start auto-advancing. Playing from the last step starts over at step 0.
    pub fn play(&self) -> Result<(), TimelineError> {
        let started = self
            .slot
            .with_current(|session| {
                if session.cursor().is_playing() || session.timeline().step_count() == 0 {
                    return None;
                }
                if session.cursor().is_at_end() {
                    session.cursor_mut().rewind();
                    self.slot.publish_view(session);
                }
                let timer = session.token().child_token();
                session.cursor_mut().start(timer.clone());
                Some((session.generation(), timer))
            })
            .ok_or(TimelineError::NoScene)?;

        if let Some((generation, timer)) = started {
            tokio::spawn(run_playback(
                Arc::clone(&self.slot),
                generation,
                timer,
                self.config.playback_interval(),
            ));
        }
        Ok(())
    }

    pub fn pause(&self) {
        self.slot
            .with_current(|session| session.cursor_mut().stop());
    }

    pub fn is_playing(&self) -> bool {
        self.slot
            .with_current(|session| session.cursor().is_playing())
            .unwrap_or(false)
    }

    // ===== PREDICTIONS =====

    /// Prediction for the configured number of steps starting at the cursor.
    pub async fn request_prediction(&self) -> Result<PredictionOutcome, TimelineError> {
        let from_index = self.current_index().ok_or(TimelineError::NoScene)?;
        self.request_prediction_at(from_index, self.config.prediction_steps)
            .await
    }

    pub async fn request_prediction_at(
        &self,
        from_index: usize,
        step_count: usize,
    ) -> Result<PredictionOutcome, TimelineError> {
        let (generation, scene_id, start_time, cached) = self
            .slot
            .with_current(|session| {
                let timeline = session.timeline();
                if !timeline.contains(from_index) {
                    return Err(TimelineError::IndexOutOfRange {
                        index: from_index,
                        step_count: timeline.step_count(),
                    });
                }
                let start_time = timeline.time_at(from_index);
                let key = ChunkKey::new(
                    session.scene_id(),
                    DataKind::Prediction,
                    start_time,
                    step_count,
                );
                let cached = session.lookup(&key);
                if cached {
                    self.slot.publish_view(session);
                }
                Ok((session.generation(), session.scene_id(), start_time, cached))
            })
            .ok_or(TimelineError::NoScene)??;

        if cached {
            return Ok(PredictionOutcome::Loaded {
                steps_updated: 0,
                from_cache: true,
            });
        }

        let fetched = self
            .source
            .chunk(scene_id, DataKind::Prediction, start_time, step_count)
            .await;

        let outcome = self.slot.with_generation(generation, |session| match fetched {
            Err(error) => {
                session.record_failure();
                self.slot.emit(TimelineEvent::FetchFailed {
                    scene_id,
                    kind: DataKind::Prediction,
                    start_time,
                    message: error.to_string(),
                });
                Err(TimelineError::Fetch {
                    kind: DataKind::Prediction,
                    source: error,
                })
            }
            Ok(chunk) if chunk.is_empty() => {
                session.record_empty();
                self.slot.emit(TimelineEvent::NoPredictionAvailable {
                    scene_id,
                    from_index,
                });
                Ok(PredictionOutcome::NoPredictionAvailable)
            }
            Ok(chunk) => {
                let steps_updated = session
                    .apply_chunk(chunk)
                    .map(|projected| projected.indices.len())
                    .unwrap_or(0);
                self.slot.publish_view(session);
                Ok(PredictionOutcome::Loaded {
                    steps_updated,
                    from_cache: false,
                })
            }
        });

        match outcome {
            Some(outcome) => outcome,
            None => {
                log::debug!(
                    "Scene {}: prediction at {} resolved after session change, dropped",
                    scene_id,
                    start_time
                );
                Ok(PredictionOutcome::Discarded)
            }
        }
    }

    // ===== READ ACCESSORS =====

    pub fn scene(&self) -> Option<Scene> {
        self.slot.with_current(|session| session.scene().clone())
    }

    pub fn step_count(&self) -> Option<usize> {
        self.slot
            .with_current(|session| session.timeline().step_count())
    }

    pub fn current_index(&self) -> Option<usize> {
        self.slot.with_current(|session| session.cursor().index())
    }

    pub fn current_view(&self) -> Option<CursorView> {
        self.slot.with_current(|session| session.cursor_view())
    }

    pub fn current_measurement_view(&self) -> Option<PerLocationView> {
        self.current_view().and_then(|view| view.measurement)
    }

    pub fn current_prediction_view(&self) -> Option<PerLocationView> {
        self.current_view().and_then(|view| view.prediction)
    }

    pub fn entry_at(&self, index: usize) -> Option<TimeStepEntry> {
        self.slot
            .with_current(|session| session.table().entry_at(index).cloned())
            .flatten()
    }

    pub fn status_at(&self, index: usize) -> ReadinessStatus {
        self.slot
            .with_current(|session| session.table().status_at(index))
            .unwrap_or_default()
    }

    /// Status of every step, for legends. Empty without a scene.
    pub fn statuses_snapshot(&self) -> Vec<ReadinessStatus> {
        self.slot
            .with_current(|session| session.table().all_statuses())
            .unwrap_or_default()
    }

    pub fn is_background_loading(&self) -> bool {
        self.slot
            .with_current(|session| session.is_walking())
            .unwrap_or(false)
    }

    pub fn locations(&self) -> Vec<Location> {
        self.slot
            .with_current(|session| session.locations().to_vec())
            .unwrap_or_default()
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.slot
            .with_current(|session| session.edges().to_vec())
            .unwrap_or_default()
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.slot
            .with_current(|session| session.statistics())
            .unwrap_or_default()
    }
}
