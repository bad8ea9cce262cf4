//! Scene session arena and the slot that owns it.
//!
//! One `SceneSession` holds every piece of cached state for one selected
//! scene. Selecting another scene drops the whole arena; nothing is cleared
//! piecemeal. Background work remembers the generation it was started for and
//! goes through `SessionSlot::with_generation`, which refuses access once that
//! session has been replaced, so a stale fetch can never write into a fresh cache.

use super::chunk_store::{CacheStatistics, ChunkKey, ChunkStore};
use super::events::{CursorView, TimelineEvent};
use super::playback::PlaybackCursor;
use super::projector::{ProjectedSteps, TimeStepTable};
use super::time_domain::SceneTimeline;
use crate::dataflow::{Relay, relay};
use crate::error::SceneError;
use futures::channel::mpsc::UnboundedReceiver;
use parking_lot::Mutex;
use shared::{Chunk, DataKind, Edge, Location, Scene, SceneId};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct SceneSession {
    generation: u64,
    scene: Scene,
    timeline: SceneTimeline,
    store: ChunkStore,
    table: TimeStepTable,
    statistics: CacheStatistics,
    locations: Vec<Location>,
    edges: Vec<Edge>,
    cursor: PlaybackCursor,
    token: CancellationToken,
    walk_active: bool,
}

impl SceneSession {
    pub fn new(generation: u64, scene: Scene) -> Result<Self, SceneError> {
        let timeline = SceneTimeline::new(&scene)?;
        let step_count = timeline.step_count();

        Ok(Self {
            generation,
            scene,
            timeline,
            store: ChunkStore::new(),
            table: TimeStepTable::new(step_count),
            statistics: CacheStatistics::default(),
            locations: Vec::new(),
            edges: Vec::new(),
            cursor: PlaybackCursor::new(step_count),
            token: CancellationToken::new(),
            walk_active: false,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_id(&self) -> SceneId {
        self.scene.scene_id
    }

    pub fn timeline(&self) -> &SceneTimeline {
        &self.timeline
    }

    pub fn table(&self) -> &TimeStepTable {
        &self.table
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn statistics(&self) -> CacheStatistics {
        self.statistics
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn cursor(&self) -> &PlaybackCursor {
        &self.cursor
    }

    pub fn cursor_mut(&mut self) -> &mut PlaybackCursor {
        &mut self.cursor
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn cursor_view(&self) -> CursorView {
        self.view_at(self.cursor.index())
    }

    pub fn view_at(&self, index: usize) -> CursorView {
        CursorView::new(
            self.scene_id(),
            index,
            self.timeline.time_at(index),
            self.table.entry_at(index),
        )
    }

    /// Cache lookup before a fetch; counts towards the hit ratio.
    pub fn lookup(&mut self, key: &ChunkKey) -> bool {
        let hit = self.store.has(key);
        if hit {
            self.statistics.chunk_hits += 1;
        } else {
            self.statistics.chunk_misses += 1;
        }
        hit
    }

    /// Store a freshly fetched chunk and project it.
    ///
    /// Empty chunks are not stored so the window can be retried later. A chunk
    /// whose key is already stored was projected when it was first stored and
    /// is not applied again.
    pub fn apply_chunk(&mut self, chunk: Chunk) -> Option<ProjectedSteps> {
        if chunk.is_empty() {
            return None;
        }

        let key = ChunkKey::for_chunk(self.scene.scene_id, &chunk);
        if self.store.has(&key) {
            log::debug!(
                "Scene {}: {} chunk at {} already stored",
                key.scene_id,
                key.kind,
                key.start_time
            );
            return None;
        }

        let projected = self.table.project(&self.timeline, &chunk);
        self.store.put(key.scene_id, chunk);
        self.statistics.chunks_stored += 1;
        Some(projected)
    }

    pub fn record_failure(&mut self) {
        self.statistics.fetch_failures += 1;
    }

    pub fn record_empty(&mut self) {
        self.statistics.empty_results += 1;
    }

    pub fn set_locations(&mut self, locations: Vec<Location>) {
        self.locations = locations;
    }

    pub fn set_edges(&mut self, edges: Vec<Edge>) {
        self.edges = edges;
    }

    pub fn is_walking(&self) -> bool {
        self.walk_active
    }

    /// Claim the single walk slot of this session.
    pub fn begin_walk(&mut self) -> bool {
        if self.walk_active {
            return false;
        }
        self.walk_active = true;
        true
    }

    pub fn end_walk(&mut self) {
        self.walk_active = false;
    }

    pub fn loaded_steps(&self, kind: DataKind) -> usize {
        self.table.loaded_count(kind)
    }

    /// Stop everything still running against this session.
    fn close(&mut self) {
        self.token.cancel();
        self.cursor.stop();
        self.walk_active = false;
    }
}

/// Owner of the current session plus the engine's event relay.
#[derive(Debug)]
pub(crate) struct SessionSlot {
    session: Mutex<Option<SceneSession>>,
    timeline_event_relay: Relay<TimelineEvent>,
    next_generation: AtomicU64,
}

impl SessionSlot {
    pub(crate) fn new() -> (Self, UnboundedReceiver<TimelineEvent>) {
        let (timeline_event_relay, timeline_event_stream) = relay();
        (
            Self {
                session: Mutex::new(None),
                timeline_event_relay,
                next_generation: AtomicU64::new(1),
            },
            timeline_event_stream,
        )
    }

    pub(crate) fn emit(&self, event: TimelineEvent) {
        self.timeline_event_relay.send(event);
    }

    pub(crate) fn publish_view(&self, session: &SceneSession) {
        self.emit(TimelineEvent::ViewPublished(session.cursor_view()));
    }

    pub(crate) fn with_current<R>(&self, f: impl FnOnce(&mut SceneSession) -> R) -> Option<R> {
        self.session.lock().as_mut().map(f)
    }

    /// Run `f` only if the session of `generation` is still the current one.
    pub(crate) fn with_generation<R>(
        &self,
        generation: u64,
        f: impl FnOnce(&mut SceneSession) -> R,
    ) -> Option<R> {
        let mut slot = self.session.lock();
        match slot.as_mut() {
            Some(session) if session.generation == generation && !session.token.is_cancelled() => {
                Some(f(session))
            }
            _ => None,
        }
    }

    /// Swap in a fresh session for `scene`.
    ///
    /// The scene is validated first; an invalid scene leaves the current
    /// session untouched. The old session is cancelled under the same lock the
    /// new one is installed with.
    pub(crate) fn replace(&self, scene: Scene) -> Result<u64, SceneError> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let fresh = SceneSession::new(generation, scene)?;

        let mut slot = self.session.lock();
        if let Some(old) = slot.as_mut() {
            log::info!(
                "Dropping session for scene {} ({} chunks cached)",
                old.scene_id(),
                old.store.len()
            );
            old.close();
        }
        *slot = Some(fresh);
        Ok(generation)
    }

    pub(crate) fn teardown(&self) {
        if let Some(mut old) = self.session.lock().take() {
            old.close();
        }
    }
}
