use super::projector::{PerLocationView, TimeStepEntry};
use super::readiness::ReadinessStatus;
use shared::{DataKind, SceneId};

/// What the renderer gets for the cursor's step. Missing views are not errors.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorView {
    pub scene_id: SceneId,
    pub index: usize,
    pub time: i64,
    pub measurement: Option<PerLocationView>,
    pub prediction: Option<PerLocationView>,
}

impl CursorView {
    pub fn new(scene_id: SceneId, index: usize, time: i64, entry: Option<&TimeStepEntry>) -> Self {
        Self {
            scene_id,
            index,
            time,
            measurement: entry.and_then(TimeStepEntry::measurement).cloned(),
            prediction: entry.and_then(TimeStepEntry::prediction).cloned(),
        }
    }

    pub fn status(&self) -> ReadinessStatus {
        ReadinessStatus::from_flags(self.measurement.is_some(), self.prediction.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOutcome {
    /// Both passes ran to their end.
    Completed,
    /// A fetch failed or came back empty and at least one pass stopped there.
    StoppedEarly,
    /// Scene replaced or engine torn down mid-walk.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredictionOutcome {
    Loaded { steps_updated: usize, from_cache: bool },
    NoPredictionAvailable,
    /// Scene changed while the request was in flight; the result was dropped.
    Discarded,
}

/// Everything the engine publishes to the UI side.
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineEvent {
    ViewPublished(CursorView),
    PrefetchProgress {
        scene_id: SceneId,
        loaded_steps: usize,
        total_steps: usize,
    },
    PrefetchFinished {
        scene_id: SceneId,
        outcome: WalkOutcome,
    },
    FetchFailed {
        scene_id: SceneId,
        kind: DataKind,
        start_time: i64,
        message: String,
    },
    ReferenceDataFailed {
        scene_id: SceneId,
        message: String,
    },
    NoPredictionAvailable {
        scene_id: SceneId,
        from_index: usize,
    },
    PlaybackStopped {
        scene_id: SceneId,
        index: usize,
    },
}
