//! Engine error types

use shared::{ApplicationError, DataKind, SceneId};
use thiserror::Error;

/// Why a scene cannot be turned into a time axis.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SceneError {
    #[error("scene {scene_id}: step length must be positive, got {step_length}")]
    InvalidStepLength { scene_id: SceneId, step_length: i64 },

    #[error("scene {scene_id}: end time {end} is not after start time {start}")]
    InvalidRange { scene_id: SceneId, start: i64, end: i64 },
}

/// Failure of a single request to the data source.
///
/// Transport and application failures drive the same control flow; they are
/// kept apart only so notifications can say what went wrong.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error(transparent)]
    Application(#[from] ApplicationError),

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl From<reqwest::Error> for FetchError {
    fn from(error: reqwest::Error) -> Self {
        FetchError::Transport(error.to_string())
    }
}

#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("no scene selected")]
    NoScene,

    #[error("step index {index} outside timeline of {step_count} steps")]
    IndexOutOfRange { index: usize, step_count: usize },

    #[error(transparent)]
    InvalidScene(#[from] SceneError),

    #[error("{kind} fetch failed: {source}")]
    Fetch {
        kind: DataKind,
        #[source]
        source: FetchError,
    },
}
