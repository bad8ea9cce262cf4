//! Scene timeline: time axis, chunk cache, per-step projection, playback and
//! background prefetch, tied together by [`TrafficTimeline`].

pub mod chunk_store;
pub mod events;
pub mod playback;
pub mod prefetch;
pub mod projector;
pub mod readiness;
pub mod session;
pub mod time_domain;
pub mod timeline_actor;

pub use chunk_store::{CacheStatistics, ChunkKey, ChunkStore};
pub use events::{CursorView, PredictionOutcome, TimelineEvent, WalkOutcome};
pub use playback::PlaybackCursor;
pub use prefetch::PrefetchPolicy;
pub use projector::{PerLocationView, ProjectedSteps, TimeStepEntry, TimeStepTable};
pub use readiness::ReadinessStatus;
pub use session::SceneSession;
pub use time_domain::SceneTimeline;
pub use timeline_actor::TrafficTimeline;
