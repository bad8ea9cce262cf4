//! Traffic flow playback engine.
//!
//! Caches chunked measurement/prediction fetches per scene, projects them onto
//! the scene's discrete time axis, and walks the timeline in the background to
//! fill gaps while a playback cursor reads the merged per-step view.

pub mod config;
pub mod data_source;
pub mod dataflow;
pub mod error;
pub mod timeline;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{EngineConfig, load_config};
pub use data_source::{DataSource, HttpDataSource};
pub use error::{FetchError, SceneError, TimelineError};
pub use timeline::{
    CacheStatistics, CursorView, PerLocationView, PredictionOutcome, ReadinessStatus,
    SceneTimeline, TimeStepEntry, TimelineEvent, TrafficTimeline, WalkOutcome,
};
