//! In-memory data source for engine tests.

use crate::data_source::DataSource;
use crate::error::FetchError;
use parking_lot::Mutex;
use shared::{
    ApplicationError, AreaId, Chunk, DataKind, Edge, FlowRecord, Location, LocationFlows, Scene,
    SceneId,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Instant;

pub const LOCATION_IDS: [&str; 3] = ["L1", "L2", "L3"];

pub fn scene(scene_id: SceneId, step_length: i64, start: i64, end: i64) -> Scene {
    Scene {
        scene_id,
        name: Some(format!("scene {}", scene_id)),
        area_id: Some(7),
        step_length,
        measurement_start_time: start,
        measurement_end_time: end,
    }
}

#[derive(Default)]
struct FakeState {
    failures: HashSet<(DataKind, i64)>,
    empty_windows: HashSet<(DataKind, i64)>,
    empty_predictions: bool,
    fail_locations: bool,
    requests: Vec<(DataKind, i64, Instant)>,
}

/// Serves every window with one record per location and step, clipped at the scene end.
pub struct FakeSource {
    scenes: Vec<Scene>,
    state: Mutex<FakeState>,
    gate: Option<Arc<Notify>>,
    location_gate: Option<Arc<Notify>>,
    started: Arc<Notify>,
}

impl FakeSource {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self {
            scenes,
            state: Mutex::new(FakeState::default()),
            gate: None,
            location_gate: None,
            started: Arc::new(Notify::new()),
        }
    }

    /// Hold every chunk fetch until `gate` is notified once per fetch.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Hold the locations request until `gate` is notified.
    pub fn gated_locations(mut self, gate: Arc<Notify>) -> Self {
        self.location_gate = Some(gate);
        self
    }

    /// Notified each time a gated locations request or any chunk fetch has been issued.
    pub fn started(&self) -> Arc<Notify> {
        Arc::clone(&self.started)
    }

    pub fn fail_at(&self, kind: DataKind, start_time: i64) {
        self.state.lock().failures.insert((kind, start_time));
    }

    pub fn empty_at(&self, kind: DataKind, start_time: i64) {
        self.state.lock().empty_windows.insert((kind, start_time));
    }

    pub fn no_predictions(&self) {
        self.state.lock().empty_predictions = true;
    }

    pub fn fail_locations(&self) {
        self.state.lock().fail_locations = true;
    }

    pub fn requested_starts(&self, kind: DataKind) -> Vec<i64> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|(requested, _, _)| *requested == kind)
            .map(|(_, start_time, _)| *start_time)
            .collect()
    }

    /// When each chunk fetch of `kind` was issued, in issue order.
    pub fn request_instants(&self, kind: DataKind) -> Vec<Instant> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|(requested, _, _)| *requested == kind)
            .map(|(_, _, issued)| *issued)
            .collect()
    }

    fn find_scene(&self, scene_id: SceneId) -> Result<&Scene, FetchError> {
        self.scenes
            .iter()
            .find(|scene| scene.scene_id == scene_id)
            .ok_or_else(|| {
                FetchError::Application(ApplicationError {
                    code: 404,
                    message: format!("unknown scene {}", scene_id),
                })
            })
    }

    fn build_chunk(
        scene: &Scene,
        kind: DataKind,
        start_time: i64,
        step_count: usize,
    ) -> Vec<LocationFlows> {
        let base = match kind {
            DataKind::Measurement => 50.0,
            DataKind::Prediction => 80.0,
        };
        LOCATION_IDS
            .iter()
            .enumerate()
            .map(|(location_index, location_id)| LocationFlows {
                location_id: location_id.to_string(),
                flows: (0..step_count)
                    .map(|k| start_time + k as i64 * scene.step_length)
                    .take_while(|&time| time < scene.measurement_end_time)
                    .map(|time| FlowRecord {
                        record_id: time as u64 * 10 + location_index as u64,
                        time,
                        velocity: base + location_index as f64,
                    })
                    .collect(),
            })
            .collect()
    }
}

impl DataSource for FakeSource {
    async fn scenes(&self) -> Result<Vec<Scene>, FetchError> {
        Ok(self.scenes.clone())
    }

    async fn locations(&self, scene_id: SceneId) -> Result<Vec<Location>, FetchError> {
        self.find_scene(scene_id)?;
        if let Some(gate) = &self.location_gate {
            self.started.notify_one();
            gate.notified().await;
        }
        if self.state.lock().fail_locations {
            return Err(FetchError::Transport("connection refused".to_string()));
        }
        Ok(LOCATION_IDS
            .iter()
            .enumerate()
            .map(|(index, location_id)| Location {
                location_id: location_id.to_string(),
                longitude: 13.4 + index as f64 * 0.01,
                latitude: 52.5,
            })
            .collect())
    }

    async fn graph(&self, _area_id: AreaId) -> Result<Vec<Edge>, FetchError> {
        Ok(vec![
            Edge {
                source: "L1".to_string(),
                target: "L2".to_string(),
            },
            Edge {
                source: "L2".to_string(),
                target: "L3".to_string(),
            },
        ])
    }

    async fn chunk(
        &self,
        scene_id: SceneId,
        kind: DataKind,
        start_time: i64,
        step_count: usize,
    ) -> Result<Chunk, FetchError> {
        let (fail, empty) = {
            let mut state = self.state.lock();
            state.requests.push((kind, start_time, Instant::now()));
            (
                state.failures.contains(&(kind, start_time)),
                state.empty_windows.contains(&(kind, start_time))
                    || (kind == DataKind::Prediction && state.empty_predictions),
            )
        };
        self.started.notify_one();

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        if fail {
            return Err(FetchError::Status {
                status: 500,
                url: format!("scenes/{}/{}", scene_id, kind.endpoint()),
            });
        }

        let scene = self.find_scene(scene_id)?;
        let locations = if empty {
            Vec::new()
        } else {
            Self::build_chunk(scene, kind, start_time, step_count)
        };
        Ok(Chunk::from_location_flows(
            start_time, step_count, kind, locations,
        ))
    }
}
