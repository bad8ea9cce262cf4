use serde::{Deserialize, Serialize};
use std::fmt;

// ===== IDENTIFIERS =====

pub type SceneId = u64;
pub type AreaId = u64;
pub type LocationId = String;

// ===== SCENE TYPES =====

/// One playback session's time axis as served by `GET scenes`.
///
/// Times are epoch seconds; `step_length` is in seconds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Scene {
    pub scene_id: SceneId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub area_id: Option<AreaId>,
    pub step_length: i64,
    pub measurement_start_time: i64,
    pub measurement_end_time: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Location {
    pub location_id: LocationId,
    pub longitude: f64,
    pub latitude: f64,
}

/// Road-graph edge between two locations. Only the renderer looks at these.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edge {
    pub source: LocationId,
    pub target: LocationId,
}

// ===== FLOW DATA TYPES =====

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FlowRecord {
    #[serde(alias = "id")]
    pub record_id: u64,
    pub time: i64,
    pub velocity: f64,
}

/// Wire shape of one location's records inside a measurement/prediction response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LocationFlows {
    pub location_id: LocationId,
    #[serde(default)]
    pub flows: Vec<FlowRecord>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Measurement,
    Prediction,
}

impl DataKind {
    /// Path segment under `scenes/{id}/` that serves this kind.
    pub fn endpoint(self) -> &'static str {
        match self {
            DataKind::Measurement => "measurements",
            DataKind::Prediction => "predictions",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Measurement => write!(f, "measurement"),
            DataKind::Prediction => write!(f, "prediction"),
        }
    }
}

/// One fetched batch of flow records. Never mutated after the fetch that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub start_time: i64,
    pub step_count: usize,
    pub kind: DataKind,
    pub records: Vec<(LocationId, FlowRecord)>,
}

impl Chunk {
    /// Flatten a per-location response keeping response order.
    pub fn from_location_flows(
        start_time: i64,
        step_count: usize,
        kind: DataKind,
        locations: Vec<LocationFlows>,
    ) -> Self {
        let records = locations
            .into_iter()
            .flat_map(|location| {
                let location_id = location.location_id;
                location
                    .flows
                    .into_iter()
                    .map(move |record| (location_id.clone(), record))
            })
            .collect();

        Chunk {
            start_time,
            step_count,
            kind,
            records,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

// ===== RESPONSE ENVELOPE =====

/// `{code, message, data}` wrapper carried by every data-source response.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ApiEnvelope<T> {
    pub code: i32,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

/// Response that arrived fine over the wire but reports a non-zero `code`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("data source returned code {code}: {message}")]
pub struct ApplicationError {
    pub code: i32,
    pub message: String,
}

impl<T> ApiEnvelope<T> {
    pub const SUCCESS: i32 = 0;

    pub fn success(data: T) -> Self {
        Self {
            code: Self::SUCCESS,
            message: String::new(),
            data: Some(data),
        }
    }

    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.code == Self::SUCCESS
    }

    /// Unwrap the payload; a successful envelope without `data` counts as empty.
    pub fn into_data(self) -> Result<T, ApplicationError>
    where
        T: Default,
    {
        if self.is_success() {
            Ok(self.data.unwrap_or_default())
        } else {
            Err(ApplicationError {
                code: self.code,
                message: self.message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_success_decodes_payload() {
        let json = r#"{"code":0,"message":"ok","data":[{"location_id":"L1","longitude":8.5,"latitude":47.3}]}"#;
        let envelope: ApiEnvelope<Vec<Location>> = serde_json::from_str(json).unwrap();

        let locations = envelope.into_data().unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].location_id, "L1");
    }

    #[test]
    fn test_envelope_nonzero_code_is_application_error() {
        let json = r#"{"code":40001,"message":"scene not found"}"#;
        let envelope: ApiEnvelope<Vec<Location>> = serde_json::from_str(json).unwrap();

        let error = envelope.into_data().unwrap_err();
        assert_eq!(error.code, 40001);
        assert_eq!(error.message, "scene not found");
    }

    #[test]
    fn test_envelope_missing_data_is_empty_payload() {
        let json = r#"{"code":0,"message":"no prediction"}"#;
        let envelope: ApiEnvelope<Vec<LocationFlows>> = serde_json::from_str(json).unwrap();

        assert!(envelope.into_data().unwrap().is_empty());
    }

    #[test]
    fn test_flow_record_accepts_id_alias() {
        let json = r#"{"id":7,"time":120,"velocity":42.5}"#;
        let record: FlowRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.record_id, 7);
    }

    #[test]
    fn test_chunk_flattening_keeps_response_order() {
        let record = |id, time| FlowRecord {
            record_id: id,
            time,
            velocity: 50.0,
        };
        let chunk = Chunk::from_location_flows(
            0,
            2,
            DataKind::Measurement,
            vec![
                LocationFlows {
                    location_id: "B".into(),
                    flows: vec![record(1, 0), record(2, 60)],
                },
                LocationFlows {
                    location_id: "A".into(),
                    flows: vec![record(3, 0)],
                },
            ],
        );

        let order: Vec<(&str, u64)> = chunk
            .records
            .iter()
            .map(|(location, record)| (location.as_str(), record.record_id))
            .collect();
        assert_eq!(order, vec![("B", 1), ("B", 2), ("A", 3)]);
    }

    #[test]
    fn test_scene_optional_fields_default() {
        let json = r#"{"scene_id":3,"step_length":60,"measurement_start_time":0,"measurement_end_time":1200}"#;
        let scene: Scene = serde_json::from_str(json).unwrap();
        assert_eq!(scene.area_id, None);
        assert_eq!(scene.name, None);
    }
}
