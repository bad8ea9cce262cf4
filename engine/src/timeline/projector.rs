//! Per-time-step projection of fetched chunks.
//!
//! Every record lands on the step nearest to its timestamp, in the view of the
//! chunk's kind, replacing whatever that step already held for the same
//! location and kind. Readiness is read off the entry afterwards, so
//! `BothLoaded` holds exactly when both views are present.

use super::readiness::ReadinessStatus;
use super::time_domain::SceneTimeline;
use shared::{Chunk, DataKind, FlowRecord, LocationId};
use std::collections::{BTreeSet, HashMap};

/// Location → record for one step and one kind.
pub type PerLocationView = HashMap<LocationId, FlowRecord>;

/// Merged state of one time step. A view exists only once a record was written to it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeStepEntry {
    measurement: Option<PerLocationView>,
    prediction: Option<PerLocationView>,
}

impl TimeStepEntry {
    pub fn measurement(&self) -> Option<&PerLocationView> {
        self.measurement.as_ref()
    }

    pub fn prediction(&self) -> Option<&PerLocationView> {
        self.prediction.as_ref()
    }

    pub fn view(&self, kind: DataKind) -> Option<&PerLocationView> {
        match kind {
            DataKind::Measurement => self.measurement(),
            DataKind::Prediction => self.prediction(),
        }
    }

    pub fn status(&self) -> ReadinessStatus {
        ReadinessStatus::from_flags(self.measurement.is_some(), self.prediction.is_some())
    }

    fn insert(&mut self, kind: DataKind, location_id: LocationId, record: FlowRecord) {
        let view = match kind {
            DataKind::Measurement => &mut self.measurement,
            DataKind::Prediction => &mut self.prediction,
        };
        view.get_or_insert_with(HashMap::new)
            .insert(location_id, record);
    }
}

/// Steps touched by one projection pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectedSteps {
    pub indices: BTreeSet<usize>,
    pub records_applied: usize,
    /// Records whose timestamp fell outside the scene.
    pub records_skipped: usize,
}

impl ProjectedSteps {
    pub fn contains(&self, index: usize) -> bool {
        self.indices.contains(&index)
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Per-step entries of one scene, indexed by step.
#[derive(Debug, Clone)]
pub struct TimeStepTable {
    entries: Vec<Option<TimeStepEntry>>,
}

impl TimeStepTable {
    pub fn new(step_count: usize) -> Self {
        Self {
            entries: vec![None; step_count],
        }
    }

    pub fn step_count(&self) -> usize {
        self.entries.len()
    }

    /// Apply every record of `chunk` in chunk order.
    pub fn project(&mut self, timeline: &SceneTimeline, chunk: &Chunk) -> ProjectedSteps {
        let mut projected = ProjectedSteps::default();

        for (location_id, record) in &chunk.records {
            let Some(index) = timeline
                .checked_index_at(record.time)
                .filter(|&index| index < self.entries.len())
            else {
                projected.records_skipped += 1;
                continue;
            };

            self.entries[index]
                .get_or_insert_with(TimeStepEntry::default)
                .insert(chunk.kind, location_id.clone(), record.clone());
            projected.indices.insert(index);
            projected.records_applied += 1;
        }

        if projected.records_skipped > 0 {
            log::debug!(
                "{} chunk at {}: {} records outside scene {}",
                chunk.kind,
                chunk.start_time,
                projected.records_skipped,
                timeline.scene_id()
            );
        }

        projected
    }

    pub fn entry_at(&self, index: usize) -> Option<&TimeStepEntry> {
        self.entries.get(index).and_then(Option::as_ref)
    }

    pub fn status_at(&self, index: usize) -> ReadinessStatus {
        self.entry_at(index)
            .map(TimeStepEntry::status)
            .unwrap_or_default()
    }

    pub fn all_statuses(&self) -> Vec<ReadinessStatus> {
        (0..self.entries.len())
            .map(|index| self.status_at(index))
            .collect()
    }

    pub fn loaded_count(&self, kind: DataKind) -> usize {
        self.entries
            .iter()
            .flatten()
            .filter(|entry| entry.view(kind).is_some())
            .count()
    }
}
