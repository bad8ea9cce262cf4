//! Time domain for scene time axes
//!
//! A scene spans `[measurement_start_time, measurement_end_time)` in epoch
//! seconds, cut into fixed-length steps. `SceneTimeline` is the validated form
//! of that axis and the only place index/time conversion happens.

use crate::error::SceneError;
use shared::{Scene, SceneId};

/// Validated time axis of one scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneTimeline {
    scene_id: SceneId,
    start_time: i64,
    end_time: i64,
    step_length: i64,
    step_count: usize,
}

impl SceneTimeline {
    pub fn new(scene: &Scene) -> Result<Self, SceneError> {
        if scene.step_length <= 0 {
            return Err(SceneError::InvalidStepLength {
                scene_id: scene.scene_id,
                step_length: scene.step_length,
            });
        }
        if scene.measurement_end_time <= scene.measurement_start_time {
            return Err(SceneError::InvalidRange {
                scene_id: scene.scene_id,
                start: scene.measurement_start_time,
                end: scene.measurement_end_time,
            });
        }

        let span = scene.measurement_end_time - scene.measurement_start_time;
        Ok(Self {
            scene_id: scene.scene_id,
            start_time: scene.measurement_start_time,
            end_time: scene.measurement_end_time,
            step_length: scene.step_length,
            step_count: (span / scene.step_length) as usize,
        })
    }

    pub fn scene_id(&self) -> SceneId {
        self.scene_id
    }

    pub fn start_time(&self) -> i64 {
        self.start_time
    }

    pub fn end_time(&self) -> i64 {
        self.end_time
    }

    pub fn step_length(&self) -> i64 {
        self.step_length
    }

    /// `floor((end - start) / step_length)`
    pub fn step_count(&self) -> usize {
        self.step_count
    }

    pub fn contains(&self, index: usize) -> bool {
        index < self.step_count
    }

    /// Real time of a step: `start + index * step_length`.
    pub fn time_at(&self, index: usize) -> i64 {
        self.start_time + index as i64 * self.step_length
    }

    /// Nearest step to `time`, halfway points rounding up. May fall outside the scene.
    pub fn index_at(&self, time: i64) -> i64 {
        let offset = time - self.start_time;
        (offset + self.step_length / 2).div_euclid(self.step_length)
    }

    /// Nearest step to `time` when it lies on this timeline.
    pub fn checked_index_at(&self, time: i64) -> Option<usize> {
        let index = self.index_at(time);
        usize::try_from(index).ok().filter(|&index| self.contains(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(start: i64, end: i64, step_length: i64) -> Scene {
        Scene {
            scene_id: 1,
            name: None,
            area_id: None,
            step_length,
            measurement_start_time: start,
            measurement_end_time: end,
        }
    }

    #[test]
    fn test_step_count_floors_partial_step() {
        assert_eq!(SceneTimeline::new(&scene(0, 1200, 60)).unwrap().step_count(), 20);
        assert_eq!(SceneTimeline::new(&scene(0, 1259, 60)).unwrap().step_count(), 20);
        assert_eq!(SceneTimeline::new(&scene(100, 130, 60)).unwrap().step_count(), 0);
    }

    #[test]
    fn test_time_at_index_at_inverse() {
        let timeline = SceneTimeline::new(&scene(1_600_000_000, 1_600_003_600, 300)).unwrap();

        for index in 0..timeline.step_count() {
            let time = timeline.time_at(index);
            assert_eq!(timeline.index_at(time), index as i64);
        }
    }

    #[test]
    fn test_index_at_rounds_to_nearest_boundary() {
        let timeline = SceneTimeline::new(&scene(0, 1200, 60)).unwrap();

        assert_eq!(timeline.index_at(29), 0);
        assert_eq!(timeline.index_at(30), 1);
        assert_eq!(timeline.index_at(89), 1);
        assert_eq!(timeline.index_at(91), 2);
        assert_eq!(timeline.time_at(timeline.index_at(100) as usize), 120);
    }

    #[test]
    fn test_index_at_outside_scene() {
        let timeline = SceneTimeline::new(&scene(600, 1200, 60)).unwrap();

        assert_eq!(timeline.index_at(0), -10);
        assert_eq!(timeline.checked_index_at(0), None);
        assert_eq!(timeline.checked_index_at(1200), None);
        assert_eq!(timeline.checked_index_at(1170), None);
        assert_eq!(timeline.checked_index_at(1140), Some(9));
    }

    #[test]
    fn test_invalid_scenes_rejected() {
        assert!(matches!(
            SceneTimeline::new(&scene(0, 1200, 0)),
            Err(SceneError::InvalidStepLength { .. })
        ));
        assert!(matches!(
            SceneTimeline::new(&scene(0, 1200, -60)),
            Err(SceneError::InvalidStepLength { .. })
        ));
        assert!(matches!(
            SceneTimeline::new(&scene(1200, 1200, 60)),
            Err(SceneError::InvalidRange { .. })
        ));
    }
}
