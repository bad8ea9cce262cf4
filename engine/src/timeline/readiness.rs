use shared::DataKind;

/// Which data kinds are available for one time step.
///
/// Always derived from the step's entry, never stored next to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadinessStatus {
    #[default]
    Unloaded,
    MeasurementLoaded,
    PredictionLoaded,
    BothLoaded,
}

impl ReadinessStatus {
    pub fn from_flags(measurement: bool, prediction: bool) -> Self {
        match (measurement, prediction) {
            (false, false) => ReadinessStatus::Unloaded,
            (true, false) => ReadinessStatus::MeasurementLoaded,
            (false, true) => ReadinessStatus::PredictionLoaded,
            (true, true) => ReadinessStatus::BothLoaded,
        }
    }

    pub fn has_measurement(self) -> bool {
        matches!(
            self,
            ReadinessStatus::MeasurementLoaded | ReadinessStatus::BothLoaded
        )
    }

    pub fn has_prediction(self) -> bool {
        matches!(
            self,
            ReadinessStatus::PredictionLoaded | ReadinessStatus::BothLoaded
        )
    }

    pub fn has(self, kind: DataKind) -> bool {
        match kind {
            DataKind::Measurement => self.has_measurement(),
            DataKind::Prediction => self.has_prediction(),
        }
    }

    /// One-character legend symbol for status strips.
    pub fn symbol(self) -> char {
        match self {
            ReadinessStatus::Unloaded => '.',
            ReadinessStatus::MeasurementLoaded => 'M',
            ReadinessStatus::PredictionLoaded => 'P',
            ReadinessStatus::BothLoaded => 'B',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_by_kind() {
        use ReadinessStatus::*;

        assert!(!Unloaded.has(DataKind::Measurement));
        assert!(MeasurementLoaded.has(DataKind::Measurement));
        assert!(!MeasurementLoaded.has(DataKind::Prediction));
        assert!(PredictionLoaded.has(DataKind::Prediction));
        assert!(BothLoaded.has(DataKind::Measurement));
        assert!(BothLoaded.has(DataKind::Prediction));
    }

    #[test]
    fn test_flags_round_trip() {
        for measurement in [false, true] {
            for prediction in [false, true] {
                let status = ReadinessStatus::from_flags(measurement, prediction);
                assert_eq!(status.has_measurement(), measurement);
                assert_eq!(status.has_prediction(), prediction);
            }
        }
    }
}
