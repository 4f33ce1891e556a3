//! Signal detections and feature measurements
//!
//! A feature measurement references its underlying data by channel
//! segment id (a claim check into the segment cache); it never embeds
//! segment contents.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeatureMeasurementType {
    ArrivalTime,
    ReceiverToSourceAzimuth,
    SourceToReceiverAzimuth,
    Slowness,
    Phase,
    FilteredBeam,
    #[serde(other)]
    Other,
}

impl FeatureMeasurementType {
    pub fn is_azimuth(&self) -> bool {
        matches!(
            self,
            FeatureMeasurementType::ReceiverToSourceAzimuth
                | FeatureMeasurementType::SourceToReceiverAzimuth
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureMeasurementType::ArrivalTime => "ARRIVAL_TIME",
            FeatureMeasurementType::ReceiverToSourceAzimuth => "RECEIVER_TO_SOURCE_AZIMUTH",
            FeatureMeasurementType::SourceToReceiverAzimuth => "SOURCE_TO_RECEIVER_AZIMUTH",
            FeatureMeasurementType::Slowness => "SLOWNESS",
            FeatureMeasurementType::Phase => "PHASE",
            FeatureMeasurementType::FilteredBeam => "FILTERED_BEAM",
            FeatureMeasurementType::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeasurementValue {
    /// An instant in epoch seconds
    #[serde(rename_all = "camelCase")]
    Instant { value: f64, standard_deviation: f64 },
    #[serde(rename_all = "camelCase")]
    Numeric {
        reference_time: f64,
        value: f64,
        standard_deviation: f64,
    },
    #[serde(rename_all = "camelCase")]
    Phase { phase: String, confidence: f64 },
    #[serde(rename_all = "camelCase")]
    Text { str_value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureMeasurement {
    pub id: String,
    pub feature_measurement_type: FeatureMeasurementType,
    pub measurement_value: MeasurementValue,
    pub channel_segment_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalDetectionHypothesis {
    pub id: String,
    #[serde(default)]
    pub rejected: bool,
    pub feature_measurements: Vec<FeatureMeasurement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalDetection {
    pub id: String,
    pub station_id: String,
    pub current_hypothesis: SignalDetectionHypothesis,
}

impl SignalDetection {
    pub fn feature_measurements(&self) -> &[FeatureMeasurement] {
        &self.current_hypothesis.feature_measurements
    }

    pub fn find_measurement(&self, kind: &FeatureMeasurementType) -> Option<&FeatureMeasurement> {
        self.feature_measurements()
            .iter()
            .find(|fm| &fm.feature_measurement_type == kind)
    }

    pub fn find_measurement_mut(
        &mut self,
        kind: &FeatureMeasurementType,
    ) -> Option<&mut FeatureMeasurement> {
        self.current_hypothesis
            .feature_measurements
            .iter_mut()
            .find(|fm| &fm.feature_measurement_type == kind)
    }

    pub fn arrival_time_measurement(&self) -> Option<&FeatureMeasurement> {
        self.find_measurement(&FeatureMeasurementType::ArrivalTime)
    }

    /// Arrival time in epoch seconds
    pub fn arrival_time(&self) -> Option<f64> {
        match self.arrival_time_measurement()?.measurement_value {
            MeasurementValue::Instant { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Either azimuth flavour, whichever the hypothesis carries
    pub fn azimuth_measurement(&self) -> Option<&FeatureMeasurement> {
        self.feature_measurements()
            .iter()
            .find(|fm| fm.feature_measurement_type.is_azimuth())
    }

    pub fn azimuth_measurement_mut(&mut self) -> Option<&mut FeatureMeasurement> {
        self.current_hypothesis
            .feature_measurements
            .iter_mut()
            .find(|fm| fm.feature_measurement_type.is_azimuth())
    }

    pub fn slowness_measurement(&self) -> Option<&FeatureMeasurement> {
        self.find_measurement(&FeatureMeasurementType::Slowness)
    }

    /// Phase label of the phase measurement, e.g. `P` or `Lg`
    pub fn phase(&self) -> Option<&str> {
        match &self.find_measurement(&FeatureMeasurementType::Phase)?.measurement_value {
            MeasurementValue::Phase { phase, .. } => Some(phase),
            _ => None,
        }
    }

    /// Replace every filtered-beam measurement with `measurements`
    pub fn replace_filtered_beams(&mut self, measurements: Vec<FeatureMeasurement>) {
        let fms = &mut self.current_hypothesis.feature_measurements;
        fms.retain(|fm| fm.feature_measurement_type != FeatureMeasurementType::FilteredBeam);
        fms.extend(measurements);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measurement(kind: FeatureMeasurementType, value: MeasurementValue) -> FeatureMeasurement {
        FeatureMeasurement {
            id: format!("fm-{}", kind.as_str()),
            feature_measurement_type: kind,
            measurement_value: value,
            channel_segment_id: "cs".to_string(),
        }
    }

    fn detection() -> SignalDetection {
        SignalDetection {
            id: "sd".to_string(),
            station_id: "st".to_string(),
            current_hypothesis: SignalDetectionHypothesis {
                id: "h".to_string(),
                rejected: false,
                feature_measurements: vec![
                    measurement(
                        FeatureMeasurementType::ArrivalTime,
                        MeasurementValue::Instant { value: 42.0, standard_deviation: 0.1 },
                    ),
                    measurement(
                        FeatureMeasurementType::SourceToReceiverAzimuth,
                        MeasurementValue::Numeric {
                            reference_time: 42.0,
                            value: 180.0,
                            standard_deviation: 1.0,
                        },
                    ),
                    measurement(
                        FeatureMeasurementType::Phase,
                        MeasurementValue::Phase { phase: "Pn".to_string(), confidence: 1.0 },
                    ),
                ],
            },
        }
    }

    #[test]
    fn test_finders() {
        let sd = detection();
        assert_eq!(sd.arrival_time(), Some(42.0));
        assert_eq!(
            sd.azimuth_measurement().unwrap().feature_measurement_type,
            FeatureMeasurementType::SourceToReceiverAzimuth
        );
        assert!(sd.slowness_measurement().is_none());
        assert_eq!(sd.phase(), Some("Pn"));
    }

    #[test]
    fn test_replace_filtered_beams() {
        let mut sd = detection();
        let filtered = |id: &str| FeatureMeasurement {
            id: id.to_string(),
            feature_measurement_type: FeatureMeasurementType::FilteredBeam,
            measurement_value: MeasurementValue::Text { str_value: "filter".to_string() },
            channel_segment_id: id.to_string(),
        };
        sd.replace_filtered_beams(vec![filtered("a"), filtered("b")]);
        sd.replace_filtered_beams(vec![filtered("c")]);

        let ids: Vec<_> = sd
            .feature_measurements()
            .iter()
            .filter(|fm| fm.feature_measurement_type == FeatureMeasurementType::FilteredBeam)
            .map(|fm| fm.id.as_str())
            .collect();
        assert_eq!(ids, vec!["c"]);
        assert_eq!(sd.feature_measurements().len(), 4);
    }

    #[test]
    fn test_unknown_measurement_type_deserializes() {
        let kind: FeatureMeasurementType = serde_json::from_str("\"AMPLITUDE_A5_OVER_2\"").unwrap();
        assert_eq!(kind, FeatureMeasurementType::Other);
    }
}
