//! Beam recomputation for a signal detection
//!
//! Steers a beam with the azimuth and slowness of the detection's FK lead
//! spectrum, over raw waveforms around the arrival. A committed beam
//! becomes the arrival time measurement's segment and triggers the
//! filtered-beam refresh.

use super::fk_support::KM_PER_DEGREE;
use super::segment_service::ChannelSegmentService;
use crate::cache::truncate;
use crate::collaborators::{AnalysisConfig, BeamFormingService, StationLookup, WaveformFilterService};
use crate::converter::{from_wire, to_wire};
use crate::error::ComputeError;
use crate::models::{
    ChannelSegment, ChannelSegmentType, FeatureMeasurement, FeatureMeasurementType,
    FkPowerSpectrum, MeasurementValue, ProcessingStation, SignalDetection,
};
use crate::wire::{BeamDefinition, BeamFormingRequest};
use seis_common::config::BeamDefaults;
use seis_common::events::{EventBus, GatewayEvent};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What a beam computation produced
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BeamOutcome {
    /// A new beam is cached and referenced by the arrival time measurement
    #[serde(rename_all = "camelCase")]
    Computed {
        beam_segment_id: String,
        filtered_beam_count: usize,
    },
    /// No raw waveforms around the arrival; nothing was requested
    NoWaveforms,
    /// The beam service returned nothing; the prior beam is untouched
    EmptyResult,
    /// The beam step failed after an FK update was committed
    Failed { reason: String },
}

impl BeamOutcome {
    pub fn is_computed(&self) -> bool {
        matches!(self, BeamOutcome::Computed { .. })
    }
}

/// Beam slowness (s/km) from an FK slowness in s/deg
pub fn beam_slowness(fk_slowness: f64) -> f64 {
    fk_slowness / KM_PER_DEGREE
}

/// Assemble the beam request for `waveforms`
///
/// Only channels that produced a waveform get a relative position.
pub fn build_beam_request(
    detection: &SignalDetection,
    station: &ProcessingStation,
    lead_spectrum: Option<&FkPowerSpectrum>,
    defaults: &BeamDefaults,
    waveforms: &[ChannelSegment],
) -> BeamFormingRequest {
    let (azimuth, slowness) = lead_spectrum
        .map(|s| (s.attributes.azimuth, beam_slowness(s.attributes.slowness)))
        .unwrap_or_default();

    let relative_positions_by_channel_id: BTreeMap<_, _> = station
        .channels
        .iter()
        .filter(|c| waveforms.iter().any(|wf| wf.channel_id == c.id))
        .map(|c| (c.id.clone(), c.position))
        .collect();

    BeamFormingRequest {
        output_channel_id: detection.station_id.clone(),
        waveforms: waveforms.iter().map(to_wire).collect(),
        beam_definition: BeamDefinition {
            phase_type: detection.phase().unwrap_or_default().to_string(),
            azimuth,
            slowness,
            coherent: defaults.coherent,
            snapped_sampling: defaults.snapped_sampling,
            two_dimensional: defaults.two_dimensional,
            nominal_waveform_sample_rate: station
                .channels
                .first()
                .map(|c| c.sample_rate)
                .unwrap_or_default(),
            waveform_sample_rate_tolerance: defaults.sample_rate_tolerance,
            beam_point: station.location,
            relative_positions_by_channel_id,
            minimum_waveforms_for_beam: defaults.minimum_waveforms_for_beam,
        },
    }
}

pub struct BeamOrchestrator {
    segments: Arc<ChannelSegmentService>,
    beam: Arc<dyn BeamFormingService>,
    filter: Arc<dyn WaveformFilterService>,
    stations: Arc<dyn StationLookup>,
    config: Arc<dyn AnalysisConfig>,
    event_bus: EventBus,
}

impl BeamOrchestrator {
    pub fn new(
        segments: Arc<ChannelSegmentService>,
        beam: Arc<dyn BeamFormingService>,
        filter: Arc<dyn WaveformFilterService>,
        stations: Arc<dyn StationLookup>,
        config: Arc<dyn AnalysisConfig>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            segments,
            beam,
            filter,
            stations,
            config,
            event_bus,
        }
    }

    /// Recompute the beam for `detection`, updating it in place on success
    ///
    /// `detection` is only modified when a new beam is committed.
    pub async fn compute_beam(
        &self,
        detection: &mut SignalDetection,
    ) -> Result<BeamOutcome, ComputeError> {
        let arrival_time = detection.arrival_time().ok_or_else(|| {
            ComputeError::InvalidInput(format!(
                "signal detection {} has no arrival time measurement",
                detection.id
            ))
        })?;
        let station = self
            .stations
            .station(&detection.station_id)
            .await?
            .ok_or_else(|| ComputeError::NotFound(format!("station {}", detection.station_id)))?;

        let fk_segment = match detection.azimuth_measurement() {
            Some(fm) => match self
                .segments
                .get_channel_segment(&fm.channel_segment_id, Some(&*detection))
                .await
            {
                Ok(segment) => segment,
                Err(e) => {
                    warn!(
                        signal_detection_id = %detection.id,
                        segment_id = %fm.channel_segment_id,
                        error = %e,
                        "FK lookup failed; beam steered with zero azimuth and slowness"
                    );
                    None
                }
            },
            None => None,
        };
        let lead_spectrum = fk_segment
            .as_deref()
            .and_then(ChannelSegment::fk_spectra)
            .and_then(|fk| fk.lead_spectrum());
        if lead_spectrum.is_none() {
            debug!(
                signal_detection_id = %detection.id,
                "No FK lead spectrum; beam steered with zero azimuth and slowness"
            );
        }

        let defaults = self.config.beam_defaults();
        let start = arrival_time - defaults.lead_beam_seconds;
        let end = arrival_time + defaults.lag_beam_seconds;
        let channel_ids: Vec<String> = station.channels.iter().map(|c| c.id.clone()).collect();
        let waveforms: Vec<ChannelSegment> = self
            .segments
            .get_channel_segments_by_channels(start, end, &channel_ids, ChannelSegmentType::Raw)
            .await
            .iter()
            .map(|wf| truncate(wf, start, end))
            .collect();

        if waveforms.is_empty() {
            warn!(
                signal_detection_id = %detection.id,
                "No waveforms found; a new beam will not be computed"
            );
            return Ok(BeamOutcome::NoWaveforms);
        }

        let request = build_beam_request(detection, &station, lead_spectrum, &defaults, &waveforms);
        let contributing_channels = request.beam_definition.relative_positions_by_channel_id.len();
        debug!(
            signal_detection_id = %detection.id,
            waveforms = waveforms.len(),
            azimuth = request.beam_definition.azimuth,
            slowness = request.beam_definition.slowness,
            "Requesting beam"
        );

        let response = self.beam.compute_beam(&request).await?;
        let Some(beam) = response.first().and_then(from_wire) else {
            warn!(
                signal_detection_id = %detection.id,
                "Compute beam returned no result; no new beam was computed"
            );
            return Ok(BeamOutcome::EmptyResult);
        };

        let beam = self.segments.cache().put(beam).await;
        if let Some(arrival) =
            detection.find_measurement_mut(&FeatureMeasurementType::ArrivalTime)
        {
            arrival.channel_segment_id = beam.id.clone();
        }
        info!(
            signal_detection_id = %detection.id,
            segment_id = %beam.id,
            contributing_channels,
            "Beam computed"
        );
        self.event_bus.emit_lossy(GatewayEvent::BeamComputed {
            signal_detection_id: detection.id.clone(),
            channel_segment_id: beam.id.clone(),
            contributing_channels,
            timestamp: chrono::Utc::now(),
        });

        let filtered_beam_count = self.refresh_filtered_beams(detection, &beam).await;

        self.event_bus.emit_lossy(GatewayEvent::FeatureMeasurementsUpdated {
            signal_detection_id: detection.id.clone(),
            channel_segment_id: beam.id.clone(),
            measurement_types: vec![FeatureMeasurementType::ArrivalTime.as_str().to_string()],
            timestamp: chrono::Utc::now(),
        });

        Ok(BeamOutcome::Computed {
            beam_segment_id: beam.id.clone(),
            filtered_beam_count,
        })
    }

    /// Filter the new beam and record one filtered-beam measurement per filter
    ///
    /// A filter failure keeps the previous filtered beams.
    async fn refresh_filtered_beams(
        &self,
        detection: &mut SignalDetection,
        beam: &ChannelSegment,
    ) -> usize {
        let filtered = match self.filter.filter_segments(&[to_wire(beam)]).await {
            Ok(filtered) => filtered,
            Err(e) => {
                warn!(
                    signal_detection_id = %detection.id,
                    error = %e,
                    "Waveform filtering of new beam failed"
                );
                return 0;
            }
        };

        let mut measurements = Vec::with_capacity(filtered.len());
        for entry in &filtered {
            let Some(segment) = from_wire(&entry.channel_segment) else {
                continue;
            };
            let segment = self.segments.cache().put(segment).await;
            measurements.push(FeatureMeasurement {
                id: Uuid::new_v4().to_string(),
                feature_measurement_type: FeatureMeasurementType::FilteredBeam,
                measurement_value: MeasurementValue::Text {
                    str_value: entry.filter_id.clone(),
                },
                channel_segment_id: segment.id.clone(),
            });
        }

        let count = measurements.len();
        detection.replace_filtered_beams(measurements);
        debug!(signal_detection_id = %detection.id, count, "Filtered beams refreshed");
        count
    }
}
