//! Shared fixtures for seis-gateway integration tests
//!
//! `FakeUpstream` stands in for every upstream collaborator, records
//! what it was asked, and can be told to fail or return nothing.

#![allow(dead_code)]

use async_trait::async_trait;
use seis_common::config::TomlConfig;
use seis_common::events::{EventBus, GatewayEvent};
use seis_common::time::to_wire_time;
use seis_gateway::collaborators::{
    BeamFormingService, ChannelSegmentSource, CollaboratorResult, Collaborators,
    FkComputeService, SignalDetectionStore, StationLookup, WaveformFilterService,
};
use seis_gateway::models::{
    ChannelSegmentType, ContributingChannel, FeatureMeasurement, FeatureMeasurementType,
    FkAttributes, FkConfiguration, FkInput, FrequencyBand, Location, MeasurementValue,
    ProcessingChannel, ProcessingStation, RelativePosition, SignalDetection,
    SignalDetectionHypothesis, WindowParameters,
};
use seis_gateway::wire::{
    BeamFormingRequest, ChannelSegmentsByChannelsRequest, ComputeFkRequest, WireChannelSegment,
    WireFilteredSegment, WireFkPowerSpectra, WireFkSpectrum, WireTimeseries, WireWaveform,
};
use seis_gateway::{ComputeError, GatewayServices};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

pub const STATION_ID: &str = "ASAR";
pub const SD_ID: &str = "sd-1";
pub const ARRIVAL_SEGMENT_ID: &str = "arrival-beam";
pub const PRIOR_FK_ID: &str = "prior-fk";
pub const ARRIVAL_TIME: f64 = 1000.0;
pub const SEGMENT_START: f64 = 900.0;
pub const SEGMENT_END: f64 = 1100.0;
pub const FILTER_ID: &str = "bw-1-3";

/// In-memory upstream for every collaborator trait
#[derive(Default)]
pub struct FakeUpstream {
    pub segments_by_id: Mutex<HashMap<String, WireChannelSegment>>,
    pub raw_segments: Mutex<Vec<WireChannelSegment>>,
    pub detections: Mutex<HashMap<String, SignalDetection>>,
    pub stations: Mutex<HashMap<String, ProcessingStation>>,

    pub by_ids_calls: Mutex<Vec<Vec<String>>>,
    pub by_channels_calls: Mutex<Vec<Vec<String>>>,
    pub fk_requests: Mutex<Vec<ComputeFkRequest>>,
    pub beam_requests: Mutex<Vec<BeamFormingRequest>>,
    pub filter_calls: AtomicUsize,
    pub stored: Mutex<Vec<SignalDetection>>,

    pub fk_empty: AtomicBool,
    pub fk_fail: AtomicBool,
    /// Bands (by low frequency) whose FK request fails
    pub fk_fail_low_frequencies: Mutex<Vec<f64>>,
    pub fk_delay_ms: AtomicUsize,
    pub fk_in_flight: AtomicUsize,
    pub fk_max_in_flight: AtomicUsize,
    pub beam_empty: AtomicBool,
    pub beam_fail: AtomicBool,
    pub filter_fail: AtomicBool,
    pub by_ids_fail: AtomicBool,
    pub by_channels_fail: AtomicBool,
    pub store_fail: AtomicBool,

    counter: AtomicUsize,
}

impl FakeUpstream {
    /// Upstream seeded with station ASAR, detection sd-1, its arrival
    /// beam and raw waveforms for both array elements
    pub fn seeded() -> Arc<Self> {
        let fake = Arc::new(Self::default());
        fake.add_station(station());
        fake.add_detection(detection());
        fake.add_segment(waveform_segment(
            ARRIVAL_SEGMENT_ID,
            "ASAR.beam",
            ChannelSegmentType::DetectionBeam,
            SEGMENT_START,
            SEGMENT_END,
        ));
        for channel in ["ASAR.AS01.SHZ", "ASAR.AS02.SHZ"] {
            fake.raw_segments.lock().unwrap().push(waveform_segment(
                &format!("raw-{}", channel),
                channel,
                ChannelSegmentType::Raw,
                SEGMENT_START,
                SEGMENT_END,
            ));
        }
        fake
    }

    pub fn add_station(&self, station: ProcessingStation) {
        self.stations
            .lock()
            .unwrap()
            .insert(station.id.clone(), station);
    }

    pub fn add_detection(&self, detection: SignalDetection) {
        self.detections
            .lock()
            .unwrap()
            .insert(detection.id.clone(), detection);
    }

    pub fn add_segment(&self, segment: WireChannelSegment) {
        self.segments_by_id
            .lock()
            .unwrap()
            .insert(segment.id.clone(), segment);
    }

    pub fn stored_detection(&self, id: &str) -> Option<SignalDetection> {
        self.detections.lock().unwrap().get(id).cloned()
    }

    pub fn store_count(&self) -> usize {
        self.stored.lock().unwrap().len()
    }

    pub fn fk_request_count(&self) -> usize {
        self.fk_requests.lock().unwrap().len()
    }

    pub fn beam_request_count(&self) -> usize {
        self.beam_requests.lock().unwrap().len()
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.counter.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl ChannelSegmentSource for FakeUpstream {
    async fn by_ids(&self, ids: &[String]) -> CollaboratorResult<Vec<WireChannelSegment>> {
        self.by_ids_calls.lock().unwrap().push(ids.to_vec());
        if self.by_ids_fail.load(Ordering::SeqCst) {
            return Err(ComputeError::collaborator("channel-segments", "connection refused"));
        }
        let segments = self.segments_by_id.lock().unwrap();
        Ok(ids.iter().filter_map(|id| segments.get(id).cloned()).collect())
    }

    async fn by_channels(
        &self,
        request: &ChannelSegmentsByChannelsRequest,
    ) -> CollaboratorResult<Vec<WireChannelSegment>> {
        self.by_channels_calls
            .lock()
            .unwrap()
            .push(request.channel_ids.clone());
        if self.by_channels_fail.load(Ordering::SeqCst) {
            return Err(ComputeError::collaborator("channel-segments", "connection refused"));
        }
        Ok(self
            .raw_segments
            .lock()
            .unwrap()
            .iter()
            .filter(|s| request.channel_ids.contains(&s.channel_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl FkComputeService for FakeUpstream {
    async fn compute_fk(
        &self,
        request: &ComputeFkRequest,
    ) -> CollaboratorResult<Vec<WireChannelSegment>> {
        self.fk_requests.lock().unwrap().push(request.clone());

        let in_flight = self.fk_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.fk_max_in_flight.fetch_max(in_flight, Ordering::SeqCst);
        let delay = self.fk_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay as u64)).await;
        }
        self.fk_in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fk_fail.load(Ordering::SeqCst)
            || self
                .fk_fail_low_frequencies
                .lock()
                .unwrap()
                .contains(&request.low_frequency)
        {
            return Err(ComputeError::collaborator("compute-fk", "service unavailable"));
        }
        if self.fk_empty.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(vec![fk_segment(&self.next_id("fk-wire"), request)])
    }
}

#[async_trait]
impl BeamFormingService for FakeUpstream {
    async fn compute_beam(
        &self,
        request: &BeamFormingRequest,
    ) -> CollaboratorResult<Vec<WireChannelSegment>> {
        self.beam_requests.lock().unwrap().push(request.clone());
        if self.beam_fail.load(Ordering::SeqCst) {
            return Err(ComputeError::collaborator("compute-beam", "service unavailable"));
        }
        if self.beam_empty.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(vec![waveform_segment(
            &self.next_id("beam"),
            &format!("{}.beam", request.output_channel_id),
            ChannelSegmentType::DetectionBeam,
            ARRIVAL_TIME - 30.0,
            ARRIVAL_TIME + 60.0,
        )])
    }
}

#[async_trait]
impl WaveformFilterService for FakeUpstream {
    async fn filter_segments(
        &self,
        segments: &[WireChannelSegment],
    ) -> CollaboratorResult<Vec<WireFilteredSegment>> {
        self.filter_calls.fetch_add(1, Ordering::SeqCst);
        if self.filter_fail.load(Ordering::SeqCst) {
            return Err(ComputeError::collaborator("filter-waveforms", "service unavailable"));
        }
        Ok(segments
            .iter()
            .map(|s| WireFilteredSegment {
                filter_id: FILTER_ID.to_string(),
                channel_segment: WireChannelSegment {
                    id: self.next_id("filtered"),
                    segment_type: ChannelSegmentType::Filter,
                    ..s.clone()
                },
            })
            .collect())
    }
}

#[async_trait]
impl SignalDetectionStore for FakeUpstream {
    async fn signal_detection(&self, id: &str) -> CollaboratorResult<Option<SignalDetection>> {
        Ok(self.detections.lock().unwrap().get(id).cloned())
    }

    async fn store_signal_detection(&self, detection: &SignalDetection) -> CollaboratorResult<()> {
        if self.store_fail.load(Ordering::SeqCst) {
            return Err(ComputeError::collaborator("signal-detection-store", "write rejected"));
        }
        self.stored.lock().unwrap().push(detection.clone());
        self.add_detection(detection.clone());
        Ok(())
    }
}

#[async_trait]
impl StationLookup for FakeUpstream {
    async fn station(&self, id: &str) -> CollaboratorResult<Option<ProcessingStation>> {
        Ok(self.stations.lock().unwrap().get(id).cloned())
    }
}

/// Collaborators backed entirely by `fake`, with default analysis config
pub fn collaborators(fake: &Arc<FakeUpstream>) -> Collaborators {
    collaborators_with_config(fake, TomlConfig::default())
}

pub fn collaborators_with_config(fake: &Arc<FakeUpstream>, config: TomlConfig) -> Collaborators {
    Collaborators {
        segments: fake.clone(),
        fk: fake.clone(),
        beam: fake.clone(),
        filter: fake.clone(),
        detections: fake.clone(),
        stations: fake.clone(),
        config: Arc::new(config),
    }
}

pub fn services(fake: &Arc<FakeUpstream>) -> (GatewayServices, EventBus) {
    let event_bus = EventBus::new(100);
    (GatewayServices::new(collaborators(fake), event_bus.clone()), event_bus)
}

/// Everything emitted so far
pub fn drain(rx: &mut broadcast::Receiver<GatewayEvent>) -> Vec<GatewayEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

pub fn station() -> ProcessingStation {
    let channel = |element: &str, north: f64| ProcessingChannel {
        id: format!("ASAR.{}.SHZ", element),
        name: format!("ASAR.{}.SHZ", element),
        sample_rate: 40.0,
        position: RelativePosition {
            north_displacement_km: north,
            ..Default::default()
        },
    };
    ProcessingStation {
        id: STATION_ID.to_string(),
        name: STATION_ID.to_string(),
        location: Location {
            latitude_degrees: -23.665,
            longitude_degrees: 133.905,
            elevation_km: 0.6,
            depth_km: 0.0,
        },
        channels: vec![channel("AS01", 0.0), channel("AS02", 1.2)],
    }
}

fn measurement(
    kind: FeatureMeasurementType,
    value: MeasurementValue,
    channel_segment_id: &str,
) -> FeatureMeasurement {
    FeatureMeasurement {
        id: format!("fm-{:?}", kind),
        feature_measurement_type: kind,
        measurement_value: value,
        channel_segment_id: channel_segment_id.to_string(),
    }
}

/// sd-1: P arrival at 1000 s on the arrival beam, azimuth and slowness
/// pointing at a prior FK
pub fn detection() -> SignalDetection {
    SignalDetection {
        id: SD_ID.to_string(),
        station_id: STATION_ID.to_string(),
        current_hypothesis: SignalDetectionHypothesis {
            id: "hyp-1".to_string(),
            rejected: false,
            feature_measurements: vec![
                measurement(
                    FeatureMeasurementType::ArrivalTime,
                    MeasurementValue::Instant {
                        value: ARRIVAL_TIME,
                        standard_deviation: 0.1,
                    },
                    ARRIVAL_SEGMENT_ID,
                ),
                measurement(
                    FeatureMeasurementType::ReceiverToSourceAzimuth,
                    MeasurementValue::Numeric {
                        reference_time: ARRIVAL_TIME,
                        value: 90.0,
                        standard_deviation: 5.0,
                    },
                    PRIOR_FK_ID,
                ),
                measurement(
                    FeatureMeasurementType::Slowness,
                    MeasurementValue::Numeric {
                        reference_time: ARRIVAL_TIME,
                        value: 11.1,
                        standard_deviation: 1.0,
                    },
                    PRIOR_FK_ID,
                ),
                measurement(
                    FeatureMeasurementType::Phase,
                    MeasurementValue::Phase {
                        phase: "P".to_string(),
                        confidence: 1.0,
                    },
                    "",
                ),
            ],
        },
    }
}

/// sd-1 without its azimuth measurement
pub fn detection_without_azimuth() -> SignalDetection {
    let mut detection = detection();
    detection
        .current_hypothesis
        .feature_measurements
        .retain(|fm| !fm.feature_measurement_type.is_azimuth());
    detection
}

pub fn fk_input() -> FkInput {
    let station = station();
    FkInput {
        station_id: STATION_ID.to_string(),
        signal_detection_id: SD_ID.to_string(),
        phase: "P".to_string(),
        frequency_band: FrequencyBand {
            min_frequency_hz: 1.0,
            max_frequency_hz: 3.0,
        },
        window_params: WindowParameters {
            window_type: Some("hanning".to_string()),
            lead_seconds: 1.0,
            length_seconds: 4.0,
            step_size: 1.0,
        },
        configuration: FkConfiguration {
            contributing_channels_configuration: station
                .channels
                .iter()
                .map(|c| ContributingChannel {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    enabled: true,
                })
                .collect(),
            maximum_slowness: 40.0,
            number_of_points: 3.0,
            ..FkConfiguration::default()
        },
    }
}

pub fn waveform_segment(
    id: &str,
    channel_id: &str,
    segment_type: ChannelSegmentType,
    start: f64,
    end: f64,
) -> WireChannelSegment {
    let sample_rate = 1.0;
    let sample_count = (end - start) as usize;
    WireChannelSegment {
        id: id.to_string(),
        channel_id: channel_id.to_string(),
        name: channel_id.to_string(),
        segment_type,
        start_time: to_wire_time(start),
        end_time: to_wire_time(end),
        timeseries: WireTimeseries::Waveform(vec![WireWaveform {
            start_time: to_wire_time(start),
            sample_rate,
            sample_count,
            values: (0..sample_count).map(|i| Some((i % 7) as f64)).collect(),
        }]),
        creation_info: None,
    }
}

/// FK response shaped by `request`: one 3x3 spectrum per requested sample
pub fn fk_segment(id: &str, request: &ComputeFkRequest) -> WireChannelSegment {
    let grid = |v: f64| vec![vec![Some(v); 3]; 3];
    let values = (0..request.sample_count)
        .map(|i| WireFkSpectrum {
            power: grid(i as f64),
            fstat: grid(0.5),
            quality: 1,
            attributes: vec![FkAttributes {
                azimuth: 45.0 + i as f64,
                slowness: 11.1,
                ..Default::default()
            }],
        })
        .collect();

    WireChannelSegment {
        id: id.to_string(),
        channel_id: request.output_channel_id.clone(),
        name: format!("{} FK", request.output_channel_id),
        segment_type: ChannelSegmentType::FkSpectra,
        start_time: request.start_time.clone(),
        end_time: request.start_time.clone(),
        timeseries: WireTimeseries::FkSpectra(vec![WireFkPowerSpectra {
            start_time: request.start_time.clone(),
            sample_rate: request.sample_rate,
            sample_count: request.sample_count,
            window_lead: request.window_lead.clone(),
            window_length: request.window_length.clone(),
            phase_type: request.phase_type.clone(),
            low_frequency: request.low_frequency,
            high_frequency: request.high_frequency,
            x_slow_start: request.slow_start_x,
            x_slow_delta: request.slow_delta_x,
            x_slow_count: request.slow_count_x,
            y_slow_start: request.slow_start_y,
            y_slow_delta: request.slow_delta_y,
            y_slow_count: request.slow_count_y,
            values,
        }]),
        creation_info: None,
    }
}
