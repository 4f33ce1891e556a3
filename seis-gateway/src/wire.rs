//! OSD wire representation
//!
//! Shapes exchanged with the upstream services. Instants are ISO-8601
//! strings, spans are ISO-8601 durations, sample values may be `null`.
//! Conversion to and from the internal models lives in `converter`.

use crate::models::{ChannelSegmentType, FkAttributes, Location, RelativePosition};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChannelSegment {
    pub id: String,
    pub channel_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub segment_type: ChannelSegmentType,
    pub start_time: String,
    pub end_time: String,
    #[serde(flatten)]
    pub timeseries: WireTimeseries,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_info: Option<WireCreationInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "timeseriesType", content = "timeseries", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireTimeseries {
    Waveform(Vec<WireWaveform>),
    FkSpectra(Vec<WireFkPowerSpectra>),
}

impl WireTimeseries {
    pub fn is_empty(&self) -> bool {
        match self {
            WireTimeseries::Waveform(series) => series.is_empty(),
            WireTimeseries::FkSpectra(series) => series.is_empty(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireWaveform {
    pub start_time: String,
    pub sample_rate: f64,
    pub sample_count: usize,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFkPowerSpectra {
    pub start_time: String,
    pub sample_rate: f64,
    pub sample_count: usize,
    /// ISO-8601 duration
    pub window_lead: String,
    /// ISO-8601 duration
    pub window_length: String,
    #[serde(default)]
    pub phase_type: String,
    #[serde(default)]
    pub low_frequency: f64,
    #[serde(default)]
    pub high_frequency: f64,
    pub x_slow_start: f64,
    pub x_slow_delta: f64,
    pub x_slow_count: usize,
    pub y_slow_start: f64,
    pub y_slow_delta: f64,
    pub y_slow_count: usize,
    pub values: Vec<WireFkSpectrum>,
}

/// One spectrum as the FK service emits it; `null` grid cells are NaN
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFkSpectrum {
    pub power: Vec<Vec<Option<f64>>>,
    pub fstat: Vec<Vec<Option<f64>>>,
    #[serde(default)]
    pub quality: i32,
    #[serde(default)]
    pub attributes: Vec<FkAttributes>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireCreationInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub creation_time: Option<String>,
    #[serde(default)]
    pub creator_id: Option<String>,
    #[serde(default)]
    pub creator_name: Option<String>,
    #[serde(default)]
    pub creator_type: Option<String>,
}

/// Body of the channel-segments-by-ids query
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSegmentsByIdsRequest {
    pub ids: Vec<String>,
    #[serde(rename = "with-waveforms")]
    pub with_waveforms: bool,
}

/// Body of the channel-segments-by-channels query
#[derive(Debug, Clone, Serialize)]
pub struct ChannelSegmentsByChannelsRequest {
    #[serde(rename = "channel-ids")]
    pub channel_ids: Vec<String>,
    #[serde(rename = "start-time")]
    pub start_time: String,
    #[serde(rename = "end-time")]
    pub end_time: String,
    #[serde(rename = "with-waveforms")]
    pub with_waveforms: bool,
}

/// Body of the FK compute call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeFkRequest {
    pub start_time: String,
    pub sample_rate: f64,
    pub sample_count: usize,
    pub channel_ids: Vec<String>,
    pub window_lead: String,
    pub window_length: String,
    pub low_frequency: f64,
    pub high_frequency: f64,
    pub use_channel_vertical_offset: bool,
    pub phase_type: String,
    pub normalize_waveforms: bool,
    pub output_channel_id: String,
    pub slow_start_x: f64,
    pub slow_start_y: f64,
    pub slow_delta_x: f64,
    pub slow_delta_y: f64,
    pub slow_count_x: usize,
    pub slow_count_y: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeamDefinition {
    pub phase_type: String,
    /// Degrees
    pub azimuth: f64,
    /// Seconds per kilometer
    pub slowness: f64,
    pub coherent: bool,
    pub snapped_sampling: bool,
    pub two_dimensional: bool,
    pub nominal_waveform_sample_rate: f64,
    pub waveform_sample_rate_tolerance: f64,
    pub beam_point: Location,
    pub relative_positions_by_channel_id: BTreeMap<String, RelativePosition>,
    pub minimum_waveforms_for_beam: u32,
}

/// Body of the beam compute call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeamFormingRequest {
    pub output_channel_id: String,
    pub waveforms: Vec<WireChannelSegment>,
    pub beam_definition: BeamDefinition,
}

/// Body of the waveform filter call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveformFilterRequest {
    pub channel_segments: Vec<WireChannelSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFilteredSegment {
    pub filter_id: String,
    pub channel_segment: WireChannelSegment,
}
