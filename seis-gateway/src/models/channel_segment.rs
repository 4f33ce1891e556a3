//! Channel segments: a time range of data on one channel
//!
//! The payload kind is an explicit discriminant (`Timeseries`), never
//! inferred from which fields happen to be present.

use super::fk::FkPowerSpectra;
use serde::{Deserialize, Serialize};

/// What produced the channel segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelSegmentType {
    Acquired,
    Raw,
    DetectionBeam,
    FkBeam,
    FkSpectra,
    Filter,
}

impl ChannelSegmentType {
    /// Beam kinds accept partial overlap on cache lookups
    pub fn is_beam(self) -> bool {
        matches!(self, ChannelSegmentType::DetectionBeam | ChannelSegmentType::FkBeam)
    }
}

/// Kind of series a channel segment carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeseriesType {
    Waveform,
    FkSpectra,
}

/// Evenly sampled waveform data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Waveform {
    pub start_time: f64,
    pub sample_rate: f64,
    pub sample_count: usize,
    pub values: Vec<f64>,
}

impl Waveform {
    /// Exclusive end of the sampled span
    pub fn end_time(&self) -> f64 {
        if self.sample_rate > 0.0 {
            self.start_time + self.sample_count as f64 / self.sample_rate
        } else {
            self.start_time
        }
    }
}

/// Typed timeseries payload of a channel segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "timeseriesType", content = "timeseries", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Timeseries {
    Waveform(Vec<Waveform>),
    FkSpectra(Vec<FkPowerSpectra>),
}

impl Timeseries {
    pub fn kind(&self) -> TimeseriesType {
        match self {
            Timeseries::Waveform(_) => TimeseriesType::Waveform,
            Timeseries::FkSpectra(_) => TimeseriesType::FkSpectra,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Timeseries::Waveform(series) => series.len(),
            Timeseries::FkSpectra(series) => series.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Who created a channel segment, and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationInfo {
    pub id: String,
    pub creation_time: f64,
    pub creator_id: String,
    pub creator_name: String,
    pub creator_type: String,
}

/// A channel segment in the internal numeric representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSegment {
    pub id: String,
    pub channel_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub segment_type: ChannelSegmentType,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(flatten)]
    pub timeseries: Timeseries,
    pub creation_info: CreationInfo,
}

impl ChannelSegment {
    pub fn timeseries_type(&self) -> TimeseriesType {
        self.timeseries.kind()
    }

    pub fn waveforms(&self) -> Option<&[Waveform]> {
        match &self.timeseries {
            Timeseries::Waveform(series) => Some(series),
            Timeseries::FkSpectra(_) => None,
        }
    }

    /// The FK spectra this segment carries (the first series)
    pub fn fk_spectra(&self) -> Option<&FkPowerSpectra> {
        match &self.timeseries {
            Timeseries::FkSpectra(series) => series.first(),
            Timeseries::Waveform(_) => None,
        }
    }

    pub fn fk_spectra_mut(&mut self) -> Option<&mut FkPowerSpectra> {
        match &mut self.timeseries {
            Timeseries::FkSpectra(series) => series.first_mut(),
            Timeseries::Waveform(_) => None,
        }
    }

    /// True when `[start, end)` intersects the segment's range
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        start < self.end_time && end > self.start_time
    }

    /// True when `[start, end)` lies entirely inside the segment's range
    pub fn contains(&self, start: f64, end: f64) -> bool {
        start >= self.start_time && end <= self.end_time
    }
}
