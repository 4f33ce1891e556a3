//! Conversion between the OSD wire representation and internal models
//!
//! `from_wire` is where untrusted upstream data is sanitized: absent
//! samples and NaN grid cells become 0, missing creation metadata is
//! generated, and FK series are reset to unreviewed.

use crate::models::{
    ChannelSegment, CreationInfo, FkConfiguration, FkPowerSpectra, FkPowerSpectrum, Timeseries,
    Waveform,
};
use crate::wire::{
    WireChannelSegment, WireCreationInfo, WireFkPowerSpectra, WireFkSpectrum, WireTimeseries,
    WireWaveform,
};
use seis_common::time::{
    duration_to_seconds, now, seconds_to_duration, to_epoch_seconds, to_wire_time,
};
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_CREATOR_NAME: &str = "seis-gateway";
pub const DEFAULT_CREATOR_TYPE: &str = "ChannelSegment";

/// Convert a wire channel segment; `None` when it carries no series
pub fn from_wire(wire: &WireChannelSegment) -> Option<ChannelSegment> {
    if wire.timeseries.is_empty() {
        debug!(segment_id = %wire.id, "Wire channel segment has no timeseries");
        return None;
    }

    let timeseries = match &wire.timeseries {
        WireTimeseries::Waveform(series) => {
            Timeseries::Waveform(series.iter().map(waveform_from_wire).collect())
        }
        WireTimeseries::FkSpectra(series) => Timeseries::FkSpectra(
            series.iter().map(|s| fk_spectra_from_wire(&wire.id, s)).collect(),
        ),
    };

    let start_time = to_epoch_seconds(Some(&wire.start_time));
    let end_time = match &wire.timeseries {
        // FK segments span their spectra, whatever the wire end says
        WireTimeseries::FkSpectra(series) => match series.first() {
            Some(fk) if fk.sample_rate > 0.0 => start_time + fk.sample_count as f64 / fk.sample_rate,
            _ => to_epoch_seconds(Some(&wire.end_time)),
        },
        WireTimeseries::Waveform(_) => to_epoch_seconds(Some(&wire.end_time)),
    };

    Some(ChannelSegment {
        id: wire.id.clone(),
        channel_id: wire.channel_id.clone(),
        name: wire.name.clone(),
        segment_type: wire.segment_type,
        start_time,
        end_time,
        timeseries,
        creation_info: creation_info_from_wire(wire.creation_info.as_ref()),
    })
}

/// Convert an internal channel segment to the wire shape
pub fn to_wire(segment: &ChannelSegment) -> WireChannelSegment {
    let timeseries = match &segment.timeseries {
        Timeseries::Waveform(series) => {
            WireTimeseries::Waveform(series.iter().map(waveform_to_wire).collect())
        }
        Timeseries::FkSpectra(series) => {
            WireTimeseries::FkSpectra(series.iter().map(fk_spectra_to_wire).collect())
        }
    };

    let info = &segment.creation_info;
    WireChannelSegment {
        id: segment.id.clone(),
        channel_id: segment.channel_id.clone(),
        name: segment.name.clone(),
        segment_type: segment.segment_type,
        start_time: to_wire_time(segment.start_time),
        end_time: to_wire_time(segment.end_time),
        timeseries,
        creation_info: Some(WireCreationInfo {
            id: Some(non_empty_or_uuid(&info.id)),
            creation_time: Some(to_wire_time(info.creation_time)),
            creator_id: Some(non_empty_or_uuid(&info.creator_id)),
            creator_name: Some(non_empty_or(&info.creator_name, DEFAULT_CREATOR_NAME)),
            creator_type: Some(non_empty_or(&info.creator_type, DEFAULT_CREATOR_TYPE)),
        }),
    }
}

fn waveform_from_wire(wire: &WireWaveform) -> Waveform {
    Waveform {
        start_time: to_epoch_seconds(Some(&wire.start_time)),
        sample_rate: wire.sample_rate,
        sample_count: wire.sample_count,
        values: wire
            .values
            .iter()
            .map(|v| v.filter(|x| x.is_finite()).unwrap_or(0.0))
            .collect(),
    }
}

fn waveform_to_wire(waveform: &Waveform) -> WireWaveform {
    WireWaveform {
        start_time: to_wire_time(waveform.start_time),
        sample_rate: waveform.sample_rate,
        sample_count: waveform.sample_count,
        values: waveform.values.iter().map(|v| Some(*v)).collect(),
    }
}

/// Replace `null` and NaN grid cells with 0
pub fn sanitize_grid(grid: &[Vec<Option<f64>>]) -> Vec<Vec<f64>> {
    grid.iter()
        .map(|row| {
            row.iter()
                .map(|cell| match cell {
                    Some(v) if !v.is_nan() => *v,
                    _ => 0.0,
                })
                .collect()
        })
        .collect()
}

fn fk_spectrum_from_wire(segment_id: &str, wire: &WireFkSpectrum) -> FkPowerSpectrum {
    let attributes = match wire.attributes.first() {
        Some(attributes) => *attributes,
        None => {
            warn!(segment_id = %segment_id, "FK spectrum without attributes; using zeros");
            Default::default()
        }
    };
    FkPowerSpectrum {
        power: sanitize_grid(&wire.power),
        fstat: sanitize_grid(&wire.fstat),
        quality: wire.quality,
        attributes,
    }
}

fn fk_spectra_from_wire(segment_id: &str, wire: &WireFkPowerSpectra) -> FkPowerSpectra {
    let step_size = if wire.sample_rate > 0.0 {
        1.0 / wire.sample_rate
    } else {
        0.0
    };
    let mut spectra = FkPowerSpectra {
        start_time: to_epoch_seconds(Some(&wire.start_time)),
        sample_rate: wire.sample_rate,
        sample_count: wire.sample_count,
        window_lead: duration_to_seconds(Some(&wire.window_lead)),
        window_length: duration_to_seconds(Some(&wire.window_length)),
        step_size,
        phase_type: wire.phase_type.clone(),
        low_frequency: wire.low_frequency,
        high_frequency: wire.high_frequency,
        x_slow_start: wire.x_slow_start,
        x_slow_delta: wire.x_slow_delta,
        x_slow_count: wire.x_slow_count,
        y_slow_start: wire.y_slow_start,
        y_slow_delta: wire.y_slow_delta,
        y_slow_count: wire.y_slow_count,
        reviewed: false,
        spectrums: wire
            .values
            .iter()
            .map(|s| fk_spectrum_from_wire(segment_id, s))
            .collect(),
        lead_spectrum_index: None,
        fstat_data: None,
        configuration: FkConfiguration::default(),
    };
    spectra.fstat_data = Some(spectra.plot_data());
    spectra
}

fn fk_spectra_to_wire(spectra: &FkPowerSpectra) -> WireFkPowerSpectra {
    let grid = |g: &Vec<Vec<f64>>| -> Vec<Vec<Option<f64>>> {
        g.iter().map(|row| row.iter().map(|v| Some(*v)).collect()).collect()
    };
    WireFkPowerSpectra {
        start_time: to_wire_time(spectra.start_time),
        sample_rate: spectra.sample_rate,
        sample_count: spectra.sample_count,
        window_lead: seconds_to_duration(spectra.window_lead),
        window_length: seconds_to_duration(spectra.window_length),
        phase_type: spectra.phase_type.clone(),
        low_frequency: spectra.low_frequency,
        high_frequency: spectra.high_frequency,
        x_slow_start: spectra.x_slow_start,
        x_slow_delta: spectra.x_slow_delta,
        x_slow_count: spectra.x_slow_count,
        y_slow_start: spectra.y_slow_start,
        y_slow_delta: spectra.y_slow_delta,
        y_slow_count: spectra.y_slow_count,
        values: spectra
            .spectrums
            .iter()
            .map(|s| WireFkSpectrum {
                power: grid(&s.power),
                fstat: grid(&s.fstat),
                quality: s.quality,
                attributes: vec![s.attributes],
            })
            .collect(),
    }
}

fn creation_info_from_wire(wire: Option<&WireCreationInfo>) -> CreationInfo {
    let empty = WireCreationInfo::default();
    let wire = wire.unwrap_or(&empty);
    let creation_time = match wire.creation_time.as_deref() {
        Some(t) => to_epoch_seconds(Some(t)),
        None => epoch_seconds_now(),
    };
    CreationInfo {
        id: wire.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string()),
        creation_time,
        creator_id: wire
            .creator_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        creator_name: wire
            .creator_name
            .clone()
            .unwrap_or_else(|| DEFAULT_CREATOR_NAME.to_string()),
        creator_type: wire
            .creator_type
            .clone()
            .unwrap_or_else(|| DEFAULT_CREATOR_TYPE.to_string()),
    }
}

/// Fresh creation metadata for segments produced inside the gateway
pub fn new_creation_info() -> CreationInfo {
    creation_info_from_wire(None)
}

fn epoch_seconds_now() -> f64 {
    let t = now();
    t.timestamp() as f64 + f64::from(t.timestamp_subsec_nanos()) / 1_000_000_000.0
}

fn non_empty_or_uuid(value: &str) -> String {
    if value.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        value.to_string()
    }
}

fn non_empty_or(value: &str, default: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}
