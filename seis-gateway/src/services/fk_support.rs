//! FK request construction and post-processing
//!
//! Pure functions shared by the FK orchestrator (normal and thumbnail
//! requests) and the channel segment service (FK segments fetched from
//! the OSD).

use crate::error::ComputeError;
use crate::models::{
    ChannelSegment, ContributingChannel, FkConfiguration, FkInput, FkPowerSpectra,
    ProcessingStation,
};
use crate::wire::ComputeFkRequest;
use seis_common::time::{calculate_fk_start_time, seconds_to_duration, to_wire_time};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometers per degree used when converting beam slowness
pub const KM_PER_DEGREE: f64 = 111.0;

/// Approximate great-circle degrees spanned by `km`
pub fn km_to_degrees(km: f64) -> f64 {
    km * (360.0 / (EARTH_RADIUS_KM * std::f64::consts::TAU))
}

/// Nominal medium velocity (km/s) for a phase label
pub fn medium_velocity_for_phase(phase: &str) -> f64 {
    let lower = phase.to_lowercase();
    if lower.starts_with('p') || lower.ends_with('p') {
        5.8
    } else if lower.starts_with('s') || lower.ends_with('s') {
        3.6
    } else if phase == "Lg" {
        3.5
    } else if phase == "Rg" {
        3.0
    } else {
        1.0
    }
}

/// Default FK configuration for a detection's phase and station
///
/// Every station channel starts out enabled.
pub fn default_fk_configuration(
    phase: &str,
    station: Option<&ProcessingStation>,
) -> FkConfiguration {
    let contributing_channels_configuration = station
        .map(|s| {
            s.channels
                .iter()
                .map(|c| ContributingChannel {
                    id: c.id.clone(),
                    name: c.name.clone(),
                    enabled: true,
                })
                .collect()
        })
        .unwrap_or_default();

    FkConfiguration {
        contributing_channels_configuration,
        medium_velocity: medium_velocity_for_phase(phase),
        ..FkConfiguration::default()
    }
}

/// Ids of enabled contributing channels whose name contains `pattern`
pub fn contributing_channel_ids(configuration: &FkConfiguration, pattern: &str) -> Vec<String> {
    configuration
        .contributing_channels_configuration
        .iter()
        .filter(|c| c.enabled && c.name.contains(pattern))
        .map(|c| c.id.clone())
        .collect()
}

/// One axis of a square slowness grid, symmetric about zero
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlownessAxis {
    pub start: f64,
    pub delta: f64,
    pub count: usize,
}

impl SlownessAxis {
    pub fn symmetric(maximum: f64, number_of_points: f64) -> Self {
        let delta = if number_of_points > 0.0 {
            maximum * 2.0 / number_of_points
        } else {
            0.0
        };
        Self {
            start: -maximum,
            delta,
            count: number_of_points.max(0.0).floor() as usize,
        }
    }
}

/// Normal requests step through the arrival segment; thumbnails ask for
/// exactly one spectrum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FkRequestMode {
    Normal,
    Thumbnail,
}

/// Build the FK service request for `input`
///
/// `arrival_segment` is the segment the detection's arrival time
/// measurement references; its span bounds the request.
pub fn build_compute_fk_request(
    input: &FkInput,
    arrival_time: f64,
    arrival_segment: &ChannelSegment,
    mode: FkRequestMode,
    vertical_channel_pattern: &str,
) -> Result<ComputeFkRequest, ComputeError> {
    let window = &input.window_params;
    if window.step_size.is_nan() || window.step_size <= 0.0 {
        return Err(ComputeError::InvalidInput(format!(
            "FK step size must be positive, got {}",
            window.step_size
        )));
    }

    let channel_ids = contributing_channel_ids(&input.configuration, vertical_channel_pattern);
    if channel_ids.is_empty() {
        return Err(ComputeError::InvalidInput(format!(
            "no enabled contributing channel matches '{}'",
            vertical_channel_pattern
        )));
    }

    let start_time = calculate_fk_start_time(
        arrival_segment.start_time,
        arrival_time,
        window.lead_seconds,
        window.step_size,
    )
    .ok_or_else(|| {
        ComputeError::InvalidInput(format!(
            "insufficient data before arrival {} for a {} s lead",
            arrival_time, window.lead_seconds
        ))
    })?;

    let (sample_rate, sample_count) = match mode {
        FkRequestMode::Normal => {
            let span = arrival_segment.end_time - arrival_segment.start_time;
            (1.0 / window.step_size, (span / window.step_size).floor().max(0.0) as usize)
        }
        FkRequestMode::Thumbnail => {
            let span = arrival_segment.end_time - start_time;
            if span.is_nan() || span <= 0.0 {
                return Err(ComputeError::InvalidInput(
                    "arrival segment ends before the FK start".to_string(),
                ));
            }
            (1.0 / span, 1)
        }
    };

    let slowness = SlownessAxis::symmetric(
        km_to_degrees(input.configuration.maximum_slowness),
        input.configuration.number_of_points,
    );

    Ok(ComputeFkRequest {
        start_time: to_wire_time(start_time),
        sample_rate,
        sample_count,
        channel_ids,
        window_lead: seconds_to_duration(window.lead_seconds),
        window_length: seconds_to_duration(window.length_seconds),
        low_frequency: input.frequency_band.min_frequency_hz,
        high_frequency: input.frequency_band.max_frequency_hz,
        use_channel_vertical_offset: input.configuration.use_channel_vertical_offset,
        phase_type: input.phase.clone(),
        normalize_waveforms: input.configuration.normalize_waveforms,
        output_channel_id: input.station_id.clone(),
        slow_start_x: slowness.start,
        slow_start_y: slowness.start,
        slow_delta_x: slowness.delta,
        slow_delta_y: slowness.delta,
        slow_count_x: slowness.count,
        slow_count_y: slowness.count,
    })
}

/// Caller configuration with channels outside the request disabled
pub fn merged_configuration(input: &FkInput, vertical_channel_pattern: &str) -> FkConfiguration {
    let requested = contributing_channel_ids(&input.configuration, vertical_channel_pattern);
    let config = &input.configuration;
    FkConfiguration {
        contributing_channels_configuration: config
            .contributing_channels_configuration
            .iter()
            .map(|c| ContributingChannel {
                enabled: c.enabled && requested.contains(&c.id),
                ..c.clone()
            })
            .collect(),
        lead_fk_spectrum_seconds: input.window_params.lead_seconds,
        ..config.clone()
    }
}

/// Stamp caller parameters onto freshly computed spectra
///
/// Resets review status, records window and slowness grid in the
/// caller's units, attaches the merged configuration, then selects the
/// lead spectrum and derives plot data.
pub fn finalize_computed_spectra(
    spectra: &mut FkPowerSpectra,
    input: &FkInput,
    arrival_time: f64,
    vertical_channel_pattern: &str,
) {
    let config = &input.configuration;
    let slowness = SlownessAxis::symmetric(config.maximum_slowness, config.number_of_points);

    spectra.reviewed = false;
    spectra.phase_type = input.phase.clone();
    spectra.low_frequency = input.frequency_band.min_frequency_hz;
    spectra.high_frequency = input.frequency_band.max_frequency_hz;
    spectra.window_lead = input.window_params.lead_seconds;
    spectra.window_length = input.window_params.length_seconds;
    spectra.step_size = input.window_params.step_size;
    spectra.x_slow_start = slowness.start;
    spectra.y_slow_start = slowness.start;
    spectra.x_slow_delta = slowness.delta;
    spectra.y_slow_delta = slowness.delta;
    spectra.x_slow_count = slowness.count;
    spectra.y_slow_count = slowness.count;
    spectra.configuration = merged_configuration(input, vertical_channel_pattern);

    spectra.select_lead_spectrum(arrival_time);
    spectra.fstat_data = Some(spectra.plot_data());
}

/// Attach default configuration, lead spectrum and plot data to spectra
/// fetched from the OSD
pub fn finalize_fetched_spectra(
    spectra: &mut FkPowerSpectra,
    phase: &str,
    arrival_time: f64,
    station: Option<&ProcessingStation>,
) {
    spectra.reviewed = false;
    spectra.configuration = default_fk_configuration(phase, station);
    spectra.select_lead_spectrum(arrival_time);
    spectra.fstat_data = Some(spectra.plot_data());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::new_creation_info;
    use crate::models::{
        ChannelSegmentType, FkAttributes, FkPowerSpectrum, FrequencyBand, ProcessingChannel,
        RelativePosition, Timeseries, Waveform, WindowParameters,
    };

    fn channel(id: &str, name: &str, enabled: bool) -> ContributingChannel {
        ContributingChannel {
            id: id.to_string(),
            name: name.to_string(),
            enabled,
        }
    }

    fn input() -> FkInput {
        FkInput {
            station_id: "ASAR".to_string(),
            signal_detection_id: "sd".to_string(),
            phase: "P".to_string(),
            frequency_band: FrequencyBand {
                min_frequency_hz: 1.0,
                max_frequency_hz: 3.0,
            },
            window_params: WindowParameters {
                window_type: None,
                lead_seconds: 7.0,
                length_seconds: 4.0,
                step_size: 10.0,
            },
            configuration: FkConfiguration {
                contributing_channels_configuration: vec![
                    channel("a", "ASAR.AS01.SHZ", true),
                    channel("b", "ASAR.AS02.SHZ", false),
                    channel("c", "ASAR.AS01.BHE", true),
                ],
                ..FkConfiguration::default()
            },
        }
    }

    fn arrival_segment(start: f64, end: f64) -> ChannelSegment {
        ChannelSegment {
            id: "arrival".to_string(),
            channel_id: "ASAR.beam".to_string(),
            name: "beam".to_string(),
            segment_type: ChannelSegmentType::DetectionBeam,
            start_time: start,
            end_time: end,
            timeseries: Timeseries::Waveform(vec![Waveform {
                start_time: start,
                sample_rate: 1.0,
                sample_count: 0,
                values: vec![],
            }]),
            creation_info: new_creation_info(),
        }
    }

    fn spectra(start: f64, count: usize, step: f64) -> FkPowerSpectra {
        FkPowerSpectra {
            start_time: start,
            sample_rate: 1.0 / step,
            sample_count: count,
            window_lead: 0.0,
            window_length: 0.0,
            step_size: step,
            phase_type: String::new(),
            low_frequency: 0.0,
            high_frequency: 0.0,
            x_slow_start: 0.0,
            x_slow_delta: 0.0,
            x_slow_count: 0,
            y_slow_start: 0.0,
            y_slow_delta: 0.0,
            y_slow_count: 0,
            reviewed: true,
            spectrums: (0..count)
                .map(|i| FkPowerSpectrum {
                    power: vec![],
                    fstat: vec![],
                    quality: 0,
                    attributes: FkAttributes {
                        azimuth: i as f64,
                        ..Default::default()
                    },
                })
                .collect(),
            lead_spectrum_index: None,
            fstat_data: None,
            configuration: FkConfiguration::default(),
        }
    }

    #[test]
    fn test_medium_velocity_by_phase() {
        assert_eq!(medium_velocity_for_phase("P"), 5.8);
        assert_eq!(medium_velocity_for_phase("PcP"), 5.8);
        assert_eq!(medium_velocity_for_phase("Sn"), 3.6);
        assert_eq!(medium_velocity_for_phase("Lg"), 3.5);
        assert_eq!(medium_velocity_for_phase("Rg"), 3.0);
        assert_eq!(medium_velocity_for_phase("Tx"), 1.0);
    }

    #[test]
    fn test_km_to_degrees() {
        let one_degree_km = EARTH_RADIUS_KM * std::f64::consts::TAU / 360.0;
        assert!((km_to_degrees(one_degree_km) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_slowness_axis_is_symmetric() {
        let axis = SlownessAxis::symmetric(40.0, 81.0);
        assert_eq!(axis.start, -40.0);
        assert_eq!(axis.count, 81);
        assert!((axis.delta - 80.0 / 81.0).abs() < 1e-12);
    }

    #[test]
    fn test_default_configuration_enables_station_channels() {
        let station = ProcessingStation {
            id: "ASAR".to_string(),
            name: "ASAR".to_string(),
            location: Default::default(),
            channels: vec![ProcessingChannel {
                id: "a".to_string(),
                name: "ASAR.AS01.SHZ".to_string(),
                sample_rate: 40.0,
                position: RelativePosition::default(),
            }],
        };
        let config = default_fk_configuration("S", Some(&station));
        assert_eq!(config.medium_velocity, 3.6);
        assert_eq!(config.maximum_slowness, 40.0);
        assert_eq!(config.number_of_points, 81.0);
        assert_eq!(config.lead_fk_spectrum_seconds, 1.0);
        assert!(config.contributing_channels_configuration[0].enabled);
    }

    #[test]
    fn test_only_enabled_vertical_channels_contribute() {
        assert_eq!(contributing_channel_ids(&input().configuration, "SHZ"), vec!["a"]);
    }

    #[test]
    fn test_normal_request() {
        let request =
            build_compute_fk_request(&input(), 60.0, &arrival_segment(0.0, 100.0), FkRequestMode::Normal, "SHZ")
                .unwrap();
        assert_eq!(request.start_time, to_wire_time(3.0));
        assert_eq!(request.sample_rate, 0.1);
        assert_eq!(request.sample_count, 10);
        assert_eq!(request.channel_ids, vec!["a"]);
        assert_eq!(request.window_lead, "PT7S");
        assert_eq!(request.output_channel_id, "ASAR");
        assert_eq!(request.slow_count_x, 81);
        assert_eq!(request.slow_start_x, -km_to_degrees(40.0));
        assert_eq!(request.slow_start_x, request.slow_start_y);
    }

    #[test]
    fn test_thumbnail_request_yields_single_spectrum() {
        let request = build_compute_fk_request(
            &input(),
            60.0,
            &arrival_segment(0.0, 100.0),
            FkRequestMode::Thumbnail,
            "SHZ",
        )
        .unwrap();
        assert_eq!(request.sample_count, 1);
        assert!((request.sample_rate - 1.0 / 97.0).abs() < 1e-12);
    }

    #[test]
    fn test_request_fails_without_pre_arrival_data() {
        let result = build_compute_fk_request(
            &input(),
            6.0,
            &arrival_segment(0.0, 100.0),
            FkRequestMode::Normal,
            "SHZ",
        );
        assert!(matches!(result, Err(ComputeError::InvalidInput(_))));
    }

    #[test]
    fn test_request_fails_without_channels() {
        let result = build_compute_fk_request(
            &input(),
            60.0,
            &arrival_segment(0.0, 100.0),
            FkRequestMode::Normal,
            "BHZ",
        );
        assert!(matches!(result, Err(ComputeError::InvalidInput(_))));
    }

    #[test]
    fn test_lead_spectrum_is_nearest_to_arrival_minus_lead() {
        // start 100, step 2, 10 spectra; arrival at k = 5, lead 1 s
        let mut s = spectra(100.0, 10, 2.0);
        s.configuration.lead_fk_spectrum_seconds = 1.0;
        assert_eq!(s.lead_index_for_arrival(110.0), Some(5));

        s.configuration.lead_fk_spectrum_seconds = 3.0;
        assert_eq!(s.lead_index_for_arrival(110.0), Some(4));

        // clamped at both ends
        assert_eq!(s.lead_index_for_arrival(50.0), Some(0));
        assert_eq!(s.lead_index_for_arrival(1000.0), Some(9));

        assert_eq!(spectra(100.0, 0, 2.0).lead_index_for_arrival(110.0), None);
    }

    #[test]
    fn test_finalize_computed_spectra() {
        let mut s = spectra(3.0, 5, 10.0);
        finalize_computed_spectra(&mut s, &input(), 60.0, "SHZ");

        assert!(!s.reviewed);
        assert_eq!(s.phase_type, "P");
        assert_eq!(s.window_lead, 7.0);
        assert_eq!(s.step_size, 10.0);
        assert_eq!(s.x_slow_start, -40.0);
        assert_eq!(s.configuration.lead_fk_spectrum_seconds, 7.0);
        // (60 - 7 - 3) / 10 = 5, clamped to last index
        assert_eq!(s.lead_spectrum_index, Some(4));

        let enabled: Vec<_> = s
            .configuration
            .contributing_channels_configuration
            .iter()
            .map(|c| c.enabled)
            .collect();
        assert_eq!(enabled, vec![true, false, false]);
        assert_eq!(s.fstat_data.unwrap().azimuth_wf.values.len(), 5);
    }
}
