//! FK (frequency-wavenumber) power spectra and FK request inputs

use super::channel_segment::Waveform;
use seis_common::config::FrequencyBandConfig;
use serde::{Deserialize, Serialize};

/// Scalar attributes of one FK spectrum
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FkAttributes {
    #[serde(default)]
    pub peak_f_stat: f64,
    #[serde(default)]
    pub azimuth: f64,
    #[serde(default)]
    pub slowness: f64,
    #[serde(default)]
    pub azimuth_uncertainty: f64,
    #[serde(default)]
    pub slowness_uncertainty: f64,
}

/// One spectrum: power and F-statistic grids over the slowness plane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FkPowerSpectrum {
    pub power: Vec<Vec<f64>>,
    pub fstat: Vec<Vec<f64>>,
    pub quality: i32,
    pub attributes: FkAttributes,
}

/// A channel allowed (or not) to contribute to an FK
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributingChannel {
    pub id: String,
    pub name: String,
    pub enabled: bool,
}

/// Analyst-facing FK configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FkConfiguration {
    pub contributing_channels_configuration: Vec<ContributingChannel>,
    /// Maximum slowness in s/deg
    pub maximum_slowness: f64,
    /// km/s
    pub medium_velocity: f64,
    pub normalize_waveforms: bool,
    pub number_of_points: f64,
    pub use_channel_vertical_offset: bool,
    pub lead_fk_spectrum_seconds: f64,
}

impl Default for FkConfiguration {
    fn default() -> Self {
        Self {
            contributing_channels_configuration: Vec::new(),
            maximum_slowness: 40.0,
            medium_velocity: 1.0,
            normalize_waveforms: false,
            number_of_points: 81.0,
            use_channel_vertical_offset: false,
            lead_fk_spectrum_seconds: 1.0,
        }
    }
}

/// Per-spectrum scalar series for plotting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FstatData {
    pub azimuth_wf: Waveform,
    pub slowness_wf: Waveform,
    pub fstat_wf: Waveform,
}

/// FK spectra timeseries: one spectrum per step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FkPowerSpectra {
    pub start_time: f64,
    pub sample_rate: f64,
    pub sample_count: usize,
    pub window_lead: f64,
    pub window_length: f64,
    pub step_size: f64,
    pub phase_type: String,
    pub low_frequency: f64,
    pub high_frequency: f64,
    pub x_slow_start: f64,
    pub x_slow_delta: f64,
    pub x_slow_count: usize,
    pub y_slow_start: f64,
    pub y_slow_delta: f64,
    pub y_slow_count: usize,
    pub reviewed: bool,
    pub spectrums: Vec<FkPowerSpectrum>,
    /// Index into `spectrums` of the representative spectrum
    pub lead_spectrum_index: Option<usize>,
    pub fstat_data: Option<FstatData>,
    pub configuration: FkConfiguration,
}

impl FkPowerSpectra {
    pub fn lead_spectrum(&self) -> Option<&FkPowerSpectrum> {
        self.lead_spectrum_index.and_then(|i| self.spectrums.get(i))
    }

    /// Index of the spectrum nearest `arrival_time - lead_fk_spectrum_seconds`
    ///
    /// The target time is clamped to the series start and the index to
    /// the last spectrum. `None` when there are no spectra.
    pub fn lead_index_for_arrival(&self, arrival_time: f64) -> Option<usize> {
        if self.spectrums.is_empty() {
            return None;
        }
        let lead_time =
            (arrival_time - self.configuration.lead_fk_spectrum_seconds).max(self.start_time);

        let rate = if self.step_size > 0.0 {
            1.0 / self.step_size
        } else {
            self.sample_rate
        };
        let position = ((lead_time - self.start_time) * rate).round();
        let last = self.spectrums.len() - 1;
        if !position.is_finite() || position <= 0.0 {
            return Some(0);
        }
        Some((position as usize).min(last))
    }

    /// Select and record the lead spectrum for an arrival
    pub fn select_lead_spectrum(&mut self, arrival_time: f64) -> Option<&FkPowerSpectrum> {
        self.lead_spectrum_index = self.lead_index_for_arrival(arrival_time);
        self.lead_spectrum()
    }

    /// Derive azimuth, slowness and F-statistic series, one value per spectrum
    pub fn plot_data(&self) -> FstatData {
        let series = |pick: fn(&FkAttributes) -> f64| Waveform {
            start_time: self.start_time + self.window_lead,
            sample_rate: self.sample_rate,
            sample_count: self.spectrums.len(),
            values: self.spectrums.iter().map(|s| pick(&s.attributes)).collect(),
        };
        FstatData {
            azimuth_wf: series(|a| a.azimuth),
            slowness_wf: series(|a| a.slowness),
            fstat_wf: series(|a| a.peak_f_stat),
        }
    }
}

/// Frequency band in Hz
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencyBand {
    pub min_frequency_hz: f64,
    pub max_frequency_hz: f64,
}

impl From<FrequencyBandConfig> for FrequencyBand {
    fn from(band: FrequencyBandConfig) -> Self {
        Self {
            min_frequency_hz: band.min_frequency_hz,
            max_frequency_hz: band.max_frequency_hz,
        }
    }
}

/// FK window parameters, seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowParameters {
    #[serde(default)]
    pub window_type: Option<String>,
    pub lead_seconds: f64,
    pub length_seconds: f64,
    pub step_size: f64,
}

/// Caller request to compute an FK for a signal detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FkInput {
    pub station_id: String,
    pub signal_detection_id: String,
    pub phase: String,
    pub frequency_band: FrequencyBand,
    pub window_params: WindowParameters,
    pub configuration: FkConfiguration,
}

/// Single-spectrum FK for one frequency band
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FkFrequencyThumbnail {
    pub frequency_band: FrequencyBand,
    pub fk_spectra: FkPowerSpectra,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FkFrequencyThumbnailBySdId {
    pub signal_detection_id: String,
    pub fk_frequency_thumbnails: Vec<FkFrequencyThumbnail>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkFksReviewedInput {
    pub signal_detection_ids: Vec<String>,
    pub reviewed: bool,
}
