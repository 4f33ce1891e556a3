//! Data models for the seismic analysis gateway
//!
//! - Channel segments and their typed timeseries payloads
//! - FK power spectra and request inputs
//! - Signal detections and feature measurements (claim checks into the cache)
//! - Station geometry
//! - FK computation state machine

pub mod channel_segment;
pub mod fk;
pub mod fk_computation;
pub mod signal_detection;
pub mod station;

pub use channel_segment::{
    ChannelSegment, ChannelSegmentType, CreationInfo, Timeseries, TimeseriesType, Waveform,
};
pub use fk::{
    ContributingChannel, FkAttributes, FkConfiguration, FkFrequencyThumbnail,
    FkFrequencyThumbnailBySdId, FkInput, FkPowerSpectra, FkPowerSpectrum, FrequencyBand,
    FstatData, MarkFksReviewedInput, WindowParameters,
};
pub use fk_computation::{FkComputation, FkComputeState, StateTransition};
pub use signal_detection::{
    FeatureMeasurement, FeatureMeasurementType, MeasurementValue, SignalDetection,
    SignalDetectionHypothesis,
};
pub use station::{Location, ProcessingChannel, ProcessingStation, RelativePosition};
