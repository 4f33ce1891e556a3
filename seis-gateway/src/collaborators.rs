//! Upstream collaborator interfaces
//!
//! Orchestrators hold these as trait objects so tests can substitute
//! in-memory fakes. The HTTP implementations live in `clients`.

use crate::error::ComputeError;
use crate::models::{FrequencyBand, ProcessingStation, SignalDetection};
use crate::wire::{
    BeamFormingRequest, ChannelSegmentsByChannelsRequest, ComputeFkRequest, WireChannelSegment,
    WireFilteredSegment,
};
use async_trait::async_trait;
use seis_common::config::{BeamDefaults, TomlConfig};
use std::sync::Arc;

pub type CollaboratorResult<T> = Result<T, ComputeError>;

/// Channel segment lookups against the OSD
#[async_trait]
pub trait ChannelSegmentSource: Send + Sync {
    async fn by_ids(&self, ids: &[String]) -> CollaboratorResult<Vec<WireChannelSegment>>;

    async fn by_channels(
        &self,
        request: &ChannelSegmentsByChannelsRequest,
    ) -> CollaboratorResult<Vec<WireChannelSegment>>;
}

/// FK spectra computation; an empty list means no result
#[async_trait]
pub trait FkComputeService: Send + Sync {
    async fn compute_fk(
        &self,
        request: &ComputeFkRequest,
    ) -> CollaboratorResult<Vec<WireChannelSegment>>;
}

/// Beam formation; an empty list means no result
#[async_trait]
pub trait BeamFormingService: Send + Sync {
    async fn compute_beam(
        &self,
        request: &BeamFormingRequest,
    ) -> CollaboratorResult<Vec<WireChannelSegment>>;
}

/// Applies the configured filter set to channel segments
#[async_trait]
pub trait WaveformFilterService: Send + Sync {
    async fn filter_segments(
        &self,
        segments: &[WireChannelSegment],
    ) -> CollaboratorResult<Vec<WireFilteredSegment>>;
}

#[async_trait]
pub trait SignalDetectionStore: Send + Sync {
    async fn signal_detection(&self, id: &str) -> CollaboratorResult<Option<SignalDetection>>;

    async fn store_signal_detection(&self, detection: &SignalDetection) -> CollaboratorResult<()>;
}

#[async_trait]
pub trait StationLookup: Send + Sync {
    async fn station(&self, id: &str) -> CollaboratorResult<Option<ProcessingStation>>;
}

/// Analysis defaults
pub trait AnalysisConfig: Send + Sync {
    fn beam_defaults(&self) -> BeamDefaults;

    /// Bands used for FK thumbnails when the caller names none
    fn default_frequency_bands(&self) -> Vec<FrequencyBand>;

    /// Substring identifying vertical channels allowed into an FK
    fn vertical_channel_pattern(&self) -> String;
}

impl AnalysisConfig for TomlConfig {
    fn beam_defaults(&self) -> BeamDefaults {
        self.beam.clone()
    }

    fn default_frequency_bands(&self) -> Vec<FrequencyBand> {
        self.fk
            .default_frequency_bands
            .iter()
            .copied()
            .map(FrequencyBand::from)
            .collect()
    }

    fn vertical_channel_pattern(&self) -> String {
        self.fk.vertical_channel_pattern.clone()
    }
}

/// The full set of collaborators a gateway instance talks to
#[derive(Clone)]
pub struct Collaborators {
    pub segments: Arc<dyn ChannelSegmentSource>,
    pub fk: Arc<dyn FkComputeService>,
    pub beam: Arc<dyn BeamFormingService>,
    pub filter: Arc<dyn WaveformFilterService>,
    pub detections: Arc<dyn SignalDetectionStore>,
    pub stations: Arc<dyn StationLookup>,
    pub config: Arc<dyn AnalysisConfig>,
}
