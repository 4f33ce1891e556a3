//! FK computation for signal detections
//!
//! `compute_fk` walks one `FkComputation` through its states:
//! resolve inputs, build the request, call the FK service, post-process,
//! cache under a fresh id, repoint the azimuth and slowness measurements,
//! then recompute the beam. Nothing is mutated before the FK is cached,
//! and a beam failure never undoes the FK update.
//!
//! Computations for one signal detection are serialized behind a
//! per-detection lock. Every call still caches a new segment; identical
//! inputs are not deduplicated.

use super::beam_orchestrator::{BeamOrchestrator, BeamOutcome};
use super::fk_support::{build_compute_fk_request, finalize_computed_spectra, FkRequestMode};
use super::segment_service::ChannelSegmentService;
use crate::collaborators::{AnalysisConfig, FkComputeService, SignalDetectionStore};
use crate::converter::from_wire;
use crate::error::ComputeError;
use crate::models::{
    ChannelSegment, ChannelSegmentType, FeatureMeasurementType, FkComputation, FkComputeState,
    FkFrequencyThumbnail, FkFrequencyThumbnailBySdId, FkInput, FkPowerSpectra, FrequencyBand,
    MarkFksReviewedInput, SignalDetection,
};
use crate::wire::ComputeFkRequest;
use futures::future::join_all;
use seis_common::events::{EventBus, GatewayEvent};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Result of a successful `compute_fk`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FkComputeOutcome {
    pub computation: FkComputation,
    /// The detection as stored after the FK (and beam, if any) update
    pub signal_detection: SignalDetection,
    pub fk_segment_id: String,
    pub beam: BeamOutcome,
}

/// Detection, arrival time and arrival segment an FK request is built from
struct ResolvedInputs {
    detection: SignalDetection,
    arrival_time: f64,
    arrival_segment: Arc<ChannelSegment>,
}

pub struct FkOrchestrator {
    segments: Arc<ChannelSegmentService>,
    fk: Arc<dyn FkComputeService>,
    detections: Arc<dyn SignalDetectionStore>,
    config: Arc<dyn AnalysisConfig>,
    beams: Arc<BeamOrchestrator>,
    event_bus: EventBus,
    build_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FkOrchestrator {
    pub fn new(
        segments: Arc<ChannelSegmentService>,
        fk: Arc<dyn FkComputeService>,
        detections: Arc<dyn SignalDetectionStore>,
        config: Arc<dyn AnalysisConfig>,
        beams: Arc<BeamOrchestrator>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            segments,
            fk,
            detections,
            config,
            beams,
            event_bus,
            build_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Compute a new FK for `input.signal_detection_id`
    ///
    /// Waits for any computation already running for the same detection.
    pub async fn compute_fk(&self, input: &FkInput) -> Result<FkComputeOutcome, ComputeError> {
        let lock = self.build_lock(&input.signal_detection_id).await;
        let result = {
            let _guard = lock.lock().await;
            let mut computation = FkComputation::new(input.signal_detection_id.clone());
            match self.run_computation(input, &mut computation).await {
                Ok((signal_detection, fk_segment_id, beam)) => Ok(FkComputeOutcome {
                    computation,
                    signal_detection,
                    fk_segment_id,
                    beam,
                }),
                Err(e) => {
                    computation.transition_to(FkComputeState::Failed);
                    warn!(
                        signal_detection_id = %input.signal_detection_id,
                        computation_id = %computation.id,
                        error = %e,
                        "FK computation failed"
                    );
                    Err(e)
                }
            }
        };
        drop(lock);
        self.prune_build_locks().await;
        result
    }

    async fn run_computation(
        &self,
        input: &FkInput,
        computation: &mut FkComputation,
    ) -> Result<(SignalDetection, String, BeamOutcome), ComputeError> {
        computation.transition_to(FkComputeState::BuildingRequest);
        let resolved = self.resolve_inputs(&input.signal_detection_id, true).await?;
        let pattern = self.config.vertical_channel_pattern();
        let request = build_compute_fk_request(
            input,
            resolved.arrival_time,
            &resolved.arrival_segment,
            FkRequestMode::Normal,
            &pattern,
        )?;

        computation.transition_to(FkComputeState::AwaitingService);
        debug!(
            signal_detection_id = %input.signal_detection_id,
            channels = request.channel_ids.len(),
            sample_count = request.sample_count,
            "Requesting FK"
        );
        let mut segment = self
            .request_fk_segment(&input.signal_detection_id, &request)
            .await?;

        computation.transition_to(FkComputeState::PostProcessing);
        let Some(spectra) = segment.fk_spectra_mut() else {
            return Err(ComputeError::EmptyResult("compute-fk".to_string()));
        };
        finalize_computed_spectra(spectra, input, resolved.arrival_time, &pattern);
        let spectrum_count = spectra.spectrums.len();
        let lead_spectrum_index = spectra.lead_spectrum_index;

        segment.id = Uuid::new_v4().to_string();
        segment.segment_type = ChannelSegmentType::FkSpectra;
        let fk_segment = self.segments.cache().put(segment).await;

        computation.transition_to(FkComputeState::UpdatingDetection);
        let mut detection = resolved.detection;
        let updated_types = repoint_fk_measurements(&mut detection, &fk_segment.id);
        self.detections.store_signal_detection(&detection).await?;

        info!(
            signal_detection_id = %detection.id,
            segment_id = %fk_segment.id,
            spectrum_count,
            "FK computed"
        );
        self.event_bus.emit_lossy(GatewayEvent::FkSpectraComputed {
            signal_detection_id: detection.id.clone(),
            channel_segment_id: fk_segment.id.clone(),
            spectrum_count,
            lead_spectrum_index,
            timestamp: chrono::Utc::now(),
        });
        self.event_bus.emit_lossy(GatewayEvent::FeatureMeasurementsUpdated {
            signal_detection_id: detection.id.clone(),
            channel_segment_id: fk_segment.id.clone(),
            measurement_types: updated_types,
            timestamp: chrono::Utc::now(),
        });

        computation.transition_to(FkComputeState::TriggeringBeam);
        let beam = self.trigger_beam(&mut detection).await;

        computation.transition_to(FkComputeState::Done);
        Ok((detection, fk_segment.id.clone(), beam))
    }

    /// Run the dependent beam step; failures are logged and reported, not returned
    async fn trigger_beam(&self, detection: &mut SignalDetection) -> BeamOutcome {
        let outcome = match self.beams.compute_beam(detection).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    signal_detection_id = %detection.id,
                    error = %e,
                    "Beam recomputation failed; FK update retained"
                );
                return BeamOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        if outcome.is_computed() {
            if let Err(e) = self.detections.store_signal_detection(detection).await {
                warn!(
                    signal_detection_id = %detection.id,
                    error = %e,
                    "Failed to store signal detection after beam update"
                );
                return BeamOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        }
        outcome
    }

    /// Call the FK service and convert its first segment
    async fn request_fk_segment(
        &self,
        signal_detection_id: &str,
        request: &ComputeFkRequest,
    ) -> Result<ChannelSegment, ComputeError> {
        let response = self.fk.compute_fk(request).await?;
        match response.first().and_then(from_wire) {
            Some(segment) => Ok(segment),
            None => {
                error!(
                    signal_detection_id = %signal_detection_id,
                    "Compute FK returned no result"
                );
                Err(ComputeError::EmptyResult("compute-fk".to_string()))
            }
        }
    }

    /// Fetch the detection and its arrival segment
    ///
    /// Missing measurements are rejected before anything is fetched or cached.
    async fn resolve_inputs(
        &self,
        signal_detection_id: &str,
        require_azimuth: bool,
    ) -> Result<ResolvedInputs, ComputeError> {
        let detection = self
            .detections
            .signal_detection(signal_detection_id)
            .await?
            .ok_or_else(|| {
                ComputeError::NotFound(format!("signal detection {}", signal_detection_id))
            })?;

        let (arrival_time, arrival_segment_id) = match (
            detection.arrival_time(),
            detection.arrival_time_measurement(),
        ) {
            (Some(time), Some(fm)) => (time, fm.channel_segment_id.clone()),
            _ => {
                return Err(ComputeError::InvalidInput(format!(
                    "signal detection {} has no arrival time measurement",
                    signal_detection_id
                )))
            }
        };

        if require_azimuth && detection.azimuth_measurement().is_none() {
            return Err(ComputeError::InvalidInput(format!(
                "signal detection {} has no azimuth measurement",
                signal_detection_id
            )));
        }

        let arrival_segment = self
            .segments
            .get_channel_segment(&arrival_segment_id, Some(&detection))
            .await?
            .ok_or_else(|| {
                ComputeError::InvalidInput(format!(
                    "arrival channel segment {} is not available",
                    arrival_segment_id
                ))
            })?;

        Ok(ResolvedInputs {
            detection,
            arrival_time,
            arrival_segment,
        })
    }

    /// One single-spectrum FK per frequency band
    ///
    /// Bands run concurrently and independently. Nothing is cached and the
    /// detection is not touched; bands whose computation fails are left out.
    pub async fn compute_fk_frequency_thumbnails(
        &self,
        input: &FkInput,
        bands: Option<Vec<FrequencyBand>>,
    ) -> Result<FkFrequencyThumbnailBySdId, ComputeError> {
        let resolved = self.resolve_inputs(&input.signal_detection_id, false).await?;
        let pattern = self.config.vertical_channel_pattern();
        let bands = bands.unwrap_or_else(|| self.config.default_frequency_bands());

        let tasks = bands.into_iter().map(|band| {
            let band_input = FkInput {
                frequency_band: band,
                ..input.clone()
            };
            let resolved = &resolved;
            let pattern = pattern.as_str();
            async move {
                let result = self
                    .compute_thumbnail(&band_input, resolved, pattern)
                    .await;
                (band, result)
            }
        });

        let mut thumbnails = Vec::new();
        for (band, result) in join_all(tasks).await {
            match result {
                Ok(fk_spectra) => thumbnails.push(FkFrequencyThumbnail {
                    frequency_band: band,
                    fk_spectra,
                }),
                Err(e) => warn!(
                    signal_detection_id = %input.signal_detection_id,
                    min_frequency_hz = band.min_frequency_hz,
                    max_frequency_hz = band.max_frequency_hz,
                    error = %e,
                    "FK thumbnail failed for band"
                ),
            }
        }

        self.event_bus.emit_lossy(GatewayEvent::FkThumbnailsComputed {
            signal_detection_id: input.signal_detection_id.clone(),
            band_count: thumbnails.len(),
            timestamp: chrono::Utc::now(),
        });

        Ok(FkFrequencyThumbnailBySdId {
            signal_detection_id: resolved.detection.id.clone(),
            fk_frequency_thumbnails: thumbnails,
        })
    }

    async fn compute_thumbnail(
        &self,
        input: &FkInput,
        resolved: &ResolvedInputs,
        pattern: &str,
    ) -> Result<FkPowerSpectra, ComputeError> {
        let request = build_compute_fk_request(
            input,
            resolved.arrival_time,
            &resolved.arrival_segment,
            FkRequestMode::Thumbnail,
            pattern,
        )?;
        let mut segment = self
            .request_fk_segment(&input.signal_detection_id, &request)
            .await?;
        let Some(spectra) = segment.fk_spectra_mut() else {
            return Err(ComputeError::EmptyResult("compute-fk".to_string()));
        };
        finalize_computed_spectra(spectra, input, resolved.arrival_time, pattern);
        Ok(spectra.clone())
    }

    /// Set the reviewed flag on each detection's cached FK
    ///
    /// Returns the detections whose FK was updated. Detections without an
    /// azimuth measurement or a cached FK are skipped.
    pub async fn mark_fks_reviewed(&self, input: &MarkFksReviewedInput) -> Vec<SignalDetection> {
        let mut updated = Vec::new();
        for sd_id in &input.signal_detection_ids {
            let detection = match self.detections.signal_detection(sd_id).await {
                Ok(Some(detection)) => detection,
                Ok(None) => {
                    warn!(signal_detection_id = %sd_id, "Signal detection not found; FK review not updated");
                    continue;
                }
                Err(e) => {
                    warn!(signal_detection_id = %sd_id, error = %e, "Signal detection lookup failed");
                    continue;
                }
            };
            let Some(segment_id) = detection
                .azimuth_measurement()
                .map(|fm| fm.channel_segment_id.clone())
                .filter(|id| !id.is_empty())
            else {
                warn!(signal_detection_id = %sd_id, "No azimuth measurement; FK review not updated");
                continue;
            };

            let is_fk = self
                .segments
                .cache()
                .get_by_id(&segment_id)
                .await
                .map(|s| s.fk_spectra().is_some())
                .unwrap_or(false);
            if !is_fk {
                warn!(
                    signal_detection_id = %sd_id,
                    segment_id = %segment_id,
                    "FK channel segment not cached; review not updated"
                );
                continue;
            }

            self.segments
                .cache()
                .update(&segment_id, |segment| {
                    if let Some(spectra) = segment.fk_spectra_mut() {
                        spectra.reviewed = input.reviewed;
                    }
                })
                .await;

            self.event_bus.emit_lossy(GatewayEvent::FkReviewedChanged {
                signal_detection_id: detection.id.clone(),
                channel_segment_id: segment_id,
                reviewed: input.reviewed,
                timestamp: chrono::Utc::now(),
            });
            updated.push(detection);
        }
        updated
    }

    async fn build_lock(&self, signal_detection_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.build_locks.lock().await;
        Arc::clone(
            locks
                .entry(signal_detection_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Drop locks nobody is holding or waiting on
    async fn prune_build_locks(&self) {
        self.build_locks
            .lock()
            .await
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }
}

/// Point the azimuth and slowness measurements at `segment_id`
///
/// Returns the names of the measurement types that changed.
fn repoint_fk_measurements(detection: &mut SignalDetection, segment_id: &str) -> Vec<String> {
    let mut updated = Vec::new();
    if let Some(fm) = detection.azimuth_measurement_mut() {
        fm.channel_segment_id = segment_id.to_string();
        updated.push(fm.feature_measurement_type.as_str().to_string());
    }
    if let Some(fm) = detection.find_measurement_mut(&FeatureMeasurementType::Slowness) {
        fm.channel_segment_id = segment_id.to_string();
        updated.push(fm.feature_measurement_type.as_str().to_string());
    }
    updated
}
