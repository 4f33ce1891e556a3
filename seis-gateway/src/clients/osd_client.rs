//! OSD and signal-enhancement HTTP client
//!
//! Every upstream call is a JSON POST to an endpoint configured under
//! `[services]`. Transport and decode failures surface as
//! `ComputeError::Collaborator`; the caller decides whether that is fatal.

use crate::collaborators::{
    BeamFormingService, ChannelSegmentSource, CollaboratorResult, FkComputeService,
    SignalDetectionStore, StationLookup, WaveformFilterService,
};
use crate::error::ComputeError;
use crate::models::{ProcessingStation, SignalDetection};
use crate::wire::{
    BeamFormingRequest, ChannelSegmentsByChannelsRequest, ChannelSegmentsByIdsRequest,
    ComputeFkRequest, WaveformFilterRequest, WireChannelSegment, WireFilteredSegment,
};
use async_trait::async_trait;
use reqwest::StatusCode;
use seis_common::config::ServicesConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("seis-gateway/", env!("CARGO_PKG_VERSION"));

/// HTTP client for every upstream collaborator
pub struct OsdClient {
    http_client: reqwest::Client,
    services: ServicesConfig,
}

impl OsdClient {
    pub fn new(services: ServicesConfig) -> Result<Self, ComputeError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(services.timeout_seconds))
            .build()
            .map_err(|e| ComputeError::collaborator("http", e))?;

        Ok(Self {
            http_client,
            services,
        })
    }

    /// POST `body` to `path`; `Ok(None)` for 404
    async fn send<B>(
        &self,
        service: &str,
        path: &str,
        body: &B,
    ) -> CollaboratorResult<Option<reqwest::Response>>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.services.url(path);
        debug!(service, url = %url, "Sending service request");

        let response = self
            .http_client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| ComputeError::collaborator(service, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(service, "Service returned 404");
            return Ok(None);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ComputeError::collaborator(
                service,
                format!("HTTP {}: {}", status.as_u16(), text),
            ));
        }
        Ok(Some(response))
    }

    /// POST and decode; `Ok(None)` for 404 or a JSON `null` body
    async fn post<B, R>(&self, service: &str, path: &str, body: &B) -> CollaboratorResult<Option<R>>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let Some(response) = self.send(service, path, body).await? else {
            return Ok(None);
        };
        response
            .json::<Option<R>>()
            .await
            .map_err(|e| ComputeError::collaborator(service, format!("decode: {}", e)))
    }
}

#[async_trait]
impl ChannelSegmentSource for OsdClient {
    async fn by_ids(&self, ids: &[String]) -> CollaboratorResult<Vec<WireChannelSegment>> {
        let request = ChannelSegmentsByIdsRequest {
            ids: ids.to_vec(),
            with_waveforms: true,
        };
        let segments: Option<HashMap<String, WireChannelSegment>> = self
            .post(
                "channel-segments-by-ids",
                &self.services.channel_segments_by_ids,
                &request,
            )
            .await?;
        Ok(segments.map(|m| m.into_values().collect()).unwrap_or_default())
    }

    async fn by_channels(
        &self,
        request: &ChannelSegmentsByChannelsRequest,
    ) -> CollaboratorResult<Vec<WireChannelSegment>> {
        let segments: Option<HashMap<String, WireChannelSegment>> = self
            .post(
                "channel-segments-by-channels",
                &self.services.channel_segments_by_channels,
                request,
            )
            .await?;
        Ok(segments.map(|m| m.into_values().collect()).unwrap_or_default())
    }
}

#[async_trait]
impl FkComputeService for OsdClient {
    async fn compute_fk(
        &self,
        request: &ComputeFkRequest,
    ) -> CollaboratorResult<Vec<WireChannelSegment>> {
        let segments: Option<Vec<WireChannelSegment>> = self
            .post("compute-fk", &self.services.compute_fk, request)
            .await?;
        Ok(segments.unwrap_or_default())
    }
}

#[async_trait]
impl BeamFormingService for OsdClient {
    async fn compute_beam(
        &self,
        request: &BeamFormingRequest,
    ) -> CollaboratorResult<Vec<WireChannelSegment>> {
        let segments: Option<Vec<WireChannelSegment>> = self
            .post("compute-beam", &self.services.compute_beam, request)
            .await?;
        Ok(segments.unwrap_or_default())
    }
}

#[async_trait]
impl WaveformFilterService for OsdClient {
    async fn filter_segments(
        &self,
        segments: &[WireChannelSegment],
    ) -> CollaboratorResult<Vec<WireFilteredSegment>> {
        let request = WaveformFilterRequest {
            channel_segments: segments.to_vec(),
        };
        let filtered: Option<Vec<WireFilteredSegment>> = self
            .post("filter-waveforms", &self.services.filter_waveforms, &request)
            .await?;
        Ok(filtered.unwrap_or_default())
    }
}

#[async_trait]
impl SignalDetectionStore for OsdClient {
    async fn signal_detection(&self, id: &str) -> CollaboratorResult<Option<SignalDetection>> {
        self.post(
            "signal-detection-by-id",
            &self.services.signal_detection_by_id,
            &json!({ "id": id }),
        )
        .await
    }

    async fn store_signal_detection(&self, detection: &SignalDetection) -> CollaboratorResult<()> {
        self.send(
            "signal-detection-store",
            &self.services.signal_detection_store,
            detection,
        )
        .await?
        .ok_or_else(|| ComputeError::NotFound(format!("signal detection {}", detection.id)))?;
        Ok(())
    }
}

#[async_trait]
impl StationLookup for OsdClient {
    async fn station(&self, id: &str) -> CollaboratorResult<Option<ProcessingStation>> {
        self.post(
            "station-by-id",
            &self.services.station_by_id,
            &json!({ "id": id }),
        )
        .await
    }
}
