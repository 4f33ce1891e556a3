//! Channel segment lookups: cache first, then the OSD
//!
//! Segments fetched upstream are converted, cached and returned. A cache
//! miss is never an error; an upstream failure degrades to whatever the
//! cache could satisfy.

use super::fk_support::finalize_fetched_spectra;
use crate::cache::ChannelSegmentCache;
use crate::collaborators::{ChannelSegmentSource, StationLookup};
use crate::converter::from_wire;
use crate::error::ComputeError;
use crate::models::{ChannelSegment, ChannelSegmentType, SignalDetection};
use crate::wire::ChannelSegmentsByChannelsRequest;
use seis_common::time::to_wire_time;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct ChannelSegmentService {
    cache: Arc<ChannelSegmentCache>,
    source: Arc<dyn ChannelSegmentSource>,
    stations: Arc<dyn StationLookup>,
}

impl ChannelSegmentService {
    pub fn new(
        cache: Arc<ChannelSegmentCache>,
        source: Arc<dyn ChannelSegmentSource>,
        stations: Arc<dyn StationLookup>,
    ) -> Self {
        Self {
            cache,
            source,
            stations,
        }
    }

    pub fn cache(&self) -> &Arc<ChannelSegmentCache> {
        &self.cache
    }

    /// Segment by id, fetched from the OSD on a cache miss
    ///
    /// FK segments fetched upstream need `detection` to pick their lead
    /// spectrum and default configuration; without it they are returned
    /// as converted.
    pub async fn get_channel_segment(
        &self,
        id: &str,
        detection: Option<&SignalDetection>,
    ) -> Result<Option<Arc<ChannelSegment>>, ComputeError> {
        if id.is_empty() {
            return Ok(None);
        }
        if let Some(cached) = self.cache.get_by_id(id).await {
            return Ok(Some(cached));
        }

        debug!(segment_id = %id, "Channel segment not cached; requesting from OSD");
        let fetched = self.source.by_ids(&[id.to_string()]).await?;
        let Some(wire) = fetched.iter().find(|s| s.id == id) else {
            debug!(
                segment_id = %id,
                returned = fetched.len(),
                "OSD returned no channel segment with the requested id"
            );
            return Ok(None);
        };
        let Some(mut segment) = from_wire(wire) else {
            debug!(segment_id = %id, "Channel segment from OSD has no timeseries");
            return Ok(None);
        };

        if segment.segment_type == ChannelSegmentType::FkSpectra {
            match detection {
                Some(sd) => self.finalize_fk(&mut segment, sd).await,
                None => error!(
                    segment_id = %id,
                    "FK channel segment requested without its signal detection"
                ),
            }
        }

        Ok(Some(self.cache.put(segment).await))
    }

    async fn finalize_fk(&self, segment: &mut ChannelSegment, detection: &SignalDetection) {
        let Some(arrival_time) = detection.arrival_time() else {
            warn!(
                signal_detection_id = %detection.id,
                "Signal detection has no arrival time; FK lead spectrum not selected"
            );
            return;
        };
        let phase = detection.phase().unwrap_or_default().to_string();
        let station = match self.stations.station(&detection.station_id).await {
            Ok(station) => station,
            Err(e) => {
                warn!(station_id = %detection.station_id, error = %e, "Station lookup failed");
                None
            }
        };
        if let Some(spectra) = segment.fk_spectra_mut() {
            finalize_fetched_spectra(spectra, &phase, arrival_time, station.as_ref());
        }
    }

    /// Segments of `segment_type` for each channel over `[start, end)`
    ///
    /// Only channels the cache cannot satisfy are requested upstream.
    pub async fn get_channel_segments_by_channels(
        &self,
        start: f64,
        end: f64,
        channel_ids: &[String],
        segment_type: ChannelSegmentType,
    ) -> Vec<ChannelSegment> {
        let results = self
            .cache
            .query_by_channels_and_range(channel_ids, start, end, segment_type)
            .await;
        let mut segments = results.hits;
        if results.misses.is_empty() {
            return segments;
        }

        let request = ChannelSegmentsByChannelsRequest {
            channel_ids: results.misses,
            start_time: to_wire_time(start),
            end_time: to_wire_time(end),
            with_waveforms: true,
        };
        let fetched = match self.source.by_channels(&request).await {
            Ok(fetched) => fetched,
            Err(e) => {
                error!(error = %e, "Failed to request channel segments; returning cached hits only");
                return segments;
            }
        };

        for wire in &fetched {
            let Some(segment) = from_wire(wire) else {
                continue;
            };
            let snapshot = self.cache.put(segment).await;
            if snapshot.segment_type == segment_type {
                segments.push(ChannelSegment::clone(&snapshot));
            }
        }
        segments
    }
}
