//! In-memory channel segment cache
//!
//! Segments are held as immutable `Arc` snapshots. Updates build a new
//! snapshot and swap it in under the write lock; readers holding an old
//! snapshot never observe a partial change.

use crate::models::{ChannelSegment, ChannelSegmentType, Timeseries};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Result of a channel/time-range cache lookup
#[derive(Debug, Clone, Default)]
pub struct CacheResults {
    /// Segments satisfying the request, truncated to it
    pub hits: Vec<ChannelSegment>,
    /// Requested channel ids with no satisfying segment
    pub misses: Vec<String>,
}

#[derive(Debug, Default)]
pub struct ChannelSegmentCache {
    segments: RwLock<HashMap<String, Arc<ChannelSegment>>>,
}

impl ChannelSegmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by segment id
    pub async fn put(&self, segment: ChannelSegment) -> Arc<ChannelSegment> {
        let snapshot = Arc::new(segment);
        debug!(segment_id = %snapshot.id, "Caching channel segment");
        self.segments
            .write()
            .await
            .insert(snapshot.id.clone(), Arc::clone(&snapshot));
        snapshot
    }

    pub async fn get_by_id(&self, id: &str) -> Option<Arc<ChannelSegment>> {
        self.segments.read().await.get(id).cloned()
    }

    /// Look up segments for `channel_ids` covering `[start, end)`
    ///
    /// At most one hit is reported per channel; segments are never
    /// stitched together.
    pub async fn query_by_channels_and_range(
        &self,
        channel_ids: &[String],
        start: f64,
        end: f64,
        segment_type: ChannelSegmentType,
    ) -> CacheResults {
        let segments = self.segments.read().await;
        let mut results = CacheResults::default();

        for channel_id in channel_ids {
            let hit = segments
                .values()
                .find(|s| is_hit(s, channel_id, start, end, segment_type));
            match hit {
                Some(segment) => results.hits.push(truncate(segment, start, end)),
                None => results.misses.push(channel_id.clone()),
            }
        }

        debug!(
            requested = channel_ids.len(),
            hits = results.hits.len(),
            misses = results.misses.len(),
            "Channel segment cache lookup"
        );
        results
    }

    /// Replace a cached segment with an edited copy
    ///
    /// Returns the new snapshot, or `None` if `id` is not cached.
    pub async fn update<F>(&self, id: &str, edit: F) -> Option<Arc<ChannelSegment>>
    where
        F: FnOnce(&mut ChannelSegment),
    {
        let mut segments = self.segments.write().await;
        let current = segments.get(id)?;
        let mut next = ChannelSegment::clone(current);
        edit(&mut next);
        let snapshot = Arc::new(next);
        segments.insert(id.to_string(), Arc::clone(&snapshot));
        Some(snapshot)
    }

    pub async fn len(&self) -> usize {
        self.segments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.segments.read().await.is_empty()
    }
}

/// Whether `segment` satisfies a request for `channel_id` over `[start, end)`
///
/// Beam kinds accept any overlap; every other kind requires the request
/// to lie entirely within the segment.
pub fn is_hit(
    segment: &ChannelSegment,
    channel_id: &str,
    start: f64,
    end: f64,
    segment_type: ChannelSegmentType,
) -> bool {
    if segment.channel_id != channel_id || segment.segment_type != segment_type {
        return false;
    }
    if segment_type.is_beam() {
        segment.overlaps(start, end)
    } else {
        segment.contains(start, end)
    }
}

/// Copy of `segment` limited to `[start, end)`
///
/// Only waveform series are cut; FK spectra come back unchanged.
pub fn truncate(segment: &ChannelSegment, start: f64, end: f64) -> ChannelSegment {
    let Timeseries::Waveform(series) = &segment.timeseries else {
        return segment.clone();
    };

    let start = start.max(segment.start_time);
    let end = end.min(segment.end_time).max(start);

    let waveforms = series
        .iter()
        .map(|wf| {
            let len = wf.values.len();
            let index = |t: f64| -> usize {
                let i = ((t - wf.start_time) * wf.sample_rate).floor();
                if i.is_finite() && i > 0.0 {
                    (i as usize).min(len)
                } else {
                    0
                }
            };
            let (first, last) = (index(start), index(end));
            let values = wf.values[first..last.max(first)].to_vec();
            let mut cut = wf.clone();
            if wf.sample_rate > 0.0 {
                cut.start_time = wf.start_time + first as f64 / wf.sample_rate;
            }
            cut.sample_count = values.len();
            cut.values = values;
            cut
        })
        .collect::<Vec<_>>();

    // Segment bounds follow the sample-aligned cut, not the requested range
    let (start_time, end_time) = match waveforms.first() {
        Some(wf) if wf.sample_rate > 0.0 => (wf.start_time, wf.end_time()),
        _ => (start, end),
    };

    ChannelSegment {
        start_time,
        end_time,
        timeseries: Timeseries::Waveform(waveforms),
        ..segment.clone()
    }
}
