//! Channel segment lookup endpoint

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::warn;

use crate::models::ChannelSegment;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentQuery {
    /// Needed to finalize FK segments fetched from the OSD
    pub signal_detection_id: Option<String>,
}

/// GET /channel-segments/:id
pub async fn get_channel_segment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<SegmentQuery>,
) -> ApiResult<Json<ChannelSegment>> {
    let detection = match query.signal_detection_id {
        Some(sd_id) => match state.services.detections.signal_detection(&sd_id).await {
            Ok(detection) => detection,
            Err(e) => {
                warn!(signal_detection_id = %sd_id, error = %e, "Signal detection lookup failed");
                None
            }
        },
        None => None,
    };

    let segment = state
        .services
        .segments
        .get_channel_segment(&id, detection.as_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("channel segment {}", id)))?;

    Ok(Json(ChannelSegment::clone(&segment)))
}

pub fn segment_routes() -> Router<AppState> {
    Router::new().route("/channel-segments/:id", get(get_channel_segment))
}
