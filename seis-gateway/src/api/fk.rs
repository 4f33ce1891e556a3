//! FK endpoints: compute, thumbnails, review toggle

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::models::{
    FkFrequencyThumbnailBySdId, FkInput, FrequencyBand, MarkFksReviewedInput, SignalDetection,
};
use crate::services::FkComputeOutcome;
use crate::{ApiResult, AppState};

/// POST /fk/compute
pub async fn compute_fk(
    State(state): State<AppState>,
    Json(input): Json<FkInput>,
) -> ApiResult<Json<FkComputeOutcome>> {
    let outcome = state.services.fk.compute_fk(&input).await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailRequest {
    pub input: FkInput,
    /// Configured default bands when absent
    #[serde(default)]
    pub frequency_bands: Option<Vec<FrequencyBand>>,
}

/// POST /fk/thumbnails
pub async fn compute_thumbnails(
    State(state): State<AppState>,
    Json(request): Json<ThumbnailRequest>,
) -> ApiResult<Json<FkFrequencyThumbnailBySdId>> {
    let thumbnails = state
        .services
        .fk
        .compute_fk_frequency_thumbnails(&request.input, request.frequency_bands)
        .await?;
    Ok(Json(thumbnails))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReviewedResponse {
    pub signal_detections: Vec<SignalDetection>,
}

/// POST /fk/reviewed
pub async fn mark_reviewed(
    State(state): State<AppState>,
    Json(input): Json<MarkFksReviewedInput>,
) -> Json<MarkReviewedResponse> {
    let signal_detections = state.services.fk.mark_fks_reviewed(&input).await;
    Json(MarkReviewedResponse { signal_detections })
}

pub fn fk_routes() -> Router<AppState> {
    Router::new()
        .route("/fk/compute", post(compute_fk))
        .route("/fk/thumbnails", post(compute_thumbnails))
        .route("/fk/reviewed", post(mark_reviewed))
}
