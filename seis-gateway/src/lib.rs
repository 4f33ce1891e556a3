//! seis-gateway library interface
//!
//! Channel segment caching and FK/beam orchestration for signal detections.

pub mod api;
pub mod cache;
pub mod clients;
pub mod collaborators;
pub mod converter;
pub mod error;
pub mod models;
pub mod services;
pub mod wire;

pub use crate::error::{ApiError, ApiResult, ComputeError};

use crate::cache::ChannelSegmentCache;
use crate::collaborators::{Collaborators, SignalDetectionStore};
use crate::services::{BeamOrchestrator, ChannelSegmentService, FkOrchestrator};
use axum::Router;
use chrono::{DateTime, Utc};
use seis_common::events::EventBus;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Services sharing one segment cache
pub struct GatewayServices {
    pub segments: Arc<ChannelSegmentService>,
    pub beams: Arc<BeamOrchestrator>,
    pub fk: Arc<FkOrchestrator>,
    pub detections: Arc<dyn SignalDetectionStore>,
}

impl GatewayServices {
    /// Wire the orchestrators over `collaborators` with a fresh cache
    pub fn new(collaborators: Collaborators, event_bus: EventBus) -> Self {
        let cache = Arc::new(ChannelSegmentCache::new());
        Self::with_cache(collaborators, event_bus, cache)
    }

    pub fn with_cache(
        collaborators: Collaborators,
        event_bus: EventBus,
        cache: Arc<ChannelSegmentCache>,
    ) -> Self {
        let segments = Arc::new(ChannelSegmentService::new(
            cache,
            Arc::clone(&collaborators.segments),
            Arc::clone(&collaborators.stations),
        ));

        let beams = Arc::new(BeamOrchestrator::new(
            Arc::clone(&segments),
            Arc::clone(&collaborators.beam),
            Arc::clone(&collaborators.filter),
            Arc::clone(&collaborators.stations),
            Arc::clone(&collaborators.config),
            event_bus.clone(),
        ));

        let fk = Arc::new(FkOrchestrator::new(
            Arc::clone(&segments),
            Arc::clone(&collaborators.fk),
            Arc::clone(&collaborators.detections),
            Arc::clone(&collaborators.config),
            Arc::clone(&beams),
            event_bus,
        ));

        Self {
            segments,
            beams,
            fk,
            detections: collaborators.detections,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<GatewayServices>,
    /// Event bus the orchestrators publish to
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(collaborators: Collaborators, event_bus: EventBus) -> Self {
        let services = GatewayServices::new(collaborators, event_bus.clone());
        Self {
            services: Arc::new(services),
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::fk_routes())
        .merge(api::segment_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
