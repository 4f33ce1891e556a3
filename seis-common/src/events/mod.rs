//! Event types for the gateway event system
//!
//! Provides the shared `GatewayEvent` definitions and the `EventBus` that
//! carries them to downstream consumers (feature-measurement update
//! pipeline, subscriptions, audit logging).

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Gateway event types
///
/// Events are broadcast via EventBus and can be serialized for
/// transmission to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GatewayEvent {
    /// One or more feature measurements now reference a different channel segment
    ///
    /// Triggers:
    /// - Feature measurement update pipeline: re-read the claim-check id
    FeatureMeasurementsUpdated {
        signal_detection_id: String,
        /// New claim-check id carried by the measurements
        channel_segment_id: String,
        /// Feature measurement type names that were rewritten
        measurement_types: Vec<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A new FK spectra channel segment was computed and cached
    FkSpectraComputed {
        signal_detection_id: String,
        channel_segment_id: String,
        spectrum_count: usize,
        lead_spectrum_index: Option<usize>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A new beam channel segment was computed and cached
    BeamComputed {
        signal_detection_id: String,
        channel_segment_id: String,
        contributing_channels: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The reviewed flag of a cached FK changed
    FkReviewedChanged {
        signal_detection_id: String,
        channel_segment_id: String,
        reviewed: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Frequency thumbnails were computed for a signal detection
    FkThumbnailsComputed {
        signal_detection_id: String,
        band_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl GatewayEvent {
    /// Short event type name, matching the serde tag
    pub fn event_type(&self) -> &'static str {
        match self {
            GatewayEvent::FeatureMeasurementsUpdated { .. } => "FeatureMeasurementsUpdated",
            GatewayEvent::FkSpectraComputed { .. } => "FkSpectraComputed",
            GatewayEvent::BeamComputed { .. } => "BeamComputed",
            GatewayEvent::FkReviewedChanged { .. } => "FkReviewedChanged",
            GatewayEvent::FkThumbnailsComputed { .. } => "FkThumbnailsComputed",
        }
    }

    /// Signal detection the event concerns
    pub fn signal_detection_id(&self) -> &str {
        match self {
            GatewayEvent::FeatureMeasurementsUpdated { signal_detection_id, .. }
            | GatewayEvent::FkSpectraComputed { signal_detection_id, .. }
            | GatewayEvent::BeamComputed { signal_detection_id, .. }
            | GatewayEvent::FkReviewedChanged { signal_detection_id, .. }
            | GatewayEvent::FkThumbnailsComputed { signal_detection_id, .. } => signal_detection_id,
        }
    }
}

/// Central event distribution bus
///
/// Cloning the bus shares the underlying channel.
///
/// # Examples
///
/// ```
/// use seis_common::events::{EventBus, GatewayEvent};
///
/// let event_bus = EventBus::new(100);
/// let mut rx = event_bus.subscribe();
///
/// event_bus.emit_lossy(GatewayEvent::FkThumbnailsComputed {
///     signal_detection_id: "sd-1".to_string(),
///     band_count: 5,
///     timestamp: chrono::Utc::now(),
/// });
///
/// assert_eq!(rx.try_recv().unwrap().event_type(), "FkThumbnailsComputed");
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GatewayEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per subscriber before
    /// the oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: GatewayEvent,
    ) -> Result<usize, broadcast::error::SendError<GatewayEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: GatewayEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event dropped: no subscribers");
        }
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
