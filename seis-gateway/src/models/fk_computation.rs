//! FK computation state machine
//!
//! One FK computation progresses through:
//! IDLE → BUILDING_REQUEST → AWAITING_SERVICE → POST_PROCESSING →
//! UPDATING_DETECTION → TRIGGERING_BEAM → DONE
//!
//! Any step before UPDATING_DETECTION may end in FAILED, in which case
//! neither the cache nor the signal detection has been touched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FkComputeState {
    Idle,
    /// Locating arrival segment, contributing channels, slowness grid
    BuildingRequest,
    /// Waiting on the external FK service
    AwaitingService,
    /// Converting, selecting lead spectrum, deriving plot data
    PostProcessing,
    /// FK cached; rewriting feature measurement claim checks
    UpdatingDetection,
    TriggeringBeam,
    Done,
    Failed,
}

impl FkComputeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, FkComputeState::Done | FkComputeState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub computation_id: Uuid,
    pub old_state: FkComputeState,
    pub new_state: FkComputeState,
    pub transitioned_at: DateTime<Utc>,
}

/// In-memory record of one FK computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FkComputation {
    pub id: Uuid,
    pub signal_detection_id: String,
    pub state: FkComputeState,
    pub history: Vec<StateTransition>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl FkComputation {
    pub fn new(signal_detection_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            signal_detection_id: signal_detection_id.into(),
            state: FkComputeState::Idle,
            history: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: FkComputeState) -> StateTransition {
        let transition = StateTransition {
            computation_id: self.id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        debug!(
            computation_id = %self.id,
            signal_detection_id = %self.signal_detection_id,
            from = ?self.state,
            to = ?new_state,
            "FK computation state change"
        );
        self.state = new_state;

        if new_state.is_terminal() {
            self.ended_at = Some(transition.transitioned_at);
        }

        self.history.push(transition.clone());
        transition
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
