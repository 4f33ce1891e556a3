//! Gateway services
//!
//! - `segment_service`: cache-first channel segment lookups
//! - `fk_orchestrator`: FK computation, thumbnails, review toggle
//! - `beam_orchestrator`: beam and filtered-beam recomputation
//! - `fk_support`: request building and post-processing shared by the above

pub mod beam_orchestrator;
pub mod fk_orchestrator;
pub mod fk_support;
pub mod segment_service;

pub use beam_orchestrator::{BeamOrchestrator, BeamOutcome};
pub use fk_orchestrator::{FkComputeOutcome, FkOrchestrator};
pub use segment_service::ChannelSegmentService;
