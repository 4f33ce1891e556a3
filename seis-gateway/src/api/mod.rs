//! HTTP API handlers for seis-gateway

pub mod fk;
pub mod health;
pub mod segments;

pub use fk::fk_routes;
pub use health::health_routes;
pub use segments::segment_routes;
