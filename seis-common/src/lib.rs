//! # Seismic Analysis Common Library
//!
//! Shared code for the interactive-analysis gateway services:
//! - Error and result types
//! - Wire time and duration conversion, FK window arithmetic
//! - TOML bootstrap configuration loading
//! - Event types (GatewayEvent enum) and the EventBus

pub mod config;
pub mod error;
pub mod events;
pub mod time;

pub use error::{Error, Result};
