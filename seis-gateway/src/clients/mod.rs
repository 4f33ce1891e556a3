//! HTTP clients for the upstream OSD and signal-enhancement services

pub mod osd_client;

pub use osd_client::OsdClient;
