//! Station geometry used for FK and beam requests

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub latitude_degrees: f64,
    pub longitude_degrees: f64,
    pub elevation_km: f64,
    pub depth_km: f64,
}

/// Channel offset from the station reference point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelativePosition {
    pub north_displacement_km: f64,
    pub east_displacement_km: f64,
    pub vertical_displacement_km: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingChannel {
    pub id: String,
    pub name: String,
    pub sample_rate: f64,
    pub position: RelativePosition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStation {
    pub id: String,
    pub name: String,
    pub location: Location,
    pub channels: Vec<ProcessingChannel>,
}

impl ProcessingStation {
    /// Channels whose name contains `pattern`, e.g. the vertical `SHZ` set
    pub fn channels_matching<'a>(
        &'a self,
        pattern: &'a str,
    ) -> impl Iterator<Item = &'a ProcessingChannel> + 'a {
        self.channels.iter().filter(move |c| c.name.contains(pattern))
    }
}
