//! Station and origin metadata, and station identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Network/station/location triple identifying one physical station.
///
/// Displays as `NET.STA.LOC`; the location may be empty (`"AK.BIGB."`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StationId {
    network: String,
    station: String,
    location: String,
}

impl StationId {
    /// Create an identifier from its three parts.
    #[must_use]
    pub fn new(network: &str, station: &str, location: &str) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            location: location.to_string(),
        }
    }

    /// Return the network code.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.network
    }

    /// Return the station code.
    #[must_use]
    pub fn station(&self) -> &str {
        &self.station
    }

    /// Return the location code.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.network, self.station, self.location)
    }
}

/// A seismic station with fixed geographic coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Network code.
    pub network: String,
    /// Station code.
    pub station: String,
    /// Location code.
    #[serde(default)]
    pub location: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Station {
    /// Create a station with an empty location code.
    #[must_use]
    pub fn new(network: &str, station: &str, latitude: f64, longitude: f64) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            location: String::new(),
            latitude,
            longitude,
        }
    }

    /// Return the identifier derived from this station's codes.
    #[must_use]
    pub fn id(&self) -> StationId {
        StationId::new(&self.network, &self.station, &self.location)
    }
}

/// A hypothesized or catalogued event location and time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Origin {
    /// Origin time in epoch seconds.
    pub time: f64,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Depth below the surface in meters.
    pub depth_in_m: f64,
    /// Easting from the catalogued hypocenter in meters, for lateral origin grids.
    #[serde(default)]
    pub offset_x_in_m: f64,
    /// Northing from the catalogued hypocenter in meters.
    #[serde(default)]
    pub offset_y_in_m: f64,
}

impl Origin {
    /// Create an origin with zero lateral offsets.
    #[must_use]
    pub fn new(time: f64, latitude: f64, longitude: f64, depth_in_m: f64) -> Self {
        Self {
            time,
            latitude,
            longitude,
            depth_in_m,
            offset_x_in_m: 0.0,
            offset_y_in_m: 0.0,
        }
    }

    /// Return a copy of this origin moved laterally by `(x, y)` meters.
    #[must_use]
    pub fn with_offsets(&self, offset_x_in_m: f64, offset_y_in_m: f64) -> Self {
        Self {
            offset_x_in_m,
            offset_y_in_m,
            ..self.clone()
        }
    }

    /// Return a copy of this origin at a different depth.
    #[must_use]
    pub fn with_depth(&self, depth_in_m: f64) -> Self {
        Self {
            depth_in_m,
            ..self.clone()
        }
    }
}
