use serde::{Deserialize, Serialize};

/// WGS-84 position in decimal degrees.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A simulator planar position (x, z) paired with where it really is on Earth.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct ReferencePoint {
    pub x: f32,
    pub z: f32,
    pub gps: GeoCoordinate,
}

impl ReferencePoint {
    pub fn new(x: f32, z: f32, gps: GeoCoordinate) -> Self {
        Self { x, z, gps }
    }
}

/// Calibration pair for one track, as stored in the settings file.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct TrackReferencePoints {
    pub point0: ReferencePoint,
    pub point1: ReferencePoint,
}
