use model::{GeoCoordinate, ReferencePoint};

use crate::CoordError;

/// WGS-84 equatorial radius in meters.
pub const WGS84_EQUATORIAL_RADIUS_M: f64 = 6_378_137.0;

// Below this the pair can't pin down scale or rotation.
const MIN_CALIBRATION_DISTANCE: f64 = 1e-6;

/// Maps simulator (x, z) to geographic coordinates for one track.
///
/// The transform is `enu = scale * R(rotation) * (p - p0)` followed by an
/// equirectangular conversion of the east/north meters back to degrees around
/// the origin. The simulator's Z axis grows opposite to north, so a planar
/// delta `(dx, dz)` is read as `east = dx, north = -dz`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoConverter {
    origin_x: f64,
    origin_z: f64,
    origin: GeoCoordinate,
    earth_radius: f64,
    lon_radius: f64,
    scale: f64,
    rotation_rad: f64,
    cos_rot: f64,
    sin_rot: f64,
}

impl GeoConverter {
    /// Builds a converter from two calibration points using the WGS-84 radius.
    pub fn from_reference_points(
        point0: &ReferencePoint,
        point1: &ReferencePoint,
    ) -> Result<Self, CoordError> {
        Self::with_earth_radius(point0, point1, WGS84_EQUATORIAL_RADIUS_M)
    }

    /// Same as [`GeoConverter::from_reference_points`] with a custom sphere radius.
    pub fn with_earth_radius(
        point0: &ReferencePoint,
        point1: &ReferencePoint,
        earth_radius_m: f64,
    ) -> Result<Self, CoordError> {
        let dx = f64::from(point1.x) - f64::from(point0.x);
        let dz = f64::from(point1.z) - f64::from(point0.z);
        let planar_len = dx.hypot(dz);
        if planar_len < MIN_CALIBRATION_DISTANCE {
            return Err(CoordError::DegeneratePlanar { distance: planar_len });
        }

        let lon_radius = earth_radius_m * point0.gps.latitude.to_radians().cos();
        let north = (point1.gps.latitude - point0.gps.latitude).to_radians() * earth_radius_m;
        let east = (point1.gps.longitude - point0.gps.longitude).to_radians() * lon_radius;
        let geo_len = east.hypot(north);
        if geo_len < MIN_CALIBRATION_DISTANCE {
            return Err(CoordError::DegenerateGeographic { distance: geo_len });
        }

        let planar_angle = (-dz).atan2(dx);
        let geo_angle = north.atan2(east);
        let rotation_rad = geo_angle - planar_angle;

        Ok(Self {
            origin_x: f64::from(point0.x),
            origin_z: f64::from(point0.z),
            origin: point0.gps,
            earth_radius: earth_radius_m,
            lon_radius,
            scale: geo_len / planar_len,
            rotation_rad,
            cos_rot: rotation_rad.cos(),
            sin_rot: rotation_rad.sin(),
        })
    }

    /// Converts a simulator planar position to latitude/longitude.
    pub fn from_planar(&self, x: f32, z: f32) -> GeoCoordinate {
        let east_sim = f64::from(x) - self.origin_x;
        let north_sim = -(f64::from(z) - self.origin_z);

        let east = self.scale * (east_sim * self.cos_rot - north_sim * self.sin_rot);
        let north = self.scale * (east_sim * self.sin_rot + north_sim * self.cos_rot);

        GeoCoordinate {
            latitude: self.origin.latitude + (north / self.earth_radius).to_degrees(),
            longitude: self.origin.longitude + (east / self.lon_radius).to_degrees(),
        }
    }

    /// Meters on the ground per simulator unit.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn rotation_rad(&self) -> f64 {
        self.rotation_rad
    }
}
