//! Simulator planar coordinates to WGS-84 latitude/longitude.
//!
//! A track is calibrated with two [`ReferencePoint`]s. From those we derive a
//! similarity transform (translation, rotation, uniform scale) in a local
//! east/north tangent plane, which is accurate enough at race-circuit scale.

mod converter;
mod registry;

pub use converter::{GeoConverter, WGS84_EQUATORIAL_RADIUS_M};
pub use model::{GeoCoordinate, ReferencePoint, TrackReferencePoints};
pub use registry::ConverterRegistry;

#[derive(Debug, thiserror::Error)]
pub enum CoordError {
    #[error("planar reference points are identical or too close ({distance} m apart); can't derive scale/rotation")]
    DegeneratePlanar { distance: f64 },
    #[error("GPS reference points are identical or too close ({distance} m apart); can't derive scale/rotation")]
    DegenerateGeographic { distance: f64 },
    #[error("track '{track}': {source}")]
    Track {
        track: String,
        #[source]
        source: Box<CoordError>,
    },
    #[error("no coordinate converter available for track '{0}'")]
    UnknownTrack(String),
}
