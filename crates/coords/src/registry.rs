use std::collections::HashMap;

use model::TrackReferencePoints;
use tracing::debug;

use crate::{CoordError, GeoConverter};

/// Per-track converters, keyed by the track name the simulator reports.
///
/// Built once at startup and then only read. Lookups strip `%` characters
/// from the requested name, since the simulator pads names with them.
#[derive(Debug, Default, Clone)]
pub struct ConverterRegistry {
    converters: HashMap<String, GeoConverter>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a converter for every configured track. Fails on the first bad calibration.
    pub fn from_tracks(tracks: &HashMap<String, TrackReferencePoints>) -> Result<Self, CoordError> {
        let mut registry = Self::new();
        for (track, points) in tracks {
            let converter = GeoConverter::from_reference_points(&points.point0, &points.point1)
                .map_err(|source| CoordError::Track {
                    track: track.clone(),
                    source: Box::new(source),
                })?;
            debug!(track = %track, scale = converter.scale(), "calibrated track");
            registry.insert(track.clone(), converter);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, track: impl Into<String>, converter: GeoConverter) {
        self.converters.insert(track.into(), converter);
    }

    pub fn get(&self, track_name: &str) -> Result<&GeoConverter, CoordError> {
        let key = track_name.replace('%', "");
        self.converters
            .get(&key)
            .ok_or_else(|| CoordError::UnknownTrack(track_name.to_string()))
    }

    pub fn contains(&self, track_name: &str) -> bool {
        self.get(track_name).is_ok()
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }

    pub fn track_names(&self) -> impl Iterator<Item = &str> {
        self.converters.keys().map(String::as_str)
    }
}
