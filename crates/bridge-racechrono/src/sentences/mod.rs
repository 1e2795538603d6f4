//! RaceChrono's text input: NMEA 0183 position sentences plus `$RC3`.

mod gps;
pub mod nmea;
mod rc3;

use bridge_core::CarUpdate;
use bytes::{Bytes, BytesMut};
use time::OffsetDateTime;

pub use gps::{gpgga, gprmc, GgaFix};
pub use rc3::Rc3Encoder;

/// Turns each car update into the `$GPRMC`, `$GPGGA`, `$RC3` triplet,
/// in that order, as one contiguous frame.
#[derive(Debug, Default)]
pub struct RaceChronoEncoder {
    rc3: Rc3Encoder,
    fix: GgaFix,
}

impl RaceChronoEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fix(fix: GgaFix) -> Self {
        Self { rc3: Rc3Encoder::new(), fix }
    }

    pub fn encode_update(&mut self, update: &CarUpdate, utc: &OffsetDateTime) -> Bytes {
        let rmc = gprmc(utc, update.latitude, update.longitude, update.speed_kmh, 0.0);
        let gga = gpgga(utc, update.latitude, update.longitude, &self.fix);
        let rc3 = self.rc3.encode(update, utc, true);

        let mut frame = BytesMut::with_capacity(rmc.len() + gga.len() + rc3.len());
        frame.extend_from_slice(&rmc);
        frame.extend_from_slice(&gga);
        frame.extend_from_slice(&rc3);
        frame.freeze()
    }
}
