use std::fmt::Write;

use bridge_core::CarUpdate;
use bytes::Bytes;
use time::OffsetDateTime;

use super::nmea;

/// RaceChrono's `$RC3` IMU/analog sentence:
///
/// `$RC3,time,count,xacc,yacc,zacc,gyrox,gyroy,gyroz,rpm,d2,a1..a15*CS`
///
/// The count wraps at `u16::MAX` and there is no way to reset it, so every
/// independent stream needs its own encoder.
#[derive(Debug, Default)]
pub struct Rc3Encoder {
    count: u16,
}

impl Rc3Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// When the stream also carries NMEA sentences RaceChrono merges by time,
    /// so the count field is left empty and the counter does not advance.
    pub fn encode(&mut self, update: &CarUpdate, utc: &OffsetDateTime, mixed_with_nmea: bool) -> Bytes {
        let count = if mixed_with_nmea {
            String::new()
        } else {
            self.count = self.count.wrapping_add(1);
            self.count.to_string()
        };

        let channels: [f64; 23] = [
            // acceleration, g
            f64::from(update.acc_g_horizontal),
            f64::from(update.acc_g_vertical),
            f64::from(update.acc_g_frontal),
            // no gyro in the feed
            0.0,
            0.0,
            0.0,
            f64::from(update.engine_rpm),
            f64::from(update.gear),
            // a1..a13
            f64::from(update.speed_kmh),
            f64::from(update.gas),
            f64::from(update.brake),
            f64::from(update.clutch),
            update.latitude,
            f64::from(update.altitude),
            update.longitude,
            f64::from(update.pos_normalized),
            f64::from(update.slope),
            f64::from(update.lap_time_ms),
            f64::from(update.last_lap_ms),
            f64::from(update.best_lap_ms),
            f64::from(update.lap_count),
            // a14, a15 reserved
            0.0,
            0.0,
        ];

        let mut payload = format!("RC3,{},{count}", nmea::time_of_day(utc));
        for value in channels {
            // writing into a String can't fail
            let _ = write!(payload, ",{value:.3}");
        }
        nmea::sentence(&payload)
    }

    pub fn count(&self) -> u16 {
        self.count
    }
}
