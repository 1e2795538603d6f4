use bytes::Bytes;
use time::OffsetDateTime;

use super::nmea;

const KMH_PER_KNOT: f32 = 1.852;

/// Fix metadata for GGA. The simulator has no receiver, so these are constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GgaFix {
    pub quality: u8,
    pub satellites: u8,
    pub hdop: f64,
    pub altitude_m: f64,
}

impl Default for GgaFix {
    fn default() -> Self {
        Self { quality: 1, satellites: 8, hdop: 1.0, altitude_m: 0.0 }
    }
}

/// `$GPRMC,hhmmss.fff,A,ddmm.mmm,N,dddmm.mmm,E,knots,course,ddmmyy,,,A*CS`
pub fn gprmc(utc: &OffsetDateTime, lat: f64, lon: f64, speed_kmh: f32, course_deg: f32) -> Bytes {
    let (lat_field, lat_hem) = nmea::latitude(lat);
    let (lon_field, lon_hem) = nmea::longitude(lon);
    let knots = speed_kmh / KMH_PER_KNOT;
    let payload = format!(
        "GPRMC,{},A,{lat_field},{lat_hem},{lon_field},{lon_hem},{knots:.1},{course_deg:.1},{},,,A",
        nmea::time_of_day(utc),
        nmea::date(utc),
    );
    nmea::sentence(&payload)
}

/// `$GPGGA,hhmmss.fff,lat,N,lon,E,fix,sats,hdop,alt,M,0.0,M,,*CS`
pub fn gpgga(utc: &OffsetDateTime, lat: f64, lon: f64, fix: &GgaFix) -> Bytes {
    let (lat_field, lat_hem) = nmea::latitude(lat);
    let (lon_field, lon_hem) = nmea::longitude(lon);
    let payload = format!(
        "GPGGA,{},{lat_field},{lat_hem},{lon_field},{lon_hem},{},{:02},{:.2},{:.1},M,0.0,M,,",
        nmea::time_of_day(utc),
        fix.quality,
        fix.satellites,
        fix.hdop,
        fix.altitude_m,
    );
    nmea::sentence(&payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn text(b: &Bytes) -> &str {
        std::str::from_utf8(b).unwrap_or_default()
    }

    #[test]
    fn rmc_fields() {
        let utc = datetime!(2025-06-01 14:30:15.250 UTC);
        let line = gprmc(&utc, 58.401111, 24.453306, 185.2, 0.0);
        let text = text(&line);
        assert!(text.starts_with("$GPRMC,143015.250,A,5824.067,N,02427.198,E,100.0,0.0,010625,,,A*"));
        assert!(text.ends_with("\r\n"));
    }

    #[test]
    fn rmc_southern_western_hemispheres() {
        let utc = datetime!(2025-06-01 00:00:00 UTC);
        let line = gprmc(&utc, -34.5, -58.25, 0.0, 0.0);
        assert!(text(&line).contains(",3430.000,S,05815.000,W,0.0,0.0,"));
    }

    #[test]
    fn gga_fields() {
        let utc = datetime!(2025-06-01 14:30:15.250 UTC);
        let line = gpgga(&utc, 50.437591, 5.969755, &GgaFix::default());
        let text = text(&line);
        assert!(text.starts_with("$GPGGA,143015.250,5026.255,N,00558.185,E,1,08,1.00,0.0,M,0.0,M,,*"));
    }

    #[test]
    fn checksum_covers_the_payload() {
        let utc = datetime!(2025-06-01 14:30:15.250 UTC);
        let line = gpgga(&utc, 50.0, 5.0, &GgaFix::default());
        let text = text(&line);
        let star = text.rfind('*').unwrap_or(0);
        let payload = &text[1..star];
        let expected = format!("{:02X}", nmea::checksum(payload));
        assert_eq!(&text[star + 1..star + 3], expected);
    }
}
