//! Field formatting and framing shared by every sentence.

use bytes::Bytes;
use time::OffsetDateTime;

/// `hhmmss.fff`, UTC.
pub fn time_of_day(utc: &OffsetDateTime) -> String {
    format!(
        "{:02}{:02}{:02}.{:03}",
        utc.hour(),
        utc.minute(),
        utc.second(),
        utc.millisecond()
    )
}

/// `ddMMyy`, UTC.
pub fn date(utc: &OffsetDateTime) -> String {
    format!(
        "{:02}{:02}{:02}",
        utc.day(),
        u8::from(utc.month()),
        utc.year().rem_euclid(100)
    )
}

/// Latitude as `ddmm.mmm` plus hemisphere.
pub fn latitude(deg: f64) -> (String, char) {
    let hemisphere = if deg >= 0.0 { 'N' } else { 'S' };
    let (whole, milli_minutes) = split_degrees(deg.abs());
    (
        format!("{:02}{:02}.{:03}", whole, milli_minutes / 1000, milli_minutes % 1000),
        hemisphere,
    )
}

/// Longitude as `dddmm.mmm` plus hemisphere.
pub fn longitude(deg: f64) -> (String, char) {
    let hemisphere = if deg >= 0.0 { 'E' } else { 'W' };
    let (whole, milli_minutes) = split_degrees(deg.abs());
    (
        format!("{:03}{:02}.{:03}", whole, milli_minutes / 1000, milli_minutes % 1000),
        hemisphere,
    )
}

// Rounds to thousandths of a minute first so 59.9996' carries into the degree.
fn split_degrees(abs_deg: f64) -> (u64, u64) {
    let total = (abs_deg * 60_000.0).round() as u64;
    (total / 60_000, total % 60_000)
}

/// XOR of every byte between `$` and `*`.
pub fn checksum(payload: &str) -> u8 {
    payload.bytes().fold(0, |acc, b| acc ^ b)
}

/// Frames a payload as `$<payload>*HH\r\n`.
pub fn sentence(payload: &str) -> Bytes {
    Bytes::from(format!("${payload}*{:02X}\r\n", checksum(payload)))
}
