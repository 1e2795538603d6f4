//! Assetto Corsa remote telemetry records.
//!
//! Everything is packed, little-endian. Names are UTF-16LE, NUL padded to a
//! fixed character count.

use std::io::{self, Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use bytes::{BufMut, BytesMut};

pub const PROTOCOL_IDENTIFIER: i32 = 1;
pub const PROTOCOL_VERSION: i32 = 1;

/// Fixed character count of every name field.
pub const NAME_CHARS: usize = 50;

pub const HANDSHAKE_REQUEST_SIZE: usize = 12;
pub const HANDSHAKE_RESPONSE_SIZE: usize = 408;
pub const RT_CAR_INFO_SIZE: usize = 328;
pub const RT_LAP_SIZE: usize = 212;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("{record} must be {expected} bytes, got {actual}")]
    Length {
        record: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("unknown operation id {0}")]
    UnknownOperation(i32),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationId {
    Handshake = 0,
    SubscribeUpdate = 1,
    SubscribeSpot = 2,
    Dismiss = 3,
}

impl TryFrom<i32> for OperationId {
    type Error = WireError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Handshake),
            1 => Ok(Self::SubscribeUpdate),
            2 => Ok(Self::SubscribeSpot),
            3 => Ok(Self::Dismiss),
            other => Err(WireError::UnknownOperation(other)),
        }
    }
}

/// The only record the client ever sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub identifier: i32,
    pub version: i32,
    pub operation: OperationId,
}

impl HandshakeRequest {
    pub fn new(operation: OperationId) -> Self {
        Self {
            identifier: PROTOCOL_IDENTIFIER,
            version: PROTOCOL_VERSION,
            operation,
        }
    }

    pub fn encode(&self) -> [u8; HANDSHAKE_REQUEST_SIZE] {
        let mut out = [0u8; HANDSHAKE_REQUEST_SIZE];
        out[0..4].copy_from_slice(&self.identifier.to_le_bytes());
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..12].copy_from_slice(&(self.operation as i32).to_le_bytes());
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        check_len("handshake request", buf, HANDSHAKE_REQUEST_SIZE)?;
        let mut c = Cursor::new(buf);
        let identifier = c.read_i32::<LittleEndian>()?;
        let version = c.read_i32::<LittleEndian>()?;
        let operation = OperationId::try_from(c.read_i32::<LittleEndian>()?)?;
        Ok(Self { identifier, version, operation })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub car_name: String,
    pub driver_name: String,
    pub identifier: i32,
    pub version: i32,
    pub track_name: String,
    pub track_config: String,
}

impl HandshakeResponse {
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        check_len("handshake response", buf, HANDSHAKE_RESPONSE_SIZE)?;
        let mut c = Cursor::new(buf);
        Ok(Self {
            car_name: read_name(&mut c)?,
            driver_name: read_name(&mut c)?,
            identifier: c.read_i32::<LittleEndian>()?,
            version: c.read_i32::<LittleEndian>()?,
            track_name: read_name(&mut c)?,
            track_config: read_name(&mut c)?,
        })
    }

    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(HANDSHAKE_RESPONSE_SIZE);
        put_name(&mut out, &self.car_name);
        put_name(&mut out, &self.driver_name);
        out.put_i32_le(self.identifier);
        out.put_i32_le(self.version);
        put_name(&mut out, &self.track_name);
        put_name(&mut out, &self.track_config);
        out
    }
}

/// The car-info update record. Every field is kept so offsets stay honest,
/// even though only a handful reach the bridge output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RtCarInfo {
    pub identifier: String,
    pub size: i32,

    pub speed_kmh: f32,
    pub speed_mph: f32,
    pub speed_ms: f32,

    pub is_abs_enabled: bool,
    pub is_abs_in_action: bool,
    pub is_tc_in_action: bool,
    pub is_tc_enabled: bool,
    pub is_in_pit: bool,
    pub is_engine_limiter_on: bool,

    pub acc_g_vertical: f32,
    pub acc_g_horizontal: f32,
    pub acc_g_frontal: f32,

    pub lap_time: i32,
    pub last_lap: i32,
    pub best_lap: i32,
    pub lap_count: i32,

    pub gas: f32,
    pub brake: f32,
    pub clutch: f32,
    pub engine_rpm: f32,
    pub steer: f32,
    /// 0 = reverse, 1 = neutral, 2 = first, ...
    pub gear: i32,
    pub cg_height: f32,

    pub wheel_angular_speed: [f32; 4],
    pub slip_angle: [f32; 4],
    pub slip_angle_contact_patch: [f32; 4],
    pub slip_ratio: [f32; 4],
    pub tyre_slip: [f32; 4],
    pub nd_slip: [f32; 4],
    pub load: [f32; 4],
    pub dy: [f32; 4],
    pub mz: [f32; 4],
    pub tyre_dirty_level: [f32; 4],
    pub camber_rad: [f32; 4],
    pub tyre_radius: [f32; 4],
    pub tyre_loaded_radius: [f32; 4],
    pub suspension_height: [f32; 4],

    pub car_position_normalized: f32,
    pub car_slope: f32,
    pub car_coordinates: [f32; 3],
}

impl RtCarInfo {
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        check_len("car info", buf, RT_CAR_INFO_SIZE)?;
        let mut c = Cursor::new(buf);
        let mut info = Self {
            identifier: read_utf16(&mut c, 2)?,
            size: c.read_i32::<LittleEndian>()?,
            speed_kmh: c.read_f32::<LittleEndian>()?,
            speed_mph: c.read_f32::<LittleEndian>()?,
            speed_ms: c.read_f32::<LittleEndian>()?,
            is_abs_enabled: c.read_u8()? != 0,
            is_abs_in_action: c.read_u8()? != 0,
            is_tc_in_action: c.read_u8()? != 0,
            is_tc_enabled: c.read_u8()? != 0,
            is_in_pit: c.read_u8()? != 0,
            is_engine_limiter_on: c.read_u8()? != 0,
            ..Self::default()
        };
        // two bytes of padding
        c.read_u16::<LittleEndian>()?;

        info.acc_g_vertical = c.read_f32::<LittleEndian>()?;
        info.acc_g_horizontal = c.read_f32::<LittleEndian>()?;
        info.acc_g_frontal = c.read_f32::<LittleEndian>()?;

        info.lap_time = c.read_i32::<LittleEndian>()?;
        info.last_lap = c.read_i32::<LittleEndian>()?;
        info.best_lap = c.read_i32::<LittleEndian>()?;
        info.lap_count = c.read_i32::<LittleEndian>()?;

        info.gas = c.read_f32::<LittleEndian>()?;
        info.brake = c.read_f32::<LittleEndian>()?;
        info.clutch = c.read_f32::<LittleEndian>()?;
        info.engine_rpm = c.read_f32::<LittleEndian>()?;
        info.steer = c.read_f32::<LittleEndian>()?;
        info.gear = c.read_i32::<LittleEndian>()?;
        info.cg_height = c.read_f32::<LittleEndian>()?;

        for wheels in [
            &mut info.wheel_angular_speed,
            &mut info.slip_angle,
            &mut info.slip_angle_contact_patch,
            &mut info.slip_ratio,
            &mut info.tyre_slip,
            &mut info.nd_slip,
            &mut info.load,
            &mut info.dy,
            &mut info.mz,
            &mut info.tyre_dirty_level,
            &mut info.camber_rad,
            &mut info.tyre_radius,
            &mut info.tyre_loaded_radius,
            &mut info.suspension_height,
        ] {
            c.read_f32_into::<LittleEndian>(wheels)?;
        }

        info.car_position_normalized = c.read_f32::<LittleEndian>()?;
        info.car_slope = c.read_f32::<LittleEndian>()?;
        c.read_f32_into::<LittleEndian>(&mut info.car_coordinates)?;
        Ok(info)
    }

    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(RT_CAR_INFO_SIZE);
        put_utf16(&mut out, &self.identifier, 2);
        out.put_i32_le(self.size);
        out.put_f32_le(self.speed_kmh);
        out.put_f32_le(self.speed_mph);
        out.put_f32_le(self.speed_ms);
        for flag in [
            self.is_abs_enabled,
            self.is_abs_in_action,
            self.is_tc_in_action,
            self.is_tc_enabled,
            self.is_in_pit,
            self.is_engine_limiter_on,
        ] {
            out.put_u8(u8::from(flag));
        }
        out.put_u16_le(0);
        out.put_f32_le(self.acc_g_vertical);
        out.put_f32_le(self.acc_g_horizontal);
        out.put_f32_le(self.acc_g_frontal);
        out.put_i32_le(self.lap_time);
        out.put_i32_le(self.last_lap);
        out.put_i32_le(self.best_lap);
        out.put_i32_le(self.lap_count);
        out.put_f32_le(self.gas);
        out.put_f32_le(self.brake);
        out.put_f32_le(self.clutch);
        out.put_f32_le(self.engine_rpm);
        out.put_f32_le(self.steer);
        out.put_i32_le(self.gear);
        out.put_f32_le(self.cg_height);
        for wheels in [
            &self.wheel_angular_speed,
            &self.slip_angle,
            &self.slip_angle_contact_patch,
            &self.slip_ratio,
            &self.tyre_slip,
            &self.nd_slip,
            &self.load,
            &self.dy,
            &self.mz,
            &self.tyre_dirty_level,
            &self.camber_rad,
            &self.tyre_radius,
            &self.tyre_loaded_radius,
            &self.suspension_height,
        ] {
            for v in wheels {
                out.put_f32_le(*v);
            }
        }
        out.put_f32_le(self.car_position_normalized);
        out.put_f32_le(self.car_slope);
        for v in &self.car_coordinates {
            out.put_f32_le(*v);
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtLap {
    pub car_identifier_number: i32,
    pub lap: i32,
    pub driver_name: String,
    pub car_name: String,
    pub time_ms: i32,
}

impl RtLap {
    pub fn decode(buf: &[u8]) -> Result<Self, WireError> {
        check_len("lap", buf, RT_LAP_SIZE)?;
        let mut c = Cursor::new(buf);
        Ok(Self {
            car_identifier_number: c.read_i32::<LittleEndian>()?,
            lap: c.read_i32::<LittleEndian>()?,
            driver_name: read_name(&mut c)?,
            car_name: read_name(&mut c)?,
            time_ms: c.read_i32::<LittleEndian>()?,
        })
    }

    pub fn encode(&self) -> BytesMut {
        let mut out = BytesMut::with_capacity(RT_LAP_SIZE);
        out.put_i32_le(self.car_identifier_number);
        out.put_i32_le(self.lap);
        put_name(&mut out, &self.driver_name);
        put_name(&mut out, &self.car_name);
        out.put_i32_le(self.time_ms);
        out
    }
}

/// A datagram received after subscribing, told apart purely by length.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    CarInfo(Box<RtCarInfo>),
    Lap(RtLap),
    Unknown(usize),
}

impl Packet {
    pub fn classify(datagram: &[u8]) -> Result<Self, WireError> {
        match datagram.len() {
            RT_CAR_INFO_SIZE => Ok(Self::CarInfo(Box::new(RtCarInfo::decode(datagram)?))),
            RT_LAP_SIZE => Ok(Self::Lap(RtLap::decode(datagram)?)),
            other => Ok(Self::Unknown(other)),
        }
    }
}

fn check_len(record: &'static str, buf: &[u8], expected: usize) -> Result<(), WireError> {
    if buf.len() != expected {
        return Err(WireError::Length { record, expected, actual: buf.len() });
    }
    Ok(())
}

fn read_name<R: Read>(r: &mut R) -> io::Result<String> {
    read_utf16(r, NAME_CHARS)
}

fn read_utf16<R: Read>(r: &mut R, chars: usize) -> io::Result<String> {
    let mut units = vec![0u16; chars];
    r.read_u16_into::<LittleEndian>(&mut units)?;
    let end = units.iter().position(|&u| u == 0).unwrap_or(chars);
    Ok(String::from_utf16_lossy(&units[..end]))
}

fn put_name(out: &mut BytesMut, value: &str) {
    put_utf16(out, value, NAME_CHARS);
}

fn put_utf16(out: &mut BytesMut, value: &str, chars: usize) {
    let mut written = 0;
    for unit in value.encode_utf16().take(chars) {
        out.put_u16_le(unit);
        written += 1;
    }
    for _ in written..chars {
        out.put_u16_le(0);
    }
}
