//! Core telemetry model, events and traits shared by the bridge crates.

mod events;
mod shutdown;

use serde::{Deserialize, Serialize};

pub use events::{EventHub, TelemetryEvent, TelemetryRx};
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};

/// Identity reported by the simulator in its handshake reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub is_connected: bool,
    pub driver_name: String,
    pub car_name: String,
    pub track_name: String,
    pub track_config: String,
    pub server_identifier: i32,
    pub server_version: i32,
}

impl ConnectionInfo {
    pub fn disconnected() -> Self {
        Self {
            is_connected: false,
            driver_name: String::new(),
            car_name: String::new(),
            track_name: String::new(),
            track_config: String::new(),
            server_identifier: 0,
            server_version: 0,
        }
    }
}

/// One telemetry snapshot, already converted to geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CarUpdate {
    pub speed_kmh: f32,
    pub engine_rpm: f32,
    pub gear: i32,
    pub lap_time_ms: i32,
    pub last_lap_ms: i32,
    pub best_lap_ms: i32,
    pub lap_count: i32,
    // pedals, 0..1
    pub gas: f32,
    pub brake: f32,
    pub clutch: f32,

    pub latitude: f64,
    pub longitude: f64,
    /// Simulator Y, meters.
    pub altitude: f32,
    pub pos_normalized: f32,
    pub game_pos_x: f32,
    pub game_pos_y: f32,
    pub game_pos_z: f32,
    pub slope: f32,

    // g-units
    pub acc_g_vertical: f32,
    pub acc_g_horizontal: f32,
    pub acc_g_frontal: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LapEvent {
    pub car_identifier_number: i32,
    pub lap: i32,
    pub driver_name: String,
    pub car_name: String,
    pub time_ms: i32,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("{0}")]
    Msg(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Coordinates(#[from] coords::CoordError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A live telemetry source. `run` loops until `shutdown` fires; only
/// configuration errors end it early.
#[async_trait::async_trait]
pub trait TelemetrySource: Send + Sync {
    fn events(&self) -> &EventHub;
    async fn run(&self, shutdown: Shutdown) -> Result<(), IngestError>;
}
