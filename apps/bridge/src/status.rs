use std::thread::{self, JoinHandle};

use bridge_core::{TelemetryEvent, TelemetryRx};
use tracing::{error, info, trace};

/// Drains the listener's events on a plain thread and logs the human-facing
/// ones. Ends once every sender is gone.
pub fn spawn_pump(rx: TelemetryRx) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("status".into()).spawn(move || {
        for event in rx.iter() {
            log_event(&event);
        }
    })
}

fn log_event(event: &TelemetryEvent) {
    match event {
        TelemetryEvent::Status(msg) => info!("{msg}"),
        TelemetryEvent::Connected(conn) => info!(
            driver = %conn.driver_name,
            car = %conn.car_name,
            track = %conn.track_name,
            config = %conn.track_config,
            version = conn.server_version,
            "session established"
        ),
        TelemetryEvent::Disconnected => info!("session closed"),
        TelemetryEvent::Lap(lap) => info!(
            car = lap.car_identifier_number,
            lap = lap.lap,
            driver = %lap.driver_name,
            "lap {}",
            lap_time(lap.time_ms)
        ),
        TelemetryEvent::Error(msg) => error!("{msg}"),
        TelemetryEvent::CarUpdate(update) => trace!(
            speed_kmh = update.speed_kmh,
            gear = update.gear,
            lat = update.latitude,
            lon = update.longitude,
            "car update"
        ),
    }
}

/// `m:ss.fff`
pub fn lap_time(ms: i32) -> String {
    let ms = ms.max(0);
    format!("{}:{:02}.{:03}", ms / 60_000, (ms / 1000) % 60, ms % 1000)
}
