//! Assetto Corsa remote telemetry over UDP.
//!
//! The client binds an ephemeral port, handshakes with the simulator,
//! subscribes to car updates and lap spots, and turns every datagram into a
//! [`TelemetryEvent`](bridge_core::TelemetryEvent). Sessions that go quiet or
//! fail are torn down and restarted from the handshake.

mod listener;
pub mod wire;

pub use listener::{car_update_from, AcUdpConfig, AcUdpListener};
