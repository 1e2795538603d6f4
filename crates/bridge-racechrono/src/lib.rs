//! RaceChrono output: NMEA/RC3 sentence encoding and the TCP fan-out server.
//!
//! Every car update becomes one `$GPRMC` / `$GPGGA` / `$RC3` frame that is
//! queued to each connected client. Clients never talk back.

mod clients;
mod publisher;
pub mod sentences;

pub use clients::ClientRegistry;
pub use publisher::{PublishError, PublisherConfig, PublisherHandle, RaceChronoPublisher};
pub use sentences::{GgaFix, RaceChronoEncoder, Rc3Encoder};
