use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{CarUpdate, ConnectionInfo, LapEvent};

/// Everything a telemetry source pushes out to its observers.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    Status(String),
    Connected(ConnectionInfo),
    Disconnected,
    CarUpdate(CarUpdate),
    Lap(LapEvent),
    Error(String),
}

pub type TelemetryRx = crossbeam_channel::Receiver<TelemetryEvent>;

type Handler = Box<dyn Fn(&TelemetryEvent) + Send + Sync>;

/// Synchronous fan-out of [`TelemetryEvent`]s to every registered handler.
///
/// Handlers run on the emitting task, in registration order, so they must
/// return quickly and must not call back into the hub.
#[derive(Clone, Default)]
pub struct EventHub {
    handlers: Arc<RwLock<Vec<Handler>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&TelemetryEvent) + Send + Sync + 'static,
    {
        self.handlers.write().push(Box::new(handler));
    }

    /// Subscribes an unbounded queue, for consumers living on their own thread.
    pub fn channel(&self) -> TelemetryRx {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribe(move |event| {
            // receiver gone: nothing left to tell
            let _ = tx.send(event.clone());
        });
        rx
    }

    pub fn emit(&self, event: TelemetryEvent) {
        for handler in self.handlers.read().iter() {
            handler(&event);
        }
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(TelemetryEvent::Status(message.into()));
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.read().len()
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
