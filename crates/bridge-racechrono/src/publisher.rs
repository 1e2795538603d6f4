use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bridge_core::{EventHub, Shutdown, TelemetryEvent};
use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clients::ClientRegistry;
use crate::sentences::RaceChronoEncoder;

const ACCEPT_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub bind_host: String,
    pub port: u16,
    /// Frames buffered per client before new ones are dropped.
    pub client_queue: usize,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self { bind_host: "0.0.0.0".into(), port: 9000, client_queue: 64 }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("publisher already started")]
    AlreadyStarted,
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Serves the sentence stream to any number of RaceChrono clients over TCP.
pub struct RaceChronoPublisher {
    config: PublisherConfig,
    clients: Arc<ClientRegistry>,
    started: AtomicBool,
}

/// The running accept loop.
pub struct PublisherHandle {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl PublisherHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Waits for the accept loop to wind down after shutdown.
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            warn!(error = %err, "publisher task ended abnormally");
        }
    }
}

impl RaceChronoPublisher {
    pub fn new(config: PublisherConfig) -> Self {
        Self { config, clients: Arc::new(ClientRegistry::new()), started: AtomicBool::new(false) }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Binds the listener, hooks car updates on `events` and spawns the
    /// accept loop. A publisher can be started once.
    pub async fn start(&self, events: &EventHub, shutdown: Shutdown) -> Result<PublisherHandle, PublishError> {
        if self.started.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return Err(PublishError::AlreadyStarted);
        }

        let listener = match TcpListener::bind((self.config.bind_host.as_str(), self.config.port)).await {
            Ok(listener) => listener,
            Err(source) => {
                self.started.store(false, Ordering::Release);
                return Err(PublishError::Bind {
                    addr: format!("{}:{}", self.config.bind_host, self.config.port),
                    source,
                });
            }
        };
        let local_addr = listener.local_addr()?;
        info!("Awaiting RaceChrono connection at {local_addr}");

        let encoder = Mutex::new(RaceChronoEncoder::new());
        let clients = self.clients.clone();
        let stopped = shutdown.clone();
        events.subscribe(move |event| {
            let TelemetryEvent::CarUpdate(update) = event else { return };
            if stopped.is_triggered() || clients.is_empty() {
                return;
            }
            let utc = OffsetDateTime::now_utc();
            let frame = encoder.lock().encode_update(update, &utc);
            clients.broadcast(&frame);
        });

        let task = tokio::spawn(accept_loop(
            listener,
            self.clients.clone(),
            self.config.client_queue.max(1),
            shutdown,
        ));
        Ok(PublisherHandle { local_addr, task })
    }
}

async fn accept_loop(listener: TcpListener, clients: Arc<ClientRegistry>, queue: usize, shutdown: Shutdown) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.triggered() => break,
            res = listener.accept() => res,
        };
        match accepted {
            Ok((stream, addr)) => {
                if let Err(err) = stream.set_nodelay(true) {
                    debug!(%addr, error = %err, "set_nodelay failed");
                }
                let (tx, rx) = mpsc::channel(queue);
                let id = clients.insert(addr, tx);
                info!(%addr, "RaceChrono client connected");
                tokio::spawn(serve_client(stream, addr, id, rx, clients.clone(), shutdown.clone()));
            }
            Err(err) => {
                warn!(error = %err, "accept failed");
                tokio::select! {
                    _ = shutdown.triggered() => break,
                    _ = tokio::time::sleep(ACCEPT_BACKOFF) => {}
                }
            }
        }
    }
    clients.clear();
    info!("Stopped accepting RaceChrono clients");
}

async fn serve_client(
    stream: TcpStream,
    addr: SocketAddr,
    id: u64,
    mut rx: mpsc::Receiver<Bytes>,
    clients: Arc<ClientRegistry>,
    shutdown: Shutdown,
) {
    let (mut reader, mut writer) = stream.into_split();
    // RaceChrono never talks back; reads only detect the close.
    let mut scratch = [0u8; 256];

    loop {
        tokio::select! {
            _ = shutdown.triggered() => break,
            frame = rx.recv() => {
                // None: replaced by a newer connection or the registry was cleared
                let Some(frame) = frame else { break };
                let written = tokio::select! {
                    _ = shutdown.triggered() => break,
                    res = writer.write_all(&frame) => res,
                };
                if let Err(err) = written {
                    debug!(%addr, error = %err, "write failed");
                    break;
                }
            }
            read = reader.read(&mut scratch) => match read {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            },
        }
    }

    if clients.remove(addr, id) {
        info!(%addr, "RaceChrono client disconnected");
    }
    let _ = writer.shutdown().await;
}
