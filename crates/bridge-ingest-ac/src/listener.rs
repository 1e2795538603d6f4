use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bridge_core::{
    CarUpdate, ConnectionInfo, EventHub, IngestError, LapEvent, Shutdown, TelemetryEvent,
    TelemetrySource,
};
use coords::{ConverterRegistry, GeoConverter};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::net::{lookup_host, UdpSocket};
use tokio::time;
use tracing::{debug, info, warn};

use crate::wire::{HandshakeRequest, HandshakeResponse, OperationId, Packet, RtCarInfo, RtLap};

const MAX_DATAGRAM: usize = 2048;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AcUdpConfig {
    /// Where the simulator listens, e.g. "127.0.0.1"
    pub host: String,
    pub port: u16,
    /// How long to wait for a handshake reply.
    pub handshake_timeout_ms: u64,
    /// Pause before resending an unanswered handshake.
    pub handshake_retry_delay_ms: u64,
    /// Silence on a subscribed session before it is considered dead.
    pub idle_timeout_ms: u64,
    pub invert_clutch: bool,
}

impl Default for AcUdpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9996,
            handshake_timeout_ms: 1000,
            handshake_retry_delay_ms: 5000,
            idle_timeout_ms: 5000,
            invert_clutch: false,
        }
    }
}

impl AcUdpConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn handshake_retry_delay(&self) -> Duration {
        Duration::from_millis(self.handshake_retry_delay_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// How a subscribed session came to an end.
enum SessionEnd {
    Cancelled,
    Idle,
}

pub struct AcUdpListener {
    cfg: AcUdpConfig,
    converters: Arc<ConverterRegistry>,
    events: EventHub,
    connection: Mutex<ConnectionInfo>,
}

impl AcUdpListener {
    pub fn new(cfg: AcUdpConfig, converters: Arc<ConverterRegistry>) -> Self {
        Self {
            cfg,
            converters,
            events: EventHub::new(),
            connection: Mutex::new(ConnectionInfo::disconnected()),
        }
    }

    /// The simulator identity of the live session, or the disconnected placeholder.
    pub fn connection(&self) -> ConnectionInfo {
        self.connection.lock().clone()
    }

    /// One connection attempt: handshake, subscribe, receive, tear down.
    ///
    /// Returns `Err` only for configuration problems; everything network
    /// related is reported through the event hub and ends the session.
    async fn session(&self, shutdown: &Shutdown) -> Result<(), IngestError> {
        let socket = match self.open_socket().await {
            Ok(socket) => socket,
            Err(e) => {
                self.report_error(&e);
                self.pause(shutdown).await;
                return Ok(());
            }
        };

        let info = match self.handshake(&socket, shutdown).await {
            Ok(Some(info)) => info,
            Ok(None) => return Ok(()),
            Err(e) => {
                self.report_error(&e);
                self.pause(shutdown).await;
                return Ok(());
            }
        };
        info!(
            driver = %info.driver_name,
            car = %info.car_name,
            track = %info.track_name,
            layout = %info.track_config,
            "AC handshake complete"
        );
        let track_name = info.track_name.clone();
        *self.connection.lock() = info.clone();
        self.events.emit(TelemetryEvent::Connected(info));
        self.events.status("Connected.");

        let converter = match self.converters.get(&track_name) {
            Ok(converter) => *converter,
            Err(e) => {
                let err = IngestError::from(e);
                self.report_error(&err);
                if let Err(e) = send_operation(&socket, OperationId::Dismiss).await {
                    debug!("dismiss not delivered: {e}");
                }
                self.disconnected();
                return Err(err);
            }
        };

        self.events.status("Subscribing to updates...");
        let outcome = match self.subscribe(&socket).await {
            Ok(()) => {
                self.events.status("Subscribed.");
                self.receive(&socket, &converter, shutdown).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = send_operation(&socket, OperationId::Dismiss).await {
            debug!("dismiss not delivered: {e}");
        }
        self.disconnected();

        match outcome {
            Ok(SessionEnd::Cancelled) => debug!("AC session cancelled"),
            Ok(SessionEnd::Idle) => debug!("AC session idle, restarting"),
            Err(e) => self.report_error(&e),
        }
        Ok(())
    }

    async fn open_socket(&self) -> Result<UdpSocket, IngestError> {
        let target = lookup_host((self.cfg.host.as_str(), self.cfg.port))
            .await
            .with_context(|| format!("resolve {}:{}", self.cfg.host, self.cfg.port))?
            .next()
            .ok_or_else(|| {
                IngestError::Msg(format!("{}:{} resolved to nothing", self.cfg.host, self.cfg.port))
            })?;

        // never the simulator's own port
        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local)
            .await
            .with_context(|| format!("bind {local}"))?;
        socket
            .connect(target)
            .await
            .with_context(|| format!("connect {target}"))?;
        Ok(socket)
    }

    /// Sends HANDSHAKE until a reply arrives. `None` means shutdown was requested.
    async fn handshake(
        &self,
        socket: &UdpSocket,
        shutdown: &Shutdown,
    ) -> Result<Option<ConnectionInfo>, IngestError> {
        let mut buf = [0u8; MAX_DATAGRAM];
        let retry_secs = self.cfg.handshake_retry_delay().as_secs_f32();

        while !shutdown.is_triggered() {
            let target = socket.peer_addr()?;
            self.events.status(format!("Sending handshake to {target}..."));
            let reply = match send_operation(socket, OperationId::Handshake).await {
                // a pending ICMP error can surface on send as well
                Err(e) if is_unreachable(&e) => Ok(Err(e)),
                Err(e) => return Err(e.into()),
                Ok(()) => tokio::select! {
                    _ = shutdown.triggered() => return Ok(None),
                    res = time::timeout(self.cfg.handshake_timeout(), socket.recv(&mut buf)) => res,
                },
            };

            let notice = match reply {
                Ok(Ok(len)) => match HandshakeResponse::decode(&buf[..len]) {
                    Ok(resp) => return Ok(Some(connection_info(resp))),
                    Err(e) => {
                        warn!("unexpected AC handshake reply: {e}");
                        format!("Unexpected handshake reply ({e}). Retrying in {retry_secs}s...")
                    }
                },
                // ICMP port unreachable: nothing is listening yet
                Ok(Err(e)) if is_unreachable(&e) => {
                    debug!("AC not reachable: {e}");
                    format!("No response from AC. Retrying in {retry_secs}s...")
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_elapsed) => format!("No response from AC. Retrying in {retry_secs}s..."),
            };
            self.events.status(notice);

            if !self.pause(shutdown).await {
                return Ok(None);
            }
        }
        Ok(None)
    }

    async fn subscribe(&self, socket: &UdpSocket) -> Result<(), IngestError> {
        send_operation(socket, OperationId::SubscribeUpdate).await?;
        send_operation(socket, OperationId::SubscribeSpot).await?;
        Ok(())
    }

    async fn receive(
        &self,
        socket: &UdpSocket,
        converter: &GeoConverter,
        shutdown: &Shutdown,
    ) -> Result<SessionEnd, IngestError> {
        let mut buf = [0u8; MAX_DATAGRAM];
        let idle = self.cfg.idle_timeout();
        loop {
            let received = tokio::select! {
                _ = shutdown.triggered() => return Ok(SessionEnd::Cancelled),
                res = time::timeout(idle, socket.recv(&mut buf)) => res,
            };
            let len = match received {
                Ok(res) => res?,
                Err(_elapsed) => {
                    warn!("no AC data for {idle:?}, reconnecting");
                    self.events
                        .status(format!("No data for {}s. Reconnecting...", idle.as_secs_f32()));
                    return Ok(SessionEnd::Idle);
                }
            };
            self.dispatch(&buf[..len], converter);
        }
    }

    fn dispatch(&self, datagram: &[u8], converter: &GeoConverter) {
        match Packet::classify(datagram) {
            Ok(Packet::CarInfo(info)) => {
                let update = car_update_from(&info, converter, self.cfg.invert_clutch);
                self.events.emit(TelemetryEvent::CarUpdate(update));
            }
            Ok(Packet::Lap(lap)) => {
                debug!(lap = lap.lap, time_ms = lap.time_ms, "lap completed");
                self.events.emit(TelemetryEvent::Lap(lap_event(lap)));
            }
            Ok(Packet::Unknown(len)) => {
                debug!("dropping {len} byte datagram");
                self.events.status(format!("Unknown data length: {len} bytes"));
            }
            Err(e) => {
                warn!("failed to decode AC datagram: {e}");
                self.events.status(format!("Malformed data: {e}"));
            }
        }
    }

    /// Waits out the retry delay. `false` means shutdown came first.
    async fn pause(&self, shutdown: &Shutdown) -> bool {
        tokio::select! {
            _ = shutdown.triggered() => false,
            _ = time::sleep(self.cfg.handshake_retry_delay()) => true,
        }
    }

    fn disconnected(&self) {
        *self.connection.lock() = ConnectionInfo::disconnected();
        self.events.emit(TelemetryEvent::Disconnected);
    }

    // `{:#}` keeps the whole anyhow context chain, down to the OS reason.
    fn report_error(&self, err: &IngestError) {
        warn!("AC listener error: {err:#}");
        self.events.emit(TelemetryEvent::Error(format!("{err:#}")));
        self.events.status(format!("Error: {err:#}"));
    }
}

#[async_trait::async_trait]
impl TelemetrySource for AcUdpListener {
    fn events(&self) -> &EventHub {
        &self.events
    }

    async fn run(&self, shutdown: Shutdown) -> Result<(), IngestError> {
        info!(host = %self.cfg.host, port = self.cfg.port, "starting AC UDP listener");
        self.events.status("Starting AC UDP listener...");

        let result = loop {
            if shutdown.is_triggered() {
                break Ok(());
            }
            if let Err(e) = self.session(&shutdown).await {
                break Err(e);
            }
        };

        info!("AC UDP listener stopped");
        self.events.status("Stopped AC UDP listener");
        result
    }
}

/// Builds the outgoing snapshot, swapping the planar position for lat/lon.
pub fn car_update_from(info: &RtCarInfo, converter: &GeoConverter, invert_clutch: bool) -> CarUpdate {
    let [x, y, z] = info.car_coordinates;
    let gps = converter.from_planar(x, z);
    CarUpdate {
        speed_kmh: info.speed_kmh,
        engine_rpm: info.engine_rpm,
        gear: info.gear,
        lap_time_ms: info.lap_time,
        last_lap_ms: info.last_lap,
        best_lap_ms: info.best_lap,
        lap_count: info.lap_count,
        gas: info.gas,
        brake: info.brake,
        clutch: if invert_clutch { 1.0 - info.clutch } else { info.clutch },
        latitude: gps.latitude,
        longitude: gps.longitude,
        altitude: y,
        pos_normalized: info.car_position_normalized,
        game_pos_x: x,
        game_pos_y: y,
        game_pos_z: z,
        slope: info.car_slope,
        acc_g_vertical: info.acc_g_vertical,
        acc_g_horizontal: info.acc_g_horizontal,
        acc_g_frontal: info.acc_g_frontal,
    }
}

fn connection_info(resp: HandshakeResponse) -> ConnectionInfo {
    ConnectionInfo {
        is_connected: true,
        driver_name: resp.driver_name,
        car_name: resp.car_name,
        track_name: resp.track_name,
        track_config: resp.track_config,
        server_identifier: resp.identifier,
        server_version: resp.version,
    }
}

fn lap_event(lap: RtLap) -> LapEvent {
    LapEvent {
        car_identifier_number: lap.car_identifier_number,
        lap: lap.lap,
        driver_name: lap.driver_name,
        car_name: lap.car_name,
        time_ms: lap.time_ms,
    }
}

async fn send_operation(socket: &UdpSocket, operation: OperationId) -> io::Result<()> {
    socket.send(&HandshakeRequest::new(operation).encode()).await?;
    Ok(())
}

fn is_unreachable(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{HandshakeRequest, RT_CAR_INFO_SIZE};
    use bridge_core::shutdown_channel;
    use coords::{GeoCoordinate, ReferencePoint};
    use tokio::sync::mpsc;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    const WAIT: Duration = Duration::from_secs(3);

    fn ring_points() -> (ReferencePoint, ReferencePoint) {
        (
            ReferencePoint::new(0.0, 0.0, GeoCoordinate::new(58.401111, 24.453306)),
            ReferencePoint::new(-299.5362, -132.2299, GeoCoordinate::new(58.402361, 24.448056)),
        )
    }

    fn registry() -> Result<Arc<ConverterRegistry>, coords::CoordError> {
        let (p0, p1) = ring_points();
        let mut registry = ConverterRegistry::new();
        registry.insert("test_track", GeoConverter::from_reference_points(&p0, &p1)?);
        Ok(Arc::new(registry))
    }

    fn test_config(port: u16) -> AcUdpConfig {
        AcUdpConfig {
            host: "127.0.0.1".into(),
            port,
            handshake_timeout_ms: 150,
            handshake_retry_delay_ms: 50,
            idle_timeout_ms: 250,
            invert_clutch: false,
        }
    }

    fn subscribe_events(hub: &EventHub) -> mpsc::UnboundedReceiver<TelemetryEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        hub.subscribe(move |ev| {
            let _ = tx.send(ev.clone());
        });
        rx
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<TelemetryEvent>) -> Option<TelemetryEvent> {
        time::timeout(WAIT, rx.recv()).await.ok().flatten()
    }

    /// Plays the simulator side of the protocol on loopback.
    struct FakeSim {
        socket: UdpSocket,
    }

    impl FakeSim {
        async fn bind() -> io::Result<(Self, u16)> {
            let socket = UdpSocket::bind("127.0.0.1:0").await?;
            let port = socket.local_addr()?.port();
            Ok((Self { socket }, port))
        }

        async fn expect(&self, op: OperationId) -> Result<SocketAddr, Box<dyn std::error::Error>> {
            let mut buf = [0u8; 64];
            let (len, from) = time::timeout(WAIT, self.socket.recv_from(&mut buf)).await??;
            let req = HandshakeRequest::decode(&buf[..len])?;
            assert_eq!(req.operation, op);
            Ok(from)
        }

        async fn accept(&self, track: &str) -> Result<SocketAddr, Box<dyn std::error::Error>> {
            let client = self.expect(OperationId::Handshake).await?;
            let resp = HandshakeResponse {
                car_name: "ks_porsche_911_gt3_r".into(),
                driver_name: "Tester".into(),
                identifier: 4242,
                version: 6,
                track_name: track.into(),
                track_config: "".into(),
            };
            self.socket.send_to(&resp.encode(), client).await?;
            Ok(client)
        }

        async fn accept_and_subscribe(&self, track: &str) -> Result<SocketAddr, Box<dyn std::error::Error>> {
            let client = self.accept(track).await?;
            self.expect(OperationId::SubscribeUpdate).await?;
            self.expect(OperationId::SubscribeSpot).await?;
            Ok(client)
        }
    }

    #[test]
    fn car_update_converts_position_and_inverts_clutch() -> TestResult {
        let (_, p1) = ring_points();
        let registry = registry()?;
        let converter = registry.get("test_track")?;
        let info = RtCarInfo {
            speed_kmh: 150.0,
            clutch: 0.25,
            gear: 3,
            car_coordinates: [p1.x, 7.5, p1.z],
            ..RtCarInfo::default()
        };

        let plain = car_update_from(&info, converter, false);
        assert_eq!(plain.clutch, 0.25);
        assert!((plain.latitude - p1.gps.latitude).abs() < 1e-9);
        assert!((plain.longitude - p1.gps.longitude).abs() < 1e-9);
        assert_eq!(plain.altitude, 7.5);
        assert_eq!(plain.game_pos_x, p1.x);
        assert_eq!(plain.gear, 3);

        let inverted = car_update_from(&info, converter, true);
        assert_eq!(inverted.clutch, 0.75);
        Ok(())
    }

    #[tokio::test]
    async fn handshake_retry_emits_one_notice_per_timeout() -> TestResult {
        let (sim, port) = FakeSim::bind().await?;
        let listener = Arc::new(AcUdpListener::new(test_config(port), registry()?));
        let mut events = subscribe_events(listener.events());
        let (trigger, shutdown) = shutdown_channel();
        let task = {
            let listener = listener.clone();
            tokio::spawn(async move { listener.run(shutdown).await })
        };

        // ignore the first handshake, answer the second
        sim.expect(OperationId::Handshake).await?;
        sim.accept_and_subscribe("test_track").await?;

        let mut retries = 0;
        loop {
            match next_event(&mut events).await {
                Some(TelemetryEvent::Status(s)) if s.starts_with("No response from AC") => retries += 1,
                Some(TelemetryEvent::Connected(info)) => {
                    assert!(info.is_connected);
                    assert_eq!(info.driver_name, "Tester");
                    assert_eq!(info.server_identifier, 4242);
                    assert_eq!(listener.connection(), info);
                    break;
                }
                Some(_) => {}
                None => panic!("listener never connected"),
            }
        }
        assert_eq!(retries, 1);

        trigger.trigger();
        sim.expect(OperationId::Dismiss).await?;
        let res = time::timeout(WAIT, task).await??;
        assert!(res.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn idle_session_dismisses_and_handshakes_again() -> TestResult {
        let (sim, port) = FakeSim::bind().await?;
        let listener = Arc::new(AcUdpListener::new(test_config(port), registry()?));
        let mut events = subscribe_events(listener.events());
        let (trigger, shutdown) = shutdown_channel();
        let task = {
            let listener = listener.clone();
            tokio::spawn(async move { listener.run(shutdown).await })
        };

        sim.accept_and_subscribe("test_track").await?;
        // stay silent past the idle timeout
        sim.expect(OperationId::Dismiss).await?;
        sim.expect(OperationId::Handshake).await?;

        let mut saw_reconnect = false;
        let mut saw_disconnect = false;
        while let Ok(ev) = events.try_recv() {
            match ev {
                TelemetryEvent::Status(s) if s.contains("Reconnecting") => saw_reconnect = true,
                TelemetryEvent::Disconnected => saw_disconnect = true,
                TelemetryEvent::Error(e) => panic!("idle timeout must not surface as an error: {e}"),
                _ => {}
            }
        }
        assert!(saw_reconnect);
        assert!(saw_disconnect);

        trigger.trigger();
        let res = time::timeout(WAIT, task).await??;
        assert!(res.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn datagrams_are_dispatched_by_length() -> TestResult {
        let (sim, port) = FakeSim::bind().await?;
        let cfg = AcUdpConfig { invert_clutch: true, idle_timeout_ms: 2000, ..test_config(port) };
        let listener = Arc::new(AcUdpListener::new(cfg, registry()?));
        let mut events = subscribe_events(listener.events());
        let (trigger, shutdown) = shutdown_channel();
        let task = {
            let listener = listener.clone();
            tokio::spawn(async move { listener.run(shutdown).await })
        };

        let client = sim.accept_and_subscribe("test_track%%%").await?;
        let (_, p1) = ring_points();
        let info = RtCarInfo {
            identifier: "a".into(),
            size: RT_CAR_INFO_SIZE as i32,
            speed_kmh: 88.0,
            clutch: 0.2,
            lap_count: 2,
            car_coordinates: [p1.x, 3.0, p1.z],
            ..RtCarInfo::default()
        };
        sim.socket.send_to(&info.encode(), client).await?;
        let lap = RtLap {
            car_identifier_number: 0,
            lap: 2,
            driver_name: "Tester".into(),
            car_name: "ks_porsche_911_gt3_r".into(),
            time_ms: 93_456,
        };
        sim.socket.send_to(&lap.encode(), client).await?;
        sim.socket.send_to(&[1, 2, 3, 4, 5, 6, 7], client).await?;

        let mut update = None;
        let mut lap_event = None;
        let mut unknown = None;
        while update.is_none() || lap_event.is_none() || unknown.is_none() {
            match next_event(&mut events).await {
                Some(TelemetryEvent::CarUpdate(u)) => update = Some(u),
                Some(TelemetryEvent::Lap(l)) => lap_event = Some(l),
                Some(TelemetryEvent::Status(s)) if s.starts_with("Unknown data length") => unknown = Some(s),
                Some(_) => {}
                None => panic!("missing events"),
            }
        }

        let update = update.ok_or("no update")?;
        assert_eq!(update.speed_kmh, 88.0);
        assert_eq!(update.lap_count, 2);
        assert!((update.clutch - 0.8).abs() < 1e-6);
        assert!((update.latitude - p1.gps.latitude).abs() < 1e-9);
        assert!((update.longitude - p1.gps.longitude).abs() < 1e-9);

        let lap_event = lap_event.ok_or("no lap")?;
        assert_eq!(lap_event.time_ms, 93_456);
        assert_eq!(lap_event.driver_name, "Tester");

        assert_eq!(unknown.as_deref(), Some("Unknown data length: 7 bytes"));

        trigger.trigger();
        sim.expect(OperationId::Dismiss).await?;
        let res = time::timeout(WAIT, task).await??;
        assert!(res.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn unknown_track_ends_the_listener() -> TestResult {
        let (sim, port) = FakeSim::bind().await?;
        let listener = Arc::new(AcUdpListener::new(test_config(port), registry()?));
        let (_trigger, shutdown) = shutdown_channel();
        let task = {
            let listener = listener.clone();
            tokio::spawn(async move { listener.run(shutdown).await })
        };

        sim.accept("nordschleife").await?;
        sim.expect(OperationId::Dismiss).await?;
        let res = time::timeout(WAIT, task).await??;
        assert!(matches!(
            res,
            Err(IngestError::Coordinates(coords::CoordError::UnknownTrack(_)))
        ));
        assert!(!listener.connection().is_connected);
        Ok(())
    }

    #[tokio::test]
    async fn unresolvable_host_reports_and_retries() -> TestResult {
        let cfg = AcUdpConfig { host: "no-such-host.invalid".into(), ..test_config(9996) };
        let listener = Arc::new(AcUdpListener::new(cfg, registry()?));
        let mut events = subscribe_events(listener.events());
        let (trigger, shutdown) = shutdown_channel();
        let task = {
            let listener = listener.clone();
            tokio::spawn(async move { listener.run(shutdown).await })
        };

        let mut errors = Vec::new();
        let mut error_statuses = 0;
        while errors.len() < 2 {
            match next_event(&mut events).await {
                Some(TelemetryEvent::Error(e)) => errors.push(e),
                Some(TelemetryEvent::Status(s)) if s.starts_with("Error: ") => error_statuses += 1,
                Some(TelemetryEvent::Connected(_)) => panic!("nothing to connect to"),
                Some(_) => {}
                None => panic!("no second attempt after the failure"),
            }
        }
        assert!(errors.iter().all(|e| e.contains("no-such-host.invalid")));
        // context chain carries the resolver's reason too
        assert!(errors[0].contains(": "));
        assert!(error_statuses >= 1);

        trigger.trigger();
        let res = time::timeout(WAIT, task).await??;
        assert!(res.is_ok());
        assert!(!listener.connection().is_connected);
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_interrupts_handshake_wait() -> TestResult {
        let (sim, port) = FakeSim::bind().await?;
        let cfg = AcUdpConfig { handshake_timeout_ms: 10_000, ..test_config(port) };
        let listener = Arc::new(AcUdpListener::new(cfg, registry()?));
        let (trigger, shutdown) = shutdown_channel();
        let task = {
            let listener = listener.clone();
            tokio::spawn(async move { listener.run(shutdown).await })
        };

        sim.expect(OperationId::Handshake).await?;
        trigger.trigger();
        let res = time::timeout(Duration::from_secs(1), task).await??;
        assert!(res.is_ok());
        Ok(())
    }
}
