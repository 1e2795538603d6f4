//! Assetto Corsa to RaceChrono bridge.
//!
//! Listens to the simulator's UDP telemetry, converts positions to GPS and
//! serves NMEA + RC3 sentences to RaceChrono over TCP.

mod config;
mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use bridge_core::{shutdown_channel, TelemetrySource};
use bridge_ingest_ac::AcUdpListener;
use bridge_racechrono::{PublisherConfig, RaceChronoPublisher};
use clap::Parser;
use coords::ConverterRegistry;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "acrc-bridge", version)]
#[command(about = "Streams Assetto Corsa telemetry to RaceChrono as NMEA/RC3 over TCP")]
struct Cli {
    /// Settings file (defaults to appsettings.json next to the binary)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Override the RaceChrono TCP port
    #[arg(long)]
    port: Option<u16>,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let path = cli.config.clone().unwrap_or_else(config::default_path);
    let mut settings = config::load(&path)?;
    if let Some(port) = cli.port {
        settings.bridge_port = port;
    }

    let registry = ConverterRegistry::from_tracks(&settings.tracks).context("invalid track calibration")?;
    if registry.is_empty() {
        warn!("no tracks configured; every session will stop at the track lookup");
    }
    info!(tracks = registry.len(), "loaded {}", path.display());

    let listener = Arc::new(AcUdpListener::new(settings.games.assetto_corsa.clone(), Arc::new(registry)));
    let pump = status::spawn_pump(listener.events().channel()).context("spawning status thread")?;

    let (trigger, shutdown) = shutdown_channel();
    let publisher = RaceChronoPublisher::new(PublisherConfig {
        port: settings.bridge_port,
        ..PublisherConfig::default()
    });
    let publishing = publisher
        .start(listener.events(), shutdown.clone())
        .await
        .context("starting RaceChrono server")?;

    let mut source = {
        let listener = listener.clone();
        tokio::spawn(async move { listener.run(shutdown).await })
    };

    let finished_early = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("waiting for Ctrl+C")?;
            info!("Ctrl+C received, shutting down");
            None
        }
        res = &mut source => Some(res),
    };
    trigger.trigger();

    let outcome = match finished_early {
        Some(res) => res,
        None => source.await,
    };
    publishing.join().await;

    // the hub's senders go with the listener; that ends the pump
    drop(listener);
    if pump.join().is_err() {
        warn!("status thread panicked");
    }

    outcome.context("listener task failed")?.context("telemetry listener stopped")?;
    Ok(())
}
