use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use bridge_ingest_ac::AcUdpConfig;
use model::TrackReferencePoints;
use serde::{Deserialize, Serialize};

pub const SETTINGS_FILE: &str = "appsettings.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub games: GamesConfig,
    /// TCP port RaceChrono connects to.
    pub bridge_port: u16,
    pub tracks: HashMap<String, TrackReferencePoints>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { games: GamesConfig::default(), bridge_port: 9000, tracks: HashMap::new() }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GamesConfig {
    pub assetto_corsa: AcUdpConfig,
}

/// `appsettings.json` beside the executable, else in the working directory.
pub fn default_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(SETTINGS_FILE)))
        .filter(|path| path.exists())
        .unwrap_or_else(|| PathBuf::from(SETTINGS_FILE))
}

pub fn load(path: &Path) -> anyhow::Result<AppConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    parse(&raw).with_context(|| format!("parsing {}", path.display()))
}

pub fn parse(raw: &str) -> anyhow::Result<AppConfig> {
    Ok(serde_json::from_str(raw)?)
}
