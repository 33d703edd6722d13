use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG: &str = "wifitrack.yaml";
pub const DEFAULT_INTERFACE: &str = "en2";
pub const DEFAULT_DURATION_SECS: u64 = 60;
pub const DEFAULT_REFRESH_SECS: u64 = 5;
pub const DEFAULT_WINDOW_SECS: u64 = 5;
pub const DEFAULT_CSV_STORE: &str = "wifi_usage.csv";
pub const DEFAULT_SQLITE_STORE: &str = "wifi_usage.db";
pub const DEFAULT_DIRECTORY: &str = "devices.csv";

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Csv,
    Sqlite,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub interface: Option<String>,
    pub duration_secs: Option<u64>,
    pub refresh_secs: Option<u64>,
    pub window_secs: Option<u64>,
    pub store: Option<PathBuf>,
    pub store_backend: Option<StoreBackend>,
    pub directory: Option<PathBuf>,
    /// Replay file of JSON-lines events; replaces live capture when set.
    pub events: Option<PathBuf>,
    /// Extra or overriding port names.
    pub services: Option<BTreeMap<u16, String>>,
}

/// Load `path`, or `./wifitrack.yaml` when no path is given and that file exists.
pub fn load_config(path: Option<&Path>) -> Result<Option<Config>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG);
            if p.exists() { p.to_path_buf() } else { return Ok(None); }
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading config {}", path.display()))?;
    parse_config(&s).with_context(|| format!("parsing config {}", path.display())).map(Some)
}

pub fn parse_config(s: &str) -> Result<Config> {
    // An empty document deserializes to unit, not a map.
    if s.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(s)?)
}

/// Command-line values that override the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub interface: Option<String>,
    pub events: Option<PathBuf>,
    pub store: Option<PathBuf>,
    pub backend: Option<StoreBackend>,
    pub directory: Option<PathBuf>,
    pub services: Option<String>,
    pub duration_secs: Option<u64>,
    pub refresh_secs: Option<u64>,
    pub window_secs: Option<u64>,
}

/// Fully resolved run settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub interface: String,
    pub events: Option<PathBuf>,
    pub store: PathBuf,
    pub backend: StoreBackend,
    pub directory: PathBuf,
    pub services: Vec<(u16, String)>,
    pub duration: Duration,
    pub refresh: Duration,
    pub window: Duration,
}

fn positive(name: &str, secs: u64) -> Result<Duration> {
    if secs == 0 {
        bail!("{} must be at least one second", name);
    }
    Ok(Duration::from_secs(secs))
}

impl Settings {
    /// Command line beats config file beats built-in defaults.
    pub fn resolve(cfg: Option<&Config>, cli: Overrides) -> Result<Self> {
        let cfg = cfg.cloned().unwrap_or_default();
        let backend = cli.backend.or(cfg.store_backend).unwrap_or_default();
        let store = cli.store.or(cfg.store).unwrap_or_else(|| {
            PathBuf::from(match backend {
                StoreBackend::Csv => DEFAULT_CSV_STORE,
                StoreBackend::Sqlite => DEFAULT_SQLITE_STORE,
            })
        });

        let mut services: Vec<(u16, String)> = cfg.services.unwrap_or_default().into_iter().collect();
        if let Some(spec) = cli.services.as_deref() {
            services.extend(service_classifier::parse_port_map(spec)?);
        }
        if let Some((p, _)) = services.iter().find(|(p, _)| *p == 0) {
            bail!("invalid service port: {}", p);
        }
        // The store joins labels with this separator and splits on it when reading back.
        if let Some((p, name)) = services.iter().find(|(_, n)| n.contains(session_store::APPLICATION_SEPARATOR)) {
            bail!("service name {:?} for port {} must not contain {:?}", name, p, session_store::APPLICATION_SEPARATOR);
        }

        let refresh = positive("refresh", cli.refresh_secs.or(cfg.refresh_secs).unwrap_or(DEFAULT_REFRESH_SECS))?;
        let window = positive("window", cli.window_secs.or(cfg.window_secs).unwrap_or(DEFAULT_WINDOW_SECS))?;
        let duration = positive("duration", cli.duration_secs.or(cfg.duration_secs).unwrap_or(DEFAULT_DURATION_SECS))?;

        Ok(Settings {
            interface: cli.interface.or(cfg.interface).unwrap_or_else(|| DEFAULT_INTERFACE.to_string()),
            events: cli.events.or(cfg.events),
            store,
            backend,
            directory: cli.directory.or(cfg.directory).unwrap_or_else(|| PathBuf::from(DEFAULT_DIRECTORY)),
            services,
            duration,
            refresh,
            window,
        })
    }
}
