use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use device_directory::Directory;
use event_ingest::{EventSource, ReplaySource};
use log::{error, info, warn};
use service_classifier::ServicePortTable;
use session_store::{CsvSessionStore, ReopeningStore, SessionStore, StoreError};
use std::io;
use std::path::{Path, PathBuf};
use wifitrack_core::Cancellation;

mod config;
mod grid;
mod render;
mod tracker;

use config::{Overrides, Settings, StoreBackend};
use render::{PresentationSink, TextLayout, TextSink};
use tracker::{LiveSettings, Tracker};

#[derive(Debug, Parser)]
#[command(name = "wifitrack", version, about = "Per-device network usage sessions from ARP and TCP traffic")]
struct Cli {
    /// Optional config file (YAML). If omitted, loads ./wifitrack.yaml if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Args)]
struct SourceArgs {
    /// Network interface to observe (default: en2)
    #[arg(long)]
    interface: Option<String>,
    /// Replay JSON-lines events from FILE instead of capturing live
    #[arg(long, value_name = "FILE")]
    events: Option<PathBuf>,
    /// Session store path (default: wifi_usage.csv, or wifi_usage.db for sqlite)
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,
    /// Session store backend
    #[arg(long, value_enum)]
    backend: Option<StoreBackend>,
    /// Device directory CSV (default: devices.csv)
    #[arg(long, value_name = "PATH")]
    directory: Option<PathBuf>,
    /// Extra service names: comma list of port=name (e.g., 8080=HTTP-alt,5353=mDNS)
    #[arg(long)]
    services: Option<String>,
}

impl SourceArgs {
    fn overrides(self) -> Overrides {
        Overrides {
            interface: self.interface,
            events: self.events,
            store: self.store,
            backend: self.backend,
            directory: self.directory,
            services: self.services,
            ..Default::default()
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print version information
    Version,
    /// Observe the network for a fixed window, save sessions, print a summary
    Track {
        /// Observation window in seconds (default: 60)
        #[arg(long)]
        duration: Option<u64>,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Live device table, refreshed until Q or Ctrl-C
    Top {
        /// Seconds between refreshes (default: 5)
        #[arg(long)]
        refresh: Option<u64>,
        /// Seconds spent listening per refresh (default: 5)
        #[arg(long)]
        window: Option<u64>,
        /// Print plain tables to stdout instead of the full-screen view
        #[arg(long, default_value_t = false)]
        text: bool,
        #[command(flatten)]
        source: SourceArgs,
    },
    /// Print the sessions saved in the store
    Report {
        /// Session store path
        #[arg(long, value_name = "PATH")]
        store: Option<PathBuf>,
        /// Session store backend
        #[arg(long, value_enum)]
        backend: Option<StoreBackend>,
    },
}

// Full-screen mode keeps stderr quiet unless RUST_LOG asks otherwise.
fn init_logging(quiet: bool) {
    let default = if quiet { "error" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, default))
        .format_target(false)
        .init();
}

fn classifier(settings: &Settings) -> ServicePortTable {
    let mut table = ServicePortTable::builtin();
    table.extend(settings.services.iter().cloned());
    table
}

fn directory(path: &Path) -> Directory {
    Directory::load(path).unwrap_or_else(|e| {
        warn!("device directory {} unusable, names will be unknown: {}", path.display(), e);
        Directory::empty()
    })
}

#[cfg(feature = "capture")]
fn live_source() -> Result<Box<dyn EventSource>> {
    Ok(Box::new(event_ingest::LinkCapture::new()))
}

#[cfg(not(feature = "capture"))]
fn live_source() -> Result<Box<dyn EventSource>> {
    anyhow::bail!("no event source available: rebuild with --features capture or pass --events <FILE>")
}

fn event_source(settings: &Settings) -> Result<Box<dyn EventSource>> {
    match &settings.events {
        Some(path) => {
            info!("replaying events from {}", path.display());
            Ok(Box::new(ReplaySource::from_path(path)))
        }
        None => live_source(),
    }
}

#[cfg(feature = "sqlite")]
fn sqlite_store(path: &Path) -> Result<Box<dyn SessionStore>, StoreError> {
    Ok(Box::new(session_sqlite::SqliteSessionStore::open_or_create(path)?))
}

#[cfg(not(feature = "sqlite"))]
fn sqlite_store(_path: &Path) -> Result<Box<dyn SessionStore>, StoreError> {
    Err(StoreError::Backend("sqlite backend not built: rebuild with --features sqlite".into()))
}

fn backend_built(backend: StoreBackend) -> bool {
    match backend {
        StoreBackend::Csv => true,
        StoreBackend::Sqlite => cfg!(feature = "sqlite"),
    }
}

fn session_store(backend: StoreBackend, path: &Path) -> Result<Box<dyn SessionStore>, StoreError> {
    match backend {
        StoreBackend::Csv => Ok(Box::new(CsvSessionStore::open(path)?)),
        StoreBackend::Sqlite => sqlite_store(path),
    }
}

/// Store for a tracking run. An unreachable path only delays persistence; each flush retries it.
fn tracker_store(backend: StoreBackend, path: &Path) -> Result<Box<dyn SessionStore>> {
    if !backend_built(backend) {
        return Ok(session_store(backend, path)?);
    }
    let path = path.to_path_buf();
    let store = ReopeningStore::new(path.display().to_string(), move || session_store(backend, &path));
    Ok(Box::new(store))
}

fn build_tracker(settings: &Settings) -> Result<Tracker> {
    let source = event_source(settings)?;
    let store = tracker_store(settings.backend, &settings.store)?;
    Ok(Tracker::new(source, store, classifier(settings), directory(&settings.directory), settings.interface.clone()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let grid_mode = matches!(cli.command, Commands::Top { text: false, .. });
    init_logging(grid_mode);
    let loaded_cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Version => {
            println!("wifitrack {} (core {})", env!("CARGO_PKG_VERSION"), wifitrack_core::version());
        }
        Commands::Track { duration, source } => {
            let settings = Settings::resolve(
                loaded_cfg.as_ref(),
                Overrides { duration_secs: duration, ..source.overrides() },
            )?;
            let mut tracker = build_tracker(&settings)?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(tracker.track_once(settings.duration))?;
            let mut sink = TextSink::new(io::stdout(), TextLayout::Summary);
            sink.render(&tracker.rows())?;
            info!("sessions saved to {}", settings.store.display());
        }
        Commands::Top { refresh, window, text, source } => {
            let settings = Settings::resolve(
                loaded_cfg.as_ref(),
                Overrides { refresh_secs: refresh, window_secs: window, ..source.overrides() },
            )?;
            if settings.window > settings.refresh {
                warn!("window {:?} is longer than refresh {:?}; cycles will run back to back", settings.window, settings.refresh);
            }
            let mut tracker = build_tracker(&settings)?;
            let live = LiveSettings { refresh: settings.refresh, window: settings.window };
            let rt = tokio::runtime::Runtime::new()?;
            let stats = rt.block_on(async {
                let cancel = Cancellation::new();
                let on_signal = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        on_signal.cancel();
                    }
                });
                if text {
                    let mut sink = TextSink::new(io::stdout(), TextLayout::Table);
                    tracker.run_live(&mut sink, live, &cancel).await.map_err(anyhow::Error::from)
                } else {
                    let mut sink = grid::GridSink::new()?;
                    tracker.run_live(&mut sink, live, &cancel).await.map_err(anyhow::Error::from)
                }
            });
            match stats {
                Ok(s) => info!(
                    "stopped: {} announcements, {} connections, {} malformed",
                    s.announcements, s.connections, s.malformed
                ),
                Err(e) => {
                    error!("{}", e);
                    return Err(e);
                }
            }
        }
        Commands::Report { store, backend } => {
            let settings = Settings::resolve(
                loaded_cfg.as_ref(),
                Overrides { store, backend, ..Default::default() },
            )?;
            let store = session_store(settings.backend, &settings.store)?;
            let rows = store.load()?;
            println!("{:<18} {:<25} {:<25} {:>12}  Applications", "Device", "Start Time", "End Time", "Duration (s)");
            for r in &rows {
                println!(
                    "{:<18} {:<25} {:<25} {:>12.3}  {}",
                    r.device,
                    r.start_time,
                    r.end_time,
                    r.duration_secs,
                    r.applications_joined()
                );
            }
            println!("{} sessions", rows.len());
        }
    }
    Ok(())
}
