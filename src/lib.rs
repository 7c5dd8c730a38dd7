//! Fieldlog - field detection logger.
//!
//! Records object detections tagged with a GPS position in a local `SQLite`
//! store and reconciles that store with a remote server whenever it is
//! reachable.

#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod gps;
pub mod locking;
pub mod output;
pub mod pipeline;
pub mod remote;
pub mod store;
pub mod sync;

use clap::Parser;
use cli::{Cli, Command, ConfigAction, GlobalArgs, RunArgs};
use config::{
    Config, GpsSourceKind, config_file_path, database_path, load_config_file, load_default_config,
    save_config, validate_config,
};
use constants::TIMESTAMP_FORMAT;
use locking::StoreLock;
use output::ExportFormat;
use pipeline::{DetectionPipeline, JsonLinesFeed, PrecomputedDetector, Session, SessionOptions};
use remote::HttpRemote;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use store::{NewDetection, SqliteStore};
use sync::{PassOutcome, Reconciler};
use tracing::{debug, info, warn};

pub use error::{Error, Result};

/// Main entry point for the fieldlog CLI.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet);

    // First Ctrl+C stops the session after the current frame; a second one
    // removes lock files and exits immediately.
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        if handler_stop.swap(true, Ordering::SeqCst) {
            locking::cleanup_all_locks();
            std::process::exit(130); // 128 + SIGINT(2)
        }
        warn!("Stopping after the current frame (Ctrl+C again to abort)");
    }) {
        warn!("Failed to install Ctrl+C handler: {e}");
    }

    let mut config = match &cli.global.config {
        Some(path) => load_config_file(path)?,
        None => load_default_config()?,
    };
    apply_global_overrides(&mut config, &cli.global);

    match cli.command {
        Command::Config { action } => handle_config_command(action, &config, &cli.global),
        Command::Run(args) => handle_run(&args, config, &cli.global, stop),
        Command::Sync { force_unlock } => {
            validate_config(&config)?;
            handle_sync(&config, &cli.global, force_unlock)
        }
        Command::Add {
            class,
            confidence,
            lat,
            lon,
            force_unlock,
        } => {
            validate_config(&config)?;
            handle_add(
                &config,
                NewDetection::new(class, confidence, lat, lon),
                force_unlock,
            )
        }
        Command::List { limit } => {
            validate_config(&config)?;
            handle_list(&config, limit)
        }
        Command::Export { path, format } => {
            validate_config(&config)?;
            handle_export(&config, &path, format)
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter_str = if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_str));

    // Logs go to stderr so `list` output stays pipeable.
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn apply_global_overrides(config: &mut Config, global: &GlobalArgs) {
    if let Some(db) = &global.db {
        config.store.path = Some(db.clone());
    }
    if let Some(server) = &global.server {
        config.remote.base_url.clone_from(server);
    }
}

fn apply_run_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(min_confidence) = args.min_confidence {
        config.detection.min_confidence = min_confidence;
    }
    if args.offline {
        config.remote.enabled = false;
    }
    if let Some(interval) = args.sync_interval {
        config.sync.interval_secs = interval;
    }
    if args.no_sync_on_exit {
        config.sync.on_exit = false;
    }
    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        config.gps.source = GpsSourceKind::Fixed;
        config.gps.latitude = Some(lat);
        config.gps.longitude = Some(lon);
    }
}

/// Take the single-writer lock and open the store behind it.
fn open_locked_store(config: &Config, force_unlock: bool) -> Result<(StoreLock, SqliteStore)> {
    let db_path = database_path(config)?;

    if force_unlock && StoreLock::is_locked(&db_path) {
        warn!("Removing existing lock for {}", db_path.display());
        StoreLock::break_lock(&db_path)?;
    }

    let lock = StoreLock::acquire(&db_path).inspect_err(|e| {
        if matches!(e, Error::StoreLocked { .. })
            && let Some(holder) = StoreLock::holder(&db_path)
        {
            warn!(
                "Store held by pid {} on {} since {}",
                holder.pid, holder.hostname, holder.started
            );
        }
    })?;
    debug!("Holding {}", lock.path().display());
    let store = SqliteStore::open(&db_path)?;
    Ok((lock, store))
}

fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&database_path(config)?)
}

fn build_reconciler(config: &Config, show_progress: bool) -> Result<Option<Reconciler<HttpRemote>>> {
    if !config.remote.enabled {
        info!("Remote sync disabled, running offline");
        return Ok(None);
    }
    let remote = HttpRemote::new(&config.remote)?;
    Ok(Some(Reconciler::new(remote).with_progress(show_progress)))
}

fn handle_run(
    args: &RunArgs,
    mut config: Config,
    global: &GlobalArgs,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    apply_run_overrides(&mut config, args);
    validate_config(&config)?;

    let (_lock, mut store) = open_locked_store(&config, args.force_unlock)?;
    let feed = JsonLinesFeed::open(&args.events)?;
    let position = gps::position_source_from_config(&config.gps)?;
    let pipeline = DetectionPipeline::new(position, config.detection.min_confidence);
    let reconciler = build_reconciler(&config, !global.quiet)?;

    let options = SessionOptions {
        sync_interval: config.sync.interval(),
        sync_on_exit: config.sync.on_exit,
        max_frames: args.max_frames,
    };

    info!(
        "Logging detections at confidence >= {:.2}, gps source: {}",
        config.detection.min_confidence, config.gps.source
    );

    let mut session =
        Session::new(feed, PrecomputedDetector, pipeline, reconciler, options).with_stop_flag(stop);
    let summary = session.run(&mut store)?;

    info!(
        "Session complete: {} frames ({} skipped), {} recorded, {} duplicates, {} without fix",
        summary.frames,
        summary.frame_errors,
        summary.detections.recorded,
        summary.detections.duplicates,
        summary.detections.no_position
    );
    info!(
        "Sync: {} passes, {} offline, {} pulled, {} pushed, {} pending",
        summary.passes,
        summary.offline_passes,
        summary.pulled,
        summary.pushed,
        summary.pending_pushes
    );

    Ok(())
}

fn handle_sync(config: &Config, global: &GlobalArgs, force_unlock: bool) -> Result<()> {
    let Some(reconciler) = build_reconciler(config, !global.quiet)? else {
        return Err(Error::ConfigValidation {
            message: "remote sync is disabled (set remote.enabled = true)".to_string(),
        });
    };

    let (_lock, mut store) = open_locked_store(config, force_unlock)?;

    match reconciler.run(&mut store)? {
        PassOutcome::Offline => {
            println!(
                "Server unreachable at {}; nothing synced.",
                reconciler.remote().fetch_url()
            );
        }
        PassOutcome::Completed(report) => {
            println!("Remote records:  {}", report.fetched);
            println!("Pulled:          {}", report.pulled);
            println!("Pushed:          {}", report.pushed.len());
            println!("Failed pushes:   {}", report.push_failed.len());
            if report.skipped > 0 {
                println!("Skipped invalid: {}", report.skipped);
            }
        }
    }

    Ok(())
}

fn handle_add(config: &Config, detection: NewDetection, force_unlock: bool) -> Result<()> {
    detection.validate()?;
    let (_lock, mut store) = open_locked_store(config, force_unlock)?;

    match store.insert_if_absent(&detection)? {
        Some(id) => println!("Recorded #{id}: {}", detection.key()),
        None => println!("Already recorded: {}", detection.key()),
    }
    Ok(())
}

fn handle_list(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    let records = store.recent(limit)?;

    if records.is_empty() {
        println!("No detections recorded.");
        return Ok(());
    }

    println!(
        "{:>6}  {:<20} {:>6}  {:>11} {:>12}  {}",
        "ID", "CLASS", "CONF", "LATITUDE", "LONGITUDE", "TIMESTAMP"
    );
    for record in &records {
        println!(
            "{:>6}  {:<20} {:>6.2}  {:>11.6} {:>12.6}  {}",
            record.id,
            record.class_label,
            record.confidence,
            record.latitude,
            record.longitude,
            record.timestamp.format(TIMESTAMP_FORMAT)
        );
    }

    let total = store.count()?;
    if total > records.len() {
        println!("({} of {total} shown)", records.len());
    }
    Ok(())
}

fn handle_export(config: &Config, path: &Path, format: Option<ExportFormat>) -> Result<()> {
    let format = format
        .or_else(|| ExportFormat::from_extension(path))
        .unwrap_or_default();
    let store = open_store(config)?;
    let records = store.all()?;

    output::export_records(&records, path, format)?;
    println!(
        "Exported {} detections to {} ({format})",
        records.len(),
        path.display()
    );
    Ok(())
}

fn handle_config_command(action: ConfigAction, config: &Config, global: &GlobalArgs) -> Result<()> {
    let path = match &global.config {
        Some(path) => path.clone(),
        None => config_file_path()?,
    };

    match action {
        ConfigAction::Init => {
            if path.exists() {
                println!("Configuration file already exists: {}", path.display());
            } else {
                save_config(&Config::default(), &path)?;
                println!("Created configuration file: {}", path.display());
                println!("\nNext steps:");
                println!("  Set remote.base_url to your detection server");
                println!("  Set gps.source to \"fixed\" with latitude/longitude if there is no gpsd");
            }
            Ok(())
        }
        ConfigAction::Show => {
            let rendered = toml::to_string_pretty(config)
                .map_err(|e| Error::ConfigSerialize { source: e })?;
            println!("# {}", display_or_default(&path));
            print!("{rendered}");
            Ok(())
        }
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn display_or_default(path: &Path) -> String {
    if path.exists() {
        path.display().to_string()
    } else {
        format!("{} (not found, showing defaults)", path.display())
    }
}
