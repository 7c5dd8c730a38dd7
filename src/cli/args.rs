//! CLI argument definitions.

use super::validators::{
    parse_class_label, parse_confidence, parse_latitude, parse_longitude, parse_server_url,
};
use crate::output::ExportFormat;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Field detection logger with store-and-forward sync.
#[derive(Debug, Parser)]
#[command(name = "fieldlog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every command.
    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Options shared by every command.
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Increase verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors; no progress bars.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Detection database (overrides config).
    #[arg(long, env = "FIELDLOG_DB", global = true)]
    pub db: Option<PathBuf>,

    /// Configuration file (default: platform config dir).
    #[arg(long, env = "FIELDLOG_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Server base URL (overrides config).
    #[arg(long, value_parser = parse_server_url, env = "FIELDLOG_SERVER", global = true)]
    pub server: Option<String>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log detections from a JSON-lines feed, syncing with the server.
    Run(RunArgs),
    /// Run one reconciliation pass against the server.
    Sync {
        /// Remove a lock file left behind by a crashed run.
        #[arg(long)]
        force_unlock: bool,
    },
    /// Record a manual observation.
    Add {
        /// Detected category.
        #[arg(value_parser = parse_class_label)]
        class: String,
        /// Confidence (0.0-1.0).
        #[arg(value_parser = parse_confidence)]
        confidence: f64,
        /// Latitude (-90.0 to 90.0).
        #[arg(long, value_parser = parse_latitude, allow_negative_numbers = true)]
        lat: f64,
        /// Longitude (-180.0 to 180.0).
        #[arg(long, value_parser = parse_longitude, allow_negative_numbers = true)]
        lon: f64,
        /// Remove a lock file left behind by a crashed run.
        #[arg(long)]
        force_unlock: bool,
    },
    /// Print stored detections, newest first.
    List {
        /// Maximum number of records to show.
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
    /// Write every stored detection to a file.
    Export {
        /// Output file.
        path: PathBuf,
        /// Output format (default: from the file extension, else csv).
        #[arg(short, long)]
        format: Option<ExportFormat>,
    },
    /// Manage configuration.
    Config {
        /// Configuration action to perform.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommand actions.
#[derive(Debug, Clone, Copy, Subcommand)]
pub enum ConfigAction {
    /// Create default configuration file.
    Init,
    /// Display current configuration.
    Show,
    /// Print configuration file path.
    Path,
}

/// Arguments for the `run` command.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Detection feed, one JSON array per frame (`-` for stdin).
    #[arg(short, long, default_value = "-")]
    pub events: PathBuf,

    /// Minimum confidence threshold (0.0-1.0).
    #[arg(short = 'c', long, value_parser = parse_confidence, env = "FIELDLOG_MIN_CONFIDENCE")]
    pub min_confidence: Option<f64>,

    /// Run without a server.
    #[arg(long)]
    pub offline: bool,

    /// Seconds between reconciliation passes (0 disables).
    #[arg(long, env = "FIELDLOG_SYNC_INTERVAL")]
    pub sync_interval: Option<u64>,

    /// Skip the reconciliation pass at shutdown.
    #[arg(long)]
    pub no_sync_on_exit: bool,

    /// Stop after this many frames.
    #[arg(long)]
    pub max_frames: Option<u64>,

    /// Fixed latitude; with --lon, replaces the configured GPS source.
    #[arg(long, value_parser = parse_latitude, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Fixed longitude; with --lat, replaces the configured GPS source.
    #[arg(long, value_parser = parse_longitude, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Remove a lock file left behind by a crashed run.
    #[arg(long)]
    pub force_unlock: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_add() {
        let cli = Cli::try_parse_from([
            "fieldlog", "add", "deer", "0.8", "--lat", "-33.5", "--lon", "151.2",
        ])
        .unwrap();
        match cli.command {
            Command::Add {
                class,
                confidence,
                lat,
                lon,
                force_unlock,
            } => {
                assert_eq!(class, "deer");
                assert!(!force_unlock);
                assert!((confidence - 0.8).abs() < f64::EPSILON);
                assert!((lat + 33.5).abs() < f64::EPSILON);
                assert!((lon - 151.2).abs() < f64::EPSILON);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_run_defaults_to_stdin() {
        let cli = Cli::try_parse_from(["fieldlog", "run", "--offline"]).unwrap();
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.events, PathBuf::from("-"));
                assert!(args.offline);
                assert!(args.min_confidence.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_sync_accepts_force_unlock() {
        let cli = Cli::try_parse_from(["fieldlog", "sync", "--force-unlock"]).unwrap();
        assert!(matches!(cli.command, Command::Sync { force_unlock: true }));
    }

    #[test]
    fn test_run_lat_requires_lon() {
        assert!(Cli::try_parse_from(["fieldlog", "run", "--lat", "1.0"]).is_err());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["fieldlog", "list", "--db", "x.db", "-vv"]).unwrap();
        assert_eq!(cli.global.db, Some(PathBuf::from("x.db")));
        assert_eq!(cli.global.verbose, 2);
    }

    #[test]
    fn test_export_format() {
        let cli =
            Cli::try_parse_from(["fieldlog", "export", "out.dat", "--format", "json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Export {
                format: Some(ExportFormat::Json),
                ..
            }
        ));
    }
}
