//! Command-line parsing for the `gfast` binary.
//!
//! Argument parsing and command dispatch stay separate from the inversion code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "gfast", version, about = "Geodetic earthquake source inversions (PGD, CMT, finite fault)")]
pub struct Cli {
    /// Log filter used when `RUST_LOG` is unset (e.g. `info`, `gfast_core=debug`).
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Magnitude from peak ground displacement.
    Pgd(RunArgs),
    /// Deviatoric moment tensor depth search.
    Cmt(RunArgs),
    /// Slip on both nodal planes of the CMT optimum (runs the CMT first).
    Ff(RunArgs),
    /// PGD, then CMT, then finite fault seeded from the CMT.
    All(RunArgs),
    /// Write an event file with synthetic observations.
    Synth(SynthArgs),
    /// Write the default configuration.
    Config(ConfigArgs),
}

/// Options shared by every inversion command.
#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Event JSON (hypocentre plus observations).
    #[arg(long, value_name = "JSON")]
    pub event: PathBuf,

    /// Configuration JSON; defaults are used when omitted.
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Station metadata CSV (`station,latitude,longitude,altitude`) overriding positions.
    #[arg(long, value_name = "CSV")]
    pub stations: Option<PathBuf>,

    /// CSV with a `station` column; listed stations are masked.
    #[arg(long, value_name = "CSV")]
    pub mask: Option<PathBuf>,

    /// Worker threads for the grid searches (default: all cores).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Write the full result collections as JSON.
    #[arg(long = "export-json", value_name = "JSON")]
    pub export_json: Option<PathBuf>,

    /// Write observed vs predicted values per site at each optimum.
    #[arg(long = "export-csv", value_name = "CSV")]
    pub export_csv: Option<PathBuf>,

    /// Skip the per-site residual tables.
    #[arg(long)]
    pub no_residuals: bool,
}

/// Options for synthetic event generation.
#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// Moment magnitude of the source.
    #[arg(long)]
    pub magnitude: f64,

    /// Source depth (km).
    #[arg(long)]
    pub depth: f64,

    #[arg(long, default_value_t = 40.0, allow_hyphen_values = true)]
    pub lat: f64,

    #[arg(long, default_value_t = -124.5, allow_hyphen_values = true)]
    pub lon: f64,

    /// Strike of the double couple (degrees).
    #[arg(long, default_value_t = 350.0)]
    pub strike: f64,

    /// Dip of the double couple (degrees).
    #[arg(long, default_value_t = 15.0)]
    pub dip: f64,

    /// Rake of the double couple (degrees).
    #[arg(long, default_value_t = 90.0, allow_hyphen_values = true)]
    pub rake: f64,

    /// Number of stations on the spiral layout.
    #[arg(long, default_value_t = 20)]
    pub stations: usize,

    /// Innermost station distance (km).
    #[arg(long, default_value_t = 20.0)]
    pub min_radius: f64,

    /// Outermost station distance (km).
    #[arg(long, default_value_t = 300.0)]
    pub max_radius: f64,

    /// Gaussian noise standard deviation (m); 0 disables noise.
    #[arg(long, default_value_t = 0.0)]
    pub noise: f64,

    /// Random seed for the noise.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Fixed UTM zone (default: the epicentre's zone).
    #[arg(long)]
    pub utm_zone: Option<u8>,

    /// Output event JSON.
    #[arg(long, value_name = "JSON")]
    pub out: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct ConfigArgs {
    /// Output configuration JSON.
    #[arg(long, value_name = "JSON")]
    pub out: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_args_parse() {
        let cli = Cli::try_parse_from([
            "gfast",
            "all",
            "--event",
            "ev.json",
            "--threads",
            "2",
            "--export-csv",
            "sites.csv",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.log_level, "debug");
        match cli.command {
            Command::All(args) => {
                assert_eq!(args.event, PathBuf::from("ev.json"));
                assert_eq!(args.threads, Some(2));
                assert_eq!(args.export_csv, Some(PathBuf::from("sites.csv")));
                assert!(args.config.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn synth_defaults_and_negative_values() {
        let cli = Cli::try_parse_from([
            "gfast", "synth", "--magnitude", "7.5", "--depth", "20", "--lon", "-120.25", "--out", "x.json",
        ])
        .unwrap();
        let Command::Synth(args) = cli.command else {
            panic!("expected synth");
        };
        assert_eq!(args.magnitude, 7.5);
        assert_eq!(args.lon, -120.25);
        assert_eq!(args.stations, 20);
        assert_eq!(args.noise, 0.0);
    }

    #[test]
    fn event_is_required() {
        assert!(Cli::try_parse_from(["gfast", "pgd"]).is_err());
    }
}
