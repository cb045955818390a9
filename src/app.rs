//! Top-level application orchestration.
//!
//! `src/main.rs` only maps errors to exit codes; this module is the real main:
//! - parses CLI arguments and sets up logging
//! - loads configuration, the event and optional station CSVs
//! - runs the requested inversions on a rayon pool
//! - prints reports and writes optional exports

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, ConfigArgs, RunArgs, SynthArgs};
use crate::data::synthetic::{SynthSpec, synth_event};
use crate::domain::{GfastConfig, NodalPlane};
use crate::error::AppError;
use crate::io::{ResultsFile, collect_site_residuals, load_config, write_config, write_event, write_results_json, write_site_csv_file};
use crate::report::{
    cmt_site_residuals, ff_site_residuals, format_cmt_report, format_event_summary, format_ff_report,
    format_pgd_report, format_site_residuals, pgd_site_residuals,
};

pub mod pipeline;

use pipeline::Stages;

/// Entry point for the `gfast` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = crate::cli::Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Command::Pgd(args) => handle_run(args, Stages::PGD),
        Command::Cmt(args) => handle_run(args, Stages::CMT),
        Command::Ff(args) => handle_run(args, Stages::FF),
        Command::All(args) => handle_run(args, Stages::ALL),
        Command::Synth(args) => handle_synth(args),
        Command::Config(args) => handle_config(args),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
///
/// Logs go to stderr; stdout carries the reports. Later calls are ignored.
pub fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_run(args: RunArgs, stages: Stages) -> Result<(), AppError> {
    let config = load_config(args.config.as_deref())?;
    let event = pipeline::load_event(&args.event, args.stations.as_deref(), args.mask.as_deref())?;
    let out = with_threads(args.threads, || pipeline::run_inversions(&event, &config, stages))?;

    print!("{}", format_event_summary(&event));
    if let Some(pgd) = &out.pgd {
        print!("{}", format_pgd_report(pgd));
        if !args.no_residuals {
            let rows = pgd_site_residuals(&event.peak_displacements, pgd);
            print!("{}", format_site_residuals("PGD", &rows, "cm"));
        }
    }
    if let Some(cmt) = &out.cmt {
        print!("{}", format_cmt_report(cmt));
        if !args.no_residuals {
            let rows = cmt_site_residuals(&event.offsets, cmt);
            print!("{}", format_site_residuals("CMT", &rows, "m"));
        }
    }
    if let Some(ff) = &out.ff {
        print!("{}", format_ff_report(ff));
        if !args.no_residuals {
            let rows = ff_site_residuals(&event.offsets, ff);
            print!("{}", format_site_residuals("Finite fault", &rows, "m"));
        }
    }

    if let Some(path) = &args.export_json {
        let mut file = ResultsFile::new(&event.hypocenter, &config);
        file.pgd = out.pgd.as_ref();
        file.cmt = out.cmt.as_ref();
        file.ff = out.ff.as_ref();
        write_results_json(path, &file)?;
        info!("results written to {}", path.display());
    }
    if let Some(path) = &args.export_csv {
        let rows = collect_site_residuals(&event, out.pgd.as_ref(), out.cmt.as_ref(), out.ff.as_ref());
        write_site_csv_file(path, &rows)?;
        info!(rows = rows.len(), "site residuals written to {}", path.display());
    }

    match out.first_unsolved() {
        Some((_, err)) => Err(err.clone().into()),
        None => Ok(()),
    }
}

fn handle_synth(args: SynthArgs) -> Result<(), AppError> {
    let spec = SynthSpec {
        latitude: args.lat,
        longitude: args.lon,
        depth_km: args.depth,
        magnitude: args.magnitude,
        mechanism: NodalPlane {
            strike: args.strike,
            dip: args.dip,
            rake: args.rake,
        },
        stations: args.stations,
        min_radius_km: args.min_radius,
        max_radius_km: args.max_radius,
        noise: args.noise,
        seed: args.seed,
        origin_time: chrono::Utc::now(),
    };
    let config = GfastConfig::default();
    let zone = args.utm_zone.or(config.utm_zone);
    let event = synth_event(&spec, &config.earth, zone)?;
    write_event(&args.out, &event)?;
    info!(
        stations = event.peak_displacements.len(),
        "synthetic M{:.1} event written to {}",
        spec.magnitude,
        args.out.display()
    );
    Ok(())
}

fn handle_config(args: ConfigArgs) -> Result<(), AppError> {
    write_config(&args.out, &GfastConfig::default())?;
    info!("default configuration written to {}", args.out.display());
    Ok(())
}

/// Run `f` on a dedicated pool when a thread count is given, else on the
/// global pool.
pub fn with_threads<T, F>(threads: Option<usize>, f: F) -> Result<T, AppError>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    match threads {
        None => Ok(f()),
        Some(0) => Err(AppError::new(2, "--threads must be at least 1")),
        Some(n) => {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| AppError::new(2, format!("Failed to build thread pool: {e}")))?;
            Ok(pool.install(f))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_threads_uses_requested_pool() {
        let n = with_threads(Some(3), rayon::current_num_threads).unwrap();
        assert_eq!(n, 3);
        assert!(with_threads(Some(0), || ()).is_err());
        assert_eq!(with_threads(None, || 5).unwrap(), 5);
    }
}
