//! Command-line conjunction screening against a TLE catalog file.
//!
//! Exit status: 0 on a completed run, 1 with `--fail-on-alert` when any pair
//! is an alert, 2 when the configuration or catalog cannot be used.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::Parser;

use conjunction_screen::config::ScreeningConfig;
use conjunction_screen::propagator::PropagationModel;
use conjunction_screen::source::TleFileSource;
use conjunction_screen::{report, screening};

#[derive(Parser, Debug)]
#[command(version, about = "Screen space objects for close approaches")]
struct Args {
    /// TLE catalog file (2- or 3-line records)
    #[arg(short, long)]
    tle: PathBuf,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Catalog numbers to screen, comma separated (overrides the config)
    #[arg(short, long, value_delimiter = ',')]
    ids: Vec<u32>,

    /// Alert threshold (km)
    #[arg(long)]
    threshold_km: Option<f64>,

    /// Screening window (hours)
    #[arg(long)]
    window_hours: Option<f64>,

    /// Sampling step (seconds)
    #[arg(long)]
    step_seconds: Option<f64>,

    /// Propagation model: sgp4, j2-secular, two-body
    #[arg(long)]
    model: Option<PropagationModel>,

    /// Window start, RFC 3339 (default: now)
    #[arg(long)]
    start: Option<DateTime<Utc>>,

    /// Write the full report as JSON to this file
    #[arg(long)]
    json: Option<PathBuf>,

    /// Exit with status 1 when any pair is an alert
    #[arg(long)]
    fail_on_alert: bool,
}

impl Args {
    fn screening_config(&self) -> Result<ScreeningConfig, conjunction_screen::config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => ScreeningConfig::load(path)?,
            None => ScreeningConfig::default(),
        };
        if !self.ids.is_empty() {
            config.object_ids = self.ids.clone();
        }
        if let Some(v) = self.threshold_km {
            config.threshold_km = v;
        }
        if let Some(v) = self.window_hours {
            config.window_hours = v;
        }
        if let Some(v) = self.step_seconds {
            config.step_seconds = v;
        }
        if let Some(model) = self.model {
            config.model = model;
        }
        if self.start.is_some() {
            config.start = self.start;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = match args.screening_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::from(2);
        }
    };
    let source = match TleFileSource::open(&args.tle) {
        Ok(source) => source,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::from(2);
        }
    };

    let now = Utc::now();
    let result = match screening::run(&config, &source, now) {
        Ok(result) => result,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::from(2);
        }
    };

    print!("{}", report::render(&result, now));

    if let Some(path) = &args.json {
        let written = report::to_json(&result)
            .map_err(|e| e.to_string())
            .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
        match written {
            Ok(()) => log::info!("report written to {}", path.display()),
            Err(e) => log::error!("cannot write {}: {e}", path.display()),
        }
    }

    if args.fail_on_alert && result.has_alerts() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
