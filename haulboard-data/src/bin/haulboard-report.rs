//! Dashboard Snapshot Reporter
//!
//! Verifies the trucks schema and prints the dashboard snapshot as JSON to
//! stdout. Configuration comes from a TOML file or the environment.
//!
//! Usage:
//!   haulboard-report [--config haulboard.toml] [--days 7] [--history 20] [--repair]

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use haulboard_core::{HaulError, HaulboardConfig};
use haulboard_data::{init_tracing, DataContext, PostgrestBackend, TelemetryConfig};
use serde::Serialize;

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    days: Option<u32>,
    history: Option<u32>,
    repair: bool,
}

fn parse_args(raw: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut args = Args::default();
    let mut raw = raw.into_iter();
    while let Some(flag) = raw.next() {
        match flag.as_str() {
            "--config" => {
                let path = raw.next().ok_or("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--days" => args.days = Some(parse_count("--days", raw.next())?),
            "--history" => args.history = Some(parse_count("--history", raw.next())?),
            "--repair" => args.repair = true,
            other => return Err(format!("unknown argument: {}", other)),
        }
    }
    Ok(args)
}

fn parse_count(flag: &str, value: Option<String>) -> Result<u32, String> {
    let value = value.ok_or_else(|| format!("{} needs a number", flag))?;
    value
        .parse()
        .map_err(|_| format!("{} expects a positive integer, got {}", flag, value))
}

#[derive(Serialize)]
struct Report {
    schema: haulboard_data::SchemaVerification,
    #[serde(skip_serializing_if = "Option::is_none")]
    repaired: Option<bool>,
    dashboard: haulboard_data::DashboardSnapshot,
}

async fn run(args: Args) -> Result<String, HaulError> {
    let config = match &args.config {
        Some(path) => HaulboardConfig::from_path(path)?,
        None => HaulboardConfig::from_env()?,
    };
    let backend = Arc::new(PostgrestBackend::new(&config.backend)?);
    let context = DataContext::new(backend, &config)?;

    let repaired = if args.repair {
        Some(context.repair().fix_trucks_schema().await)
    } else {
        None
    };
    let schema = context.prober().verify_or_default("trucks").await;
    let days = args.days.unwrap_or(config.volume.window_days);
    let history = args.history.unwrap_or(config.volume.history_limit);
    let dashboard = context.dashboard().snapshot(days, history).await;

    let report = Report {
        schema,
        repaired,
        dashboard,
    };
    serde_json::to_string_pretty(&report).map_err(|e| HaulError::decode("report", e))
}

#[tokio::main]
async fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(2);
        }
    };

    let telemetry = match TelemetryConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to read logging config: {}", e);
            process::exit(1);
        }
    };
    if let Err(e) = init_tracing(&telemetry) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    match run(args).await {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to build report: {}", e);
            process::exit(1);
        }
    }
}
