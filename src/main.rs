// ==========================================
// SAP Meter Exchange - CLI entry point
// ==========================================
// One invocation runs one job; scheduling (cron, systemd timers) is
// the operator's concern. The sealed run report is printed as JSON
// on stdout so the invoking layer can evaluate it.
//
// Usage:
//   sap-meter-exchange <job> [--config <path>] [--date YYYY-MM-DD]
//
// Jobs:
//   import-meters | import-sites | import-users | import-all
//   export-readings     (--date defaults to today, UTC)
//
// Exit code 0 covers skipped runs and runs with row errors; only a
// whole-run abort exits non-zero.
// ==========================================

use chrono::{NaiveDate, Utc};
use sap_meter_exchange::{logging, ExchangeConfig, ExportPipeline, ImportPipeline, JobReport};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;

struct CliArgs {
    job: String,
    config_path: Option<PathBuf>,
    date: Option<NaiveDate>,
}

fn parse_args() -> Result<CliArgs, String> {
    let mut args = std::env::args().skip(1);
    let job = args.next().ok_or_else(usage)?;

    let mut config_path = None;
    let mut date = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let value = args.next().ok_or("--config needs a path".to_string())?;
                config_path = Some(PathBuf::from(value));
            }
            "--date" => {
                let value = args.next().ok_or("--date needs a value".to_string())?;
                let parsed = NaiveDate::parse_from_str(&value, "%Y-%m-%d")
                    .map_err(|_| format!("invalid date {value:?}, expected YYYY-MM-DD"))?;
                date = Some(parsed);
            }
            other => return Err(format!("unknown argument {other:?}\n{}", usage())),
        }
    }

    Ok(CliArgs {
        job,
        config_path,
        date,
    })
}

fn usage() -> String {
    "usage: sap-meter-exchange <import-meters|import-sites|import-users|import-all|export-readings> \
     [--config <path>] [--date YYYY-MM-DD]"
        .to_string()
}

/// Explicit --config wins; otherwise the per-user config file is
/// used when present, and built-in defaults when not.
fn load_config(explicit: Option<&PathBuf>) -> anyhow::Result<ExchangeConfig> {
    if let Some(path) = explicit {
        return ExchangeConfig::from_json_file(path);
    }

    let default_path = dirs::config_dir()
        .map(|dir| dir.join("sap-meter-exchange").join("config.json"));
    match default_path {
        Some(path) if path.is_file() => ExchangeConfig::from_json_file(&path),
        _ => Ok(ExchangeConfig::default()),
    }
}

async fn run(args: CliArgs) -> anyhow::Result<Vec<JobReport>> {
    let config = load_config(args.config_path.as_ref())?;

    let reports = match args.job.as_str() {
        "import-meters" => vec![ImportPipeline::open(config)?.import_meters().await?],
        "import-sites" => vec![ImportPipeline::open(config)?.import_sites().await?],
        "import-users" => vec![ImportPipeline::open(config)?.import_users().await?],
        "import-all" => {
            let pipeline = ImportPipeline::open(config)?;
            vec![
                pipeline.import_meters().await?,
                pipeline.import_sites().await?,
                pipeline.import_users().await?,
            ]
        }
        "export-readings" => {
            let day = args.date.unwrap_or_else(|| Utc::now().date_naive());
            vec![ExportPipeline::open(config)?.export_readings(day).await?]
        }
        other => anyhow::bail!("unknown job {other:?}\n{}", usage()),
    };

    Ok(reports)
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return ExitCode::from(2);
        }
    };

    match run(args).await {
        Ok(reports) => {
            match serde_json::to_string_pretty(&reports) {
                Ok(json) => println!("{json}"),
                Err(e) => error!("cannot serialize run report: {e}"),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("run aborted: {e:#}");
            ExitCode::FAILURE
        }
    }
}
