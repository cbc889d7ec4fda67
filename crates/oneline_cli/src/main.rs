//! `oneline`: prints a one-sentence Japanese summary for each web page URL.
mod config;
mod status;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use oneline_core::ValidatedSummary;
use oneline_engine::{
    ApiKey, EngineEvent, EngineHandle, FailureKind, JobId, Pipeline, PipelineError,
};
use oneline_logging::{oneline_debug, oneline_error, LevelFilter, LogDestination};

use config::FileConfig;
use status::{batch_exit_code, user_message, EXIT_CONFIG};

#[derive(Parser, Debug)]
#[command(name = "oneline")]
#[command(about = "Summarize web pages in one Japanese sentence")]
#[command(version)]
struct Args {
    /// RON settings file; omitted fields keep their defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Text-generation API key
    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Log progress and debug details to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Also write the log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Pages to summarize
    #[arg(required = true)]
    urls: Vec<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args);

    let engine = match start_engine(&args) {
        Ok(engine) => engine,
        Err(err) => {
            oneline_error!("{:#}", err);
            eprintln!("設定エラー: {:#}", err);
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let results = run_jobs(&engine, &args.urls);
    report(&args.urls, &results);
    ExitCode::from(batch_exit_code(&results))
}

fn init_logging(args: &Args) {
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let destination = match &args.log_file {
        Some(path) => LogDestination::Both(path.clone()),
        None => LogDestination::Terminal,
    };
    oneline_logging::initialize(destination, level);
}

/// Everything that can fail before the first request goes out.
fn start_engine(args: &Args) -> Result<EngineHandle> {
    let api_key = ApiKey::new(args.api_key.clone().unwrap_or_default())
        .context("API key missing: pass --api-key or set GOOGLE_API_KEY")?;

    let file_config = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let engine_config = file_config.into_engine_config(api_key);
    engine_config.validate().context("Invalid settings")?;

    let pipeline = Pipeline::from_config(engine_config).context("Failed to build pipeline")?;
    let engine = EngineHandle::new(Arc::new(pipeline)).context("Failed to start engine")?;
    Ok(engine)
}

/// Submits every URL and waits for all of them; results keep input order.
fn run_jobs(
    engine: &EngineHandle,
    urls: &[String],
) -> Vec<Result<ValidatedSummary, PipelineError>> {
    for (index, url) in urls.iter().enumerate() {
        engine.submit(index as JobId, url.clone());
    }

    let mut slots: Vec<Option<Result<ValidatedSummary, PipelineError>>> = vec![None; urls.len()];
    let mut pending = urls.len();
    while pending > 0 {
        match engine.recv() {
            Some(EngineEvent::Progress(progress)) => {
                oneline_debug!("Job {} entered {:?}", progress.job_id, progress.stage);
            }
            Some(EngineEvent::JobCompleted { job_id, result }) => {
                if let Some(slot) = slots.get_mut(job_id as usize) {
                    if slot.replace(result).is_none() {
                        pending -= 1;
                    }
                }
            }
            None => break,
        }
    }

    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(PipelineError::new(FailureKind::Cancelled))))
        .collect()
}

fn report(urls: &[String], results: &[Result<ValidatedSummary, PipelineError>]) {
    let batch = urls.len() > 1;
    for (url, result) in urls.iter().zip(results) {
        match result {
            Ok(summary) if batch => println!("{url}\t{summary}"),
            Ok(summary) => println!("{summary}"),
            Err(err) => eprintln!("{url}: {} ({})", user_message(err), err),
        }
    }
}
