mod utils;
mod models;
use std::process::ExitCode;
use anyhow::Result;
use dotenv::dotenv;
use log::{error, info, warn};
use simplelog::{ColorChoice, Config as LogConfig, LevelFilter, TermLogger, TerminalMode};
use crate::utils::browser::Session;
use crate::utils::config::Config;
use crate::utils::grades::{collect_report, ensure_output_dir, save_report, ERROR_SCREENSHOT};
use crate::utils::report::format_report;

#[tokio::main]
async fn main() -> ExitCode {
    // Loads environment variables from a `.env` file, if present.
    dotenv().ok();

    let config = Config::from_env();
    let level = config.as_ref().map(|c| c.log_level).unwrap_or(LevelFilter::Info);
    if let Err(e) = TermLogger::init(level, LogConfig::default(), TerminalMode::Mixed, ColorChoice::Auto) {
        eprintln!("Failed to initialise logging: {}", e);
    }

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("D2L Grade Checker");
    match run(&config).await {
        Ok(()) => {
            info!("Done.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

// Owns the browser session for the whole run and closes it exactly once, whatever happens.
async fn run(config: &Config) -> Result<()> {
    ensure_output_dir(&config.output_dir).await?;
    let session = Session::launch(config).await?;

    let result = retrieve(&session, config).await;
    if result.is_err() {
        let path = config.output_dir.join(ERROR_SCREENSHOT);
        match session.screenshot(&path, false).await {
            Ok(path) => info!("Saved diagnostic screenshot to {}", path.display()),
            Err(e) => warn!("Diagnostic screenshot failed: {:#}", e),
        }
    }

    if let Err(e) = session.close().await {
        warn!("Browser did not close cleanly: {:#}", e);
    }
    result
}

async fn retrieve(session: &Session, config: &Config) -> Result<()> {
    let report = match collect_report(session, config).await? {
        Some(report) => report,
        None => return Ok(()),
    };

    println!("{}", format_report(&report));

    let path = save_report(&config.output_dir, &report).await?;
    info!("Saved to {}", path.display());
    Ok(())
}
