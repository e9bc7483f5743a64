// src/main.rs

use std::process::ExitCode;

use capsule_ci::{cli, logging, run};

// The runtime must be dropped before the process exits so in-flight stage
// children are killed; never `process::exit` from inside it.
#[tokio::main]
async fn main() -> ExitCode {
    match run_main().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("capsule-ci error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

/// `Ok(false)` when at least one run failed.
async fn run_main() -> anyhow::Result<bool> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    let reports = run(args).await?;
    Ok(reports.iter().all(|r| r.succeeded()))
}
