//! wikisqoop CLI binary
//!
//! This is the main entry point for the wikisqoop command-line interface.
//! The CLI is a thin adapter over existing APIs - NO logic is implemented here.

use std::process::ExitCode;

use wikisqoop::cli::{Cli, CliErrorPayload, CliSuccessPayload};
use wikisqoop::engine::{DryRunRunner, EngineRunner, ProcessRunner};
use wikisqoop::pipeline::Pipeline;
use wikisqoop::report::RunReport;
use wikisqoop::EtlError;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = wikisqoop::cli::parse_args();

    // Initialize logger if verbose
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    // Execute run
    let (result, transcript) = if cli.dry_run {
        execute_dry_run(&cli)
    } else {
        (execute_run(&cli), None)
    };

    if let Some(transcript) = transcript {
        print!("{}", transcript);
    }

    // Handle result
    match result {
        Ok(report) => {
            if cli.json {
                let message = format!("Run {} completed: {} jobs", report.run_id, report.jobs.len());
                let data = serde_json::to_value(&report).unwrap_or_default();
                print_json(&CliSuccessPayload::with_data(message, data));
            } else {
                print!("{}", report.summary());
            }
            ExitCode::SUCCESS
        }
        Err((e, report)) => {
            if cli.json {
                let data = report.as_ref().and_then(|r| serde_json::to_value(r).ok());
                print_json(&CliErrorPayload::from_error(&e, data));
            } else {
                if let Some(report) = &report {
                    eprint!("{}", report.summary());
                }
                eprintln!("Error: {}", e);
                if let Some(hint) = e.hint() {
                    eprintln!("Hint: {}", hint);
                }
            }
            ExitCode::from(1)
        }
    }
}

type RunOutcome = Result<RunReport, (EtlError, Option<RunReport>)>;

/// Execute the pipeline against the real engines.
fn execute_run(cli: &Cli) -> RunOutcome {
    let runner = cli
        .engine_options()
        .and_then(ProcessRunner::locate)
        .map_err(|e| (e, None))?;
    run_pipeline(cli, runner).0
}

/// Execute the pipeline with every invocation recorded instead of run.
fn execute_dry_run(cli: &Cli) -> (RunOutcome, Option<String>) {
    let runner = match cli.engine_options() {
        Ok(options) => DryRunRunner::new(options),
        Err(e) => return (Err((e, None)), None),
    };
    let (outcome, runner) = run_pipeline(cli, runner);
    (outcome, runner.map(|r| r.transcript()))
}

fn run_pipeline<R: EngineRunner>(cli: &Cli, runner: R) -> (RunOutcome, Option<R>) {
    let options = match cli.pipeline_options() {
        Ok(options) => options,
        Err(e) => return (Err((e, None)), None),
    };
    let mut pipeline = match Pipeline::new(runner, options) {
        Ok(pipeline) => pipeline,
        Err(e) => return (Err((e, None)), None),
    };

    let outcome = match pipeline.run(&cli.request()) {
        Ok(report) => match report.clone().into_result() {
            Ok(report) => Ok(report),
            Err(e) => Err((e, Some(report))),
        },
        Err(e) => {
            let report = e.report().cloned();
            Err((e, report))
        }
    };
    (outcome, Some(pipeline.into_runner()))
}

fn print_json<T: serde::Serialize>(payload: &T) {
    match serde_json::to_string_pretty(payload) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error: failed to serialize output: {}", e),
    }
}
