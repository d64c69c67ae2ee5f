//! Command-line interface for wikisqoop.
//!
//! This module handles argument parsing and output payloads only.
//! NO engine calls are performed here.

use crate::engine::EngineOptions;
use crate::error::{EtlError, JobFailure, Result};
use crate::import::ImportSettings;
use crate::pipeline::{FailurePolicy, PipelineOptions};
use crate::plan::RunRequest;
use clap::Parser;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

/// Import per-language wiki tables into Hive and normalize page references.
#[derive(Parser, Debug)]
#[command(name = "wikisqoop")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Target Hive database.
    #[arg(long, value_name = "NAMESPACE")]
    pub db: String,

    /// Comma-separated language codes (e.g. "en,fr").
    #[arg(long, value_name = "LANGS")]
    pub langs: String,

    /// Comma-separated tables: page, redirect, revision, pagelinks, page_props.
    #[arg(long, value_name = "TABLES")]
    pub tables: String,

    /// What to do after a job fails.
    #[arg(long, value_enum, default_value_t = PolicyArg::AttemptAll)]
    pub policy: PolicyArg,

    /// Host of the production database replica.
    #[arg(long, default_value = "analytics-store.eqiad.wmnet")]
    pub connect_host: String,

    /// Database user for the import engine.
    #[arg(long, default_value = "research")]
    pub username: String,

    /// Password file handed to the import engine.
    #[arg(long, default_value = "/user/ellery/sqoop.password")]
    pub password_file: String,

    /// Parent directory for per-job import staging directories.
    #[arg(long, default_value = "/tmp")]
    pub staging_dir: String,

    /// Queue for normalization statements.
    #[arg(long, default_value = "priority")]
    pub priority_queue: String,

    /// JAVA_HOME passed to engine processes.
    #[arg(long, value_name = "DIR")]
    pub java_home: Option<PathBuf>,

    /// Bulk-import program.
    #[arg(long, default_value = "sqoop")]
    pub sqoop_bin: PathBuf,

    /// Warehouse CLI program.
    #[arg(long, default_value = "hive")]
    pub hive_bin: PathBuf,

    /// Print every command and statement instead of running it.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the run report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Failure policy.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    /// Attempt every job, fail at the end (default).
    AttemptAll,
    /// Skip normalizations whose imports failed.
    SkipDependents,
    /// Stop at the first failed job.
    FailFast,
}

impl From<PolicyArg> for FailurePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::AttemptAll => FailurePolicy::AttemptAll,
            PolicyArg::SkipDependents => FailurePolicy::SkipDependents,
            PolicyArg::FailFast => FailurePolicy::FailFast,
        }
    }
}

impl Cli {
    /// The run request.
    pub fn request(&self) -> RunRequest {
        RunRequest::from_lists(&self.db, &self.langs, &self.tables)
    }

    /// Engine settings, validated.
    pub fn engine_options(&self) -> Result<EngineOptions> {
        validate_setting("priority-queue", &self.priority_queue)?;
        Ok(EngineOptions {
            sqoop_bin: self.sqoop_bin.clone(),
            hive_bin: self.hive_bin.clone(),
            priority_queue: self.priority_queue.clone(),
            java_home: self.java_home.clone(),
        })
    }

    /// Pipeline settings, validated.
    ///
    /// These values are spliced into a shell command line, so anything
    /// beyond a conservative character set is rejected.
    pub fn pipeline_options(&self) -> Result<PipelineOptions> {
        validate_setting("connect-host", &self.connect_host)?;
        validate_setting("username", &self.username)?;
        validate_setting("password-file", &self.password_file)?;
        validate_setting("staging-dir", &self.staging_dir)?;
        Ok(PipelineOptions {
            policy: self.policy.into(),
            import: ImportSettings {
                connect_host: self.connect_host.clone(),
                username: self.username.clone(),
                password_file: self.password_file.clone(),
                staging_dir: self.staging_dir.clone(),
            },
            run_id: None,
        })
    }
}

fn validate_setting(name: &str, value: &str) -> Result<()> {
    let safe = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':');
    if value.is_empty() || !value.chars().all(safe) {
        return Err(EtlError::InvalidRequest {
            message: format!("--{} '{}' contains unsupported characters", name, value),
        });
    }
    Ok(())
}

/// Parse command-line arguments.
///
/// Returns the parsed Cli struct or exits on error.
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// JSON success payload for CLI responses.
#[derive(Serialize)]
pub struct CliSuccessPayload {
    /// Status indicator ("ok").
    pub status: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CliSuccessPayload {
    /// Construct a payload with structured data.
    pub fn with_data(message: String, data: Value) -> Self {
        Self {
            status: "ok",
            message,
            data: Some(data),
        }
    }
}

/// JSON error payload for CLI responses.
#[derive(Serialize)]
pub struct CliErrorPayload {
    /// Status indicator ("error").
    pub status: &'static str,
    /// Structured error details.
    pub error: ErrorDetails,
}

/// Details for a CLI error payload.
#[derive(Serialize)]
pub struct ErrorDetails {
    /// Error kind identifier (UnknownTable, RunFailed, ...).
    pub kind: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Optional hint for remediation steps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Failed jobs, for run failures.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<JobFailure>,
    /// Full run report, when the run got that far.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<Value>,
}

impl CliErrorPayload {
    /// Build payload from an EtlError instance.
    pub fn from_error(error: &EtlError, report: Option<Value>) -> Self {
        CliErrorPayload {
            status: "error",
            error: ErrorDetails {
                kind: error.kind(),
                message: error.to_string(),
                hint: error.hint().map(|h| h.to_string()),
                failures: error.failures(),
                report,
            },
        }
    }
}
