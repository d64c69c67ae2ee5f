//! Wikisqoop error types.
//!
//! All errors are typed and provide root cause information.

use crate::report::RunReport;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for wikisqoop operations.
#[derive(Error, Debug)]
pub enum EtlError {
    /// I/O error while talking to the local system.
    #[error("I/O error for path {path}: {source}")]
    Io {
        /// The path (or program) that caused the I/O error.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Requested logical table is not in the supported set.
    #[error("Unknown table '{name}': supported tables are {supported}")]
    UnknownTable {
        /// The name that was requested.
        name: String,
        /// Comma-separated list of supported names.
        supported: String,
    },

    /// The run request itself is malformed (empty lists, bad identifiers).
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What is wrong with the request.
        message: String,
    },

    /// A query template failed placeholder validation or rendering.
    #[error("Template error for '{template}': {message}")]
    Template {
        /// Template identifier (e.g. "redirect/normalize").
        template: String,
        /// Validation message.
        message: String,
    },

    /// Namespace creation or table drop failed. Fatal for the run.
    #[error("Catalog operation failed: {statement} ({status})")]
    Catalog {
        /// The rendered catalog statement.
        statement: String,
        /// Exit status description.
        status: String,
    },

    /// The bulk-import engine reported a non-zero exit.
    #[error("Import of {language}/{table} failed ({status})")]
    ImportFailed {
        /// Language code.
        language: String,
        /// Logical table name.
        table: String,
        /// Exit status description.
        status: String,
    },

    /// The warehouse engine failed to materialize a normalized table.
    #[error("Normalization of {language}/{table} failed ({status})")]
    NormalizeFailed {
        /// Language code.
        language: String,
        /// Logical table name.
        table: String,
        /// Exit status description.
        status: String,
    },

    /// An external engine binary could not be found or started.
    #[error("Engine '{program}' not available: {reason}")]
    EngineUnavailable {
        /// Program name or path.
        program: String,
        /// Why it could not be used.
        reason: String,
    },

    /// One or more jobs failed; every failure of the run is listed.
    #[error("Run {run_id} failed: {} job(s) failed", .failures.len())]
    RunFailed {
        /// Run identifier.
        run_id: String,
        /// All recorded job failures, in execution order.
        failures: Vec<JobFailure>,
    },

    /// A fatal error stopped the run part way; jobs recorded so far are kept.
    #[error("Run {} aborted: {source}", .report.run_id)]
    RunAborted {
        /// The fatal error.
        source: Box<EtlError>,
        /// Report up to the point of the abort, in state `Failed`.
        report: Box<RunReport>,
    },
}

impl EtlError {
    /// Stable identifier for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            EtlError::Io { .. } => "Io",
            EtlError::UnknownTable { .. } => "UnknownTable",
            EtlError::InvalidRequest { .. } => "InvalidRequest",
            EtlError::Template { .. } => "Template",
            EtlError::Catalog { .. } => "Catalog",
            EtlError::ImportFailed { .. } => "ImportFailed",
            EtlError::NormalizeFailed { .. } => "NormalizeFailed",
            EtlError::EngineUnavailable { .. } => "EngineUnavailable",
            EtlError::RunFailed { .. } => "RunFailed",
            EtlError::RunAborted { .. } => "RunAborted",
        }
    }

    /// Optional remediation hint for the operator.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            EtlError::UnknownTable { name, .. } if name == "langlinks" => Some(
                "langlinks stores titles as full page names with spaces and needs extra parsing; it is not supported",
            ),
            EtlError::UnknownTable { .. } => {
                Some("Pass only page, redirect, revision, pagelinks or page_props to --tables")
            }
            EtlError::Catalog { .. } => {
                Some("Check that the warehouse is reachable; nothing after this point was run")
            }
            EtlError::EngineUnavailable { .. } => {
                Some("Install the engine or point --sqoop-bin/--hive-bin at it")
            }
            EtlError::RunFailed { failures, .. }
                if failures.iter().any(|f| f.phase == "normalize") =>
            {
                Some(
                    "A missing <lang>_page_raw table also fails normalization; include page in --tables for those languages and re-run the failed pairs",
                )
            }
            EtlError::RunFailed { .. } => Some(
                "Re-run with --langs/--tables restricted to the failed pairs; every run fully replaces its outputs",
            ),
            EtlError::RunAborted { source, .. } => source.hint(),
            _ => None,
        }
    }

    /// Job failures carried by the error, if any.
    pub fn failures(&self) -> Vec<JobFailure> {
        match self {
            EtlError::RunFailed { failures, .. } => failures.clone(),
            EtlError::RunAborted { report, .. } => report.failures(),
            _ => Vec::new(),
        }
    }

    /// Partial run report of an aborted run.
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            EtlError::RunAborted { report, .. } => Some(&**report),
            _ => None,
        }
    }
}

/// A single failed job, as reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobFailure {
    /// Phase the job belonged to ("import" or "normalize").
    pub phase: String,
    /// Language code.
    pub language: String,
    /// Logical table name.
    pub table: String,
    /// Exit code, when the process reported one.
    pub exit_code: Option<i32>,
    /// Why the engine could not be run, when it never started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.exit_code, &self.reason) {
            (Some(code), _) => write!(
                f,
                "{} {}/{} (exit code {})",
                self.phase, self.language, self.table, code
            ),
            (None, Some(reason)) => write!(
                f,
                "{} {}/{} ({})",
                self.phase, self.language, self.table, reason
            ),
            (None, None) => write!(
                f,
                "{} {}/{} (terminated by signal)",
                self.phase, self.language, self.table
            ),
        }
    }
}

/// Result type alias for wikisqoop operations.
pub type Result<T> = std::result::Result<T, EtlError>;
