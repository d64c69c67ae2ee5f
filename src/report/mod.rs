//! Run report.
//!
//! Every attempted or skipped job leaves a [`JobResult`]; the orchestrator
//! collects them into a [`RunReport`] that can be printed as a summary or
//! serialized as JSON.

use crate::engine::{Outcome, QualifiedName};
use crate::error::{EtlError, JobFailure, Result};
use crate::registry::LogicalTable;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::{Duration, Instant};

/// Pipeline phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Bulk import of raw tables.
    Import,
    /// Join/normalization into final tables.
    Normalize,
}

impl Phase {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Import => "import",
            Phase::Normalize => "normalize",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final status of one job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Engine exited with 0.
    Succeeded,
    /// Engine exited non-zero.
    Failed,
    /// Not attempted because of the failure policy.
    Skipped,
}

/// Outcome of one (language, table) job in one phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobResult {
    /// Phase.
    pub phase: Phase,
    /// Language code.
    pub language: String,
    /// Logical table.
    pub table: String,
    /// Table the job creates.
    pub output_table: String,
    /// Status.
    pub status: JobStatus,
    /// Exit code of the engine, if it ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Why the engine could not be started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// SHA-256 of the rendered command or statement.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Start time (RFC 3339), if it ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl JobResult {
    /// Whether the job failed.
    pub fn is_failure(&self) -> bool {
        self.status == JobStatus::Failed
    }

    /// Record for a job that was not attempted.
    pub fn skipped(phase: Phase, language: &str, table: LogicalTable, output: &QualifiedName) -> Self {
        JobResult {
            phase,
            language: language.to_string(),
            table: table.as_str().to_string(),
            output_table: output.to_string(),
            status: JobStatus::Skipped,
            exit_code: None,
            reason: None,
            fingerprint: None,
            started_at: None,
            duration_ms: 0,
        }
    }

    /// Failure entry for the aggregated error.
    pub fn to_failure(&self) -> JobFailure {
        JobFailure {
            phase: self.phase.as_str().to_string(),
            language: self.language.clone(),
            table: self.table.clone(),
            exit_code: self.exit_code,
            reason: self.reason.clone(),
        }
    }

    /// Typed error for this job, when it failed.
    pub fn error(&self) -> Option<EtlError> {
        if !self.is_failure() {
            return None;
        }
        let status = match (self.exit_code, &self.reason) {
            (Some(code), _) => format!("exit code {}", code),
            (None, Some(reason)) => reason.clone(),
            (None, None) => "terminated by signal".to_string(),
        };
        Some(match self.phase {
            Phase::Import => EtlError::ImportFailed {
                language: self.language.clone(),
                table: self.table.clone(),
                status,
            },
            Phase::Normalize => EtlError::NormalizeFailed {
                language: self.language.clone(),
                table: self.table.clone(),
                status,
            },
        })
    }
}

/// Times one job and turns its engine outcome into a [`JobResult`].
pub(crate) struct JobTimer {
    started_at: String,
    start: Instant,
}

impl JobTimer {
    pub(crate) fn start() -> Self {
        JobTimer {
            started_at: timestamp(),
            start: Instant::now(),
        }
    }

    pub(crate) fn finish(
        self,
        phase: Phase,
        language: &str,
        table: LogicalTable,
        output: &QualifiedName,
        rendered: &str,
        outcome: Outcome,
    ) -> JobResult {
        JobResult {
            phase,
            language: language.to_string(),
            table: table.as_str().to_string(),
            output_table: output.to_string(),
            status: if outcome.success() {
                JobStatus::Succeeded
            } else {
                JobStatus::Failed
            },
            exit_code: outcome.exit_code,
            reason: None,
            fingerprint: Some(fingerprint(rendered)),
            started_at: Some(self.started_at),
            duration_ms: millis(self.start.elapsed()),
        }
    }

    /// Failed result for a job whose engine could not be started.
    pub(crate) fn abandon(
        self,
        phase: Phase,
        language: &str,
        table: LogicalTable,
        output: &QualifiedName,
        rendered: &str,
        error: &EtlError,
    ) -> JobResult {
        JobResult {
            phase,
            language: language.to_string(),
            table: table.as_str().to_string(),
            output_table: output.to_string(),
            status: JobStatus::Failed,
            exit_code: None,
            reason: Some(error.to_string()),
            fingerprint: Some(fingerprint(rendered)),
            started_at: Some(self.started_at),
            duration_ms: millis(self.start.elapsed()),
        }
    }
}

fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Validating the request and preparing the namespace.
    Init,
    /// Running bulk imports.
    ImportPhase,
    /// Running normalizations.
    NormalizePhase,
    /// Every job succeeded.
    Done,
    /// At least one job failed or was skipped.
    Failed,
}

/// Everything that happened in one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Run identifier (UUID v4).
    pub run_id: String,
    /// Target namespace.
    pub namespace: String,
    /// Failure policy in effect.
    pub policy: String,
    /// Start time (RFC 3339).
    pub started_at: String,
    /// End time (RFC 3339).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,
    /// Final state.
    pub state: RunState,
    /// Job results in execution order.
    pub jobs: Vec<JobResult>,
}

impl RunReport {
    pub(crate) fn new(run_id: String, namespace: &str, policy: &str) -> Self {
        RunReport {
            run_id,
            namespace: namespace.to_string(),
            policy: policy.to_string(),
            started_at: timestamp(),
            finished_at: None,
            state: RunState::Init,
            jobs: Vec::new(),
        }
    }

    pub(crate) fn finish(&mut self) {
        self.state = if self.failure_count() == 0 && self.skipped_count() == 0 {
            RunState::Done
        } else {
            RunState::Failed
        };
        self.finished_at = Some(timestamp());
    }

    pub(crate) fn abort(&mut self) {
        self.state = RunState::Failed;
        self.finished_at = Some(timestamp());
    }

    /// Jobs of one phase.
    pub fn phase_jobs(&self, phase: Phase) -> impl Iterator<Item = &JobResult> {
        self.jobs.iter().filter(move |job| job.phase == phase)
    }

    /// Number of failed jobs across both phases.
    pub fn failure_count(&self) -> usize {
        self.jobs.iter().filter(|job| job.is_failure()).count()
    }

    /// Number of skipped jobs.
    pub fn skipped_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|job| job.status == JobStatus::Skipped)
            .count()
    }

    /// All failures, in execution order.
    pub fn failures(&self) -> Vec<JobFailure> {
        self.jobs
            .iter()
            .filter(|job| job.is_failure())
            .map(JobResult::to_failure)
            .collect()
    }

    /// Whether the run finished in [`RunState::Done`].
    pub fn succeeded(&self) -> bool {
        self.state == RunState::Done
    }

    /// `Ok(self)` when the run is done, otherwise [`EtlError::RunFailed`].
    pub fn into_result(self) -> Result<RunReport> {
        if self.succeeded() {
            return Ok(self);
        }
        Err(EtlError::RunFailed {
            run_id: self.run_id,
            failures: self
                .jobs
                .iter()
                .filter(|job| job.is_failure())
                .map(JobResult::to_failure)
                .collect(),
        })
    }

    /// Plain-text summary for the terminal.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Run {} into '{}': {:?}\n",
            self.run_id, self.namespace, self.state
        );
        for phase in [Phase::Import, Phase::Normalize] {
            let (mut ok, mut failed, mut skipped) = (0, 0, 0);
            for job in self.phase_jobs(phase) {
                match job.status {
                    JobStatus::Succeeded => ok += 1,
                    JobStatus::Failed => failed += 1,
                    JobStatus::Skipped => skipped += 1,
                }
            }
            out.push_str(&format!(
                "  {:<9} {} succeeded, {} failed, {} skipped\n",
                phase.as_str(),
                ok,
                failed,
                skipped
            ));
        }
        for failure in self.failures() {
            out.push_str(&format!("  FAILED {}\n", failure));
        }
        out
    }
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

/// SHA-256 of a rendered command or statement, hex encoded.
pub fn fingerprint(rendered: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rendered.as_bytes());
    format!("{:x}", hasher.finalize())
}
