//! Two-phase pipeline orchestration.
//!
//! `Init -> ImportPhase -> NormalizePhase -> Done`, or `Failed` when any job
//! failed. Jobs run one at a time; the normalize phase starts only after
//! every import job has been attempted, which is what guarantees each
//! language's raw page table is in place before anything joins against it.
//! Jobs must not be parallelized without per-table exclusion: imports write
//! the raw page table that normalizations of the same language read.

use crate::catalog::CatalogManager;
use crate::engine::EngineRunner;
use crate::error::{EtlError, Result};
use crate::import::{ImportExecutor, ImportSettings};
use crate::normalize::NormalizeExecutor;
use crate::plan::{ExecutionPlan, JobDescriptor, RunRequest};
use crate::registry::{LogicalTable, TemplateRegistry};
use crate::report::{JobResult, Phase, RunReport, RunState};
use std::collections::HashSet;
use std::fmt;

/// What to do once a job has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Attempt every job in both phases; report all failures at the end.
    #[default]
    AttemptAll,
    /// Attempt every import; skip normalizations whose own raw table or
    /// whose language's page table failed to import.
    SkipDependents,
    /// Stop issuing jobs after the first failure; the rest are skipped.
    FailFast,
}

impl FailurePolicy {
    /// Name as used on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::AttemptAll => "attempt-all",
            FailurePolicy::SkipDependents => "skip-dependents",
            FailurePolicy::FailFast => "fail-fast",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for a pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Failure policy.
    pub policy: FailurePolicy,
    /// Import connection and staging settings.
    pub import: ImportSettings,
    /// Fixed run id; a UUID v4 is generated when `None`.
    pub run_id: Option<String>,
}

/// The orchestrator.
pub struct Pipeline<R: EngineRunner> {
    registry: TemplateRegistry,
    catalog: CatalogManager,
    runner: R,
    options: PipelineOptions,
}

impl<R: EngineRunner> Pipeline<R> {
    /// Build a pipeline; fails if any template does not validate.
    pub fn new(runner: R, options: PipelineOptions) -> Result<Self> {
        Ok(Pipeline {
            registry: TemplateRegistry::new()?,
            catalog: CatalogManager::new()?,
            runner,
            options,
        })
    }

    /// The template registry in use.
    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// The engine runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Give the runner back.
    pub fn into_runner(self) -> R {
        self.runner
    }

    /// Run both phases for `request`.
    ///
    /// Returns `Err` only for fatal conditions: an invalid request, an
    /// unknown table or a catalog failure. A catalog failure once the
    /// namespace exists is wrapped in [`EtlError::RunAborted`] together with
    /// the report so far. Job failures are recorded in the report, whose state
    /// is then [`RunState::Failed`].
    pub fn run(&mut self, request: &RunRequest) -> Result<RunReport> {
        let plan = ExecutionPlan::build(request, &self.registry)?;
        let run_id = self
            .options
            .run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let namespace = plan.namespace().to_string();
        let mut report = RunReport::new(run_id.clone(), &namespace, self.options.policy.as_str());

        log::info!(
            "Run {}: {} language(s) x {} table(s) into '{}' ({})",
            run_id,
            plan.languages().len(),
            plan.tables().len(),
            namespace,
            self.options.policy
        );
        self.catalog.ensure_namespace(&mut self.runner, &namespace)?;

        if let Err(err) = self.run_phases(&plan, &run_id, &mut report) {
            report.abort();
            log::error!(
                "Run {} aborted after {} job(s): {}",
                run_id,
                report.jobs.len(),
                err
            );
            return Err(EtlError::RunAborted {
                source: Box::new(err),
                report: Box::new(report),
            });
        }

        report.finish();
        if report.succeeded() {
            log::info!("Run {} done: {} jobs succeeded", run_id, report.jobs.len());
        } else {
            log::error!(
                "Run {} failed: {} failed, {} skipped",
                run_id,
                report.failure_count(),
                report.skipped_count()
            );
        }
        Ok(report)
    }

    fn run_phases(&mut self, plan: &ExecutionPlan, run_id: &str, report: &mut RunReport) -> Result<()> {
        let namespace = plan.namespace();
        let importer = ImportExecutor::new(&self.registry, &self.options.import, run_id);
        let normalizer = NormalizeExecutor::new(&self.registry)?;
        let mut failed_imports: HashSet<(String, LogicalTable)> = HashSet::new();

        transition(report, RunState::ImportPhase);
        for job in plan.jobs(Phase::Import) {
            let output = job.output(namespace);
            if self.halted(report) {
                report.jobs.push(JobResult::skipped(Phase::Import, &job.language, job.table, &output));
                continue;
            }
            self.catalog
                .drop_if_exists(&mut self.runner, namespace, &output.table)?;
            let result = importer.run_import(&mut self.runner, &job.language, job.table, namespace)?;
            if result.is_failure() {
                failed_imports.insert((job.language.clone(), job.table));
            }
            report.jobs.push(result);
        }
        log::info!(
            "Import phase finished: {} failure(s) so far",
            report.failure_count()
        );

        if self.halted(report) {
            log::info!("Halting before the normalize phase");
            for job in plan.jobs(Phase::Normalize) {
                let output = job.output(namespace);
                report
                    .jobs
                    .push(JobResult::skipped(Phase::Normalize, &job.language, job.table, &output));
            }
            return Ok(());
        }

        transition(report, RunState::NormalizePhase);
        for job in plan.jobs(Phase::Normalize) {
            let output = job.output(namespace);
            if self.halted(report) || self.blocked(&job, &failed_imports) {
                log::info!("Skipping normalization of {}", output);
                report
                    .jobs
                    .push(JobResult::skipped(Phase::Normalize, &job.language, job.table, &output));
                continue;
            }
            self.catalog
                .drop_if_exists(&mut self.runner, namespace, &output.table)?;
            let result =
                normalizer.run_normalize(&mut self.runner, &job.language, job.table, namespace)?;
            report.jobs.push(result);
        }
        Ok(())
    }

    fn halted(&self, report: &RunReport) -> bool {
        self.options.policy == FailurePolicy::FailFast && report.failure_count() > 0
    }

    fn blocked(&self, job: &JobDescriptor, failed_imports: &HashSet<(String, LogicalTable)>) -> bool {
        self.options.policy == FailurePolicy::SkipDependents
            && (failed_imports.contains(&(job.language.clone(), job.table))
                || failed_imports.contains(&(job.language.clone(), LogicalTable::Page)))
    }
}

fn transition(report: &mut RunReport, next: RunState) {
    log::info!("State {:?} -> {:?}", report.state, next);
    report.state = next;
}
