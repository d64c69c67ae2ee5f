//! Normalization of raw tables into page-identity form.
//!
//! Each raw table is joined against the raw page table of the same
//! language and materialized as `<lang>_<table>`. Link-style tables are
//! resolved from (title, namespace) to page ids on their "to" side.

use crate::engine::{EngineRunner, Invocation, InvocationKind, Priority, QualifiedName};
use crate::error::Result;
use crate::import::raw_table_name;
use crate::registry::{LogicalTable, NormalizeShape, TemplateRegistry};
use crate::report::{JobResult, JobTimer, Phase};
use crate::template::{JobParameters, Placeholder, Template};

const MATERIALIZE: &str = "CREATE TABLE {namespace}.{result_table}
ROW FORMAT DELIMITED
FIELDS TERMINATED BY '\\t'
STORED AS TEXTFILE
AS ";

/// Physical name of a normalized table.
pub fn normalized_table_name(language: &str, table: LogicalTable) -> String {
    format!("{}_{}", language, table.as_str())
}

/// Bindings for a normalization `SELECT`.
///
/// The page table is only bound for shapes that join against it.
pub fn normalize_parameters(language: &str, table: LogicalTable, namespace: &str) -> JobParameters {
    let params = JobParameters::new()
        .with(Placeholder::Namespace, namespace)
        .with(Placeholder::RawTable, raw_table_name(language, table));
    match table.shape() {
        NormalizeShape::Projection => params,
        NormalizeShape::SingleJoin | NormalizeShape::DoubleJoin => params.with(
            Placeholder::PageTable,
            raw_table_name(language, LogicalTable::Page),
        ),
    }
}

/// Renders normalization statements and runs them on the warehouse.
pub struct NormalizeExecutor<'a> {
    registry: &'a TemplateRegistry,
    materialize: Template,
}

impl<'a> NormalizeExecutor<'a> {
    /// Executor backed by `registry`.
    pub fn new(registry: &'a TemplateRegistry) -> Result<Self> {
        Ok(NormalizeExecutor {
            registry,
            materialize: Template::parse("normalize/materialize", MATERIALIZE)?,
        })
    }

    /// Rendered `SELECT` for one job, without the `CREATE TABLE` wrapper.
    pub fn render_select(&self, language: &str, table: LogicalTable, namespace: &str) -> Result<String> {
        let params = normalize_parameters(language, table, namespace);
        self.registry.get(table).normalize_template.render(&params)
    }

    /// Fully rendered invocation for one job.
    pub fn invocation(
        &self,
        language: &str,
        table: LogicalTable,
        namespace: &str,
    ) -> Result<Invocation> {
        let target = QualifiedName::new(namespace, normalized_table_name(language, table));
        let header = self.materialize.render(
            &JobParameters::new()
                .with(Placeholder::Namespace, namespace)
                .with(Placeholder::ResultTable, target.table.as_str()),
        )?;
        let select = self.render_select(language, table, namespace)?;

        let mut inputs = vec![QualifiedName::new(namespace, raw_table_name(language, table))];
        if table.shape() != NormalizeShape::Projection {
            inputs.push(QualifiedName::new(
                namespace,
                raw_table_name(language, LogicalTable::Page),
            ));
        }
        inputs.dedup();

        Ok(Invocation {
            kind: InvocationKind::Materialize { target, inputs },
            text: format!("{}{}", header, select),
            priority: Priority::High,
        })
    }

    /// Materialize `<language>_<table>` in `namespace`.
    ///
    /// The raw page table is not checked beforehand; if it is missing the
    /// warehouse fails the statement and the job is recorded as failed.
    pub fn run_normalize<R: EngineRunner>(
        &self,
        runner: &mut R,
        language: &str,
        table: LogicalTable,
        namespace: &str,
    ) -> Result<JobResult> {
        let invocation = self.invocation(language, table, namespace)?;
        let target = QualifiedName::new(namespace, normalized_table_name(language, table));
        log::info!("Normalizing {} ({:?})", target, table.shape());
        log::debug!("{}", invocation.text);

        let timer = JobTimer::start();
        let result = match runner.run(&invocation) {
            Ok(outcome) => timer.finish(
                Phase::Normalize,
                language,
                table,
                &target,
                &invocation.text,
                outcome,
            ),
            Err(err) => timer.abandon(
                Phase::Normalize,
                language,
                table,
                &target,
                &invocation.text,
                &err,
            ),
        };

        if let Some(err) = result.error() {
            log::warn!("{}", err);
        } else {
            log::info!("Materialized {} in {} ms", target, result.duration_ms);
        }
        Ok(result)
    }
}
