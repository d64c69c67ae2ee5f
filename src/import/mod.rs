//! Bulk import of raw tables.

use crate::engine::{EngineRunner, Invocation, InvocationKind, Priority, QualifiedName};
use crate::error::Result;
use crate::registry::{LogicalTable, TemplateRegistry};
use crate::report::{JobResult, JobTimer, Phase};
use crate::template::{JobParameters, Placeholder};

/// Connection and staging settings shared by every import of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSettings {
    /// Host of the production database replica.
    pub connect_host: String,
    /// Database user.
    pub username: String,
    /// Password file readable by the import engine.
    pub password_file: String,
    /// Directory under which per-job staging directories are created.
    pub staging_dir: String,
}

impl Default for ImportSettings {
    fn default() -> Self {
        ImportSettings {
            connect_host: "analytics-store.eqiad.wmnet".to_string(),
            username: "research".to_string(),
            password_file: "/user/ellery/sqoop.password".to_string(),
            staging_dir: "/tmp".to_string(),
        }
    }
}

/// Production database holding a language's tables.
pub fn source_database(language: &str) -> String {
    format!("{}wiki", language)
}

/// Physical name of a raw table.
pub fn raw_table_name(language: &str, table: LogicalTable) -> String {
    format!("{}_{}_raw", language, table.as_str())
}

/// Bindings for one import job.
///
/// `run_id` keeps staging directories of concurrent or consecutive runs
/// apart.
pub fn import_parameters(
    language: &str,
    table: LogicalTable,
    namespace: &str,
    settings: &ImportSettings,
    run_id: &str,
) -> JobParameters {
    let target_dir = format!(
        "{}/{}_{}_{}",
        settings.staging_dir.trim_end_matches('/'),
        run_id,
        language,
        table
    );
    JobParameters::new()
        .with(Placeholder::SourceDatabase, source_database(language))
        .with(Placeholder::Namespace, namespace)
        .with(Placeholder::ResultTable, raw_table_name(language, table))
        .with(Placeholder::ConnectHost, settings.connect_host.as_str())
        .with(Placeholder::Username, settings.username.as_str())
        .with(Placeholder::PasswordFile, settings.password_file.as_str())
        .with(Placeholder::TargetDir, target_dir)
}

/// Renders import templates and hands them to the bulk-import engine.
pub struct ImportExecutor<'a> {
    registry: &'a TemplateRegistry,
    settings: &'a ImportSettings,
    run_id: &'a str,
}

impl<'a> ImportExecutor<'a> {
    /// Executor for one run.
    pub fn new(registry: &'a TemplateRegistry, settings: &'a ImportSettings, run_id: &'a str) -> Self {
        ImportExecutor {
            registry,
            settings,
            run_id,
        }
    }

    /// Fully rendered invocation for one job.
    pub fn invocation(
        &self,
        language: &str,
        table: LogicalTable,
        namespace: &str,
    ) -> Result<Invocation> {
        let spec = self.registry.get(table);
        let params = import_parameters(language, table, namespace, self.settings, self.run_id);
        Ok(Invocation {
            kind: InvocationKind::BulkImport {
                source: QualifiedName::new(source_database(language), table.as_str()),
                target: QualifiedName::new(namespace, raw_table_name(language, table)),
            },
            text: spec.import_template.render(&params)?,
            priority: Priority::Default,
        })
    }

    /// Import `table` for `language` into `namespace`.
    ///
    /// A non-zero engine exit, or an engine that could not be started, is
    /// reported as a failed [`JobResult`]; only a rendering error is an `Err`.
    pub fn run_import<R: EngineRunner>(
        &self,
        runner: &mut R,
        language: &str,
        table: LogicalTable,
        namespace: &str,
    ) -> Result<JobResult> {
        let invocation = self.invocation(language, table, namespace)?;
        let target = QualifiedName::new(namespace, raw_table_name(language, table));
        log::info!("Importing {}.{} into {}", source_database(language), table, target);
        log::debug!("{}", invocation.text);

        let timer = JobTimer::start();
        let result = match runner.run(&invocation) {
            Ok(outcome) => {
                timer.finish(Phase::Import, language, table, &target, &invocation.text, outcome)
            }
            Err(err) => timer.abandon(Phase::Import, language, table, &target, &invocation.text, &err),
        };

        if let Some(err) = result.error() {
            log::warn!("{}", err);
        } else {
            log::info!("Imported {} in {} ms", target, result.duration_ms);
        }
        Ok(result)
    }
}
