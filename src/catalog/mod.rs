//! Warehouse catalog operations.
//!
//! Namespace creation and table drops. Both are idempotent, and any
//! failure here is fatal for the run.

use crate::engine::{EngineRunner, Invocation, InvocationKind, Priority, QualifiedName};
use crate::error::{EtlError, Result};
use crate::template::{JobParameters, Placeholder, Template};

const CREATE_NAMESPACE: &str = "CREATE DATABASE IF NOT EXISTS {namespace};";
const DROP_TABLE: &str = "DROP TABLE IF EXISTS {namespace}.{result_table};";

/// Issues catalog statements through an [`EngineRunner`].
#[derive(Debug, Clone)]
pub struct CatalogManager {
    create_namespace: Template,
    drop_table: Template,
}

impl CatalogManager {
    /// Parse the catalog statement templates.
    pub fn new() -> Result<Self> {
        Ok(CatalogManager {
            create_namespace: Template::parse("catalog/create_namespace", CREATE_NAMESPACE)?,
            drop_table: Template::parse("catalog/drop_table", DROP_TABLE)?,
        })
    }

    /// Create `namespace` unless it already exists.
    pub fn ensure_namespace<R: EngineRunner>(&self, runner: &mut R, namespace: &str) -> Result<()> {
        let params = JobParameters::new().with(Placeholder::Namespace, namespace);
        let invocation = Invocation {
            kind: InvocationKind::CreateNamespace {
                namespace: namespace.to_string(),
            },
            text: self.create_namespace.render(&params)?,
            priority: Priority::Default,
        };
        log::info!("Ensuring namespace '{}'", namespace);
        execute(runner, &invocation)
    }

    /// Drop `<namespace>.<table>` if it exists.
    pub fn drop_if_exists<R: EngineRunner>(
        &self,
        runner: &mut R,
        namespace: &str,
        table: &str,
    ) -> Result<()> {
        let target = QualifiedName::new(namespace, table);
        let invocation = Invocation {
            text: self.render_drop(&target)?,
            kind: InvocationKind::DropTable { table: target },
            priority: Priority::Default,
        };
        log::debug!("{}", invocation.text);
        execute(runner, &invocation)
    }

    /// Rendered `DROP TABLE IF EXISTS` statement.
    pub fn render_drop(&self, table: &QualifiedName) -> Result<String> {
        let params = JobParameters::new()
            .with(Placeholder::Namespace, table.namespace.as_str())
            .with(Placeholder::ResultTable, table.table.as_str());
        self.drop_table.render(&params)
    }
}

fn execute<R: EngineRunner>(runner: &mut R, invocation: &Invocation) -> Result<()> {
    let outcome = runner.run(invocation).map_err(|e| EtlError::Catalog {
        statement: invocation.text.clone(),
        status: e.to_string(),
    })?;
    if !outcome.success() {
        log::error!("Catalog statement failed ({}): {}", outcome, invocation.text);
        return Err(EtlError::Catalog {
            statement: invocation.text.clone(),
            status: outcome.to_string(),
        });
    }
    Ok(())
}
