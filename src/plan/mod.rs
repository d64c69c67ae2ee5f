//! Execution plan for a run.
//!
//! A plan is the language x table matrix, validated up front and laid out
//! as two phases: every import, then every normalization. Nothing external
//! is invoked while building it, so an unknown table or a malformed
//! identifier aborts the run before the first engine call.

use crate::engine::QualifiedName;
use crate::error::{EtlError, Result};
use crate::import::raw_table_name;
use crate::normalize::normalized_table_name;
use crate::registry::{LogicalTable, TemplateRegistry};
use crate::report::Phase;

/// What the operator asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Target warehouse namespace.
    pub namespace: String,
    /// Language codes, e.g. `en`.
    pub languages: Vec<String>,
    /// Logical table names, e.g. `pagelinks`.
    pub tables: Vec<String>,
}

impl RunRequest {
    /// Build a request from comma-separated lists.
    ///
    /// Whitespace around items is trimmed and empty items are ignored.
    pub fn from_lists(namespace: &str, languages: &str, tables: &str) -> Self {
        RunRequest {
            namespace: namespace.trim().to_string(),
            languages: split_list(languages),
            tables: split_list(tables),
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// One (language, table) job in one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    /// Phase the job runs in.
    pub phase: Phase,
    /// Language code.
    pub language: String,
    /// Logical table.
    pub table: LogicalTable,
}

impl JobDescriptor {
    /// Table this job creates.
    pub fn output(&self, namespace: &str) -> QualifiedName {
        let table = match self.phase {
            Phase::Import => raw_table_name(&self.language, self.table),
            Phase::Normalize => normalized_table_name(&self.language, self.table),
        };
        QualifiedName::new(namespace, table)
    }
}

/// Validated two-phase plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    namespace: String,
    languages: Vec<String>,
    tables: Vec<LogicalTable>,
}

impl ExecutionPlan {
    /// Validate `request` and lay out its jobs.
    ///
    /// Duplicates are dropped, keeping the first occurrence.
    pub fn build(request: &RunRequest, registry: &TemplateRegistry) -> Result<Self> {
        validate_identifier("namespace", &request.namespace, |c| {
            c.is_ascii_alphanumeric() || c == '_'
        })?;

        if request.languages.is_empty() {
            return Err(EtlError::InvalidRequest {
                message: "at least one language is required".to_string(),
            });
        }
        if request.tables.is_empty() {
            return Err(EtlError::InvalidRequest {
                message: "at least one table is required".to_string(),
            });
        }

        let mut languages: Vec<String> = Vec::with_capacity(request.languages.len());
        for language in &request.languages {
            validate_identifier("language", language, |c| {
                c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'
            })?;
            if !languages.contains(language) {
                languages.push(language.clone());
            }
        }

        let mut tables = Vec::with_capacity(request.tables.len());
        for name in &request.tables {
            let table = registry.lookup(name)?.table;
            if !tables.contains(&table) {
                tables.push(table);
            }
        }

        Ok(ExecutionPlan {
            namespace: request.namespace.clone(),
            languages,
            tables,
        })
    }

    /// Target namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Languages in request order.
    pub fn languages(&self) -> &[String] {
        &self.languages
    }

    /// Tables in request order.
    pub fn tables(&self) -> &[LogicalTable] {
        &self.tables
    }

    /// Jobs of one phase: languages outer, tables inner.
    pub fn jobs(&self, phase: Phase) -> Vec<JobDescriptor> {
        let mut jobs = Vec::with_capacity(self.languages.len() * self.tables.len());
        for language in &self.languages {
            for table in &self.tables {
                jobs.push(JobDescriptor {
                    phase,
                    language: language.clone(),
                    table: *table,
                });
            }
        }
        jobs
    }

    /// Total number of jobs across both phases.
    pub fn job_count(&self) -> usize {
        2 * self.languages.len() * self.tables.len()
    }
}

fn validate_identifier(what: &str, value: &str, allowed: impl Fn(char) -> bool) -> Result<()> {
    if value.is_empty() {
        return Err(EtlError::InvalidRequest {
            message: format!("{} must not be empty", what),
        });
    }
    if let Some(bad) = value.chars().find(|c| !allowed(*c)) {
        return Err(EtlError::InvalidRequest {
            message: format!("{} '{}' contains invalid character {:?}", what, value, bad),
        });
    }
    Ok(())
}
