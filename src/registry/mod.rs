//! Table registry.
//!
//! Maps each supported logical table to its import and normalization
//! templates. The set of tables is closed: one enum variant per table,
//! because the join shape differs for each of them.

mod templates;

use crate::error::{EtlError, Result};
use crate::template::{Placeholder, Template};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Logical tables that can be imported and normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogicalTable {
    /// `page`
    Page,
    /// `redirect`
    Redirect,
    /// `revision`
    Revision,
    /// `pagelinks`
    Pagelinks,
    /// `page_props`
    PageProps,
}

impl LogicalTable {
    /// All supported tables.
    pub const ALL: [LogicalTable; 5] = [
        LogicalTable::Page,
        LogicalTable::Redirect,
        LogicalTable::Revision,
        LogicalTable::Pagelinks,
        LogicalTable::PageProps,
    ];

    /// Name as used on the command line and in physical table names.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalTable::Page => "page",
            LogicalTable::Redirect => "redirect",
            LogicalTable::Revision => "revision",
            LogicalTable::Pagelinks => "pagelinks",
            LogicalTable::PageProps => "page_props",
        }
    }

    /// Shape of the normalization query for this table.
    pub fn shape(&self) -> NormalizeShape {
        match self {
            LogicalTable::Page => NormalizeShape::Projection,
            LogicalTable::Redirect | LogicalTable::Pagelinks => NormalizeShape::DoubleJoin,
            LogicalTable::Revision | LogicalTable::PageProps => NormalizeShape::SingleJoin,
        }
    }

    /// Column the import engine splits partitions on.
    pub fn split_column(&self) -> &'static str {
        match self {
            LogicalTable::Page => "page_id",
            LogicalTable::Redirect => "rd_from",
            LogicalTable::Revision => "rev_parent_id",
            LogicalTable::Pagelinks => "pl_from",
            LogicalTable::PageProps => "pp_page",
        }
    }

    fn supported_names() -> String {
        LogicalTable::ALL
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for LogicalTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalTable {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        LogicalTable::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EtlError::UnknownTable {
                name: s.to_string(),
                supported: LogicalTable::supported_names(),
            })
    }
}

/// How a raw table is turned into its normalized form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeShape {
    /// Straight copy of the raw columns, no join.
    Projection,
    /// One join against the page table on page id.
    SingleJoin,
    /// Join on page id for the "from" side and on (title, namespace) for
    /// the "to" side.
    DoubleJoin,
}

impl NormalizeShape {
    /// Placeholders a normalization template of this shape must reference.
    pub fn placeholders(&self) -> BTreeSet<Placeholder> {
        let mut set = BTreeSet::from([Placeholder::Namespace, Placeholder::RawTable]);
        if !matches!(self, NormalizeShape::Projection) {
            set.insert(Placeholder::PageTable);
        }
        set
    }
}

/// Placeholders every import template must reference.
pub fn import_placeholders() -> BTreeSet<Placeholder> {
    BTreeSet::from([
        Placeholder::SourceDatabase,
        Placeholder::Namespace,
        Placeholder::ResultTable,
        Placeholder::ConnectHost,
        Placeholder::Username,
        Placeholder::PasswordFile,
        Placeholder::TargetDir,
    ])
}

/// Templates for one logical table.
#[derive(Debug, Clone)]
pub struct TableSpec {
    /// The logical table.
    pub table: LogicalTable,
    /// Bulk-import argument template.
    pub import_template: Template,
    /// Normalization `SELECT` template.
    pub normalize_template: Template,
}

/// Immutable registry of all table specs.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    specs: Vec<TableSpec>,
}

impl TemplateRegistry {
    /// Build the registry, validating every template's placeholder set.
    pub fn new() -> Result<Self> {
        let mut specs = Vec::with_capacity(LogicalTable::ALL.len());
        for table in LogicalTable::ALL {
            let (import_text, normalize_text) = template_text(table);
            let import_template = Template::parse(format!("{}/import", table), import_text)?;
            import_template.expect_placeholders(&import_placeholders())?;

            let normalize_template =
                Template::parse(format!("{}/normalize", table), normalize_text)?;
            normalize_template.expect_placeholders(&table.shape().placeholders())?;

            specs.push(TableSpec {
                table,
                import_template,
                normalize_template,
            });
        }
        log::debug!("Template registry loaded with {} tables", specs.len());
        Ok(TemplateRegistry { specs })
    }

    /// Spec for a table by name.
    pub fn lookup(&self, name: &str) -> Result<&TableSpec> {
        let table: LogicalTable = name.parse()?;
        Ok(self.get(table))
    }

    /// Spec for an already-resolved table.
    pub fn get(&self, table: LogicalTable) -> &TableSpec {
        // Registry holds every variant, in ALL order.
        &self.specs[table as usize]
    }

    /// All specs.
    pub fn specs(&self) -> &[TableSpec] {
        &self.specs
    }
}

fn template_text(table: LogicalTable) -> (&'static str, &'static str) {
    match table {
        LogicalTable::Page => (templates::PAGE_IMPORT, templates::PAGE_NORMALIZE),
        LogicalTable::Redirect => (templates::REDIRECT_IMPORT, templates::REDIRECT_NORMALIZE),
        LogicalTable::Revision => (templates::REVISION_IMPORT, templates::REVISION_NORMALIZE),
        LogicalTable::Pagelinks => (templates::PAGELINKS_IMPORT, templates::PAGELINKS_NORMALIZE),
        LogicalTable::PageProps => (templates::PAGE_PROPS_IMPORT, templates::PAGE_PROPS_NORMALIZE),
    }
}
