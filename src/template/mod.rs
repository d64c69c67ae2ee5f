//! Placeholder templates for import commands and warehouse statements.
//!
//! Templates use `{name}` placeholders drawn from a closed set. A template is
//! parsed once into literal and placeholder segments, so rendering can never
//! leave a placeholder unexpanded or silently drop a typo. Text such as the
//! import engine's own `$CONDITIONS` token is ordinary literal text.

use crate::error::{EtlError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Every placeholder a template may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Placeholder {
    /// Source database on the production side (`<lang>wiki`).
    SourceDatabase,
    /// Warehouse namespace receiving all outputs.
    Namespace,
    /// Table being created by the statement or command.
    ResultTable,
    /// Raw table of the same (language, table) pair.
    RawTable,
    /// Raw page table of the same language (`<lang>_page_raw`).
    PageTable,
    /// Host of the production database replica.
    ConnectHost,
    /// Database user name.
    Username,
    /// Path of the password file handed to the import engine.
    PasswordFile,
    /// Per-job staging directory for the import engine.
    TargetDir,
}

impl Placeholder {
    /// All placeholders, in declaration order.
    pub const ALL: [Placeholder; 9] = [
        Placeholder::SourceDatabase,
        Placeholder::Namespace,
        Placeholder::ResultTable,
        Placeholder::RawTable,
        Placeholder::PageTable,
        Placeholder::ConnectHost,
        Placeholder::Username,
        Placeholder::PasswordFile,
        Placeholder::TargetDir,
    ];

    /// Name as written inside braces.
    pub fn as_str(&self) -> &'static str {
        match self {
            Placeholder::SourceDatabase => "source_db",
            Placeholder::Namespace => "namespace",
            Placeholder::ResultTable => "result_table",
            Placeholder::RawTable => "raw_table",
            Placeholder::PageTable => "page_table",
            Placeholder::ConnectHost => "connect_host",
            Placeholder::Username => "username",
            Placeholder::PasswordFile => "password_file",
            Placeholder::TargetDir => "target_dir",
        }
    }

    /// Look a placeholder up by its brace name.
    pub fn from_name(name: &str) -> Option<Self> {
        Placeholder::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(&'static str),
    Slot(Placeholder),
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    id: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parse template text.
    ///
    /// `id` names the template in error messages. Fails on empty text, an
    /// unclosed brace, or a name outside the placeholder set.
    pub fn parse(id: impl Into<String>, text: &'static str) -> Result<Self> {
        let id = id.into();
        if text.trim().is_empty() {
            return Err(EtlError::Template {
                template: id,
                message: "template text is empty".to_string(),
            });
        }

        let mut segments = Vec::new();
        let mut rest = text;
        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(&rest[..open]));
            }
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| EtlError::Template {
                template: id.clone(),
                message: format!("unclosed '{{' at byte {}", text.len() - rest.len() + open),
            })?;
            let name = &after[..close];
            let placeholder = Placeholder::from_name(name).ok_or_else(|| EtlError::Template {
                template: id.clone(),
                message: format!("unknown placeholder '{{{}}}'", name),
            })?;
            segments.push(Segment::Slot(placeholder));
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest));
        }

        Ok(Template { id, segments })
    }

    /// Template identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Distinct placeholders the template references.
    pub fn placeholders(&self) -> BTreeSet<Placeholder> {
        self.segments
            .iter()
            .filter_map(|segment| match segment {
                Segment::Slot(p) => Some(*p),
                Segment::Literal(_) => None,
            })
            .collect()
    }

    /// Check that the template references exactly `expected`.
    pub fn expect_placeholders(&self, expected: &BTreeSet<Placeholder>) -> Result<()> {
        let actual = self.placeholders();
        if &actual == expected {
            return Ok(());
        }
        let missing: Vec<_> = expected.difference(&actual).map(|p| p.as_str()).collect();
        let extra: Vec<_> = actual.difference(expected).map(|p| p.as_str()).collect();
        Err(EtlError::Template {
            template: self.id.clone(),
            message: format!("missing placeholders {:?}, unexpected placeholders {:?}", missing, extra),
        })
    }

    /// Render with the given parameters.
    ///
    /// Every referenced placeholder must be bound, and every bound
    /// parameter must be referenced.
    pub fn render(&self, params: &JobParameters) -> Result<String> {
        self.expect_placeholders(&params.keys())?;

        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(p) => out.push_str(params.get(*p).unwrap_or_default()),
            }
        }
        Ok(out)
    }
}

/// Placeholder bindings for one rendering.
///
/// Built once per (language, table) job and not changed afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobParameters {
    values: BTreeMap<Placeholder, String>,
}

impl JobParameters {
    /// Empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style binding.
    pub fn with(mut self, placeholder: Placeholder, value: impl Into<String>) -> Self {
        self.values.insert(placeholder, value.into());
        self
    }

    /// Bound value for a placeholder.
    pub fn get(&self, placeholder: Placeholder) -> Option<&str> {
        self.values.get(&placeholder).map(String::as_str)
    }

    /// Set of bound placeholders.
    pub fn keys(&self) -> BTreeSet<Placeholder> {
        self.values.keys().copied().collect()
    }
}
