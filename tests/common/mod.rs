//! Test engines shared by the integration tests.

#![allow(dead_code)]

use rusqlite::Connection;
use std::collections::{BTreeSet, HashMap, HashSet};
use wikisqoop::engine::{EngineRunner, Invocation, InvocationKind, Outcome, QualifiedName};
use wikisqoop::{EtlError, Result};

/// One executed invocation plus the tables that existed when it ran.
#[derive(Debug, Clone)]
pub struct Event {
    pub invocation: Invocation,
    pub existing: BTreeSet<String>,
    pub outcome: Outcome,
}

/// In-memory warehouse that tracks table existence only.
///
/// Materializations fail with exit code 2 when an input table is missing,
/// the way the warehouse fails on a missing join source.
#[derive(Debug, Default)]
pub struct RecordingWarehouse {
    namespaces: HashSet<String>,
    tables: BTreeSet<String>,
    failing: HashMap<String, i32>,
    failing_drops: HashMap<String, i32>,
    unreachable: HashSet<String>,
    pub events: Vec<Event>,
}

impl RecordingWarehouse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the job creating `table` (e.g. "wmf.fr_page_raw") exit with `code`.
    pub fn fail_creating(mut self, table: &str, code: i32) -> Self {
        self.failing.insert(table.to_string(), code);
        self
    }

    /// Make `DROP TABLE IF EXISTS table` exit with `code`.
    pub fn fail_dropping(mut self, table: &str, code: i32) -> Self {
        self.failing_drops.insert(table.to_string(), code);
        self
    }

    /// Make the engine unreachable for the job creating `table`.
    pub fn unreachable_creating(mut self, table: &str) -> Self {
        self.unreachable.insert(table.to_string());
        self
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains(table)
    }

    pub fn bulk_imports(&self) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| matches!(e.invocation.kind, InvocationKind::BulkImport { .. }))
            .collect()
    }

    pub fn materializations(&self) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| matches!(e.invocation.kind, InvocationKind::Materialize { .. }))
            .collect()
    }

    fn create(&mut self, target: &QualifiedName) -> Outcome {
        if let Some(code) = self.failing.get(&target.to_string()) {
            return Outcome::failed(*code);
        }
        self.tables.insert(target.to_string());
        Outcome::SUCCESS
    }
}

impl EngineRunner for RecordingWarehouse {
    fn run(&mut self, invocation: &Invocation) -> Result<Outcome> {
        if let InvocationKind::BulkImport { target, .. } | InvocationKind::Materialize { target, .. } =
            &invocation.kind
        {
            if self.unreachable.contains(&target.to_string()) {
                return Err(EtlError::EngineUnavailable {
                    program: "sqoop".to_string(),
                    reason: "cannot find binary path".to_string(),
                });
            }
        }
        let existing = self.tables.clone();
        let outcome = match &invocation.kind {
            InvocationKind::CreateNamespace { namespace } => {
                self.namespaces.insert(namespace.clone());
                Outcome::SUCCESS
            }
            InvocationKind::DropTable { table } => match self.failing_drops.get(&table.to_string()) {
                Some(code) => Outcome::failed(*code),
                None => {
                    self.tables.remove(&table.to_string());
                    Outcome::SUCCESS
                }
            },
            InvocationKind::BulkImport { target, .. } => self.create(target),
            InvocationKind::Materialize { target, inputs } => {
                if inputs.iter().all(|input| self.tables.contains(&input.to_string())) {
                    self.create(target)
                } else {
                    Outcome::failed(2)
                }
            }
        };
        self.events.push(Event {
            invocation: invocation.clone(),
            existing,
            outcome,
        });
        Ok(outcome)
    }
}

const HIVE_STORAGE_CLAUSE: &str =
    "ROW FORMAT DELIMITED\nFIELDS TERMINATED BY '\\t'\nSTORED AS TEXTFILE\n";

/// Warehouse backed by SQLite.
///
/// Namespaces and `<lang>wiki` source databases are attached in-memory
/// databases. Catalog and materialization statements run as rendered, minus
/// the Hive storage clause; a bulk import copies the source table as is.
pub struct SqliteWarehouse {
    pub conn: Connection,
    attached: HashSet<String>,
}

impl SqliteWarehouse {
    pub fn new() -> Self {
        SqliteWarehouse {
            conn: Connection::open_in_memory().expect("open sqlite"),
            attached: HashSet::new(),
        }
    }

    pub fn attach(&mut self, name: &str) {
        if self.attached.insert(name.to_string()) {
            self.conn
                .execute_batch(&format!("ATTACH DATABASE ':memory:' AS {};", name))
                .expect("attach database");
        }
    }

    /// Attach `<language>wiki` and fill it with the fixture production tables.
    pub fn load_source(&mut self, language: &str) {
        let db = format!("{}wiki", language);
        self.attach(&db);
        self.conn
            .execute_batch(&source_fixture(&db))
            .expect("load source fixture");
    }

    pub fn count(&self, table: &str) -> i64 {
        self.conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))
            .expect("count rows")
    }

    pub fn table_exists(&self, namespace: &str, table: &str) -> bool {
        let sql = format!(
            "SELECT COUNT(*) FROM {}.sqlite_master WHERE type = 'table' AND name = ?1",
            namespace
        );
        let n: i64 = self
            .conn
            .query_row(&sql, [table], |row| row.get(0))
            .expect("query sqlite_master");
        n > 0
    }

    fn execute(&self, sql: &str) -> Outcome {
        match self.conn.execute_batch(sql) {
            Ok(()) => Outcome::SUCCESS,
            Err(e) => {
                eprintln!("sqlite rejected statement: {}\n{}", e, sql);
                Outcome::failed(1)
            }
        }
    }
}

impl EngineRunner for SqliteWarehouse {
    fn run(&mut self, invocation: &Invocation) -> Result<Outcome> {
        Ok(match &invocation.kind {
            InvocationKind::CreateNamespace { namespace } => {
                self.attach(namespace);
                Outcome::SUCCESS
            }
            InvocationKind::DropTable { .. } => self.execute(&invocation.text),
            InvocationKind::BulkImport { source, target } => {
                self.execute(&format!("CREATE TABLE {} AS SELECT * FROM {};", target, source))
            }
            InvocationKind::Materialize { .. } => {
                self.execute(&invocation.text.replace(HIVE_STORAGE_CLAUSE, ""))
            }
        })
    }
}

/// Production-shaped source tables with the columns the imports project.
pub fn source_fixture(db: &str) -> String {
    format!(
        r#"
CREATE TABLE {db}.page (page_id INTEGER, page_title TEXT, page_is_redirect INTEGER, page_namespace INTEGER);
INSERT INTO {db}.page VALUES
  (1, 'Main_Page', 0, 0),
  (2, 'Foo', 0, 0),
  (3, 'Foo', 0, 1),
  (4, 'Old_Main', 1, 0),
  (5, 'foo', 0, 0),
  (6, 'Foo_talk_redirect', 1, 0);

CREATE TABLE {db}.redirect (rd_from INTEGER, rd_title TEXT, rd_namespace INTEGER);
INSERT INTO {db}.redirect VALUES
  (4, 'Main_Page', 0),
  (6, 'Foo', 1),
  (77, 'Foo', 0);

CREATE TABLE {db}.pagelinks (pl_from INTEGER, pl_title TEXT, pl_from_namespace INTEGER, pl_namespace INTEGER);
INSERT INTO {db}.pagelinks VALUES
  (1, 'Foo', 0, 0),
  (1, 'Foo', 0, 1),
  (2, 'FOO', 0, 0),
  (2, 'Main Page', 0, 0),
  (3, 'Old_Main', 1, 0),
  (99, 'Foo', 0, 0);

CREATE TABLE {db}.revision (rev_page INTEGER, rev_user INTEGER, rev_user_text TEXT, rev_minor_edit INTEGER, rev_deleted INTEGER, rev_len INTEGER, rev_parent_id INTEGER);
INSERT INTO {db}.revision VALUES
  (1, 10, 'Alice', 0, 0, 100, 0),
  (2, 11, 'Bob', 1, 0, 50, 0),
  (42, 12, 'Carol', 0, 0, 10, 0);

CREATE TABLE {db}.page_props (pp_page INTEGER, pp_propname TEXT, pp_value TEXT);
INSERT INTO {db}.page_props VALUES
  (1, 'wikibase_item', 'Q5296'),
  (3, 'defaultsort', 'Foo'),
  (404, 'wikibase_item', 'Q1');
"#,
        db = db
    )
}
