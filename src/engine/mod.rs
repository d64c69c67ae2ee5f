//! External engine invocation.
//!
//! Every job is a single blocking process: the bulk-import engine for raw
//! tables, the warehouse engine for catalog and materialization statements.
//! Only the exit status comes back. Settings that the script used to export
//! into the process environment travel in [`EngineOptions`] and are applied
//! to each child process individually.

use crate::error::{EtlError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use which::which;

/// `<namespace>.<table>` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    /// Database / namespace.
    pub namespace: String,
    /// Table name.
    pub table: String,
}

impl QualifiedName {
    /// Build a qualified name.
    pub fn new(namespace: impl Into<String>, table: impl Into<String>) -> Self {
        QualifiedName {
            namespace: namespace.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.table)
    }
}

/// Execution priority hint for warehouse statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// Default queue.
    Default,
    /// The configured priority queue.
    High,
}

/// What an invocation does to the warehouse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationKind {
    /// Create the namespace if absent.
    CreateNamespace {
        /// Namespace name.
        namespace: String,
    },
    /// Drop a table if present.
    DropTable {
        /// Table to drop.
        table: QualifiedName,
    },
    /// Bulk-import `source` into `target`.
    BulkImport {
        /// Production `<db>.<table>` being read.
        source: QualifiedName,
        /// Raw warehouse table being created.
        target: QualifiedName,
    },
    /// Materialize `target` from a query over `inputs`.
    Materialize {
        /// Normalized table being created.
        target: QualifiedName,
        /// Tables the query reads.
        inputs: Vec<QualifiedName>,
    },
}

/// A fully rendered external call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Effect on the warehouse.
    pub kind: InvocationKind,
    /// Rendered command arguments (bulk import) or statement (warehouse).
    pub text: String,
    /// Execution priority.
    pub priority: Priority,
}

impl Invocation {
    /// Whether this goes to the bulk-import engine.
    pub fn is_bulk_import(&self) -> bool {
        matches!(self.kind, InvocationKind::BulkImport { .. })
    }
}

/// Exit status of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Process exit code; `None` when killed by a signal.
    pub exit_code: Option<i32>,
}

impl Outcome {
    /// Successful exit.
    pub const SUCCESS: Outcome = Outcome { exit_code: Some(0) };

    /// Failed exit with the given code.
    pub fn failed(code: i32) -> Self {
        Outcome {
            exit_code: Some(code),
        }
    }

    /// Exit code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "exit code {}", code),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Runs invocations against the external engines.
///
/// `Err` means the engine could not be reached at all; a process that ran
/// and failed is `Ok` with a non-zero [`Outcome`].
pub trait EngineRunner {
    /// Run one invocation to completion.
    fn run(&mut self, invocation: &Invocation) -> Result<Outcome>;
}

impl<R: EngineRunner + ?Sized> EngineRunner for &mut R {
    fn run(&mut self, invocation: &Invocation) -> Result<Outcome> {
        (**self).run(invocation)
    }
}

/// Per-invocation engine settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Bulk-import program.
    pub sqoop_bin: PathBuf,
    /// Warehouse CLI program.
    pub hive_bin: PathBuf,
    /// Queue used for [`Priority::High`] statements.
    pub priority_queue: String,
    /// `JAVA_HOME` for child processes, if set.
    pub java_home: Option<PathBuf>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            sqoop_bin: PathBuf::from("sqoop"),
            hive_bin: PathBuf::from("hive"),
            priority_queue: "priority".to_string(),
            java_home: None,
        }
    }
}

impl EngineOptions {
    /// Program and argument vector for an invocation.
    ///
    /// Bulk imports go through `sh -c` because the rendered arguments use
    /// shell quoting and line continuations. The program path is quoted.
    pub fn command_line(&self, invocation: &Invocation) -> (PathBuf, Vec<String>) {
        if invocation.is_bulk_import() {
            let program = self.sqoop_bin.to_string_lossy();
            let script = format!("{} {}", shell_word(&program), invocation.text);
            return (PathBuf::from("sh"), vec!["-c".to_string(), script]);
        }

        let mut args = Vec::new();
        if invocation.priority == Priority::High {
            args.push("--hiveconf".to_string());
            args.push(format!("mapreduce.job.queuename={}", self.priority_queue));
        }
        args.push("-e".to_string());
        args.push(invocation.text.clone());
        (self.hive_bin.clone(), args)
    }
}

/// Quote `word` for `sh` unless it only contains characters the shell
/// passes through unchanged.
pub fn shell_word(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=,@%+".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', "'\\''"))
    }
}

/// Runs invocations as child processes.
pub struct ProcessRunner {
    options: EngineOptions,
}

impl ProcessRunner {
    /// Resolve the engine binaries and build a runner.
    ///
    /// Fails with [`EtlError::EngineUnavailable`] when a binary is not found.
    pub fn locate(options: EngineOptions) -> Result<Self> {
        for program in [
            Path::new("sh"),
            options.sqoop_bin.as_path(),
            options.hive_bin.as_path(),
        ] {
            resolve_program(program)?;
        }
        Ok(ProcessRunner { options })
    }

    /// Runner without binary resolution.
    pub fn unchecked(options: EngineOptions) -> Self {
        ProcessRunner { options }
    }
}

fn resolve_program(program: &Path) -> Result<PathBuf> {
    which(program).map_err(|e| EtlError::EngineUnavailable {
        program: program.display().to_string(),
        reason: e.to_string(),
    })
}

impl EngineRunner for ProcessRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<Outcome> {
        let (program, args) = self.options.command_line(invocation);
        log::debug!("Running {} {:?}", program.display(), args);

        let mut command = Command::new(&program);
        command.args(&args);
        if let Some(java_home) = &self.options.java_home {
            command.env("JAVA_HOME", java_home);
        }

        // Output streams are inherited so engine logs reach the operator.
        let status = command.status().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EtlError::EngineUnavailable {
                    program: program.display().to_string(),
                    reason: e.to_string(),
                }
            } else {
                EtlError::Io {
                    path: program.clone(),
                    source: e,
                }
            }
        })?;

        Ok(Outcome {
            exit_code: status.code(),
        })
    }
}

/// Records invocations without executing them.
#[derive(Debug, Default)]
pub struct DryRunRunner {
    options: EngineOptions,
    invocations: Vec<Invocation>,
}

impl DryRunRunner {
    /// New dry-run runner rendering command lines with `options`.
    pub fn new(options: EngineOptions) -> Self {
        DryRunRunner {
            options,
            invocations: Vec::new(),
        }
    }

    /// Everything that would have been run, in order.
    pub fn invocations(&self) -> &[Invocation] {
        &self.invocations
    }

    /// Human-readable listing of the would-be command lines.
    pub fn transcript(&self) -> String {
        let mut out = String::new();
        for invocation in &self.invocations {
            let (program, args) = self.options.command_line(invocation);
            out.push_str(&format!("$ {}", program.display()));
            for arg in args {
                out.push(' ');
                out.push_str(&shell_word(&arg));
            }
            out.push_str("\n\n");
        }
        out
    }
}

impl EngineRunner for DryRunRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<Outcome> {
        log::info!("[dry-run] {:?}", invocation.kind);
        self.invocations.push(invocation.clone());
        Ok(Outcome::SUCCESS)
    }
}
