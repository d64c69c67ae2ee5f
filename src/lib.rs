//! Wikisqoop: per-language wiki table import and normalization.
//!
//! This library bulk-imports a fixed set of production tables for each
//! requested language into a Hive namespace, then joins every raw table
//! against the same language's page table so that each page reference
//! carries canonical page identity (id, namespace, redirect flag).

#![warn(missing_docs)]
// env_logger is used by src/main.rs (binary), not this library
#![expect(unused_crate_dependencies)]

pub mod catalog;
pub mod cli;
pub mod engine;
pub mod error;
pub mod import;
pub mod normalize;
pub mod pipeline;
pub mod plan;
pub mod registry;
pub mod report;
pub mod template;

/// Re-export common error types for convenience.
pub use error::{EtlError, Result};

/// Re-export the orchestrator for convenience.
pub use pipeline::{FailurePolicy, Pipeline, PipelineOptions};

/// Wikisqoop version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
