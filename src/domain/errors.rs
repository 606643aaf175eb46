//! Structured error types for size-scope
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! One enum per failure area: range arithmetic, configuration, scanning.

use std::path::PathBuf;
use thiserror::Error;

/// Failures in range and rollup arithmetic. Fatal: the core never
/// recovers from a size that does not fit the address space.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeError {
    #[error("integer overflow in range arithmetic")]
    Overflow,
}

/// Configuration problems, reported before any scanning starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no such data source: {0}")]
    UnknownDataSource(String),

    #[error("custom data source '{name}' tries to depend on custom data source '{base}'")]
    CustomSourceOnCustomSource { name: String, base: String },

    #[error("must specify at least one input file")]
    NoInputFiles,

    #[error("invalid rewrite pattern '{pattern}': {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("{file}:{line}: {message}")]
    Parse {
        file: PathBuf,
        line: usize,
        message: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures while scanning one input file.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("unknown file type for '{0}'")]
    UnknownFileType(PathBuf),

    #[error("malformed input '{file}': {what} (offending value: {value:#x})")]
    Malformed {
        file: PathBuf,
        what: &'static str,
        value: u64,
    },

    #[error("can't use data source '{kind}' on object files (only binaries and shared libraries)")]
    UnsupportedOnObjectFile { kind: &'static str },

    #[error("couldn't open '{file}': {source}")]
    Open {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A bug in this program, not in the user's input.
    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Range(#[from] RangeError),

    #[error(transparent)]
    Object(#[from] object::read::Error),

    #[error(transparent)]
    Dwarf(#[from] gimli::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
