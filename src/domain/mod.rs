//! Domain model for size-scope
//!
//! This module contains the core domain types and errors:
//! - The closed enumeration of data sources and their registry table
//! - Synthetic label constants shared across the pipeline
//! - Structured error handling
//! - The process-wide verbosity level

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{
    set_verbose_level, source_label, verbose_level, DataSource, DataSourceDefinition, SortBy,
    DATA_SOURCES, NO_LABEL, OTHERS_LABEL, UNMAPPED_LABEL,
};

pub use errors::{ConfigError, RangeError, ScanError};
