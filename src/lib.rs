//! # size-scope: a size profiler for compiled binaries
//!
//! size-scope attributes every byte of a binary's on-disk footprint and
//! every byte of its virtual-memory footprint to hierarchical,
//! human-meaningful labels (segment, section, symbol, compile unit,
//! source line, ...), then prints a ranked breakdown, optionally as a
//! diff against baseline binaries.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐     ┌───────────┐     ┌──────────────────────────┐
//! │   format   │ ──▶ │ RangeSink │ ──▶ │ DualMaps (VM + file map  │
//! │   parser   │     │ (munging, │     │ per selected source,     │
//! │ (elf, ar,  │     │ translate)│     │ plus the base map)       │
//! │  dwarf)    │     └───────────┘     └────────────┬─────────────┘
//! └────────────┘                                    │
//!                              RangeMap::compute_rollup (N-way join)
//!                                                   │
//!                                                   ▼
//!                    ┌────────┐   collapse    ┌──────────────┐
//!                    │ Rollup │ ────────────▶ │ RollupOutput │──▶ text/CSV
//!                    └────────┘               └──────────────┘
//! ```
//!
//! Two address domains run through the whole pipeline in parallel: VM
//! addresses (what the binary occupies when loaded) and file offsets
//! (what it occupies on disk). The per-file *base map* (segments, or
//! sections for object files) is populated first and carries the
//! translation between the domains; every later data source is clipped
//! against it (first-writer-wins) and projected into the domain it did
//! not supply.
//!
//! ## Module structure
//!
//! - [`ranges`]: the interval-map core: `RangeMap`, `DualMap`,
//!   `NameMunger`, `RangeSink`
//! - [`rollup`]: the accumulation tree and its collapse into ranked,
//!   percentaged rows
//! - [`formats`]: ELF / archive / DWARF parsers feeding the sinks
//! - [`scan`]: per-file orchestration and multi-file (diff) rollup
//! - [`demangle`]: in-process Rust and C++ symbol demangling
//! - [`config`]: run options and the `-c` options-file loader
//! - [`input`]: memory-mapped input files
//! - [`cli`] / [`domain`]: argument parsing and shared domain types
//!
//! The core is single-threaded and synchronous; a scan is a pure
//! function of its input files.

pub mod cli;
pub mod config;
pub mod demangle;
pub mod domain;
pub mod formats;
pub mod input;
pub mod ranges;
pub mod rollup;
pub mod scan;

pub use config::Options;
pub use domain::types::{set_verbose_level, verbose_level, SortBy};
pub use input::InputFile;
pub use ranges::{DualMap, NameMunger, RangeMap, RangeSink};
pub use rollup::{OutputFormat, OutputOptions, Rollup, RollupOutput};
pub use scan::Profiler;
