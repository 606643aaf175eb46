//! Hierarchical size accumulation and presentation
//!
//! - `Rollup`: the tree of signed VM/file byte totals fed by the N-way
//!   range join, including the collapse into presentable rows
//! - `RollupRow` / `RollupOutput`: the collapsed form plus the pretty
//!   and CSV renderers

pub mod output;
pub mod tree;

pub use output::{OutputFormat, OutputOptions, RollupOutput, RollupRow};
pub use tree::Rollup;
