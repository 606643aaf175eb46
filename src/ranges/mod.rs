//! Labelled address-range collection
//!
//! This module contains the write side of the attribution pipeline:
//! - `RangeMap`: a non-overlapping interval map over one 64-bit address
//!   domain, with optional per-entry translation into the other domain
//! - `DualMap`: the VM map and the file map for one labelling level
//! - `NameMunger`: user-configured regex rewrites applied to labels
//! - `RangeSink`: the facade handed to format parsers

pub mod dual_map;
pub mod munger;
pub mod range_map;
pub mod sink;

pub use dual_map::DualMap;
pub use munger::NameMunger;
pub use range_map::{RangeMap, RangeView};
pub use sink::RangeSink;
