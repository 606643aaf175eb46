//! One labelling level seen from both address domains.

use crate::ranges::range_map::RangeMap;

/// A `RangeMap` for VM space and one for file space, holding the same
/// labelling for one input file. The base map of a file carries matching
/// translation bases on both sides, which makes VM <-> file translation
/// invertible over covered regions.
///
/// Mutation goes through the owning [`RangeSink`](crate::ranges::RangeSink)
/// so the two sides stay consistent.
#[derive(Debug, Default)]
pub struct DualMap {
    pub vm: RangeMap,
    pub file: RangeMap,
}

impl DualMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}
