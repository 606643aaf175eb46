//! The rollup tree: hierarchical byte totals keyed by label tuples.
//!
//! A `Rollup` is built incrementally by [`add_sizes`](Rollup::add_sizes)
//! calls, one per leaf interval of the N-way range join, then transformed
//! once into a `RollupOutput`:
//!
//! ```text
//!  93.3%  93.3%   3.02M [Unmapped]
//!      38.2%  38.2%   1.16M .debug_info
//!      23.9%  62.1%    740k .debug_str
//!       8.9%  94.9%    275k [Other]
//!   6.7% 100.0%    222k LOAD [RX]
//!      61.0%  61.0%    135k .text
//! 100.0%   3.24M TOTAL
//! ```
//!
//! Totals are signed: after [`subtract`](Rollup::subtract) they hold the
//! difference against a baseline, which switches the collapse into diff
//! mode (growing/shrinking/mixed bucketing, baseline-relative percents).

// Percentage calculations intentionally convert i64 totals to f64
#![allow(clippy::cast_precision_loss)]

use std::cmp::Reverse;
use std::collections::HashMap;

use crate::config::Options;
use crate::domain::errors::{RangeError, ScanError};
use crate::domain::types::{SortBy, NO_LABEL, OTHERS_LABEL, UNMAPPED_LABEL};
use crate::rollup::output::{RollupOutput, RollupRow};

#[derive(Debug, Default)]
pub struct Rollup {
    vm_total: i64,
    file_total: i64,
    children: HashMap<String, Box<Rollup>>,
}

fn checked_add(accum: i64, value: i64) -> Result<i64, RangeError> {
    accum.checked_add(value).ok_or(RangeError::Overflow)
}

fn percent(part: i64, whole: i64) -> f64 {
    part as f64 / whole as f64 * 100.0
}

impl Rollup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn vm_total(&self) -> i64 {
        self.vm_total
    }

    #[must_use]
    pub fn file_total(&self) -> i64 {
        self.file_total
    }

    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Rollup> {
        self.children.get(name).map(|c| &**c)
    }

    /// Add `size` bytes under the nested labels, into the VM or the file
    /// total at every level down the path.
    ///
    /// # Errors
    /// `RangeError::Overflow` when a signed 64-bit total overflows.
    pub fn add_sizes(&mut self, labels: &[&str], size: u64, is_vm: bool) -> Result<(), RangeError> {
        let delta = i64::try_from(size).map_err(|_| RangeError::Overflow)?;
        self.add_signed(labels, delta, is_vm)
    }

    fn add_signed(&mut self, labels: &[&str], delta: i64, is_vm: bool) -> Result<(), RangeError> {
        if is_vm {
            self.vm_total = checked_add(self.vm_total, delta)?;
        } else {
            self.file_total = checked_add(self.file_total, delta)?;
        }
        if let Some((first, rest)) = labels.split_first() {
            let child = self.children.entry((*first).to_string()).or_default();
            child.add_signed(rest, delta, is_vm)?;
        }
        Ok(())
    }

    /// Structurally subtract `other`: every node in `other` gets a mirror
    /// in `self` (created at zero if absent) and both totals decremented.
    /// Negative totals afterwards mark diff mode downstream.
    pub fn subtract(&mut self, other: &Rollup) {
        self.vm_total -= other.vm_total;
        self.file_total -= other.file_total;

        for (name, other_child) in &other.children {
            let child = self.children.entry(name.clone()).or_default();
            child.subtract(other_child);
        }
    }

    /// Collapse this rollup into its presentable form.
    ///
    /// # Errors
    /// Total overflow while aggregating `[Other]`, or an internal
    /// inconsistency between the rollup and the presentation tree.
    pub fn create_output(
        &self,
        options: &Options,
        output: &mut RollupOutput,
    ) -> Result<(), ScanError> {
        self.create_output_impl(None, options, output)
    }

    /// Collapse in diff mode: `self` holds current-minus-baseline values
    /// and `base` the baseline itself (percent denominators).
    ///
    /// # Errors
    /// Same as [`create_output`](Self::create_output).
    pub fn create_diff_output(
        &self,
        base: &Rollup,
        options: &Options,
        output: &mut RollupOutput,
    ) -> Result<(), ScanError> {
        self.create_output_impl(Some(base), options, output)
    }

    fn create_output_impl(
        &self,
        base: Option<&Rollup>,
        options: &Options,
        output: &mut RollupOutput,
    ) -> Result<(), ScanError> {
        let row = output.toplevel_row_mut();
        row.vmsize = self.vm_total;
        row.filesize = self.file_total;
        row.vmpercent = 100.0;
        row.filepercent = 100.0;
        self.create_rows(row, base, options, true)
    }

    fn create_rows(
        &self,
        row: &mut RollupRow,
        base: Option<&Rollup>,
        options: &Options,
        is_toplevel: bool,
    ) -> Result<(), ScanError> {
        if let Some(base) = base {
            row.vmpercent = percent(self.vm_total, base.vm_total);
            row.filepercent = percent(self.file_total, base.file_total);
            row.diff_mode = true;
        }

        // Bucket children by the signs of their totals. Outside diff mode
        // everything is non-negative and lands in the growing bucket.
        let mut growing = Vec::new();
        let mut shrinking = Vec::new();
        let mut mixed = Vec::new();
        for (name, child) in &self.children {
            if child.vm_total == 0 && child.file_total == 0 {
                continue;
            }
            let vm_sign = child.vm_total.signum();
            let file_sign = child.file_total.signum();
            let bucket = if vm_sign + file_sign < 0 {
                &mut shrinking
            } else if vm_sign != file_sign && vm_sign + file_sign == 0 {
                &mut mixed
            } else {
                &mut growing
            };
            let mut child_row = RollupRow::new(name.clone());
            child_row.vmsize = child.vm_total;
            child_row.filesize = child.file_total;
            bucket.push(child_row);
        }

        row.sorted_children =
            self.compute_rows(&row.name, row.vmsize, row.filesize, growing, base, options, is_toplevel)?;
        row.shrinking =
            self.compute_rows(&row.name, row.vmsize, row.filesize, shrinking, base, options, is_toplevel)?;
        row.mixed =
            self.compute_rows(&row.name, row.vmsize, row.filesize, mixed, base, options, is_toplevel)?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn compute_rows(
        &self,
        parent_name: &str,
        parent_vm: i64,
        parent_file: i64,
        mut rows: Vec<RollupRow>,
        base: Option<&Rollup>,
        options: &Options,
        is_toplevel: bool,
    ) -> Result<Vec<RollupRow>, ScanError> {
        // A solitary "[None]" or "[Unmapped]" row below the top level
        // conveys nothing; neither does a single row that repeats the
        // parent's own name and size.
        if !is_toplevel
            && rows.len() == 1
            && (rows[0].name == NO_LABEL || rows[0].name == UNMAPPED_LABEL)
        {
            rows.clear();
        }
        if rows.len() == 1 && rows[0].name == parent_name {
            rows.clear();
        }
        if rows.is_empty() {
            return Ok(rows);
        }

        let sort_by = options.sort_by;

        // First sort decides what survives the row limit: "[None]" first
        // (it is never collapsed away), then descending magnitude, names
        // breaking ties. Dropping from the tail removes the smallest rows.
        rows.sort_by(|a, b| collapse_rank(a, sort_by).cmp(&collapse_rank(b, sort_by)));

        let mut others_rollup = Rollup::new();
        let mut others_base = Rollup::new();
        let limit = options.max_rows_per_level;
        if limit > 0 && rows.len() > limit {
            let mut others_row = RollupRow::new(OTHERS_LABEL);
            while rows.len() > limit - 1 {
                let Some(dropped) = rows.pop() else {
                    break;
                };
                others_row.vmsize = checked_add(others_row.vmsize, dropped.vmsize)?;
                others_row.filesize = checked_add(others_row.filesize, dropped.filesize)?;
                if let Some(base) = base {
                    if let Some(base_child) = base.children.get(&dropped.name) {
                        others_base.vm_total =
                            checked_add(others_base.vm_total, base_child.vm_total)?;
                        others_base.file_total =
                            checked_add(others_base.file_total, base_child.file_total)?;
                    }
                }
            }
            if others_row.vmsize != 0 || others_row.filesize != 0 {
                others_rollup.vm_total = others_row.vmsize;
                others_rollup.file_total = others_row.filesize;
                rows.push(others_row);
            }
        }

        // Final order includes "[Other]" at its earned rank.
        rows.sort_by(|a, b| final_rank(a, sort_by).cmp(&final_rank(b, sort_by)));

        if base.is_none() {
            for child_row in &mut rows {
                child_row.vmpercent = percent(child_row.vmsize, parent_vm);
                child_row.filepercent = percent(child_row.filesize, parent_file);
            }
        }

        // Recurse. "[Other]" recurses into its synthetic aggregate; every
        // other row must exist in the rollup, or the collapse has a bug.
        let empty = Rollup::new();
        for child_row in &mut rows {
            let (child_rollup, child_base): (&Rollup, Option<&Rollup>) =
                if child_row.name == OTHERS_LABEL {
                    (&others_rollup, base.map(|_| &others_base))
                } else {
                    let child = self.children.get(&child_row.name).ok_or_else(|| {
                        ScanError::Internal(format!(
                            "presentation row '{}' is missing from the rollup tree",
                            child_row.name
                        ))
                    })?;
                    let child_base = base
                        .map(|b| b.children.get(&child_row.name).map_or(&empty, |c| &**c));
                    (&**child, child_base)
                };
            child_rollup.create_rows(child_row, child_base, options, false)?;
        }

        Ok(rows)
    }
}

fn rank_value(row: &RollupRow, sort_by: SortBy) -> u64 {
    match sort_by {
        SortBy::Vm => row.vmsize.unsigned_abs(),
        SortBy::File => row.filesize.unsigned_abs(),
        SortBy::Both => row.vmsize.unsigned_abs().max(row.filesize.unsigned_abs()),
    }
}

fn final_rank<'r>(row: &'r RollupRow, sort_by: SortBy) -> (Reverse<u64>, &'r str) {
    (Reverse(rank_value(row, sort_by)), row.name.as_str())
}

fn collapse_rank<'r>(row: &'r RollupRow, sort_by: SortBy) -> (bool, Reverse<u64>, &'r str) {
    (row.name != NO_LABEL, Reverse(rank_value(row, sort_by)), row.name.as_str())
}
