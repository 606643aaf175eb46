//! Non-overlapping interval map over a 64-bit address domain.
//!
//! A `RangeMap` is a partial function from addresses to labels. It is used
//! for both address domains a binary lives in: pointer offsets at runtime
//! (the VM domain) and byte offsets on disk (the file domain). An entry may
//! additionally record where its range starts in the *other* domain, which
//! makes the map usable as a translator between the two.
//!
//! Insertion is first-writer-wins: whatever part of a new range is already
//! covered stays as it was, and only the uncovered remainder is inserted.
//! The scan layer relies on this to seed the segment/section base map
//! before any data source runs, so data sources can only fill gaps.

use std::collections::BTreeMap;

use log::warn;

use crate::domain::errors::RangeError;
use crate::domain::types::{verbose_level, NO_LABEL};

#[derive(Debug, Clone)]
struct Entry {
    end: u64,
    label: String,
    /// Start of the corresponding range in the other domain, when known.
    other_start: Option<u64>,
}

/// A borrowed view of one entry, as returned by lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeView<'a> {
    pub start: u64,
    pub end: u64,
    pub label: &'a str,
    pub other_start: Option<u64>,
}

/// Ordered map from range start to entry. Invariant: for adjacent entries
/// `e[i].end <= e[i+1].start` (ranges never overlap).
#[derive(Debug, Default)]
pub struct RangeMap {
    entries: BTreeMap<u64, Entry>,
}

impl RangeMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in ascending address order.
    pub fn iter(&self) -> impl Iterator<Item = RangeView<'_>> {
        self.entries.iter().map(|(&start, entry)| RangeView {
            start,
            end: entry.end,
            label: &entry.label,
            other_start: entry.other_start,
        })
    }

    /// Add `[addr, addr + size)` with the given label and no translation.
    ///
    /// Sub-ranges already covered by earlier insertions are skipped; a
    /// warning naming both labels and both ranges is emitted when the
    /// verbosity level is above 1. `size == 0` is a no-op.
    ///
    /// # Errors
    /// `RangeError::Overflow` if `addr + size` does not fit in 64 bits.
    pub fn add(&mut self, addr: u64, size: u64, label: &str) -> Result<(), RangeError> {
        self.insert(addr, size, None, label)
    }

    /// Like [`add`](Self::add), but records `other_start` so that addresses
    /// inside the inserted sub-ranges can be translated into the other
    /// domain: `translate(a) = a - addr + other_start`.
    ///
    /// # Errors
    /// `RangeError::Overflow` on 64-bit address arithmetic overflow.
    pub fn add_dual(
        &mut self,
        addr: u64,
        size: u64,
        other_start: u64,
        label: &str,
    ) -> Result<(), RangeError> {
        self.insert(addr, size, Some(other_start), label)
    }

    /// Add `[addr, addr + size)` to `self`, and project the same label into
    /// `other` (the opposite domain) for every sub-range that `translator`
    /// knows how to translate.
    ///
    /// `translator` is a map over *this* map's domain whose entries carry
    /// translation bases from previous [`add_dual`](Self::add_dual) calls.
    /// The inserted range may span several translator entries: an archive
    /// member in the file domain routinely spans many section mappings.
    /// Each overlap is clipped before translation.
    ///
    /// # Errors
    /// `RangeError::Overflow` on 64-bit address arithmetic overflow.
    pub fn add_with_translation(
        &mut self,
        addr: u64,
        size: u64,
        label: &str,
        translator: &RangeMap,
        other: &mut RangeMap,
    ) -> Result<(), RangeError> {
        self.insert(addr, size, None, label)?;

        let end = addr.checked_add(size).ok_or(RangeError::Overflow)?;

        // First translator entry that can overlap [addr, end): the entry
        // containing addr if there is one, else the first entry after it.
        let scan_from = match translator.entries.range(..=addr).next_back() {
            Some((&start, entry)) if addr < entry.end => start,
            _ => addr,
        };

        for (&t_start, t_entry) in translator.entries.range(scan_from..) {
            if t_start >= end {
                break;
            }
            let lo = addr.max(t_start);
            let hi = end.min(t_entry.end);
            if lo >= hi {
                continue;
            }
            let Some(other_start) = t_entry.other_start else {
                continue;
            };
            let translated = other_start
                .checked_add(lo - t_start)
                .ok_or(RangeError::Overflow)?;
            if verbose_level() > 2 {
                warn!(
                    "  -> '{label}' [{lo:#x}, {hi:#x}) translates to [{translated:#x}, {:#x})",
                    translated.saturating_add(hi - lo)
                );
            }
            other.insert(translated, hi - lo, None, label)?;
        }

        Ok(())
    }

    /// Translate `addr` into the other domain, if it falls inside an entry
    /// with a translation base.
    #[must_use]
    pub fn translate(&self, addr: u64) -> Option<u64> {
        let view = self.contains(addr)?;
        view.other_start?.checked_add(addr - view.start)
    }

    /// Find the entry containing `addr`: the last entry whose start is at
    /// or before `addr`, provided `addr` is below its end.
    #[must_use]
    pub fn contains(&self, addr: u64) -> Option<RangeView<'_>> {
        let (&start, entry) = self.entries.range(..=addr).next_back()?;
        if addr < entry.end {
            Some(RangeView {
                start,
                end: entry.end,
                label: &entry.label,
                other_start: entry.other_start,
            })
        } else {
            None
        }
    }

    fn insert(
        &mut self,
        addr: u64,
        size: u64,
        other_start: Option<u64>,
        label: &str,
    ) -> Result<(), RangeError> {
        if size == 0 {
            return Ok(());
        }
        let base = addr;
        let end = addr.checked_add(size).ok_or(RangeError::Overflow)?;

        let mut cursor = addr;
        while cursor < end {
            // Skip whatever already covers the cursor: first writer wins.
            if let Some((&start, entry)) = self.entries.range(..=cursor).next_back() {
                if cursor < entry.end {
                    if verbose_level() > 1 {
                        warn!(
                            "new range [{cursor:#x}, {end:#x}) for label '{label}' \
                             conflicts with existing [{start:#x}, {:#x}) for label '{}'",
                            entry.end, entry.label
                        );
                    }
                    cursor = entry.end;
                    continue;
                }
            }

            // Uncovered at the cursor; clip at the next existing entry.
            let mut piece_end = end;
            if let Some((&next_start, next_entry)) = self.entries.range(cursor..).next() {
                if next_start < end {
                    piece_end = next_start;
                    if verbose_level() > 1 {
                        warn!(
                            "new range [{cursor:#x}, {end:#x}) for label '{label}' \
                             conflicts with existing [{next_start:#x}, {:#x}) for label '{}'",
                            next_entry.end, next_entry.label
                        );
                    }
                }
            }

            let other = match other_start {
                Some(o) => Some(o.checked_add(cursor - base).ok_or(RangeError::Overflow)?),
                None => None,
            };
            self.entries.insert(
                cursor,
                Entry {
                    end: piece_end,
                    label: label.to_string(),
                    other_start: other,
                },
            );
            cursor = piece_end;
        }

        Ok(())
    }

    /// Iterate N maps over the same domain in parallel, emitting each
    /// breakpoint interval together with the label tuple covering it.
    ///
    /// Breakpoints are exactly the union of all entries' starts and ends;
    /// intervals where no map contributes a label are filtered out, and
    /// maps that do not cover an interval contribute `"[None]"`:
    ///
    /// ```text
    ///   -----  -----  -----             ---------------
    ///     |      |      1                    A,X,1
    ///     |      X    -----             ---------------
    ///     |      |      |                    A,X,2
    ///     A    -----    |               ---------------
    ///     |      |      |                      |
    ///     |      |      2      ----->          |
    ///     |      Y      |                    A,Y,2
    ///     |      |      |                      |
    ///   -----    |      |               ---------------
    ///     B      |      |                    B,Y,2
    ///   -----    |    -----             ---------------
    ///            |                      [None],Y,[None]
    ///          -----
    /// ```
    ///
    /// `filename` is spliced into the tuple before the key of map
    /// `filename_position` (or after the last key when the position equals
    /// the map count); `-1` disables it.
    ///
    /// # Errors
    /// Propagates the first error returned by `func`.
    pub fn compute_rollup<F>(
        maps: &[&RangeMap],
        filename: &str,
        filename_position: isize,
        mut func: F,
    ) -> Result<(), RangeError>
    where
        F: FnMut(&[&str], u64, u64) -> Result<(), RangeError>,
    {
        let mut cursors: Vec<_> = maps.iter().map(|m| m.entries.iter().peekable()).collect();

        let Some(mut current) = maps
            .iter()
            .filter_map(|m| m.entries.keys().next().copied())
            .min()
        else {
            // Every map is empty.
            return Ok(());
        };

        let mut keys: Vec<&str> = Vec::with_capacity(maps.len() + 1);
        loop {
            keys.clear();
            let mut next_break: Option<u64> = None;
            let mut have_data = false;

            for (i, cursor) in cursors.iter_mut().enumerate() {
                if filename_position == i as isize {
                    keys.push(filename);
                }

                // Advance past entries that end at or before the current point.
                while matches!(cursor.peek(), Some((_, entry)) if entry.end <= current) {
                    cursor.next();
                }

                match cursor.peek().copied() {
                    Some((&start, entry)) if start <= current => {
                        have_data = true;
                        keys.push(&entry.label);
                        next_break = Some(next_break.map_or(entry.end, |b| b.min(entry.end)));
                    }
                    Some((&start, _)) => {
                        keys.push(NO_LABEL);
                        next_break = Some(next_break.map_or(start, |b| b.min(start)));
                    }
                    None => keys.push(NO_LABEL),
                }
            }

            if filename_position == cursors.len() as isize {
                keys.push(filename);
            }

            let Some(next) = next_break else {
                // All cursors exhausted past the current point.
                return Ok(());
            };

            if have_data {
                func(&keys, current, next)?;
            }
            current = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(map: &RangeMap) -> Vec<(u64, u64, String)> {
        map.iter()
            .map(|view| (view.start, view.end, view.label.to_string()))
            .collect()
    }

    #[test]
    fn test_add_keeps_ranges_sorted_and_disjoint() {
        let mut map = RangeMap::new();
        map.add(0x200, 0x10, "b").unwrap();
        map.add(0x100, 0x10, "a").unwrap();
        map.add(0x300, 0x10, "c").unwrap();

        let entries = labels(&map);
        assert_eq!(
            entries,
            vec![
                (0x100, 0x110, "a".to_string()),
                (0x200, 0x210, "b".to_string()),
                (0x300, 0x310, "c".to_string()),
            ]
        );
        for pair in entries.windows(2) {
            assert!(pair[0].1 <= pair[1].0);
        }
    }

    #[test]
    fn test_add_zero_size_is_noop() {
        let mut map = RangeMap::new();
        map.add(0x100, 0, "empty").unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_overlap_first_writer_wins() {
        // Into an empty map, add [0, 100) then [50, 150): the overlap keeps
        // its first label and only the uncovered tail is inserted.
        let mut map = RangeMap::new();
        map.add(0, 100, "A").unwrap();
        map.add(50, 100, "B").unwrap();

        assert_eq!(
            labels(&map),
            vec![(0, 100, "A".to_string()), (100, 150, "B".to_string())]
        );
    }

    #[test]
    fn test_overlap_fills_hole_between_entries() {
        let mut map = RangeMap::new();
        map.add(0, 10, "head").unwrap();
        map.add(20, 10, "tail").unwrap();
        map.add(0, 30, "filler").unwrap();

        assert_eq!(
            labels(&map),
            vec![
                (0, 10, "head".to_string()),
                (10, 20, "filler".to_string()),
                (20, 30, "tail".to_string()),
            ]
        );
    }

    #[test]
    fn test_contains_boundaries() {
        let mut map = RangeMap::new();
        map.add(0x1000, 0x100, "seg").unwrap();

        assert!(map.contains(0x0fff).is_none());
        assert_eq!(map.contains(0x1000).unwrap().label, "seg");
        assert_eq!(map.contains(0x10ff).unwrap().label, "seg");
        assert!(map.contains(0x1100).is_none());
    }

    #[test]
    fn test_translate_through_dual_range() {
        let mut map = RangeMap::new();
        map.add_dual(0x1000, 0x100, 0x200, "seg").unwrap();

        assert_eq!(map.translate(0x1000), Some(0x200));
        assert_eq!(map.translate(0x1040), Some(0x240));
        assert_eq!(map.translate(0x10ff), Some(0x2ff));
        assert_eq!(map.translate(0x1100), None);
    }

    #[test]
    fn test_translate_absent_without_base() {
        let mut map = RangeMap::new();
        map.add(0x1000, 0x100, "seg").unwrap();
        assert_eq!(map.translate(0x1040), None);
    }

    #[test]
    fn test_dual_range_clipped_piece_keeps_correct_base() {
        // [0x20, 0x30) is pre-covered, so the dual insert lands in two
        // pieces; the second piece's translation base must account for the
        // distance from the original start.
        let mut map = RangeMap::new();
        map.add(0x20, 0x10, "existing").unwrap();
        map.add_dual(0x10, 0x30, 0x500, "dual").unwrap();

        assert_eq!(map.translate(0x10), Some(0x500));
        assert_eq!(map.translate(0x1f), Some(0x50f));
        // Covered by "existing": no translation.
        assert_eq!(map.translate(0x25), None);
        // Tail piece resumes at the right offset.
        assert_eq!(map.translate(0x30), Some(0x520));
        assert_eq!(map.translate(0x3f), Some(0x52f));
    }

    #[test]
    fn test_add_overflow_is_fatal() {
        let mut map = RangeMap::new();
        let err = map.add(u64::MAX - 1, 4, "wrap").unwrap_err();
        assert_eq!(err, RangeError::Overflow);
    }

    #[test]
    fn test_add_with_translation_projects_into_other_domain() {
        let mut translator = RangeMap::new();
        translator.add_dual(0x1000, 0x100, 0x200, "seg").unwrap();

        let mut vm = RangeMap::new();
        let mut file = RangeMap::new();
        vm.add_with_translation(0x1040, 0x20, "foo", &translator, &mut file)
            .unwrap();

        assert_eq!(labels(&vm), vec![(0x1040, 0x1060, "foo".to_string())]);
        assert_eq!(labels(&file), vec![(0x240, 0x260, "foo".to_string())]);
    }

    #[test]
    fn test_add_with_translation_spans_translator_entries() {
        let mut translator = RangeMap::new();
        translator.add_dual(0x00, 0x10, 0x100, "s1").unwrap();
        translator.add_dual(0x10, 0x10, 0x300, "s2").unwrap();

        let mut this = RangeMap::new();
        let mut other = RangeMap::new();
        this.add_with_translation(0x08, 0x10, "member", &translator, &mut other)
            .unwrap();

        assert_eq!(labels(&this), vec![(0x08, 0x18, "member".to_string())]);
        assert_eq!(
            labels(&other),
            vec![
                (0x108, 0x110, "member".to_string()),
                (0x300, 0x308, "member".to_string()),
            ]
        );
    }

    #[test]
    fn test_add_with_translation_skips_untranslated_holes() {
        let mut translator = RangeMap::new();
        translator.add(0x00, 0x10, "no-base").unwrap();
        translator.add_dual(0x10, 0x10, 0x900, "based").unwrap();

        let mut this = RangeMap::new();
        let mut other = RangeMap::new();
        this.add_with_translation(0x00, 0x20, "x", &translator, &mut other)
            .unwrap();

        assert_eq!(labels(&other), vec![(0x900, 0x910, "x".to_string())]);
    }

    #[test]
    fn test_compute_rollup_two_maps() {
        let mut m1 = RangeMap::new();
        m1.add(0, 10, "X").unwrap();
        m1.add(20, 10, "Y").unwrap();
        let mut m2 = RangeMap::new();
        m2.add(5, 20, "Z").unwrap();

        let mut seen = Vec::new();
        RangeMap::compute_rollup(&[&m1, &m2], "f", -1, |keys, start, end| {
            seen.push((keys.iter().map(|k| k.to_string()).collect::<Vec<_>>(), start, end));
            Ok(())
        })
        .unwrap();

        let expect = |a: &str, b: &str| vec![a.to_string(), b.to_string()];
        assert_eq!(
            seen,
            vec![
                (expect("X", "[None]"), 0, 5),
                (expect("X", "Z"), 5, 10),
                (expect("[None]", "Z"), 10, 20),
                (expect("Y", "Z"), 20, 25),
                (expect("Y", "[None]"), 25, 30),
            ]
        );
    }

    #[test]
    fn test_compute_rollup_intervals_are_disjoint_and_cover_domain() {
        let mut m1 = RangeMap::new();
        m1.add(0, 100, "a").unwrap();
        let mut m2 = RangeMap::new();
        m2.add(50, 100, "b").unwrap();
        m2.add(200, 10, "c").unwrap();

        let mut last_end = 0;
        let mut covered = 0;
        RangeMap::compute_rollup(&[&m1, &m2], "f", -1, |_, start, end| {
            assert!(start >= last_end);
            assert!(end > start);
            last_end = end;
            covered += end - start;
            Ok(())
        })
        .unwrap();
        // Union of [0, 150) and [200, 210).
        assert_eq!(covered, 160);
    }

    #[test]
    fn test_compute_rollup_filename_positions() {
        let mut m1 = RangeMap::new();
        m1.add(0, 10, "a").unwrap();

        let mut first = Vec::new();
        RangeMap::compute_rollup(&[&m1], "bin", 0, |keys, _, _| {
            first = keys.iter().map(|k| k.to_string()).collect();
            Ok(())
        })
        .unwrap();
        assert_eq!(first, vec!["bin".to_string(), "a".to_string()]);

        let mut last = Vec::new();
        RangeMap::compute_rollup(&[&m1], "bin", 1, |keys, _, _| {
            last = keys.iter().map(|k| k.to_string()).collect();
            Ok(())
        })
        .unwrap();
        assert_eq!(last, vec!["a".to_string(), "bin".to_string()]);
    }

    #[test]
    fn test_compute_rollup_all_empty_maps() {
        let m1 = RangeMap::new();
        let m2 = RangeMap::new();
        let mut calls = 0;
        RangeMap::compute_rollup(&[&m1, &m2], "f", -1, |_, _, _| {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(calls, 0);
    }
}
