//! The write-side facade handed to format parsers.
//!
//! A `RangeSink` binds one input file and one data source to a set of
//! (output `DualMap`, `NameMunger`) pairs, plus an optional translator:
//! the file's base map, whose dual entries let the sink project ranges
//! supplied in one domain into the other.
//!
//! The parser invoked to build the base map gets a sink without a
//! translator and must only use [`add_range`](RangeSink::add_range) and
//! [`add_file_range`](RangeSink::add_file_range); the VM-only adders need
//! the translator that does not exist yet.

use log::debug;

use crate::domain::errors::ScanError;
use crate::domain::types::{source_label, verbose_level, DataSource};
use crate::input::InputFile;
use crate::ranges::dual_map::DualMap;
use crate::ranges::munger::NameMunger;

pub struct RangeSink<'a> {
    file: &'a InputFile,
    data_source: DataSource,
    translator: Option<&'a DualMap>,
    outputs: Vec<(&'a mut DualMap, &'a NameMunger)>,
}

impl<'a> RangeSink<'a> {
    #[must_use]
    pub fn new(
        file: &'a InputFile,
        data_source: DataSource,
        translator: Option<&'a DualMap>,
    ) -> Self {
        Self {
            file,
            data_source,
            translator,
            outputs: Vec::new(),
        }
    }

    pub fn add_output(&mut self, map: &'a mut DualMap, munger: &'a NameMunger) {
        self.outputs.push((map, munger));
    }

    #[must_use]
    pub fn data_source(&self) -> DataSource {
        self.data_source
    }

    #[must_use]
    pub fn input_file(&self) -> &InputFile {
        self.file
    }

    /// Add a file-domain range. When a translator is present the range is
    /// also projected into each output's VM map.
    ///
    /// # Errors
    /// Range arithmetic overflow.
    pub fn add_file_range(
        &mut self,
        name: &str,
        fileoff: u64,
        filesize: u64,
    ) -> Result<(), ScanError> {
        if verbose_level() > 2 {
            debug!(
                "[{}] add_file_range({name}, {fileoff:#x}, {filesize:#x})",
                source_label(self.data_source)
            );
        }
        for (map, munger) in &mut self.outputs {
            let label = munger.munge(name);
            match self.translator {
                Some(translator) => {
                    map.file
                        .add_with_translation(fileoff, filesize, &label, &translator.file, &mut map.vm)?;
                }
                None => map.file.add(fileoff, filesize, &label)?,
            }
        }
        Ok(())
    }

    /// Add a VM-domain range, projecting it into each output's file map
    /// through the translator.
    ///
    /// # Errors
    /// Range arithmetic overflow; calling this on the base sink is an
    /// internal invariant violation.
    pub fn add_vm_range(
        &mut self,
        vmaddr: u64,
        vmsize: u64,
        name: &str,
    ) -> Result<(), ScanError> {
        if verbose_level() > 2 {
            debug!(
                "[{}] add_vm_range({name}, {vmaddr:#x}, {vmsize:#x})",
                source_label(self.data_source)
            );
        }
        let Some(translator) = self.translator else {
            return Err(ScanError::Internal(
                "add_vm_range called while building the base map".to_string(),
            ));
        };
        for (map, munger) in &mut self.outputs {
            let label = munger.munge(name);
            map.vm
                .add_with_translation(vmaddr, vmsize, &label, &translator.vm, &mut map.file)?;
        }
        Ok(())
    }

    /// Like [`add_vm_range`](Self::add_vm_range), for ranges that may have
    /// been added before under another name. Symbol tables sometimes map
    /// several names onto one function; the duplicate becomes an alias.
    ///
    /// # Errors
    /// Same as `add_vm_range`.
    pub fn add_vm_range_allow_alias(
        &mut self,
        vmaddr: u64,
        vmsize: u64,
        name: &str,
    ) -> Result<(), ScanError> {
        // TODO(overlap warnings): suppress the conflict warning for known
        // aliases once warning output grows a suppression hook.
        self.add_vm_range(vmaddr, vmsize, name)
    }

    /// Like [`add_vm_range`](Self::add_vm_range), for ranges that may have
    /// been attributed before; the duplicate is simply dropped. Source-file
    /// attribution hits this when one function appears to come from several
    /// files.
    ///
    /// # Errors
    /// Same as `add_vm_range`.
    pub fn add_vm_range_ignore_duplicate(
        &mut self,
        vmaddr: u64,
        vmsize: u64,
        name: &str,
    ) -> Result<(), ScanError> {
        self.add_vm_range(vmaddr, vmsize, name)
    }

    /// Add parallel VM and file ranges for one region.
    ///
    /// The shared `min(vmsize, filesize)` prefix is inserted as a dual
    /// range on both sides, so the base map built from such calls can
    /// translate in both directions. Tail bytes present in only one domain
    /// (`.bss` has VM-only bytes, debug sections file-only bytes) are
    /// added to that domain alone.
    ///
    /// # Errors
    /// Range arithmetic overflow.
    pub fn add_range(
        &mut self,
        name: &str,
        vmaddr: u64,
        vmsize: u64,
        fileoff: u64,
        filesize: u64,
    ) -> Result<(), ScanError> {
        if verbose_level() > 2 {
            debug!(
                "[{}] add_range({name}, {vmaddr:#x}, {vmsize:#x}, {fileoff:#x}, {filesize:#x})",
                source_label(self.data_source)
            );
        }
        for (map, munger) in &mut self.outputs {
            let label = munger.munge(name);
            let common = vmsize.min(filesize);

            map.vm.add_dual(vmaddr, common, fileoff, &label)?;
            map.file.add_dual(fileoff, common, vmaddr, &label)?;

            if vmsize > common {
                let tail = vmaddr
                    .checked_add(common)
                    .ok_or(crate::domain::errors::RangeError::Overflow)?;
                map.vm.add(tail, vmsize - common, &label)?;
            }
            if filesize > common {
                let tail = fileoff
                    .checked_add(common)
                    .ok_or(crate::domain::errors::RangeError::Overflow)?;
                map.file.add(tail, filesize - common, &label)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputFile;

    fn test_file() -> InputFile {
        InputFile::from_bytes("test.bin", vec![0; 0x1000])
    }

    fn base_map() -> DualMap {
        let mut base = DualMap::new();
        base.vm.add_dual(0x1000, 0x100, 0x200, "seg").unwrap();
        base.file.add_dual(0x200, 0x100, 0x1000, "seg").unwrap();
        base
    }

    #[test]
    fn test_vm_range_translates_into_file_domain() {
        let file = test_file();
        let base = base_map();
        let munger = NameMunger::new();
        let mut out = DualMap::new();

        let mut sink = RangeSink::new(&file, DataSource::Symbols, Some(&base));
        sink.add_output(&mut out, &munger);
        sink.add_vm_range(0x1040, 0x20, "foo").unwrap();

        let entry = out.file.contains(0x240).expect("translated entry");
        assert_eq!(entry.start, 0x240);
        assert_eq!(entry.end, 0x260);
        assert_eq!(entry.label, "foo");
    }

    #[test]
    fn test_vm_range_without_translator_is_invariant_violation() {
        let file = test_file();
        let munger = NameMunger::new();
        let mut out = DualMap::new();

        let mut sink = RangeSink::new(&file, DataSource::Segments, None);
        sink.add_output(&mut out, &munger);
        let err = sink.add_vm_range(0x1000, 0x10, "x").unwrap_err();
        assert!(matches!(err, ScanError::Internal(_)));
    }

    #[test]
    fn test_add_range_splits_common_prefix_and_tails() {
        let file = test_file();
        let munger = NameMunger::new();
        let mut out = DualMap::new();

        let mut sink = RangeSink::new(&file, DataSource::Segments, None);
        sink.add_output(&mut out, &munger);
        // VM is larger than file: classic .bss tail.
        sink.add_range("LOAD [RW]", 0x1000, 0x300, 0x80, 0x100).unwrap();

        assert_eq!(out.vm.translate(0x1000), Some(0x80));
        assert_eq!(out.vm.translate(0x10ff), Some(0x17f));
        // The VM-only tail has no translation.
        assert_eq!(out.vm.translate(0x1100), None);
        assert!(out.vm.contains(0x12ff).is_some());
        assert!(out.vm.contains(0x1300).is_none());
        // File side covers only the common prefix.
        assert_eq!(out.file.translate(0x80), Some(0x1000));
        assert!(out.file.contains(0x180).is_none());
    }

    #[test]
    fn test_file_range_without_translator_stays_file_only() {
        let file = test_file();
        let munger = NameMunger::new();
        let mut out = DualMap::new();

        let mut sink = RangeSink::new(&file, DataSource::Segments, None);
        sink.add_output(&mut out, &munger);
        sink.add_file_range("[ELF Headers]", 0, 0x40).unwrap();

        assert!(out.file.contains(0x10).is_some());
        assert!(out.vm.is_empty());
    }

    #[test]
    fn test_munger_applies_per_output() {
        let file = test_file();
        let base = base_map();
        let mut munger = NameMunger::new();
        munger.add_rule(r"^(\w+)::.*", "$1").unwrap();
        let mut out = DualMap::new();

        let mut sink = RangeSink::new(&file, DataSource::Symbols, Some(&base));
        sink.add_output(&mut out, &munger);
        sink.add_vm_range(0x1000, 0x10, "zlib::inflate").unwrap();

        assert_eq!(out.vm.contains(0x1000).unwrap().label, "zlib");
    }
}
