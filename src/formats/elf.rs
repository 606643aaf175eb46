//! ELF binaries, ELF objects and `.a` archives of ELF objects.
//!
//! The base map of an executable or shared library comes from its PT_LOAD
//! program headers; object files have no segments, so their base map is
//! the section table instead. Either way, whatever the parser does not
//! claim is swept up afterwards by `[ELF Headers]` rows for the header
//! tables and an `[Unmapped]` whole-file backstop, relying on
//! first-writer-wins to keep the real labels.
//!
//! Object files pack the section index into the top bits of the VM
//! address, so the per-section address spaces of `-ffunction-sections`
//! objects (and of every member of an archive) stay disjoint.

use object::elf::{FileHeader32, FileHeader64, PF_R, PF_W, PF_X, SHF_ALLOC};
use object::read::elf::FileHeader;
use object::{
    Endianness, FileKind, Object, ObjectKind, ObjectSection, ObjectSegment, ObjectSymbol,
    SectionFlags, SegmentFlags, SymbolKind,
};

use crate::demangle::{demangle, DemangleMode};
use crate::domain::errors::ScanError;
use crate::domain::types::{DataSource, UNMAPPED_LABEL};
use crate::formats::{archive, dwarf, FileHandler};
use crate::input::InputFile;
use crate::ranges::RangeSink;

#[derive(Debug)]
pub struct ElfFileHandler<'a> {
    file: &'a InputFile,
}

impl<'a> ElfFileHandler<'a> {
    #[must_use]
    pub fn new(file: &'a InputFile) -> Self {
        Self { file }
    }
}

impl FileHandler for ElfFileHandler<'_> {
    fn process_base_map(&mut self, sink: &mut RangeSink) -> Result<(), ScanError> {
        if is_object_file(self.file.data()) {
            // Object files have no segments; sections are the next best
            // skeleton.
            read_sections(self.file, sink, ReportBy::SectionName)
        } else {
            read_segments(self.file, sink)
        }
    }

    fn process_file(&mut self, sinks: &mut [RangeSink]) -> Result<(), ScanError> {
        for sink in sinks.iter_mut() {
            match sink.data_source() {
                DataSource::Segments => read_segments(self.file, sink)?,
                DataSource::Sections => read_sections(self.file, sink, ReportBy::SectionName)?,
                DataSource::Symbols => read_symbols(self.file, sink, None)?,
                DataSource::CppSymbols => {
                    read_symbols(self.file, sink, Some(DemangleMode::Full))?;
                }
                DataSource::CppSymbolsStripped => {
                    read_symbols(self.file, sink, Some(DemangleMode::Stripped))?;
                }
                DataSource::ArchiveMembers => read_sections(self.file, sink, ReportBy::Filename)?,
                DataSource::CompileUnits => {
                    check_not_object("compileunits", self.file)?;
                    let elf = object::File::parse(self.file.data())?;
                    dwarf::read_compile_units(&elf, sink)?;
                }
                DataSource::Inlines => {
                    check_not_object("inlines", self.file)?;
                    let elf = object::File::parse(self.file.data())?;
                    dwarf::read_inlines(&elf, sink, true)?;
                }
                DataSource::InputFiles => {
                    return Err(ScanError::Internal(
                        "the synthetic inputfiles source reached a format parser".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// For object files, addresses are relative to their section. Pack the
/// section index above them: 24 bits of index, 40 bits of address.
fn to_vm_addr(addr: u64, index: u64, is_object: bool) -> u64 {
    if is_object {
        (index << 40) | addr
    } else {
        addr
    }
}

fn is_object_file(data: &[u8]) -> bool {
    match FileKind::parse(data) {
        Ok(FileKind::Archive) => true,
        Ok(FileKind::Elf32 | FileKind::Elf64) => object::File::parse(data)
            .map(|elf| elf.kind() == ObjectKind::Relocatable)
            .unwrap_or(false),
        _ => false,
    }
}

fn check_not_object(source: &'static str, file: &InputFile) -> Result<(), ScanError> {
    if is_object_file(file.data()) {
        return Err(ScanError::UnsupportedOnObjectFile { kind: source });
    }
    Ok(())
}

/// Walk every ELF in the input: the file itself, or each archive member.
///
/// `func` receives the parsed ELF, the label to report it under, the
/// running section-index base, and the `(offset, len)` of the ELF's bytes
/// within the whole file (to shift file ranges by). After each callback
/// the per-ELF backstops are added, so the callback's labels take
/// precedence.
fn for_each_elf<F>(file: &InputFile, sink: &mut RangeSink, mut func: F) -> Result<(), ScanError>
where
    F: FnMut(&object::File, &str, u64, (u64, u64), &mut RangeSink) -> Result<(), ScanError>,
{
    let data = file.data();

    if archive::is_archive(data) {
        sink.add_file_range("[AR Headers]", 0, archive::MAGIC.len() as u64)?;

        let mut index_base = 0u64;
        for member in archive::members(data, file.filename())? {
            sink.add_file_range("[AR Headers]", member.header_offset, archive::HEADER_LEN)?;
            match member.kind {
                archive::MemberKind::Normal => {
                    let slice =
                        &data[member.data_offset as usize..(member.data_offset + member.size) as usize];
                    match object::File::parse(slice) {
                        Ok(elf) => {
                            let range = (member.data_offset, member.size);
                            func(&elf, &member.name, index_base, range, sink)?;
                            add_elf_backstops(slice, member.data_offset, sink)?;
                            index_base += elf.sections().count() as u64;
                        }
                        Err(_) => {
                            sink.add_file_range(
                                "[AR Non-ELF Member File]",
                                member.data_offset,
                                member.size,
                            )?;
                        }
                    }
                }
                archive::MemberKind::SymbolTable => {
                    sink.add_file_range("[AR Symbol Table]", member.data_offset, member.size)?;
                }
                archive::MemberKind::LongNameTable => {
                    sink.add_file_range("[AR Headers]", member.data_offset, member.size)?;
                }
            }
        }
        Ok(())
    } else {
        let elf = object::File::parse(data)?;
        let name = file.display_name();
        func(&elf, &name, 0, (0, data.len() as u64), sink)?;
        add_elf_backstops(data, 0, sink)
    }
}

/// Header-table rows plus the whole-file `[Unmapped]` catch-all. Added
/// after the real rows so they only fill gaps.
fn add_elf_backstops(data: &[u8], base: u64, sink: &mut RangeSink) -> Result<(), ScanError> {
    for (offset, len) in elf_header_ranges(data)? {
        if len > 0 {
            sink.add_file_range("[ELF Headers]", base + offset, len)?;
        }
    }
    sink.add_file_range(UNMAPPED_LABEL, base, data.len() as u64)?;
    Ok(())
}

/// File ranges of the ELF header and the program/section header tables,
/// decoded for either width and endianness.
fn elf_header_ranges(data: &[u8]) -> Result<Vec<(u64, u64)>, ScanError> {
    match FileKind::parse(data) {
        Ok(FileKind::Elf32) => header_table_ranges::<FileHeader32<Endianness>>(data),
        Ok(FileKind::Elf64) => header_table_ranges::<FileHeader64<Endianness>>(data),
        _ => Ok(Vec::new()),
    }
}

fn header_table_ranges<Elf: FileHeader>(data: &[u8]) -> Result<Vec<(u64, u64)>, ScanError> {
    let header = Elf::parse(data)?;
    let endian = header.endian()?;

    let mut ranges = vec![(0u64, u64::from(header.e_ehsize(endian)))];
    let ph_size = u64::from(header.e_phentsize(endian)) * u64::from(header.e_phnum(endian));
    if ph_size > 0 {
        ranges.push((header.e_phoff(endian).into(), ph_size));
    }
    let sh_size = u64::from(header.e_shentsize(endian)) * u64::from(header.e_shnum(endian));
    if sh_size > 0 {
        ranges.push((header.e_shoff(endian).into(), sh_size));
    }
    Ok(ranges)
}

fn segment_name(p_flags: u32) -> String {
    let mut name = String::from("LOAD [");
    if p_flags & PF_R != 0 {
        name.push('R');
    }
    if p_flags & PF_W != 0 {
        name.push('W');
    }
    if p_flags & PF_X != 0 {
        name.push('X');
    }
    name.push(']');
    name
}

fn section_name_from_flags(sh_flags: u64) -> String {
    let mut name = String::from("Section [");
    if sh_flags & u64::from(SHF_ALLOC) != 0 {
        name.push('A');
    }
    if sh_flags & u64::from(object::elf::SHF_WRITE) != 0 {
        name.push('W');
    }
    if sh_flags & u64::from(object::elf::SHF_EXECINSTR) != 0 {
        name.push('X');
    }
    name.push(']');
    name
}

fn read_segments(file: &InputFile, sink: &mut RangeSink) -> Result<(), ScanError> {
    if is_object_file(file.data()) {
        // Object files have no segments, but pseudo-segments synthesised
        // from section flags give a far more readable report than hundreds
        // of -ffunction-sections sections.
        return read_sections(file, sink, ReportBy::Flags);
    }

    for_each_elf(file, sink, |elf, _name, _index_base, file_range, sink| {
        for segment in elf.segments() {
            let p_flags = match segment.flags() {
                SegmentFlags::Elf { p_flags } => p_flags,
                _ => 0,
            };
            let (fileoff, filesize) = segment.file_range();
            sink.add_range(
                &segment_name(p_flags),
                segment.address(),
                segment.size(),
                file_range.0 + fileoff,
                filesize,
            )?;
        }
        Ok(())
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReportBy {
    SectionName,
    Flags,
    Filename,
}

fn read_sections(file: &InputFile, sink: &mut RangeSink, report_by: ReportBy) -> Result<(), ScanError> {
    for_each_elf(file, sink, |elf, name, index_base, file_range, sink| {
        let is_object = elf.kind() == ObjectKind::Relocatable;

        for section in elf.sections() {
            let section_name = section.name()?;
            let sh_flags = match section.flags() {
                SectionFlags::Elf { sh_flags } => sh_flags,
                _ => 0,
            };
            let size = section.size();
            let vmsize = if sh_flags & u64::from(SHF_ALLOC) != 0 { size } else { 0 };
            let (fileoff, filesize) = match section.file_range() {
                Some((offset, len)) => (file_range.0 + offset, len),
                // SHT_NOBITS: .bss and friends occupy no file bytes.
                None => (0, 0),
            };
            let full_addr =
                to_vm_addr(section.address(), index_base + section.index().0 as u64, is_object);

            let label = match report_by {
                ReportBy::SectionName => section_name.to_string(),
                ReportBy::Flags => section_name_from_flags(sh_flags),
                ReportBy::Filename => name.to_string(),
            };
            sink.add_range(&label, full_addr, vmsize, fileoff, filesize)?;
        }

        if report_by == ReportBy::Filename {
            // Cover the parts of the member not claimed by any section.
            sink.add_file_range(name, file_range.0, file_range.1)?;
        }
        Ok(())
    })
}

fn read_symbols(
    file: &InputFile,
    sink: &mut RangeSink,
    demangle_mode: Option<DemangleMode>,
) -> Result<(), ScanError> {
    for_each_elf(file, sink, |elf, _name, index_base, _file_range, sink| {
        let is_object = elf.kind() == ObjectKind::Relocatable;

        for symbol in elf.symbols() {
            if !matches!(symbol.kind(), SymbolKind::Text | SymbolKind::Data) {
                continue;
            }
            if symbol.size() == 0 {
                continue;
            }
            let Ok(name) = symbol.name() else {
                continue;
            };
            let label = match demangle_mode {
                Some(mode) => demangle(name, mode),
                None => name.to_string(),
            };
            let section_index = symbol.section_index().map_or(0, |index| index.0 as u64);
            let full_addr = to_vm_addr(symbol.address(), index_base + section_index, is_object);
            sink.add_vm_range_allow_alias(full_addr, symbol.size(), &label)?;
        }
        Ok(())
    })
}
