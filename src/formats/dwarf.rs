//! DWARF-derived data sources: compile units and inline source lines.
//!
//! The debug sections are loaded out of the object file into gimli with
//! reference-counted buffers; both sources then walk the unit list.
//! `compileunits` attributes each byte of a unit's address ranges to the
//! unit name; `inlines` walks the line programs and attributes the bytes
//! between consecutive rows to `path:line` labels.

use std::borrow::Cow;
use std::rc::Rc;

use gimli::{EndianRcSlice, Reader as _, RunTimeEndian};
use object::{Object, ObjectSection};

use crate::domain::errors::ScanError;
use crate::ranges::RangeSink;

type Reader = EndianRcSlice<RunTimeEndian>;

fn load_dwarf(elf: &object::File) -> Result<gimli::Dwarf<Reader>, ScanError> {
    let endian = if elf.is_little_endian() {
        RunTimeEndian::Little
    } else {
        RunTimeEndian::Big
    };

    let load_section = |id: gimli::SectionId| -> Result<Reader, gimli::Error> {
        let data = elf
            .section_by_name(id.name())
            .and_then(|section| section.uncompressed_data().ok())
            .unwrap_or(Cow::Borrowed(&[][..]));
        Ok(EndianRcSlice::new(Rc::from(&*data), endian))
    };

    Ok(gimli::Dwarf::load(load_section)?)
}

/// Attribute every byte of each compile unit's address ranges to the
/// unit's name.
///
/// # Errors
/// Malformed DWARF, or range insertion failure.
pub fn read_compile_units(elf: &object::File, sink: &mut RangeSink) -> Result<(), ScanError> {
    let dwarf = load_dwarf(elf)?;

    let mut units = dwarf.units();
    while let Some(header) = units.next()? {
        let unit = dwarf.unit(header)?;
        let Some(name) = &unit.name else {
            continue;
        };
        let name = name.to_string_lossy()?.into_owned();

        let mut ranges = dwarf.unit_ranges(&unit)?;
        while let Some(range) = ranges.next()? {
            if range.end <= range.begin {
                continue;
            }
            sink.add_vm_range(range.begin, range.end - range.begin, &name)?;
        }
    }
    Ok(())
}

/// Attribute bytes to the source file (and line, when `include_line`)
/// that produced them, from the line programs.
///
/// The same line routinely claims ranges that a function from another
/// file also claims (inlining), hence the duplicate-tolerant adder.
///
/// # Errors
/// Malformed DWARF, or range insertion failure.
pub fn read_inlines(
    elf: &object::File,
    sink: &mut RangeSink,
    include_line: bool,
) -> Result<(), ScanError> {
    let dwarf = load_dwarf(elf)?;

    let mut units = dwarf.units();
    while let Some(header) = units.next()? {
        let unit = dwarf.unit(header)?;
        let Some(program) = unit.line_program.clone() else {
            continue;
        };

        let mut rows = program.rows();
        let mut previous: Option<(u64, String)> = None;
        while let Some((header, row)) = rows.next_row()? {
            if let Some((start, label)) = previous.take() {
                if row.address() > start {
                    sink.add_vm_range_ignore_duplicate(start, row.address() - start, &label)?;
                }
            }
            if row.end_sequence() {
                continue;
            }

            let path = row_file_path(&dwarf, &unit, header, row)?;
            let label = if include_line {
                let line = row.line().map_or(0, std::num::NonZeroU64::get);
                format!("{path}:{line}")
            } else {
                path
            };
            previous = Some((row.address(), label));
        }
    }
    Ok(())
}

fn row_file_path(
    dwarf: &gimli::Dwarf<Reader>,
    unit: &gimli::Unit<Reader>,
    header: &gimli::LineProgramHeader<Reader>,
    row: &gimli::LineRow,
) -> Result<String, ScanError> {
    let Some(file) = row.file(header) else {
        return Ok("<unknown>".to_string());
    };

    let mut path = String::new();
    if let Some(directory) = file.directory(header) {
        let directory = dwarf.attr_string(unit, directory)?;
        let directory = directory.to_string_lossy()?;
        if !directory.is_empty() {
            path.push_str(&directory);
            if !directory.ends_with('/') {
                path.push('/');
            }
        }
    }
    let name = dwarf.attr_string(unit, file.path_name())?;
    path.push_str(&name.to_string_lossy()?);
    Ok(path)
}
