//! Core domain types: data sources, sort order, synthetic labels, verbosity.

use std::sync::atomic::{AtomicU8, Ordering};

/// A labelling strategy that a format parser can populate.
///
/// Each selected source contributes one `DualMap` per input file; the
/// hierarchy depth of the final report equals the number of selected
/// sources (plus the synthetic `inputfiles` position, if selected).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// The `.o` members inside a `.a` archive.
    ArchiveMembers,
    /// Demangled symbols.
    CppSymbols,
    /// Demangled symbols with parameter lists stripped.
    CppSymbolsStripped,
    /// DWARF compile unit owning each byte. Requires debug info.
    CompileUnits,
    /// DWARF source line/file owning each byte. Requires debug info.
    Inlines,
    /// Object file sections.
    Sections,
    /// Load-command-level regions (ELF program headers).
    Segments,
    /// Symbol table entries (functions and data objects).
    Symbols,
    /// Synthetic: the filename passed on the command line. Never reaches
    /// a format parser; the scan layer splices it into the key tuple.
    InputFiles,
}

/// One row of the data-source registry shown by `--list-sources`.
pub struct DataSourceDefinition {
    pub kind: DataSource,
    pub name: &'static str,
    pub description: &'static str,
}

/// All built-in data sources, indexed by CLI name.
pub const DATA_SOURCES: &[DataSourceDefinition] = &[
    DataSourceDefinition {
        kind: DataSource::ArchiveMembers,
        name: "armembers",
        description: "the .o files in a .a file",
    },
    DataSourceDefinition {
        kind: DataSource::CppSymbols,
        name: "cppsymbols",
        description: "demangled symbols",
    },
    DataSourceDefinition {
        kind: DataSource::CppSymbolsStripped,
        name: "cppxsyms",
        description: "demangled symbols, stripped to remove function parameters",
    },
    DataSourceDefinition {
        kind: DataSource::CompileUnits,
        name: "compileunits",
        description: "source file for the .o file (translation unit). requires debug info",
    },
    DataSourceDefinition {
        kind: DataSource::InputFiles,
        name: "inputfiles",
        description: "the filename specified on the command line",
    },
    DataSourceDefinition {
        kind: DataSource::Inlines,
        name: "inlines",
        description: "source line/file where inlined code came from. requires debug info",
    },
    DataSourceDefinition {
        kind: DataSource::Sections,
        name: "sections",
        description: "object file section",
    },
    DataSourceDefinition {
        kind: DataSource::Segments,
        name: "segments",
        description: "load commands in the binary",
    },
    DataSourceDefinition {
        kind: DataSource::Symbols,
        name: "symbols",
        description: "symbols from symbol table",
    },
];

/// CLI name of a data source, for diagnostics.
#[must_use]
pub fn source_label(kind: DataSource) -> &'static str {
    DATA_SOURCES
        .iter()
        .find(|def| def.kind == kind)
        .map_or("<unknown>", |def| def.name)
}

/// Which size column drives row ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    Vm,
    File,
    /// Rank by `max(|vm|, |file|)`.
    #[default]
    Both,
}

/// Label for an address range that a particular source did not cover.
pub const NO_LABEL: &str = "[None]";

/// Label holding the sum of rows dropped by the per-level row limit.
pub const OTHERS_LABEL: &str = "[Other]";

/// Label for file bytes that no segment covers.
pub const UNMAPPED_LABEL: &str = "[Unmapped]";

/// Process-wide verbosity, set once from the options at startup and only
/// read afterwards. A global avoids plumbing the level through every
/// range-insertion call stack.
static VERBOSE_LEVEL: AtomicU8 = AtomicU8::new(0);

pub fn set_verbose_level(level: u8) {
    VERBOSE_LEVEL.store(level, Ordering::Relaxed);
}

#[must_use]
pub fn verbose_level() -> u8 {
    VERBOSE_LEVEL.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_label_round_trip() {
        for def in DATA_SOURCES {
            assert_eq!(source_label(def.kind), def.name);
        }
    }

    #[test]
    fn test_registry_names_are_unique() {
        let mut names: Vec<&str> = DATA_SOURCES.iter().map(|d| d.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), DATA_SOURCES.len());
    }
}
