//! Per-file scanning and multi-file rollup orchestration.
//!
//! For each input file the flow is:
//!
//! ```text
//! format parser ──▶ base RangeSink ──▶ base DualMap (the translator)
//! format parser ──▶ source sinks  ──▶ one DualMap per selected source
//!                                          │
//!            RangeMap::compute_rollup over the N VM maps,
//!            then over the N file maps
//!                                          │
//!                                          ▼
//!                                       Rollup
//! ```
//!
//! The base map is always populated first; data sources translate through
//! it and, thanks to first-writer-wins insertion, can only claim bytes the
//! base map structure allows them to.

use std::collections::BTreeMap;

use anyhow::{Context, Result};

use crate::config::{CustomSource, Options};
use crate::domain::errors::ConfigError;
use crate::domain::types::{verbose_level, DataSource, DATA_SOURCES, NO_LABEL};
use crate::formats;
use crate::input::InputFile;
use crate::ranges::{DualMap, NameMunger, RangeMap, RangeSink};
use crate::rollup::{Rollup, RollupOutput};

/// A data source as configured for this run: a kind, a display name, and
/// the label rewrites to apply (empty for built-ins).
struct ConfiguredSource {
    kind: DataSource,
    munger: NameMunger,
}

/// The profiler: data-source registry plus the scan-and-rollup driver.
pub struct Profiler {
    /// Built-in and custom sources, by name.
    known_sources: BTreeMap<String, ConfiguredSource>,
    /// Names the user selected, in order (the synthetic `inputfiles`
    /// source is tracked by `filename_position` instead).
    selected: Vec<String>,
    /// Where to splice the filename into the key tuple; -1 when the
    /// `inputfiles` source was not selected.
    filename_position: isize,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Profiler {
    #[must_use]
    pub fn new() -> Self {
        let mut known_sources = BTreeMap::new();
        for definition in DATA_SOURCES {
            if definition.kind == DataSource::InputFiles {
                continue;
            }
            known_sources.insert(
                definition.name.to_string(),
                ConfiguredSource {
                    kind: definition.kind,
                    munger: NameMunger::new(),
                },
            );
        }
        Self {
            known_sources,
            selected: Vec::new(),
            filename_position: -1,
        }
    }

    /// Register a custom data source: a copy of a built-in with a
    /// populated munger.
    ///
    /// # Errors
    /// Unknown base source, a custom source based on another custom
    /// source, or an invalid rewrite pattern.
    pub fn define_custom_source(&mut self, custom: &CustomSource) -> Result<(), ConfigError> {
        let base = self
            .known_sources
            .get(&custom.base_source)
            .ok_or_else(|| ConfigError::UnknownDataSource(custom.base_source.clone()))?;
        if !base.munger.is_empty() {
            return Err(ConfigError::CustomSourceOnCustomSource {
                name: custom.name.clone(),
                base: custom.base_source.clone(),
            });
        }

        let kind = base.kind;
        let mut munger = NameMunger::new();
        for (pattern, replacement) in &custom.rewrites {
            munger.add_rule(pattern, replacement)?;
        }
        self.known_sources
            .insert(custom.name.clone(), ConfiguredSource { kind, munger });
        Ok(())
    }

    /// Select a data source by name, in report order.
    ///
    /// # Errors
    /// `ConfigError::UnknownDataSource`.
    pub fn add_data_source(&mut self, name: &str) -> Result<(), ConfigError> {
        if name == "inputfiles" {
            // Synthetic: position the filename after the sources selected
            // so far (offset by one for the base map).
            self.filename_position = self.selected.len() as isize + 1;
            return Ok(());
        }
        if !self.known_sources.contains_key(name) {
            return Err(ConfigError::UnknownDataSource(name.to_string()));
        }
        self.selected.push(name.to_string());
        Ok(())
    }

    /// Scan every input file into one rollup (and base files into a
    /// second), then collapse into `output`.
    ///
    /// # Errors
    /// Any scan failure, reported with the offending filename.
    pub fn scan_and_rollup(
        &self,
        options: &Options,
        output: &mut RollupOutput,
    ) -> Result<()> {
        // CSV/report header: selection order, with the synthetic
        // inputfiles column at its position.
        for (index, name) in self.selected.iter().enumerate() {
            if self.filename_position == index as isize + 1 {
                output.add_source_name("inputfiles");
            }
            output.add_source_name(name);
        }
        if self.filename_position == self.selected.len() as isize + 1 {
            output.add_source_name("inputfiles");
        }

        let mut rollup = Rollup::new();
        for filename in &options.filenames {
            let file = InputFile::open(filename)?;
            self.scan_file(&file, &mut rollup)
                .with_context(|| format!("failed to scan '{}'", filename.display()))?;
        }

        if options.base_filenames.is_empty() {
            rollup.create_output(options, output)?;
        } else {
            let mut base = Rollup::new();
            for filename in &options.base_filenames {
                let file = InputFile::open(filename)?;
                self.scan_file(&file, &mut base)
                    .with_context(|| format!("failed to scan base '{}'", filename.display()))?;
            }
            rollup.subtract(&base);
            rollup.create_diff_output(&base, options, output)?;
        }
        Ok(())
    }

    fn scan_file(&self, file: &InputFile, rollup: &mut Rollup) -> Result<()> {
        let mut handler = formats::try_open_file(file)?;

        let mut maps: Vec<DualMap> = Vec::with_capacity(self.selected.len() + 1);
        maps.push(DualMap::new());
        for _ in &self.selected {
            maps.push(DualMap::new());
        }

        // Phase one: the base map, with no translator.
        let empty_munger = NameMunger::new();
        {
            let mut sink = RangeSink::new(file, DataSource::Segments, None);
            sink.add_output(&mut maps[0], &empty_munger);
            handler.process_base_map(&mut sink)?;
        }
        // File bytes no segment claims still exist on disk.
        maps[0]
            .file
            .add(0, file.data().len() as u64, NO_LABEL)?;

        // Phase two: every selected source, translating through the base.
        {
            let (base, rest) = maps.split_at_mut(1);
            let base = &base[0];
            let mut sinks: Vec<RangeSink> = Vec::with_capacity(rest.len());
            for (map, name) in rest.iter_mut().zip(&self.selected) {
                let source = &self.known_sources[name];
                let mut sink = RangeSink::new(file, source.kind, Some(base));
                sink.add_output(map, &source.munger);
                sinks.push(sink);
            }
            handler.process_file(&mut sinks)?;
        }

        let filename = file.display_name();
        let vm_maps: Vec<&RangeMap> = maps.iter().map(|m| &m.vm).collect();
        RangeMap::compute_rollup(
            &vm_maps,
            &filename,
            self.filename_position,
            |keys, start, end| rollup.add_sizes(&keys[1..], end - start, true),
        )?;
        let file_maps: Vec<&RangeMap> = maps.iter().map(|m| &m.file).collect();
        RangeMap::compute_rollup(
            &file_maps,
            &filename,
            self.filename_position,
            |keys, start, end| rollup.add_sizes(&keys[1..], end - start, false),
        )?;

        if verbose_level() > 0 {
            eprintln!("FILE MAP ({filename}):");
            print_maps(&file_maps, &filename, self.filename_position);
            eprintln!("VM MAP ({filename}):");
            print_maps(&vm_maps, &filename, self.filename_position);
        }

        Ok(())
    }
}

/// Dump a set of maps as breakpoint rows, flagging uncovered gaps.
fn print_maps(maps: &[&RangeMap], filename: &str, filename_position: isize) {
    let mut last = 0u64;
    let _ = RangeMap::compute_rollup(maps, filename, filename_position, |keys, start, end| {
        if start > last {
            eprintln!("[{last:x}, {start:x}] NO ENTRY");
        }
        eprintln!("[{start:x}, {end:x}] {}", keys.join(", "));
        last = end;
        Ok(())
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CustomSource;

    #[test]
    fn test_unknown_source_rejected() {
        let mut profiler = Profiler::new();
        let err = profiler.add_data_source("nosuchsource").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownDataSource(_)));
    }

    #[test]
    fn test_builtin_sources_selectable() {
        let mut profiler = Profiler::new();
        for name in ["segments", "sections", "symbols", "compileunits", "inlines"] {
            profiler.add_data_source(name).unwrap();
        }
    }

    #[test]
    fn test_inputfiles_sets_filename_position() {
        let mut profiler = Profiler::new();
        profiler.add_data_source("sections").unwrap();
        profiler.add_data_source("inputfiles").unwrap();
        profiler.add_data_source("symbols").unwrap();
        assert_eq!(profiler.filename_position, 2);
        assert_eq!(profiler.selected, vec!["sections", "symbols"]);
    }

    #[test]
    fn test_custom_source_on_custom_source_rejected() {
        let mut profiler = Profiler::new();
        profiler
            .define_custom_source(&CustomSource {
                name: "first".to_string(),
                base_source: "compileunits".to_string(),
                rewrites: vec![("^(a)".to_string(), "$1".to_string())],
            })
            .unwrap();
        let err = profiler
            .define_custom_source(&CustomSource {
                name: "second".to_string(),
                base_source: "first".to_string(),
                rewrites: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, ConfigError::CustomSourceOnCustomSource { .. }));
    }

    #[test]
    fn test_custom_source_selectable_by_name() {
        let mut profiler = Profiler::new();
        profiler
            .define_custom_source(&CustomSource {
                name: "packages".to_string(),
                base_source: "compileunits".to_string(),
                rewrites: vec![("^third_party/(\\w+)".to_string(), "$1".to_string())],
            })
            .unwrap();
        profiler.add_data_source("packages").unwrap();
        assert_eq!(profiler.selected, vec!["packages"]);
    }
}
