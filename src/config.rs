//! Run options and the textual options-file loader.
//!
//! The `-c` file is a small line-oriented document: `key: value` entries
//! plus nested `custom_data_source { ... }` blocks defining rewritten
//! copies of the built-in data sources:
//!
//! ```text
//! filename: "a.out"
//! base_filename: "a.out.old"
//! data_source: "sections"
//! max_rows_per_level: 30
//! sort_by: "vm"
//! custom_data_source {
//!   name: "packages"
//!   base_data_source: "compileunits"
//!   rewrite {
//!     pattern: "^third_party/(\\w+)"
//!     replacement: "$1"
//!   }
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::errors::ConfigError;
use crate::domain::types::SortBy;

/// Everything that controls a run, merged from the options file and the
/// command line before any scanning starts.
#[derive(Debug)]
pub struct Options {
    pub filenames: Vec<PathBuf>,
    pub base_filenames: Vec<PathBuf>,
    pub data_sources: Vec<String>,
    pub custom_sources: Vec<CustomSource>,
    /// Rows kept per level before collapsing into `[Other]`; 0 = unlimited.
    pub max_rows_per_level: usize,
    pub sort_by: SortBy,
    pub verbose_level: u8,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            filenames: Vec::new(),
            base_filenames: Vec::new(),
            data_sources: Vec::new(),
            custom_sources: Vec::new(),
            max_rows_per_level: 20,
            sort_by: SortBy::Both,
            verbose_level: 0,
        }
    }
}

/// A user-defined data source: a built-in base plus label rewrites.
#[derive(Debug, Clone)]
pub struct CustomSource {
    pub name: String,
    pub base_source: String,
    /// (pattern, replacement) pairs, applied first-match-wins.
    pub rewrites: Vec<(String, String)>,
}

/// Merge the options file at `path` into `options`.
///
/// # Errors
/// I/O failure, or a `ConfigError::Parse` naming the offending line.
pub fn merge_file(options: &mut Options, path: &Path) -> Result<(), ConfigError> {
    let text = fs::read_to_string(path)?;
    merge_text(options, path, &text)
}

fn merge_text(options: &mut Options, path: &Path, text: &str) -> Result<(), ConfigError> {
    let mut parser = Parser {
        file: path,
        lines: text.lines().enumerate(),
    };
    parser.parse_top_level(options)
}

struct Parser<'a> {
    file: &'a Path,
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

/// One meaningful line: either `key: value`, `key {`, or `}`.
enum Line<'a> {
    Entry { key: &'a str, value: &'a str },
    BlockStart { key: &'a str },
    BlockEnd,
}

impl<'a> Parser<'a> {
    fn error(&self, line: usize, message: impl Into<String>) -> ConfigError {
        ConfigError::Parse {
            file: self.file.to_path_buf(),
            line: line + 1,
            message: message.into(),
        }
    }

    fn next_line(&mut self) -> Option<Result<(usize, Line<'a>), ConfigError>> {
        for (number, raw) in self.lines.by_ref() {
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            if text == "}" {
                return Some(Ok((number, Line::BlockEnd)));
            }
            if let Some(key) = text.strip_suffix('{') {
                return Some(Ok((number, Line::BlockStart { key: key.trim() })));
            }
            let Some((key, value)) = text.split_once(':') else {
                return Some(Err(self.error(number, format!("expected 'key: value', got '{text}'"))));
            };
            return Some(Ok((
                number,
                Line::Entry {
                    key: key.trim(),
                    value: value.trim(),
                },
            )));
        }
        None
    }

    fn parse_top_level(&mut self, options: &mut Options) -> Result<(), ConfigError> {
        while let Some(line) = self.next_line() {
            let (number, line) = line?;
            match line {
                Line::Entry { key: "filename", value } => {
                    options.filenames.push(PathBuf::from(self.string_value(number, value)?));
                }
                Line::Entry { key: "base_filename", value } => {
                    options
                        .base_filenames
                        .push(PathBuf::from(self.string_value(number, value)?));
                }
                Line::Entry { key: "data_source", value } => {
                    options.data_sources.push(self.string_value(number, value)?);
                }
                Line::Entry { key: "max_rows_per_level", value } => {
                    options.max_rows_per_level = value
                        .parse()
                        .map_err(|_| self.error(number, format!("invalid row count '{value}'")))?;
                }
                Line::Entry { key: "sort_by", value } => {
                    options.sort_by = match self.string_value(number, value)?.as_str() {
                        "vm" => SortBy::Vm,
                        "file" => SortBy::File,
                        "both" => SortBy::Both,
                        other => {
                            return Err(self.error(number, format!("unknown sort_by '{other}'")))
                        }
                    };
                }
                Line::Entry { key: "verbose_level", value } => {
                    options.verbose_level = value
                        .parse()
                        .map_err(|_| self.error(number, format!("invalid verbosity '{value}'")))?;
                }
                Line::BlockStart { key: "custom_data_source" } => {
                    let custom = self.parse_custom_source(number)?;
                    options.custom_sources.push(custom);
                }
                Line::Entry { key, .. } | Line::BlockStart { key } => {
                    return Err(self.error(number, format!("unknown option '{key}'")));
                }
                Line::BlockEnd => {
                    return Err(self.error(number, "unmatched '}'"));
                }
            }
        }
        Ok(())
    }

    fn parse_custom_source(&mut self, start: usize) -> Result<CustomSource, ConfigError> {
        let mut name = None;
        let mut base_source = None;
        let mut rewrites = Vec::new();

        loop {
            let Some(line) = self.next_line() else {
                return Err(self.error(start, "unterminated custom_data_source block"));
            };
            let (number, line) = line?;
            match line {
                Line::BlockEnd => break,
                Line::Entry { key: "name", value } => {
                    name = Some(self.string_value(number, value)?);
                }
                Line::Entry { key: "base_data_source", value } => {
                    base_source = Some(self.string_value(number, value)?);
                }
                Line::BlockStart { key: "rewrite" } => {
                    rewrites.push(self.parse_rewrite(number)?);
                }
                Line::Entry { key, .. } | Line::BlockStart { key } => {
                    return Err(self.error(number, format!("unknown custom_data_source field '{key}'")));
                }
            }
        }

        let name = name.ok_or_else(|| self.error(start, "custom_data_source needs a name"))?;
        let base_source = base_source
            .ok_or_else(|| self.error(start, "custom_data_source needs a base_data_source"))?;
        Ok(CustomSource {
            name,
            base_source,
            rewrites,
        })
    }

    fn parse_rewrite(&mut self, start: usize) -> Result<(String, String), ConfigError> {
        let mut pattern = None;
        let mut replacement = None;

        loop {
            let Some(line) = self.next_line() else {
                return Err(self.error(start, "unterminated rewrite block"));
            };
            let (number, line) = line?;
            match line {
                Line::BlockEnd => break,
                Line::Entry { key: "pattern", value } => {
                    pattern = Some(self.string_value(number, value)?);
                }
                Line::Entry { key: "replacement", value } => {
                    replacement = Some(self.string_value(number, value)?);
                }
                Line::Entry { key, .. } | Line::BlockStart { key } => {
                    return Err(self.error(number, format!("unknown rewrite field '{key}'")));
                }
            }
        }

        let pattern = pattern.ok_or_else(|| self.error(start, "rewrite needs a pattern"))?;
        let replacement =
            replacement.ok_or_else(|| self.error(start, "rewrite needs a replacement"))?;
        Ok((pattern, replacement))
    }

    /// Values are double-quoted strings with `\"` and `\\` escapes; bare
    /// words are accepted too.
    fn string_value(&self, number: usize, value: &str) -> Result<String, ConfigError> {
        let Some(inner) = value.strip_prefix('"') else {
            if value.is_empty() {
                return Err(self.error(number, "expected a value"));
            }
            return Ok(value.to_string());
        };
        let Some(inner) = inner.strip_suffix('"') else {
            return Err(self.error(number, "unterminated string"));
        };

        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(ch) = chars.next() {
            if ch != '\\' {
                out.push(ch);
                continue;
            }
            match chars.next() {
                Some('\\') => out.push('\\'),
                Some('"') => out.push('"'),
                Some(other) => {
                    // Keep unknown escapes as written: regex patterns are
                    // full of backslashes the user did not mean for us.
                    out.push('\\');
                    out.push(other);
                }
                None => return Err(self.error(number, "dangling escape at end of string")),
            }
        }
        Ok(out)
    }
}
