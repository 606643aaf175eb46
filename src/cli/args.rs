//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::domain::types::SortBy;

fn parse_sort_by(value: &str) -> Result<SortBy, String> {
    match value {
        "vm" => Ok(SortBy::Vm),
        "file" => Ok(SortBy::File),
        "both" => Ok(SortBy::Both),
        other => Err(format!("unknown sort key '{other}' (expected vm, file or both)")),
    }
}

#[derive(Parser)]
#[command(
    name = "size-scope",
    version,
    about = "Size profiler for compiled binaries",
    after_help = "Baseline files given after `--` turn the report into a diff:\n  \
                  size-scope -d sections,symbols new.bin -- old.bin"
)]
pub struct Args {
    /// Input files to profile
    #[arg(value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Baseline files to diff against
    #[arg(last = true, value_name = "BASE_FILE")]
    pub base_files: Vec<PathBuf>,

    /// Output CSV instead of the human-readable table
    #[arg(long)]
    pub csv: bool,

    /// Load options from a file
    #[arg(short = 'c', value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Comma-separated list of data sources to scan (see --list-sources)
    #[arg(short = 'd', value_name = "SOURCES", value_delimiter = ',')]
    pub data_sources: Vec<String>,

    /// Rows to show per level before collapsing into [Other] (0 = unlimited)
    #[arg(short = 'n', value_name = "NUM")]
    pub max_rows: Option<usize>,

    /// Sort by "vm", "file", or "both" = max(vm, file)
    #[arg(short = 's', value_name = "SORTBY", value_parser = parse_sort_by)]
    pub sort_by: Option<SortBy>,

    /// Verbose output; repeat for overlap warnings (-vv) and per-range
    /// tracing (-vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Wide output; don't truncate long labels
    #[arg(short = 'w')]
    pub wide: bool,

    /// List available data sources and exit
    #[arg(long)]
    pub list_sources: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_files_after_separator() {
        let args = Args::parse_from(["size-scope", "new.bin", "--", "old.bin", "older.bin"]);
        assert_eq!(args.files, vec![PathBuf::from("new.bin")]);
        assert_eq!(
            args.base_files,
            vec![PathBuf::from("old.bin"), PathBuf::from("older.bin")]
        );
    }

    #[test]
    fn test_comma_separated_sources() {
        let args = Args::parse_from(["size-scope", "-d", "sections,symbols", "a.out"]);
        assert_eq!(args.data_sources, vec!["sections", "symbols"]);
    }

    #[test]
    fn test_verbosity_counts() {
        let args = Args::parse_from(["size-scope", "-vvv", "a.out"]);
        assert_eq!(args.verbose, 3);
    }

    #[test]
    fn test_sort_by_values() {
        let args = Args::parse_from(["size-scope", "-s", "vm", "a.out"]);
        assert_eq!(args.sort_by, Some(SortBy::Vm));
        assert!(Args::try_parse_from(["size-scope", "-s", "sideways", "a.out"]).is_err());
    }
}
