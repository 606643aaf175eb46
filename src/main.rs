//! size-scope entry point: merge options, scan, print.

use std::io::{self, Write};

use anyhow::Result;
use clap::Parser;

use size_scope::cli::Args;
use size_scope::config::{self, Options};
use size_scope::domain::errors::ConfigError;
use size_scope::domain::types::{set_verbose_level, DATA_SOURCES};
use size_scope::rollup::{OutputFormat, OutputOptions, RollupOutput};
use size_scope::scan::Profiler;

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_sources {
        for definition in DATA_SOURCES {
            println!("{:<15} {}", definition.name, definition.description);
        }
        return Ok(());
    }

    // Options file first, command line on top.
    let mut options = Options::default();
    if let Some(path) = &args.config {
        config::merge_file(&mut options, path)?;
    }
    options.filenames.extend(args.files.iter().cloned());
    options.base_filenames.extend(args.base_files.iter().cloned());
    options.data_sources.extend(args.data_sources.iter().cloned());
    if let Some(max_rows) = args.max_rows {
        options.max_rows_per_level = max_rows;
    }
    if let Some(sort_by) = args.sort_by {
        options.sort_by = sort_by;
    }
    if args.verbose > 0 {
        options.verbose_level = args.verbose;
    }
    if options.data_sources.is_empty() {
        options.data_sources.push("sections".to_string());
    }
    if options.filenames.is_empty() {
        return Err(ConfigError::NoInputFiles.into());
    }

    set_verbose_level(options.verbose_level);
    let log_level = match options.verbose_level {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut profiler = Profiler::new();
    for custom in &options.custom_sources {
        profiler.define_custom_source(custom)?;
    }
    for name in &options.data_sources {
        profiler.add_data_source(name)?;
    }

    let mut output = RollupOutput::new();
    profiler.scan_and_rollup(&options, &mut output)?;

    let output_options = OutputOptions {
        format: if args.csv {
            OutputFormat::Csv
        } else {
            OutputFormat::PrettyPrint
        },
        max_label_len: if args.wide { usize::MAX } else { 80 },
    };
    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    output.print(&output_options, &mut stdout)?;
    stdout.flush()?;

    Ok(())
}
