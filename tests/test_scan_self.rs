//! End-to-end scans of this crate's own compiled binary.

#![cfg(target_os = "linux")]

use std::path::PathBuf;

use size_scope::config::Options;
use size_scope::rollup::{OutputFormat, OutputOptions, RollupOutput};
use size_scope::scan::Profiler;

fn own_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_size-scope"))
}

fn scan(sources: &[&str]) -> RollupOutput {
    let mut profiler = Profiler::new();
    for source in sources {
        profiler.add_data_source(source).expect("valid source");
    }

    let options = Options {
        filenames: vec![own_binary()],
        data_sources: sources.iter().map(|s| s.to_string()).collect(),
        ..Options::default()
    };

    let mut output = RollupOutput::new();
    profiler
        .scan_and_rollup(&options, &mut output)
        .expect("scan should succeed on our own binary");
    output
}

#[test]
fn test_sections_scan_accounts_for_every_file_byte() {
    let output = scan(&["sections"]);
    let root = output.toplevel_row();

    let on_disk = std::fs::metadata(own_binary()).unwrap().len() as i64;
    assert_eq!(root.filesize, on_disk);
    assert!(root.vmsize > 0);
    assert!(!root.sorted_children.is_empty());
}

#[test]
fn test_sections_scan_finds_text_section() {
    let output = scan(&["sections"]);
    let names: Vec<&str> = output
        .toplevel_row()
        .sorted_children
        .iter()
        .map(|row| row.name.as_str())
        .collect();
    assert!(
        names.iter().any(|name| *name == ".text"),
        "expected .text among sections, got {names:?}"
    );
}

#[test]
fn test_segments_scan_has_load_rows() {
    let output = scan(&["segments"]);
    assert!(output
        .toplevel_row()
        .sorted_children
        .iter()
        .any(|row| row.name.starts_with("LOAD [")));
}

#[test]
fn test_two_level_hierarchy_nests_symbols_in_sections() {
    let output = scan(&["sections", "symbols"]);
    let root = output.toplevel_row();

    // Children sum to the parent at the top level.
    let vm_sum: i64 = root.sorted_children.iter().map(|row| row.vmsize).sum();
    assert_eq!(vm_sum, root.vmsize);

    // At least one section breaks down into symbol rows.
    assert!(root
        .sorted_children
        .iter()
        .any(|row| !row.sorted_children.is_empty()));
}

#[test]
fn test_csv_output_shape() {
    let output = scan(&["sections"]);
    let mut buffer = Vec::new();
    output
        .print(
            &OutputOptions {
                format: OutputFormat::Csv,
                ..OutputOptions::default()
            },
            &mut buffer,
        )
        .unwrap();

    let text = String::from_utf8(buffer).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("sections,vmsize,filesize"));
    let first_row = lines.next().expect("at least one data row");
    assert_eq!(first_row.split(',').count(), 3);
}

#[test]
fn test_diff_against_self_is_empty() {
    let mut profiler = Profiler::new();
    profiler.add_data_source("sections").unwrap();

    let options = Options {
        filenames: vec![own_binary()],
        base_filenames: vec![own_binary()],
        data_sources: vec!["sections".to_string()],
        ..Options::default()
    };

    let mut output = RollupOutput::new();
    profiler.scan_and_rollup(&options, &mut output).unwrap();
    let root = output.toplevel_row();

    assert!(root.diff_mode);
    assert_eq!(root.vmsize, 0);
    assert_eq!(root.filesize, 0);
    assert!(root.sorted_children.is_empty());
    assert!(root.shrinking.is_empty());
    assert!(root.mixed.is_empty());
}

#[test]
fn test_inputfiles_source_adds_filename_level() {
    let output = scan(&["inputfiles", "sections"]);
    let root = output.toplevel_row();

    assert_eq!(root.sorted_children.len(), 1);
    let file_row = &root.sorted_children[0];
    assert!(file_row.name.ends_with("size-scope"), "{}", file_row.name);
    assert!(!file_row.sorted_children.is_empty());
}
