//! Collapsed rollup rows and the two renderers.
//!
//! `RollupOutput` is the rollup after output massaging: excess rows folded
//! into `[Other]`, everything sorted, percentages attached. From here the
//! data can be pretty-printed as an indented tree or dumped as CSV with
//! one line per leaf path.

// Size rendering intentionally converts i64 byte counts to f64
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use std::io::{self, Write};

/// One presentable row. In diff mode the three child vectors partition the
/// children by sign: `sorted_children` holds entries that grew, and the
/// `shrinking`/`mixed` vectors the rest. Outside diff mode only
/// `sorted_children` is populated.
#[derive(Debug, Clone)]
pub struct RollupRow {
    pub name: String,
    pub vmsize: i64,
    pub filesize: i64,
    pub vmpercent: f64,
    pub filepercent: f64,
    pub diff_mode: bool,
    pub sorted_children: Vec<RollupRow>,
    pub shrinking: Vec<RollupRow>,
    pub mixed: Vec<RollupRow>,
}

impl RollupRow {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vmsize: 0,
            filesize: 0,
            vmpercent: 0.0,
            filepercent: 0.0,
            diff_mode: false,
            sorted_children: Vec::new(),
            shrinking: Vec::new(),
            mixed: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    PrettyPrint,
    Csv,
}

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: OutputFormat,
    /// Labels longer than this are truncated in the pretty printer.
    pub max_label_len: usize,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            format: OutputFormat::PrettyPrint,
            max_label_len: 80,
        }
    }
}

/// The finished report: a `TOTAL` root row plus the ordered names of the
/// selected data sources (the CSV header).
#[derive(Debug)]
pub struct RollupOutput {
    toplevel_row: RollupRow,
    source_names: Vec<String>,
}

impl Default for RollupOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl RollupOutput {
    #[must_use]
    pub fn new() -> Self {
        Self {
            toplevel_row: RollupRow::new("TOTAL"),
            source_names: Vec::new(),
        }
    }

    pub fn add_source_name(&mut self, name: &str) {
        self.source_names.push(name.to_string());
    }

    #[must_use]
    pub fn toplevel_row(&self) -> &RollupRow {
        &self.toplevel_row
    }

    pub(crate) fn toplevel_row_mut(&mut self) -> &mut RollupRow {
        &mut self.toplevel_row
    }

    /// Render the report in the requested format.
    ///
    /// # Errors
    /// Propagates write failures.
    pub fn print(&self, options: &OutputOptions, out: &mut dyn Write) -> io::Result<()> {
        match options.format {
            OutputFormat::PrettyPrint => self.pretty_print(options.max_label_len, out),
            OutputFormat::Csv => self.print_csv(out),
        }
    }

    fn pretty_print(&self, max_label_len: usize, out: &mut dyn Write) -> io::Result<()> {
        let row = &self.toplevel_row;
        let mut longest_label = row.name.len();
        for child in row
            .sorted_children
            .iter()
            .chain(&row.shrinking)
            .chain(&row.mixed)
        {
            longest_label = longest_label.max(longest_label_in(child, 0));
        }
        let longest_label = longest_label.min(max_label_len);

        writeln!(
            out,
            "     VM SIZE    {}    FILE SIZE",
            " ".repeat(longest_label)
        )?;
        if row.diff_mode {
            writeln!(
                out,
                " ++++++++++++++ {} ++++++++++++++",
                fixed_width("GROWING", longest_label)
            )?;
        } else {
            writeln!(
                out,
                " -------------- {} --------------",
                " ".repeat(longest_label)
            )?;
        }

        for child in &row.sorted_children {
            self.pretty_print_tree(child, 0, longest_label, out)?;
        }

        if row.diff_mode {
            if !row.shrinking.is_empty() {
                writeln!(out)?;
                writeln!(
                    out,
                    " -------------- {} --------------",
                    fixed_width("SHRINKING", longest_label)
                )?;
                for child in &row.shrinking {
                    self.pretty_print_tree(child, 0, longest_label, out)?;
                }
            }
            if !row.mixed.is_empty() {
                writeln!(out)?;
                writeln!(
                    out,
                    " -+-+-+-+-+-+-+ {} +-+-+-+-+-+-+-",
                    fixed_width("MIXED", longest_label)
                )?;
                for child in &row.mixed {
                    self.pretty_print_tree(child, 0, longest_label, out)?;
                }
            }
            writeln!(out)?;
        }

        // The TOTAL row comes after everything else.
        self.pretty_print_row(row, 0, longest_label, out)
    }

    fn pretty_print_row(
        &self,
        row: &RollupRow,
        indent: usize,
        longest_label: usize,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        writeln!(
            out,
            "{} {} {} {} {} {}",
            " ".repeat(indent),
            percent_string(row.vmpercent, row.diff_mode),
            si_print(row.vmsize, row.diff_mode),
            fixed_width(&row.name, longest_label),
            si_print(row.filesize, row.diff_mode),
            percent_string(row.filepercent, row.diff_mode),
        )
    }

    fn pretty_print_tree(
        &self,
        row: &RollupRow,
        indent: usize,
        longest_label: usize,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        self.pretty_print_row(row, indent, longest_label, out)?;

        // Sub-rows whose direction contradicts the row itself are left out:
        // a shrinking symbol inside a growing section only confuses the
        // reading of a diff.
        if row.vmsize > 0 || row.filesize > 0 {
            for child in &row.sorted_children {
                self.pretty_print_tree(child, indent + 4, longest_label, out)?;
            }
        }
        if row.vmsize < 0 || row.filesize < 0 {
            for child in &row.shrinking {
                self.pretty_print_tree(child, indent + 4, longest_label, out)?;
            }
        }
        if (row.vmsize < 0) != (row.filesize < 0) {
            for child in &row.mixed {
                self.pretty_print_tree(child, indent + 4, longest_label, out)?;
            }
        }
        Ok(())
    }

    fn print_csv(&self, out: &mut dyn Write) -> io::Result<()> {
        let mut header: Vec<&str> = self.source_names.iter().map(String::as_str).collect();
        header.push("vmsize");
        header.push("filesize");
        writeln!(out, "{}", header.join(","))?;

        let row = &self.toplevel_row;
        for child in row
            .sorted_children
            .iter()
            .chain(&row.shrinking)
            .chain(&row.mixed)
        {
            self.print_tree_csv(child, "", out)?;
        }
        Ok(())
    }

    fn print_tree_csv(
        &self,
        row: &RollupRow,
        parent_labels: &str,
        out: &mut dyn Write,
    ) -> io::Result<()> {
        let has_children = !row.sorted_children.is_empty()
            || !row.shrinking.is_empty()
            || !row.mixed.is_empty();

        if has_children {
            let labels = if parent_labels.is_empty() {
                csv_escape(&row.name)
            } else {
                format!("{parent_labels},{}", csv_escape(&row.name))
            };
            for child in row
                .sorted_children
                .iter()
                .chain(&row.shrinking)
                .chain(&row.mixed)
            {
                self.print_tree_csv(child, &labels, out)?;
            }
        } else if parent_labels.is_empty() {
            writeln!(
                out,
                "{},{},{}",
                csv_escape(&row.name),
                row.vmsize,
                row.filesize
            )?;
        } else {
            writeln!(
                out,
                "{},{},{},{}",
                parent_labels,
                csv_escape(&row.name),
                row.vmsize,
                row.filesize
            )?;
        }
        Ok(())
    }
}

fn longest_label_in(row: &RollupRow, indent: usize) -> usize {
    let mut longest = indent + row.name.len();
    for child in row
        .sorted_children
        .iter()
        .chain(&row.shrinking)
        .chain(&row.mixed)
    {
        longest = longest.max(longest_label_in(child, indent + 4));
    }
    longest
}

/// Pad or truncate to an exact width.
fn fixed_width(input: &str, width: usize) -> String {
    format!("{input:<width$.width$}")
}

/// Render a byte count with binary prefixes into a 7-column field.
fn si_print(size: i64, force_sign: bool) -> String {
    const PREFIXES: [&str; 5] = ["", "Ki", "Mi", "Gi", "Ti"];
    let mut value = size as f64;
    let mut prefix = 0;
    while value.abs() > 1024.0 && prefix < PREFIXES.len() - 2 {
        value /= 1024.0;
        prefix += 1;
    }

    let rendered = if value.abs() > 100.0 || prefix == 0 {
        let whole = value as i64;
        if force_sign && size > 0 {
            format!("+{whole}{}", PREFIXES[prefix])
        } else {
            format!("{whole}{}", PREFIXES[prefix])
        }
    } else if value.abs() > 10.0 {
        if force_sign {
            format!("{value:+.1}{}", PREFIXES[prefix])
        } else {
            format!("{value:.1}{}", PREFIXES[prefix])
        }
    } else if force_sign {
        format!("{value:+.2}{}", PREFIXES[prefix])
    } else {
        format!("{value:.2}{}", PREFIXES[prefix])
    };

    format!("{rendered:>7}")
}

/// Render a percentage into a fixed-width field. Diff mode uses the
/// special tokens for no-change, deleted and newly-appeared rows.
fn percent_string(percent: f64, diff_mode: bool) -> String {
    if !diff_mode {
        return format!("{percent:>5.1}%");
    }
    if percent == 0.0 || percent.is_nan() {
        " [ = ]".to_string()
    } else if percent == -100.0 {
        " [DEL]".to_string()
    } else if percent.is_infinite() {
        " [NEW]".to_string()
    } else {
        // Keep the column fixed-width even for very large growth.
        let rendered = if percent > 1000.0 {
            let digits = percent.log10() as i32 - 1;
            format!("{:+.0}e{digits}%", percent / 10f64.powi(digits))
        } else if percent > 10.0 || percent < -10.0 {
            format!("{percent:+.0}%")
        } else {
            format!("{percent:+.1}%")
        };
        format!("{rendered:>6}")
    }
}

fn csv_escape(field: &str) -> String {
    if field.contains('"') || field.contains(',') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_si_print_plain_and_signed() {
        assert_eq!(si_print(0, false).trim(), "0");
        assert_eq!(si_print(512, false).trim(), "512");
        assert_eq!(si_print(2048, false).trim(), "2.00Ki");
        assert_eq!(si_print(150 * 1024, false).trim(), "150Ki");
        assert_eq!(si_print(3 * 1024 * 1024, false).trim(), "3.00Mi");
        assert_eq!(si_print(2048, true).trim(), "+2.00Ki");
        assert_eq!(si_print(-2048, true).trim(), "-2.00Ki");
        assert_eq!(si_print(0, true).trim(), "0");
    }

    #[test]
    fn test_si_print_field_width() {
        for size in [0, 7, 1024, -4096, 987_654_321] {
            assert!(si_print(size, false).len() >= 7);
        }
    }

    #[test]
    fn test_percent_string_plain() {
        assert_eq!(percent_string(100.0, false), "100.0%");
        assert_eq!(percent_string(4.25, false), "  4.2%");
    }

    #[test]
    fn test_percent_string_diff_tokens() {
        assert_eq!(percent_string(0.0, true), " [ = ]");
        assert_eq!(percent_string(f64::NAN, true), " [ = ]");
        assert_eq!(percent_string(-100.0, true), " [DEL]");
        assert_eq!(percent_string(f64::INFINITY, true), " [NEW]");
        assert_eq!(percent_string(5.0, true).trim(), "+5.0%");
        assert_eq!(percent_string(43.0, true).trim(), "+43%");
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_fixed_width_pads_and_truncates() {
        assert_eq!(fixed_width("ab", 4), "ab  ");
        assert_eq!(fixed_width("abcdef", 4), "abcd");
    }

    fn sample_output() -> RollupOutput {
        let mut output = RollupOutput::new();
        output.add_source_name("sections");
        output.add_source_name("symbols");

        let mut text = RollupRow::new(".text");
        text.vmsize = 100;
        text.filesize = 100;
        let mut sym = RollupRow::new("main");
        sym.vmsize = 60;
        sym.filesize = 60;
        text.sorted_children.push(sym);

        let root = output.toplevel_row_mut();
        root.vmsize = 100;
        root.filesize = 100;
        root.vmpercent = 100.0;
        root.filepercent = 100.0;
        root.sorted_children.push(text);
        output
    }

    #[test]
    fn test_csv_emits_header_and_leaf_rows() {
        let output = sample_output();
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
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "sections,symbols,vmsize,filesize");
        assert_eq!(lines[1], ".text,main,60,60");
    }

    #[test]
    fn test_pretty_print_ends_with_total() {
        let output = sample_output();
        let mut buffer = Vec::new();
        output.print(&OutputOptions::default(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains(".text"));
        assert!(text.contains("main"));
        let last = text.lines().last().unwrap();
        assert!(last.contains("TOTAL"));
        assert!(last.contains("100.0%"));
    }
}
