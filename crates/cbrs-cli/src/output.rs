//! Output formatting for the CLI

use cbrs_eval::MetricFrame;
use serde::Serialize;

/// Render a metric frame as an aligned text table.
///
/// Goes through the CSV writer so column names match the exported files.
pub fn format_table<R: Serialize>(frame: &MetricFrame<R>) -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    frame.write_csv(&mut buffer)?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(buffer.as_slice());
    let mut rows: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        rows.push(record?.iter().map(format_cell).collect());
    }

    if rows.is_empty() {
        return Ok("(no rows)\n".to_string());
    }

    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    let widths: Vec<usize> = (0..columns)
        .map(|c| {
            rows.iter()
                .filter_map(|row| row.get(c))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');

        if i == 0 {
            let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
            out.push_str(&rule.join("  "));
            out.push('\n');
        }
    }

    Ok(out)
}

/// Shorten floats to 6 decimals; everything else is printed as-is
fn format_cell(cell: &str) -> String {
    if cell.contains('.') {
        if let Ok(value) = cell.parse::<f64>() {
            return format!("{value:.6}");
        }
    }
    cell.to_string()
}

/// Print a metric frame as a table or as JSON
pub fn print_frame<R: Serialize>(frame: &MetricFrame<R>, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", frame.to_json()?);
    } else {
        print!("{}", format_table(frame)?);
    }
    Ok(())
}

/// JSON shape of the coverage command
#[derive(Serialize)]
pub struct CoverageOutput {
    pub catalog_coverage: f64,
    pub recommended_items: usize,
    pub catalog_items: usize,
}

/// JSON shape of the report command
#[derive(Serialize)]
pub struct ReportOutput<'a> {
    pub algorithm: &'a str,
    pub mean_gini: f64,
    pub catalog_coverage: f64,
    pub popular_items: &'a [String],
    pub long_tail: &'a [usize],
    pub gini: &'a MetricFrame<cbrs_eval::GiniRow>,
    pub delta_gap: &'a MetricFrame<cbrs_eval::DeltaGapRow>,
    pub pop_ratio: &'a MetricFrame<cbrs_eval::PopRatioRow>,
    pub skipped_groups: &'a [cbrs_eval::SkippedGroup],
}

impl<'a> ReportOutput<'a> {
    pub fn new(report: &'a cbrs_eval::FairnessReport) -> Self {
        Self {
            algorithm: &report.algorithm_name,
            mean_gini: report.mean_gini(),
            catalog_coverage: report.catalog_coverage,
            popular_items: &report.popular_items,
            long_tail: &report.long_tail,
            gini: &report.gini,
            delta_gap: &report.delta_gap,
            pop_ratio: &report.pop_ratio,
            skipped_groups: &report.skipped_groups,
        }
    }
}
