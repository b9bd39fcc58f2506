//! CBRS Eval - Fairness and popularity-bias metrics
//!
//! Given a recommendation frame (user, item, score) and a ground-truth
//! frame (user, item, rating), this crate computes:
//! - Gini index of each user's rating distribution
//! - Delta-GAP (Group Average Popularity) per user group
//! - Popularity ratio of profiles vs recommendations per user group
//! - Popularity vs recommendation-frequency correlation (scatter plots)
//! - Long-tail distribution of recommendations (line plot)
//! - Catalog coverage
//!
//! Every metric is a pure function over in-memory frames; the only side
//! effects are the SVG charts written by the `render_*` functions.

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

pub mod distribution;
pub mod fairness;
pub mod plot;
pub mod popularity;
pub mod report;

pub use distribution::{
    pop_recs_correlation, recs_long_tail_distr, render_pop_recs_correlation,
    render_recs_long_tail_distr, PopRecsCorrelation,
};
pub use fairness::{
    catalog_coverage, delta_gap, delta_gap_by_group, gini, gini_index, gini_index_with_epsilon,
    pop_ratio_by_group, pop_ratio_profile_vs_recs, DeltaGapRow, GiniRow, PopRatioRow,
    GINI_EPSILON,
};
pub use plot::{Chart, ChartKind, SvgSink};
pub use popularity::{
    avg_pop_by_users, calculate_delta_gap, calculate_gap, pop_ratio_by_user, popular_items,
    profile_pop_ratios, recs_pop_ratios, split_user_in_groups, UserPopRatio,
};
pub use report::{FairnessEvaluator, FairnessReport, SkippedGroup};

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while computing or exporting metrics
#[derive(Error, Debug)]
pub enum EvalError {
    /// A metric's denominator is zero (empty catalog, zero profile GAP, ...)
    #[error("Division by zero in {metric}: {detail}")]
    ZeroDenominator { metric: &'static str, detail: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error writing {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV output error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON output error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] cbrs_core::CbrsError),
}

pub type Result<T> = std::result::Result<T, EvalError>;

// ============================================================================
// Metric Frames
// ============================================================================

/// Ordered result table, one row per user or per group.
///
/// Rows are accumulated in a `Vec` by the metric and the frame is built once.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MetricFrame<R> {
    rows: Vec<R>,
}

impl<R> MetricFrame<R> {
    /// Build a frame from accumulated rows
    pub fn from_rows(rows: Vec<R>) -> Self {
        Self { rows }
    }

    /// Borrow the rows
    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    /// Take ownership of the rows
    pub fn into_rows(self) -> Vec<R> {
        self.rows
    }

    /// Iterate over rows in order
    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the frame has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<R> Default for MetricFrame<R> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<'a, R> IntoIterator for &'a MetricFrame<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

impl<R: Serialize> MetricFrame<R> {
    /// Write rows as CSV; the header comes from the row's serialized field names
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        for row in &self.rows {
            writer.serialize(row)?;
        }
        writer.flush().map_err(|e| EvalError::Io {
            path: "<writer>".to_string(),
            source: e,
        })?;
        Ok(())
    }

    /// Write rows as CSV to a file, creating parent directories
    pub fn save_csv(&self, path: &Path) -> Result<()> {
        let io_err = |e| EvalError::Io {
            path: path.display().to_string(),
            source: e,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let file = std::fs::File::create(path).map_err(io_err)?;
        self.write_csv(file)?;

        tracing::info!("Wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }

    /// Serialize rows as a JSON array
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.rows)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        #[serde(rename = "user_group")]
        group: String,
        #[serde(rename = "delta-gap")]
        value: f64,
    }

    fn sample() -> MetricFrame<Row> {
        MetricFrame::from_rows(vec![
            Row {
                group: "niche".to_string(),
                value: 0.5,
            },
            Row {
                group: "diverse".to_string(),
                value: -0.25,
            },
        ])
    }

    #[test]
    fn test_write_csv_uses_renamed_headers() {
        let mut buffer = Vec::new();
        sample().write_csv(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert_eq!(text, "user_group,delta-gap\nniche,0.5\ndiverse,-0.25\n");
    }

    #[test]
    fn test_to_json_keeps_order() {
        let json = sample().to_json().unwrap();
        let niche = json.find("niche").unwrap();
        let diverse = json.find("diverse").unwrap();
        assert!(niche < diverse);
    }

    #[test]
    fn test_save_csv_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("delta_gap.csv");

        sample().save_csv(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_empty_frame() {
        let frame: MetricFrame<Row> = MetricFrame::default();
        assert!(frame.is_empty());

        let mut buffer = Vec::new();
        frame.write_csv(&mut buffer).unwrap();
        assert!(buffer.is_empty());
    }
}
