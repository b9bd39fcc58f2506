//! SVG chart rendering
//!
//! Minimal scatter and line charts written as standalone SVG documents.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use cbrs_core::PlotConfig;

use crate::{EvalError, Result};

const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 25.0;
const MARGIN_TOP: f64 = 40.0;
const MARGIN_BOTTOM: f64 = 55.0;
const TICKS: usize = 5;

/// Chart type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    /// Markers only
    Scatter,
    /// Points joined in order
    Line,
}

/// A two-dimensional chart
#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub kind: ChartKind,
    pub points: Vec<(f64, f64)>,
}

impl Chart {
    /// Create a scatter chart
    pub fn scatter(
        title: impl Into<String>,
        x_label: impl Into<String>,
        y_label: impl Into<String>,
        points: Vec<(f64, f64)>,
    ) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            kind: ChartKind::Scatter,
            points,
        }
    }

    /// Create a line chart from y values; x is the 0-based position
    pub fn line(
        title: impl Into<String>,
        x_label: impl Into<String>,
        y_label: impl Into<String>,
        values: &[f64],
    ) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
            kind: ChartKind::Line,
            points: values
                .iter()
                .enumerate()
                .map(|(i, y)| (i as f64, *y))
                .collect(),
        }
    }

    /// Render the chart as an SVG document
    pub fn to_svg(&self, width: u32, height: u32) -> String {
        let (w, h) = (f64::from(width), f64::from(height));
        let plot_w = (w - MARGIN_LEFT - MARGIN_RIGHT).max(1.0);
        let plot_h = (h - MARGIN_TOP - MARGIN_BOTTOM).max(1.0);

        let (x_min, x_max) = axis_range(self.points.iter().map(|p| p.0));
        let (y_min, y_max) = axis_range(self.points.iter().map(|p| p.1));

        let to_x = |x: f64| MARGIN_LEFT + (x - x_min) / (x_max - x_min) * plot_w;
        let to_y = |y: f64| MARGIN_TOP + plot_h - (y - y_min) / (y_max - y_min) * plot_h;

        let mut svg = String::new();
        svg.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let _ = writeln!(
            svg,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">"
        );
        svg.push_str("  <style>\n");
        svg.push_str("    .axis { stroke: #333; stroke-width: 1; }\n");
        svg.push_str("    .grid { stroke: #ddd; stroke-width: 0.5; }\n");
        svg.push_str("    .label { font-family: sans-serif; font-size: 12px; fill: #333; }\n");
        svg.push_str("    .title { font-family: sans-serif; font-size: 15px; fill: #111; }\n");
        svg.push_str("  </style>\n");
        svg.push_str("  <rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");

        // Title and axis labels
        let _ = writeln!(
            svg,
            "  <text class=\"title\" x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\">{}</text>",
            MARGIN_LEFT + plot_w / 2.0,
            MARGIN_TOP / 2.0 + 5.0,
            escape(&self.title)
        );
        let _ = writeln!(
            svg,
            "  <text class=\"label\" x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\">{}</text>",
            MARGIN_LEFT + plot_w / 2.0,
            h - 12.0,
            escape(&self.x_label)
        );
        let _ = writeln!(
            svg,
            "  <text class=\"label\" x=\"15\" y=\"{:.1}\" text-anchor=\"middle\" transform=\"rotate(-90 15 {:.1})\">{}</text>",
            MARGIN_TOP + plot_h / 2.0,
            MARGIN_TOP + plot_h / 2.0,
            escape(&self.y_label)
        );

        // Ticks and grid
        for i in 0..=TICKS {
            let t = i as f64 / TICKS as f64;
            let x_value = x_min + t * (x_max - x_min);
            let y_value = y_min + t * (y_max - y_min);
            let (px, py) = (to_x(x_value), to_y(y_value));

            let _ = writeln!(
                svg,
                "  <line class=\"grid\" x1=\"{px:.1}\" y1=\"{:.1}\" x2=\"{px:.1}\" y2=\"{:.1}\"/>",
                MARGIN_TOP,
                MARGIN_TOP + plot_h
            );
            let _ = writeln!(
                svg,
                "  <line class=\"grid\" x1=\"{:.1}\" y1=\"{py:.1}\" x2=\"{:.1}\" y2=\"{py:.1}\"/>",
                MARGIN_LEFT,
                MARGIN_LEFT + plot_w
            );
            let _ = writeln!(
                svg,
                "  <text class=\"label\" x=\"{px:.1}\" y=\"{:.1}\" text-anchor=\"middle\">{}</text>",
                MARGIN_TOP + plot_h + 18.0,
                format_tick(x_value)
            );
            let _ = writeln!(
                svg,
                "  <text class=\"label\" x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\">{}</text>",
                MARGIN_LEFT - 6.0,
                py + 4.0,
                format_tick(y_value)
            );
        }

        // Axes
        let _ = writeln!(
            svg,
            "  <line class=\"axis\" x1=\"{MARGIN_LEFT:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\"/>",
            MARGIN_TOP + plot_h,
            MARGIN_LEFT + plot_w,
            MARGIN_TOP + plot_h
        );
        let _ = writeln!(
            svg,
            "  <line class=\"axis\" x1=\"{MARGIN_LEFT:.1}\" y1=\"{MARGIN_TOP:.1}\" x2=\"{MARGIN_LEFT:.1}\" y2=\"{:.1}\"/>",
            MARGIN_TOP + plot_h
        );

        // Data
        match self.kind {
            ChartKind::Scatter => {
                for (x, y) in &self.points {
                    let _ = writeln!(
                        svg,
                        "  <circle cx=\"{:.2}\" cy=\"{:.2}\" r=\"3\" fill=\"orange\" stroke=\"black\" stroke-width=\"0.3\"/>",
                        to_x(*x),
                        to_y(*y)
                    );
                }
            }
            ChartKind::Line => {
                if !self.points.is_empty() {
                    let coords: Vec<String> = self
                        .points
                        .iter()
                        .map(|(x, y)| format!("{:.2},{:.2}", to_x(*x), to_y(*y)))
                        .collect();
                    let _ = writeln!(
                        svg,
                        "  <polyline fill=\"none\" stroke=\"#1f77b4\" stroke-width=\"1.5\" points=\"{}\"/>",
                        coords.join(" ")
                    );
                }
            }
        }

        svg.push_str("</svg>\n");
        svg
    }
}

/// Axis bounds; the range always includes 0 and is never degenerate
fn axis_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let (min, max) = values.fold((0.0_f64, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if (max - min).abs() < f64::EPSILON {
        (min, min + 1.0)
    } else {
        (min, max)
    }
}

fn format_tick(value: f64) -> String {
    if value.fract().abs() < 1e-9 {
        format!("{}", value.round() as i64)
    } else {
        format!("{value:.2}")
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

// ============================================================================
// Output Sink
// ============================================================================

/// Writes charts as `{dir}/{name}.svg`
#[derive(Debug, Clone)]
pub struct SvgSink {
    dir: PathBuf,
    width: u32,
    height: u32,
}

impl SvgSink {
    /// Create a sink writing into `dir` with the default chart size
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let defaults = PlotConfig::default();
        Self {
            dir: dir.into(),
            width: defaults.width,
            height: defaults.height,
        }
    }

    /// Create a sink from the plot configuration
    pub fn from_config(config: &PlotConfig) -> Self {
        Self {
            dir: config.output_dir.clone(),
            width: config.width,
            height: config.height,
        }
    }

    /// Set the chart size
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// A sink writing into a subdirectory of this one
    pub fn join(&self, subdir: impl AsRef<Path>) -> Self {
        Self {
            dir: self.dir.join(subdir),
            width: self.width,
            height: self.height,
        }
    }

    /// Output directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Render and write a chart, returning the written path.
    ///
    /// Missing directories are created; an existing file is overwritten.
    pub fn save(&self, chart: &Chart, name: &str) -> Result<PathBuf> {
        let path = self.dir.join(format!("{name}.svg"));
        let io_err = |e| EvalError::Io {
            path: path.display().to_string(),
            source: e,
        };

        std::fs::create_dir_all(&self.dir).map_err(io_err)?;
        std::fs::write(&path, chart.to_svg(self.width, self.height)).map_err(io_err)?;

        tracing::info!("Chart written to {}", path.display());
        Ok(path)
    }
}
