// Chart artifact: everything a renderer needs to draw the plot
use crate::domain::palette::{ColorPalette, Rgba};
use crate::domain::telemetry::Point;
use crate::error::Result;
use chrono::DateTime;
use std::fmt::Write;
use std::path::Path;

/// Twelve-hour clock ticks, e.g. `3:04PM`.
pub const KITCHEN_FORMAT: &str = "%-I:%M%p";
pub const DEFAULT_X_AXIS_NAME: &str = "UTC";
pub const DEFAULT_FONT_SIZE: u32 = 14;

#[derive(Debug, Clone, PartialEq)]
pub enum TickFormat {
    /// Values are unix seconds, formatted with a chrono format string in UTC.
    Time(String),
    /// Plain numbers with a fixed number of decimals.
    Number { precision: usize },
}

impl TickFormat {
    /// Format a tick value. Time layouts chrono cannot apply fall back to the
    /// raw value.
    pub fn format(&self, value: f64) -> String {
        match self {
            TickFormat::Time(layout) => {
                let Some(ts) = DateTime::from_timestamp(value.round() as i64, 0) else {
                    return format!("{value}");
                };
                let mut out = String::new();
                match write!(out, "{}", ts.format(layout)) {
                    Ok(()) => out,
                    Err(_) => format!("{value}"),
                }
            }
            TickFormat::Number { precision } => {
                let precision = *precision;
                format!("{value:.precision$}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub label: String,
    pub tick_format: TickFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartLine {
    pub name: String,
    pub color: Rgba,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendEntry {
    pub name: String,
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartArtifact {
    pub title: String,
    pub title_color: Rgba,
    pub background: Rgba,
    /// Axis lines, ticks and axis labels.
    pub foreground: Rgba,
    pub grid_color: Rgba,
    pub legend_text_color: Rgba,
    pub font_size: u32,
    pub x_axis: Axis,
    pub y_axis: Axis,
    pub y_min: f64,
    pub y_max: f64,
    pub lines: Vec<ChartLine>,
    pub legend: Vec<LegendEntry>,
}

impl ChartArtifact {
    /// Empty chart styled with the palette's foreground, background and grid.
    pub fn styled(palette: &ColorPalette) -> Self {
        Self {
            title: String::new(),
            title_color: palette.foreground,
            background: palette.background,
            foreground: palette.foreground,
            grid_color: palette.grid_color,
            legend_text_color: palette.foreground,
            font_size: DEFAULT_FONT_SIZE,
            x_axis: Axis {
                label: DEFAULT_X_AXIS_NAME.to_string(),
                tick_format: TickFormat::Time(KITCHEN_FORMAT.to_string()),
            },
            y_axis: Axis {
                label: String::new(),
                tick_format: TickFormat::Number { precision: 2 },
            },
            y_min: 0.0,
            y_max: 0.0,
            lines: Vec::new(),
            legend: Vec::new(),
        }
    }

    /// Range of timestamps across all lines, in unix seconds.
    pub fn time_range(&self) -> Option<(i64, i64)> {
        let mut stamps = self
            .lines
            .iter()
            .flat_map(|l| l.points.iter().map(|p| p.timestamp.timestamp()));
        let first = stamps.next()?;
        Some(stamps.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t))))
    }

    /// Hand the finished chart to a renderer.
    pub fn render(&self, renderer: &dyn ChartRenderer, size: Dimensions, path: &Path) -> Result<()> {
        renderer.render(self, size, path)
    }
}

/// Pixel size of a rendered chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn from_inches(width: f64, height: f64, dpi: u32) -> Self {
        Self {
            width: (width * f64::from(dpi)).round() as u32,
            height: (height * f64::from(dpi)).round() as u32,
        }
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::from_inches(8.0, 4.0, 96)
    }
}

/// Encodes a chart to an image and writes it out.
pub trait ChartRenderer {
    fn render(&self, chart: &ChartArtifact, size: Dimensions, path: &Path) -> Result<()>;
}

/// A presentation tweak applied on top of the baseline styling. Each option
/// sets exactly one concern, so applying it twice has no further effect.
#[derive(Debug, Clone, PartialEq)]
pub enum PlotOption {
    Background(Rgba),
    Foreground(Rgba),
    Title(String),
    Grid(Rgba),
    Legend(Rgba),
    XAxisName(String),
    YAxisName(String),
    XTimeTicks(String),
    YTickPrecision(usize),
    FontSize(u32),
}

impl PlotOption {
    pub fn apply(&self, chart: &mut ChartArtifact) {
        match self {
            PlotOption::Background(color) => chart.background = *color,
            PlotOption::Foreground(color) => {
                chart.foreground = *color;
                chart.title_color = *color;
            }
            PlotOption::Title(title) => chart.title = title.clone(),
            PlotOption::Grid(color) => chart.grid_color = *color,
            PlotOption::Legend(color) => chart.legend_text_color = *color,
            PlotOption::XAxisName(name) => chart.x_axis.label = name.clone(),
            PlotOption::YAxisName(name) => chart.y_axis.label = name.clone(),
            PlotOption::XTimeTicks(layout) => {
                chart.x_axis.tick_format = TickFormat::Time(layout.clone())
            }
            PlotOption::YTickPrecision(precision) => {
                chart.y_axis.tick_format = TickFormat::Number {
                    precision: *precision,
                }
            }
            PlotOption::FontSize(size) => chart.font_size = *size,
        }
    }
}

/// Options reproducing the high-contrast look for a palette.
pub fn default_high_contrast(palette: &ColorPalette) -> Vec<PlotOption> {
    vec![
        PlotOption::Background(palette.background),
        PlotOption::Foreground(palette.foreground),
        PlotOption::Grid(palette.grid_color),
        PlotOption::Legend(palette.foreground),
    ]
}
