// PNG rendering of chart artifacts with plotters
use crate::domain::chart::{ChartArtifact, ChartRenderer, Dimensions};
use crate::domain::palette::Rgba;
use crate::error::{PlotError, Result};
use plotters::prelude::*;
use std::ops::Range;
use std::path::Path;

const FONT_FAMILY: &str = "sans-serif";
const LINE_WIDTH: u32 = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct PlottersRenderer;

impl PlottersRenderer {
    pub fn new() -> Self {
        Self
    }
}

fn to_rgb(color: Rgba) -> RGBColor {
    RGBColor(color.r, color.g, color.b)
}

fn render_error<E: std::fmt::Display>(err: E) -> PlotError {
    PlotError::Render(err.to_string())
}

/// Plot ranges for the chart, widened when all points share one timestamp or
/// the value range is empty.
fn axis_ranges(chart: &ChartArtifact) -> (Range<f64>, Range<f64>) {
    let (start, end) = chart.time_range().unwrap_or((0, 60));
    let end = if end > start { end } else { start + 60 };

    let y_min = chart.y_min.min(0.0);
    let y_max = if chart.y_max > y_min { chart.y_max } else { y_min + 1.0 };

    (start as f64..end as f64, y_min..y_max)
}

impl ChartRenderer for PlottersRenderer {
    fn render(&self, chart: &ChartArtifact, size: Dimensions, path: &Path) -> Result<()> {
        let root = BitMapBackend::new(path, (size.width, size.height)).into_drawing_area();
        root.fill(&to_rgb(chart.background)).map_err(render_error)?;

        let foreground = to_rgb(chart.foreground);
        let grid = to_rgb(chart.grid_color);
        let font_size = f64::from(chart.font_size);
        let label_style = (FONT_FAMILY, font_size).into_font().color(&foreground);
        let (x_range, y_range) = axis_ranges(chart);

        let mut ctx = ChartBuilder::on(&root)
            .caption(
                &chart.title,
                (FONT_FAMILY, font_size * 1.5).into_font().color(&to_rgb(chart.title_color)),
            )
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range, y_range)
            .map_err(render_error)?;

        let x_formatter = |v: &f64| chart.x_axis.tick_format.format(*v);
        let y_formatter = |v: &f64| chart.y_axis.tick_format.format(*v);

        ctx.configure_mesh()
            .bold_line_style(grid)
            .light_line_style(grid.mix(0.3))
            .axis_style(foreground)
            .x_desc(chart.x_axis.label.as_str())
            .y_desc(chart.y_axis.label.as_str())
            .x_label_formatter(&x_formatter)
            .y_label_formatter(&y_formatter)
            .label_style(label_style.clone())
            .axis_desc_style(label_style)
            .draw()
            .map_err(render_error)?;

        for line in &chart.lines {
            let color = to_rgb(line.color);
            let data = line
                .points
                .iter()
                .map(|p| (p.timestamp.timestamp() as f64, p.value));

            ctx.draw_series(LineSeries::new(data, color.stroke_width(LINE_WIDTH)))
                .map_err(render_error)?
                .label(line.name.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(LINE_WIDTH)));
        }

        if !chart.legend.is_empty() {
            ctx.configure_series_labels()
                .background_style(to_rgb(chart.background).mix(0.8))
                .border_style(foreground)
                .label_font((FONT_FAMILY, font_size).into_font().color(&to_rgb(chart.legend_text_color)))
                .position(SeriesLabelPosition::UpperRight)
                .draw()
                .map_err(render_error)?;
        }

        root.present().map_err(render_error)?;
        tracing::debug!(path = %path.display(), "rendered chart");
        Ok(())
    }
}
