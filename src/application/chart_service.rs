// Chart service - assembles the chart artifact from aggregated series
use crate::application::series_aggregator::AggregatedSeries;
use crate::domain::chart::{ChartArtifact, ChartLine, LegendEntry, PlotOption};
use crate::domain::palette::ColorPalette;

#[derive(Debug, Clone)]
pub struct ChartService {
    palette: ColorPalette,
}

impl ChartService {
    pub fn new(palette: ColorPalette) -> Self {
        Self { palette }
    }

    pub fn palette(&self) -> &ColorPalette {
        &self.palette
    }

    /// Build the chart: baseline styling first, then the caller's options in
    /// order, then one line and legend entry per series.
    ///
    /// Only as many series as the palette has colors are drawn; the rest are
    /// dropped, in dispensing order.
    pub fn assemble(&self, title: &str, aggregated: &AggregatedSeries, options: &[PlotOption]) -> ChartArtifact {
        let mut chart = ChartArtifact::styled(&self.palette);
        chart.title = title.to_string();
        for option in options {
            option.apply(&mut chart);
        }

        chart.y_min = aggregated.running_min;
        chart.y_max = aggregated.y_max();

        let limit = self.palette.line_colors.len();
        if aggregated.series.len() > limit {
            tracing::warn!(
                series = aggregated.series.len(),
                drawn = limit,
                "more series than line colors, dropping the rest"
            );
        }

        for colored in aggregated.series.iter().take(limit) {
            chart.legend.push(LegendEntry {
                name: colored.series.name.clone(),
                color: colored.color,
            });
            chart.lines.push(ChartLine {
                name: colored.series.name.clone(),
                color: colored.color,
                points: colored.series.points.clone(),
            });
        }

        tracing::info!(
            title = %chart.title,
            lines = chart.lines.len(),
            y_max = chart.y_max,
            "assembled chart"
        );
        chart
    }
}
