// Plot service - runs a query end to end and produces a chart or a raw dump
use crate::application::chart_service::ChartService;
use crate::application::metric_client::{MetricClient, perform_with_client};
use crate::application::series_aggregator::SeriesAggregator;
use crate::domain::chart::{ChartArtifact, ChartRenderer, Dimensions, PlotOption};
use crate::domain::metric_query::MetricQuery;
use crate::error::Result;
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct PlotRequest {
    pub title: String,
    /// Label whose value names each series.
    pub group_by: Option<String>,
    pub options: Vec<PlotOption>,
}

#[derive(Clone)]
pub struct PlotService {
    client: Arc<dyn MetricClient>,
    chart_service: ChartService,
}

impl PlotService {
    pub fn new(client: Arc<dyn MetricClient>, chart_service: ChartService) -> Self {
        Self {
            client,
            chart_service,
        }
    }

    /// Query the backend and assemble a chart from every returned series.
    pub async fn plot(&self, query: &MetricQuery, request: &PlotRequest) -> Result<ChartArtifact> {
        let stream = perform_with_client(query, self.client.clone())?;

        let mut allocator = self.chart_service.palette().allocator();
        let aggregated = SeriesAggregator::new(&mut allocator, request.group_by.clone())
            .aggregate(stream)
            .await?;

        Ok(self
            .chart_service
            .assemble(&request.title, &aggregated, &request.options))
    }

    /// Write every raw series as pretty JSON, skipping the chart entirely.
    /// Returns the number of series written.
    pub async fn dump_raw<W: Write>(&self, query: &MetricQuery, out: &mut W) -> Result<usize> {
        let mut stream = perform_with_client(query, self.client.clone())?;
        let mut written = 0;

        while let Some(series) = stream.next().await {
            let series = series?;
            serde_json::to_writer_pretty(&mut *out, &series).map_err(std::io::Error::from)?;
            writeln!(out)?;
            written += 1;
        }

        tracing::info!(series = written, "dumped raw series");
        Ok(written)
    }

    /// Render the chart to `{directory}/{title}.png`.
    pub fn save(
        &self,
        chart: &ChartArtifact,
        renderer: &dyn ChartRenderer,
        size: Dimensions,
        directory: &Path,
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(directory)?;
        let path = output_path(directory, &chart.title);
        chart.render(renderer, size, &path)?;

        tracing::info!(path = %path.display(), width = size.width, height = size.height, "saved chart");
        Ok(path)
    }
}

pub fn output_path(directory: &Path, title: &str) -> PathBuf {
    let stem = if title.is_empty() { "plot" } else { title };
    directory.join(format!("{}.png", stem.replace(['/', '\\'], "_")))
}
