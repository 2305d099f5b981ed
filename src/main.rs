// Main entry point - argument parsing, dependency wiring and the plot run
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Duration, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tsplot::application::chart_service::ChartService;
use tsplot::application::plot_service::{PlotRequest, PlotService};
use tsplot::domain::chart::PlotOption;
use tsplot::domain::metric_query::{Aligner, MetricQuery, Reducer};
use tsplot::domain::palette::ColorPalette;
use tsplot::domain::time_window::{RelativeTime, TimeWindow};
use tsplot::infrastructure::config::load_config;
use tsplot::infrastructure::monitoring_repository::MonitoringRepository;
use tsplot::infrastructure::plotters_renderer::PlottersRenderer;

/// Plot a Cloud Monitoring time series to a PNG line chart
#[derive(Parser, Debug)]
#[command(name = "tsplot")]
#[command(about = "Query a metric over a relative time window and chart it")]
struct Args {
    /// Project to query
    #[arg(short, long, env = "TSPLOT_PROJECT")]
    project: String,

    /// Metric descriptor, e.g. custom.googleapis.com/svc/latency
    #[arg(short, long, default_value = "")]
    metric: String,

    /// Raw monitoring filter, replacing the one derived from the metric
    #[arg(long)]
    filter: Option<String>,

    /// Window start: now, -<n>m or -<n>h
    #[arg(long, default_value = "-1h", allow_hyphen_values = true)]
    start: String,

    /// Window end: now, -<n>m or -<n>h
    #[arg(long, default_value = "now", allow_hyphen_values = true)]
    end: String,

    /// Chart title, also the output file name
    #[arg(short, long)]
    title: Option<String>,

    /// Output directory, overriding the configured one
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Label to group and name series by
    #[arg(long)]
    group_by: Option<String>,

    /// Alignment bucket width, e.g. 5m or 1h
    #[arg(long, value_parser = parse_period)]
    alignment_period: Option<Duration>,

    /// Per-series aligner, e.g. ALIGN_MEAN
    #[arg(long)]
    aligner: Option<Aligner>,

    /// Cross-series reducer, e.g. REDUCE_SUM
    #[arg(long)]
    reducer: Option<Reducer>,

    /// Y axis label
    #[arg(long)]
    y_axis: Option<String>,

    /// Decimal places on Y axis ticks
    #[arg(long)]
    y_precision: Option<usize>,

    /// Print the raw series as JSON instead of drawing a chart
    #[arg(long, default_value = "false")]
    raw: bool,
}

fn parse_period(s: &str) -> Result<Duration, String> {
    let expr = format!("-{}", s.trim().trim_start_matches('-'));
    match expr.parse::<RelativeTime>() {
        Ok(RelativeTime::Now) | Err(_) => Err(format!("invalid alignment period {s:?}, expected <n>m or <n>h")),
        Ok(period) => Ok(period.offset()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = load_config().context("failed to load configuration")?;

    let window = TimeWindow::from_exprs(&args.start, &args.end, Utc::now())?;
    let mut query = MetricQuery::new(
        args.project.as_str(),
        args.metric.as_str(),
        Some(window.start()),
        Some(window.end()),
    );
    query.set_filter_template(config.query.filter_template.as_str());
    if let Some(filter) = &args.filter {
        query.set_query_filter(filter.as_str());
    }
    if let Some(period) = args.alignment_period {
        query.set_alignment_period(period);
    }
    if let Some(aligner) = args.aligner {
        query.set_per_series_aligner(aligner);
    }
    if let Some(reducer) = args.reducer {
        query.set_cross_series_reducer(reducer);
    }
    if let Some(key) = &args.group_by {
        query.set_group_by(key);
    }

    let repository = Arc::new(MonitoringRepository::new(
        config.monitoring.endpoint.clone(),
        config.monitoring.access_token.clone(),
        config.monitoring.page_size,
    ));
    let chart_service = ChartService::new(ColorPalette::from_kind(config.chart.palette));
    let service = PlotService::new(repository, chart_service);

    if args.raw {
        let mut out = std::io::stdout().lock();
        service.dump_raw(&query, &mut out).await?;
        return Ok(());
    }

    let mut options = Vec::new();
    if let Some(label) = &args.y_axis {
        options.push(PlotOption::YAxisName(label.clone()));
    }
    if let Some(precision) = args.y_precision {
        options.push(PlotOption::YTickPrecision(precision));
    }
    if let Some(size) = config.chart.font_size {
        options.push(PlotOption::FontSize(size));
    }

    let request = PlotRequest {
        title: args.title.clone().unwrap_or_else(|| args.metric.clone()),
        group_by: args.group_by.clone(),
        options,
    };
    let chart = service.plot(&query, &request).await?;

    let size = config.output.dimensions();
    let directory = args.output.unwrap_or(config.output.directory);
    let path = service.save(&chart, &PlottersRenderer::new(), size, &directory)?;
    println!("{}", path.display());

    Ok(())
}
