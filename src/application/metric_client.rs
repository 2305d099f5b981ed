// Transport trait for the metrics backend and the lazy series stream over it
use crate::domain::metric_query::{MetricQuery, MetricQueryDescriptor};
use crate::domain::telemetry::RawTimeSeries;
use crate::error::{PlotError, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

/// One page of a time series listing.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesPage {
    pub time_series: Vec<RawTimeSeries>,
    pub next_page_token: Option<String>,
}

/// An authenticated handle to a metrics backend.
#[async_trait]
pub trait MetricClient: Send + Sync {
    /// Fetch one page of series matching the descriptor.
    async fn list_time_series_page(
        &self,
        request: &MetricQueryDescriptor,
        page_token: Option<&str>,
    ) -> anyhow::Result<TimeSeriesPage>;
}

pub type SeriesStream = BoxStream<'static, Result<RawTimeSeries>>;

/// Lazily list every series for the descriptor. A page is only requested
/// once the previous one has been consumed; the first transport error ends
/// the stream.
pub fn list_time_series(client: Arc<dyn MetricClient>, request: MetricQueryDescriptor) -> SeriesStream {
    Box::pin(async_stream::try_stream! {
        let mut page_token: Option<String> = None;
        let mut page_no = 0usize;

        loop {
            let page = client
                .list_time_series_page(&request, page_token.as_deref())
                .await
                .map_err(PlotError::Transport)?;
            page_no += 1;
            tracing::debug!(page = page_no, series = page.time_series.len(), "fetched time series page");

            for series in page.time_series {
                yield series;
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }
    })
}

/// Build the query and start listing its series. Fails before any request is
/// made when the query is incomplete.
pub fn perform_with_client(query: &MetricQuery, client: Arc<dyn MetricClient>) -> Result<SeriesStream> {
    let request = query.build()?;
    Ok(list_time_series(client, request))
}
