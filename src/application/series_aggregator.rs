// Series aggregator - drains the series stream, assigns colors and tracks the axis maximum
use crate::domain::palette::{ColorAllocator, Rgba};
use crate::domain::telemetry::{NamedSeries, RawTimeSeries};
use crate::error::{PlotError, Result};
use futures::{Stream, StreamExt};
use std::collections::{HashMap, HashSet};

/// Name used when a series has no grouping label, typically because the
/// cross-series reducer collapsed the labels away.
pub const REDUCED_SERIES_NAME: &str = "mean";

/// Headroom added above the largest value.
pub const Y_MAX_HEADROOM: f64 = 1.1;

#[derive(Debug, Clone, PartialEq)]
pub struct ColoredSeries {
    pub series: NamedSeries,
    pub color: Rgba,
}

/// Output of one aggregation run, in color dispensing order.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedSeries {
    pub series: Vec<ColoredSeries>,
    pub running_max: f64,
    pub running_min: f64,
}

impl AggregatedSeries {
    /// Upper bound of the value axis.
    pub fn y_max(&self) -> f64 {
        self.running_max * Y_MAX_HEADROOM
    }
}

pub struct SeriesAggregator<'a> {
    allocator: &'a mut ColorAllocator,
    group_by: Option<String>,
    series: Vec<ColoredSeries>,
    used_names: HashSet<String>,
    /// Last suffix handed out per base name.
    suffixes: HashMap<String, usize>,
    running_max: f64,
    running_min: f64,
}

impl<'a> SeriesAggregator<'a> {
    pub fn new(allocator: &'a mut ColorAllocator, group_by: Option<String>) -> Self {
        Self {
            allocator,
            group_by: group_by.filter(|key| !key.is_empty()),
            series: Vec::new(),
            used_names: HashSet::new(),
            suffixes: HashMap::new(),
            running_max: 0.0,
            running_min: 0.0,
        }
    }

    /// Pull series one at a time until the stream ends. Any error aborts the
    /// whole run.
    pub async fn aggregate<S>(mut self, stream: S) -> Result<AggregatedSeries>
    where
        S: Stream<Item = Result<RawTimeSeries>>,
    {
        futures::pin_mut!(stream);
        while let Some(raw) = stream.next().await {
            self.ingest(&raw?)?;
        }
        self.finish()
    }

    pub fn ingest(&mut self, raw: &RawTimeSeries) -> Result<()> {
        let points = raw.normalized_points()?;
        let name = self.unique_name(self.display_name(raw));
        let series = NamedSeries::new(name, points);

        if let Some(max) = series.max_value() {
            self.running_max = self.running_max.max(max);
        }
        if let Some(min) = series.min_value() {
            self.running_min = self.running_min.min(min);
        }

        let color = self.allocator.allocate();
        tracing::debug!(
            name = %series.name,
            points = series.points.len(),
            max = ?series.max_value(),
            "ingested series"
        );

        self.series.push(ColoredSeries { series, color });
        Ok(())
    }

    pub fn finish(self) -> Result<AggregatedSeries> {
        if self.series.is_empty() {
            return Err(PlotError::NoData);
        }
        Ok(AggregatedSeries {
            series: self.series,
            running_max: self.running_max,
            running_min: self.running_min,
        })
    }

    fn display_name(&self, raw: &RawTimeSeries) -> String {
        self.group_by
            .as_deref()
            .and_then(|key| raw.label(key))
            .unwrap_or(REDUCED_SERIES_NAME)
            .to_string()
    }

    /// Suffix repeated names with `#n` so no series is overwritten. Generated
    /// names are reserved too, so a later label that happens to read `a #2`
    /// is suffixed in turn.
    fn unique_name(&mut self, name: String) -> String {
        if self.used_names.insert(name.clone()) {
            return name;
        }

        let mut n = self.suffixes.get(&name).copied().unwrap_or(1);
        let renamed = loop {
            n += 1;
            let candidate = format!("{name} #{n}");
            if self.used_names.insert(candidate.clone()) {
                break candidate;
            }
        };
        self.suffixes.insert(name.clone(), n);

        tracing::warn!(name = %name, renamed = %renamed, "duplicate series name");
        renamed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::palette::{ColorPalette, FALLBACK_LINE_COLOR};
    use crate::domain::telemetry::{RawPoint, TypedValue, ValueType};
    use futures::stream;

    fn int_series(pod: &str, values: &[i64]) -> RawTimeSeries {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| RawPoint::new(1_700_000_000 + 60 * i as i64, TypedValue::Int64(*v)))
            .collect();
        RawTimeSeries::new("m", ValueType::Int64, points).with_metric_label("pod", pod)
    }

    fn double_series(pod: &str, values: &[f64]) -> RawTimeSeries {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| RawPoint::new(1_700_000_000 + 60 * i as i64, TypedValue::Double(*v)))
            .collect();
        RawTimeSeries::new("m", ValueType::Double, points).with_metric_label("pod", pod)
    }

    async fn run(
        allocator: &mut ColorAllocator,
        group_by: Option<&str>,
        items: Vec<Result<RawTimeSeries>>,
    ) -> Result<AggregatedSeries> {
        SeriesAggregator::new(allocator, group_by.map(str::to_string))
            .aggregate(stream::iter(items))
            .await
    }

    #[tokio::test]
    async fn test_y_max_across_mixed_encodings() {
        let mut allocator = ColorPalette::high_contrast().allocator();
        let aggregated = run(
            &mut allocator,
            Some("pod"),
            vec![
                Ok(double_series("pod-a", &[0.1, 1.5, 3.8, 0.4])),
                Ok(int_series("pod-b", &[0, 1, 3, 4])),
            ],
        )
        .await
        .unwrap();

        assert_eq!(aggregated.running_max, 4.0);
        assert!((aggregated.y_max() - 4.4).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_empty_stream_is_no_data() {
        let mut allocator = ColorPalette::high_contrast().allocator();
        let err = run(&mut allocator, None, Vec::new()).await.unwrap_err();

        assert!(matches!(err, PlotError::NoData));
        assert_eq!(err.to_string(), "no data to plot");
    }

    #[tokio::test]
    async fn test_names_from_group_label() {
        let mut allocator = ColorPalette::high_contrast().allocator();
        let aggregated = run(
            &mut allocator,
            Some("metric.labels.pod"),
            vec![Ok(double_series("pod-a", &[1.0])), Ok(double_series("pod-b", &[2.0]))],
        )
        .await
        .unwrap();

        let names: Vec<&str> = aggregated.series.iter().map(|s| s.series.name.as_str()).collect();
        assert_eq!(names, vec!["pod-a", "pod-b"]);
        assert_ne!(aggregated.series[0].color, aggregated.series[1].color);
    }

    #[tokio::test]
    async fn test_missing_label_uses_placeholder_and_stays_unique() {
        let mut allocator = ColorPalette::high_contrast().allocator();
        let aggregated = run(
            &mut allocator,
            Some("zone"),
            vec![Ok(double_series("pod-a", &[1.0])), Ok(double_series("pod-b", &[2.0]))],
        )
        .await
        .unwrap();

        let names: Vec<&str> = aggregated.series.iter().map(|s| s.series.name.as_str()).collect();
        assert_eq!(names, vec!["mean", "mean #2"]);
    }

    #[tokio::test]
    async fn test_suffixed_names_never_collide_with_real_labels() {
        let mut allocator = ColorPalette::high_contrast().allocator();
        let aggregated = run(
            &mut allocator,
            Some("pod"),
            vec![
                Ok(double_series("a", &[1.0])),
                Ok(double_series("a", &[2.0])),
                Ok(double_series("a #2", &[3.0])),
                Ok(double_series("a", &[4.0])),
            ],
        )
        .await
        .unwrap();

        let names: Vec<&str> = aggregated.series.iter().map(|s| s.series.name.as_str()).collect();
        assert_eq!(names, vec!["a", "a #2", "a #2 #2", "a #3"]);
    }

    #[tokio::test]
    async fn test_no_group_by_uses_placeholder() {
        let mut allocator = ColorPalette::high_contrast().allocator();
        let aggregated = run(&mut allocator, None, vec![Ok(double_series("pod-a", &[1.0]))])
            .await
            .unwrap();

        assert_eq!(aggregated.series[0].series.name, REDUCED_SERIES_NAME);
    }

    #[tokio::test]
    async fn test_unsupported_encoding_aborts() {
        let mut allocator = ColorPalette::high_contrast().allocator();
        let bools = RawTimeSeries::new("m", ValueType::Bool, vec![RawPoint::new(0, TypedValue::Bool(true))]);
        let err = run(
            &mut allocator,
            None,
            vec![Ok(double_series("pod-a", &[1.0])), Ok(bools)],
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "unsupported value type BOOL");
    }

    #[tokio::test]
    async fn test_transport_error_aborts() {
        let mut allocator = ColorPalette::high_contrast().allocator();
        let err = run(
            &mut allocator,
            None,
            vec![
                Ok(double_series("pod-a", &[1.0])),
                Err(PlotError::Transport(anyhow::anyhow!("deadline exceeded"))),
                Ok(double_series("pod-b", &[9.0])),
            ],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PlotError::Transport(_)));
    }

    #[tokio::test]
    async fn test_colors_fall_back_after_exhaustion() {
        let mut allocator = ColorPalette::high_contrast().allocator();
        let capacity = allocator.capacity();
        let items = (0..capacity + 2)
            .map(|i| Ok(double_series(&format!("pod-{i}"), &[i as f64])))
            .collect();

        let aggregated = run(&mut allocator, Some("pod"), items).await.unwrap();

        assert_eq!(aggregated.series.len(), capacity + 2);
        assert_eq!(aggregated.series[capacity].color, FALLBACK_LINE_COLOR);
        assert_eq!(aggregated.series[capacity + 1].color, FALLBACK_LINE_COLOR);
    }

    #[test]
    fn test_ingest_tracks_minimum() {
        let mut allocator = ColorPalette::high_contrast().allocator();
        let mut aggregator = SeriesAggregator::new(&mut allocator, None);
        aggregator.ingest(&double_series("pod-a", &[-2.5, 1.0])).unwrap();

        let aggregated = aggregator.finish().unwrap();
        assert_eq!(aggregated.running_min, -2.5);
        assert_eq!(aggregated.running_max, 1.0);
    }
}
