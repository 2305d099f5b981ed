// Metric query builder and the request descriptor it produces
use crate::domain::telemetry::METRIC_LABEL_PREFIX;
use crate::domain::time_window::TimeWindow;
use crate::error::{PlotError, QueryField, Result};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Filter used when no override is supplied. `${metric}` is replaced with the
/// metric descriptor.
pub const DEFAULT_QUERY_FILTER: &str = "resource.type = \"global\" AND metric.type = \"${metric}\"";

macro_rules! api_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_uppercase();
                match wanted.as_str() {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(format!("unknown {} {:?}", stringify!($name), s)),
                }
            }
        }
    };
}

api_enum! {
    /// Per-series transform applied to each alignment bucket.
    Aligner {
        None => "ALIGN_NONE",
        Delta => "ALIGN_DELTA",
        Rate => "ALIGN_RATE",
        Interpolate => "ALIGN_INTERPOLATE",
        NextOlder => "ALIGN_NEXT_OLDER",
        Min => "ALIGN_MIN",
        Max => "ALIGN_MAX",
        Mean => "ALIGN_MEAN",
        Count => "ALIGN_COUNT",
        Sum => "ALIGN_SUM",
        Stddev => "ALIGN_STDDEV",
        CountTrue => "ALIGN_COUNT_TRUE",
        CountFalse => "ALIGN_COUNT_FALSE",
        FractionTrue => "ALIGN_FRACTION_TRUE",
        Percentile99 => "ALIGN_PERCENTILE_99",
        Percentile95 => "ALIGN_PERCENTILE_95",
        Percentile50 => "ALIGN_PERCENTILE_50",
        Percentile05 => "ALIGN_PERCENTILE_05",
        PercentChange => "ALIGN_PERCENT_CHANGE",
    }
}

api_enum! {
    /// Operation collapsing several series into one.
    Reducer {
        None => "REDUCE_NONE",
        Mean => "REDUCE_MEAN",
        Min => "REDUCE_MIN",
        Max => "REDUCE_MAX",
        Sum => "REDUCE_SUM",
        Stddev => "REDUCE_STDDEV",
        Count => "REDUCE_COUNT",
        CountTrue => "REDUCE_COUNT_TRUE",
        CountFalse => "REDUCE_COUNT_FALSE",
        FractionTrue => "REDUCE_FRACTION_TRUE",
        Percentile99 => "REDUCE_PERCENTILE_99",
        Percentile95 => "REDUCE_PERCENTILE_95",
        Percentile50 => "REDUCE_PERCENTILE_50",
        Percentile05 => "REDUCE_PERCENTILE_05",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregationSettings {
    pub alignment_period: Duration,
    pub per_series_aligner: Aligner,
    pub cross_series_reducer: Reducer,
    pub group_by_fields: Vec<String>,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            alignment_period: Duration::minutes(1),
            per_series_aligner: Aligner::Rate,
            cross_series_reducer: Reducer::Mean,
            group_by_fields: Vec::new(),
        }
    }
}

/// A single aggregation override. Options are applied in order on top of the
/// defaults; a later option wins when two touch the same field.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationOption {
    AlignmentPeriod(Duration),
    PerSeriesAligner(Aligner),
    CrossSeriesReducer(Reducer),
    GroupByFields(Vec<String>),
}

impl AggregationOption {
    /// Group by a label key. Bare keys are taken as metric labels.
    pub fn group_by(key: &str) -> Self {
        AggregationOption::GroupByFields(vec![group_by_field(key)])
    }

    pub fn apply(&self, settings: &mut AggregationSettings) {
        match self {
            AggregationOption::AlignmentPeriod(period) => settings.alignment_period = *period,
            AggregationOption::PerSeriesAligner(aligner) => settings.per_series_aligner = *aligner,
            AggregationOption::CrossSeriesReducer(reducer) => {
                settings.cross_series_reducer = *reducer
            }
            AggregationOption::GroupByFields(fields) => settings.group_by_fields = fields.clone(),
        }
    }
}

/// Expand a group-by key to a fully qualified field: `pod` -> `metric.labels.pod`.
pub fn group_by_field(key: &str) -> String {
    if key.contains('.') {
        key.to_string()
    } else {
        format!("{METRIC_LABEL_PREFIX}{key}")
    }
}

/// Replace `${var}` placeholders in a template.
pub fn prepare_query(template: &str, vars: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        let placeholder = format!("${{{}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

/// Fully built request, ready to hand to a `MetricClient`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQueryDescriptor {
    pub project: String,
    pub target: String,
    pub filter: String,
    pub window: TimeWindow,
    pub aggregation: AggregationSettings,
}

impl MetricQueryDescriptor {
    /// Resource name of the project, as the monitoring API expects it.
    pub fn name(&self) -> String {
        format!("projects/{}", self.project)
    }
}

/// Collects the parts of a time series request.
///
/// Required: project, a metric descriptor (or a filter override) and a start
/// time. The end time defaults to the build instant.
#[derive(Debug, Clone)]
pub struct MetricQuery {
    project: String,
    metric_descriptor: String,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    filter_template: String,
    query_filter: Option<String>,
    aggregation_options: Vec<AggregationOption>,
}

impl MetricQuery {
    pub fn new(
        project: impl Into<String>,
        metric_descriptor: impl Into<String>,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            project: project.into(),
            metric_descriptor: metric_descriptor.into(),
            start_time,
            end_time,
            filter_template: DEFAULT_QUERY_FILTER.to_string(),
            query_filter: None,
            aggregation_options: Vec::new(),
        }
    }

    /// Replace the generated filter entirely. The override is not checked
    /// against the metric descriptor.
    pub fn set_query_filter(&mut self, filter: impl Into<String>) -> &mut Self {
        let filter = filter.into();
        self.query_filter = (!filter.is_empty()).then_some(filter);
        self
    }

    /// Template used to derive the filter from the metric descriptor.
    pub fn set_filter_template(&mut self, template: impl Into<String>) -> &mut Self {
        self.filter_template = template.into();
        self
    }

    pub fn with_aggregation(&mut self, option: AggregationOption) -> &mut Self {
        self.aggregation_options.push(option);
        self
    }

    pub fn set_alignment_period(&mut self, period: Duration) -> &mut Self {
        self.with_aggregation(AggregationOption::AlignmentPeriod(period))
    }

    pub fn set_per_series_aligner(&mut self, aligner: Aligner) -> &mut Self {
        self.with_aggregation(AggregationOption::PerSeriesAligner(aligner))
    }

    pub fn set_cross_series_reducer(&mut self, reducer: Reducer) -> &mut Self {
        self.with_aggregation(AggregationOption::CrossSeriesReducer(reducer))
    }

    pub fn set_group_by(&mut self, key: &str) -> &mut Self {
        self.with_aggregation(AggregationOption::group_by(key))
    }

    pub fn build(&self) -> Result<MetricQueryDescriptor> {
        self.build_at(Utc::now())
    }

    /// Build the descriptor, using `now` as the end time when none was set.
    pub fn build_at(&self, now: DateTime<Utc>) -> Result<MetricQueryDescriptor> {
        if self.project.is_empty() {
            return Err(PlotError::MissingField(QueryField::Project));
        }
        if self.metric_descriptor.is_empty() && self.query_filter.is_none() {
            return Err(PlotError::MissingField(QueryField::Target));
        }
        let start = self
            .start_time
            .ok_or(PlotError::MissingField(QueryField::StartTime))?;
        let end = self.end_time.unwrap_or(now);
        let window = TimeWindow::new(start, end)?;

        let filter = match &self.query_filter {
            Some(filter) => filter.clone(),
            None => {
                let mut vars = HashMap::new();
                vars.insert("metric".to_string(), self.metric_descriptor.clone());
                prepare_query(&self.filter_template, &vars)
            }
        };

        let mut aggregation = AggregationSettings::default();
        for option in &self.aggregation_options {
            option.apply(&mut aggregation);
        }

        tracing::debug!(
            project = %self.project,
            filter = %filter,
            "built metric query"
        );

        Ok(MetricQueryDescriptor {
            project: self.project.clone(),
            target: self.metric_descriptor.clone(),
            filter,
            window,
            aggregation,
        })
    }
}
