// Telemetry data domain models
use crate::error::{PlotError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Value encoding declared by the backend for a whole series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Int64,
    Double,
    Bool,
    String,
    Distribution,
    Unspecified,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Int64 => "INT64",
            ValueType::Double => "DOUBLE",
            ValueType::Bool => "BOOL",
            ValueType::String => "STRING",
            ValueType::Distribution => "DISTRIBUTION",
            ValueType::Unspecified => "VALUE_TYPE_UNSPECIFIED",
        };
        f.write_str(name)
    }
}

/// A sample value exactly as the backend encoded it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypedValue {
    Int64(i64),
    Double(f64),
    Bool(bool),
    String(String),
    Distribution,
}

impl TypedValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            TypedValue::Int64(_) => ValueType::Int64,
            TypedValue::Double(_) => ValueType::Double,
            TypedValue::Bool(_) => ValueType::Bool,
            TypedValue::String(_) => ValueType::String,
            TypedValue::Distribution => ValueType::Distribution,
        }
    }

    /// Numeric value, for the two encodings that can be plotted.
    pub fn to_f64(&self) -> Result<f64> {
        match self {
            TypedValue::Int64(v) => Ok(*v as f64),
            TypedValue::Double(v) => Ok(*v),
            other => Err(PlotError::UnsupportedValueType(other.value_type().to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawPoint {
    pub timestamp_secs: i64,
    pub value: TypedValue,
}

impl RawPoint {
    pub fn new(timestamp_secs: i64, value: TypedValue) -> Self {
        Self {
            timestamp_secs,
            value,
        }
    }
}

pub const METRIC_LABEL_PREFIX: &str = "metric.labels.";
pub const RESOURCE_LABEL_PREFIX: &str = "resource.labels.";

/// One series as returned by the transport, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawTimeSeries {
    pub metric_type: String,
    pub value_type: ValueType,
    pub metric_labels: BTreeMap<String, String>,
    pub resource_labels: BTreeMap<String, String>,
    pub points: Vec<RawPoint>,
}

impl RawTimeSeries {
    pub fn new(metric_type: impl Into<String>, value_type: ValueType, points: Vec<RawPoint>) -> Self {
        Self {
            metric_type: metric_type.into(),
            value_type,
            metric_labels: BTreeMap::new(),
            resource_labels: BTreeMap::new(),
            points,
        }
    }

    pub fn with_metric_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metric_labels.insert(key.into(), value.into());
        self
    }

    pub fn with_resource_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.resource_labels.insert(key.into(), value.into());
        self
    }

    /// Look a label up by key. `metric.labels.<k>` and `resource.labels.<k>`
    /// only search their own map; any other key is reduced to its last
    /// segment and tried against metric labels, then resource labels.
    pub fn label(&self, key: &str) -> Option<&str> {
        if let Some(key) = key.strip_prefix(METRIC_LABEL_PREFIX) {
            return self.metric_labels.get(key).map(String::as_str);
        }
        if let Some(key) = key.strip_prefix(RESOURCE_LABEL_PREFIX) {
            return self.resource_labels.get(key).map(String::as_str);
        }

        let key = key.rsplit('.').next().unwrap_or(key);
        self.metric_labels
            .get(key)
            .or_else(|| self.resource_labels.get(key))
            .map(String::as_str)
    }

    /// Convert every point to `f64`. Only integer and double series can be
    /// plotted; anything else fails naming the encoding.
    pub fn normalized_points(&self) -> Result<Vec<Point>> {
        match self.value_type {
            ValueType::Int64 | ValueType::Double => {}
            other => return Err(PlotError::UnsupportedValueType(other.to_string())),
        }

        self.points
            .iter()
            .map(|p| {
                let timestamp = DateTime::<Utc>::from_timestamp(p.timestamp_secs, 0)
                    .ok_or(PlotError::InvalidTimestamp(p.timestamp_secs))?;
                Ok(Point::new(timestamp, p.value.to_f64()?))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl Point {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedSeries {
    pub name: String,
    pub points: Vec<Point>,
}

impl NamedSeries {
    pub fn new(name: String, points: Vec<Point>) -> Self {
        Self { name, points }
    }

    /// Largest value in the series, `None` when it has no points.
    pub fn max_value(&self) -> Option<f64> {
        self.points.iter().map(|p| p.value).reduce(f64::max)
    }

    pub fn min_value(&self) -> Option<f64> {
        self.points.iter().map(|p| p.value).reduce(f64::min)
    }
}
