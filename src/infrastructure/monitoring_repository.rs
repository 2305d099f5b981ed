// Cloud Monitoring REST client implementation
use crate::application::metric_client::{MetricClient, TimeSeriesPage};
use crate::domain::metric_query::MetricQueryDescriptor;
use crate::domain::telemetry::{RawPoint, RawTimeSeries, TypedValue, ValueType};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct MonitoringRepository {
    endpoint: String,
    access_token: Option<String>,
    page_size: Option<u32>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTimeSeriesResponse {
    #[serde(default)]
    time_series: Vec<ApiTimeSeries>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTimeSeries {
    #[serde(default)]
    metric: ApiLabeled,
    #[serde(default)]
    resource: ApiLabeled,
    #[serde(default)]
    value_type: Option<String>,
    #[serde(default)]
    points: Vec<ApiPoint>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiLabeled {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    labels: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct ApiPoint {
    interval: ApiInterval,
    value: ApiTypedValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInterval {
    end_time: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTypedValue {
    // int64 values are encoded as JSON strings
    int64_value: Option<String>,
    double_value: Option<f64>,
    bool_value: Option<bool>,
    string_value: Option<String>,
    distribution_value: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

impl MonitoringRepository {
    pub fn new(endpoint: String, access_token: Option<String>, page_size: Option<u32>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            access_token,
            page_size,
            client: reqwest::Client::new(),
        }
    }

    fn build_query_url(&self, request: &MetricQueryDescriptor, page_token: Option<&str>) -> String {
        let rfc3339 = |t: chrono::DateTime<chrono::Utc>| t.to_rfc3339_opts(SecondsFormat::Secs, true);
        let aggregation = &request.aggregation;

        let mut params: Vec<(&str, String)> = vec![
            ("filter", request.filter.clone()),
            ("interval.startTime", rfc3339(request.window.start())),
            ("interval.endTime", rfc3339(request.window.end())),
            (
                "aggregation.alignmentPeriod",
                format!("{}s", aggregation.alignment_period.num_seconds()),
            ),
            ("aggregation.perSeriesAligner", aggregation.per_series_aligner.to_string()),
            ("aggregation.crossSeriesReducer", aggregation.cross_series_reducer.to_string()),
        ];
        for field in &aggregation.group_by_fields {
            params.push(("aggregation.groupByFields", field.clone()));
        }
        params.push(("view", "FULL".to_string()));
        if let Some(size) = self.page_size {
            params.push(("pageSize", size.to_string()));
        }
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }

        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        format!("{}/v3/{}/timeSeries?{}", self.endpoint, request.name(), query)
    }

    async fn execute_query(&self, url: &str) -> Result<ListTimeSeriesResponse> {
        let mut builder = self.client.get(url).header("Accept", "application/json");
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .context("Failed to send request to Cloud Monitoring")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(api) => anyhow::bail!(
                    "Cloud Monitoring query failed with status {}: {} {}",
                    status,
                    api.error.status,
                    api.error.message
                ),
                Err(_) => anyhow::bail!("Cloud Monitoring query failed with status {}: {}", status, body),
            }
        }

        response
            .json::<ListTimeSeriesResponse>()
            .await
            .context("Failed to parse Cloud Monitoring response")
    }
}

#[async_trait]
impl MetricClient for MonitoringRepository {
    async fn list_time_series_page(
        &self,
        request: &MetricQueryDescriptor,
        page_token: Option<&str>,
    ) -> Result<TimeSeriesPage> {
        let url = self.build_query_url(request, page_token);
        tracing::debug!("Executing time series query: {}", url);

        let response = self.execute_query(&url).await?;
        let time_series = response
            .time_series
            .into_iter()
            .map(to_raw_series)
            .collect::<Result<Vec<_>>>()?;

        Ok(TimeSeriesPage {
            time_series,
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}

fn parse_value_type(value_type: Option<&str>) -> ValueType {
    match value_type {
        Some("INT64") => ValueType::Int64,
        Some("DOUBLE") => ValueType::Double,
        Some("BOOL") => ValueType::Bool,
        Some("STRING") => ValueType::String,
        Some("DISTRIBUTION") => ValueType::Distribution,
        _ => ValueType::Unspecified,
    }
}

fn to_typed_value(value: ApiTypedValue) -> Result<TypedValue> {
    if let Some(raw) = value.int64_value {
        let parsed = raw
            .parse::<i64>()
            .with_context(|| format!("Invalid int64Value {:?}", raw))?;
        return Ok(TypedValue::Int64(parsed));
    }
    if let Some(v) = value.double_value {
        return Ok(TypedValue::Double(v));
    }
    if let Some(v) = value.bool_value {
        return Ok(TypedValue::Bool(v));
    }
    if let Some(v) = value.string_value {
        return Ok(TypedValue::String(v));
    }
    if value.distribution_value.is_some() {
        return Ok(TypedValue::Distribution);
    }
    anyhow::bail!("Point has no value")
}

fn to_raw_series(series: ApiTimeSeries) -> Result<RawTimeSeries> {
    let value_type = parse_value_type(series.value_type.as_deref());

    let points = series
        .points
        .into_iter()
        .map(|p| {
            let end_time = chrono::DateTime::parse_from_rfc3339(&p.interval.end_time)
                .with_context(|| format!("Invalid point end time {:?}", p.interval.end_time))?;
            Ok(RawPoint::new(end_time.timestamp(), to_typed_value(p.value)?))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RawTimeSeries {
        metric_type: series.metric.kind,
        value_type,
        metric_labels: series.metric.labels,
        resource_labels: series.resource.labels,
        points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metric_query::MetricQuery;
    use chrono::{Duration, TimeZone, Utc};

    const RESPONSE: &str = r#"{
      "timeSeries": [
        {
          "metric": {"type": "custom.googleapis.com/svc/metric", "labels": {"pod": "pod-a"}},
          "resource": {"type": "k8s_container", "labels": {"zone": "us-east1-b"}},
          "metricKind": "GAUGE",
          "valueType": "INT64",
          "points": [
            {"interval": {"startTime": "2024-03-01T11:59:00Z", "endTime": "2024-03-01T12:00:00Z"}, "value": {"int64Value": "42"}},
            {"interval": {"endTime": "2024-03-01T11:59:00Z"}, "value": {"int64Value": "7"}}
          ]
        },
        {
          "metric": {"type": "custom.googleapis.com/svc/metric"},
          "resource": {"type": "global"},
          "valueType": "DOUBLE",
          "points": [
            {"interval": {"endTime": "2024-03-01T12:00:00.500Z"}, "value": {"doubleValue": 3.8}}
          ]
        }
      ],
      "nextPageToken": "abc"
    }"#;

    fn descriptor() -> MetricQueryDescriptor {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut query = MetricQuery::new("acme", "custom.googleapis.com/svc/metric", Some(now - Duration::hours(1)), None);
        query.set_group_by("pod");
        query.build_at(now).unwrap()
    }

    #[test]
    fn test_parse_response() {
        let response: ListTimeSeriesResponse = serde_json::from_str(RESPONSE).unwrap();
        assert_eq!(response.next_page_token.as_deref(), Some("abc"));

        let series: Vec<RawTimeSeries> = response
            .time_series
            .into_iter()
            .map(|s| to_raw_series(s).unwrap())
            .collect();

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].value_type, ValueType::Int64);
        assert_eq!(series[0].label("pod"), Some("pod-a"));
        assert_eq!(series[0].label("zone"), Some("us-east1-b"));
        assert_eq!(series[0].points[0], RawPoint::new(1_709_294_400, TypedValue::Int64(42)));
        assert_eq!(series[0].points[1].timestamp_secs, 1_709_294_340);

        assert_eq!(series[1].value_type, ValueType::Double);
        assert_eq!(series[1].points[0].value, TypedValue::Double(3.8));
        assert!(series[1].metric_labels.is_empty());
    }

    #[test]
    fn test_empty_response() {
        let response: ListTimeSeriesResponse = serde_json::from_str("{}").unwrap();
        assert!(response.time_series.is_empty());
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn test_typed_values() {
        let bad = ApiTypedValue {
            int64_value: Some("forty".to_string()),
            ..Default::default()
        };
        assert!(to_typed_value(bad).is_err());

        let dist: ApiTypedValue = serde_json::from_str(r#"{"distributionValue": {"count": "3"}}"#).unwrap();
        assert_eq!(to_typed_value(dist).unwrap(), TypedValue::Distribution);

        assert!(to_typed_value(ApiTypedValue::default()).is_err());
    }

    #[test]
    fn test_value_types() {
        assert_eq!(parse_value_type(Some("BOOL")), ValueType::Bool);
        assert_eq!(parse_value_type(Some("MONEY")), ValueType::Unspecified);
        assert_eq!(parse_value_type(None), ValueType::Unspecified);
    }

    #[test]
    fn test_build_query_url() {
        let repo = MonitoringRepository::new("https://monitoring.example.com/".to_string(), None, Some(500));
        let url = repo.build_query_url(&descriptor(), Some("next page"));

        assert!(url.starts_with("https://monitoring.example.com/v3/projects/acme/timeSeries?filter="));
        assert!(url.contains("interval.startTime=2024-03-01T11%3A00%3A00Z"));
        assert!(url.contains("interval.endTime=2024-03-01T12%3A00%3A00Z"));
        assert!(url.contains("aggregation.alignmentPeriod=60s"));
        assert!(url.contains("aggregation.perSeriesAligner=ALIGN_RATE"));
        assert!(url.contains("aggregation.crossSeriesReducer=REDUCE_MEAN"));
        assert!(url.contains("aggregation.groupByFields=metric.labels.pod"));
        assert!(url.contains("view=FULL"));
        assert!(url.contains("pageSize=500"));
        assert!(url.contains("pageToken=next%20page"));
    }

    #[test]
    fn test_build_query_url_first_page() {
        let repo = MonitoringRepository::new("https://monitoring.example.com".to_string(), None, None);
        let url = repo.build_query_url(&descriptor(), None);

        assert!(!url.contains("pageToken"));
        assert!(!url.contains("pageSize"));
        assert!(url.contains(
            "filter=resource.type%20%3D%20%22global%22%20AND%20metric.type%20%3D%20%22custom.googleapis.com%2Fsvc%2Fmetric%22"
        ));
    }
}
