// Error types for the query and plotting pipeline
use std::fmt;
use thiserror::Error;

/// Field of a metric query that must be present before a request can be built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryField {
    Project,
    Target,
    StartTime,
}

impl fmt::Display for QueryField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryField::Project => write!(f, "project"),
            QueryField::Target => write!(f, "metric descriptor or filter"),
            QueryField::StartTime => write!(f, "start time"),
        }
    }
}

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("malformed time expression {0:?}, expected \"now\", -<n>m or -<n>h")]
    MalformedTime(String),

    #[error("invalid time frame: start {start:?} and end {end:?} resolve to the same instant")]
    InvalidTimeFrame { start: String, end: String },

    #[error("metric query missing {0}")]
    MissingField(QueryField),

    #[error(transparent)]
    Transport(#[from] anyhow::Error),

    #[error("unsupported value type {0}")]
    UnsupportedValueType(String),

    #[error("timestamp {0} is out of range")]
    InvalidTimestamp(i64),

    #[error("no data to plot")]
    NoData,

    #[error("rendering error: {0}")]
    Render(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PlotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_names_the_field() {
        let err = PlotError::MissingField(QueryField::Project);
        assert_eq!(err.to_string(), "metric query missing project");

        let err = PlotError::MissingField(QueryField::Target);
        assert_eq!(err.to_string(), "metric query missing metric descriptor or filter");
    }

    #[test]
    fn test_transport_error_is_verbatim() {
        let err = PlotError::from(anyhow::anyhow!("backend unavailable"));
        assert_eq!(err.to_string(), "backend unavailable");
    }
}
