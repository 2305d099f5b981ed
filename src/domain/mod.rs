// Domain layer - query, series and chart models
pub mod chart;
pub mod metric_query;
pub mod palette;
pub mod telemetry;
pub mod time_window;
