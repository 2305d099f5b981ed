// Application layer - query execution, aggregation and chart assembly
pub mod chart_service;
pub mod metric_client;
pub mod plot_service;
pub mod series_aggregator;
