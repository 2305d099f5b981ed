// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod monitoring_repository;
pub mod plotters_renderer;
