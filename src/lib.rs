// Time-series metric queries rendered as line charts
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{PlotError, Result};
