//! Border wait time feed access
//!
//! The HTTP client returns raw per-port records; the fetcher picks out the
//! configured crossing and normalizes its lane delays into a snapshot.

pub mod client;
pub mod fetcher;
pub mod model;

pub use client::{FetchError, HttpMetricSource, MetricSource};
pub use fetcher::MetricFetcher;
pub use model::{MetricSnapshot, PortRecord};
