//! Thin client for the range-query endpoint of a Prometheus-compatible
//! metrics store.

mod configuration;
pub mod models;
mod query_api;

pub use configuration::Configuration;
pub use query_api::{QueryRange, QueryRangeClient};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("The metrics store answered {0}: {1}")]
    Status(reqwest::StatusCode, String),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    Middleware(#[from] reqwest_middleware::Error),
    #[error(transparent)]
    Deserialize(#[from] anyhow::Error),
}
