use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest_middleware::ClientWithMiddleware;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{instrument, trace};

use crate::models::MatrixResponse;
use crate::{configuration, Error};

#[derive(Clone, Debug)]
pub struct QueryRangeClient {
    configuration: configuration::Configuration,
    client:        Arc<ClientWithMiddleware>,
}

impl QueryRangeClient {
    pub fn new(
        configuration: configuration::Configuration,
        client: Arc<ClientWithMiddleware>,
    ) -> QueryRangeClient {
        QueryRangeClient { configuration, client }
    }
}

#[async_trait]
pub trait QueryRange: Debug + Sync + Send {
    /// `POST <base>/api/v1/query_range`, start/end sent as RFC3339 UTC.
    async fn query_range(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: &str,
    ) -> Result<MatrixResponse, Error>;
}

#[async_trait]
impl QueryRange for QueryRangeClient {
    #[instrument(level = "trace", skip(self, query))]
    async fn query_range(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step: &str,
    ) -> Result<MatrixResponse, Error> {
        let uri_str =
            format!("{}/api/v1/query_range", self.configuration.base_path);
        trace!("Requesting {}", uri_str);

        let response = self
            .client
            .post(&uri_str)
            .query(&[
                (
                    "start",
                    start.to_rfc3339_opts(SecondsFormat::Secs, true),
                ),
                ("end", end.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("step", step.to_string()),
                ("query", query.to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Error::Status(
                response.status(),
                response.text().await.unwrap_or_default(),
            ));
        }

        Ok(helper::reqwest_helper::deserialize_response(response).await?)
    }
}
