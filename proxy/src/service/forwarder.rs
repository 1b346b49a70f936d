use crate::repository::node_registry::NodeRegistry;
use crate::service::telemetry::TelemetryService;
use bytes::Bytes;
use model::telemetry::RequestTiming;
use model::{FunctionName, NodeName};
use reqwest::header::CONTENT_TYPE;
use reqwest_middleware::ClientWithMiddleware;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

const START_TIME_HEADER: &str = "X-Start-Time";
const DURATION_HEADER: &str = "X-Duration-Seconds";
const COMPUTATION_HEADER: &str = "X-Computation-Seconds";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Node {0} is not part of the configured node registry")]
    UnknownNode(NodeName),
    #[error(transparent)]
    Transport(#[from] reqwest_middleware::Error),
    #[error("Failed to read the response body from the compute node")]
    Body(#[source] reqwest::Error),
}

/// What came back from the compute node, relayed verbatim to the caller.
#[derive(Debug, Clone)]
pub struct ForwardedResponse {
    pub status:       u16,
    pub content_type: Option<String>,
    pub body:         Bytes,
}

/// Relays an invocation to the selected compute node and, on success,
/// hands a timing record to the telemetry pipeline without blocking the
/// caller.
#[derive(Debug)]
pub struct Forwarder {
    registry:  Arc<NodeRegistry>,
    client:    Arc<ClientWithMiddleware>,
    telemetry: Arc<TelemetryService>,
}

impl Forwarder {
    pub fn new(
        registry: Arc<NodeRegistry>,
        client: Arc<ClientWithMiddleware>,
        telemetry: Arc<TelemetryService>,
    ) -> Self {
        Self { registry, client, telemetry }
    }

    /// Exactly one outbound POST; an unknown node fails before any
    /// network call.
    #[instrument(level = "trace", skip(self, params, headers, body))]
    pub async fn forward(
        &self,
        node: NodeName,
        function: FunctionName,
        params: HashMap<String, String>,
        headers: Vec<(String, String)>,
        body: Bytes,
    ) -> Result<ForwardedResponse, Error> {
        let Some(record) = self.registry.get(&node) else {
            return Err(Error::UnknownNode(node));
        };
        let url = format!("{}{}", record.invocation_url, function);

        let mut builder = self.client.post(&url).body(body);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        let response = builder.send().await?;
        info!("Forwarded to {}", url);

        let status = response.status();
        let timing = RequestTiming::from_headers(
            header_str(&response, START_TIME_HEADER),
            header_str(&response, DURATION_HEADER),
            header_str(&response, COMPUTATION_HEADER),
        );
        let content_type = header_str(&response, CONTENT_TYPE.as_str())
            .map(str::to_owned);
        let body = response.bytes().await.map_err(Error::Body)?;

        if status.is_success() {
            // Runs after the response is handed back; only successful
            // invocations are measured.
            self.telemetry.emit(function, node, timing, params);
        } else {
            warn!(
                "Non success response {} from the compute node: {:?}",
                status,
                String::from_utf8_lossy(&body)
            );
        }

        Ok(ForwardedResponse {
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

fn header_str<'a>(response: &'a reqwest::Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::log_store::LogStore;
    use crate::repository::metrics::MetricsFetcher;
    use crate::repository::telemetry_buffer::TelemetryBuffer;
    use async_trait::async_trait;
    use model::dto::node::{NodeRecord, NodeRegistryDisk};
    use model::telemetry::TelemetryRecord;
    use reqwest_middleware::ClientBuilder;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[derive(Debug, Default)]
    struct SinkStore;

    #[async_trait]
    impl LogStore for SinkStore {
        async fn persist(
            &self,
            _batch: Vec<TelemetryRecord>,
        ) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn forwarder_with(
        nodes: HashMap<String, NodeRecord>,
    ) -> (Forwarder, Arc<TelemetryBuffer>) {
        let registry = Arc::new(
            NodeRegistry::try_from(NodeRegistryDisk { nodes }).unwrap(),
        );
        let client =
            Arc::new(ClientBuilder::new(reqwest::Client::new()).build());
        let buffer =
            Arc::new(TelemetryBuffer::new(8, Arc::new(SinkStore)));
        let telemetry = Arc::new(TelemetryService::new(
            Arc::new(MetricsFetcher::new(registry.clone(), client.clone())),
            buffer.clone(),
        ));
        (Forwarder::new(registry, client, telemetry), buffer)
    }

    fn one_node(invocation_url: String) -> HashMap<String, NodeRecord> {
        HashMap::from([(
            "edge1".to_owned(),
            NodeRecord {
                invocation_url,
                prometheus_url: "http://127.0.0.1:1/".to_owned(),
            },
        )])
    }

    /// Answers exactly one connection with a fixed raw HTTP response.
    async fn stub_node(response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;
            let _ = socket.write_all(response.as_bytes()).await;
        });
        format!("http://{}/function/", addr)
    }

    async fn forward(
        forwarder: &Forwarder,
    ) -> Result<ForwardedResponse, Error> {
        forwarder
            .forward(
                NodeName::try_new("edge1").unwrap(),
                FunctionName::try_new("cows").unwrap(),
                HashMap::new(),
                Vec::new(),
                Bytes::new(),
            )
            .await
    }

    #[tokio::test]
    async fn unknown_node_fails_without_any_telemetry() {
        let (forwarder, buffer) = forwarder_with(HashMap::new());

        let res = forward(&forwarder).await;

        assert!(matches!(res, Err(Error::UnknownNode(_))));
        assert_eq!(buffer.len().await, 0);
    }

    #[tokio::test]
    async fn a_non_success_response_is_relayed_without_telemetry() {
        let url = stub_node(
            "HTTP/1.1 500 Internal Server Error\r\n\
             content-length: 5\r\n\
             connection: close\r\n\r\noops!",
        )
        .await;
        let (forwarder, buffer) = forwarder_with(one_node(url));

        let res = forward(&forwarder).await.unwrap();

        assert_eq!(res.status, 500);
        assert_eq!(&res.body[..], b"oops!");
        assert_eq!(buffer.len().await, 0);
    }

    #[tokio::test]
    async fn a_connection_failure_leaves_no_telemetry() {
        // Bind then drop to obtain a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let (forwarder, buffer) = forwarder_with(one_node(format!(
            "http://{}/function/",
            addr
        )));

        let res = forward(&forwarder).await;

        assert!(matches!(res, Err(Error::Transport(_))));
        assert_eq!(buffer.len().await, 0);
    }
}
