use crate::repository::node_registry::NodeRegistry;
use chrono::{DateTime, Utc};
use model::telemetry::MetricSample;
use model::{FunctionName, NodeName};
use prom::models::{MatrixResponse, PromSample};
use prom::{Configuration, QueryRange, QueryRangeClient};
use reqwest_middleware::ClientWithMiddleware;
use std::sync::Arc;
use tracing::{instrument, warn};

/// CPU usage rate aggregated by pod, in cores.
const CPU_QUERY: &str = "sum (rate (container_cpu_usage_seconds_total{image!=\"\", \
                         namespace=\"openfaas-fn\"}[1m])) by (pod)";
/// Working set aggregated by pod, in megabytes.
const MEMORY_QUERY: &str =
    "sum by (pod) \
     (container_memory_working_set_bytes{cluster=\"\",container!=\"\",\
     image!=\"\",job=\"kubelet\",metrics_path=\"/metrics/cadvisor\",\
     namespace=\"openfaas-fn\"})/1000000";
const SAMPLING_STEP: &str = "1s";

#[derive(Debug, Clone, Copy)]
pub enum MetricKind {
    Cpu,
    Memory,
}

impl MetricKind {
    fn query(&self) -> &'static str {
        match self {
            MetricKind::Cpu => CPU_QUERY,
            MetricKind::Memory => MEMORY_QUERY,
        }
    }
}

/// Pulls resource usage series from the metrics store of the node that
/// served an invocation. Best-effort enrichment only: every failure path
/// degrades to an empty sample sequence.
#[derive(Debug)]
pub struct MetricsFetcher {
    registry: Arc<NodeRegistry>,
    client:   Arc<ClientWithMiddleware>,
}

impl MetricsFetcher {
    pub fn new(
        registry: Arc<NodeRegistry>,
        client: Arc<ClientWithMiddleware>,
    ) -> Self {
        Self { registry, client }
    }

    /// Single range query per (function, node, window, kind) tuple; no
    /// retry.
    #[instrument(level = "trace", skip(self))]
    pub async fn fetch(
        &self,
        function: &FunctionName,
        node: &NodeName,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        kind: MetricKind,
    ) -> Vec<MetricSample> {
        let Some(record) = self.registry.get(node) else {
            warn!(
                "Node {} vanished from the registry, skipping the {:?} fetch",
                node, kind
            );
            return Vec::new();
        };

        let client = QueryRangeClient::new(
            Configuration { base_path: record.prometheus_url },
            self.client.clone(),
        );
        match client.query_range(kind.query(), start, end, SAMPLING_STEP).await
        {
            Ok(response) => samples_for(&response, function),
            Err(err) => {
                warn!(
                    "Failed to fetch {:?} samples for {}: {}",
                    kind, function, err
                );
                Vec::new()
            }
        }
    }
}

/// Pod labels carry a deployment hash and replica suffix appended by the
/// orchestrator, hence the prefix match instead of an equality.
fn samples_for(
    response: &MatrixResponse,
    function: &FunctionName,
) -> Vec<MetricSample> {
    let prefix = function.to_string();
    response
        .data
        .result
        .iter()
        .find(|series| series.metric.pod.starts_with(&prefix))
        .map(|series| series.values.iter().filter_map(to_sample).collect())
        .unwrap_or_default()
}

fn to_sample(value: &PromSample) -> Option<MetricSample> {
    let parsed = value.1.parse::<f64>().ok()?;
    Some(MetricSample { timestamp: value.0, value: parsed })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CPU: &str = r#"{"status":"success","data":{"resultType":"matrix","result":[{"metric":{"pod":"cows-74b8bd9675-wl6hd"},"values":[[1680708154,"19.103744"]]},{"metric":{"pod":"curl-644d87d8f7-lmdrj"},"values":[[1680708154,"3.780608"]]}]}}"#;

    fn response() -> MatrixResponse { serde_json::from_str(CPU).unwrap() }

    #[test]
    fn selects_the_series_whose_pod_matches_the_prefix() {
        let samples = samples_for(
            &response(),
            &FunctionName::try_new("cows").unwrap(),
        );

        assert_eq!(
            samples,
            vec![MetricSample { timestamp: 1680708154.0, value: 19.103744 }]
        );
    }

    #[test]
    fn no_matching_prefix_yields_an_empty_sequence() {
        let samples = samples_for(
            &response(),
            &FunctionName::try_new("shasum").unwrap(),
        );

        assert!(samples.is_empty());
    }

    #[test]
    fn unparsable_values_are_skipped() {
        let raw = r#"{"status":"success","data":{"resultType":"matrix","result":[{"metric":{"pod":"cows-1"},"values":[[1680708154,"oops"],[1680708155,"1.5"]]}]}}"#;
        let response: MatrixResponse = serde_json::from_str(raw).unwrap();

        let samples =
            samples_for(&response, &FunctionName::try_new("cows").unwrap());

        assert_eq!(
            samples,
            vec![MetricSample { timestamp: 1680708155.0, value: 1.5 }]
        );
    }
}
