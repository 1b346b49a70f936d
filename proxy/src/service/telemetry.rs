use crate::repository::metrics::{MetricKind, MetricsFetcher};
use crate::repository::telemetry_buffer::TelemetryBuffer;
use model::telemetry::{RequestTiming, TelemetryRecord};
use model::{FunctionName, NodeName};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Builds telemetry records off the request's critical path and feeds the
/// buffer. Nothing in here may surface to, delay, or alter the response
/// already returned to the original caller.
#[derive(Debug)]
pub struct TelemetryService {
    fetcher: Arc<MetricsFetcher>,
    buffer:  Arc<TelemetryBuffer>,
}

impl TelemetryService {
    pub fn new(
        fetcher: Arc<MetricsFetcher>,
        buffer: Arc<TelemetryBuffer>,
    ) -> Self {
        Self { fetcher, buffer }
    }

    /// Fire-and-forget, called exactly once per successful forward.
    pub fn emit(
        self: &Arc<Self>,
        function: FunctionName,
        node: NodeName,
        timing: RequestTiming,
        params: HashMap<String, String>,
    ) {
        let this = self.clone();
        tokio::spawn(async move {
            this.record(function, node, timing, params).await;
        });
    }

    #[instrument(level = "trace", skip(self, params))]
    async fn record(
        &self,
        function: FunctionName,
        node: NodeName,
        timing: RequestTiming,
        params: HashMap<String, String>,
    ) {
        let start = timing.start();
        let end = timing.end();
        let cpu = self
            .fetcher
            .fetch(&function, &node, start, end, MetricKind::Cpu)
            .await;
        let mem = self
            .fetcher
            .fetch(&function, &node, start, end, MetricKind::Memory)
            .await;

        let record =
            TelemetryRecord::new(function, node, timing, params, cpu, mem);
        debug!(
            "Recording invocation of {} on {}: {}s",
            record.function, record.node, record.duration
        );
        self.buffer.enqueue(record).await;
    }
}
