use crate::repository::log_store::LogStore;
use helper::log_err;
use model::telemetry::TelemetryRecord;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

#[derive(Debug)]
struct Pending {
    records:    Vec<TelemetryRecord>,
    last_flush: Instant,
}

/// Bounded queue of telemetry records awaiting persistence.
///
/// Both flush triggers (size and staleness) snapshot-and-swap the pending
/// batch under the lock and write to the store after releasing it, so a
/// slow store never blocks producers and a timer tick can never re-flush
/// a batch a size-triggered flush just drained.
#[derive(Debug)]
pub struct TelemetryBuffer {
    pending:  Mutex<Pending>,
    capacity: usize,
    store:    Arc<dyn LogStore>,
}

impl TelemetryBuffer {
    pub fn new(capacity: usize, store: Arc<dyn LogStore>) -> Self {
        Self {
            pending: Mutex::new(Pending {
                records:    Vec::with_capacity(capacity),
                last_flush: Instant::now(),
            }),
            capacity,
            store,
        }
    }

    /// Appends in arrival order; reaching capacity flushes in line, from
    /// the enqueuing task.
    pub async fn enqueue(&self, record: TelemetryRecord) {
        let batch = {
            let mut pending = self.pending.lock().await;
            pending.records.push(record);
            if pending.records.len() >= self.capacity {
                Some(Self::swap_batch(&mut pending))
            } else {
                None
            }
        };
        if let Some(batch) = batch {
            self.persist(batch).await;
        }
    }

    /// Timer-triggered path: flushes only when records have been waiting
    /// longer than `timeout` since the last flush of any kind.
    pub async fn flush_if_stale(&self, timeout: Duration) {
        let batch = {
            let mut pending = self.pending.lock().await;
            if pending.records.is_empty()
                || pending.last_flush.elapsed() <= timeout
            {
                None
            } else {
                Some(Self::swap_batch(&mut pending))
            }
        };
        if let Some(batch) = batch {
            self.persist(batch).await;
        }
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.records.len()
    }

    fn swap_batch(pending: &mut Pending) -> Vec<TelemetryRecord> {
        pending.last_flush = Instant::now();
        std::mem::take(&mut pending.records)
    }

    /// Best-effort: a failed bulk write drops the batch, there is no
    /// durable outbox.
    async fn persist(&self, batch: Vec<TelemetryRecord>) {
        trace!("Flushing {} telemetry records", batch.len());
        let res = self.store.persist(batch).await;
        log_err!(res);
    }
}
