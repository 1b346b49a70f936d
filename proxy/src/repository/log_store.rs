use anyhow::{Context, Result};
use async_trait::async_trait;
use model::telemetry::TelemetryRecord;
use mongodb::bson::doc;
use mongodb::{Client, Collection};
use nutype::nutype;
use std::fmt::Debug;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

#[nutype(derive(Clone, Debug), validate(not_empty))]
pub struct MongoUri(String);

#[nutype(derive(Clone, Debug), validate(not_empty, len_char_max = 64))]
pub struct MongoDatabase(String);

#[nutype(derive(Clone, Debug), validate(not_empty, len_char_max = 64))]
pub struct MongoCollection(String);

/// Owns the write path to the persistent log store.
#[async_trait]
pub trait LogStore: Debug + Send + Sync {
    /// One bulk write per batch; an error means the whole batch is lost.
    async fn persist(&self, batch: Vec<TelemetryRecord>) -> Result<()>;
}

#[derive(Debug)]
pub struct MongoLogStore {
    uri:        String,
    database:   String,
    collection: String,
    client:     Mutex<Option<Client>>,
}

impl MongoLogStore {
    pub fn new(
        uri: MongoUri,
        database: MongoDatabase,
        collection: MongoCollection,
    ) -> Self {
        Self {
            uri:        uri.into_inner(),
            database:   database.into_inner(),
            collection: collection.into_inner(),
            client:     Mutex::new(None),
        }
    }

    /// Lazily (re)establishes the connection. An already open client gets
    /// pinged first; a dead one is replaced once before the write.
    async fn handle(&self) -> Result<Client> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            if ping(client).await.is_ok() {
                return Ok(client.clone());
            }
            debug!("Log store connection went away, reconnecting");
            *guard = None;
        }

        let client = Client::with_uri_str(&self.uri)
            .await
            .context("Failed to connect to the log store")?;
        ping(&client)
            .await
            .context("The log store did not answer the liveness ping")?;
        info!("Connected to the log store.");
        *guard = Some(client.clone());
        Ok(client)
    }

    fn records(&self, client: &Client) -> Collection<TelemetryRecord> {
        client.database(&self.database).collection(&self.collection)
    }
}

async fn ping(client: &Client) -> Result<()> {
    client
        .database("admin")
        .run_command(doc! {"ping": 1})
        .await
        .context("Ping to the log store failed")?;
    Ok(())
}

#[async_trait]
impl LogStore for MongoLogStore {
    #[instrument(level = "trace", skip(self, batch))]
    async fn persist(&self, batch: Vec<TelemetryRecord>) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let client = self.handle().await?;
        let inserted = self
            .records(&client)
            .insert_many(&batch)
            .await
            .context("Bulk insert of the telemetry batch failed")?;
        debug!(
            "Persisted {} telemetry records",
            inserted.inserted_ids.len()
        );
        Ok(())
    }
}
