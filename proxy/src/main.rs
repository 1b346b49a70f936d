#[cfg(feature = "mimalloc")]
use mimalloc::MiMalloc;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use crate::handler::*;
use crate::repository::log_store::{
    LogStore, MongoCollection, MongoDatabase, MongoLogStore, MongoUri,
};
use crate::repository::metrics::MetricsFetcher;
use crate::repository::node_registry::NodeRegistry;
use crate::repository::telemetry_buffer::TelemetryBuffer;
use crate::service::forwarder::Forwarder;
use crate::service::telemetry::TelemetryService;
use actix_web::web::Data;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use helper::{env_load, env_var};
use model::dto::node::NodeRegistryDisk;
use nutype::nutype;
use reqwest_middleware::ClientBuilder;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;
use tracing::{debug, info, warn};

mod controller;
mod handler;
mod repository;
mod service;

env_var!(CONFIG);
env_var!(PROXY_PORT);
env_var!(MONGO_URI);
env_var!(MONGO_DATABASE);
env_var!(MONGO_COLLECTION);
env_var!(BUFFER_CAPACITY);
env_var!(FLUSH_TIMEOUT);

/// Records buffered before a size-triggered flush kicks in.
#[nutype(derive(Clone, Copy, Debug), validate(greater = 0))]
pub struct BufferCapacity(usize);

/// Seconds a non-empty buffer may go without being flushed.
#[nutype(derive(Clone, Copy, Debug), validate(greater = 0))]
pub struct FlushTimeout(u64);

/// Load the CONFIG env variable holding the base64-encoded RON node
/// registry.
fn load_node_registry_from_env() -> anyhow::Result<String> {
    let config = env::var(CONFIG)?;
    let config = base64::decode_config(
        config,
        base64::STANDARD.decode_allow_trailing_bits(true),
    )?;
    let config = String::from_utf8(config)?;

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _guard = helper::init::init_subscriber("proxy".into(), "info".into())
        .context("Failed to initialize the tracing subscriber")?;
    debug!("Tracing initialized.");

    let port = env::var(PROXY_PORT)
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .context("PROXY_PORT is not a valid port number")?;

    let config = load_node_registry_from_env()
        .context("Error looking for the base64 CONFIG env variable")?;
    let disk_data = NodeRegistryDisk::new(config)
        .context("The CONFIG env variable is not a valid node registry")?;
    let node_registry = Arc::new(
        NodeRegistry::try_from(disk_data)
            .context("The CONFIG env variable names an invalid node")?,
    );
    info!(
        "Loaded {} nodes from the CONFIG env variable.",
        node_registry.len()
    );
    if node_registry.is_empty() {
        warn!("The node registry is empty, every invocation will fail.");
    }

    let capacity = env_load!(BufferCapacity, BUFFER_CAPACITY, usize);
    let flush_timeout = Duration::from_secs(
        env_load!(FlushTimeout, FLUSH_TIMEOUT, u64).into_inner(),
    );

    let http_client =
        Arc::new(ClientBuilder::new(reqwest::Client::new()).build());

    // Repositories
    let log_store = Arc::new(MongoLogStore::new(
        env_load!(MongoUri, MONGO_URI),
        env_load!(MongoDatabase, MONGO_DATABASE),
        env_load!(MongoCollection, MONGO_COLLECTION),
    ));
    let telemetry_buffer = Arc::new(TelemetryBuffer::new(
        capacity.into_inner(),
        log_store.clone() as Arc<dyn LogStore>,
    ));
    let metrics_fetcher = Arc::new(MetricsFetcher::new(
        node_registry.clone(),
        http_client.clone(),
    ));

    // Services
    let telemetry_service = Arc::new(TelemetryService::new(
        metrics_fetcher,
        telemetry_buffer.clone(),
    ));
    let forwarder_service = Arc::new(Forwarder::new(
        node_registry,
        http_client,
        telemetry_service,
    ));

    tokio::spawn(flush_stale_telemetry(telemetry_buffer, flush_timeout));

    info!("Starting HTTP server on 0.0.0.0:{}", port);

    let forwarder_service = Data::from(forwarder_service);
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Compress::default())
            .app_data(Data::clone(&forwarder_service))
            .route("/proxy", web::post().to(post_proxy))
            .route("/health", web::get().to(health))
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await?;

    Ok(())
}

/// Guards against a low-traffic function whose buffer never reaches
/// capacity: records must not sit unflushed past the configured timeout.
async fn flush_stale_telemetry(
    buffer: Arc<TelemetryBuffer>,
    period: Duration,
) {
    let mut interval = time::interval(period);

    loop {
        interval.tick().await;
        buffer.flush_if_stale(period).await;
    }
}
