pub mod log_store;
pub mod metrics;
pub mod node_registry;
pub mod telemetry_buffer;
