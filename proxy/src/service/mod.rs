pub mod forwarder;
pub mod telemetry;
