use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where to reach one compute node and the metrics store scraping it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Base URL the function name gets appended to, e.g.
    /// `http://cloud1.example:32006/function/`.
    pub invocation_url: String,
    /// Base URL of the Prometheus HTTP API for that node.
    pub prometheus_url: String,
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed to parse the node registry RON document")]
    Ron(#[from] ron::error::SpannedError),
}

/// On-disk (RON) form of the node registry, decoded from the base64 value
/// of the `CONFIG` env variable.
///
/// ```ron
/// (nodes: {
///     "cloud1": (
///         invocation_url: "http://cloud1.example:32006/function/",
///         prometheus_url: "http://cloud1.example:31005",
///     ),
/// })
/// ```
/// Keys stay plain strings on the wire; they are validated into
/// [`crate::NodeName`] when the in-memory registry is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRegistryDisk {
    pub nodes: HashMap<String, NodeRecord>,
}

impl NodeRegistryDisk {
    pub fn new(content: String) -> Result<Self, Error> {
        Ok(ron::from_str(&content)?)
    }
}
