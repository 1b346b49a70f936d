use model::dto::node::{NodeRecord, NodeRegistryDisk};
use model::{NodeName, NodeNameError};
use std::collections::HashMap;

/// Static mapping of node name to its invocation and metrics endpoints.
/// Read-only after process start; a missing key is a per-request error,
/// never a crash.
#[derive(Debug)]
pub struct NodeRegistry {
    nodes: HashMap<NodeName, NodeRecord>,
}

impl TryFrom<NodeRegistryDisk> for NodeRegistry {
    type Error = NodeNameError;

    /// Validates every key of the disk document; one bad name rejects the
    /// whole registry at startup instead of silently dropping a node.
    fn try_from(disk: NodeRegistryDisk) -> Result<Self, Self::Error> {
        let nodes = disk
            .nodes
            .into_iter()
            .map(|(name, record)| Ok((NodeName::try_new(name)?, record)))
            .collect::<Result<_, _>>()?;
        Ok(Self { nodes })
    }
}

impl NodeRegistry {
    pub fn get(&self, node: &NodeName) -> Option<NodeRecord> {
        self.nodes.get(node).cloned()
    }

    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }
}
