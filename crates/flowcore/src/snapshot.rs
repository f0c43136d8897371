use crate::SnapshotError;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type NodeId = String;

/// Published flow definition handed to a worker at startup.
///
/// Fields are private to the crate: once deserialized or built, a snapshot
/// is shared behind an `Arc` and never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    nodes: Vec<NodeSpec>,
    #[serde(default)]
    connections: Vec<Connection>,
}

impl FlowSnapshot {
    pub fn new(
        name: Option<String>,
        nodes: Vec<NodeSpec>,
        connections: Vec<Connection>,
    ) -> Self {
        Self {
            name,
            nodes,
            connections,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn nodes(&self) -> &[NodeSpec] {
        &self.nodes
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn find_node(&self, id: &str) -> Option<&NodeSpec> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Check that node ids are unique, every connection names known nodes
    /// and the connection graph is acyclic.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        self.build_graph().map(|_| ())
    }

    /// Nodes ordered so that every node comes after all of its upstream nodes.
    pub fn topological_order(&self) -> Result<Vec<&NodeSpec>, SnapshotError> {
        let graph = self.build_graph()?;
        let order = toposort(&graph, None).map_err(|_| SnapshotError::CyclicDependency)?;
        Ok(order
            .into_iter()
            .map(|idx| &self.nodes[graph[idx]])
            .collect())
    }

    fn build_graph(&self) -> Result<DiGraph<usize, ()>, SnapshotError> {
        let mut graph = DiGraph::new();
        let mut node_to_index: HashMap<&str, NodeIndex> = HashMap::new();

        for (position, node) in self.nodes.iter().enumerate() {
            let idx = graph.add_node(position);
            if node_to_index.insert(node.id.as_str(), idx).is_some() {
                return Err(SnapshotError::DuplicateNode(node.id.clone()));
            }
        }

        for conn in &self.connections {
            let from_idx = node_to_index
                .get(conn.from_node.as_str())
                .ok_or_else(|| SnapshotError::NodeNotFound(conn.from_node.clone()))?;
            let to_idx = node_to_index
                .get(conn.to_node.as_str())
                .ok_or_else(|| SnapshotError::NodeNotFound(conn.to_node.clone()))?;

            graph.add_edge(*from_idx, *to_idx, ());
        }

        if toposort(&graph, None).is_err() {
            return Err(SnapshotError::CyclicDependency);
        }

        Ok(graph)
    }
}

/// Node specification in a flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub id: NodeId,
    pub node_type: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl NodeSpec {
    pub fn new(id: impl Into<NodeId>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            data: serde_json::Value::Null,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Connection between nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub from_node: NodeId,
    pub from_port: String,
    pub to_node: NodeId,
    pub to_port: String,
}

impl Connection {
    pub fn new(
        from_node: impl Into<NodeId>,
        from_port: impl Into<String>,
        to_node: impl Into<NodeId>,
        to_port: impl Into<String>,
    ) -> Self {
        Self {
            from_node: from_node.into(),
            from_port: from_port.into(),
            to_node: to_node.into(),
            to_port: to_port.into(),
        }
    }
}
