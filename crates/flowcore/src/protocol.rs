//! Wire types of the worker's network surface (`GET /health`, `POST /execute`).

use crate::{FlowId, NodeId, ProjectId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const HEALTHY: &str = "healthy";

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<FlowId>,
}

impl HealthResponse {
    pub fn healthy(project_id: ProjectId, flow_id: FlowId) -> Self {
        Self {
            status: HEALTHY.to_string(),
            project_id: Some(project_id),
            flow_id: Some(flow_id),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HEALTHY
    }
}

/// Body of `POST /execute`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub input_data: serde_json::Value,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl ExecuteRequest {
    pub fn new(input_data: serde_json::Value) -> Self {
        Self {
            input_data,
            parameters: serde_json::Value::Null,
        }
    }

    pub fn with_parameters(mut self, parameters: serde_json::Value) -> Self {
        self.parameters = parameters;
        self
    }

    /// `parameters.stream == true` asks for incremental output
    pub fn wants_stream(&self) -> bool {
        self.parameters
            .get("stream")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

/// Structured result of one execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub execution_id: Uuid,
    pub project_id: ProjectId,
    pub flow_id: FlowId,
    pub nodes_visited: Vec<NodeId>,
    pub output: serde_json::Value,
    pub parameters: serde_json::Value,
}

/// One line of a streamed execution (newline-delimited JSON)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecuteChunk {
    Node {
        index: usize,
        node_id: NodeId,
        node_type: String,
    },
    Result {
        result: ExecuteResponse,
    },
}
