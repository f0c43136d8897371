use crate::WorkerError;
use flowcore::{
    ExecuteChunk, ExecuteRequest, ExecuteResponse, FlowId, FlowSnapshot, HealthResponse, NodeSpec,
    ProjectId,
};
use std::sync::Arc;
use uuid::Uuid;

/// Shared state of a running worker
pub struct WorkerState {
    project_id: ProjectId,
    flow_id: FlowId,
    snapshot: Arc<FlowSnapshot>,
    /// Node ids and types in execution order, resolved once at startup
    order: Vec<(String, String)>,
}

impl WorkerState {
    pub fn new(
        project_id: ProjectId,
        flow_id: FlowId,
        snapshot: FlowSnapshot,
    ) -> Result<Self, WorkerError> {
        let order = snapshot
            .topological_order()?
            .into_iter()
            .map(|node: &NodeSpec| (node.id.clone(), node.node_type.clone()))
            .collect();

        Ok(Self {
            project_id,
            flow_id,
            snapshot: Arc::new(snapshot),
            order,
        })
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn flow_id(&self) -> FlowId {
        self.flow_id
    }

    pub fn snapshot(&self) -> &Arc<FlowSnapshot> {
        &self.snapshot
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse::healthy(self.project_id, self.flow_id)
    }

    /// Walk the flow once for `request`.
    ///
    /// Nodes are visited in dependency order. Node behavior lives outside the
    /// worker, so the output is the request's input data.
    pub fn execute(&self, request: ExecuteRequest) -> ExecutionTrace {
        let execution_id = Uuid::new_v4();
        tracing::info!(
            "Execution {} of flow {} ({} nodes)",
            execution_id,
            self.flow_id,
            self.order.len()
        );

        let steps = self
            .order
            .iter()
            .enumerate()
            .map(|(index, (node_id, node_type))| {
                tracing::debug!("  [{}] {} ({})", index, node_id, node_type);
                ExecuteChunk::Node {
                    index,
                    node_id: node_id.clone(),
                    node_type: node_type.clone(),
                }
            })
            .collect();

        ExecutionTrace {
            steps,
            response: ExecuteResponse {
                execution_id,
                project_id: self.project_id,
                flow_id: self.flow_id,
                nodes_visited: self.order.iter().map(|(id, _)| id.clone()).collect(),
                output: request.input_data,
                parameters: request.parameters,
            },
        }
    }
}

/// Result of one execution, as per-node steps plus the final response
#[derive(Debug, Clone)]
pub struct ExecutionTrace {
    pub steps: Vec<ExecuteChunk>,
    pub response: ExecuteResponse,
}

impl ExecutionTrace {
    /// Steps followed by the closing `result` chunk
    pub fn into_chunks(self) -> Vec<ExecuteChunk> {
        let mut chunks = self.steps;
        chunks.push(ExecuteChunk::Result {
            result: self.response,
        });
        chunks
    }
}
