use crate::WorkerClient;
use async_trait::async_trait;
use std::time::Duration;

/// Bounded health check of a worker endpoint
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// True only if the worker answered healthy within `timeout`
    async fn is_healthy(&self, endpoint: &str, timeout: Duration) -> bool;
}

/// Probes `GET /health` over HTTP
pub struct HttpHealthProbe {
    client: WorkerClient,
}

impl HttpHealthProbe {
    pub fn new() -> Self {
        Self {
            client: WorkerClient::new(),
        }
    }
}

impl Default for HttpHealthProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthProbe for HttpHealthProbe {
    async fn is_healthy(&self, endpoint: &str, timeout: Duration) -> bool {
        match self.client.health(endpoint, timeout).await {
            Ok(health) => {
                if !health.is_healthy() {
                    tracing::debug!("Worker {} reported status {}", endpoint, health.status);
                }
                health.is_healthy()
            }
            Err(e) => {
                tracing::debug!("Health probe to {} failed: {}", endpoint, e);
                false
            }
        }
    }
}
