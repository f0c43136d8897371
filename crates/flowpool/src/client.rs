use flowcore::{ExecuteChunk, ExecuteRequest, ExecuteResponse, HealthResponse};
use futures::stream::{self, BoxStream, StreamExt};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response body: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// HTTP client for a worker's `/health` and `/execute` surface
#[derive(Clone)]
pub struct WorkerClient {
    client: reqwest::Client,
}

impl WorkerClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn health(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<HealthResponse, ClientError> {
        let response = self
            .client
            .get(format!("{}/health", endpoint))
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<HealthResponse>().await?)
    }

    pub async fn execute(
        &self,
        endpoint: &str,
        request: &ExecuteRequest,
    ) -> Result<ExecuteResponse, ClientError> {
        let response = self
            .client
            .post(format!("{}/execute", endpoint))
            .json(request)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<ExecuteResponse>().await?)
    }

    /// Execute with `parameters.stream` set and yield chunks as they arrive
    pub async fn execute_stream(
        &self,
        endpoint: &str,
        request: &ExecuteRequest,
    ) -> Result<BoxStream<'static, Result<ExecuteChunk, ClientError>>, ClientError> {
        let mut request = request.clone();
        match request.parameters.as_object_mut() {
            Some(params) => {
                params.insert("stream".to_string(), serde_json::Value::Bool(true));
            }
            None => request.parameters = serde_json::json!({ "stream": true }),
        }

        let response = self
            .client
            .post(format!("{}/execute", endpoint))
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        Ok(ndjson_chunks(response.bytes_stream().boxed()))
    }
}

impl Default for WorkerClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a byte stream into newline-delimited JSON chunks
fn ndjson_chunks<B, E>(
    bytes: BoxStream<'static, Result<B, E>>,
) -> BoxStream<'static, Result<ExecuteChunk, ClientError>>
where
    B: AsRef<[u8]> + Send + 'static,
    E: Send + 'static,
    ClientError: From<E>,
{
    stream::unfold(
        (bytes, Vec::<u8>::new(), false),
        |(mut bytes, mut buffer, mut done)| async move {
            loop {
                if let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    if line.iter().all(|b| b.is_ascii_whitespace()) {
                        continue;
                    }
                    let parsed = serde_json::from_slice::<ExecuteChunk>(&line)
                        .map_err(ClientError::Serialization);
                    return Some((parsed, (bytes, buffer, done)));
                }

                if done {
                    if buffer.iter().all(|b| b.is_ascii_whitespace()) {
                        return None;
                    }
                    let rest = std::mem::take(&mut buffer);
                    let parsed = serde_json::from_slice::<ExecuteChunk>(&rest)
                        .map_err(ClientError::Serialization);
                    return Some((parsed, (bytes, buffer, done)));
                }

                match bytes.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
                    Some(Err(e)) => {
                        buffer.clear();
                        return Some((Err(ClientError::from(e)), (bytes, buffer, true)));
                    }
                    None => done = true,
                }
            }
        },
    )
    .boxed()
}
