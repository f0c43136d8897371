use crate::WorkerError;
use flowcore::FlowSnapshot;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read one snapshot document from `reader` until EOF and validate it.
///
/// The whole read is bounded by `timeout`: a parent that never closes the
/// stream fails the worker instead of blocking it.
pub async fn read_snapshot<R>(mut reader: R, timeout: Duration) -> Result<FlowSnapshot, WorkerError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    tokio::time::timeout(timeout, reader.read_to_end(&mut buf))
        .await
        .map_err(|_| WorkerError::StdinTimeout {
            seconds: timeout.as_secs(),
        })??;

    if buf.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(WorkerError::EmptyInput);
    }

    let snapshot: FlowSnapshot = serde_json::from_slice(&buf)?;
    snapshot.validate()?;

    tracing::debug!(
        "Read snapshot {:?}: {} nodes, {} connections",
        snapshot.name(),
        snapshot.nodes().len(),
        snapshot.connections().len()
    );
    Ok(snapshot)
}
