use flowcore::SnapshotError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("No snapshot received within {seconds}s")]
    StdinTimeout { seconds: u64 },

    #[error("Snapshot input was empty")]
    EmptyInput,

    #[error("Failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid snapshot: {0}")]
    Invalid(#[from] SnapshotError),
}
