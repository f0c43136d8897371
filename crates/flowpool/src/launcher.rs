use crate::PoolError;
use async_trait::async_trait;
use flowcore::{FlowId, FlowSnapshot, ProjectId};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

/// Everything a worker needs at startup
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    pub project_id: ProjectId,
    pub flow_id: FlowId,
    /// Address the worker binds to
    pub host: String,
    pub port: u16,
    pub snapshot: Arc<FlowSnapshot>,
}

/// Starts worker processes
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Start a worker and hand it its snapshot. Returns once the snapshot
    /// has been delivered, not once the worker is serving.
    async fn launch(&self, spec: LaunchSpec) -> Result<Box<dyn WorkerProcess>, PoolError>;
}

/// Handle to one running worker
#[async_trait]
pub trait WorkerProcess: Send + Sync {
    /// OS process id, if known
    fn id(&self) -> Option<u32>;

    /// False once the process has exited
    fn is_alive(&mut self) -> bool;

    /// Ask the process to exit, wait up to `grace`, then kill it
    async fn terminate(&mut self, grace: Duration) -> Result<(), PoolError>;
}

/// Launches the worker executable as a child process.
///
/// The worker gets `--project-id`, `--flow-id`, `--host` and `--port` flags,
/// and reads the snapshot as one JSON document from stdin until EOF. A worker
/// that does not drain stdin within the handoff timeout is killed.
pub struct ProcessLauncher {
    program: PathBuf,
    args: Vec<String>,
    handoff_timeout: Duration,
}

impl ProcessLauncher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            handoff_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_handoff_timeout(mut self, timeout: Duration) -> Self {
        self.handoff_timeout = timeout;
        self
    }

    fn command(&self, spec: &LaunchSpec) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--project-id")
            .arg(spec.project_id.to_string())
            .arg("--flow-id")
            .arg(spec.flow_id.to_string())
            .arg("--host")
            .arg(&spec.host)
            .arg("--port")
            .arg(spec.port.to_string());

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(&self, spec: LaunchSpec) -> Result<Box<dyn WorkerProcess>, PoolError> {
        let payload = serde_json::to_vec(spec.snapshot.as_ref())
            .map_err(|e| PoolError::SpawnFailure(format!("Failed to serialize snapshot: {}", e)))?;

        let mut child = self.command(&spec).spawn().map_err(|e| {
            PoolError::SpawnFailure(format!(
                "Failed to spawn {}: {}",
                self.program.display(),
                e
            ))
        })?;

        tracing::info!(
            "Spawned worker pid={:?} for {}/{} on port {}",
            child.id(),
            spec.project_id,
            spec.flow_id,
            spec.port
        );

        let written = match child.stdin.take() {
            Some(mut stdin) => {
                let handoff = async {
                    stdin.write_all(&payload).await?;
                    stdin.shutdown().await
                };
                let result = match tokio::time::timeout(self.handoff_timeout, handoff).await {
                    Ok(result) => result.map_err(|e| e.to_string()),
                    Err(_) => Err(format!(
                        "worker did not read its snapshot within {:?}",
                        self.handoff_timeout
                    )),
                };
                // Dropping stdin closes the pipe: the worker sees EOF
                drop(stdin);
                result
            }
            None => Err("worker stdin not captured".to_string()),
        };

        if let Err(reason) = written {
            if let Err(e) = child.kill().await {
                tracing::warn!(
                    "Failed to kill worker pid={:?} after snapshot handoff failed: {}",
                    child.id(),
                    e
                );
            }
            return Err(PoolError::SpawnFailure(format!(
                "Failed to write snapshot to worker stdin: {}",
                reason
            )));
        }

        Ok(Box::new(ChildProcess::new(child)))
    }
}

/// `WorkerProcess` backed by a `tokio::process::Child`
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    pub fn new(child: Child) -> Self {
        Self { child }
    }

    #[cfg(unix)]
    async fn request_exit(&mut self) {
        if let Some(pid) = self.child.id() {
            let status = Command::new("kill")
                .arg("-TERM")
                .arg(pid.to_string())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            if let Err(e) = status {
                tracing::warn!("Failed to send SIGTERM to worker pid={}: {}", pid, e);
            }
        }
    }

    #[cfg(not(unix))]
    async fn request_exit(&mut self) {}
}

#[async_trait]
impl WorkerProcess for ChildProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    async fn terminate(&mut self, grace: Duration) -> Result<(), PoolError> {
        if !self.is_alive() {
            return Ok(());
        }

        let pid = self.child.id();
        self.request_exit().await;

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!("Worker pid={:?} exited with {}", pid, status);
                Ok(())
            }
            Ok(Err(e)) => Err(PoolError::Io(e)),
            Err(_) => {
                tracing::warn!(
                    "Worker pid={:?} still running after {:?} - killing",
                    pid,
                    grace
                );
                self.child.kill().await.map_err(PoolError::Io)
            }
        }
    }
}
