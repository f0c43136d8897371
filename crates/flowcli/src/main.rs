// crates/flowcli/src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use flowaccess::{FlowAccessProvider, InMemoryPublicationStore, StoreDocument};
use flowcore::{
    Connection, ExecuteChunk, ExecuteRequest, FlowMetadata, FlowSnapshot, NodeSpec,
    PublicationRecord, SnapshotPayload,
};
use flowpool::{PoolConfig, WorkerClient, WorkerHandle, WorkerPoolManager};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Flow worker pool CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a worker for a published flow and execute it once
    Run {
        /// Path to the store document (flows and publications)
        #[arg(short, long)]
        store: PathBuf,

        #[arg(short, long)]
        project: Uuid,

        #[arg(short, long)]
        flow: Uuid,

        /// Requesting user
        #[arg(short, long)]
        user: Uuid,

        /// Groups the user belongs to (repeatable)
        #[arg(short, long = "group")]
        groups: Vec<Uuid>,

        /// Input data as JSON string
        #[arg(short, long)]
        input: Option<String>,

        /// Print per-node chunks as they arrive
        #[arg(long)]
        stream: bool,

        /// Worker executable, overriding FLOWPOOL_WORKER_BIN
        #[arg(long)]
        worker_bin: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// List published flows a user may run
    List {
        #[arg(short, long)]
        store: PathBuf,

        #[arg(short, long)]
        user: Uuid,

        #[arg(short, long = "group")]
        groups: Vec<Uuid>,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Validate a snapshot file
    Validate {
        /// Path to snapshot JSON file
        file: PathBuf,
    },

    /// Create an example store document
    Init {
        /// Output file path
        #[arg(short, long, default_value = "store.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            store,
            project,
            flow,
            user,
            groups,
            input,
            stream,
            worker_bin,
            verbose,
        } => {
            if verbose {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::DEBUG)
                    .init();
            } else {
                tracing_subscriber::fmt()
                    .with_max_level(tracing::Level::INFO)
                    .init();
            }

            let mut config = PoolConfig::from_env()?;
            if let Some(worker_bin) = worker_bin {
                config.worker_program = worker_bin;
            }

            let request = RunRequest {
                project,
                flow,
                user,
                groups,
                input: parse_input(input)?,
                stream,
            };
            run_flow(store, config, request).await?;
        }

        Commands::List {
            store,
            user,
            groups,
            limit,
        } => {
            list_flows(store, user, groups, limit).await?;
        }

        Commands::Validate { file } => {
            validate_snapshot(file)?;
        }

        Commands::Init { output } => {
            create_example_store(output)?;
        }
    }

    Ok(())
}

struct RunRequest {
    project: Uuid,
    flow: Uuid,
    user: Uuid,
    groups: Vec<Uuid>,
    input: serde_json::Value,
    stream: bool,
}

fn parse_input(input: Option<String>) -> Result<serde_json::Value> {
    match input {
        Some(input_str) => Ok(serde_json::from_str(&input_str)?),
        None => Ok(serde_json::Value::Null),
    }
}

async fn load_provider(store: &Path) -> Result<Arc<FlowAccessProvider>> {
    let store = InMemoryPublicationStore::from_file(store).await?;
    Ok(Arc::new(FlowAccessProvider::new(Arc::new(store))))
}

async fn run_flow(store: PathBuf, config: PoolConfig, request: RunRequest) -> Result<()> {
    println!("🚀 Loading store from: {}", store.display());
    let access = load_provider(&store).await?;

    let pool = WorkerPoolManager::with_config(config, access);
    let result = execute_once(&pool, &request).await;

    println!();
    println!("📊 Pool:");
    let stats = pool.get_worker_stats().await;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    pool.shutdown().await;
    result
}

async fn execute_once(pool: &WorkerPoolManager, request: &RunRequest) -> Result<()> {
    let handle: WorkerHandle = pool
        .try_get_or_create_worker(request.project, request.flow, request.user, &request.groups)
        .await?;
    println!("✅ Worker ready at {}", handle.endpoint);

    let client = WorkerClient::new();
    let body = ExecuteRequest::new(request.input.clone());

    if !request.stream {
        let response = client.execute(&handle.endpoint, &body).await?;
        println!();
        println!("📋 Execution {}", response.execution_id);
        println!("   Nodes: {}", response.nodes_visited.join(" -> "));
        println!("   Output: {}", response.output);
        return Ok(());
    }

    let mut chunks = client.execute_stream(&handle.endpoint, &body).await?;
    println!();
    while let Some(chunk) = chunks.next().await {
        match chunk? {
            ExecuteChunk::Node {
                index,
                node_id,
                node_type,
            } => {
                println!("  ⚡ [{}] {} ({})", index, node_id, node_type);
            }
            ExecuteChunk::Result { result } => {
                println!("✨ Execution {} finished", result.execution_id);
                println!("   Output: {}", result.output);
            }
        }
    }

    Ok(())
}

async fn list_flows(store: PathBuf, user: Uuid, groups: Vec<Uuid>, limit: usize) -> Result<()> {
    let access = load_provider(&store).await?;
    let flows = access.list_accessible_flows(user, &groups, limit).await;

    if flows.is_empty() {
        println!("No published flows available to {}", user);
        return Ok(());
    }

    println!("📦 Published flows:");
    println!();
    for flow in flows {
        println!(
            "  • {} {} ({:?})",
            flow.flow_id,
            flow.name.as_deref().unwrap_or("<unnamed>"),
            flow.owner_kind
        );
    }

    Ok(())
}

fn validate_snapshot(file: PathBuf) -> Result<()> {
    println!("🔍 Validating snapshot: {}", file.display());

    let snapshot_json = std::fs::read_to_string(&file)?;
    let snapshot: FlowSnapshot = serde_json::from_str(&snapshot_json)?;
    let order = snapshot.topological_order()?;

    println!("✅ Snapshot is valid:");
    println!("   Name: {}", snapshot.name().unwrap_or("<unnamed>"));
    println!("   Nodes: {}", snapshot.nodes().len());
    println!("   Connections: {}", snapshot.connections().len());
    println!(
        "   Order: {}",
        order
            .iter()
            .map(|n| n.id.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    );

    Ok(())
}

fn create_example_store(output: PathBuf) -> Result<()> {
    let snapshot = FlowSnapshot::new(
        Some("Example Chat Flow".to_string()),
        vec![
            NodeSpec::new("input", "chat.input"),
            NodeSpec::new("prompt", "prompt.template")
                .with_data(serde_json::json!({"template": "Answer briefly: {message}"})),
            NodeSpec::new("output", "chat.output"),
        ],
        vec![
            Connection::new("input", "message", "prompt", "message"),
            Connection::new("prompt", "text", "output", "message"),
        ],
    );

    let flow_id = Uuid::new_v4();
    let document = StoreDocument {
        flows: vec![FlowMetadata::public(flow_id).with_name("Example Chat Flow")],
        publications: vec![PublicationRecord::published(
            flow_id,
            SnapshotPayload::from(&snapshot),
        )],
    };

    let json = serde_json::to_string_pretty(&document)?;
    std::fs::write(&output, json)?;

    println!("✨ Created example store: {}", output.display());
    println!();
    println!("Run it with:");
    println!(
        "  flow run --store {} --project {} --flow {} --user {} --input '{{\"message\": \"hi\"}}'",
        output.display(),
        Uuid::new_v4(),
        flow_id,
        Uuid::new_v4()
    );

    Ok(())
}
