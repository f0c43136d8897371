use actix_web::{web, App, HttpServer};
use anyhow::Context;
use clap::Parser;
use flowworker::{read_snapshot, WorkerState};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "flowworker")]
#[command(about = "Serves one published flow snapshot read from stdin", long_about = None)]
struct Args {
    #[arg(long)]
    project_id: Uuid,

    #[arg(long)]
    flow_id: Uuid,

    #[arg(long)]
    port: u16,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// How long to wait for the snapshot on stdin
    #[arg(long, default_value_t = 10)]
    stdin_timeout_secs: u64,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // stdout is shared with the parent; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let snapshot = read_snapshot(
        tokio::io::stdin(),
        Duration::from_secs(args.stdin_timeout_secs),
    )
    .await
    .context("No usable snapshot on stdin")?;

    let state = web::Data::new(
        WorkerState::new(args.project_id, args.flow_id, snapshot)
            .context("Snapshot cannot be executed")?,
    );

    info!(
        "Worker for {}/{} ({} nodes) listening on {}:{}",
        args.project_id,
        args.flow_id,
        state.snapshot().nodes().len(),
        args.host,
        args.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(actix_web::middleware::Logger::default())
            .configure(flowworker::configure)
    })
    .workers(1)
    .bind((args.host.as_str(), args.port))
    .with_context(|| format!("Failed to bind {}:{}", args.host, args.port))?
    .run()
    .await?;

    info!("Worker for {}/{} stopped", args.project_id, args.flow_id);
    Ok(())
}
