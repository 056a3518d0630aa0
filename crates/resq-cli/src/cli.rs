//! Command line surface.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use resq_core::impls::SystemProcessTable;
use resq_core::{JobToken, QueueConnection, ResqConfig, WorkerOptions, WorkerProcess, connector};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::handlers;

#[derive(Debug, Parser)]
#[command(name = "resq", version, about = "Resque-compatible job queue on Redis")]
pub struct Cli {
    /// Log filter when RUST_LOG is unset (e.g. `info`, `resq_core=debug`)
    #[arg(long, global = true, env = "RESQ_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Named connection, selects RESQ_<NAME>_REDIS_URL
    #[arg(long, global = true, env = "RESQ_CONNECTION")]
    pub connection: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a worker until interrupted
    Work(WorkArgs),
    /// Push a job
    Enqueue(EnqueueArgs),
    /// Show the tracked status of a job
    Status { token: String },
    /// Show counters and queue sizes
    Stats,
    /// List failure records
    Failed {
        #[arg(long, default_value_t = 0)]
        start: usize,
        #[arg(long, default_value_t = 20)]
        count: usize,
    },
}

#[derive(Debug, Args)]
pub struct WorkArgs {
    /// Connection name (overrides --connection)
    #[arg(value_name = "CONNECTION")]
    pub connection_name: Option<String>,
    /// Comma-separated queues, highest priority first
    #[arg(long)]
    pub queue: Option<String>,
    /// Seconds before a failed job is retried
    #[arg(long, default_value_t = 0)]
    pub delay: u64,
    /// Seconds to sleep when every queue is empty
    #[arg(long, default_value_t = 3)]
    pub sleep: u64,
    /// Memory ceiling in megabytes
    #[arg(long, default_value_t = 128)]
    pub memory: u64,
    /// Attempts per job, 0 for unlimited
    #[arg(long, default_value_t = 0)]
    pub tries: u32,
}

#[derive(Debug, Args)]
pub struct EnqueueArgs {
    pub job: String,
    /// Job arguments as a JSON object
    #[arg(long, default_value = "{}")]
    pub data: String,
    #[arg(long)]
    pub queue: Option<String>,
    /// Track the job's status
    #[arg(long)]
    pub track: bool,
    /// Run no earlier than this many seconds from now
    #[arg(long)]
    pub delay: Option<u64>,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}

pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Work(args) => {
            let name = args.connection_name.clone().or(cli.connection);
            work(name.as_deref(), args).await
        }
        Command::Enqueue(args) => enqueue(cli.connection.as_deref(), args).await,
        Command::Status { token } => status(cli.connection.as_deref(), &token).await,
        Command::Stats => stats(cli.connection.as_deref()).await,
        Command::Failed { start, count } => failed(cli.connection.as_deref(), start, count).await,
    }
}

async fn open(name: Option<&str>) -> anyhow::Result<(ResqConfig, Arc<QueueConnection>)> {
    let config = ResqConfig::from_env(name);
    let connection = connector::connect(&config)
        .await
        .with_context(|| format!("connecting to {}", config.redis_url))?;
    Ok((config, connection))
}

async fn work(name: Option<&str>, args: WorkArgs) -> anyhow::Result<()> {
    let (config, connection) = open(name).await?;
    let registry = Arc::new(handlers::registry()?);
    let processes = Arc::new(SystemProcessTable::new(config.worker_command.clone()));
    let queues = args
        .queue
        .clone()
        .unwrap_or_else(|| config.default_queue.clone());

    let mut worker = WorkerProcess::init(connection, registry, processes, &queues)
        .await
        .context("initializing worker")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing current job");
            let _ = shutdown_tx.send(true);
        }
    });

    let options = WorkerOptions {
        delay: Duration::from_secs(args.delay),
        sleep: Duration::from_secs(args.sleep),
        memory_mb: args.memory,
        max_tries: args.tries,
    };
    info!(worker = %worker.identity(), ?options, "worker starting");
    let reason = worker.start(&options, shutdown_rx).await?;
    warn!(?reason, "worker exited");
    Ok(())
}

async fn enqueue(name: Option<&str>, args: EnqueueArgs) -> anyhow::Result<()> {
    let (_, connection) = open(name).await?;
    let data: serde_json::Value =
        serde_json::from_str(&args.data).context("--data must be valid JSON")?;

    let token = match args.delay {
        Some(secs) if secs > 0 => {
            connection
                .schedule_in(Duration::from_secs(secs), &args.job, data, args.queue.as_deref())
                .await?
        }
        _ => {
            connection
                .enqueue(&args.job, data, args.queue.as_deref(), args.track)
                .await?
        }
    };
    println!("{token}");
    Ok(())
}

async fn status(name: Option<&str>, token: &str) -> anyhow::Result<()> {
    let (_, connection) = open(name).await?;
    match connection.status_record(&JobToken::new(token)).await? {
        Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
        None => println!("unknown (not tracked)"),
    }
    Ok(())
}

async fn stats(name: Option<&str>) -> anyhow::Result<()> {
    let (_, connection) = open(name).await?;
    let stats = connection.stats().await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn failed(name: Option<&str>, start: usize, count: usize) -> anyhow::Result<()> {
    let (_, connection) = open(name).await?;
    for record in connection.failures(start, count).await? {
        println!("{}", serde_json::to_string_pretty(&record)?);
    }
    Ok(())
}
