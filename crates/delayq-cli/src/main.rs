//! delayq - Redis delay queue の操作用 CLI
//!
//! # サブコマンド
//! - enqueue: payload を delay 秒後に可視化する
//! - consume: due になった payload を stdout に流す（Ctrl-C / --timeout で停止）
//! - stats / purge: index の観測と削除

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use delayq_core::impls::RedisStore;
use delayq_core::{CancellationToken, DelayQueue, DelayQueueBuilder, DelayQueueConfig, QueueName};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "delayq", about = "Delay queue on top of Redis sorted sets and lists")]
struct Cli {
    #[arg(
        long,
        env = "DELAYQ_REDIS_URL",
        default_value = "redis://127.0.0.1:6379"
    )]
    redis_url: String,

    /// JSON file with queue settings (key_prefix, poll_interval_ms, ...)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Schedule a payload
    Enqueue {
        queue: String,
        payload: String,
        /// Seconds until the payload becomes visible
        #[arg(long, default_value_t = 0)]
        delay: i64,
        /// Seconds the payload survives after becoming visible
        #[arg(long, default_value_t = 3600)]
        ttl: i64,
    },
    /// Print due payloads until interrupted
    Consume {
        queue: String,
        /// Stop after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Show bucket counts as JSON
    Stats { queue: String },
    /// Delete every bucket of a queue
    Purge { queue: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let store = RedisStore::connect(&cli.redis_url)
        .await
        .with_context(|| format!("connecting to {}", cli.redis_url))?;
    let dq = DelayQueueBuilder::new(store)
        .config(config)
        .build()
        .context("invalid queue configuration")?;

    match cli.command {
        Command::Enqueue {
            queue,
            payload,
            delay,
            ttl,
        } => {
            let queue = QueueName::new(queue)?;
            dq.enqueue(&queue, payload.as_bytes(), delay, ttl).await?;
            info!(%queue, delay, ttl, "payload enqueued");
        }
        Command::Consume { queue, timeout } => {
            consume(&dq, QueueName::new(queue)?, timeout.map(Duration::from_secs)).await?;
        }
        Command::Stats { queue } => {
            let stats = dq.stats(&QueueName::new(queue)?).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::Purge { queue } => {
            let removed = dq.purge(&QueueName::new(queue)?).await?;
            println!("removed {removed} bucket(s)");
        }
    }

    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<DelayQueueConfig> {
    let Some(path) = path else {
        return Ok(DelayQueueConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

async fn consume(
    dq: &DelayQueue<RedisStore>,
    queue: QueueName,
    timeout: Option<Duration>,
) -> Result<()> {
    let cancel = CancellationToken::new();

    let stopper = cancel.clone();
    tokio::spawn(async move {
        match timeout {
            Some(limit) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = tokio::time::sleep(limit) => {}
                }
            }
            None => {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "failed to listen for Ctrl-C");
                    return;
                }
            }
        }
        stopper.cancel();
    });

    let mut consumption = dq.consume(cancel, &queue);
    let mut delivered = 0usize;
    while let Some(payload) = consumption.recv().await {
        delivered += 1;
        println!("{}", String::from_utf8_lossy(&payload));
    }

    match consumption.finish().await {
        Some(err) if err.is_cancelled() => {
            info!(%queue, delivered, "consumer stopped");
            Ok(())
        }
        Some(err) => bail!("consume loop for {queue} failed: {err}"),
        None => Ok(()),
    }
}
