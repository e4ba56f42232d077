use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use blood_test_analyser::{
    agents::DoctorAgent,
    config::Config,
    db,
    queue::{MemoryQueue, RedisQueue, TaskContext, TaskQueue, Worker},
    routes::create_router,
    utils::init_logger,
    AppState,
};

#[derive(Parser)]
#[command(name = "blood-test-analyser", version, about = "Blood test report analysis service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Run the HTTP API (with in-process workers when USE_JOB_QUEUE=false)
    Serve,
    /// Run task workers against the Redis queue
    Worker,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    let _log_guard = init_logger(&config.logging);
    info!("Configuration loaded: {:?}", config.server);

    // Connect to database
    let pool = db::create_pool(&config.database).await?;

    // Run migrations
    info!("Running database migrations...");
    db::run_migrations(&pool).await?;
    info!("Database migrations completed");

    let queue = connect_queue(&config).await?;

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received");
                    shutdown.cancel();
                }
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
        }
    });

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, pool, queue, shutdown).await,
        Command::Worker => {
            if !config.redis.enabled {
                bail!("The worker command needs the Redis queue (set USE_JOB_QUEUE=true)");
            }
            let worker = Worker::new(queue, task_context(&config, pool)?, &config.queue);
            worker.run(shutdown).await;
            Ok(())
        }
    }
}

async fn connect_queue(config: &Config) -> anyhow::Result<Arc<dyn TaskQueue>> {
    if config.redis.enabled {
        let queue = RedisQueue::connect(&config.redis.url, &config.queue)
            .await
            .with_context(|| format!("Failed to connect to Redis at {}", config.redis.url))?;
        Ok(Arc::new(queue))
    } else {
        info!("USE_JOB_QUEUE=false, running tasks in-process");
        Ok(Arc::new(MemoryQueue::from_config(&config.queue)))
    }
}

fn task_context(config: &Config, pool: SqlitePool) -> anyhow::Result<TaskContext> {
    let agent = DoctorAgent::from_config(&config.llm)?;
    Ok(TaskContext {
        pool,
        agent: Arc::new(agent),
        staging_dir: config.storage.upload_dir.join("worker"),
    })
}

async fn serve(
    config: Config,
    pool: SqlitePool,
    queue: Arc<dyn TaskQueue>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    // An in-memory queue is only visible to this process, so it needs local workers.
    let local_workers = if config.redis.enabled {
        None
    } else {
        let worker = Worker::new(queue.clone(), task_context(&config, pool.clone())?, &config.queue);
        Some(tokio::spawn(worker.run(shutdown.clone())))
    };

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        queue,
    };
    let app = create_router(state);

    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    if let Some(handle) = local_workers {
        handle.await?;
    }

    Ok(())
}
