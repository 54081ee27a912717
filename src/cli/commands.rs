//! CLI command implementations
//!
//! `serve` wires the configured store, the change publisher and the HTTP
//! server together; `migrate` only touches the database.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, StorageBackend};
use crate::event::{spawn_log_consumer, ChangeObserver, ChannelProducer, TopicPublisher};
use crate::http_server::HttpServer;
use crate::logging::init_tracing;
use crate::metrics::MetricsRegistry;
use crate::persistence::{
    InMemoryUserRepository, MeteredRepository, ObservedRepository, PostgresUserRepository,
    UserRepository,
};
use crate::service::UserService;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};

/// How long to wait for the message consumer to drain after shutdown
const CONSUMER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_command(cli.command))
}

/// Run the appropriate command based on CLI args
pub async fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Serve(args) => serve(args.resolve()?).await,
        Command::Migrate(args) => migrate(args.resolve()?).await,
    }
}

/// Run the HTTP server until Ctrl-C
pub async fn serve(config: Config) -> CliResult<()> {
    init_tracing(&config.logging)?;

    let metrics = Arc::new(MetricsRegistry::new());
    let store = Arc::new(MeteredRepository::new(open_store(&config).await?, metrics.clone()));

    let (producer, receiver) = ChannelProducer::new(config.events.channel_capacity);
    let consumer = spawn_log_consumer(receiver);
    let publisher: Arc<dyn ChangeObserver> = Arc::new(TopicPublisher::with_topics(
        producer,
        config.events.topics.clone(),
    ));
    let observed = ObservedRepository::new(store, vec![publisher])
        .with_notify_timeout(config.events.notify_timeout())
        .with_metrics(metrics.clone());

    let service = UserService::new(Arc::new(observed));
    let server = HttpServer::new(config.server.clone(), service, metrics);

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("shutdown requested"),
            Err(e) => tracing::error!(error = %e, "can't listen for ctrl-c, shutting down"),
        }
        shutdown.cancel();
    });

    server.start().await?;

    // The server owned the last producer; the consumer ends once it has drained.
    if tokio::time::timeout(CONSUMER_DRAIN_TIMEOUT, consumer)
        .await
        .is_err()
    {
        tracing::warn!("message consumer did not drain in time");
    }

    Ok(())
}

/// Apply the schema migrations and exit
pub async fn migrate(config: Config) -> CliResult<()> {
    if config.storage.backend != StorageBackend::Postgres {
        return Err(CliError::Usage(
            "migrate needs the postgres backend (set --database-url or storage.backend)"
                .to_string(),
        ));
    }
    init_tracing(&config.logging)?;

    let repo = PostgresUserRepository::connect(&config.storage.postgres).await?;
    repo.migrate().await?;
    tracing::info!("migrations applied");

    Ok(())
}

async fn open_store(config: &Config) -> CliResult<Arc<dyn UserRepository>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!(backend = "memory", "opening store");
            Ok(Arc::new(InMemoryUserRepository::new()))
        }
        StorageBackend::Postgres => {
            tracing::info!(backend = "postgres", "opening store");
            let repo = PostgresUserRepository::connect(&config.storage.postgres).await?;
            if config.storage.postgres.run_migrations {
                repo.migrate().await?;
                tracing::info!("migrations applied");
            }
            Ok(Arc::new(repo))
        }
    }
}
