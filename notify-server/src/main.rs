//! Notify Server
//!
//! Routes domain events to recipients and delivers them in-app, by email
//! and by webhook through a durable outbox.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::runtime::RuntimeConfig;
use config::{ConfigLoader, get_database_url};
use notify_core::adapters::{
    ChannelAdapters, HttpEmailChannel, HttpWebhookChannel, PgInAppChannel, TemplateRenderer,
};
use notify_core::events::{OutboxWrittenSender, outbox_written_channel};
use notify_core::outbox::OutboxWriter;
use notify_core::processors::{DeliveryWorker, NotificationRouter};
use notify_core::store::{OutboxStore, PgStore};
use notify_sdk::objects::{
    DEFAULT_LIST_LIMIT, NotificationEvent, OutboxEntryResponse, RouteEventResponse, clamp_limit,
};
use server::{build_router, run_server};
use shutdown::stop_workers;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Notify - notification routing and outbox delivery
#[derive(Parser, Debug)]
#[command(name = "notify-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./notify-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,

    /// Emit logs as JSON
    #[arg(long, default_value = "false")]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API and run the delivery workers (default)
    Serve,
    /// Route one event read from a JSON file and print the outcome
    Route {
        /// JSON file holding a `NotificationEvent`
        file: PathBuf,
    },
    /// Print exhausted outbox entries as JSON
    Failed {
        #[arg(long, default_value_t = DEFAULT_LIST_LIMIT)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    tracing::info!("Starting notify-server v{}", env!("CARGO_PKG_VERSION"));

    let config = ConfigLoader::new(&args.config, args.listen)
        .load()
        .map_err(|e| {
            tracing::error!("Failed to load configuration: {}", e);
            e
        })?;
    let config = Arc::new(config);
    tracing::info!(
        rules = config.routing.len(),
        "Configuration loaded from {:?}",
        args.config
    );

    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    let store = Arc::new(PgStore::new(db_pool.clone()));
    let (wake_tx, _) = outbox_written_channel();
    let router = NotificationRouter::new(
        config.routing.clone(),
        store.clone(),
        store.clone(),
        OutboxWriter::new(store.clone()).with_max_attempts(config.workers.max_attempts),
    )
    .with_wake_sender(wake_tx.clone());

    let result = match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config, store, router, wake_tx).await,
        Command::Route { file } => route_file(&router, &file).await,
        Command::Failed { limit } => print_failed(store.as_ref(), limit).await,
    };

    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Shutdown complete");

    result
}

async fn serve(
    config: Arc<RuntimeConfig>,
    store: Arc<PgStore>,
    router: NotificationRouter,
    wake_tx: OutboxWrittenSender,
) -> anyhow::Result<()> {
    let renderer = Arc::new(TemplateRenderer::new().context("failed to compile email templates")?);
    let adapters = ChannelAdapters {
        in_app: Arc::new(PgInAppChannel::new(store.processor().clone())),
        email: Arc::new(HttpEmailChannel::new(config.email.clone(), store.clone())),
        webhook: Arc::new(HttpWebhookChannel::new(config.webhook.timeout)),
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handles: Vec<_> = (0..config.workers.instances)
        .map(|instance| {
            let worker = DeliveryWorker::new(
                store.clone(),
                store.clone(),
                adapters.clone(),
                renderer.clone(),
                &config.webhook,
                config.workers.worker.clone(),
            )
            .with_instance(instance);
            tokio::spawn(worker.run(shutdown_rx.clone(), Some(wake_tx.subscribe())))
        })
        .collect();
    tracing::info!(instances = handles.len(), "Delivery workers started");

    let listen_addr = config.server.listen;
    let state = AppState::new(router, store.clone(), store, config);

    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(build_router(state), listen_addr).await;

    stop_workers(shutdown_tx, handles).await;
    result.map_err(Into::into)
}

async fn route_file(router: &NotificationRouter, file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read event file {}", file.display()))?;
    let event: NotificationEvent =
        serde_json::from_str(&raw).context("event file is not a valid NotificationEvent")?;

    let outcome = router.route_event(&event).await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&RouteEventResponse::from(outcome))?
    );
    Ok(())
}

async fn print_failed(outbox: &dyn OutboxStore, limit: i64) -> anyhow::Result<()> {
    let entries = outbox.list_exhausted(clamp_limit(Some(limit))).await?;
    let response: Vec<OutboxEntryResponse> = entries.iter().map(Into::into).collect();
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
