use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lexgate::config::LexgateConfig;
use lexgate::http::{router, AppState, HttpServer, Limiters};
use lexgate::ratelimit::{spawn_sweeper, Clock, SweepPolicy, SystemClock, WindowStore};
use lexgate::subscriptions::{MemorySubscriptionStore, SubscriptionStore};

/// Request gating service for law-office case-management functions.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Override the HTTP bind address
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    info!("Starting Lexgate");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let mut config = LexgateConfig::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.server.bind_addr = bind;
    }
    info!(bind_addr = %config.server.bind_addr, "Configuration loaded");

    let store = match config.rate_limiting.max_records {
        Some(max) => WindowStore::with_max_records(max),
        None => WindowStore::new(),
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let limiters = Limiters::from_config(&config.rate_limiting, &store, Arc::clone(&clock))?;

    let sweeper = match config.rate_limiting.sweep.policy()? {
        SweepPolicy::Periodic { interval } => {
            Some(spawn_sweeper(store.clone(), Arc::clone(&clock), interval))
        }
        _ => None,
    };

    let subscriptions: Arc<dyn SubscriptionStore> = match &config.subscriptions.users_file {
        Some(path) => Arc::new(MemorySubscriptionStore::from_file(path)?),
        None => Arc::new(MemorySubscriptionStore::new()),
    };

    let state = Arc::new(AppState {
        subscriptions,
        cron_secret: config.subscriptions.cron_secret.clone(),
        webhook_secret: config.subscriptions.webhook_secret.clone(),
    });

    let server = HttpServer::new(config.server.bind_addr, router(state, limiters));
    server.serve_with_shutdown(shutdown_signal()).await?;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }

    info!("Lexgate stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false).with_thread_ids(true))
            .with(filter)
            .init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
