//! Payment gateway resilience service.
//!
//! # Architecture Overview
//!
//! ```text
//!   Gateway notification            ┌──────────────────────────────────────────┐
//!   ───────────────────────────────▶│ http::webhook → security::webhook        │
//!                                   │        │ valid                           │
//!                                   │        ▼                                 │
//!                                   │  bounded queue → payments::dispatcher    │
//!                                   │                                          │
//!   Business code                   │ payments::ProtectedGateway               │
//!   ───────────────────────────────▶│   → resilience::client (retry, classify) │
//!                                   │   → resilience::gate (circuit, timeout)  │──▶ Gateway API
//!                                   │                                          │
//!                                   │ observability::events (from all above)   │
//!                                   │ admin API (stats, reset)                 │
//!                                   └──────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use gateway_resilience::admin::{setup_admin_router, AdminState};
use gateway_resilience::config::loader::{apply_env_overrides, load_config};
use gateway_resilience::config::validation::validate_config;
use gateway_resilience::config::{ConfigError, ConfigWatcher, GatewayConfig};
use gateway_resilience::http::{AppState, HttpServer};
use gateway_resilience::lifecycle::signals::wait_for_signal;
use gateway_resilience::lifecycle::{spawn_housekeeping, Core, Shutdown};
use gateway_resilience::observability::events::run_event_logger;
use gateway_resilience::observability::{logging, metrics};
use gateway_resilience::payments::dispatcher::notification_queue;
use gateway_resilience::payments::{LoggingSink, NotificationDispatcher};

#[derive(Parser)]
#[command(name = "gateway-resilience")]
#[command(about = "Circuit breaking, retries and webhook security for payment gateways", long_about = None)]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

fn load(args: &Args) -> Result<GatewayConfig, ConfigError> {
    match &args.config {
        Some(path) => load_config(path),
        None => {
            let mut config = GatewayConfig::default();
            apply_env_overrides(&mut config, |key| std::env::var(key).ok());
            validate_config(&config).map_err(ConfigError::Validation)?;
            Ok(config)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = load(&args)?;
    if args.check {
        println!("configuration OK");
        return Ok(());
    }

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "gateway-resilience starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let core = Core::build(&config)?;
    let shutdown = Shutdown::new();

    let event_logger = tokio::spawn(run_event_logger(core.events.subscribe(), shutdown.subscribe()));
    let housekeeping = spawn_housekeeping(core.validator.clone(), config.webhook.sweep_interval());

    let (forward_tx, forward_rx) = notification_queue(config.server.forward_buffer);
    let dispatcher = tokio::spawn(
        NotificationDispatcher::new(forward_rx, LoggingSink).run(shutdown.subscribe()),
    );

    // Hot reload; the watcher stops when dropped at the end of main.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, mut updates) = ConfigWatcher::new(path);
            match watcher.run() {
                Ok(guard) => {
                    let core = core.clone();
                    let mut stop = shutdown.subscribe();
                    tokio::spawn(async move {
                        loop {
                            tokio::select! {
                                update = updates.recv() => match update {
                                    Some(next) => {
                                        if let Err(e) = core.apply(&next) {
                                            tracing::error!(error = %e, "Reloaded configuration rejected");
                                        }
                                    }
                                    None => break,
                                },
                                _ = stop.recv() => break,
                            }
                        }
                    });
                    Some(guard)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable; hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    let admin = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Admin API listening");
        let router = setup_admin_router(AdminState::new(&core, &config.admin.api_key));
        let mut stop = shutdown.subscribe();
        Some(tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = stop.recv().await;
                })
                .await
        }))
    } else {
        None
    };

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = HttpServer::new(
        &config,
        AppState {
            validator: core.validator.clone(),
            gate: core.gate.clone(),
            forward_tx,
        },
    );
    let server = tokio::spawn(server.run(listener, shutdown.subscribe()));

    wait_for_signal().await;
    shutdown.trigger();

    if let Err(e) = server.await? {
        tracing::error!(error = %e, "HTTP server error");
    }
    if let Some(admin) = admin {
        if let Err(e) = admin.await? {
            tracing::error!(error = %e, "Admin server error");
        }
    }
    let handled = dispatcher.await?;
    let sweeps = housekeeping.stop().await;
    let _ = event_logger.await;

    tracing::info!(notifications = handled, sweeps = sweeps, "Shutdown complete");
    Ok(())
}
