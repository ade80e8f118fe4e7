use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use masumi_agent::api;
use masumi_agent::config::{Config, ENV_FILE, persist_identity};
use masumi_agent::repository::InMemoryJobRepository;
use masumi_agent::service::JobService;
use masumi_agent::service::registration::{RetryPolicy, register_with_retry};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "masumi_agent=info,masumi_payment=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Masumi Agent...");

    config.validate().context("Invalid configuration")?;
    info!(
        "Loaded configuration: payment_mode={:?}, executor_mode={:?}, network={}",
        config.payment_mode, config.executor_mode, config.network
    );

    let gateway = config
        .payment_gateway()
        .context("Failed to build payment gateway")?;
    let executor = config
        .task_executor()
        .context("Failed to build task executor")?;

    warn!("Jobs are kept in memory only and are lost on restart");

    let service = JobService::spawn(
        Arc::new(InMemoryJobRepository::new()),
        gateway,
        executor,
        config.job_settings(),
        config.identity(),
    );

    if config.skip_registration {
        info!("Skipping agent registration");
    } else {
        let registry = config
            .agent_registry()
            .context("Failed to build registry client")?;
        match register_with_retry(registry.as_ref(), RetryPolicy::default()).await {
            Some(identity) => {
                if identity != config.identity() {
                    match persist_identity(Path::new(ENV_FILE), &identity) {
                        Ok(()) => info!("Persisted agent registration data to {}", ENV_FILE),
                        Err(e) => warn!("Could not persist agent registration data: {:#}", e),
                    }
                }
                service.update_identity(identity).await;
            }
            None => warn!("Continuing with the configured agent identity"),
        }
    }

    let app = api::create_router(service);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Masumi Agent stopped, pending payment monitors are cancelled");
    Ok(())
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
