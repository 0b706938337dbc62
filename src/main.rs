//! Subledger server.
//!
//! Loads configuration, connects to PostgreSQL, starts the sweep scheduler,
//! and serves the HTTP API until SIGINT/SIGTERM.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use subledger::adapters::clock::SystemClock;
use subledger::adapters::http::{api_router, SubscriptionAppState, WebhookAppState};
use subledger::adapters::notification::{HttpNotifier, LoggingNotifier};
use subledger::adapters::postgres::{
    PostgresAuditLog, PostgresProcessedEventStore, PostgresSubscriptionStore,
};
use subledger::adapters::scheduler::{SweepScheduler, SweepSchedulerConfig};
use subledger::application::handlers::webhook::ReconcileProviderEventHandler;
use subledger::application::{
    AuditRecorder, LedgerContext, LedgerSettings, SweepSettings, TrialSweeper,
};
use subledger::config::AppConfig;
use subledger::domain::catalog::PlanCatalog;
use subledger::ports::{Clock, Notifier, ProcessedEventStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config);
    tracing::info!(
        environment = ?config.server.environment,
        "starting subledger"
    );

    // Storage
    let pool = config
        .database
        .pool_options()
        .connect(config.database.url.expose_secret())
        .await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");
    }

    let store = Arc::new(PostgresSubscriptionStore::new(pool.clone()));
    let processed_events: Arc<dyn ProcessedEventStore> =
        Arc::new(PostgresProcessedEventStore::new(pool.clone()));
    let audit = AuditRecorder::new(Arc::new(PostgresAuditLog::new(pool.clone())));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    // Ledger
    let ledger = LedgerContext::new(store, audit, Arc::new(PlanCatalog::standard()), clock.clone())
        .with_settings(LedgerSettings::from(&config.ledger));

    let notifier: Arc<dyn Notifier> = match HttpNotifier::from_config(&config.notification)? {
        Some(notifier) => Arc::new(notifier),
        None => {
            tracing::warn!("no notification endpoint configured, notifications will only be logged");
            Arc::new(LoggingNotifier::new())
        }
    };

    // Background sweeps
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = if config.sweeper.enabled {
        let sweeper = TrialSweeper::new(
            ledger.clone(),
            notifier,
            config.notification.templates.clone(),
            SweepSettings::from(&config.sweeper),
        );
        let scheduler = SweepScheduler::new(
            sweeper,
            processed_events.clone(),
            clock,
            SweepSchedulerConfig::from_config(&config.sweeper, &config.webhook),
        );
        let rx = shutdown_rx.clone();
        Some(tokio::spawn(async move { scheduler.run(rx).await }))
    } else {
        tracing::info!("sweeper disabled");
        None
    };

    // HTTP
    let reconciler = ReconcileProviderEventHandler::new(
        Arc::new(config.webhook.verifier()),
        processed_events,
        ledger.clone(),
    );
    let app = api_router(
        SubscriptionAppState::new(ledger).with_admins(&config.server.admin_user_ids_list()),
        WebhookAppState::new(reconciler),
        config.server.request_timeout(),
        &config.server.cors_origins_list(),
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, stopping sweeper");
    let _ = shutdown_tx.send(true);
    if let Some(handle) = scheduler_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "sweep scheduler task failed");
        }
    }

    tracing::info!("shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_production() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
