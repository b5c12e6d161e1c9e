use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::sync::watch;

use vet_notifier::api;
use vet_notifier::cli::Cli;
use vet_notifier::config::Config;
use vet_notifier::db::create_pool;
use vet_notifier::error::AppError;
use vet_notifier::logging::init_logging;
use vet_notifier::metrics::AppMetrics;
use vet_notifier::notify::{EmailChannel, NotificationDispatcher, NotificationHub, PushChannel};
use vet_notifier::repository::NotificationRepository;
use vet_notifier::scheduler::{run_reminder_scheduler, ReminderScanner};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    if let Err(err) = run(Cli::parse()).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let config = Config::from_env()
        .and_then(|config| config.apply_cli(&cli))
        .map_err(AppError::Config)?;

    tracing::info!(
        "Starting vet-notifier (scan interval {}s, push {}, email {})",
        config.scan_interval_seconds,
        if config.push_service_url.is_some() { "on" } else { "off" },
        if config.email_service_url.is_some() { "on" } else { "off" },
    );

    let pool = create_pool(&config.database_url).await?;
    let repository = Arc::new(NotificationRepository::new(pool));
    let metrics = Arc::new(
        AppMetrics::new().map_err(|err| AppError::Config(format!("metrics: {}", err)))?,
    );

    let mut dispatcher =
        NotificationDispatcher::new(repository, NotificationHub::default(), metrics.clone());
    if let Some(url) = config.push_service_url.clone() {
        dispatcher = dispatcher.with_channel(Arc::new(PushChannel::new(url)));
    }
    if let Some(url) = config.email_service_url.clone() {
        dispatcher = dispatcher.with_channel(Arc::new(EmailChannel::new(url)));
    }
    if dispatcher.channel_names().is_empty() {
        tracing::warn!("No delivery channels configured; notifications are stored and published in-process only");
    }

    let scanner = Arc::new(ReminderScanner::new(
        Arc::new(dispatcher),
        config.reminders.clone(),
        config.scan_batch_limit,
        metrics.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(run_reminder_scheduler(
        scanner,
        config.scan_interval_seconds,
        wait_for_shutdown(shutdown_rx.clone()),
    ));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Network(format!("bind {}: {}", addr, err)))?;
    tracing::info!("HTTP server listening on {}", addr);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl+C received");
        }
        let _ = shutdown_tx.send(true);
    });

    axum::serve(listener, api::router(metrics))
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
        .await
        .map_err(|err| AppError::Network(err.to_string()))?;

    if let Err(err) = scheduler.await {
        tracing::error!("Reminder scheduler task panicked: {}", err);
    }

    tracing::info!("Service stopped");
    Ok(())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}
