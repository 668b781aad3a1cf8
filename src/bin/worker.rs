use whoru_detect::{
    app_state::AppState,
    config::AppConfig,
    shutdown::{self, shutdown_channel},
    telemetry,
};

#[tokio::main]
async fn main() {
    telemetry::init_tracing();

    tracing::info!("Starting detection worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    // A process-local queue would never see the server's submissions.
    if config.redis_url.is_none() {
        tracing::error!("REDIS_URL must be set for the standalone worker");
        std::process::exit(1);
    }
    if config.database_url.is_none() {
        tracing::error!("DATABASE_URL must be set for the standalone worker");
        std::process::exit(1);
    }

    let state = AppState::from_config(&config)
        .await
        .expect("Failed to initialize worker state");

    match state.jobs.recover_pending(config.recovery_batch).await {
        Ok(count) => tracing::info!(recovered = count, "Startup recovery finished"),
        Err(e) => tracing::error!(error = %e, "Startup recovery failed"),
    }

    let (shutdown_tx, shutdown_token) = shutdown_channel();
    let worker = state.worker(&config);

    tracing::info!("Worker ready, starting job processing loop");
    let handle = tokio::spawn(worker.run(shutdown_token));

    shutdown::ctrl_c().await;
    shutdown_tx.shutdown();

    if let Err(e) = handle.await {
        tracing::error!(error = %e, "Worker task ended abnormally");
    }
}
