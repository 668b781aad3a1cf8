use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;

use whoru_detect::{
    app_state::AppState,
    config::AppConfig,
    routes,
    shutdown::{self, shutdown_channel},
    telemetry,
};

#[tokio::main]
async fn main() {
    telemetry::init_tracing();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing whoru-detect server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe_metrics();

    let state = AppState::from_config(&config)
        .await
        .expect("Failed to initialize application state");

    let (shutdown_tx, shutdown_token) = shutdown_channel();

    let worker_handle = if config.embedded_worker {
        match state.jobs.recover_pending(config.recovery_batch).await {
            Ok(count) => tracing::info!(recovered = count, "Startup recovery finished"),
            Err(e) => tracing::error!(error = %e, "Startup recovery failed"),
        }
        let worker = state.worker(&config);
        Some(tokio::spawn(worker.run(shutdown_token)))
    } else {
        tracing::info!("Embedded worker disabled, jobs are processed by standalone workers");
        None
    };

    let app = routes::router(state, config.max_upload_bytes).route(
        "/metrics",
        get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
    );

    tracing::info!("Starting whoru-detect on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::ctrl_c())
        .await
        .expect("Server error");

    shutdown_tx.shutdown();
    if let Some(handle) = worker_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Worker task ended abnormally");
        }
    }

    tracing::info!("Server stopped");
}
