use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use order_service::api;
use order_service::config::{Config, DistanceBackend};
use order_service::distance::{DistanceCalculator, GoogleDistanceMatrix, HaversineDistance};
use order_service::error::AppError;
use order_service::state::AppState;
use order_service::store::SqlOrderStore;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    init_tracing(&config);

    let store = SqlOrderStore::connect(
        &config.database_url,
        config.db_max_connections,
        config.db_acquire_timeout,
    )
    .await
    .map_err(|err| AppError::Internal(format!("failed to open database: {err}")))?;

    let distance: Arc<dyn DistanceCalculator> = match &config.distance {
        DistanceBackend::Google { api_key, timeout } => Arc::new(
            GoogleDistanceMatrix::new(api_key.clone(), *timeout)
                .map_err(|err| AppError::Internal(err.to_string()))?,
        ),
        DistanceBackend::Haversine { max_km } => Arc::new(HaversineDistance::new(*max_km)),
    };
    tracing::info!(backend = distance.name(), "distance backend ready");

    let shared_state = Arc::new(AppState::new(Arc::new(store), distance));
    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::new(config.log_level.clone());

    if config.app_env.json_logs() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
