//! Order Service
//!
//! Resource server: verifies bearer tokens against the user service's
//! published RSA keys.

use order_service::auth::{build_key_cache, KeyRefreshCoordinator, RefreshSettings};
use order_service::config::Config;
use order_service::observability::init_metrics_recorder;
use order_service::routes::{self, AppState};
use order_service::tasks::BackgroundRefresher;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting Order Service");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        jwks_url = %config.jwks_url,
        issuer = %config.jwt_issuer,
        audience = %config.jwt_audience,
        cache_backend = config.cache_backend.as_str(),
        jwks_refresh_interval_secs = config.jwks_refresh_interval.as_secs(),
        jwks_cache_ttl_secs = config.jwks_cache_ttl.as_secs(),
        background_refresh = config.enable_background_refresh,
        "Configuration loaded successfully"
    );

    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    let cache = build_key_cache(&config).await;
    let coordinator = Arc::new(
        KeyRefreshCoordinator::new(cache, RefreshSettings::from_config(&config)).map_err(|e| {
            error!("Failed to initialize key refresh coordinator: {}", e);
            e
        })?,
    );
    info!(
        cache_backend = coordinator.cache_backend(),
        "Key refresh coordinator ready"
    );

    let refresher = BackgroundRefresher::new(Arc::clone(&coordinator), config.jwks_refresh_interval);
    if config.enable_background_refresh {
        refresher.start().await;
    } else {
        info!("Background JWKS refresh disabled, keys are fetched on demand");
    }

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState::new(config, coordinator));
    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Order Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if refresher.is_running().await {
        refresher.stop().await;
    }

    served?;

    info!("Order Service shutdown complete");

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "order_service=debug,common=debug,tower_http=debug".into());

    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
