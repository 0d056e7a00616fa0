use session_service::{
    build_router,
    config::SessionConfig,
    cookies::CookieManager,
    db,
    services::{
        AuditLog, LogMailer, PgActionTokenStore, PgAuthEventSink, PgPrincipalStore,
        PgRefreshTokenStore, RefreshTokenStore, SessionService, TokenService,
    },
    AppState,
};

use service_core::middleware::rate_limit::create_ip_rate_limiter;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), service_core::error::AppError> {
    // Load configuration - fail fast if invalid
    let config = SessionConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting session service"
    );

    let pool = db::create_pool(&config.database)
        .await
        .map_err(|e| service_core::error::AppError::DatabaseError(anyhow::Error::new(e)))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| service_core::error::AppError::DatabaseError(anyhow::Error::new(e)))?;

    let tokens = TokenService::new(&config.jwt, config.effective_secret());
    let cookies = CookieManager::new(
        &config.cookies,
        config.environment,
        tokens.access_ttl_seconds(),
        tokens.refresh_ttl_days(),
    );
    let audit = AuditLog::new(Arc::new(PgAuthEventSink::new(pool.clone())));
    let refresh_store = Arc::new(PgRefreshTokenStore::new(pool.clone()));
    let sessions = SessionService::new(
        Arc::new(PgPrincipalStore::new(pool.clone())),
        refresh_store.clone(),
        Arc::new(PgActionTokenStore::new(pool.clone())),
        tokens.clone(),
        audit,
        Arc::new(LogMailer),
        config.jwt.reset_ttl_minutes,
    );

    // Hourly sweep of expired rows. Correctness never depends on this;
    // `find` already filters on expiry.
    tokio::spawn({
        let store = refresh_store.clone();
        async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(3600));
            loop {
                interval.tick().await;
                match store.purge_expired().await {
                    Ok(n) if n > 0 => {
                        tracing::info!(purged = n, "Purged expired refresh tokens")
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "Expired-token sweep failed"),
                }
            }
        }
    });

    let login_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.login_attempts,
        config.rate_limit.login_window_seconds,
    );
    let register_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.register_attempts,
        config.rate_limit.register_window_seconds,
    );
    let password_reset_rate_limiter = create_ip_rate_limiter(
        config.rate_limit.password_reset_attempts,
        config.rate_limit.password_reset_window_seconds,
    );

    let state = AppState {
        config: config.clone(),
        pool: Some(pool),
        tokens,
        cookies,
        sessions,
        login_rate_limiter,
        register_rate_limiter,
        password_reset_rate_limiter,
    };

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    service_core::axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
