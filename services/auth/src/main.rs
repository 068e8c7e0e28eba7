use anyhow::Result;
use std::env;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod error;
mod jwt;
mod middleware;
mod models;
mod rate_limiter;
mod repositories;
mod routes;
mod session;
mod validation;

use common::cache::{RedisConfig, RedisPool};
use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};

use crate::{
    jwt::{JwtConfig, JwtService},
    rate_limiter::{RateLimiter, RateLimiterConfig},
    repositories::UserRepository,
    session::{SessionEvent, SessionEvents, SessionManager},
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub user_repository: UserRepository,
    pub jwt_service: JwtService,
    pub session_manager: SessionManager,
    pub redis_pool: RedisPool,
    pub rate_limiter: RateLimiter,
    pub events: SessionEvents,
    /// Base of the link put in password reset messages
    pub reset_url: String,
}

/// Entry point of the authentication service
///
/// # Environment Variables
/// - `DATABASE_URL` and the other `DATABASE_*` pool settings
/// - `REDIS_URL`: Redis connection URL
/// - `JWT_PRIVATE_KEY`, `JWT_PUBLIC_KEY` and the expiry settings
/// - `LOGIN_MAX_ATTEMPTS`, `LOGIN_WINDOW_SECONDS`, `LOGIN_BAN_SECONDS`
/// - `PASSWORD_RESET_URL`: reset page link (default: http://localhost:8080/reset-password)
/// - `AUTH_BIND_ADDR`: listen address (default: 0.0.0.0:3000)
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting authentication service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }
    run_migrations(&pool).await?;

    // Initialize JWT service
    let jwt_service = JwtService::new(JwtConfig::from_env()?)?;

    // Initialize Redis connection pool
    let redis_pool = RedisPool::new(&RedisConfig::from_env()?).await?;
    if !redis_pool.health_check().await? {
        anyhow::bail!("Failed to connect to Redis");
    }

    let rate_limiter = RateLimiter::new(RateLimiterConfig::from_env());
    info!(
        "Sign-in limited to {} attempts per {} seconds",
        rate_limiter.config().max_attempts,
        rate_limiter.config().window_seconds
    );

    let events = SessionEvents::new(64);
    let mut receiver = events.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(SessionEvent::SignedIn(session)) => {
                    info!("Session changed: {} signed in", session.id)
                }
                Ok(SessionEvent::SignedOut(user_id)) => {
                    info!("Session changed: {} signed out", user_id)
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Session event log skipped {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let app_state = AppState {
        user_repository: UserRepository::new(pool),
        session_manager: SessionManager::new(redis_pool.clone(), jwt_service.clone()),
        jwt_service,
        redis_pool,
        rate_limiter,
        events,
        reset_url: env::var("PASSWORD_RESET_URL")
            .unwrap_or_else(|_| "http://localhost:8080/reset-password".to_string()),
    };

    info!("Authentication service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let bind_addr = env::var("AUTH_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Authentication service listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
