use anyhow::Result;
use aws_config::BehaviorVersion;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod error;
mod middleware;
mod models;
mod routes;
mod state;

use common::database::{DatabaseConfig, health_check, init_pool, run_migrations};
use common::diary::PgDiaryStore;
use media::{MoodPipeline, PipelineConfig, S3Archive};

use crate::{middleware::TokenVerifier, state::AppState};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Entry point of the diary API
///
/// # Environment Variables
/// - `DATABASE_URL` and the other `DATABASE_*` pool settings
/// - `JWT_PUBLIC_KEY`: PEM text or path of the auth service public key
/// - `MEDIA_BUCKET_NAME`: archive uploads to this S3 bucket (optional)
/// - `PAWMOOD_CONFIG`: pipeline configuration file (default: pawmood.toml)
/// - `MAX_UPLOAD_BYTES`: largest accepted upload (default: 50 MiB)
/// - `API_BIND_ADDR`: listen address (default: 0.0.0.0:3001)
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting API service");

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

    let config_path = env::var("PAWMOOD_CONFIG").ok().map(PathBuf::from);
    let config = PipelineConfig::load(config_path.as_deref())?;

    let mut pipeline = MoodPipeline::from_config(&config, Arc::new(PgDiaryStore::new(pool)));
    if let Ok(bucket_name) = env::var("MEDIA_BUCKET_NAME") {
        let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
        let s3_client = aws_sdk_s3::Client::new(&aws);
        info!("Archiving uploads to S3 bucket {}", bucket_name);
        pipeline = pipeline.with_archive(Arc::new(S3Archive::new(s3_client, bucket_name)));
    }

    let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

    let app_state = AppState {
        pipeline: Arc::new(pipeline),
        tips: Arc::new(config.tips.clone()),
        notice_dismiss_ms: config.notice_dismiss_ms,
        verifier: Arc::new(TokenVerifier::from_env()?),
        max_upload_bytes,
    };

    info!("API service initialized successfully");

    // Start the web server
    let app = routes::create_router(app_state);

    let bind_addr = env::var("API_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3001".to_string());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("API service listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
