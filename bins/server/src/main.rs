//! Ferry API Server
//!
//! Main entry point for the attachment service. Serves the HTTP API and runs
//! the expiration sweeper in the background.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ferry_api::{AppState, create_router};
use ferry_core::attachment::{
    AllowedFileType, AttachmentService, ExpirationSweeper, SweeperConfig, UploadPolicy,
};
use ferry_core::storage::{StorageConfig, StorageProvider, StorageService};
use ferry_db::{AttachmentRepository, connect_with_pool};
use ferry_shared::config::{
    AllowedTypeSetting, StorageProviderSettings, StorageSettings, UploadSettings,
};
use ferry_shared::{AppConfig, JwtConfig, JwtService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ferry=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load()?;

    // Connect to database
    let db = connect_with_pool(
        &config.database.url,
        config.database.max_connections,
        config.database.min_connections,
    )
    .await?;
    info!("Connected to database");

    // Create JWT service
    let jwt_service = JwtService::new(JwtConfig {
        secret: config.jwt.secret.clone(),
        access_token_expires_minutes: i64::try_from(config.jwt.access_token_expiry_secs / 60)?,
    });

    // Create storage gateway
    let storage = Arc::new(StorageService::from_config(storage_config(
        &config.storage,
        &config.uploads,
    ))?);
    info!(provider = storage.provider_name(), "Storage configured");
    if config.storage.public_base_url.is_none() {
        warn!("No public base URL configured, readable URLs will be presigned");
    }

    // Create attachment service and sweeper sharing storage and repository
    let repo = Arc::new(AttachmentRepository::new(db));
    let policy = upload_policy(&config.uploads);
    info!(
        max_file_size = policy.max_file_size,
        temp_ttl_secs = policy.temp_ttl_secs,
        category_root = %policy.category_root,
        "Upload policy loaded"
    );
    let attachments = AttachmentService::new(storage.clone(), repo.clone(), policy);

    let sweeper = ExpirationSweeper::new(storage, repo, sweeper_config(&config.uploads));
    tokio::spawn(sweeper.run());

    // Create application state
    let state = AppState {
        jwt_service: Arc::new(jwt_service),
        attachments: Arc::new(attachments),
    };

    // Create router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Map storage settings onto the gateway configuration.
fn storage_config(storage: &StorageSettings, uploads: &UploadSettings) -> StorageConfig {
    let provider = match &storage.provider {
        StorageProviderSettings::S3 {
            endpoint,
            bucket,
            access_key_id,
            secret_access_key,
            region,
        } => StorageProvider::s3(endpoint, bucket, access_key_id, secret_access_key, region),
        StorageProviderSettings::AzureBlob {
            account,
            access_key,
            container,
        } => StorageProvider::azure_blob(account, access_key, container),
        StorageProviderSettings::LocalFs { root } => StorageProvider::local_fs(root),
    };

    let mut config = StorageConfig::new(provider)
        .with_upload_ttl(uploads.signed_url_ttl_secs)
        .with_download_ttl(storage.download_ttl_secs);
    if let Some(base) = &storage.public_base_url {
        config = config.with_public_base_url(base.clone());
    }
    config
}

/// Map upload settings onto the validation and lifecycle policy.
fn upload_policy(uploads: &UploadSettings) -> UploadPolicy {
    let mut policy = UploadPolicy::new()
        .with_max_file_size(uploads.max_file_size)
        .with_temp_ttl(uploads.temp_ttl_secs)
        .with_category_root(uploads.category_root.clone());

    if let Some(types) = &uploads.image_types {
        policy = policy.with_image_types(allowed_types(types));
    }
    if let Some(types) = &uploads.document_types {
        policy = policy.with_document_types(allowed_types(types));
    }
    policy
}

/// Map sweep settings, treating zero as the smallest useful value.
fn sweeper_config(uploads: &UploadSettings) -> SweeperConfig {
    SweeperConfig {
        interval: Duration::from_secs(uploads.sweep_interval_secs.max(1)),
        batch_size: uploads.sweep_batch_size.max(1),
    }
}

fn allowed_types(settings: &[AllowedTypeSetting]) -> Vec<AllowedFileType> {
    settings
        .iter()
        .map(|s| {
            let extensions: Vec<&str> = s.extensions.iter().map(String::as_str).collect();
            AllowedFileType::new(s.content_type.clone(), &extensions)
        })
        .collect()
}
