//! Application configuration management.

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtSettings,
    /// Object storage configuration.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Upload policy and lifecycle configuration.
    #[serde(default)]
    pub uploads: UploadSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Secret key used to verify access tokens.
    pub secret: String,
    /// Access token expiration in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

/// Storage provider selection, tagged by `type`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorageProviderSettings {
    /// S3-compatible storage (Cloudflare R2, AWS S3, Supabase, Spaces).
    S3 {
        /// Endpoint URL.
        endpoint: String,
        /// Bucket name.
        bucket: String,
        /// Access key ID.
        access_key_id: String,
        /// Secret access key.
        secret_access_key: String,
        /// Region, `auto` for R2.
        #[serde(default = "default_region")]
        region: String,
    },
    /// Azure Blob Storage.
    AzureBlob {
        /// Storage account name.
        account: String,
        /// Storage access key.
        access_key: String,
        /// Container name.
        container: String,
    },
    /// Local filesystem (development only).
    LocalFs {
        /// Root directory.
        root: String,
    },
}

fn default_region() -> String {
    "auto".to_string()
}

/// Object storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Provider and credentials.
    pub provider: StorageProviderSettings,
    /// Public base URL (CDN or public bucket). When unset, readable URLs are
    /// presigned GET URLs.
    #[serde(default)]
    pub public_base_url: Option<String>,
    /// Validity of presigned read URLs in seconds.
    #[serde(default = "default_download_ttl")]
    pub download_ttl_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            provider: StorageProviderSettings::LocalFs {
                root: "./storage".to_string(),
            },
            public_base_url: None,
            download_ttl_secs: default_download_ttl(),
        }
    }
}

fn default_download_ttl() -> u64 {
    3600
}

/// One allowed content type with the extensions it may be paired with.
#[derive(Debug, Clone, Deserialize)]
pub struct AllowedTypeSetting {
    /// MIME type, e.g. `image/jpeg`.
    pub content_type: String,
    /// Extensions without the dot, e.g. `["jpg", "jpeg"]`.
    pub extensions: Vec<String>,
}

/// Upload policy and lifecycle configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Maximum accepted file size in bytes.
    pub max_file_size: u64,
    /// Validity window of signed upload URLs in seconds.
    pub signed_url_ttl_secs: u64,
    /// Lifetime of a TEMP attachment before it becomes eligible for sweeping.
    pub temp_ttl_secs: u64,
    /// Interval between expiration sweeps in seconds.
    pub sweep_interval_secs: u64,
    /// Maximum number of rows reaped per sweep.
    pub sweep_batch_size: u64,
    /// First path segment of every storage key.
    pub category_root: String,
    /// Image allow-list override. Built-in defaults apply when unset.
    pub image_types: Option<Vec<AllowedTypeSetting>>,
    /// Document allow-list override. Built-in defaults apply when unset.
    pub document_types: Option<Vec<AllowedTypeSetting>>,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_file_size: 20 * 1024 * 1024,
            signed_url_ttl_secs: 300,
            temp_ttl_secs: 3600,
            sweep_interval_secs: 300,
            sweep_batch_size: 500,
            category_root: "attachments".to_string(),
            image_types: None,
            document_types: None,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("FERRY").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
