//! Storage gateway implementation using Apache OpenDAL.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use opendal::{Operator, services};

use super::config::{StorageConfig, StorageProvider};
use super::error::StorageError;

/// Presigned URL for a direct upload.
#[derive(Debug, Clone)]
pub struct PresignedUrl {
    /// The presigned URL.
    pub url: String,
    /// HTTP method to use (PUT for upload).
    pub method: String,
    /// Validity window in seconds.
    pub expires_in_secs: u64,
    /// Required headers for the request.
    pub headers: HashMap<String, String>,
}

/// Gateway to the external object store.
///
/// Implemented by [`StorageService`] for real providers; tests substitute
/// an in-memory implementation.
pub trait ObjectStorage: Send + Sync {
    /// Sign a PUT URL for `key`, valid for the configured upload window.
    fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> impl Future<Output = Result<PresignedUrl, StorageError>> + Send;

    /// Derive a browsable URL for a stored key.
    fn readable_url(&self, key: &str) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Delete the object at `key`. An absent object counts as deleted.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// OpenDAL-backed storage gateway.
pub struct StorageService {
    operator: Operator,
    config: StorageConfig,
}

impl StorageService {
    /// Create a new storage service from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage provider cannot be initialized.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let operator = Self::create_operator(&config.provider)?;
        Ok(Self { operator, config })
    }

    /// Create OpenDAL operator from provider config.
    fn create_operator(provider: &StorageProvider) -> Result<Operator, StorageError> {
        let operator = match provider {
            StorageProvider::S3 {
                endpoint,
                bucket,
                access_key_id,
                secret_access_key,
                region,
            } => {
                let builder = services::S3::default()
                    .endpoint(endpoint)
                    .bucket(bucket)
                    .access_key_id(access_key_id)
                    .secret_access_key(secret_access_key)
                    .region(region);

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
            StorageProvider::AzureBlob {
                account,
                access_key,
                container,
            } => {
                let builder = services::Azblob::default()
                    .account_name(account)
                    .account_key(access_key)
                    .container(container);

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
            StorageProvider::LocalFs { root } => {
                let builder = services::Fs::default().root(
                    root.to_str()
                        .ok_or_else(|| StorageError::configuration("invalid path"))?,
                );

                Operator::new(builder)
                    .map_err(|e| StorageError::configuration(e.to_string()))?
                    .finish()
            }
        };

        Ok(operator)
    }

    /// Get the storage provider name.
    #[must_use]
    pub fn provider_name(&self) -> &'static str {
        self.config.provider.name()
    }
}

impl ObjectStorage for StorageService {
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<PresignedUrl, StorageError> {
        let ttl_secs = self.config.presign_upload_ttl_secs;

        let presigned = self
            .operator
            .presign_write(key, Duration::from_secs(ttl_secs))
            .await
            .map_err(StorageError::from)?;

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), content_type.to_string());

        Ok(PresignedUrl {
            url: presigned.uri().to_string(),
            method: presigned.method().to_string(),
            expires_in_secs: ttl_secs,
            headers,
        })
    }

    async fn readable_url(&self, key: &str) -> Result<String, StorageError> {
        if let Some(base) = &self.config.public_base_url {
            return Ok(public_url(base, key));
        }

        let presigned = self
            .operator
            .presign_read(key, Duration::from_secs(self.config.presign_download_ttl_secs))
            .await
            .map_err(StorageError::from)?;

        Ok(presigned.uri().to_string())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self.operator.delete(key).await.map_err(StorageError::from) {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    }
}

/// Join a public base URL and a storage key.
fn public_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}
