//! Attachment lifecycle service implementation.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::AttachmentError;
use super::key::StorageKeyBuilder;
use super::policy::UploadPolicy;
use super::types::{
    Attachment, AttachmentStatus, CreateAttachmentInput, EntityType, IssueUploadInput,
    IssueUploadResult, RegisterMetadataInput, ResolvedAttachment,
};
use super::validation::validate_upload;
use crate::storage::ObjectStorage;

/// Repository trait for attachment persistence.
///
/// Implemented by the db crate. Every method except [`find_any_by_id`]
/// ignores soft-deleted rows. The conditional updates are the only
/// synchronisation between confirmation and the expiration sweeper.
///
/// [`find_any_by_id`]: AttachmentRepository::find_any_by_id
pub trait AttachmentRepository: Send + Sync {
    /// Insert a new TEMP attachment.
    fn create(
        &self,
        input: CreateAttachmentInput,
    ) -> impl Future<Output = Result<Attachment, AttachmentError>> + Send;

    /// Find a non-deleted attachment by ID.
    fn find_by_id(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Attachment>, AttachmentError>> + Send;

    /// Find an attachment by ID, including soft-deleted rows.
    fn find_any_by_id(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Attachment>, AttachmentError>> + Send;

    /// List non-deleted attachments bound to an entity, oldest first.
    fn find_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Attachment>, AttachmentError>> + Send;

    /// Non-deleted attachments that reference `storage_key`.
    ///
    /// A unique index on live keys keeps this to at most one row.
    fn find_by_storage_key(
        &self,
        storage_key: &str,
    ) -> impl Future<Output = Result<Vec<Attachment>, AttachmentError>> + Send;

    /// Find non-deleted attachments among `ids`.
    fn find_by_ids(
        &self,
        ids: &[Uuid],
    ) -> impl Future<Output = Result<Vec<Attachment>, AttachmentError>> + Send;

    /// Up to `limit` non-deleted TEMP rows whose `expires_at` is before `now`.
    fn find_expired_temp(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> impl Future<Output = Result<Vec<Attachment>, AttachmentError>> + Send;

    /// Bind TEMP rows to `entity_id` in one conditional update.
    ///
    /// Only rows with `status = TEMP`, no `deleted_at`, and `expires_at > now`
    /// are touched. Returns the number of rows changed.
    fn confirm_batch(
        &self,
        ids: &[Uuid],
        entity_id: Uuid,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, AttachmentError>> + Send;

    /// Overwrite the metadata of a pending TEMP row and push out its expiry.
    ///
    /// Only a row with this `id`, the same `storage_key` and `uploaded_by`,
    /// `status = TEMP`, no `deleted_at`, and `expires_at > now` is touched.
    /// Returns the updated row, or `None` if nothing matched.
    fn refresh_temp(
        &self,
        id: Uuid,
        input: CreateAttachmentInput,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<Attachment>, AttachmentError>> + Send;

    /// Set `deleted_at` on a row that is not yet deleted.
    fn soft_delete(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, AttachmentError>> + Send;

    /// Soft-delete rows among `ids` that are still expired TEMP rows.
    ///
    /// Returns the number of rows changed.
    fn delete_expired_batch(
        &self,
        ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, AttachmentError>> + Send;
}

/// Attachment lifecycle service.
///
/// Owns the TEMP -> CONFIRMED -> deleted state machine and keeps the object
/// store and the attachment table consistent.
pub struct AttachmentService<S: ObjectStorage, R: AttachmentRepository> {
    storage: Arc<S>,
    repo: Arc<R>,
    policy: Arc<UploadPolicy>,
    keys: StorageKeyBuilder,
}

impl<S: ObjectStorage, R: AttachmentRepository> AttachmentService<S, R> {
    /// Create a new attachment service.
    #[must_use]
    pub fn new(storage: Arc<S>, repo: Arc<R>, policy: UploadPolicy) -> Self {
        let keys = StorageKeyBuilder::new(policy.category_root.clone());
        Self {
            storage,
            repo,
            policy: Arc::new(policy),
            keys,
        }
    }

    /// Upload policy in effect.
    #[must_use]
    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Validate an upload, sign a PUT URL, and record a TEMP attachment.
    ///
    /// # Errors
    ///
    /// Returns a validation-family error before touching storage or the
    /// repository, or a storage/repository error afterwards.
    pub async fn issue_upload(
        &self,
        input: IssueUploadInput,
    ) -> Result<IssueUploadResult, AttachmentError> {
        let validated = validate_upload(
            &self.policy,
            &input.entity_type,
            input.file_size,
            &input.file_name,
            &input.content_type,
        )?;

        let now = Utc::now();
        let storage_key = self.keys.build(
            validated.entity_type,
            input.parent_id,
            &validated.extension,
            now,
        );

        let presigned = self
            .storage
            .presign_upload(&storage_key, &input.content_type)
            .await?;

        let attachment = self
            .repo
            .create(CreateAttachmentInput {
                id: Uuid::new_v4(),
                entity_type: validated.entity_type,
                file_name: input.file_name,
                storage_key: storage_key.clone(),
                file_size: input.file_size,
                content_type: input.content_type,
                uploaded_by: input.requested_by,
                expires_at: now + self.policy.temp_ttl(),
            })
            .await?;

        info!(
            attachment_id = %attachment.id,
            entity_type = %attachment.entity_type,
            storage_key = %attachment.storage_key,
            "issued upload url"
        );

        Ok(IssueUploadResult {
            attachment_id: attachment.id,
            upload_url: presigned.url,
            upload_method: presigned.method,
            upload_headers: presigned.headers,
            storage_key,
            expires_in_seconds: presigned.expires_in_secs,
        })
    }

    /// Record a TEMP attachment for an object the client already uploaded.
    ///
    /// The key must have been issued for the same entity type and carry the
    /// extension of `file_name`. A key that already has a pending row from
    /// [`issue_upload`](Self::issue_upload) reuses that row, so one object is
    /// never referenced by two live rows.
    ///
    /// # Errors
    ///
    /// Returns a validation-family error for bad input, a key that is no
    /// longer pending, or a foreign key; `Forbidden` if another user holds
    /// the key; or a storage/repository error.
    pub async fn register_metadata(
        &self,
        input: RegisterMetadataInput,
    ) -> Result<ResolvedAttachment, AttachmentError> {
        let validated = validate_upload(
            &self.policy,
            &input.entity_type,
            input.file_size,
            &input.file_name,
            &input.content_type,
        )?;

        let storage_key = input.storage_key.trim();
        if !self
            .keys
            .is_issued_for(storage_key, validated.entity_type, &validated.extension)
        {
            return Err(AttachmentError::validation(format!(
                "storage key must start with '{}' and end with '.{}'",
                self.keys.entity_prefix(validated.entity_type),
                validated.extension
            )));
        }

        let existing = self.repo.find_by_storage_key(storage_key).await?;
        if let Some(held) = existing
            .iter()
            .find(|a| a.uploaded_by != input.requested_by)
        {
            warn!(
                attachment_id = %held.id,
                requested_by = %input.requested_by,
                "storage key is held by another user"
            );
            return Err(AttachmentError::Forbidden(held.id));
        }

        let now = Utc::now();
        let record = CreateAttachmentInput {
            id: Uuid::new_v4(),
            entity_type: validated.entity_type,
            file_name: input.file_name,
            storage_key: storage_key.to_string(),
            file_size: input.file_size,
            content_type: input.content_type,
            uploaded_by: input.requested_by,
            expires_at: now + self.policy.temp_ttl(),
        };

        let attachment = match existing.first() {
            Some(pending) => self
                .repo
                .refresh_temp(pending.id, record, now)
                .await?
                .ok_or_else(|| {
                    AttachmentError::validation(
                        "storage key is no longer pending, request a new upload URL",
                    )
                })?,
            None => self.repo.create(record).await?,
        };

        info!(
            attachment_id = %attachment.id,
            storage_key = %attachment.storage_key,
            "registered uploaded metadata"
        );

        self.resolve(attachment).await
    }

    /// Bind TEMP attachments to their owning entity.
    ///
    /// Ids that are already confirmed, deleted, expired, or unknown are
    /// skipped silently. Returns every attachment among `ids` that is bound
    /// to `entity_id` after the call.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the update or the read-back fails.
    pub async fn confirm(
        &self,
        ids: &[Uuid],
        entity_id: Uuid,
    ) -> Result<Vec<Attachment>, AttachmentError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut seen = HashSet::with_capacity(ids.len());
        let ids: Vec<Uuid> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let changed = self
            .repo
            .confirm_batch(&ids, entity_id, Utc::now())
            .await?;

        debug!(
            entity_id = %entity_id,
            requested = ids.len(),
            changed,
            "confirmed attachments"
        );

        let bound = self
            .repo
            .find_by_ids(&ids)
            .await?
            .into_iter()
            .filter(|a| a.status == AttachmentStatus::Confirmed && a.entity_id == Some(entity_id))
            .collect();

        Ok(bound)
    }

    /// List attachments of an entity with freshly derived URLs.
    ///
    /// # Errors
    ///
    /// Returns a repository or storage error.
    pub async fn list_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<Vec<ResolvedAttachment>, AttachmentError> {
        let attachments = self.repo.find_by_entity(entity_type, entity_id).await?;

        let mut resolved = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            resolved.push(self.resolve(attachment).await?);
        }
        Ok(resolved)
    }

    /// Get a non-deleted attachment by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the attachment does not exist or was deleted.
    pub async fn get_by_id(&self, id: Uuid) -> Result<ResolvedAttachment, AttachmentError> {
        let attachment = self
            .repo
            .find_by_id(id)
            .await?
            .ok_or(AttachmentError::NotFound(id))?;

        self.resolve(attachment).await
    }

    /// Delete an attachment on behalf of its uploader.
    ///
    /// The object delete is best effort. Deleting an already deleted
    /// attachment succeeds without side effects.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown ID, `Forbidden` if the requester is
    /// not the uploader, or a repository error.
    pub async fn delete(&self, id: Uuid, requested_by: Uuid) -> Result<(), AttachmentError> {
        let attachment = self
            .repo
            .find_any_by_id(id)
            .await?
            .ok_or(AttachmentError::NotFound(id))?;

        if attachment.uploaded_by != requested_by {
            return Err(AttachmentError::Forbidden(id));
        }

        if attachment.is_deleted() {
            debug!(attachment_id = %id, "attachment already deleted");
            return Ok(());
        }

        self.repo.soft_delete(id, Utc::now()).await?;

        let shared = self
            .repo
            .find_by_storage_key(&attachment.storage_key)
            .await?
            .iter()
            .any(|a| a.id != id);
        if shared {
            warn!(
                attachment_id = %id,
                storage_key = %attachment.storage_key,
                "stored object still referenced, keeping it"
            );
        } else if let Err(e) = self.storage.delete(&attachment.storage_key).await {
            warn!(
                attachment_id = %id,
                storage_key = %attachment.storage_key,
                error = %e,
                "failed to delete stored object, continuing"
            );
        }

        info!(attachment_id = %id, "deleted attachment");
        Ok(())
    }

    async fn resolve(&self, attachment: Attachment) -> Result<ResolvedAttachment, AttachmentError> {
        let url = self.storage.readable_url(&attachment.storage_key).await?;
        Ok(ResolvedAttachment { attachment, url })
    }
}
