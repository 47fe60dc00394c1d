//! In-memory storage and repository doubles for service and sweeper tests.
//!
//! The mock repository applies the same row conditions as the SQL
//! implementation so compare-and-set behaviour can be exercised without a
//! database.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::AttachmentError;
use super::service::AttachmentRepository;
use super::types::{Attachment, AttachmentStatus, CreateAttachmentInput, EntityType};
use crate::storage::{ObjectStorage, PresignedUrl, StorageError};

/// Mock object store.
pub(crate) struct MockStorage {
    objects: Mutex<HashSet<String>>,
    deleted: Mutex<Vec<String>>,
    failing_deletes: Mutex<HashSet<String>>,
    presign_calls: AtomicUsize,
    fail_presign: AtomicBool,
    fail_delete: AtomicBool,
}

impl MockStorage {
    pub(crate) const BASE_URL: &'static str = "https://files.example.test";

    pub(crate) fn new() -> Self {
        Self {
            objects: Mutex::new(HashSet::new()),
            deleted: Mutex::new(Vec::new()),
            failing_deletes: Mutex::new(HashSet::new()),
            presign_calls: AtomicUsize::new(0),
            fail_presign: AtomicBool::new(false),
            fail_delete: AtomicBool::new(false),
        }
    }

    pub(crate) fn fail_presign(&self, fail: bool) {
        self.fail_presign.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Make deletes of one key fail until cleared.
    pub(crate) fn fail_delete_for(&self, key: &str, fail: bool) {
        let mut failing = self.failing_deletes.lock().unwrap();
        if fail {
            failing.insert(key.to_string());
        } else {
            failing.remove(key);
        }
    }

    pub(crate) fn presign_calls(&self) -> usize {
        self.presign_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub(crate) fn has_object(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains(key)
    }

    pub(crate) fn put_object(&self, key: &str) {
        self.objects.lock().unwrap().insert(key.to_string());
    }

    pub(crate) fn remove_object(&self, key: &str) {
        self.objects.lock().unwrap().remove(key);
    }
}

impl ObjectStorage for MockStorage {
    async fn presign_upload(
        &self,
        key: &str,
        content_type: &str,
    ) -> Result<PresignedUrl, StorageError> {
        self.presign_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_presign.load(Ordering::SeqCst) {
            return Err(StorageError::operation("mock presign failure"));
        }

        // Simulate the client completing the PUT
        self.put_object(key);

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), content_type.to_string());
        Ok(PresignedUrl {
            url: format!("{}/{key}?X-Mock-Signature=1", Self::BASE_URL),
            method: "PUT".to_string(),
            expires_in_secs: 300,
            headers,
        })
    }

    async fn readable_url(&self, key: &str) -> Result<String, StorageError> {
        Ok(format!("{}/{key}", Self::BASE_URL))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        if self.fail_delete.load(Ordering::SeqCst)
            || self.failing_deletes.lock().unwrap().contains(key)
        {
            return Err(StorageError::operation("mock delete failure"));
        }
        self.objects.lock().unwrap().remove(key);
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

/// Mock attachment repository.
pub(crate) struct MockAttachmentRepository {
    rows: Mutex<HashMap<Uuid, Attachment>>,
    confirm_after_scan: Mutex<Option<(Uuid, Uuid)>>,
    confirm_calls: AtomicUsize,
    fail_writes: AtomicBool,
    fail_scan: AtomicBool,
}

impl MockAttachmentRepository {
    pub(crate) fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            confirm_after_scan: Mutex::new(None),
            confirm_calls: AtomicUsize::new(0),
            fail_writes: AtomicBool::new(false),
            fail_scan: AtomicBool::new(false),
        }
    }

    pub(crate) fn get(&self, id: Uuid) -> Option<Attachment> {
        self.rows.lock().unwrap().get(&id).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub(crate) fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_scan(&self, fail: bool) {
        self.fail_scan.store(fail, Ordering::SeqCst);
    }

    /// Move a TEMP row's expiry into the past.
    pub(crate) fn expire(&self, id: Uuid) {
        if let Some(row) = self.rows.lock().unwrap().get_mut(&id) {
            if row.is_temp() {
                row.expires_at = Some(Utc::now() - chrono::Duration::seconds(1));
            }
        }
    }

    /// Insert a CONFIRMED copy of `id` under a new ID, bypassing the live
    /// key uniqueness check. Returns the new ID.
    pub(crate) fn insert_duplicate(&self, id: Uuid, entity_id: Uuid) -> Uuid {
        let mut rows = self.rows.lock().unwrap();
        let mut copy = rows[&id].clone();
        copy.id = Uuid::new_v4();
        copy.status = AttachmentStatus::Confirmed;
        copy.entity_id = Some(entity_id);
        copy.expires_at = None;
        let new_id = copy.id;
        rows.insert(new_id, copy);
        new_id
    }

    /// Bind `id` to `entity_id` right after the next expiry scan returns,
    /// simulating a confirmation that commits between scan and reap.
    pub(crate) fn confirm_after_scan(&self, id: Uuid, entity_id: Uuid) {
        *self.confirm_after_scan.lock().unwrap() = Some((id, entity_id));
    }

    fn check_writes(&self) -> Result<(), AttachmentError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AttachmentError::repository("mock write failure"));
        }
        Ok(())
    }
}

impl AttachmentRepository for MockAttachmentRepository {
    async fn create(&self, input: CreateAttachmentInput) -> Result<Attachment, AttachmentError> {
        self.check_writes()?;
        let mut rows = self.rows.lock().unwrap();
        if rows
            .values()
            .any(|a| a.storage_key == input.storage_key && !a.is_deleted())
        {
            return Err(AttachmentError::validation(
                "storage key is already registered",
            ));
        }

        let now = Utc::now();
        let attachment = Attachment {
            id: input.id,
            entity_type: input.entity_type,
            entity_id: None,
            status: AttachmentStatus::Temp,
            file_name: input.file_name,
            storage_key: input.storage_key,
            file_size: input.file_size,
            content_type: input.content_type,
            uploaded_by: input.uploaded_by,
            created_at: now,
            updated_at: now,
            expires_at: Some(input.expires_at),
            deleted_at: None,
        };
        rows.insert(attachment.id, attachment.clone());
        Ok(attachment)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Attachment>, AttachmentError> {
        Ok(self.get(id).filter(|a| !a.is_deleted()))
    }

    async fn find_any_by_id(&self, id: Uuid) -> Result<Option<Attachment>, AttachmentError> {
        Ok(self.get(id))
    }

    async fn find_by_entity(
        &self,
        entity_type: EntityType,
        entity_id: Uuid,
    ) -> Result<Vec<Attachment>, AttachmentError> {
        let mut found: Vec<Attachment> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|a| {
                a.entity_type == entity_type && a.entity_id == Some(entity_id) && !a.is_deleted()
            })
            .cloned()
            .collect();
        found.sort_by_key(|a| a.created_at);
        Ok(found)
    }

    async fn find_by_storage_key(
        &self,
        storage_key: &str,
    ) -> Result<Vec<Attachment>, AttachmentError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|a| a.storage_key == storage_key && !a.is_deleted())
            .cloned()
            .collect())
    }

    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Attachment>, AttachmentError> {
        let rows = self.rows.lock().unwrap();
        Ok(ids
            .iter()
            .filter_map(|id| rows.get(id))
            .filter(|a| !a.is_deleted())
            .cloned()
            .collect())
    }

    async fn find_expired_temp(
        &self,
        now: DateTime<Utc>,
        limit: u64,
    ) -> Result<Vec<Attachment>, AttachmentError> {
        if self.fail_scan.load(Ordering::SeqCst) {
            return Err(AttachmentError::repository("mock scan failure"));
        }

        let mut rows = self.rows.lock().unwrap();
        let mut found: Vec<Attachment> = rows
            .values()
            .filter(|a| a.is_expired(now) && !a.is_deleted())
            .cloned()
            .collect();
        found.sort_by_key(|a| a.expires_at);
        found.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

        if let Some((id, entity_id)) = self.confirm_after_scan.lock().unwrap().take() {
            if let Some(row) = rows.get_mut(&id) {
                row.status = AttachmentStatus::Confirmed;
                row.entity_id = Some(entity_id);
                row.expires_at = None;
            }
        }

        Ok(found)
    }

    async fn confirm_batch(
        &self,
        ids: &[Uuid],
        entity_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, AttachmentError> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        self.check_writes()?;

        let mut rows = self.rows.lock().unwrap();
        let mut changed = 0;
        for id in ids {
            if let Some(row) = rows.get_mut(id) {
                let eligible = row.status == AttachmentStatus::Temp
                    && row.deleted_at.is_none()
                    && row.expires_at.is_some_and(|at| at > now);
                if eligible {
                    row.status = AttachmentStatus::Confirmed;
                    row.entity_id = Some(entity_id);
                    row.expires_at = None;
                    row.updated_at = now;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }

    async fn refresh_temp(
        &self,
        id: Uuid,
        input: CreateAttachmentInput,
        now: DateTime<Utc>,
    ) -> Result<Option<Attachment>, AttachmentError> {
        self.check_writes()?;
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(row)
                if row.status == AttachmentStatus::Temp
                    && row.deleted_at.is_none()
                    && row.expires_at.is_some_and(|at| at > now)
                    && row.storage_key == input.storage_key
                    && row.uploaded_by == input.uploaded_by =>
            {
                row.file_name = input.file_name;
                row.file_size = input.file_size;
                row.content_type = input.content_type;
                row.expires_at = Some(input.expires_at);
                row.updated_at = now;
                Ok(Some(row.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn soft_delete(&self, id: Uuid, now: DateTime<Utc>) -> Result<bool, AttachmentError> {
        self.check_writes()?;
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(row) if row.deleted_at.is_none() => {
                row.deleted_at = Some(now);
                row.updated_at = now;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_expired_batch(
        &self,
        ids: &[Uuid],
        now: DateTime<Utc>,
    ) -> Result<u64, AttachmentError> {
        self.check_writes()?;
        let mut rows = self.rows.lock().unwrap();
        let mut changed = 0;
        for id in ids {
            if let Some(row) = rows.get_mut(id) {
                if row.is_expired(now) && row.deleted_at.is_none() {
                    row.deleted_at = Some(now);
                    row.updated_at = now;
                    changed += 1;
                }
            }
        }
        Ok(changed)
    }
}
